//! Business logic services.

pub mod digest;
pub mod mailer;
pub mod oauth;
pub mod session;
pub mod transport;

pub use digest::DigestService;
pub use mailer::{
    EmailOptions, MailStore, Mailer, MailerError, PgMailStore, SendReceipt, TemplateName,
};
pub use oauth::{OAuthClient, OAuthError};
pub use session::{SessionError, SessionSigner};
pub use transport::{EmailTransport, OutgoingEmail, ResendClient, SentEmail, TransportError};
