//! Email dispatch with durable logging.
//!
//! The mailer resolves a body (caller-supplied HTML or a stored template),
//! writes a `pending` log row, hands the rendered email to the transport,
//! and flips the row to `sent` or `failed`. The log row id is threaded
//! straight from the insert to the terminal update, so the outcome is
//! recorded without any lookup query.
//!
//! Storage sits behind [`MailStore`], the same kind of seam as
//! [`EmailTransport`], so the full pending-to-terminal lifecycle is
//! testable with an in-memory store.

use std::collections::HashMap;

use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;

use stride_core::EmailLogId;

use crate::db::{
    EmailLogRepository, EmailTemplateRecord, EmailTemplateRepository, NewEmailLog, RepositoryError,
};
use crate::services::transport::{EmailTransport, OutgoingEmail, TransportError};

/// Errors that can occur while dispatching an email.
#[derive(Debug, Error)]
pub enum MailerError {
    /// The send options are incomplete or contradictory.
    #[error("invalid email options: {0}")]
    InvalidOptions(String),

    /// The named template is not present in the store.
    #[error("email template '{0}' not found")]
    TemplateNotFound(String),

    /// The template requires variables the caller did not supply.
    #[error("template '{template}' missing required variables: {missing:?}")]
    MissingVariables {
        /// Template being rendered.
        template: String,
        /// Required variable names absent from the caller's map.
        missing: Vec<String>,
    },

    /// A log or template read/write failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The transport rejected or failed the delivery.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// The templates this application sends. Each declares the variables its
/// stored bodies rely on, checked before rendering so a half-substituted
/// email never leaves the building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateName {
    /// Weekly progress digest.
    WeeklyDigest,
    /// Post-signup welcome email.
    Welcome,
}

impl TemplateName {
    /// Name under which the template is stored.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WeeklyDigest => "weekly_digest",
            Self::Welcome => "welcome",
        }
    }

    /// Log category for emails sent from this template.
    #[must_use]
    pub const fn email_type(self) -> &'static str {
        match self {
            Self::WeeklyDigest => "weekly_digest",
            Self::Welcome => "welcome",
        }
    }

    /// Variables the stored bodies require.
    #[must_use]
    pub const fn required_vars(self) -> &'static [&'static str] {
        match self {
            Self::WeeklyDigest => &["name", "summary_html"],
            Self::Welcome => &["name"],
        }
    }
}

impl std::fmt::Display for TemplateName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery priority, carried as a message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmailPriority {
    /// Urgent, surfaced first by most clients.
    High,
    /// Ordinary delivery.
    #[default]
    Normal,
    /// Bulk-style delivery.
    Low,
}

impl EmailPriority {
    /// `X-Priority` header value (RFC-adjacent 1/3/5 convention).
    const fn header_value(self) -> &'static str {
        match self {
            Self::High => "1",
            Self::Normal => "3",
            Self::Low => "5",
        }
    }
}

/// What to send and to whom.
///
/// `to` and `subject` are always required, and exactly one body source
/// must be set: `html` for a caller-rendered body, or `template` for a
/// stored one.
#[derive(Debug, Clone, Default)]
pub struct EmailOptions {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Caller-rendered HTML body.
    pub html: Option<String>,
    /// Plain-text alternative for a caller-rendered body.
    pub text: Option<String>,
    /// Stored template to render.
    pub template: Option<TemplateName>,
    /// Substitution variables for template rendering.
    pub variables: HashMap<String, String>,
    /// Reply-To address.
    pub reply_to: Option<String>,
    /// Delivery priority.
    pub priority: EmailPriority,
    /// Log category override; defaults to the template's, or "transactional".
    pub email_type: Option<String>,
    /// Free-form metadata recorded on the log row.
    pub metadata: Option<Value>,
}

/// What a successful dispatch produced: the durable log row and the
/// provider's message id, so callers can correlate with the provider
/// without a log lookup.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    /// Log row recording the attempt.
    pub log_id: EmailLogId,
    /// Message id assigned by the transport provider.
    pub message_id: String,
}

/// Storage seam for the mailer: the email log lifecycle plus template
/// lookup. Production uses [`PgMailStore`]; tests use an in-memory store.
pub trait MailStore: Send + Sync {
    /// Insert a `pending` log entry and return its id.
    fn create_pending(
        &self,
        entry: NewEmailLog,
    ) -> impl Future<Output = Result<EmailLogId, RepositoryError>> + Send;

    /// Mark an entry `sent`, recording the provider's message id.
    fn mark_sent(
        &self,
        id: EmailLogId,
        provider_id: &str,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Mark an entry `failed`, recording the error message.
    fn mark_failed(
        &self,
        id: EmailLogId,
        error_message: &str,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Fetch a template body by name.
    fn template(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<EmailTemplateRecord>, RepositoryError>> + Send;
}

/// `PostgreSQL`-backed mail store delegating to the repositories.
#[derive(Debug, Clone)]
pub struct PgMailStore {
    pool: PgPool,
}

impl PgMailStore {
    /// Create a store over an established pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl MailStore for PgMailStore {
    async fn create_pending(&self, entry: NewEmailLog) -> Result<EmailLogId, RepositoryError> {
        EmailLogRepository::new(&self.pool).create_pending(entry).await
    }

    async fn mark_sent(&self, id: EmailLogId, provider_id: &str) -> Result<(), RepositoryError> {
        EmailLogRepository::new(&self.pool).mark_sent(id, provider_id).await
    }

    async fn mark_failed(
        &self,
        id: EmailLogId,
        error_message: &str,
    ) -> Result<(), RepositoryError> {
        EmailLogRepository::new(&self.pool).mark_failed(id, error_message).await
    }

    async fn template(&self, name: &str) -> Result<Option<EmailTemplateRecord>, RepositoryError> {
        EmailTemplateRepository::new(&self.pool).get_by_name(name).await
    }
}

/// Substitute `{{ variable }}` placeholders in `input`.
///
/// Whitespace inside the braces is ignored. Placeholders naming a variable
/// not present in `vars` are left verbatim, which makes a typo visible in
/// the delivered email instead of silently erasing content.
#[must_use]
pub fn render_template(input: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        match after_open.find("}}") {
            Some(close) => {
                let key = after_open[..close].trim();
                if let Some(value) = vars.get(key) {
                    out.push_str(value);
                } else {
                    out.push_str(&rest[open..open + 2 + close + 2]);
                }
                rest = &after_open[close + 2..];
            }
            None => {
                // Unterminated placeholder, keep the remainder as-is.
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn validate_options(options: &EmailOptions) -> Result<(), MailerError> {
    if options.to.trim().is_empty() {
        return Err(MailerError::InvalidOptions(
            "recipient address is required".to_string(),
        ));
    }
    if options.subject.trim().is_empty() {
        return Err(MailerError::InvalidOptions(
            "subject is required".to_string(),
        ));
    }
    match (&options.html, options.template) {
        (Some(_), Some(_)) => Err(MailerError::InvalidOptions(
            "provide either html or a template, not both".to_string(),
        )),
        (None, None) => Err(MailerError::InvalidOptions(
            "either html or a template is required".to_string(),
        )),
        _ => Ok(()),
    }
}

fn check_required_vars(
    template: TemplateName,
    vars: &HashMap<String, String>,
) -> Result<(), MailerError> {
    let missing: Vec<String> = template
        .required_vars()
        .iter()
        .filter(|v| !vars.contains_key(**v))
        .map(|v| (*v).to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(MailerError::MissingVariables {
            template: template.as_str().to_string(),
            missing,
        })
    }
}

/// Dispatches emails through a transport, logging every attempt.
#[derive(Debug, Clone)]
pub struct Mailer<T, S = PgMailStore> {
    transport: T,
    store: S,
    from_address: String,
}

impl<T: EmailTransport, S: MailStore> Mailer<T, S> {
    /// Create a new mailer.
    #[must_use]
    pub const fn new(transport: T, store: S, from_address: String) -> Self {
        Self {
            transport,
            store,
            from_address,
        }
    }

    /// Dispatch one email, returning the log row id and the provider's
    /// message id.
    ///
    /// A `pending` row is written before the template fetch and the
    /// transport call; the row ends as `sent` on success and `failed`
    /// (with the error message) on any later failure, whose error is
    /// returned to the caller.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOptions` or `MissingVariables` before anything is
    /// logged; `Repository` if the initial log write fails; and
    /// `TemplateNotFound` or `Transport` for failures after the `pending`
    /// row exists.
    pub async fn send(&self, options: EmailOptions) -> Result<SendReceipt, MailerError> {
        validate_options(&options)?;
        if let Some(template) = options.template {
            check_required_vars(template, &options.variables)?;
        }

        let email_type = options.email_type.clone().unwrap_or_else(|| {
            options
                .template
                .map_or_else(|| "transactional".to_string(), |t| t.email_type().to_string())
        });

        let log_id = self
            .store
            .create_pending(NewEmailLog {
                recipient: options.to.clone(),
                subject: options.subject.clone(),
                template: options.template.map(|t| t.as_str().to_string()),
                email_type,
                metadata: options.metadata.clone(),
            })
            .await?;

        match self.deliver(&options).await {
            Ok(message_id) => {
                if let Err(e) = self.store.mark_sent(log_id, &message_id).await {
                    // The email went out; a stale log beats a lost send.
                    tracing::warn!(log_id = %log_id, error = %e, "failed to mark email sent");
                }
                tracing::info!(log_id = %log_id, to = %options.to, "email sent");
                Ok(SendReceipt { log_id, message_id })
            }
            Err(e) => {
                if let Err(log_err) = self.store.mark_failed(log_id, &e.to_string()).await {
                    tracing::warn!(log_id = %log_id, error = %log_err, "failed to mark email failed");
                }
                tracing::warn!(log_id = %log_id, to = %options.to, error = %e, "email send failed");
                Err(e)
            }
        }
    }

    /// Resolve the body and push the message through the transport,
    /// returning the provider message id.
    async fn deliver(&self, options: &EmailOptions) -> Result<String, MailerError> {
        let (html, text) = match options.template {
            Some(template) => {
                let record = self
                    .store
                    .template(template.as_str())
                    .await?
                    .ok_or_else(|| MailerError::TemplateNotFound(template.as_str().to_string()))?;

                let html = render_template(&record.html_body, &options.variables);
                let text = render_template(&record.text_body, &options.variables);
                (html, Some(text))
            }
            // validate_options guarantees html is present on this path.
            None => (options.html.clone().unwrap_or_default(), options.text.clone()),
        };

        let mut headers = HashMap::new();
        headers.insert(
            "X-Priority".to_string(),
            options.priority.header_value().to_string(),
        );

        let email = OutgoingEmail {
            from: self.from_address.clone(),
            to: options.to.clone(),
            subject: options.subject.clone(),
            html,
            text,
            reply_to: options.reply_to.clone(),
            headers,
        };

        let sent = self.transport.send(&email).await?;
        Ok(sent.id)
    }
}
