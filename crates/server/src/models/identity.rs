//! Normalized identity produced by the OAuth login exchange.

use serde::{Deserialize, Serialize};

use stride_core::Email;

/// A verified identity returned to the login caller.
///
/// Produced by exchanging an authorization code with the identity
/// provider; never persisted by this core. Account linkage downstream
/// keys on `subject_id` and requires `email`, which is why the exchange
/// rejects profiles without one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// Stable subject identifier issued by the provider.
    pub subject_id: String,
    /// Email address (hard requirement for account linkage).
    pub email: Email,
    /// Display name, if supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Given name, if supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    /// Family name, if supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    /// Profile picture URL, if supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture_url: Option<String>,
    /// Whether the provider has verified the email address.
    pub email_verified: bool,
    /// BCP 47 locale tag, if supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}
