//! Caller identity established by the auth middleware.

use subtle::ConstantTimeEq;

use crate::config::AuthApiSecret;

/// Authentication context inserted into request extensions.
///
/// Handlers read it via `Extension<Auth>`. `id` is the matched API secret id,
/// or `None` when authentication is disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Auth {
    pub id: Option<String>,
}

impl Auth {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
        }
    }

    /// Context for requests served with authentication disabled.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Identity used to scope per-user data such as meal plans.
    pub fn user_id(&self) -> &str {
        self.id.as_deref().unwrap_or("anonymous")
    }
}

/// Find the id of the secret matching `token`.
///
/// Every entry is compared in constant time so the timing does not reveal
/// which entry, if any, matched.
pub fn match_api_secret_id<'a>(token: &str, secrets: &'a [AuthApiSecret]) -> Option<&'a str> {
    let mut matched = None;
    for entry in secrets {
        let equal: bool = entry.secret.as_bytes().ct_eq(token.as_bytes()).into();
        if equal && matched.is_none() {
            matched = Some(entry.id.as_str());
        }
    }
    matched
}
