/// Per-request identity, passed explicitly to every operation that needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Authenticated caller id, scopes plan lookups
    pub user_id: String,
    /// Primary language tag of the caller (`en`, `ja`, ...)
    pub language: String,
    /// Unique id of this relay session, used in logs
    pub session_id: String,
}

impl RequestContext {
    pub fn new(user_id: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            language: language.into(),
            session_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}
