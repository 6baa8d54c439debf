use serde::Deserialize;

/// Body of `POST /api/session`.
///
/// Current endpoints answer with a bare JSON string; the legacy
/// `/rest/com/vmware/cis/session` endpoint wraps it in `{"value": ...}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SessionResponse {
    Bare(String),
    Wrapped { value: String },
}

impl SessionResponse {
    pub fn into_session_id(self) -> String {
        match self {
            SessionResponse::Bare(id) | SessionResponse::Wrapped { value: id } => id,
        }
    }
}
