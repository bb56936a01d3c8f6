/// Supplies request headers and the CSRF token attached to query
/// submissions. The engine calls it; it never implements authentication
/// itself.
pub trait Authenticator: Send + Sync {
    /// Headers handed to the transport when the connection is opened.
    fn headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Token attached to each submit payload, when present.
    fn csrf_token(&self) -> Option<String> {
        None
    }
}

/// No-op authenticator for open endpoints and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl Authenticator for NoAuth {}

/// Fixed bearer token plus CSRF token.
#[derive(Debug, Clone)]
pub struct StaticTokenAuth {
    token: String,
}

impl StaticTokenAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Authenticator for StaticTokenAuth {
    fn headers(&self) -> Vec<(String, String)> {
        vec![(
            "Authorization".to_string(),
            format!("Bearer {}", self.token),
        )]
    }

    fn csrf_token(&self) -> Option<String> {
        Some(self.token.clone())
    }
}
