use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("API error: {message} (status: {status})")]
    Api { status: u16, message: String },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Tool error: {tool} - {message}")]
    Tool { tool: String, message: String },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Agent {agent} exceeded max iterations ({max})")]
    IterationLimit { agent: String, max: usize },

    /// A lookup agent could not resolve a name to a profile identifier.
    #[error("Lookup failed ({target}): {message}")]
    Lookup { target: String, message: String },

    /// A profile fetcher failed and no fallback was configured.
    #[error("Fetch failed ({source_name}): {message}")]
    Fetch { source_name: String, message: String },

    /// Model output did not match the required result shape.
    #[error("Invalid model output: {0}")]
    Validation(String),
}

impl Error {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit(message.into())
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    pub fn lookup(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Lookup {
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn fetch(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Map an HTTP error status and body text to the matching error kind.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Error::Auth(message),
            429 => Error::RateLimit(message),
            400 => Error::InvalidRequest(message),
            _ => Error::api(status, message),
        }
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    /// Whether the error means the model answered in the wrong shape.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
