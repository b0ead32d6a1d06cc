use thiserror::Error;

/// Errors produced by the REST client and the polling engine.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Login was refused. Fatal to stream startup.
    #[error("login failed (status {status}): {message}")]
    Auth { status: u16, message: String },

    /// The service answered with a 4xx or with `success: false`.
    #[error("{endpoint} returned status {status} {error_type}: {message}")]
    Upstream {
        endpoint: &'static str,
        status: u16,
        error_type: String,
        message: String,
    },

    /// Network failure or a non-4xx error status.
    #[error("transport failure calling {endpoint}: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Body could not be decoded.
    #[error("malformed response from {endpoint}: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Channel or IM listing failed while resolving conversations.
    #[error("could not resolve conversations: {0}")]
    Directory(#[source] Box<ChatError>),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ChatError {
    /// Transport-class failures: the request never produced a usable answer.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Decode { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } | Self::Upstream { status, .. } => Some(*status),
            Self::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            Self::Directory(inner) => inner.status(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_error_mentions_endpoint_and_error_type() {
        let err = ChatError::Upstream {
            endpoint: "im.history",
            status: 400,
            error_type: "error-room-not-found".to_string(),
            message: "The required \"roomId\" param provided does not match any room".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("im.history"));
        assert!(msg.contains("400"));
        assert!(msg.contains("error-room-not-found"));
        assert_eq!(err.status(), Some(400));
        assert!(!err.is_transport());
    }

    #[test]
    fn directory_error_exposes_inner_status() {
        let inner = ChatError::Upstream {
            endpoint: "rooms.get",
            status: 401,
            error_type: "unauthorized".to_string(),
            message: "You must be logged in to do this.".to_string(),
        };
        let err = ChatError::Directory(Box::new(inner));
        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().starts_with("could not resolve conversations"));
    }

    #[test]
    fn decode_errors_count_as_transport() {
        let source = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = ChatError::Decode {
            endpoint: "im.list",
            source,
        };
        assert!(err.is_transport());
        assert_eq!(err.status(), None);
    }

    #[test]
    fn config_errors_carry_no_status() {
        let err = ChatError::Config("poll interval must be positive".to_string());
        assert_eq!(err.status(), None);
        assert!(!err.is_transport());
        assert_eq!(err.to_string(), "invalid configuration: poll interval must be positive");
    }
}
