use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to obtain credentials: {0}")]
    Auth(String),

    #[error("failed to marshal request body: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to check default bucket: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status when checking default bucket: {status}")]
    UnexpectedStatus { status: u16 },

    #[error("failed to decode default bucket response: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("request cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_step() {
        assert_eq!(
            ApiError::UnexpectedStatus { status: 500 }.to_string(),
            "unexpected status when checking default bucket: 500"
        );
        assert_eq!(
            ApiError::Decode("expected value at line 1 column 1".to_string()).to_string(),
            "failed to decode default bucket response: expected value at line 1 column 1"
        );
        assert_eq!(ApiError::Cancelled.to_string(), "request cancelled");
    }

    #[test]
    fn serde_errors_convert_to_serialization() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(ApiError::from(err), ApiError::Serialization(_)));
    }
}
