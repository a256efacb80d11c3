use thiserror::Error;

/// Failure of a single client operation. Every variant maps to an `ERROR`
/// frame on the caller's personal queue; none of them closes the session.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("not joined to quiz `{0}`")]
    NotInRoom(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Client-facing wording for the `ERROR` frame, kept free of internal
    /// detail for the `Internal` case.
    pub fn client_reason(&self) -> String {
        match self {
            ServiceError::InvalidInput(message) => message.clone(),
            ServiceError::RateLimited => "Rate limit exceeded. Please slow down.".to_string(),
            ServiceError::NotInRoom(quiz_id) => format!("You are not in quiz {quiz_id}"),
            ServiceError::Internal(_) => "Failed to process message".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_details_are_not_leaked_to_clients() {
        let err = ServiceError::Internal("connection pool exhausted".into());
        assert_eq!(err.client_reason(), "Failed to process message");
    }

    #[test]
    fn not_in_room_names_the_quiz() {
        let err = ServiceError::NotInRoom("q1".into());
        assert_eq!(err.client_reason(), "You are not in quiz q1");
    }
}
