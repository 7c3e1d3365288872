use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки регистрации издателей и подписчиков на топике.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    /// Имя топика не прошло валидацию.
    #[error("invalid topic name '{topic}': {reason}")]
    InvalidName { topic: String, reason: &'static str },

    /// Топик уже существует с другим типом сообщения.
    #[error("topic '{topic}' carries {registered}, requested {requested}")]
    TypeMismatch {
        topic: String,
        registered: &'static str,
        requested: &'static str,
    },
}

impl ErrorExt for TopicError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidName { .. } => StatusCode::InvalidName,
            Self::TypeMismatch { .. } => StatusCode::TypeMismatch,
        }
    }

    fn log_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("error_type", "topic".to_string()),
            ("status_code", self.status_code().to_string()),
        ];
        match self {
            Self::InvalidName { topic, .. } | Self::TypeMismatch { topic, .. } => {
                fields.push(("topic", topic.clone()));
            }
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет, что сообщение о несовпадении типов содержит оба типа.
    #[test]
    fn test_type_mismatch_display() {
        let err = TopicError::TypeMismatch {
            topic: "chatter".to_string(),
            registered: "i32",
            requested: "alloc::string::String",
        };
        let s = err.to_string();
        assert!(s.contains("chatter"));
        assert!(s.contains("i32"));
        assert!(s.contains("String"));
        assert_eq!(err.status_code(), StatusCode::TypeMismatch);
    }

    /// Тест проверяет поле `topic` в логах.
    #[test]
    fn test_log_fields_topic() {
        let err = TopicError::InvalidName {
            topic: "a b".to_string(),
            reason: "contains whitespace",
        };
        assert!(err
            .log_fields()
            .iter()
            .any(|(k, v)| *k == "topic" && v == "a b"));
    }
}
