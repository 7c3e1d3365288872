use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки создания узла.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    /// Имя узла не прошло валидацию.
    #[error("invalid node name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },
}

impl ErrorExt for NodeError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidName { .. } => StatusCode::InvalidName,
        }
    }

    fn log_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("error_type", "node".to_string()),
            ("status_code", self.status_code().to_string()),
        ];
        match self {
            Self::InvalidName { name, .. } => fields.push(("node", name.clone())),
        }
        fields
    }
}
