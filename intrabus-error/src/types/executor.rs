use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки управления исполнителем.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    /// Исполнитель уже в терминальном состоянии.
    #[error("executor already stopped")]
    AlreadyStopped,

    /// Повторный вход в цикл диспетчеризации (например, из колбэка).
    #[error("executor is already spinning")]
    AlreadySpinning,

    /// Узел уже зарегистрирован в другом исполнителе.
    #[error("node '{node}' is already registered with another executor")]
    NodeAlreadyRegistered { node: String },

    /// Узел не зарегистрирован в этом исполнителе.
    #[error("node '{node}' is not registered with this executor")]
    NodeNotRegistered { node: String },

    /// Узел создан в другом контексте.
    #[error("node '{node}' belongs to a different context")]
    ContextMismatch { node: String },
}

impl ErrorExt for ExecutorError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::AlreadyStopped => StatusCode::ExecutorStopped,
            Self::AlreadySpinning => StatusCode::ExecutorBusy,
            Self::NodeAlreadyRegistered { .. } => StatusCode::AlreadyExists,
            Self::NodeNotRegistered { .. } => StatusCode::NotFound,
            Self::ContextMismatch { .. } => StatusCode::ContextMismatch,
        }
    }

    fn log_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("error_type", "executor".to_string()),
            ("status_code", self.status_code().to_string()),
        ];
        match self {
            Self::NodeAlreadyRegistered { node }
            | Self::NodeNotRegistered { node }
            | Self::ContextMismatch { node } => fields.push(("node", node.clone())),
            Self::AlreadyStopped | Self::AlreadySpinning => {}
        }
        fields
    }
}
