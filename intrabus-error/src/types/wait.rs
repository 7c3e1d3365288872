use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Результат прерванного ожидания.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    /// Получен сигнал остановки до истечения дедлайна.
    #[error("wait cancelled by shutdown request")]
    Cancelled,
}

impl ErrorExt for WaitError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Cancelled => StatusCode::Cancelled,
        }
    }
}
