use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки доступа к слоту сообщения.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SlotError {
    /// Полезная нагрузка уже была перемещена из слота.
    #[error("message slot accessed after its payload was moved out")]
    UseAfterMove,
}

impl ErrorExt for SlotError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::UseAfterMove => StatusCode::UseAfterMove,
        }
    }
}
