use std::fmt;

use num_enum::TryFromPrimitive;
#[cfg(feature = "extras")]
use strum_macros::{AsRefStr, EnumIter};

/// Коды статуса для категоризации ошибок.
///
/// # Диапазоны:
/// - 0xxx: Успех
/// - 1xxx: Общие ошибки
/// - 2xxx: Ошибки топиков и сообщений
/// - 3xxx: Исполнитель и узлы
/// - 5xxx: Конфигурация и окружение
///
/// # Реализация:
/// - `num_enum::TryFromPrimitive` даёт нативную реализацию `TryFrom<u32>`.
/// - опционально: `strum` для `AsRefStr`/`EnumIter` (feature = "extras").
#[cfg_attr(feature = "extras", derive(AsRefStr, EnumIter))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: Успех ===
    Success = 0,

    // === 1xxx: Общие ошибки ===
    Unknown = 1000,
    Unsupported = 1001,
    Unexpected = 1002,
    Internal = 1003,
    InvalidArgs = 1004,

    // === 2xxx: Топики и сообщения ===
    NotFound = 2000,
    AlreadyExists = 2001,
    TypeMismatch = 2002,
    InvalidName = 2003,
    UseAfterMove = 2004,

    // === 3xxx: Исполнитель и узлы ===
    ExecutorStopped = 3000,
    ExecutorBusy = 3001,
    ContextMismatch = 3002,
    Cancelled = 3003,

    // === 5xxx: Конфигурация ===
    ConfigInvalid = 5000,
    Io = 5001,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое представление кода статуса.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Штатная ситуация, после которой вызывающий код может просто вернуться.
    ///
    /// Отмена ожидания и остановленный исполнитель не считаются сбоями
    /// приложения.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Cancelled | Self::ExecutorStopped)
    }

    /// Требуется ли логировать как критическую ошибку.
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Internal | Self::UseAfterMove)
    }

    /// Рекомендуемый уровень логирования для данного кода.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Success => LogLevel::Trace,
            Self::Cancelled => LogLevel::Debug,
            Self::NotFound | Self::AlreadyExists | Self::ExecutorStopped => LogLevel::Info,
            Self::InvalidArgs
            | Self::InvalidName
            | Self::TypeMismatch
            | Self::ContextMismatch
            | Self::ExecutorBusy
            | Self::ConfigInvalid => LogLevel::Warn,
            Self::Internal | Self::UseAfterMove => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        #[cfg(feature = "extras")]
        {
            let name: &str = self.as_ref();
            write!(f, "{name} ({})", self.code())
        }
        #[cfg(not(feature = "extras"))]
        {
            write!(f, "{:?} ({})", self, self.code())
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет, что отмена и остановка считаются штатными.
    #[test]
    fn test_recoverable() {
        assert!(StatusCode::Cancelled.is_recoverable());
        assert!(StatusCode::ExecutorStopped.is_recoverable());
        assert!(!StatusCode::UseAfterMove.is_recoverable());
    }

    /// Тест проверяет конвертацию через `TryFrom<u32>`.
    #[test]
    fn test_try_from_u32() {
        let n = StatusCode::TypeMismatch.code();
        assert_eq!(StatusCode::try_from(n).unwrap(), StatusCode::TypeMismatch);
        assert!(StatusCode::try_from(99999).is_err());
    }

    /// Тест проверяет получение числового представления и конвертацию
    /// `From<StatusCode> for u32`.
    #[test]
    fn test_code_and_into() {
        let c = StatusCode::NotFound;
        assert_eq!(c.code(), 2000);
        let n: u32 = c.into();
        assert_eq!(n, 2000);
    }

    /// Тест проверяет отображаемый уровень логирования для разных кодов.
    #[test]
    fn test_log_level_mappings() {
        assert_eq!(StatusCode::Success.log_level(), LogLevel::Trace);
        assert_eq!(StatusCode::Cancelled.log_level(), LogLevel::Debug);
        assert_eq!(StatusCode::UseAfterMove.log_level(), LogLevel::Error);
        assert!(StatusCode::UseAfterMove.is_critical());
    }

    /// Тест проверяет формат `Display`: строка должна содержать имя варианта и
    /// числовой код.
    #[test]
    fn test_display_contains_name_and_code() {
        let s = format!("{}", StatusCode::Cancelled);
        assert!(s.contains("3003"), "Display must contain code 3003, got: {s}");
        assert!(
            s.contains("Cancelled"),
            "Display must contain variant name 'Cancelled', got: {s}"
        );
    }

    /// Тест проверяет, что каждый вариант восстанавливается из своего
    /// числового кода.
    #[cfg(feature = "extras")]
    #[test]
    fn test_all_codes_round_trip() {
        use strum::IntoEnumIterator;

        for code in StatusCode::iter() {
            assert_eq!(StatusCode::try_from(code.code()).unwrap(), code);
            let name: &str = code.as_ref();
            assert!(code.to_string().starts_with(name));
        }
    }
}
