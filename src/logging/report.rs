use intrabus_error::{LogLevel, StackError};
use tracing::{debug, error, info, trace, warn};

/// Пишет ошибку в лог на уровне, который задаёт её статус-код.
///
/// Поля корневой ошибки склеиваются в строку `key=value`, контексты
/// попадают в поле `error` через `Display`.
pub fn log_error(err: &StackError) {
    let root = err.root();
    let fields = root
        .log_fields()
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(" ");
    let details = root.log_message();
    let critical = err.is_critical();

    macro_rules! emit {
        ($level:ident) => {
            $level!(error = %err, %fields, %details, critical, "operation failed")
        };
    }

    match err.log_level() {
        LogLevel::Trace => emit!(trace),
        LogLevel::Debug => emit!(debug),
        LogLevel::Info => emit!(info),
        LogLevel::Warn => emit!(warn),
        LogLevel::Error => emit!(error),
    }
}
