//! Логирование на `tracing`: фильтр уровня, слой форматирования и запись
//! ошибок с уровнем по статус-коду.

pub mod config;
mod filters;
mod formatter;
mod report;

pub use config::{LogFormat, LoggingConfig};
pub use report::log_error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Устанавливает глобальный subscriber по конфигурации.
///
/// Повторная инициализация возвращает ошибку, а не паникует.
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    config.validate()?;

    let env_filter = filters::build_filter_from_config(config);
    let formatter_layer = formatter::build_formatter_from_config(config);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(formatter_layer)
        .try_init()?;

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        level = %config.level,
        format = %config.format,
        "logging initialized"
    );
    Ok(())
}
