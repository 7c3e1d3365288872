//! Конфигурация: значения по умолчанию, необязательный файл и переменные
//! окружения `INTRABUS_*`.

pub mod settings;

pub use settings::{ExecutorConfig, PipelineConfig, Settings};
