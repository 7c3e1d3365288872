use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use intrabus_error::{GenericError, IntrabusResult, ResultExt, StackError, StatusCode};
use serde::{Deserialize, Serialize};

use crate::{logging::LoggingConfig, pubsub::validate_topic_name};

/// Префикс переменных окружения: `INTRABUS_EXECUTOR__QUEUE_WARN_DEPTH=100`.
pub const ENV_PREFIX: &str = "INTRABUS";

/// Настройки исполнителя.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Начальная ёмкость очереди доставок.
    pub initial_queue_capacity: usize,
    /// Порог длины очереди для предупреждения в лог. Очередь не
    /// ограничивается.
    pub queue_warn_depth: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            initial_queue_capacity: 64,
            queue_warn_depth: 10_000,
        }
    }
}

/// Настройки демонстрационного конвейера.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    pub initial_value: i32,
    /// Пауза перед каждой пересылкой, мс.
    pub period_ms: u64,
    pub first_topic: String,
    pub second_topic: String,
    /// Остановиться после стольких инкрементов. При `None` работать до сигнала.
    pub max_iterations: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            initial_value: 42,
            period_ms: 1000,
            first_topic: "topic1".to_string(),
            second_topic: "topic2".to_string(),
            max_iterations: None,
        }
    }
}

/// Полные настройки процесса.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub executor: ExecutorConfig,
    pub logging: LoggingConfig,
    pub pipeline: PipelineConfig,
}

impl Settings {
    /// Значения по умолчанию, переопределённые окружением.
    pub fn load() -> IntrabusResult<Self> {
        Self::load_from(None)
    }

    /// Значения по умолчанию, затем файл (формат по расширению), затем
    /// окружение.
    pub fn load_from(path: Option<&Path>) -> IntrabusResult<Self> {
        let defaults = Config::try_from(&Settings::default()).map_err(invalid)?;
        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let cfg = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(invalid)
            .with_context(|| match path {
                Some(path) => format!("reading settings from {}", path.display()),
                None => "reading settings".to_string(),
            })?;

        let settings: Settings = cfg
            .try_deserialize()
            .map_err(invalid)
            .context("decoding settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> IntrabusResult<()> {
        if self.executor.queue_warn_depth == 0 {
            return Err(invalid_msg(
                "executor.queue_warn_depth must be greater than zero",
            ));
        }

        let pipeline = &self.pipeline;
        for topic in [&pipeline.first_topic, &pipeline.second_topic] {
            validate_topic_name(topic).context("pipeline topic")?;
        }
        if pipeline.first_topic == pipeline.second_topic {
            return Err(invalid_msg(format!(
                "pipeline topics must differ, both are '{}'",
                pipeline.first_topic
            )));
        }
        if pipeline.max_iterations == Some(0) {
            return Err(invalid_msg("pipeline.max_iterations must be at least 1"));
        }

        self.logging.validate().map_err(invalid_msg)
    }
}

fn invalid_msg(message: impl Into<String>) -> StackError {
    StackError::new(GenericError::new(StatusCode::ConfigInvalid, message))
}

fn invalid(err: ConfigError) -> StackError {
    invalid_msg(err.to_string())
}
