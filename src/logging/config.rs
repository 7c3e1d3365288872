use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Формат строк лога.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Однострочный человекочитаемый формат.
    #[default]
    Compact,
    /// Многострочный формат с полями и спанами.
    Pretty,
    /// Одна JSON-запись на событие.
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Compact => f.write_str("compact"),
            Self::Pretty => f.write_str("pretty"),
            Self::Json => f.write_str("json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "unknown log format '{other}', expected compact, pretty or json"
            )),
        }
    }
}

/// Настройки логирования.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Уровень (`info`) или полная директива `EnvFilter`
    /// (`intrabus=debug,warn`). `RUST_LOG` имеет приоритет.
    pub level: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_names: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            with_ansi: true,
            with_target: false,
            with_thread_names: false,
        }
    }
}

impl LoggingConfig {
    /// Директива фильтра из конфигурации.
    ///
    /// Голый уровень относится ко всем целям; строка с `=` или `,`
    /// передаётся как есть.
    pub fn build_filter_directive(&self) -> String {
        let level = self.level.trim();
        if level.is_empty() {
            "info".to_string()
        } else {
            level.to_ascii_lowercase()
        }
    }

    /// Проверяет, что директива разбирается `EnvFilter`.
    pub fn validate(&self) -> Result<(), String> {
        let directive = self.build_filter_directive();
        tracing_subscriber::EnvFilter::try_new(&directive)
            .map(|_| ())
            .map_err(|e| format!("invalid log level '{}': {e}", self.level))
    }
}
