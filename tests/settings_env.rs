//! Настройки из переменных окружения. Тесты меняют окружение процесса,
//! поэтому выполняются последовательно.

use std::env;

use intrabus::{LogFormat, Settings};
use serial_test::serial;

fn clear_env() {
    for key in [
        "INTRABUS_PIPELINE__INITIAL_VALUE",
        "INTRABUS_PIPELINE__PERIOD_MS",
        "INTRABUS_PIPELINE__MAX_ITERATIONS",
        "INTRABUS_PIPELINE__FIRST_TOPIC",
        "INTRABUS_EXECUTOR__QUEUE_WARN_DEPTH",
        "INTRABUS_LOGGING__FORMAT",
        "INTRABUS_LOGGING__LEVEL",
    ] {
        env::remove_var(key);
    }
}

/// Тест проверяет, что без переменных окружения действуют значения по
/// умолчанию.
#[test]
#[serial]
fn test_defaults_without_env() {
    clear_env();
    let s = Settings::load().unwrap();
    assert_eq!(s, Settings::default());
}

/// Тест проверяет переопределение вложенных полей через `INTRABUS_*__*`.
#[test]
#[serial]
fn test_env_overrides() {
    clear_env();
    env::set_var("INTRABUS_PIPELINE__INITIAL_VALUE", "7");
    env::set_var("INTRABUS_PIPELINE__PERIOD_MS", "25");
    env::set_var("INTRABUS_PIPELINE__MAX_ITERATIONS", "3");
    env::set_var("INTRABUS_EXECUTOR__QUEUE_WARN_DEPTH", "128");
    env::set_var("INTRABUS_LOGGING__FORMAT", "json");

    let s = Settings::load();
    clear_env();
    let s = s.unwrap();

    assert_eq!(s.pipeline.initial_value, 7);
    assert_eq!(s.pipeline.period_ms, 25);
    assert_eq!(s.pipeline.max_iterations, Some(3));
    assert_eq!(s.executor.queue_warn_depth, 128);
    assert_eq!(s.logging.format, LogFormat::Json);
    assert_eq!(s.pipeline.first_topic, "topic1");
}

/// Тест проверяет, что некорректное значение из окружения отклоняется.
#[test]
#[serial]
fn test_env_invalid_topic_rejected() {
    clear_env();
    env::set_var("INTRABUS_PIPELINE__FIRST_TOPIC", "topic2");

    let res = Settings::load();
    clear_env();
    assert!(res.is_err());
}
