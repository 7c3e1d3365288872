//! Демонстрация: два инкрементирующих узла гоняют одно сообщение по кругу.
//!
//! Адрес сообщения в логе остаётся одним и тем же на каждой пересылке.
//! Ctrl-C прерывает текущее ожидание и останавливает исполнитель.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;
use intrabus::{
    build_cycle, init_logging, log_error, spawn_shutdown_listener, Context, ErrorExt, Executor,
    IntrabusResult, LogFormat, ResultExt, Settings,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "intrabus")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Zero-copy intra-process pub/sub: cyclic pipeline demo", long_about = None)]
struct Cli {
    /// Файл настроек (toml, yaml, json)
    #[arg(short, long, env = "INTRABUS_CONFIG_FILE")]
    config: Option<PathBuf>,
    /// Значение первого сообщения
    #[arg(long)]
    initial_value: Option<i32>,
    /// Пауза каждого узла перед пересылкой, мс
    #[arg(long)]
    period_ms: Option<u64>,
    /// Остановиться после стольких инкрементов
    #[arg(long)]
    iterations: Option<u64>,
    /// Формат логов: compact, pretty, json
    #[arg(long)]
    log_format: Option<LogFormat>,
    /// Подробный вывод (debug)
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,
    /// Только warn/error
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    init_logging(&settings.logging).map_err(|e| anyhow!("initialising logging: {e}"))?;

    run(&settings).map_err(|err| {
        log_error(&err);
        anyhow::Error::new(err)
    })
}

fn load_settings(cli: &Cli) -> IntrabusResult<Settings> {
    let mut settings = Settings::load_from(cli.config.as_deref()).context("loading settings")?;

    if let Some(value) = cli.initial_value {
        settings.pipeline.initial_value = value;
    }
    if let Some(period) = cli.period_ms {
        settings.pipeline.period_ms = period;
    }
    if let Some(iterations) = cli.iterations {
        settings.pipeline.max_iterations = Some(iterations);
    }
    if let Some(format) = cli.log_format {
        settings.logging.format = format;
    }
    if cli.verbose {
        settings.logging.level = "debug".into();
    } else if cli.quiet {
        settings.logging.level = "warn".into();
    }

    settings.validate().context("invalid command line overrides")?;
    Ok(settings)
}

fn run(settings: &Settings) -> IntrabusResult<()> {
    let context = Context::new();
    spawn_shutdown_listener(context.shutdown_handle()).context("installing signal handlers")?;

    let cycle = build_cycle(&context, &settings.pipeline)?;
    let executor = Executor::with_config(&context, settings.executor);

    let outcome = cycle.seed(settings.pipeline.initial_value);
    if !outcome.is_delivered() {
        warn!(?outcome, "first message was not delivered");
    }
    cycle.register(&executor)?;

    match executor.spin() {
        Ok(()) => {}
        Err(err) if err.status_code().is_recoverable() => {
            info!(error = %err, "executor was stopped before the pipeline started");
        }
        Err(err) => return Err(err).context("spinning executor"),
    }

    let stats = executor.stats();
    info!(
        dispatched = stats.dispatched,
        dropped = stats.dropped_on_shutdown,
        max_queue_depth = stats.max_queue_depth,
        "pipeline finished"
    );
    Ok(())
}
