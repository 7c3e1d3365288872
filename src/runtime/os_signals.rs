//! Мост от сигналов ОС к [`ShutdownHandle`].
//!
//! Обработчик сигнала сам по себе ничего не делает с исполнителем: сигналы
//! ловит фоновый поток с однопоточным рантаймом tokio и вызывает
//! [`ShutdownHandle::request_shutdown`] уже в обычном контексте.
//!
//! ## Unix
//! Обрабатываются SIGINT, SIGTERM и SIGQUIT, плюс `ctrl_c` как запасной путь.
//!
//! ## Остальные платформы
//! Только `ctrl_c`.

use std::{io, thread};

use tracing::{error, info};

use super::ShutdownHandle;

#[cfg(unix)]
async fn wait_for_termination_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = tokio::signal::ctrl_c() => "ctrl-c",
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    Ok(name)
}

#[cfg(not(unix))]
async fn wait_for_termination_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}

/// Запускает фоновый поток, который переводит первый сигнал завершения в
/// запрос остановки.
///
/// Поток отсоединяется; он завершается после первого сигнала или вместе с
/// процессом.
pub fn spawn_shutdown_listener(handle: ShutdownHandle) -> io::Result<thread::JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()?;

    thread::Builder::new()
        .name("intrabus-signals".into())
        .spawn(move || {
            runtime.block_on(async move {
                match wait_for_termination_signal().await {
                    Ok(signal) => {
                        info!(signal, "termination signal received");
                        handle.request_shutdown();
                    }
                    Err(err) => error!(error = %err, "failed to install signal handlers"),
                }
            })
        })
}
