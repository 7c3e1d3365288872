use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use intrabus_error::WaitError;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info};

/// Сигнал остановки, общий для контекста.
///
/// Флаг выставляется один раз и больше не сбрасывается. Ожидающие потоки
/// будятся через condvar; проверка флага под мьютексом исключает потерю
/// пробуждения между проверкой и засыпанием.
#[derive(Default)]
pub(crate) struct ShutdownSignal {
    requested: AtomicBool,
    lock: Mutex<()>,
    cvar: Condvar,
}

impl ShutdownSignal {
    pub(crate) fn request(&self) -> bool {
        let first = !self.requested.swap(true, Ordering::AcqRel);
        let _guard = self.lock.lock();
        self.cvar.notify_all();
        first
    }

    pub(crate) fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Ограниченное по времени ожидание, прерываемое сигналом остановки.
    pub(crate) fn wait_timeout(
        &self,
        timeout: Duration,
    ) -> Result<(), WaitError> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return Err(WaitError::Cancelled);
        };
        self.wait_until(deadline)
    }

    pub(crate) fn wait_until(
        &self,
        deadline: Instant,
    ) -> Result<(), WaitError> {
        let mut guard = self.lock.lock();
        loop {
            if self.is_requested() {
                return Err(WaitError::Cancelled);
            }
            if self.cvar.wait_until(&mut guard, deadline).timed_out() {
                return if self.is_requested() {
                    Err(WaitError::Cancelled)
                } else {
                    Ok(())
                };
            }
        }
    }

    /// Блокирует до запроса остановки.
    pub(crate) fn wait(&self) {
        let mut guard = self.lock.lock();
        while !self.is_requested() {
            self.cvar.wait(&mut guard);
        }
    }
}

/// Потокобезопасная ручка сигнала остановки.
///
/// Единственный объект ядра, который можно передавать в другие потоки:
/// обработчик ОС-сигналов или тестовый поток вызывает
/// [`ShutdownHandle::request_shutdown`], а исполнитель и ожидающие колбэки
/// наблюдают запрос.
#[derive(Clone, Default)]
pub struct ShutdownHandle {
    signal: Arc<ShutdownSignal>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Запрашивает остановку. Повторный вызов ничего не меняет.
    pub fn request_shutdown(&self) {
        if self.signal.request() {
            info!("shutdown requested");
        } else {
            debug!("shutdown already requested");
        }
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.signal.is_requested()
    }

    /// Засыпает на `duration`; возвращает `Err(WaitError::Cancelled)`, если
    /// остановку запросили раньше.
    pub fn sleep_for(
        &self,
        duration: Duration,
    ) -> Result<(), WaitError> {
        self.signal.wait_timeout(duration)
    }

    /// Блокирует текущий поток до запроса остановки.
    pub fn wait_for_shutdown(&self) {
        self.signal.wait()
    }

    pub(crate) fn signal(&self) -> &ShutdownSignal {
        &self.signal
    }
}

impl fmt::Debug for ShutdownHandle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ShutdownHandle")
            .field("requested", &self.is_shutdown_requested())
            .finish()
    }
}
