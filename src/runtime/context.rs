use std::{cell::Cell, fmt, rc::Rc, time::Duration};

use intrabus_error::WaitError;

use super::{ExecutorId, NodeId, ShutdownHandle};
use crate::pubsub::TopicRegistry;

struct ContextInner {
    registry: TopicRegistry,
    shutdown: ShutdownHandle,
    next_node: Cell<u64>,
    next_executor: Cell<u64>,
}

/// Контекст: реестр топиков, сигнал остановки и счётчики идентификаторов.
///
/// Узлы и исполнители создаются внутри одного контекста и не смешиваются
/// между контекстами. Клонирование дёшево и даёт ссылку на тот же контекст.
///
/// Контекст не `Send`: всё, кроме [`ShutdownHandle`], живёт в потоке
/// исполнителя.
#[derive(Clone)]
pub struct Context {
    inner: Rc<ContextInner>,
}

impl Context {
    pub fn new() -> Self {
        Self::with_shutdown(ShutdownHandle::new())
    }

    /// Контекст с внешним сигналом остановки, например общим для нескольких
    /// контекстов процесса.
    pub fn with_shutdown(shutdown: ShutdownHandle) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                registry: TopicRegistry::new(),
                shutdown,
                next_node: Cell::new(0),
                next_executor: Cell::new(0),
            }),
        }
    }

    pub fn registry(&self) -> &TopicRegistry {
        &self.inner.registry
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.inner.shutdown.clone()
    }

    pub fn request_shutdown(&self) {
        self.inner.shutdown.request_shutdown();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.inner.shutdown.is_shutdown_requested()
    }

    /// Ожидание вне колбэков (основной поток управления).
    pub fn sleep_for(
        &self,
        duration: Duration,
    ) -> Result<(), WaitError> {
        self.inner.shutdown.sleep_for(duration)
    }

    pub(crate) fn next_node_id(&self) -> NodeId {
        let id = self.inner.next_node.get() + 1;
        self.inner.next_node.set(id);
        NodeId::new(id)
    }

    pub(crate) fn next_executor_id(&self) -> ExecutorId {
        let id = self.inner.next_executor.get() + 1;
        self.inner.next_executor.set(id);
        ExecutorId::new(id)
    }

    pub(crate) fn same_as(
        &self,
        other: &Context,
    ) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Context")
            .field("registry", &self.inner.registry)
            .field("shutdown", &self.inner.shutdown)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет, что идентификаторы узлов монотонно растут.
    #[test]
    fn test_node_ids_are_unique() {
        let ctx = Context::new();
        let a = ctx.next_node_id();
        let b = ctx.next_node_id();
        assert_ne!(a, b);
    }

    /// Тест проверяет, что клоны ссылаются на один контекст, а новые на другой.
    #[test]
    fn test_same_as() {
        let ctx = Context::new();
        let clone = ctx.clone();
        assert!(ctx.same_as(&clone));
        assert!(!ctx.same_as(&Context::new()));
    }

    /// Тест проверяет, что общий сигнал остановки виден через все контексты.
    #[test]
    fn test_shared_shutdown() {
        let shutdown = ShutdownHandle::new();
        let a = Context::with_shutdown(shutdown.clone());
        let b = Context::with_shutdown(shutdown.clone());

        a.request_shutdown();
        assert!(b.is_shutdown_requested());
        assert!(b.sleep_for(Duration::from_secs(5)).is_err());
    }
}
