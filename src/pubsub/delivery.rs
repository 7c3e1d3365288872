use std::{fmt, sync::Arc};

use super::SubscriptionId;
use crate::runtime::NodeId;

/// Итог диспетчеризации одной доставки.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DispatchOutcome {
    /// Колбэк вызван, слот передан ему во владение.
    Delivered,
    /// Подписка уничтожена до диспетчеризации; слот освобождён.
    Orphaned,
}

/// Зафиксированная, ещё не выполненная передача одного слота одному
/// подписчику.
///
/// Живёт только в очереди исполнителя или в backlog узла. Тип сообщения
/// стёрт внутри `handler`, поэтому в одной очереди лежат доставки разных
/// топиков.
pub(crate) struct Delivery {
    topic: Arc<str>,
    node: NodeId,
    subscription: SubscriptionId,
    handler: Box<dyn FnOnce() -> DispatchOutcome>,
}

impl Delivery {
    pub(crate) fn new(
        topic: Arc<str>,
        node: NodeId,
        subscription: SubscriptionId,
        handler: impl FnOnce() -> DispatchOutcome + 'static,
    ) -> Self {
        Self {
            topic,
            node,
            subscription,
            handler: Box::new(handler),
        }
    }

    pub(crate) fn topic(&self) -> &Arc<str> {
        &self.topic
    }

    pub(crate) fn node(&self) -> NodeId {
        self.node
    }

    pub(crate) fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    /// Выполняет доставку: передаёт слот колбэку подписчика.
    pub(crate) fn dispatch(self) -> DispatchOutcome {
        (self.handler)()
    }
}

impl fmt::Debug for Delivery {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("topic", &self.topic)
            .field("node", &self.node)
            .field("subscription", &self.subscription)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;
    use crate::pubsub::TopicRegistry;

    /// Тест проверяет, что `dispatch` выполняет обработчик ровно один раз и
    /// возвращает его итог.
    #[test]
    fn test_dispatch_runs_handler() {
        let registry = TopicRegistry::new();
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();

        let delivery = Delivery::new(
            registry.intern("t"),
            NodeId::new(1),
            registry.next_subscription_id(),
            move || {
                c.set(c.get() + 1);
                DispatchOutcome::Delivered
            },
        );

        assert_eq!(&**delivery.topic(), "t");
        assert_eq!(delivery.dispatch(), DispatchOutcome::Delivered);
        assert_eq!(calls.get(), 1);
    }

    /// Тест проверяет, что сброс доставки без вызова освобождает захваченное
    /// сообщение.
    #[test]
    fn test_drop_releases_payload() {
        let registry = TopicRegistry::new();
        let payload = Rc::new(());
        let held = payload.clone();

        let delivery = Delivery::new(
            registry.intern("t"),
            NodeId::new(1),
            registry.next_subscription_id(),
            move || {
                drop(held);
                DispatchOutcome::Delivered
            },
        );
        assert_eq!(Rc::strong_count(&payload), 2);
        drop(delivery);
        assert_eq!(Rc::strong_count(&payload), 1);
    }
}
