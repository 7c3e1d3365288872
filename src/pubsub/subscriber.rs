use std::{
    cell::{Cell, RefCell},
    rc::Rc,
    sync::Arc,
};

use intrabus_error::TopicError;
use tracing::{trace, warn};

use super::{validate_topic_name, Delivery, DispatchOutcome, Message, Slot, SubscriptionId};
use crate::runtime::NodeShared;

type Callback<M> = Box<dyn FnMut(Slot<M>)>;

/// Состояние подписки, на которое ссылается реестр топиков.
///
/// Реестр держит сильную ссылку, доставки в очереди держат только слабую:
/// уничтоженная подписка не продлевает себе жизнь через очередь.
pub(crate) struct SubscriberShared<M: Message> {
    id: SubscriptionId,
    topic: Arc<str>,
    node: Rc<NodeShared>,
    callback: RefCell<Callback<M>>,
    received: Cell<u64>,
}

impl<M: Message> SubscriberShared<M> {
    /// Фиксирует доставку слота этому подписчику и отдаёт её узлу.
    pub(crate) fn enqueue(
        self: &Rc<Self>,
        slot: Slot<M>,
    ) {
        let target = Rc::downgrade(self);
        let delivery = Delivery::new(
            self.topic.clone(),
            self.node.id(),
            self.id,
            move || match target.upgrade() {
                Some(subscriber) => subscriber.invoke(slot),
                None => DispatchOutcome::Orphaned,
            },
        );
        self.node.route(delivery);
    }

    fn invoke(
        &self,
        slot: Slot<M>,
    ) -> DispatchOutcome {
        let Ok(mut callback) = self.callback.try_borrow_mut() else {
            warn!(
                topic = %self.topic,
                subscription = %self.id,
                "re-entrant delivery to a running callback, message dropped"
            );
            return DispatchOutcome::Orphaned;
        };
        self.received.set(self.received.get() + 1);
        if let Ok(identity) = slot.identity() {
            trace!(topic = %self.topic, subscription = %self.id, %identity, "invoking callback");
        }
        (callback)(slot);
        DispatchOutcome::Delivered
    }
}

/// Владеющая ручка подписки, хранится в узле.
///
/// При уничтожении снимает подписчика с топика. Доставки, уже стоящие в
/// очереди, после этого отбрасываются без вызова колбэка.
pub(crate) struct Subscription<M: Message> {
    shared: Rc<SubscriberShared<M>>,
}

impl<M: Message> Subscription<M> {
    pub(crate) fn new(
        node: &Rc<NodeShared>,
        topic: &str,
        callback: impl FnMut(Slot<M>) + 'static,
    ) -> Result<Self, TopicError> {
        let registry = node.context().registry();
        validate_topic_name(topic)?;
        let name = registry.intern(topic);
        let id = registry.next_subscription_id();
        let shared = Rc::new(SubscriberShared {
            id,
            topic: name.clone(),
            node: Rc::clone(node),
            callback: RefCell::new(Box::new(callback)),
            received: Cell::new(0),
        });
        registry.register_subscriber::<M>(&name, id, shared.clone())?;
        Ok(Self { shared })
    }
}

impl<M: Message> Drop for Subscription<M> {
    fn drop(&mut self) {
        self.shared
            .node
            .context()
            .registry()
            .deregister_subscriber(&self.shared.topic, self.shared.id);
    }
}

/// Стёртый по типу сообщения интерфейс подписки для хранения в узле.
pub(crate) trait AnySubscription {
    fn id(&self) -> SubscriptionId;

    fn topic(&self) -> &str;

    fn received_count(&self) -> u64;
}

impl<M: Message> AnySubscription for Subscription<M> {
    fn id(&self) -> SubscriptionId {
        self.shared.id
    }

    fn topic(&self) -> &str {
        &self.shared.topic
    }

    fn received_count(&self) -> u64 {
        self.shared.received.get()
    }
}
