use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::VecDeque,
    fmt,
    rc::{Rc, Weak},
    sync::Arc,
    time::Duration,
};

use intrabus_error::{NodeError, TopicError, WaitError};
use tracing::{debug, trace};

use super::{Context, ExecutorCore, ShutdownHandle};
use crate::pubsub::{
    AnySubscription, Delivery, Message, Publisher, Slot, Subscription, SubscriptionId,
};

/// Идентификатор узла, уникальный в пределах контекста.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Общая часть узла, на которую ссылаются его издатели и подписчики.
///
/// Решает, куда попадёт доставка: в очередь исполнителя, к которому узел
/// привязан, или в собственный backlog, если узел ещё не добавлен.
pub(crate) struct NodeShared {
    id: NodeId,
    name: Arc<str>,
    context: Context,
    executor: RefCell<Option<Weak<ExecutorCore>>>,
    backlog: RefCell<VecDeque<Delivery>>,
    alive: Cell<bool>,
}

impl NodeShared {
    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn context(&self) -> &Context {
        &self.context
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.alive.get()
    }

    /// Исполнитель, к которому привязан узел, если он ещё жив.
    pub(crate) fn attached_executor(&self) -> Option<Rc<ExecutorCore>> {
        self.executor.borrow().as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn attach(
        &self,
        core: &Rc<ExecutorCore>,
    ) {
        *self.executor.borrow_mut() = Some(Rc::downgrade(core));
    }

    pub(crate) fn detach(&self) {
        self.executor.borrow_mut().take();
    }

    /// Направляет доставку в очередь исполнителя или в backlog.
    pub(crate) fn route(
        &self,
        delivery: Delivery,
    ) {
        if !self.is_alive() {
            trace!(node = %self.name, topic = %delivery.topic(), "delivery to a destroyed node dropped");
            return;
        }
        match self.attached_executor() {
            Some(core) => core.enqueue(delivery),
            None => {
                trace!(node = %self.name, topic = %delivery.topic(), "delivery parked");
                self.backlog.borrow_mut().push_back(delivery);
            }
        }
    }

    /// Забирает все запаркованные доставки в порядке поступления.
    pub(crate) fn take_backlog(&self) -> VecDeque<Delivery> {
        std::mem::take(&mut *self.backlog.borrow_mut())
    }

    /// Возвращает доставки в backlog, сохраняя их порядок.
    pub(crate) fn park(
        &self,
        deliveries: VecDeque<Delivery>,
    ) {
        self.backlog.borrow_mut().extend(deliveries);
    }

    pub(crate) fn backlog_len(&self) -> usize {
        self.backlog.borrow().len()
    }

    /// Ожидание изнутри колбэка этого узла.
    ///
    /// Если узел обслуживается исполнителем, тот на время ожидания переходит
    /// в `Waiting`, а при отмене в `Cancelled`.
    pub(crate) fn sleep_for(
        &self,
        duration: Duration,
    ) -> Result<(), WaitError> {
        match self.attached_executor() {
            Some(core) => core.wait(duration),
            None => self.context.sleep_for(duration),
        }
    }
}

/// Узел: именованный владелец издателей и подписок.
///
/// Узел не запускает колбэки сам: их вызывает [`Executor`](crate::Executor),
/// в который узел добавлен. Сообщения для узла, ещё не добавленного в
/// исполнитель, копятся в его backlog и уходят в очередь при
/// [`Executor::add_node`](crate::Executor::add_node).
///
/// Уничтожение узла снимает все его подписки; доставки, ещё стоящие в
/// очереди, отбрасываются при диспетчеризации.
pub struct Node {
    shared: Rc<NodeShared>,
    publishers: Vec<Rc<dyn Any>>,
    subscriptions: Vec<Box<dyn AnySubscription>>,
}

impl Node {
    /// Создаёт узел в контексте. Имя непустое и без пробельных символов;
    /// уникальность не требуется.
    pub fn new(
        context: &Context,
        name: &str,
    ) -> Result<Self, NodeError> {
        validate_node_name(name)?;
        let id = context.next_node_id();
        debug!(node = name, id = %id, "node created");
        Ok(Self {
            shared: Rc::new(NodeShared {
                id,
                name: Arc::from(name),
                context: context.clone(),
                executor: RefCell::new(None),
                backlog: RefCell::new(VecDeque::new()),
                alive: Cell::new(true),
            }),
            publishers: Vec::new(),
            subscriptions: Vec::new(),
        })
    }

    pub fn id(&self) -> NodeId {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn context(&self) -> &Context {
        &self.shared.context
    }

    /// Создаёт издателя топика. Тип `M` должен совпадать с типом, под
    /// которым топик уже зарегистрирован.
    pub fn create_publisher<M: Message>(
        &mut self,
        topic: &str,
    ) -> Result<Publisher<M>, TopicError> {
        let publisher = Publisher::new(&self.shared, topic)?;
        self.publishers.push(publisher.registration());
        Ok(publisher)
    }

    /// Подписывает колбэк на топик.
    ///
    /// Колбэк получает каждый слот во владение. Вызывается только из
    /// исполнителя, по одному за раз.
    pub fn create_subscription<M, F>(
        &mut self,
        topic: &str,
        callback: F,
    ) -> Result<SubscriptionId, TopicError>
    where
        M: Message,
        F: FnMut(Slot<M>) + 'static,
    {
        let subscription = Subscription::<M>::new(&self.shared, topic, callback)?;
        let id = subscription.id();
        self.subscriptions.push(Box::new(subscription));
        Ok(id)
    }

    /// Снимает подписку. Возвращает `false`, если такой подписки у узла нет.
    pub fn destroy_subscription(
        &mut self,
        id: SubscriptionId,
    ) -> bool {
        let Some(idx) = self.subscriptions.iter().position(|s| s.id() == id) else {
            return false;
        };
        let subscription = self.subscriptions.remove(idx);
        debug!(node = %self.shared.name, topic = subscription.topic(), subscription = %id, "subscription destroyed");
        true
    }

    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        self.subscriptions.iter().map(|s| s.id()).collect()
    }

    /// Сколько сообщений получил колбэк подписки.
    pub fn received_count(
        &self,
        id: SubscriptionId,
    ) -> Option<u64> {
        self.subscriptions
            .iter()
            .find(|s| s.id() == id)
            .map(|s| s.received_count())
    }

    pub fn publisher_count(&self) -> usize {
        self.publishers.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Число доставок, ожидающих добавления узла в исполнитель.
    pub fn backlog_len(&self) -> usize {
        self.shared.backlog_len()
    }

    /// Привязан ли узел к живому исполнителю.
    pub fn is_attached(&self) -> bool {
        self.shared.attached_executor().is_some()
    }

    /// Лёгкая ручка узла для захвата в колбэки.
    pub fn handle(&self) -> NodeHandle {
        NodeHandle {
            shared: Rc::clone(&self.shared),
        }
    }

    pub(crate) fn shared(&self) -> &Rc<NodeShared> {
        &self.shared
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.shared.alive.set(false);
        self.subscriptions.clear();
        self.publishers.clear();
        if let Some(core) = self.shared.attached_executor() {
            core.forget_node(self.shared.id);
        }
        self.shared.detach();
        let parked = self.shared.take_backlog();
        debug!(
            node = %self.shared.name,
            dropped = parked.len(),
            "node destroyed"
        );
    }
}

impl fmt::Debug for Node {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("publishers", &self.publishers.len())
            .field("subscriptions", &self.subscriptions.len())
            .field("backlog", &self.shared.backlog_len())
            .finish()
    }
}

/// Ручка узла для использования внутри колбэков.
///
/// Не продлевает жизнь подпискам узла. Даёт доступ к отменяемому ожиданию
/// и к сигналу остановки.
#[derive(Clone)]
pub struct NodeHandle {
    shared: Rc<NodeShared>,
}

impl NodeHandle {
    pub fn id(&self) -> NodeId {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Жив ли узел (ещё не уничтожен).
    pub fn is_alive(&self) -> bool {
        self.shared.is_alive()
    }

    /// Засыпает на `duration`, прерываясь по запросу остановки.
    ///
    /// Возвращает `Err(WaitError::Cancelled)`, если остановку запросили до
    /// или во время ожидания.
    pub fn sleep_for(
        &self,
        duration: Duration,
    ) -> Result<(), WaitError> {
        self.shared.sleep_for(duration)
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shared.context.is_shutdown_requested()
    }

    pub fn request_shutdown(&self) {
        self.shared.context.request_shutdown()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shared.context.shutdown_handle()
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("NodeHandle")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .finish()
    }
}

/// Проверяет имя узла: непустое, без пробельных и управляющих символов.
pub fn validate_node_name(name: &str) -> Result<(), NodeError> {
    let invalid = |reason| {
        Err(NodeError::InvalidName {
            name: name.to_string(),
            reason,
        })
    };

    if name.is_empty() {
        return invalid("must not be empty");
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return invalid("contains whitespace or control characters");
    }
    Ok(())
}
