use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    fmt,
    rc::{Rc, Weak},
    time::{Duration, Instant},
};

use intrabus_error::{ExecutorError, WaitError};
use rustc_hash::FxHashMap;
use tracing::{debug, debug_span, info, trace, warn};

use super::{Context, Node, NodeId, NodeShared, ShutdownHandle};
use crate::{
    config::ExecutorConfig,
    pubsub::{Delivery, DispatchOutcome},
};

/// Предел для ожиданий, дедлайн которых не помещается в `Instant`.
const LONGEST_WAIT: Duration = Duration::from_secs(u32::MAX as u64);

/// Идентификатор исполнителя, уникальный в пределах контекста.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutorId(u64);

impl ExecutorId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ExecutorId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "executor#{}", self.0)
    }
}

/// Состояние исполнителя.
///
/// ```text
/// Idle ──dispatch──▶ Dispatching ──callback returns──▶ Idle
/// Dispatching ──sleep_for──▶ Waiting ──deadline──▶ Dispatching
///                            Waiting ──shutdown──▶ Cancelled
/// any ──shutdown observed by the loop──▶ Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    /// Очередь пуста или цикл ещё не запущен.
    Idle,
    /// Выполняется колбэк.
    Dispatching,
    /// Колбэк ждёт внутри `sleep_for` до `deadline`.
    Waiting { deadline: Instant },
    /// Ожидание колбэка прервано остановкой; колбэк дорабатывает.
    Cancelled,
    /// Цикл завершён, очередь сброшена. Терминальное состояние.
    Stopped,
}

impl ExecutorState {
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl fmt::Display for ExecutorState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Dispatching => f.write_str("dispatching"),
            Self::Waiting { .. } => f.write_str("waiting"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Stopped => f.write_str("stopped"),
        }
    }
}

/// Счётчики исполнителя.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorStats {
    /// Колбэков вызвано.
    pub dispatched: u64,
    /// Доставок отброшено, потому что подписка исчезла до диспетчеризации.
    pub orphaned: u64,
    /// Доставок сброшено при остановке, без вызова колбэка.
    pub dropped_on_shutdown: u64,
    /// Наибольшая наблюдавшаяся длина очереди.
    pub max_queue_depth: usize,
}

/// Разделяемое ядро исполнителя: очередь, состояние и привязанные узлы.
///
/// Узлы держат на него слабую ссылку и кладут доставки прямо в очередь.
pub(crate) struct ExecutorCore {
    id: ExecutorId,
    config: ExecutorConfig,
    shutdown: ShutdownHandle,
    state: Cell<ExecutorState>,
    queue: RefCell<VecDeque<Delivery>>,
    nodes: RefCell<FxHashMap<NodeId, Weak<NodeShared>>>,
    stats: Cell<ExecutorStats>,
    spinning: Cell<bool>,
    depth_warned: Cell<bool>,
}

impl ExecutorCore {
    /// Ставит доставку в конец очереди. После остановки доставка сбрасывается.
    pub(crate) fn enqueue(
        &self,
        delivery: Delivery,
    ) {
        if self.state.get().is_stopped() {
            trace!(executor = %self.id, topic = %delivery.topic(), "delivery after stop dropped");
            self.bump(|s| s.dropped_on_shutdown += 1);
            return;
        }

        let depth = {
            let mut queue = self.queue.borrow_mut();
            queue.push_back(delivery);
            queue.len()
        };
        self.bump(|s| s.max_queue_depth = s.max_queue_depth.max(depth));

        if depth > self.config.queue_warn_depth && !self.depth_warned.replace(true) {
            warn!(
                executor = %self.id,
                depth,
                threshold = self.config.queue_warn_depth,
                "dispatch queue is growing"
            );
        }
    }

    /// Отменяемое ожидание изнутри колбэка.
    pub(crate) fn wait(
        &self,
        duration: Duration,
    ) -> Result<(), WaitError> {
        let signal = self.shutdown.signal();
        let now = Instant::now();
        let deadline = now
            .checked_add(duration)
            .unwrap_or_else(|| now + LONGEST_WAIT);

        let previous = self.state.get();
        let tracked = !previous.is_stopped();
        if tracked {
            self.state.set(ExecutorState::Waiting { deadline });
        }
        trace!(executor = %self.id, ?duration, "callback waiting");

        let result = signal.wait_until(deadline);
        if tracked {
            match result {
                Ok(()) => self.state.set(previous),
                Err(WaitError::Cancelled) => {
                    debug!(executor = %self.id, "callback wait cancelled by shutdown");
                    self.state.set(ExecutorState::Cancelled);
                }
            }
        }
        result
    }

    pub(crate) fn forget_node(
        &self,
        id: NodeId,
    ) {
        self.nodes.borrow_mut().remove(&id);
    }

    fn pop(&self) -> Option<Delivery> {
        let mut queue = self.queue.borrow_mut();
        let delivery = queue.pop_front();
        if queue.len() <= self.config.queue_warn_depth / 2 {
            self.depth_warned.set(false);
        }
        delivery
    }

    fn dispatch(
        &self,
        delivery: Delivery,
    ) {
        let span = debug_span!(
            "dispatch",
            executor = %self.id,
            node = %delivery.node(),
            topic = %delivery.topic(),
            subscription = %delivery.subscription(),
        );
        let _enter = span.enter();

        self.state.set(ExecutorState::Dispatching);
        match delivery.dispatch() {
            DispatchOutcome::Delivered => self.bump(|s| s.dispatched += 1),
            DispatchOutcome::Orphaned => {
                debug!("subscription gone, delivery discarded");
                self.bump(|s| s.orphaned += 1);
            }
        }
        if self.state.get() == ExecutorState::Dispatching {
            self.state.set(ExecutorState::Idle);
        }
    }

    /// Останавливает исполнитель, если запрошена остановка.
    fn settle(&self) -> bool {
        if !self.shutdown.is_shutdown_requested() {
            return false;
        }
        if !self.state.get().is_stopped() {
            self.stop();
        }
        true
    }

    fn stop(&self) {
        let abandoned = std::mem::take(&mut *self.queue.borrow_mut());
        let dropped = abandoned.len();
        self.state.set(ExecutorState::Stopped);
        drop(abandoned);
        self.bump(|s| s.dropped_on_shutdown += dropped as u64);
        info!(
            executor = %self.id,
            dropped,
            dispatched = self.stats.get().dispatched,
            "executor stopped"
        );
    }

    fn bump(
        &self,
        update: impl FnOnce(&mut ExecutorStats),
    ) {
        let mut stats = self.stats.get();
        update(&mut stats);
        self.stats.set(stats);
    }
}

/// Сбрасывает флаг вращения при выходе из цикла, в том числе при панике
/// колбэка. Прерванная паникой диспетчеризация возвращает состояние в
/// `Idle`.
struct SpinGuard<'a> {
    core: &'a ExecutorCore,
}

impl Drop for SpinGuard<'_> {
    fn drop(&mut self) {
        if matches!(
            self.core.state.get(),
            ExecutorState::Dispatching | ExecutorState::Waiting { .. }
        ) {
            self.core.state.set(ExecutorState::Idle);
        }
        self.core.spinning.set(false);
    }
}

/// Однопоточный исполнитель колбэков.
///
/// Держит FIFO-очередь доставок для всех добавленных узлов и вызывает
/// колбэки строго по одному, в порядке публикации. Колбэк может публиковать:
/// новые доставки встают в конец очереди и выполняются после возврата
/// текущего колбэка, поэтому глубина стека не растёт с длиной цепочки
/// сообщений.
///
/// Остановка приходит через [`ShutdownHandle`] контекста, из любого потока.
/// Идущее в колбэке ожидание `sleep_for` прерывается сразу; исполнитель
/// дожидается возврата колбэка, сбрасывает оставшиеся доставки и переходит
/// в [`ExecutorState::Stopped`].
pub struct Executor {
    core: Rc<ExecutorCore>,
    context: Context,
}

impl Executor {
    pub fn new(context: &Context) -> Self {
        Self::with_config(context, ExecutorConfig::default())
    }

    pub fn with_config(
        context: &Context,
        config: ExecutorConfig,
    ) -> Self {
        let id = context.next_executor_id();
        debug!(executor = %id, ?config, "executor created");
        Self {
            core: Rc::new(ExecutorCore {
                id,
                queue: RefCell::new(VecDeque::with_capacity(config.initial_queue_capacity)),
                config,
                shutdown: context.shutdown_handle(),
                state: Cell::new(ExecutorState::Idle),
                nodes: RefCell::new(FxHashMap::default()),
                stats: Cell::new(ExecutorStats::default()),
                spinning: Cell::new(false),
                depth_warned: Cell::new(false),
            }),
            context: context.clone(),
        }
    }

    pub fn id(&self) -> ExecutorId {
        self.core.id
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn state(&self) -> ExecutorState {
        self.core.state.get()
    }

    pub fn stats(&self) -> ExecutorStats {
        self.core.stats.get()
    }

    pub fn queue_len(&self) -> usize {
        self.core.queue.borrow().len()
    }

    pub fn node_count(&self) -> usize {
        self.core.nodes.borrow().len()
    }

    /// Имена добавленных узлов, по возрастанию идентификатора.
    pub fn node_names(&self) -> Vec<String> {
        let nodes = self.core.nodes.borrow();
        let mut entries: Vec<_> = nodes
            .iter()
            .filter_map(|(id, node)| node.upgrade().map(|n| (*id, n.name().to_string())))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries.into_iter().map(|(_, name)| name).collect()
    }

    /// Добавляет узел: его колбэки будут вызываться этим исполнителем.
    ///
    /// Доставки, накопленные узлом до добавления, встают в очередь в порядке
    /// поступления. Повторное добавление того же узла ничего не меняет.
    pub fn add_node(
        &self,
        node: &Node,
    ) -> Result<(), ExecutorError> {
        if self.state().is_stopped() {
            return Err(ExecutorError::AlreadyStopped);
        }
        if !node.context().same_as(&self.context) {
            return Err(ExecutorError::ContextMismatch {
                node: node.name().to_string(),
            });
        }

        let shared = node.shared();
        match shared.attached_executor() {
            Some(core) if Rc::ptr_eq(&core, &self.core) => return Ok(()),
            Some(_) => {
                return Err(ExecutorError::NodeAlreadyRegistered {
                    node: node.name().to_string(),
                })
            }
            None => {}
        }

        shared.attach(&self.core);
        self.core
            .nodes
            .borrow_mut()
            .insert(shared.id(), Rc::downgrade(shared));

        let parked = shared.take_backlog();
        let released = parked.len();
        for delivery in parked {
            self.core.enqueue(delivery);
        }

        info!(
            executor = %self.core.id,
            node = %node.name(),
            released,
            "node added"
        );
        Ok(())
    }

    /// Отвязывает узел. Его доставки, ещё стоящие в очереди, возвращаются в
    /// backlog узла в исходном порядке.
    pub fn remove_node(
        &self,
        node: &Node,
    ) -> Result<(), ExecutorError> {
        let shared = node.shared();
        match shared.attached_executor() {
            Some(core) if Rc::ptr_eq(&core, &self.core) => {}
            _ => {
                return Err(ExecutorError::NodeNotRegistered {
                    node: node.name().to_string(),
                })
            }
        }

        shared.detach();
        self.core.forget_node(shared.id());

        let id = shared.id();
        let parked: VecDeque<Delivery> = {
            let mut queue = self.core.queue.borrow_mut();
            let (own, rest): (VecDeque<_>, VecDeque<_>) =
                queue.drain(..).partition(|d| d.node() == id);
            *queue = rest;
            own
        };
        let returned = parked.len();
        shared.park(parked);

        info!(
            executor = %self.core.id,
            node = %node.name(),
            returned,
            "node removed"
        );
        Ok(())
    }

    /// Крутит цикл диспетчеризации до запроса остановки.
    ///
    /// Пустая очередь блокирует поток до остановки: колбэки могут
    /// публиковать только из этого потока, а другие потоки умеют лишь
    /// запрашивать остановку.
    pub fn spin(&self) -> Result<(), ExecutorError> {
        let _guard = self.enter()?;
        info!(
            executor = %self.core.id,
            nodes = self.node_count(),
            queued = self.queue_len(),
            "executor spinning"
        );

        loop {
            if self.core.settle() {
                break;
            }
            match self.core.pop() {
                Some(delivery) => self.core.dispatch(delivery),
                None => {
                    self.core.state.set(ExecutorState::Idle);
                    trace!(executor = %self.core.id, "queue drained, waiting for shutdown");
                    self.core.shutdown.wait_for_shutdown();
                }
            }
        }
        Ok(())
    }

    /// Выполняет не более одной доставки.
    ///
    /// Возвращает `true`, если колбэк (или отброс осиротевшей доставки)
    /// был выполнен.
    pub fn spin_once(&self) -> Result<bool, ExecutorError> {
        let _guard = self.enter()?;
        if self.core.settle() {
            return Ok(false);
        }
        let Some(delivery) = self.core.pop() else {
            return Ok(false);
        };
        self.core.dispatch(delivery);
        self.core.settle();
        Ok(true)
    }

    /// Выполняет доставки, стоявшие в очереди на момент вызова. Новые
    /// доставки, поставленные колбэками, ждут следующего вызова.
    pub fn spin_some(&self) -> Result<usize, ExecutorError> {
        let _guard = self.enter()?;
        let budget = self.queue_len();
        let mut done = 0;
        while done < budget {
            if self.core.settle() {
                return Ok(done);
            }
            let Some(delivery) = self.core.pop() else {
                break;
            };
            self.core.dispatch(delivery);
            done += 1;
        }
        self.core.settle();
        Ok(done)
    }

    /// Запрашивает остановку всего контекста.
    pub fn request_shutdown(&self) {
        self.core.shutdown.request_shutdown();
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.core.shutdown.clone()
    }

    fn enter(&self) -> Result<SpinGuard<'_>, ExecutorError> {
        if self.state().is_stopped() {
            return Err(ExecutorError::AlreadyStopped);
        }
        if self.core.spinning.replace(true) {
            return Err(ExecutorError::AlreadySpinning);
        }
        self.core.state.set(ExecutorState::Idle);
        Ok(SpinGuard { core: &self.core })
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        let queued = self.queue_len();
        for node in self.core.nodes.borrow().values().filter_map(Weak::upgrade) {
            node.detach();
        }
        debug!(
            executor = %self.core.id,
            queued,
            state = %self.state(),
            "executor dropped"
        );
    }
}

impl fmt::Debug for Executor {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Executor")
            .field("id", &self.core.id)
            .field("state", &self.state())
            .field("queue_len", &self.queue_len())
            .field("nodes", &self.node_count())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        panic::{catch_unwind, AssertUnwindSafe},
        thread,
        time::Instant,
    };

    use super::*;

    fn recorder(
        node: &mut Node,
        topic: &str,
    ) -> Rc<RefCell<Vec<i32>>> {
        let seen: Rc<RefCell<Vec<i32>>> = Rc::default();
        let s = seen.clone();
        node.create_subscription::<i32, _>(topic, move |slot| {
            s.borrow_mut().push(*slot.get().unwrap())
        })
        .unwrap();
        seen
    }

    /// Тест проверяет FIFO-порядок диспетчеризации.
    #[test]
    fn test_fifo_dispatch() {
        let ctx = Context::new();
        let mut node = Node::new(&ctx, "listener").unwrap();
        let seen = recorder(&mut node, "chatter");
        let publisher = node.create_publisher::<i32>("chatter").unwrap();

        let executor = Executor::new(&ctx);
        executor.add_node(&node).unwrap();
        for i in 0..5 {
            publisher.publish_value(i);
        }
        assert_eq!(executor.queue_len(), 5);
        assert_eq!(executor.spin_some().unwrap(), 5);
        assert_eq!(*seen.borrow(), vec![0, 1, 2, 3, 4]);
        assert_eq!(executor.stats().dispatched, 5);
        assert_eq!(executor.stats().max_queue_depth, 5);
    }

    /// Тест проверяет, что `spin_some` не выполняет доставки, поставленные
    /// во время вызова.
    #[test]
    fn test_spin_some_budget() {
        let ctx = Context::new();
        let mut node = Node::new(&ctx, "echo").unwrap();
        let publisher = node.create_publisher::<i32>("loop").unwrap();
        let p = publisher.clone();
        node.create_subscription::<i32, _>("loop", move |slot| {
            p.publish(slot);
        })
        .unwrap();

        let executor = Executor::new(&ctx);
        executor.add_node(&node).unwrap();
        publisher.publish_value(1);

        assert_eq!(executor.spin_some().unwrap(), 1);
        assert_eq!(executor.queue_len(), 1);
        assert!(executor.spin_once().unwrap());
        assert_eq!(executor.queue_len(), 1);
    }

    /// Тест проверяет, что доставки до добавления узла не теряются и идут
    /// в исходном порядке.
    #[test]
    fn test_backlog_released_on_add() {
        let ctx = Context::new();
        let mut node = Node::new(&ctx, "late").unwrap();
        let seen = recorder(&mut node, "chatter");
        let publisher = node.create_publisher::<i32>("chatter").unwrap();

        publisher.publish_value(1);
        publisher.publish_value(2);

        let executor = Executor::new(&ctx);
        executor.add_node(&node).unwrap();
        publisher.publish_value(3);

        assert_eq!(node.backlog_len(), 0);
        assert_eq!(executor.spin_some().unwrap(), 3);
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
    }

    /// Тест проверяет, что удаление узла возвращает его доставки в backlog.
    #[test]
    fn test_remove_node_parks_queued() {
        let ctx = Context::new();
        let mut a = Node::new(&ctx, "a").unwrap();
        let mut b = Node::new(&ctx, "b").unwrap();
        let seen_a = recorder(&mut a, "x");
        let seen_b = recorder(&mut b, "y");
        let pa = a.create_publisher::<i32>("x").unwrap();
        let pb = b.create_publisher::<i32>("y").unwrap();

        let executor = Executor::new(&ctx);
        executor.add_node(&a).unwrap();
        executor.add_node(&b).unwrap();
        pa.publish_value(1);
        pb.publish_value(10);
        pa.publish_value(2);

        executor.remove_node(&a).unwrap();
        assert_eq!(a.backlog_len(), 2);
        assert_eq!(executor.queue_len(), 1);
        assert_eq!(executor.node_names(), vec!["b".to_string()]);

        executor.spin_some().unwrap();
        assert_eq!(*seen_b.borrow(), vec![10]);
        assert!(seen_a.borrow().is_empty());

        executor.add_node(&a).unwrap();
        executor.spin_some().unwrap();
        assert_eq!(*seen_a.borrow(), vec![1, 2]);

        assert!(matches!(
            Executor::new(&ctx).remove_node(&a),
            Err(ExecutorError::NodeNotRegistered { .. })
        ));
    }

    /// Тест проверяет ошибки регистрации узла.
    #[test]
    fn test_add_node_errors() {
        let ctx = Context::new();
        let node = Node::new(&ctx, "n").unwrap();
        let first = Executor::new(&ctx);
        let second = Executor::new(&ctx);

        first.add_node(&node).unwrap();
        first.add_node(&node).unwrap();
        assert_eq!(first.node_count(), 1);
        assert!(matches!(
            second.add_node(&node),
            Err(ExecutorError::NodeAlreadyRegistered { .. })
        ));

        let foreign = Executor::new(&Context::new());
        assert!(matches!(
            foreign.add_node(&node),
            Err(ExecutorError::ContextMismatch { .. })
        ));
    }

    /// Тест проверяет, что доставка уничтоженной подписке не вызывает колбэк.
    #[test]
    fn test_orphaned_delivery_counted() {
        let ctx = Context::new();
        let mut node = Node::new(&ctx, "n").unwrap();
        let seen = recorder(&mut node, "t");
        let publisher = node.create_publisher::<i32>("t").unwrap();
        let executor = Executor::new(&ctx);
        executor.add_node(&node).unwrap();

        publisher.publish_value(1);
        let id = node.subscription_ids()[0];
        node.destroy_subscription(id);

        assert!(executor.spin_once().unwrap());
        assert!(seen.borrow().is_empty());
        assert_eq!(executor.stats().orphaned, 1);
        assert_eq!(executor.stats().dispatched, 0);
    }

    /// Тест проверяет, что после остановки очередь сброшена, а повторный
    /// запуск даёт `AlreadyStopped`.
    #[test]
    fn test_stop_drops_queue() {
        let ctx = Context::new();
        let mut node = Node::new(&ctx, "n").unwrap();
        let seen = recorder(&mut node, "t");
        let publisher = node.create_publisher::<i32>("t").unwrap();
        let executor = Executor::new(&ctx);
        executor.add_node(&node).unwrap();

        publisher.publish_value(1);
        publisher.publish_value(2);
        executor.request_shutdown();

        executor.spin().unwrap();
        assert_eq!(executor.state(), ExecutorState::Stopped);
        assert!(seen.borrow().is_empty());
        assert_eq!(executor.stats().dropped_on_shutdown, 2);
        assert_eq!(executor.spin(), Err(ExecutorError::AlreadyStopped));
        assert_eq!(executor.spin_once(), Err(ExecutorError::AlreadyStopped));

        publisher.publish_value(3);
        assert_eq!(executor.queue_len(), 0);
        assert_eq!(executor.stats().dropped_on_shutdown, 3);
    }

    /// Тест проверяет, что вложенный запуск из колбэка отклоняется.
    #[test]
    fn test_nested_spin_rejected() {
        let ctx = Context::new();
        let mut node = Node::new(&ctx, "n").unwrap();
        let executor = Rc::new(Executor::new(&ctx));
        let nested: Rc<Cell<Option<Result<bool, ExecutorError>>>> = Rc::default();

        let weak = Rc::downgrade(&executor);
        let n = nested.clone();
        node.create_subscription::<i32, _>("t", move |_| {
            if let Some(executor) = weak.upgrade() {
                n.set(Some(executor.spin_once()));
            }
        })
        .unwrap();
        let publisher = node.create_publisher::<i32>("t").unwrap();
        executor.add_node(&node).unwrap();

        publisher.publish_value(1);
        executor.spin_once().unwrap();
        assert_eq!(nested.take(), Some(Err(ExecutorError::AlreadySpinning)));
    }

    /// Тест проверяет переходы состояния при ожидании в колбэке.
    #[test]
    fn test_wait_states() {
        let ctx = Context::new();
        let mut node = Node::new(&ctx, "sleeper").unwrap();
        let handle = node.handle();
        let executor = Rc::new(Executor::new(&ctx));
        let observed: Rc<RefCell<Vec<ExecutorState>>> = Rc::default();

        let weak = Rc::downgrade(&executor);
        let o = observed.clone();
        node.create_subscription::<i32, _>("t", move |_| {
            let Some(executor) = weak.upgrade() else {
                return;
            };
            o.borrow_mut().push(executor.state());
            let _ = handle.sleep_for(Duration::from_millis(5));
            o.borrow_mut().push(executor.state());
        })
        .unwrap();
        let publisher = node.create_publisher::<i32>("t").unwrap();
        executor.add_node(&node).unwrap();

        publisher.publish_value(1);
        executor.spin_once().unwrap();
        assert_eq!(
            *observed.borrow(),
            vec![ExecutorState::Dispatching, ExecutorState::Dispatching]
        );
        assert_eq!(executor.state(), ExecutorState::Idle);
    }

    /// Тест проверяет, что остановка из другого потока прерывает ожидание в
    /// колбэке и останавливает цикл.
    #[test]
    fn test_cancel_wait_from_other_thread() {
        let ctx = Context::new();
        let mut node = Node::new(&ctx, "sleeper").unwrap();
        let handle = node.handle();
        let executor = Rc::new(Executor::new(&ctx));
        let after_wait: Rc<Cell<Option<ExecutorState>>> = Rc::default();

        let weak = Rc::downgrade(&executor);
        let a = after_wait.clone();
        node.create_subscription::<i32, _>("t", move |_| {
            let res = handle.sleep_for(Duration::from_secs(5));
            assert_eq!(res, Err(WaitError::Cancelled));
            a.set(weak.upgrade().map(|e| e.state()));
        })
        .unwrap();
        let publisher = node.create_publisher::<i32>("t").unwrap();
        executor.add_node(&node).unwrap();
        publisher.publish_value(1);
        publisher.publish_value(2);

        let remote = executor.shutdown_handle();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            remote.request_shutdown();
        });

        let start = Instant::now();
        executor.spin().unwrap();
        stopper.join().unwrap();

        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(after_wait.get(), Some(ExecutorState::Cancelled));
        assert_eq!(executor.state(), ExecutorState::Stopped);
        assert_eq!(executor.stats().dispatched, 1);
        assert_eq!(executor.stats().dropped_on_shutdown, 1);
    }

    /// Тест проверяет, что ожидание с непредставимым дедлайном тоже проходит
    /// через состояния `Waiting` и `Cancelled`.
    #[test]
    fn test_unbounded_wait_is_tracked() {
        let ctx = Context::new();
        let mut node = Node::new(&ctx, "sleeper").unwrap();
        let handle = node.handle();
        let executor = Rc::new(Executor::new(&ctx));
        let after_wait: Rc<Cell<Option<ExecutorState>>> = Rc::default();

        let weak = Rc::downgrade(&executor);
        let a = after_wait.clone();
        node.create_subscription::<i32, _>("t", move |_| {
            let res = handle.sleep_for(Duration::MAX);
            assert_eq!(res, Err(WaitError::Cancelled));
            a.set(weak.upgrade().map(|e| e.state()));
        })
        .unwrap();
        let publisher = node.create_publisher::<i32>("t").unwrap();
        executor.add_node(&node).unwrap();
        publisher.publish_value(1);

        let remote = executor.shutdown_handle();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            remote.request_shutdown();
        });

        executor.spin().unwrap();
        stopper.join().unwrap();

        assert_eq!(after_wait.get(), Some(ExecutorState::Cancelled));
        assert_eq!(executor.state(), ExecutorState::Stopped);
    }

    /// Тест проверяет, что паника колбэка не оставляет исполнитель в
    /// `Dispatching` и не блокирует следующий вызов.
    #[test]
    fn test_panicking_callback_resets_state() {
        let ctx = Context::new();
        let mut node = Node::new(&ctx, "fragile").unwrap();
        let seen: Rc<RefCell<Vec<i32>>> = Rc::default();
        let s = seen.clone();
        node.create_subscription::<i32, _>("t", move |slot| {
            let value = *slot.get().unwrap();
            if value == 1 {
                panic!("callback failed on {value}");
            }
            s.borrow_mut().push(value);
        })
        .unwrap();
        let publisher = node.create_publisher::<i32>("t").unwrap();
        let executor = Executor::new(&ctx);
        executor.add_node(&node).unwrap();
        publisher.publish_value(1);
        publisher.publish_value(2);

        let result = catch_unwind(AssertUnwindSafe(|| executor.spin_once()));
        assert!(result.is_err());
        assert_eq!(executor.state(), ExecutorState::Idle);
        assert_eq!(executor.queue_len(), 1);

        assert_eq!(executor.spin_once(), Ok(true));
        assert_eq!(*seen.borrow(), vec![2]);
        assert_eq!(executor.state(), ExecutorState::Idle);
    }

    /// Тест проверяет, что узел переживает исполнитель и снова паркует
    /// доставки.
    #[test]
    fn test_node_outlives_executor() {
        let ctx = Context::new();
        let mut node = Node::new(&ctx, "n").unwrap();
        recorder(&mut node, "t");
        let publisher = node.create_publisher::<i32>("t").unwrap();

        let executor = Executor::new(&ctx);
        executor.add_node(&node).unwrap();
        drop(executor);

        assert!(!node.is_attached());
        publisher.publish_value(1);
        assert_eq!(node.backlog_len(), 1);
    }
}
