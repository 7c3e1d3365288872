use std::{
    any::{type_name, Any, TypeId},
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
    sync::Arc,
};

use intrabus_error::TopicError;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

/// Идентификатор подписки, уникальный в пределах реестра.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Состояние одного топика.
struct TopicEntry {
    type_id: TypeId,
    type_name: &'static str,
    /// Подписчики в порядке регистрации.
    subscribers: Vec<(SubscriptionId, Rc<dyn Any>)>,
    publishers: usize,
}

impl TopicEntry {
    fn is_unused(&self) -> bool {
        self.subscribers.is_empty() && self.publishers == 0
    }
}

/// Реестр топиков: имя → тип сообщения, упорядоченный список подписчиков и
/// число издателей.
///
/// Принадлежит [`Context`](crate::Context) и передаётся узлам, издателям и
/// подписчикам явно. Вся работа с ним идёт из потока исполнителя, поэтому
/// внутри `RefCell`, а не блокировки. Заимствования никогда не удерживаются
/// во время вызова пользовательских колбэков.
///
/// Топик создаётся лениво при первой регистрации издателя или подписчика и
/// удаляется, когда уходит последний из них. Ключ записи служит общим
/// `Arc<str>` имени для всех участников топика и освобождается вместе с ней.
#[derive(Default)]
pub struct TopicRegistry {
    topics: RefCell<FxHashMap<Arc<str>, TopicEntry>>,
    next_subscription: Cell<u64>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Имя топика как `Arc<str>`: ключ существующей записи либо новая
    /// строка, если топика ещё нет. Реестр её не запоминает.
    pub(crate) fn intern(
        &self,
        name: &str,
    ) -> Arc<str> {
        self.topics
            .borrow()
            .get_key_value(name)
            .map_or_else(|| Arc::from(name), |(key, _)| key.clone())
    }

    pub(crate) fn next_subscription_id(&self) -> SubscriptionId {
        let id = self.next_subscription.get() + 1;
        self.next_subscription.set(id);
        SubscriptionId(id)
    }

    /// Регистрирует издателя с типом сообщения `M`.
    pub(crate) fn register_publisher<M: 'static>(
        &self,
        topic: &str,
    ) -> Result<Arc<str>, TopicError> {
        validate_topic_name(topic)?;
        let name = self.intern(topic);
        let mut topics = self.topics.borrow_mut();
        let entry = Self::entry_for::<M>(&mut topics, &name)?;
        entry.publishers += 1;
        debug!(topic = %name, publishers = entry.publishers, "publisher registered");
        Ok(name)
    }

    pub(crate) fn deregister_publisher(
        &self,
        topic: &str,
    ) {
        let mut topics = self.topics.borrow_mut();
        let Some(entry) = topics.get_mut(topic) else {
            return;
        };
        entry.publishers = entry.publishers.saturating_sub(1);
        debug!(topic, publishers = entry.publishers, "publisher deregistered");
        if entry.is_unused() {
            topics.remove(topic);
            trace!(topic, "topic removed");
        }
    }

    /// Добавляет подписчика в конец списка топика.
    ///
    /// Имя берётся из [`intern`](Self::intern), чтобы подписчик и запись
    /// делили одну строку. Повторная регистрация той же подписки ничего не
    /// меняет.
    pub(crate) fn register_subscriber<M: 'static>(
        &self,
        name: &Arc<str>,
        id: SubscriptionId,
        subscriber: Rc<dyn Any>,
    ) -> Result<(), TopicError> {
        validate_topic_name(name)?;
        let mut topics = self.topics.borrow_mut();
        let entry = Self::entry_for::<M>(&mut topics, name)?;
        if entry.subscribers.iter().any(|(existing, _)| *existing == id) {
            return Ok(());
        }
        entry.subscribers.push((id, subscriber));
        debug!(
            topic = %name,
            subscription = %id,
            subscribers = entry.subscribers.len(),
            "subscriber registered"
        );
        Ok(())
    }

    /// Удаляет подписчика. Отсутствующую подписку игнорирует.
    pub(crate) fn deregister_subscriber(
        &self,
        topic: &str,
        id: SubscriptionId,
    ) {
        // Удалённый подписчик освобождается после снятия заимствования:
        // его Drop может снова обратиться к реестру.
        let removed = {
            let mut topics = self.topics.borrow_mut();
            let Some(entry) = topics.get_mut(topic) else {
                return;
            };
            let removed = entry
                .subscribers
                .iter()
                .position(|(existing, _)| *existing == id)
                .map(|idx| entry.subscribers.remove(idx));
            debug!(
                topic,
                subscription = %id,
                subscribers = entry.subscribers.len(),
                "subscriber deregistered"
            );
            if entry.is_unused() {
                topics.remove(topic);
                trace!(topic, "topic removed");
            }
            removed
        };
        drop(removed);
    }

    /// Снимок подписчиков топика на момент вызова, в порядке регистрации.
    ///
    /// Копируются ссылки, а не сообщения.
    pub(crate) fn snapshot_subscribers<T: Any>(
        &self,
        topic: &str,
    ) -> Vec<Rc<T>> {
        let topics = self.topics.borrow();
        let Some(entry) = topics.get(topic) else {
            return Vec::new();
        };
        entry
            .subscribers
            .iter()
            .filter_map(|(_, sub)| Rc::clone(sub).downcast::<T>().ok())
            .collect()
    }

    pub fn contains(
        &self,
        topic: &str,
    ) -> bool {
        self.topics.borrow().contains_key(topic)
    }

    pub fn subscriber_count(
        &self,
        topic: &str,
    ) -> usize {
        self.topics
            .borrow()
            .get(topic)
            .map_or(0, |e| e.subscribers.len())
    }

    pub fn publisher_count(
        &self,
        topic: &str,
    ) -> usize {
        self.topics.borrow().get(topic).map_or(0, |e| e.publishers)
    }

    /// Имя типа сообщения, закреплённого за топиком.
    pub fn topic_type(
        &self,
        topic: &str,
    ) -> Option<&'static str> {
        self.topics.borrow().get(topic).map(|e| e.type_name)
    }

    /// Имена активных топиков в лексикографическом порядке.
    pub fn topic_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .topics
            .borrow()
            .keys()
            .map(|k| k.to_string())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.topics.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.borrow().is_empty()
    }

    /// Находит или создаёт запись топика, проверяя тип сообщения. Имя уже
    /// проверено вызывающим.
    fn entry_for<'a, M: 'static>(
        topics: &'a mut FxHashMap<Arc<str>, TopicEntry>,
        name: &Arc<str>,
    ) -> Result<&'a mut TopicEntry, TopicError> {
        let entry = topics.entry(name.clone()).or_insert_with(|| {
            trace!(topic = %name, message_type = type_name::<M>(), "topic created");
            TopicEntry {
                type_id: TypeId::of::<M>(),
                type_name: type_name::<M>(),
                subscribers: Vec::new(),
                publishers: 0,
            }
        });
        if entry.type_id != TypeId::of::<M>() {
            return Err(TopicError::TypeMismatch {
                topic: name.to_string(),
                registered: entry.type_name,
                requested: type_name::<M>(),
            });
        }
        Ok(entry)
    }
}

impl fmt::Debug for TopicRegistry {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("TopicRegistry")
            .field("topics", &self.topic_names())
            .finish()
    }
}

/// Проверяет имя топика.
///
/// Имя непустое, без пробельных и управляющих символов, без пустых сегментов
/// между `/` (допускается один ведущий `/`).
pub fn validate_topic_name(name: &str) -> Result<(), TopicError> {
    let invalid = |reason| {
        Err(TopicError::InvalidName {
            topic: name.to_string(),
            reason,
        })
    };

    if name.is_empty() {
        return invalid("must not be empty");
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return invalid("contains whitespace or control characters");
    }
    let body = name.strip_prefix('/').unwrap_or(name);
    if body.is_empty() {
        return invalid("must name at least one segment");
    }
    if body.split('/').any(str::is_empty) {
        return invalid("contains an empty segment");
    }
    Ok(())
}
