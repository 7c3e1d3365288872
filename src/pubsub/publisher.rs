use std::{any::Any, cell::Cell, fmt, marker::PhantomData, rc::Rc, sync::Arc};

use intrabus_error::TopicError;
use tracing::{debug, error, trace, warn};

use super::{Message, Slot, SubscriberShared};
use crate::runtime::NodeShared;

/// Итог публикации.
///
/// Публикация не бывает фатальной: сообщение либо передано подписчикам,
/// либо отброшено, и причина видна здесь и в логах.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Сообщение поставлено в очередь `subscribers` подписчикам. Первый
    /// получает исходный слот, остальные копии.
    Delivered { subscribers: usize },
    /// У топика нет подписчиков, сообщение освобождено.
    NoSubscribers,
    /// Слот был пуст (нагрузку уже забрали). Ничего не отправлено.
    /// Возможен только в релизной сборке: в отладочной это паника.
    EmptySlot,
    /// Узел-владелец уничтожен. Ничего не отправлено.
    NodeDestroyed,
}

impl PublishOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    /// Сколько подписчиков получат сообщение.
    pub fn recipients(&self) -> usize {
        match self {
            Self::Delivered { subscribers } => *subscribers,
            _ => 0,
        }
    }
}

struct PublisherShared<M: Message> {
    topic: Arc<str>,
    node: Rc<NodeShared>,
    published: Cell<u64>,
    _message: PhantomData<fn(M)>,
}

impl<M: Message> Drop for PublisherShared<M> {
    fn drop(&mut self) {
        self.node
            .context()
            .registry()
            .deregister_publisher(&self.topic);
    }
}

/// Издатель топика с типом сообщения `M`.
///
/// Создаётся через [`Node::create_publisher`](crate::Node::create_publisher).
/// Клоны ссылаются на одну регистрацию: топик считает издателя живым, пока
/// жив хотя бы один клон. Клон можно захватить в колбэк подписки, чтобы
/// публиковать из обработчика.
pub struct Publisher<M: Message> {
    shared: Rc<PublisherShared<M>>,
}

impl<M: Message> Publisher<M> {
    pub(crate) fn new(
        node: &Rc<NodeShared>,
        topic: &str,
    ) -> Result<Self, TopicError> {
        let topic = node.context().registry().register_publisher::<M>(topic)?;
        Ok(Self {
            shared: Rc::new(PublisherShared {
                topic,
                node: Rc::clone(node),
                published: Cell::new(0),
                _message: PhantomData,
            }),
        })
    }

    pub fn topic(&self) -> &str {
        &self.shared.topic
    }

    pub fn node_name(&self) -> &str {
        self.shared.node.name()
    }

    /// Число принятых к отправке сообщений, включая отброшенные из-за
    /// отсутствия подписчиков.
    pub fn published_count(&self) -> u64 {
        self.shared.published.get()
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared
            .node
            .context()
            .registry()
            .subscriber_count(&self.shared.topic)
    }

    /// Стёртая ссылка на регистрацию; узел держит её до своего уничтожения.
    pub(crate) fn registration(&self) -> Rc<dyn Any> {
        self.shared.clone()
    }

    /// Публикует слот, передавая владение.
    ///
    /// Подписчики берутся снимком на момент вызова, в порядке регистрации.
    /// Первый получает исходный слот без копирования (идентичность
    /// сохраняется), каждый следующий получает собственную копию. Колбэки не
    /// вызываются здесь: доставки встают в очередь исполнителя узла-
    /// подписчика, либо в backlog узла, если он ещё не добавлен в
    /// исполнитель.
    pub fn publish(
        &self,
        slot: Slot<M>,
    ) -> PublishOutcome {
        let node = &self.shared.node;
        let topic = &self.shared.topic;

        if !node.is_alive() {
            warn!(topic = %topic, node = %node.name(), "publish from a destroyed node ignored");
            return PublishOutcome::NodeDestroyed;
        }

        let identity = match slot.identity() {
            Ok(identity) => identity,
            Err(err) => {
                if cfg!(debug_assertions) {
                    panic!("publish on topic '{topic}' from node '{}': {err}", node.name());
                }
                error!(topic = %topic, node = %node.name(), error = %err, "publish of an empty slot ignored");
                return PublishOutcome::EmptySlot;
            }
        };

        let subscribers = node
            .context()
            .registry()
            .snapshot_subscribers::<SubscriberShared<M>>(topic);
        let copies: Vec<Slot<M>> = subscribers
            .iter()
            .skip(1)
            .filter_map(|_| slot.duplicate().ok())
            .collect();

        self.shared.published.set(self.shared.published.get() + 1);

        let Some((first, rest)) = subscribers.split_first() else {
            debug!(topic = %topic, "no subscribers, message dropped");
            return PublishOutcome::NoSubscribers;
        };

        trace!(
            topic = %topic,
            identity = %identity,
            subscribers = subscribers.len(),
            "message published"
        );

        first.enqueue(slot);
        for (subscriber, copy) in rest.iter().zip(copies) {
            subscriber.enqueue(copy);
        }

        PublishOutcome::Delivered {
            subscribers: subscribers.len(),
        }
    }

    /// Размещает значение в новом слоте и публикует его.
    pub fn publish_value(
        &self,
        message: M,
    ) -> PublishOutcome {
        self.publish(Slot::new(message))
    }
}

impl<M: Message> Clone for Publisher<M> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<M: Message> fmt::Debug for Publisher<M> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("topic", &self.shared.topic)
            .field("node", &self.shared.node.name())
            .field("published", &self.shared.published.get())
            .finish()
    }
}
