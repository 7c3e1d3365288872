//! # intrabus
//!
//! Публикация–подписка внутри одного процесса с передачей сообщений без
//! копирования и однопоточным исполнителем колбэков.
//!
//! - Сообщение живёт в [`Slot`]: издатель отдаёт слот во владение, подписчик
//!   получает тот же адрес нагрузки ([`SlotId`]).
//! - [`Node`] владеет издателями и подписками; [`Executor`] вызывает колбэки
//!   по одному, в порядке публикации, из своей очереди.
//! - Публикация из колбэка только ставит доставку в очередь, поэтому
//!   циклические топологии не растят стек.
//! - Остановка через [`ShutdownHandle`] прерывает ожидание
//!   [`NodeHandle::sleep_for`] внутри колбэка.
//!
//! ```no_run
//! use intrabus::{Context, Executor, Node, Slot};
//!
//! let ctx = Context::new();
//! let mut node = Node::new(&ctx, "listener").unwrap();
//! node.create_subscription::<i32, _>("chatter", |slot: Slot<i32>| {
//!     println!("got {}", slot.get().unwrap());
//! })
//! .unwrap();
//! let publisher = node.create_publisher::<i32>("chatter").unwrap();
//!
//! let executor = Executor::new(&ctx);
//! executor.add_node(&node).unwrap();
//! publisher.publish_value(7);
//! executor.spin_some().unwrap();
//! ```

/// Загрузка настроек (файл, окружение).
pub mod config;
/// Инициализация `tracing`.
pub mod logging;
/// Демонстрационный циклический конвейер.
pub mod pipeline;
/// Слоты, реестр топиков, издатели и подписчики.
pub mod pubsub;
/// Контекст, узлы, исполнитель и сигнал остановки.
pub mod runtime;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

pub use config::{ExecutorConfig, PipelineConfig, Settings};
pub use intrabus_error::{
    ErrorExt, ExecutorError, IntrabusResult, NodeError, ResultExt, SlotError, StackError,
    StatusCode, TopicError, WaitError,
};
pub use logging::{init_logging, log_error, LogFormat, LoggingConfig};
pub use pipeline::{build_cycle, Cycle, IncrementerPipe, Int32, PipeStats};
pub use pubsub::{
    validate_topic_name, Message, PublishOutcome, Publisher, Slot, SlotId, SubscriptionId,
    TopicRegistry,
};
pub use runtime::{
    spawn_shutdown_listener, Context, Executor, ExecutorId, ExecutorState, ExecutorStats, Node,
    NodeHandle, NodeId, ShutdownHandle,
};
