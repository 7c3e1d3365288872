//! Среда выполнения: контекст, узлы, однопоточный исполнитель и сигнал
//! остановки.

pub mod context;
pub mod executor;
pub mod node;
pub mod os_signals;
pub mod signal;

pub use context::*;
pub use executor::*;
pub(crate) use node::NodeShared;
pub use node::{validate_node_name, Node, NodeHandle, NodeId};
pub use os_signals::spawn_shutdown_listener;
pub use signal::ShutdownHandle;
