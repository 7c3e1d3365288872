//! Подсистема Publish–Subscribe внутри процесса.
//!
//! - `slot`: владеющий контейнер сообщения и его идентичность (адрес).
//! - `registry`: реестр топиков, подписчиков и издателей.
//! - `publisher`: публикация слота в топик с передачей владения.
//! - `subscriber`: подписка с колбэком, получающим слот во владение.
//! - `delivery` (приватный): отложенная передача слота подписчику.
//! - `message`: ограничения на тип полезной нагрузки.

mod delivery;
pub mod message;
pub mod publisher;
pub mod registry;
pub mod slot;
pub mod subscriber;

pub(crate) use delivery::{Delivery, DispatchOutcome};
pub use message::*;
pub use publisher::*;
pub use registry::*;
pub use slot::*;
pub(crate) use subscriber::*;
