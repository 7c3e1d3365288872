/// Тип полезной нагрузки, который можно публиковать.
///
/// Нагрузка передаётся между узлами перемещением, без копирования. `Clone`
/// нужен только для раздачи одного сообщения нескольким подписчикам: первый
/// получает оригинал, остальные получают копии.
pub trait Message: Clone + 'static {}

impl<T: Clone + 'static> Message for T {}
