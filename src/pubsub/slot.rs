use std::fmt;

use intrabus_error::SlotError;

/// Идентичность полезной нагрузки: адрес её хранилища в куче.
///
/// Используется только для проверки zero-copy передачи и для логов.
/// Управляющие решения по ней не принимаются.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(usize);

impl SlotId {
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Слот сообщения: владеющий контейнер ровно для одной полезной нагрузки.
///
/// Нагрузка хранится в `Box`, поэтому перемещение слота не меняет её адрес:
/// идентичность, снятая при публикации, совпадает с идентичностью внутри
/// колбэка подписчика. Копия создаётся только явно, через
/// [`Slot::duplicate`].
///
/// После [`Slot::take`] слот пуст, и любой доступ возвращает
/// [`SlotError::UseAfterMove`].
pub struct Slot<M> {
    payload: Option<Box<M>>,
}

impl<M> Slot<M> {
    /// Создаёт слот, размещая нагрузку в куче.
    pub fn new(payload: M) -> Self {
        Self::from_box(Box::new(payload))
    }

    /// Создаёт слот из уже размещённой нагрузки, сохраняя её адрес.
    pub fn from_box(payload: Box<M>) -> Self {
        Self {
            payload: Some(payload),
        }
    }

    /// Текущая идентичность нагрузки.
    pub fn identity(&self) -> Result<SlotId, SlotError> {
        self.payload
            .as_deref()
            .map(|p| SlotId(p as *const M as usize))
            .ok_or(SlotError::UseAfterMove)
    }

    pub fn get(&self) -> Result<&M, SlotError> {
        self.payload.as_deref().ok_or(SlotError::UseAfterMove)
    }

    /// Изменяемый доступ к нагрузке. Мутация на месте сохраняет идентичность.
    pub fn get_mut(&mut self) -> Result<&mut M, SlotError> {
        self.payload.as_deref_mut().ok_or(SlotError::UseAfterMove)
    }

    /// Забирает нагрузку у слота, оставляя его пустым.
    pub fn take(&mut self) -> Result<Box<M>, SlotError> {
        self.payload.take().ok_or(SlotError::UseAfterMove)
    }

    /// Поглощающий вариант [`Slot::take`].
    pub fn into_inner(self) -> Result<Box<M>, SlotError> {
        self.payload.ok_or(SlotError::UseAfterMove)
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_none()
    }
}

impl<M: Clone> Slot<M> {
    /// Глубокая копия нагрузки в новый слот с новой идентичностью.
    pub fn duplicate(&self) -> Result<Self, SlotError> {
        self.get().map(|p| Self::new(p.clone()))
    }
}

impl<M> From<Box<M>> for Slot<M> {
    fn from(payload: Box<M>) -> Self {
        Self::from_box(payload)
    }
}

impl<M: fmt::Debug> fmt::Debug for Slot<M> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self.payload.as_deref() {
            Some(p) => f
                .debug_struct("Slot")
                .field("identity", &SlotId(p as *const M as usize))
                .field("payload", p)
                .finish(),
            None => f.write_str("Slot(<moved>)"),
        }
    }
}
