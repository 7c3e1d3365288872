use crate::StackError;

/// Трейт-расширение для `Result`, добавляющее контекст к ошибке.
///
/// Ошибка превращается в [`StackError`], к которому приклеивается сообщение
/// и место вызова.
pub trait ResultExt<T> {
    fn context<C>(
        self,
        ctx: C,
    ) -> Result<T, StackError>
    where
        C: Into<String>;

    /// Ленивый вариант: строка строится только в случае ошибки.
    fn with_context<C, F>(
        self,
        f: F,
    ) -> Result<T, StackError>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<StackError>,
{
    #[track_caller]
    fn context<C>(
        self,
        ctx: C,
    ) -> Result<T, StackError>
    where
        C: Into<String>,
    {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(e.into().context(ctx)),
        }
    }

    #[track_caller]
    fn with_context<C, F>(
        self,
        f: F,
    ) -> Result<T, StackError>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(e.into().context(f())),
        }
    }
}
