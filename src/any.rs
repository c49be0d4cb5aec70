use std::any::Any;

/// A type-erased value flowing through the untyped AST. Downcasting back to
/// a concrete `T` at the edges (public combinators, evaluator result) is
/// always expected to succeed; a failure indicates a bug in this crate, not
/// a caller error, and is treated as such (`expect`, not a propagated
/// `MuseError`).
pub(crate) type AnyValue = Box<dyn Any + Send + Sync>;

pub(crate) fn boxed<T: Send + Sync + 'static>(value: T) -> AnyValue {
    Box::new(value)
}

pub(crate) fn downcast<T: 'static>(value: AnyValue) -> T {
    *value
        .downcast::<T>()
        .unwrap_or_else(|_| panic!("muse: type mismatch downcasting {}", std::any::type_name::<T>()))
}
