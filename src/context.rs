use std::fmt;
use std::sync::Arc;

/// Where a chain gets the context it threads through every step.
///
/// The context is resolved once per [`Chain::start`](crate::Chain::start)
/// and that one instance is shared by every step of the invocation. A `Value`
/// is cloned for each start (hold an `Arc` to keep writes across starts); a
/// `Producer` is called to build a fresh context.
pub enum ContextSource<C> {
    /// A fixed value handed to every invocation.
    Value(C),
    /// A zero-argument function producing the context for each invocation.
    Producer(Arc<dyn Fn() -> C + Send + Sync>),
}

impl<C> ContextSource<C> {
    /// A context handed to every invocation as is.
    pub fn value(value: C) -> Self {
        ContextSource::Value(value)
    }

    /// A context built by `f` at the start of each invocation.
    pub fn producer<F>(f: F) -> Self
    where
        F: Fn() -> C + Send + Sync + 'static,
    {
        ContextSource::Producer(Arc::new(f))
    }

    /// Returns `true` if the context is produced per invocation.
    pub fn is_producer(&self) -> bool {
        matches!(self, ContextSource::Producer(_))
    }
}

impl<C: Clone> ContextSource<C> {
    /// Resolves the effective context for one invocation.
    pub fn resolve(&self) -> C {
        match self {
            ContextSource::Value(value) => value.clone(),
            ContextSource::Producer(produce) => produce(),
        }
    }
}

impl<C: Default> Default for ContextSource<C> {
    fn default() -> Self {
        ContextSource::Value(C::default())
    }
}

impl<C: Clone> Clone for ContextSource<C> {
    fn clone(&self) -> Self {
        match self {
            ContextSource::Value(value) => ContextSource::Value(value.clone()),
            ContextSource::Producer(produce) => ContextSource::Producer(Arc::clone(produce)),
        }
    }
}

impl<C: fmt::Debug> fmt::Debug for ContextSource<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextSource::Value(value) => f.debug_tuple("Value").field(value).finish(),
            ContextSource::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}
