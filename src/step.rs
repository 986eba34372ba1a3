use crate::error::ChainError;
use crate::node::Directives;
use std::fmt;
use std::sync::Arc;

/// Name a step is known by in logs and error tags.
///
/// # Examples
///
/// ```
/// use kusari::StepName;
///
/// let name = StepName::new("validate");
/// assert_eq!(name.as_str(), "validate");
///
/// let name: StepName = "persist".into();
/// assert_eq!(name.to_string(), "persist");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StepName(String);

const CLOSURE_SEGMENT: &str = "{{closure}}";

impl StepName {
    /// Creates a new StepName
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derives a name from a type's name.
    ///
    /// Named items (`fn` items, structs) give their own identifier. Closures
    /// are anonymous, so they are named after the function that encloses
    /// them, e.g. `handle_request::{{closure}}`.
    pub fn from_type_name<T: ?Sized>() -> Self {
        let full_name = std::any::type_name::<T>();
        let path = full_name.split('<').next().unwrap_or(full_name);

        let mut named = None;
        let mut anonymous = false;
        for segment in path.rsplit("::").filter(|s| !s.is_empty()) {
            if segment == CLOSURE_SEGMENT {
                anonymous = true;
            } else {
                named = Some(segment);
                break;
            }
        }

        match (named, anonymous) {
            (Some(name), false) => Self::new(name),
            (Some(name), true) => Self(format!("{}::{}", name, CLOSURE_SEGMENT)),
            (None, _) => Self::new(CLOSURE_SEGMENT),
        }
    }

    /// Returns the step name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` when the name was derived from an anonymous closure.
    pub fn is_anonymous(&self) -> bool {
        self.0.ends_with(CLOSURE_SEGMENT)
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StepName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StepName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for StepName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for StepName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for StepName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Which part of `(args, context, directives)` a step function receives.
///
/// Chosen when the function is wrapped instead of being read off the
/// function's parameter count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signature {
    /// `(args, context, directives)`
    Full,
    /// `(context, directives)`
    Contextual,
    /// `(directives)`
    Directed,
    /// `(context)`: a terminal step that only consumes the context.
    Consumer,
}

impl Signature {
    /// Number of parameters the step function declares.
    pub fn arity(&self) -> usize {
        match self {
            Signature::Full => 3,
            Signature::Contextual => 2,
            Signature::Directed | Signature::Consumer => 1,
        }
    }

    /// Whether the function receives the directives and can steer the chain.
    pub fn has_directives(&self) -> bool {
        !matches!(self, Signature::Consumer)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signature::Full => write!(f, "full"),
            Signature::Contextual => write!(f, "contextual"),
            Signature::Directed => write!(f, "directed"),
            Signature::Consumer => write!(f, "consumer"),
        }
    }
}

pub(crate) type StepResult = Result<(), ChainError>;

type FullFn<C, A> = dyn Fn(&A, &C, Directives<C, A>) -> StepResult + Send + Sync;
type ContextualFn<C, A> = dyn Fn(&C, Directives<C, A>) -> StepResult + Send + Sync;
type DirectedFn<C, A> = dyn Fn(Directives<C, A>) -> StepResult + Send + Sync;
type ConsumerFn<C> = dyn Fn(&C) -> StepResult + Send + Sync;

pub(crate) enum Action<C, A> {
    Full(Arc<FullFn<C, A>>),
    Contextual(Arc<ContextualFn<C, A>>),
    Directed(Arc<DirectedFn<C, A>>),
    Consumer(Arc<ConsumerFn<C>>),
}

impl<C, A> Clone for Action<C, A> {
    fn clone(&self) -> Self {
        match self {
            Action::Full(f) => Action::Full(Arc::clone(f)),
            Action::Contextual(f) => Action::Contextual(Arc::clone(f)),
            Action::Directed(f) => Action::Directed(Arc::clone(f)),
            Action::Consumer(f) => Action::Consumer(Arc::clone(f)),
        }
    }
}

/// A step function wrapped for registration on a [`Chain`](crate::Chain).
///
/// Cloning is cheap and keeps pointing at the same underlying function.
///
/// # Examples
///
/// ```
/// use kusari::{StepFn, Signature};
///
/// fn audit(ctx: &Vec<u8>) -> Result<(), kusari::ChainError> {
///     assert!(ctx.is_empty());
///     Ok(())
/// }
///
/// let step = StepFn::<Vec<u8>>::consumer(audit);
/// assert_eq!(step.name().as_str(), "audit");
/// assert_eq!(step.signature(), Signature::Consumer);
/// ```
pub struct StepFn<C, A = ()> {
    name: StepName,
    action: Action<C, A>,
}

impl<C, A> Clone for StepFn<C, A> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            action: self.action.clone(),
        }
    }
}

impl<C, A> fmt::Debug for StepFn<C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepFn")
            .field("name", &self.name)
            .field("signature", &self.signature())
            .finish()
    }
}

impl<C, A> StepFn<C, A> {
    /// Wraps a function receiving `(args, context, directives)`.
    pub fn full<F>(f: F) -> Self
    where
        F: Fn(&A, &C, Directives<C, A>) -> Result<(), ChainError> + Send + Sync + 'static,
    {
        Self {
            name: StepName::from_type_name::<F>(),
            action: Action::Full(Arc::new(f)),
        }
    }

    /// Wraps a function receiving `(context, directives)`.
    pub fn contextual<F>(f: F) -> Self
    where
        F: Fn(&C, Directives<C, A>) -> Result<(), ChainError> + Send + Sync + 'static,
    {
        Self {
            name: StepName::from_type_name::<F>(),
            action: Action::Contextual(Arc::new(f)),
        }
    }

    /// Wraps a function receiving only `directives`.
    pub fn directed<F>(f: F) -> Self
    where
        F: Fn(Directives<C, A>) -> Result<(), ChainError> + Send + Sync + 'static,
    {
        Self {
            name: StepName::from_type_name::<F>(),
            action: Action::Directed(Arc::new(f)),
        }
    }

    /// Wraps a single-parameter function that only consumes the context.
    ///
    /// Such a step cannot steer the chain, so it belongs at the tail.
    pub fn consumer<F>(f: F) -> Self
    where
        F: Fn(&C) -> Result<(), ChainError> + Send + Sync + 'static,
    {
        Self {
            name: StepName::from_type_name::<F>(),
            action: Action::Consumer(Arc::new(f)),
        }
    }

    /// Wraps a [`Step`] implementation, named after its [`Step::name`].
    pub fn from_step<S>(step: S) -> Self
    where
        S: Step<C, A> + 'static,
    {
        let name = step.name();
        let step = Arc::new(step);
        Self {
            name,
            action: Action::Full(Arc::new(move |args: &A, ctx: &C, directives: Directives<C, A>| {
                step.execute(args, ctx, directives)
            })),
        }
    }

    /// Overrides the derived name.
    pub fn named(mut self, name: impl Into<StepName>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns the step name.
    pub fn name(&self) -> &StepName {
        &self.name
    }

    /// Returns the calling convention this function was wrapped with.
    pub fn signature(&self) -> Signature {
        match self.action {
            Action::Full(_) => Signature::Full,
            Action::Contextual(_) => Signature::Contextual,
            Action::Directed(_) => Signature::Directed,
            Action::Consumer(_) => Signature::Consumer,
        }
    }

    /// Returns `true` if both wrap the very same function.
    pub fn same_function(&self, other: &Self) -> bool {
        match (&self.action, &other.action) {
            (Action::Full(a), Action::Full(b)) => Arc::ptr_eq(a, b),
            (Action::Contextual(a), Action::Contextual(b)) => Arc::ptr_eq(a, b),
            (Action::Directed(a), Action::Directed(b)) => Arc::ptr_eq(a, b),
            (Action::Consumer(a), Action::Consumer(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub(crate) fn action(&self) -> &Action<C, A> {
        &self.action
    }
}

/// A step defined as a type rather than a closure.
///
/// Implementors receive the full `(args, context, directives)` list and are
/// named after their type unless [`Step::name`] is overridden.
///
/// # Examples
///
/// ```
/// use kusari::prelude::*;
/// use std::sync::{Arc, Mutex};
///
/// define_step!(Greet);
///
/// impl Step<Arc<Mutex<String>>, &'static str> for Greet {
///     fn execute(
///         &self,
///         name: &&'static str,
///         ctx: &Arc<Mutex<String>>,
///         directives: Directives<Arc<Mutex<String>>, &'static str>,
///     ) -> Result<(), ChainError> {
///         ctx.lock().map_err(|_| "poisoned")?.push_str(name);
///         directives.next()
///     }
/// }
///
/// let chain = Chain::with_context(Arc::new(Mutex::new(String::new()))).add::<Greet>();
/// let ctx = chain.start("kusari").expect("chain failed");
/// assert_eq!(ctx.lock().map(|s| s.clone()).ok(), Some("kusari".to_string()));
/// ```
pub trait Step<C, A = ()>: Send + Sync {
    /// Runs the step. Call one of the directives to steer the chain.
    fn execute(&self, args: &A, ctx: &C, directives: Directives<C, A>) -> Result<(), ChainError>;

    /// Returns the step name.
    ///
    /// By default, uses the type name. Override to provide a custom name.
    fn name(&self) -> StepName {
        StepName::from_type_name::<Self>()
    }
}
