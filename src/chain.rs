use crate::context::ContextSource;
use crate::error::ChainError;
use crate::hooks::HookType;
use crate::node::{Origin, Pipeline};
use crate::step::{Step, StepFn, StepName};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// One argument to [`Chain::use_all`]: a step function or a whole chain.
pub enum Middleware<'a, C, A = ()> {
    /// A step function, appended as one node.
    Step(StepFn<C, A>),
    /// Another chain, flattened into this one.
    Chain(&'a Chain<C, A>),
}

impl<C, A> From<StepFn<C, A>> for Middleware<'_, C, A> {
    fn from(step: StepFn<C, A>) -> Self {
        Middleware::Step(step)
    }
}

impl<'a, C, A> From<&'a Chain<C, A>> for Middleware<'a, C, A> {
    fn from(chain: &'a Chain<C, A>) -> Self {
        Middleware::Chain(chain)
    }
}

/// An ordered list of steps with a single entry point.
///
/// Built once through the registration methods, then started any number of
/// times. Each start resolves its own context and creates fresh directives
/// while sharing the registered steps.
///
/// # Examples
///
/// ```
/// use kusari::{Chain, StepFn};
/// use std::sync::{Arc, Mutex};
///
/// type Trace = Arc<Mutex<Vec<&'static str>>>;
///
/// let validate = Chain::<Trace>::with_context_fn(Trace::default)
///     .use_step(StepFn::contextual(|ctx: &Trace, d| {
///         ctx.lock().map_err(|_| "poisoned")?.push("validate");
///         d.next()
///     }));
///
/// let chain = Chain::with_context_fn(Trace::default)
///     .use_chain(&validate)
///     .use_step(StepFn::consumer(|ctx: &Trace| {
///         ctx.lock().map_err(|_| "poisoned")?.push("persist");
///         Ok(())
///     }));
///
/// let trace = chain.run().expect("chain failed");
/// assert_eq!(trace.lock().map(|t| t.clone()).ok(), Some(vec!["validate", "persist"]));
/// ```
pub struct Chain<C, A = ()> {
    pipeline: Arc<Pipeline<C, A>>,
    context: ContextSource<C>,
}

impl<C, A> fmt::Debug for Chain<C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("steps", &self.step_names().collect::<Vec<_>>())
            .field("context_producer", &self.context.is_producer())
            .finish()
    }
}

impl<C: Default, A> Default for Chain<C, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Default, A> Chain<C, A> {
    /// Creates an empty chain whose context is `C::default()`.
    pub fn new() -> Self {
        Self::from_source(ContextSource::default())
    }
}

impl<C, A> Chain<C, A> {
    /// Creates an empty chain resolving its context from `context`.
    pub fn from_source(context: ContextSource<C>) -> Self {
        Self {
            pipeline: Arc::new(Pipeline::default()),
            context,
        }
    }

    /// Creates an empty chain handing `value` to every invocation.
    pub fn with_context(value: C) -> Self {
        Self::from_source(ContextSource::value(value))
    }

    /// Creates an empty chain building a fresh context per invocation.
    pub fn with_context_fn<F>(f: F) -> Self
    where
        F: Fn() -> C + Send + Sync + 'static,
    {
        Self::from_source(ContextSource::producer(f))
    }

    /// Appends one step function after the current tail.
    pub fn use_step(mut self, step: StepFn<C, A>) -> Self {
        debug!("Registering step '{}'", step.name());
        self.pipeline_mut().push(step, Origin::Direct);
        self
    }

    /// Flattens `other` into this chain.
    ///
    /// Each of its steps is appended as a new node wrapping the same
    /// function. Its hooks and links stay behind.
    pub fn use_chain(mut self, other: &Chain<C, A>) -> Self {
        debug!("Flattening {} step(s) into chain", other.len());
        let steps = other
            .pipeline
            .nodes()
            .iter()
            .map(|node| node.step().clone())
            .collect::<Vec<_>>();
        let pipeline = self.pipeline_mut();
        for step in steps {
            pipeline.push(step, Origin::Flattened);
        }
        self
    }

    /// Registers steps and chains in order.
    pub fn use_all<'a, I>(self, middleware: I) -> Self
    where
        I: IntoIterator<Item = Middleware<'a, C, A>>,
        C: 'a,
        A: 'a,
    {
        middleware
            .into_iter()
            .fold(self, |chain, middleware| match middleware {
                Middleware::Step(step) => chain.use_step(step),
                Middleware::Chain(other) => chain.use_chain(other),
            })
    }

    /// Registers a [`Step`] type using its `Default` value.
    pub fn add<S>(self) -> Self
    where
        S: Step<C, A> + Default + 'static,
    {
        self.use_step(StepFn::from_step(S::default()))
    }

    /// Called when a step registered on this chain aborts.
    pub fn on_error<F>(self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hook(HookType::OnError, f)
    }

    /// Called when a tail step registered on this chain calls `next`.
    pub fn on_success<F>(self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hook(HookType::OnSuccess, f)
    }

    /// Called after `on_error` or `on_success`.
    pub fn on_complete<F>(self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hook(HookType::OnComplete, f)
    }

    fn hook<F>(mut self, hook_type: HookType, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.pipeline_mut().hooks_mut().set(hook_type, f);
        self
    }

    fn pipeline_mut(&mut self) -> &mut Pipeline<C, A> {
        Arc::make_mut(&mut self.pipeline)
    }

    /// Returns the number of registered steps.
    pub fn len(&self) -> usize {
        self.pipeline.nodes().len()
    }

    /// Returns `true` if no step is registered.
    pub fn is_empty(&self) -> bool {
        self.pipeline.nodes().is_empty()
    }

    /// Returns the registered step names, head first.
    pub fn step_names(&self) -> impl Iterator<Item = &StepName> {
        self.pipeline.nodes().iter().map(|node| node.step().name())
    }

    /// Returns the registered steps, head first.
    pub fn steps(&self) -> impl Iterator<Item = &StepFn<C, A>> {
        self.pipeline.nodes().iter().map(|node| node.step())
    }

    /// Returns how each step ended up in this chain, head first.
    pub fn origins(&self) -> impl Iterator<Item = Origin> + '_ {
        self.pipeline.nodes().iter().map(|node| node.origin())
    }
}

impl<C: Clone, A> Chain<C, A> {
    /// Invokes the head step with `args` and the resolved context.
    ///
    /// Every step of the invocation shares the one resolved context, and
    /// `start` returns it whether or not any step ran. A step that aborts
    /// still yields `Ok`; only a failing step body yields `Err`.
    ///
    /// If a step kept its directives for later, the returned value is a
    /// clone taken at the moment the synchronous part of the chain returned.
    pub fn start(&self, args: A) -> Result<C, ChainError> {
        let context = self.context.resolve();
        if self.is_empty() {
            debug!("Chain has no steps; returning context");
            return Ok(context);
        }
        let context = Arc::new(context);
        self.pipeline.run(0, &Arc::new(args), &context)?;
        Ok(Arc::try_unwrap(context).unwrap_or_else(|shared| C::clone(&shared)))
    }
}

impl<C: Clone> Chain<C, ()> {
    /// Starts a chain that takes no call arguments.
    pub fn run(&self) -> Result<C, ChainError> {
        self.start(())
    }
}
