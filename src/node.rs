//! Step nodes and the directives that move execution between them.

use crate::error::ChainError;
use crate::hooks::{HookType, Hooks};
use crate::step::{Action, StepFn, StepName, StepResult};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a node ended up in its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Registered directly on the chain; carries the chain's hooks.
    Direct,
    /// Copied from another chain while flattening; carries no hooks.
    Flattened,
}

pub(crate) struct StepNode<C, A> {
    step: StepFn<C, A>,
    origin: Origin,
}

impl<C, A> Clone for StepNode<C, A> {
    fn clone(&self) -> Self {
        Self {
            step: self.step.clone(),
            origin: self.origin,
        }
    }
}

impl<C, A> StepNode<C, A> {
    pub(crate) fn step(&self) -> &StepFn<C, A> {
        &self.step
    }

    pub(crate) fn origin(&self) -> Origin {
        self.origin
    }
}

/// The ordered, append-only node list a chain owns.
///
/// Neighbours are found by position: the head is `0`, the previous node of
/// `i` is `i - 1`, the tail is the node without a successor.
pub(crate) struct Pipeline<C, A> {
    nodes: Vec<StepNode<C, A>>,
    hooks: Hooks,
}

impl<C, A> Default for Pipeline<C, A> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            hooks: Hooks::default(),
        }
    }
}

impl<C, A> Clone for Pipeline<C, A> {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            hooks: self.hooks.clone(),
        }
    }
}

impl<C, A> fmt::Debug for Pipeline<C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field(
                "nodes",
                &self.nodes.iter().map(|n| n.step.name()).collect::<Vec<_>>(),
            )
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl<C, A> Pipeline<C, A> {
    pub(crate) fn push(&mut self, step: StepFn<C, A>, origin: Origin) {
        self.nodes.push(StepNode { step, origin });
    }

    pub(crate) fn nodes(&self) -> &[StepNode<C, A>] {
        &self.nodes
    }

    pub(crate) fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    fn is_tail(&self, position: usize) -> bool {
        position + 1 >= self.nodes.len()
    }
}

impl<C, A> Pipeline<C, A> {
    /// Invokes the node at `position` with a fresh set of directives.
    ///
    /// Failures coming out of the step are tagged with its name unless a
    /// deeper node (or a nested chain) already did so.
    pub(crate) fn run(self: &Arc<Self>, position: usize, args: &Arc<A>, ctx: &Arc<C>) -> StepResult {
        let Some(node) = self.nodes.get(position) else {
            return Ok(());
        };
        let name = node.step.name();
        let signature = node.step.signature();
        debug!("Running step '{}' ({}) at position {}", name, signature, position);

        if !signature.has_directives() && !self.is_tail(position) {
            warn!("Step '{}' only consumes the context but is not the tail; the chain stops here", name);
        }

        let directives = Directives {
            pipeline: Arc::clone(self),
            position,
            args: Arc::clone(args),
            ctx: Arc::clone(ctx),
        };

        let call_args: &A = args;
        let ctx: &C = ctx;
        let outcome = match node.step.action() {
            Action::Full(f) => f(call_args, ctx, directives),
            Action::Contextual(f) => f(ctx, directives),
            Action::Directed(f) => f(directives),
            Action::Consumer(f) => f(ctx),
        };

        outcome.map_err(|error| {
            if error.is_tagged() {
                error
            } else {
                warn!("Step '{}' failed: {}", name, error);
                error.tag(name)
            }
        })
    }
}

/// Control-flow handle given to a step for one invocation.
///
/// Holds the argument list and context the step was invoked with; every
/// directive that moves to another step passes that same list and the same
/// context instance along.
/// Directives are owned, so a step can keep them and call one later, for
/// example from the completion of work it started on another thread.
///
/// # Examples
///
/// ```
/// use kusari::{Chain, ChainError, StepFn};
/// use std::sync::{Arc, Mutex};
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let chain = Chain::with_context(Arc::clone(&seen))
///     .use_step(StepFn::full(|n: &u32, ctx: &Arc<Mutex<Vec<u32>>>, d| {
///         ctx.lock().map_err(|_| "poisoned")?.push(*n);
///         d.next()
///     }))
///     .use_step(StepFn::full(|n: &u32, ctx: &Arc<Mutex<Vec<u32>>>, d| {
///         ctx.lock().map_err(|_| "poisoned")?.push(n * 10);
///         d.next()
///     }));
///
/// chain.start(4)?;
/// assert_eq!(seen.lock().map(|v| v.clone()).ok(), Some(vec![4, 40]));
/// # Ok::<(), ChainError>(())
/// ```
pub struct Directives<C, A = ()> {
    pipeline: Arc<Pipeline<C, A>>,
    position: usize,
    args: Arc<A>,
    ctx: Arc<C>,
}

impl<C, A> Clone for Directives<C, A> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
            position: self.position,
            args: Arc::clone(&self.args),
            ctx: Arc::clone(&self.ctx),
        }
    }
}

impl<C, A> fmt::Debug for Directives<C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Directives")
            .field("step", &self.step_name())
            .field("position", &self.position)
            .finish()
    }
}

impl<C, A> Directives<C, A> {
    /// Position of the invoking step, `0` being the head.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Whether the invoking step is the tail of its chain.
    pub fn is_tail(&self) -> bool {
        self.pipeline.is_tail(self.position)
    }

    /// Name of the invoking step.
    pub fn step_name(&self) -> Option<&StepName> {
        self.node().map(|n| n.step.name())
    }

    /// The argument list the step was invoked with.
    pub fn args(&self) -> &A {
        &self.args
    }

    /// The context of the current invocation.
    pub fn context(&self) -> &C {
        &self.ctx
    }

    fn node(&self) -> Option<&StepNode<C, A>> {
        self.pipeline.nodes.get(self.position)
    }

    /// Chain hooks, only carried by nodes registered directly on the chain.
    fn hooks(&self) -> Option<&Hooks> {
        match self.node()?.origin {
            Origin::Direct => Some(&self.pipeline.hooks),
            Origin::Flattened => None,
        }
    }

    fn name_for_log(&self) -> &str {
        self.step_name().map(StepName::as_str).unwrap_or("<detached>")
    }

    /// Stops the chain: fires `on_error`, then `on_complete`.
    ///
    /// Not an error; the surrounding `start` returns normally.
    pub fn abort(&self) {
        info!("Step '{}' aborted the chain", self.name_for_log());
        if let Some(hooks) = self.hooks() {
            hooks.fire(HookType::OnError);
            hooks.fire(HookType::OnComplete);
        }
    }
}

impl<C, A> Directives<C, A> {
    /// Invokes the following step, or completes the chain at the tail by
    /// firing `on_success`, then `on_complete`.
    pub fn next(&self) -> Result<(), ChainError> {
        if !self.is_tail() {
            return self.pipeline.run(self.position + 1, &self.args, &self.ctx);
        }

        info!("Chain completed at step '{}'", self.name_for_log());
        if let Some(hooks) = self.hooks() {
            hooks.fire(HookType::OnSuccess);
            hooks.fire(HookType::OnComplete);
        }
        Ok(())
    }

    /// Re-invokes the previous step with the same argument list.
    ///
    /// Does nothing at the head.
    pub fn back(&self) -> Result<(), ChainError> {
        let Some(previous) = self.position.checked_sub(1) else {
            debug!("Step '{}' has no previous step to go back to", self.name_for_log());
            return Ok(());
        };
        debug!("Step '{}' goes back to position {}", self.name_for_log(), previous);
        self.pipeline.run(previous, &self.args, &self.ctx)
    }

    /// Walks upstream to the head of the chain and replays from there.
    ///
    /// Does nothing at the head, which has no upstream to walk.
    pub fn resume(&self) -> Result<(), ChainError> {
        let Some(mut upstream) = self.position.checked_sub(1) else {
            debug!("Step '{}' has no upstream to resume from", self.name_for_log());
            return Ok(());
        };
        while let Some(previous) = upstream.checked_sub(1) {
            upstream = previous;
        }
        debug!("Step '{}' resumes the chain from its head", self.name_for_log());
        self.pipeline.run(upstream, &self.args, &self.ctx)
    }
}
