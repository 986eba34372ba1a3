use std::fmt;
use std::sync::Arc;

/// The chain-level lifecycle callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookType {
    /// Called when a step aborts the chain.
    OnError,
    /// Called when the tail step calls `next`.
    OnSuccess,
    /// Called after either of the above.
    OnComplete,
}

impl fmt::Display for HookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookType::OnError => write!(f, "on_error"),
            HookType::OnSuccess => write!(f, "on_success"),
            HookType::OnComplete => write!(f, "on_complete"),
        }
    }
}

type Hook = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Default)]
pub(crate) struct Hooks {
    on_error: Option<Hook>,
    on_success: Option<Hook>,
    on_complete: Option<Hook>,
}

impl Hooks {
    pub(crate) fn set<F>(&mut self, hook_type: HookType, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let slot = match hook_type {
            HookType::OnError => &mut self.on_error,
            HookType::OnSuccess => &mut self.on_success,
            HookType::OnComplete => &mut self.on_complete,
        };
        *slot = Some(Arc::new(f));
    }

    pub(crate) fn is_set(&self, hook_type: HookType) -> bool {
        self.get(hook_type).is_some()
    }

    /// Calls the hook if one is registered.
    pub(crate) fn fire(&self, hook_type: HookType) {
        if let Some(hook) = self.get(hook_type) {
            tracing::trace!("Firing {} hook", hook_type);
            hook();
        }
    }

    fn get(&self, hook_type: HookType) -> Option<&Hook> {
        match hook_type {
            HookType::OnError => self.on_error.as_ref(),
            HookType::OnSuccess => self.on_success.as_ref(),
            HookType::OnComplete => self.on_complete.as_ref(),
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_error", &self.is_set(HookType::OnError))
            .field("on_success", &self.is_set(HookType::OnSuccess))
            .field("on_complete", &self.is_set(HookType::OnComplete))
            .finish()
    }
}
