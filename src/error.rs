use crate::step::StepName;
use thiserror::Error;

/// Boxed error raised from inside a step body.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Marker carried by every error the chain has attributed to a step.
pub const ERROR_MARKER: &str = "Chain Exception";

/// Errors that can propagate out of a chain invocation.
///
/// There is exactly one kind of failure: a step body returning `Err`. The
/// first node that sees the error tags it with the step's name; from then on
/// it travels unchanged, even through nested chains.
///
/// A controlled failure signalled with [`Directives::abort`](crate::Directives::abort)
/// is not an error and never shows up here.
///
/// # Non-Exhaustive
///
/// ```
/// use kusari::ChainError;
///
/// fn describe(error: &ChainError) -> String {
///     match error {
///         ChainError::Step { step_name, source } => format!("{}: {}", step_name, source),
///         ChainError::Raised(source) => format!("untagged: {}", source),
///         _ => error.to_string(),
///     }
/// }
///
/// assert_eq!(describe(&ChainError::raise("boom")), "untagged: boom");
/// ```
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ChainError {
    /// Raised by a step body and not yet attributed to a step.
    #[error(transparent)]
    Raised(BoxError),

    /// A step failed. The message keeps the original text after the marker.
    #[error("[Chain Exception {step_name}]: {source}")]
    Step {
        /// The name of the step that failed
        step_name: StepName,
        /// The error the step body returned
        source: BoxError,
    },
}

impl ChainError {
    /// Wraps any error (or message) returned from a step body.
    pub fn raise(error: impl Into<BoxError>) -> Self {
        ChainError::Raised(error.into())
    }

    /// Returns `true` once the error has been attributed to a step.
    pub fn is_tagged(&self) -> bool {
        matches!(self, ChainError::Step { .. })
    }

    /// The step the error was attributed to, if any.
    pub fn step_name(&self) -> Option<&StepName> {
        match self {
            ChainError::Step { step_name, .. } => Some(step_name),
            ChainError::Raised(_) => None,
        }
    }

    /// Attributes the error to `step_name` unless it already carries a tag.
    pub(crate) fn tag(self, step_name: &StepName) -> Self {
        match self {
            ChainError::Raised(source) => ChainError::Step {
                step_name: step_name.clone(),
                source,
            },
            tagged => tagged,
        }
    }
}

impl From<&str> for ChainError {
    fn from(message: &str) -> Self {
        ChainError::raise(message)
    }
}

impl From<String> for ChainError {
    fn from(message: String) -> Self {
        ChainError::raise(message)
    }
}
