//! # Kusari (鎖)
//!
//! A synchronous middleware-chain engine for Rust.
//!
//! The name "Kusari" (鎖) means "chain" in Japanese. A list of step
//! functions is linked into one invocable chain, and every step decides
//! where execution goes next through the [`Directives`] it receives.
//!
//! ## Features
//!
//! - **Explicit control flow**: `next`, `back`, `resume` and `abort` directives
//! - **Composable**: chains flatten into other chains, step by step
//! - **Typed signatures**: each step declares which of `(args, context, directives)` it takes
//! - **Traceable failures**: errors are tagged with the failing step's name exactly once
//! - **Lightweight**: synchronous, no runtime, minimal dependencies
//!
//! ## Quick Start
//!
//! ```rust
//! use kusari::prelude::*;
//! use std::sync::{Arc, Mutex};
//!
//! type Order = Arc<Mutex<Vec<String>>>;
//!
//! let chain = Chain::<Order, &str>::with_context_fn(Order::default)
//!     .use_step(StepFn::full(|item: &&str, _ctx: &Order, d| {
//!         if item.is_empty() {
//!             d.abort();
//!             return Ok(());
//!         }
//!         d.next()
//!     }))
//!     .use_step(StepFn::full(|item: &&str, ctx: &Order, d| {
//!         ctx.lock().map_err(|_| "poisoned")?.push(item.to_uppercase());
//!         d.next()
//!     }));
//!
//! let order = chain.start("tea").expect("chain failed");
//! assert_eq!(order.lock().map(|o| o.clone()).ok(), Some(vec!["TEA".to_string()]));
//!
//! let empty = chain.start("").expect("chain failed");
//! assert_eq!(empty.lock().map(|o| o.len()).ok(), Some(0));
//! ```
//!
//! ## Moving Backward
//!
//! `back` re-invokes the previous step with the same arguments; `resume`
//! replays from the head of the chain.
//!
//! ```rust
//! use kusari::prelude::*;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//!
//! let attempts = Chain::<Arc<AtomicU32>>::with_context_fn(|| Arc::new(AtomicU32::new(0)))
//!     .use_step(StepFn::contextual(|attempts: &Arc<AtomicU32>, d| {
//!         attempts.fetch_add(1, Ordering::SeqCst);
//!         d.next()
//!     }))
//!     .use_step(StepFn::contextual(|attempts: &Arc<AtomicU32>, d| {
//!         if attempts.load(Ordering::SeqCst) < 3 {
//!             return d.resume();
//!         }
//!         d.next()
//!     }))
//!     .run()?;
//!
//! assert_eq!(attempts.load(Ordering::SeqCst), 3);
//! # Ok::<(), ChainError>(())
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use kusari::prelude::*;
//!
//! fn validate(_ctx: &(), _d: Directives<()>) -> Result<(), ChainError> {
//!     Err("missing field".into())
//! }
//!
//! let chain = Chain::<()>::new().use_step(StepFn::contextual(validate));
//! match chain.run() {
//!     Err(ChainError::Step { step_name, source }) => {
//!         assert_eq!(step_name.as_str(), "validate");
//!         assert_eq!(source.to_string(), "missing field");
//!     }
//!     other => unreachable!("unexpected outcome: {:?}", other),
//! }
//! ```

mod chain;
mod context;
mod error;
mod hooks;
mod node;
mod step;

pub mod prelude;

pub use chain::{Chain, Middleware};
pub use context::ContextSource;
pub use error::{BoxError, ChainError, ERROR_MARKER};
pub use hooks::HookType;
pub use node::{Directives, Origin};
pub use step::{Signature, Step, StepFn, StepName};

/// Macro to define a step type with minimal boilerplate
///
/// This macro creates a unit struct with:
/// - `const NAME: &'static str` - compile-time step name
/// - `Debug` derive
/// - `Default` implementation, so it can be registered with [`Chain::add`]
///
/// # Example
///
/// ```rust
/// use kusari::define_step;
///
/// define_step!(MyStep);
/// assert_eq!(MyStep::NAME, "MyStep");
/// ```
#[macro_export]
macro_rules! define_step {
    ($name:ident) => {
        #[derive(Debug)]
        pub struct $name;

        impl $name {
            /// Step name as a compile-time constant
            #[allow(dead_code)]
            pub const NAME: &'static str = stringify!($name);
        }

        impl Default for $name {
            fn default() -> Self {
                Self
            }
        }
    };
}
