use kusari::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Store {
    rows: HashMap<String, String>,
    attempts: u32,
    rejected: Vec<String>,
}

type Ctx = Arc<Mutex<Store>>;

fn lock(ctx: &Ctx) -> Result<std::sync::MutexGuard<'_, Store>, ChainError> {
    ctx.lock().map_err(|_| ChainError::raise("store lock poisoned"))
}

fn validate(request: &(String, String), ctx: &Ctx, d: Directives<Ctx, (String, String)>) -> Result<(), ChainError> {
    let (key, _) = request;
    if key.is_empty() {
        lock(ctx)?.rejected.push("<empty key>".to_string());
        d.abort();
        return Ok(());
    }
    d.next()
}

fn transform(request: &(String, String), ctx: &Ctx, d: Directives<Ctx, (String, String)>) -> Result<(), ChainError> {
    let (key, value) = request;
    let normalized = value.trim().to_lowercase();
    lock(ctx)?.rows.insert(key.clone(), normalized);
    d.next()
}

define_step!(Persist);

impl Step<Ctx, (String, String)> for Persist {
    fn execute(&self, _request: &(String, String), ctx: &Ctx, d: Directives<Ctx, (String, String)>) -> Result<(), ChainError> {
        let attempts = {
            let mut store = lock(ctx)?;
            store.attempts += 1;
            store.attempts
        };
        // the first write always "conflicts" so the demo shows a replay
        if attempts == 1 {
            return d.resume();
        }
        d.next()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let checks = Chain::<Ctx, (String, String)>::with_context_fn(Ctx::default)
        .use_step(StepFn::full(validate));

    let pipeline = Chain::with_context_fn(Ctx::default)
        .use_chain(&checks)
        .use_step(StepFn::full(transform))
        .add::<Persist>()
        .on_success(|| println!("request stored"))
        .on_complete(|| println!("request finished"));

    let store = pipeline.start(("user:1".to_string(), "  Alice ".to_string()))?;
    println!("stored: {:?}", lock(&store)?);

    let store = pipeline.start((String::new(), "ignored".to_string()))?;
    println!("rejected: {:?}", lock(&store)?.rejected);

    Ok(())
}
