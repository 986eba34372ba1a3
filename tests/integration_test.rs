use kusari::prelude::*;
use kusari::{Origin, ERROR_MARKER};
use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Log = Arc<Mutex<Vec<String>>>;

fn record(ctx: &Log, entry: impl Into<String>) {
    if let Ok(mut log) = ctx.lock() {
        log.push(entry.into());
    }
}

fn entries(ctx: &Log) -> Vec<String> {
    ctx.lock().map(|log| log.clone()).unwrap_or_default()
}

fn count(ctx: &Log, entry: &str) -> usize {
    entries(ctx).iter().filter(|e| e.as_str() == entry).count()
}

/// A step that records its label with the call argument and moves on.
fn forward(label: &'static str) -> StepFn<Log, String> {
    StepFn::full(move |args: &String, ctx: &Log, d| {
        record(ctx, format!("{}:{}", label, args));
        d.next()
    })
    .named(label)
}

fn hooked_chain(log: &Log) -> Chain<Log, String> {
    let (on_error, on_success, on_complete) = (log.clone(), log.clone(), log.clone());
    Chain::with_context(log.clone())
        .on_error(move || record(&on_error, "on_error"))
        .on_success(move || record(&on_success, "on_success"))
        .on_complete(move || record(&on_complete, "on_complete"))
}

#[test]
fn test_next_runs_steps_in_order_with_same_args() {
    let log = Log::default();
    let chain = hooked_chain(&log)
        .use_step(forward("f1"))
        .use_step(forward("f2"))
        .use_step(forward("f3"));

    let ctx = chain.start("req".to_string()).expect("chain failed");

    assert!(Arc::ptr_eq(&ctx, &log));
    assert_eq!(
        entries(&log),
        vec!["f1:req", "f2:req", "f3:req", "on_success", "on_complete"]
    );
}

#[test]
fn test_flattened_chain_behaves_like_its_source() {
    let source = Chain::<Log, String>::with_context_fn(Log::default)
        .use_step(forward("f1"))
        .use_step(forward("f2"));
    let merged = Chain::<Log, String>::with_context_fn(Log::default).use_chain(&source);

    let direct = source.start("x".to_string()).expect("chain failed");
    let borrowed = merged.start("x".to_string()).expect("chain failed");

    assert_eq!(entries(&direct), vec!["f1:x", "f2:x"]);
    assert_eq!(entries(&borrowed), entries(&direct));
    assert!(merged.origins().all(|origin| origin == Origin::Flattened));
    assert!(source.origins().all(|origin| origin == Origin::Direct));
}

#[test]
fn test_flattened_tail_does_not_carry_hooks() {
    let log = Log::default();
    let source = hooked_chain(&log).use_step(forward("f1"));
    let merged = hooked_chain(&log).use_chain(&source);

    merged.start("x".to_string()).expect("chain failed");
    assert_eq!(entries(&log), vec!["f1:x"]);

    source.start("y".to_string()).expect("chain failed");
    assert_eq!(
        entries(&log),
        vec!["f1:x", "f1:y", "on_success", "on_complete"]
    );
}

#[test]
fn test_back_reinvokes_previous_step_with_same_args() {
    let log = Log::default();
    let chain = Chain::<Log, String>::with_context(log.clone())
        .use_step(forward("f1"))
        .use_step(StepFn::full(|args: &String, ctx: &Log, d| {
            record(ctx, format!("f2:{}", args));
            if count(ctx, "f2:payload") == 1 {
                return d.back();
            }
            d.next()
        }));

    chain.start("payload".to_string()).expect("chain failed");

    assert_eq!(
        entries(&log),
        vec!["f1:payload", "f2:payload", "f1:payload", "f2:payload"]
    );
}

#[test]
fn test_back_at_first_step_is_a_no_op() {
    let log = Log::default();
    let chain = hooked_chain(&log)
        .use_step(StepFn::full(|_args: &String, ctx: &Log, d| {
            record(ctx, "f1");
            d.back()
        }))
        .use_step(forward("f2"));

    let result = chain.start(String::new());

    assert!(result.is_ok());
    assert_eq!(entries(&log), vec!["f1"]);
}

#[test]
fn test_resume_always_restarts_from_head() {
    let log = Log::default();
    let chain = Chain::<Log>::with_context(log.clone())
        .use_step(StepFn::contextual(|ctx: &Log, d| {
            record(ctx, "s1");
            d.next()
        }))
        .use_step(StepFn::contextual(|ctx: &Log, d| {
            record(ctx, "s2");
            d.next()
        }))
        .use_step(StepFn::contextual(|ctx: &Log, d| {
            record(ctx, "s3");
            match count(ctx, "s3") {
                1 => d.back(),
                2 => d.resume(),
                _ => d.next(),
            }
        }));

    chain.run().expect("chain failed");

    assert_eq!(
        entries(&log),
        vec!["s1", "s2", "s3", "s2", "s3", "s1", "s2", "s3"]
    );
}

#[test]
fn test_resume_at_first_step_is_a_no_op() {
    let log = Log::default();
    let chain = Chain::<Log>::with_context(log.clone())
        .use_step(StepFn::contextual(|ctx: &Log, d| {
            record(ctx, "s1");
            d.resume()
        }))
        .use_step(StepFn::consumer(|ctx: &Log| {
            record(ctx, "s2");
            Ok(())
        }));

    chain.run().expect("chain failed");
    assert_eq!(entries(&log), vec!["s1"]);
}

#[test]
fn test_abort_fires_error_then_complete_and_stops() {
    let log = Log::default();
    let chain = hooked_chain(&log)
        .use_step(forward("f1"))
        .use_step(StepFn::full(|_args: &String, ctx: &Log, d| {
            record(ctx, "f2");
            d.abort();
            Ok(())
        }))
        .use_step(forward("f3"));

    let result = chain.start("req".to_string());

    assert!(result.is_ok());
    assert_eq!(
        entries(&log),
        vec!["f1:req", "f2", "on_error", "on_complete"]
    );
}

fn reject_order(_args: &String, _ctx: &Log, _d: Directives<Log, String>) -> Result<(), ChainError> {
    Err("boom".into())
}

#[test]
fn test_error_is_tagged_with_function_name() {
    let chain = Chain::<Log, String>::new()
        .use_step(forward("f1"))
        .use_step(StepFn::full(reject_order));

    let error = chain
        .start("req".to_string())
        .expect_err("chain should fail");

    let message = error.to_string();
    assert!(message.contains(ERROR_MARKER));
    assert!(message.contains("reject_order"));
    assert!(message.contains("boom"));
    assert_eq!(error.step_name().map(StepName::as_str), Some("reject_order"));
}

#[test]
fn test_anonymous_step_is_named_after_enclosing_fn() {
    let chain = Chain::<Log>::new().use_step(StepFn::directed(|_| Err("boom".into())));

    let error = chain.run().expect_err("chain should fail");

    assert_eq!(
        error.to_string(),
        "[Chain Exception test_anonymous_step_is_named_after_enclosing_fn::{{closure}}]: boom"
    );
}

#[test]
fn test_nested_chain_error_is_not_tagged_twice() {
    let inner = Chain::<Log>::new()
        .use_step(StepFn::directed(|_| Err("boom".into())).named("inner_step"));
    let outer = Chain::<Log>::new().use_step(
        StepFn::contextual(move |_ctx: &Log, d| {
            inner.run()?;
            d.next()
        })
        .named("outer_step"),
    );

    let error = outer.run().expect_err("chain should fail");

    assert_eq!(error.to_string(), "[Chain Exception inner_step]: boom");
    assert_eq!(error.step_name().map(StepName::as_str), Some("inner_step"));
}

#[test]
fn test_terminal_consumer_receives_context() {
    let log = Log::default();
    let chain = Chain::<Log>::with_context(log.clone())
        .use_step(StepFn::directed(|d| d.next()))
        .use_step(StepFn::consumer(|ctx: &Log| {
            record(ctx, "consumed");
            Ok(())
        }));

    let ctx = chain.run().expect("chain failed");

    assert!(Arc::ptr_eq(&ctx, &log));
    assert_eq!(entries(&log), vec!["consumed"]);
}

#[test]
fn test_start_without_steps_returns_context() {
    let log = Log::default();
    let chain = hooked_chain(&log);

    let ctx = chain.start("ignored".to_string()).expect("chain failed");

    assert!(Arc::ptr_eq(&ctx, &log));
    assert!(entries(&log).is_empty());
}

#[test]
fn test_context_producer_is_resolved_per_start() {
    let produced = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&produced);
    let chain = Chain::<Log>::with_context_fn(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Log::default()
    })
    .use_step(StepFn::consumer(|ctx: &Log| {
        record(ctx, "ran");
        Ok(())
    }));

    let first = chain.run().expect("chain failed");
    let second = chain.run().expect("chain failed");

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(entries(&first), vec!["ran"]);
    assert_eq!(entries(&second), vec!["ran"]);
    assert_eq!(produced.load(Ordering::SeqCst), 2);
}

#[test]
fn test_context_writes_are_visible_to_later_steps() {
    let chain = Chain::<Cell<u32>>::new()
        .use_step(StepFn::contextual(|ctx: &Cell<u32>, d| {
            ctx.set(ctx.get() + 1);
            d.next()
        }))
        .use_step(StepFn::contextual(|ctx: &Cell<u32>, d| {
            if ctx.get() != 1 {
                return Err(format!("second step saw {}", ctx.get()).into());
            }
            ctx.set(ctx.get() + 1);
            d.next()
        }));

    assert_eq!(chain.run().expect("chain failed").get(), 2);
    assert_eq!(chain.run().expect("chain failed").get(), 2);
}

#[test]
fn test_back_sees_context_written_downstream() {
    let chain = Chain::<RefCell<Vec<String>>>::new()
        .use_step(StepFn::contextual(|ctx: &RefCell<Vec<String>>, d| {
            let seen = ctx.borrow().len();
            ctx.borrow_mut().push(format!("f1:{}", seen));
            d.next()
        }))
        .use_step(StepFn::contextual(|ctx: &RefCell<Vec<String>>, d| {
            ctx.borrow_mut().push("f2".to_string());
            let visits = ctx.borrow().iter().filter(|e| e.as_str() == "f2").count();
            if visits == 1 {
                return d.back();
            }
            d.next()
        }));

    let ctx = chain.run().expect("chain failed");

    assert_eq!(ctx.into_inner(), vec!["f1:0", "f2", "f1:2", "f2"]);
}

define_step!(Audit);

impl Step<Log, String> for Audit {
    fn execute(&self, args: &String, ctx: &Log, directives: Directives<Log, String>) -> Result<(), ChainError> {
        record(ctx, format!("audit:{}", args));
        directives.next()
    }
}

#[test]
fn test_step_types_mix_with_closures() {
    let log = Log::default();
    let chain = Chain::with_context(log.clone())
        .use_step(forward("f1"))
        .add::<Audit>();

    chain.start("id".to_string()).expect("chain failed");

    assert_eq!(entries(&log), vec!["f1:id", "audit:id"]);
    assert_eq!(
        chain.step_names().map(StepName::as_str).collect::<Vec<_>>(),
        vec!["f1", Audit::NAME]
    );
}

#[tokio::test]
async fn test_deferred_next_from_spawned_task() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let chain = Chain::<Log>::with_context_fn(Log::default)
        .use_step(StepFn::contextual(move |ctx: &Log, d| {
            record(ctx, "scheduled");
            let tx = tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                let _ = tx.send(d.next());
            });
            Ok(())
        }))
        .use_step(StepFn::consumer(|ctx: &Log| {
            record(ctx, "finished");
            Ok(())
        }));

    let ctx = chain.run().expect("chain failed");
    assert_eq!(entries(&ctx), vec!["scheduled"]);

    let deferred = rx.recv().await.expect("task dropped the sender");
    assert!(deferred.is_ok());
    assert_eq!(entries(&ctx), vec!["scheduled", "finished"]);
}
