use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mutator::{
    Envelope, FormData, Mutation, MutationOptions, Notification, Rejection, action_fn, normalize,
};
use tokio::sync::oneshot;

// ============================================================================
// Helper Functions
// ============================================================================

type Log = Arc<Mutex<Vec<String>>>;

/// Options whose callbacks append `success:<response>` / `error:<message>` to `log`.
fn logging_options(log: &Log) -> MutationOptions<String> {
    let successes = Arc::clone(log);
    let errors = Arc::clone(log);
    MutationOptions::new()
        .on_success(move |envelope: &Envelope<String>| {
            let response = envelope.response().cloned().unwrap_or_default();
            successes.lock().unwrap().push(format!("success:{response}"));
        })
        .on_error(move |envelope: &Envelope<String>, message: &str| {
            assert_eq!(envelope.error(), Some(message));
            errors.lock().unwrap().push(format!("error:{message}"));
        })
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn payload(value: &str) -> FormData {
    let mut form = FormData::new();
    form.append("value", value);
    form
}

// ============================================================================
// Settlement Scenarios
// ============================================================================

#[tokio::test]
async fn test_resolved_action_notifies_success_once() {
    let log = Log::default();
    let action = action_fn(|_prev: Option<Envelope<String>>, _: FormData| async {
        Some(normalize(|| async { Ok::<_, Rejection>("ok".to_string()) }).await)
    });
    let mut mutation = Mutation::new(action, logging_options(&log));

    mutation.trigger().call(payload("x"));
    mutation.settle().await;
    // Polling again after settlement must not re-fire.
    assert!(mutation.pump().is_empty());
    assert_eq!(mutation.next_settlement().await, None);

    assert_eq!(mutation.data(), Some(Envelope::success("ok".to_string())));
    assert_eq!(entries(&log), vec!["success:ok"]);
}

#[tokio::test]
async fn test_rejected_action_notifies_error_with_message() {
    let log = Log::default();
    let action = action_fn(|_prev: Option<Envelope<String>>, _: FormData| async {
        Some(normalize(|| async { Err::<String, _>(io::Error::other("boom")) }).await)
    });
    let mut mutation = Mutation::new(action, logging_options(&log));

    mutation.trigger().call(payload("x"));
    mutation.settle().await;

    assert_eq!(mutation.data(), Some(Envelope::failure("boom")));
    assert_eq!(entries(&log), vec!["error:boom"]);
}

#[tokio::test]
async fn test_non_error_rejection_is_silent() {
    let log = Log::default();
    let action = action_fn(|_prev: Option<Envelope<String>>, _: FormData| async {
        Some(normalize(|| async { Err::<String, _>(Rejection::opaque("string-error")) }).await)
    });
    let mut mutation = Mutation::new(action, logging_options(&log));

    mutation.trigger().call(payload("x"));
    assert_eq!(mutation.settle().await, vec![Notification::Skipped]);

    assert_eq!(mutation.data(), Some(Envelope::Failure(None)));
    assert!(entries(&log).is_empty());
}

#[tokio::test]
async fn test_seeded_mutation_is_idle_and_silent() {
    let log = Log::default();
    let seed = Envelope::success("seed".to_string());
    let action = action_fn(|prev: Option<Envelope<String>>, _: FormData| async move { prev });
    let mutation = Mutation::new(action, logging_options(&log).initial_state(seed.clone()));

    assert_eq!(mutation.data(), Some(seed));
    assert!(!mutation.is_pending());
    assert!(entries(&log).is_empty());
}

#[tokio::test]
async fn test_error_then_success_in_order() {
    let log = Log::default();
    let action = action_fn(|_prev: Option<Envelope<String>>, form: FormData| async move {
        match form.get("value") {
            Some("bad") => Some(Envelope::failure("rejected")),
            Some(value) => Some(Envelope::success(value.to_string())),
            None => None,
        }
    });
    let mut mutation = Mutation::new(action, logging_options(&log));
    let trigger = mutation.trigger();

    trigger.call(payload("bad"));
    mutation.settle().await;
    trigger.call(payload("good"));
    mutation.settle().await;

    assert_eq!(entries(&log), vec!["error:rejected", "success:good"]);
}

// ============================================================================
// Invocation Contract
// ============================================================================

#[tokio::test]
async fn test_action_runs_once_per_trigger_with_previous_state() {
    let seen: Arc<Mutex<Vec<(Option<Envelope<String>>, FormData)>>> = Arc::default();
    let recorded = Arc::clone(&seen);
    let action = action_fn(move |prev: Option<Envelope<String>>, form: FormData| {
        recorded.lock().unwrap().push((prev, form.clone()));
        async move { Some(Envelope::success(form.get("value").unwrap_or_default().to_string())) }
    });
    let mut mutation = Mutation::new(action, MutationOptions::new());
    let trigger = mutation.trigger();

    trigger.call(payload("one"));
    mutation.settle().await;
    trigger.call(payload("two"));
    mutation.settle().await;

    let seen = seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            (None, payload("one")),
            (Some(Envelope::success("one".to_string())), payload("two")),
        ]
    );
}

#[tokio::test]
async fn test_pending_until_action_resolves() {
    let log = Log::default();
    let (release, gate) = oneshot::channel::<String>();
    let gate = Arc::new(Mutex::new(Some(gate)));
    let action = action_fn(move |_prev: Option<Envelope<String>>, _: FormData| {
        let gate = gate.lock().unwrap().take();
        async move {
            let value = match gate {
                Some(rx) => rx.await.ok()?,
                None => return None,
            };
            Some(Envelope::success(value))
        }
    });
    let mut mutation = Mutation::new(action, logging_options(&log));

    assert!(!mutation.is_pending());
    mutation.trigger().call(payload("x"));
    assert!(mutation.is_pending());

    // Give the action a chance to run; it is still parked on the gate.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(mutation.pump().is_empty());
    assert!(mutation.is_pending());
    assert!(entries(&log).is_empty());

    release.send("done".to_string()).unwrap();
    assert_eq!(mutation.next_settlement().await, Some(Notification::Success));
    assert!(!mutation.is_pending());
    assert_eq!(entries(&log), vec!["success:done"]);
}

// ============================================================================
// Reconfiguration
// ============================================================================

#[tokio::test]
async fn test_only_latest_callbacks_fire() {
    let first = Log::default();
    let second = Log::default();
    let action = action_fn(|_prev: Option<Envelope<String>>, _: FormData| async {
        Some(Envelope::success("data".to_string()))
    });
    let mut mutation = Mutation::new(action, logging_options(&first));
    let trigger = mutation.trigger();

    mutation.reconfigure(logging_options(&second));
    mutation.reconfigure(logging_options(&second));
    assert!(trigger.ptr_eq(&mutation.trigger()));

    trigger.call(payload("x"));
    mutation.settle().await;

    assert!(entries(&first).is_empty());
    assert_eq!(entries(&second), vec!["success:data"]);
}

#[tokio::test]
async fn test_trigger_is_usable_from_other_tasks() {
    let log = Log::default();
    let action = action_fn(|_prev: Option<Envelope<String>>, form: FormData| async move {
        Some(Envelope::success(form.get("value").unwrap_or_default().to_string()))
    });
    let mut mutation = Mutation::new(action, logging_options(&log));
    let trigger = mutation.trigger();

    tokio::spawn(async move { trigger.call(payload("remote")) })
        .await
        .unwrap();
    mutation.settle().await;

    assert_eq!(entries(&log), vec!["success:remote"]);
}

#[test]
fn test_trigger_outside_runtime_reports_error() {
    let log = Log::default();
    let action = action_fn(|_prev: Option<Envelope<String>>, _: FormData| async { None::<Envelope<String>> });
    let mut mutation = Mutation::new(action, logging_options(&log));

    mutation.trigger().call(payload("x"));
    assert_eq!(mutation.pump(), vec![Notification::Error]);
    assert_eq!(
        entries(&log),
        vec![format!("error:{}", mutator::mutation::NO_RUNTIME_MESSAGE)]
    );
}

#[test]
fn test_explicit_runtime_handle() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let log = Log::default();
    let action = action_fn(|_prev: Option<Envelope<String>>, _: FormData| async {
        Some(Envelope::success("spawned".to_string()))
    });
    let mut mutation = Mutation::new(action, logging_options(&log).runtime(runtime.handle().clone()));

    mutation.trigger().call(payload("x"));
    runtime.block_on(mutation.settle());

    assert_eq!(entries(&log), vec!["success:spawned"]);
}

#[test]
fn test_stale_runtime_handle_still_settles() {
    let log = Log::default();
    let stale = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let action = action_fn(|_prev: Option<Envelope<String>>, _: FormData| async {
        Some(Envelope::success("never".to_string()))
    });
    let mut mutation = Mutation::new(action, logging_options(&log).runtime(stale.handle().clone()));
    drop(stale);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let settled = runtime.block_on(async {
        mutation.trigger().call(payload("x"));
        tokio::time::timeout(Duration::from_secs(2), mutation.settle()).await
    });

    assert_eq!(settled.ok(), Some(vec![Notification::Error]));
    assert!(!mutation.is_pending());
    assert_eq!(
        entries(&log),
        vec![format!("error:{}", mutator::mutation::ABANDONED_MESSAGE)]
    );
}
