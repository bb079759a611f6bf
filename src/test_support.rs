//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::core::action::Action;
use crate::core::envelope::Envelope;
use crate::payload::FormData;

pub type Call = (Option<Envelope<String>>, FormData);
type Outcome = Option<Envelope<String>>;

/// Builds a payload with a single `value` field.
pub fn form(value: &str) -> FormData {
    [("value", value)].into_iter().collect()
}

/// An action whose outcomes are scripted by the test.
///
/// Each run takes the next queued gate and waits for it. With no gate queued,
/// the run echoes the payload's `value` field back as a success.
#[derive(Clone, Default)]
pub struct ScriptedAction {
    calls: Arc<Mutex<Vec<Call>>>,
    gates: Arc<Mutex<VecDeque<oneshot::Receiver<Outcome>>>>,
}

impl ScriptedAction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a gate for the next run; the run settles when the sender fires.
    pub fn gate(&self) -> oneshot::Sender<Outcome> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().push_back(rx);
        tx
    }

    /// Queues an outcome the next run settles with right away.
    pub fn respond(&self, outcome: Outcome) {
        let _ = self.gate().send(outcome);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Action<String, FormData> for ScriptedAction {
    async fn run(&self, previous: Option<Envelope<String>>, payload: FormData) -> Outcome {
        let echo = payload.get("value").unwrap_or("echo").to_string();
        self.calls.lock().unwrap().push((previous, payload));
        let gate = self.gates.lock().unwrap().pop_front();
        match gate {
            Some(rx) => rx.await.unwrap_or(None),
            None => Some(Envelope::success(echo)),
        }
    }
}

/// Records callback invocations as `"<tag>:<detail>"` strings.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn on_success(&self, tag: &'static str) -> impl Fn(&Envelope<String>) + Send + Sync + 'static {
        let recorder = self.clone();
        move |envelope: &Envelope<String>| {
            let response = envelope.response().map(String::as_str).unwrap_or_default();
            recorder.push(format!("{tag}:{response}"));
        }
    }

    pub fn on_error(&self, tag: &'static str) -> impl Fn(&Envelope<String>, &str) + Send + Sync + 'static {
        let recorder = self.clone();
        move |_envelope: &Envelope<String>, message: &str| {
            recorder.push(format!("{tag}:{message}"));
        }
    }

    pub fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}
