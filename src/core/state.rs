//! # Mutation State
//!
//! The bookkeeping for one mutation, plus the reducer that moves it forward.
//!
//! ```text
//! MutationState<T>
//! ├── data: Option<Envelope<T>>   // latest settled envelope (or the seed)
//! ├── in_flight: usize            // triggered but not yet settled
//! ├── triggered: u64              // total triggers, used as a sequence number
//! └── settled: u64                // total settlements applied
//! ```
//!
//! ```text
//! Idle(data) ──Triggered──► Pending ──Settled──► Settled(data) ──Triggered──► ...
//! ```
//!
//! State changes only happen through `update()`. It returns an `Effect`
//! telling the caller whether the notification step has to run. Callbacks
//! live with the controller, not here, so this module stays pure.

use super::envelope::Envelope;

#[derive(Debug, Clone, PartialEq)]
pub struct MutationState<T> {
    pub data: Option<Envelope<T>>,
    pub in_flight: usize,
    pub triggered: u64,
    pub settled: u64,
}

impl<T> MutationState<T> {
    pub fn new(initial: Option<Envelope<T>>) -> Self {
        Self {
            data: initial,
            in_flight: 0,
            triggered: 0,
            settled: 0,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight > 0
    }
}

impl<T> Default for MutationState<T> {
    fn default() -> Self {
        Self::new(None)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event<T> {
    /// A trigger scheduled the action.
    Triggered,
    /// An action run finished and produced this envelope.
    Settled(Option<Envelope<T>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Pending just dropped to false; run the notification step.
    Notify,
}

/// Which callback channel the notification step picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    Success,
    Error,
    Skipped,
}

pub fn update<T>(state: &mut MutationState<T>, event: Event<T>) -> Effect {
    match event {
        Event::Triggered => {
            state.in_flight += 1;
            state.triggered += 1;
            Effect::None
        }
        Event::Settled(envelope) => {
            // Last settlement wins, even when runs overlap.
            state.data = envelope;
            state.in_flight = state.in_flight.saturating_sub(1);
            state.settled += 1;
            if state.is_pending() {
                Effect::None
            } else {
                Effect::Notify
            }
        }
    }
}

/// Picks the channel to fire for the current state.
///
/// Never fires while pending. The error channel needs a non-empty message;
/// the success channel needs a response that passes `response_filter` (when
/// one is set). Bare envelopes fire nothing.
pub fn select<T>(state: &MutationState<T>, response_filter: Option<fn(&T) -> bool>) -> Notification {
    if state.is_pending() {
        return Notification::Skipped;
    }

    match &state.data {
        Some(Envelope::Failure(Some(message))) if !message.is_empty() => Notification::Error,
        Some(Envelope::Success(Some(response)))
            if response_filter.is_none_or(|accept| accept(response)) =>
        {
            Notification::Success
        }
        _ => Notification::Skipped,
    }
}
