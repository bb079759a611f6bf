//! # Mutations
//!
//! A `Mutation` runs one action on demand, tracks whether it is pending, and
//! reports each settlement to at most one of two callbacks.
//!
//! ```text
//!   trigger(payload) ──► spawn action(previous, payload)
//!                                 │
//!                                 ▼  (settlement channel)
//!   pump() / settle() ──► update(state, Settled) ──► Effect::Notify?
//!                                                          │
//!                              select(state) ──────────────┘
//!                                 │
//!                 ┌───────────────┴───────────────┐
//!                 ▼                               ▼
//!        on_success(&envelope)        on_error(&envelope, message)
//! ```
//!
//! The owner drives settlements the way a UI loop drives effects: nothing is
//! applied until `pump()`, `next_settlement()` or `settle()` runs. That keeps
//! state changes and callbacks on the owner's task, in order.
//!
//! Callbacks are held in [`CallbackRef`] slots. `reconfigure()` swaps them in
//! place without re-running the notification step; the next settlement uses
//! whatever is in the slots at that moment.

mod trigger;

pub use trigger::{ABANDONED_MESSAGE, NO_ACTION_MESSAGE, NO_RUNTIME_MESSAGE, Trigger};

use std::fmt;
use std::sync::{Arc, Mutex};

use log::{debug, info};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::core::action::Action;
use crate::core::callback_ref::CallbackRef;
use crate::core::envelope::Envelope;
use crate::core::presence::{ResponseCheck, Truthy};
use crate::core::state::{Effect, Event, MutationState, Notification, select, update};
use crate::payload::FormData;
use trigger::{Settlement, Shared};

pub type SuccessCallback<T> = dyn Fn(&Envelope<T>) + Send + Sync;
pub type ErrorCallback<T> = dyn Fn(&Envelope<T>, &str) + Send + Sync;

/// Construction and reconfiguration options for a [`Mutation`].
pub struct MutationOptions<T> {
    initial_state: Option<Envelope<T>>,
    on_success: Option<Box<SuccessCallback<T>>>,
    on_error: Option<Box<ErrorCallback<T>>>,
    response_filter: Option<fn(&T) -> bool>,
    runtime: Option<Handle>,
}

impl<T> Default for MutationOptions<T> {
    fn default() -> Self {
        Self {
            initial_state: None,
            on_success: None,
            on_error: None,
            response_filter: None,
            runtime: None,
        }
    }
}

impl<T> MutationOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the envelope before any trigger. Ignored by `reconfigure()`.
    pub fn initial_state(mut self, envelope: Envelope<T>) -> Self {
        self.initial_state = Some(envelope);
        self
    }

    pub fn on_success(mut self, callback: impl Fn(&Envelope<T>) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub fn on_error(
        mut self,
        callback: impl Fn(&Envelope<T>, &str) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Runtime used to spawn actions. Defaults to the one current at
    /// construction, then the one current at trigger time.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }
}

impl<T: Truthy> MutationOptions<T> {
    pub fn response_check(mut self, check: ResponseCheck) -> Self {
        self.response_filter = match check {
            ResponseCheck::Defined => None,
            ResponseCheck::Truthy => Some(<T as Truthy>::is_truthy),
        };
        self
    }

    /// Treats falsy responses (`0`, `""`, `false`, ...) as absent.
    pub fn truthy_response(self) -> Self {
        self.response_check(ResponseCheck::Truthy)
    }
}

/// Controller for a single action. See the module docs.
pub struct Mutation<T, P = FormData> {
    shared: Arc<Shared<T, P>>,
    settlements: UnboundedReceiver<Settlement<T>>,
    on_success: CallbackRef<SuccessCallback<T>>,
    on_error: CallbackRef<ErrorCallback<T>>,
    response_filter: Option<fn(&T) -> bool>,
}

impl<T, P> Mutation<T, P>
where
    T: Clone + Send + 'static,
    P: Send + 'static,
{
    pub fn new(action: impl Action<T, P> + 'static, options: MutationOptions<T>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let action: Box<dyn Action<T, P>> = Box::new(action);
        let runtime = options.runtime.or_else(|| Handle::try_current().ok());

        let shared = Arc::new(Shared {
            state: Mutex::new(MutationState::new(options.initial_state)),
            action: CallbackRef::new(Some(action)),
            settlements: tx,
            runtime,
        });

        Self {
            shared,
            settlements: rx,
            on_success: CallbackRef::new(options.on_success),
            on_error: CallbackRef::new(options.on_error),
            response_filter: options.response_filter,
        }
    }

    /// The trigger for this mutation. Always the same trigger.
    pub fn trigger(&self) -> Trigger<T, P> {
        Trigger::new(Arc::clone(&self.shared))
    }

    pub fn is_pending(&self) -> bool {
        self.shared.lock_state().is_pending()
    }

    /// Latest settled envelope, or the seed if nothing has settled yet.
    pub fn data(&self) -> Option<Envelope<T>> {
        self.shared.lock_state().data.clone()
    }

    pub fn state(&self) -> MutationState<T> {
        self.shared.lock_state().clone()
    }

    /// Replaces the callbacks and response check.
    ///
    /// Missing callbacks clear their slot. Nothing fires as a result of this
    /// call; runs still in flight report to the new callbacks.
    pub fn reconfigure(&mut self, options: MutationOptions<T>) {
        self.on_success.set(options.on_success);
        self.on_error.set(options.on_error);
        self.response_filter = options.response_filter;
    }

    /// Swaps the action used by future triggers. Runs in flight keep the
    /// action they started with.
    pub fn set_action(&self, action: impl Action<T, P> + 'static) {
        let action: Box<dyn Action<T, P>> = Box::new(action);
        self.shared.action.set(Some(action));
    }

    /// Applies every settlement that has already arrived, without waiting.
    pub fn pump(&mut self) -> Vec<Notification> {
        let mut notifications = Vec::new();
        while let Ok(settlement) = self.settlements.try_recv() {
            notifications.push(self.apply(settlement));
        }
        notifications
    }

    /// Waits for the next settlement and applies it.
    ///
    /// Returns `None` straight away when nothing is pending or queued.
    pub async fn next_settlement(&mut self) -> Option<Notification> {
        if let Ok(settlement) = self.settlements.try_recv() {
            return Some(self.apply(settlement));
        }
        if !self.is_pending() {
            return None;
        }
        let settlement = self.settlements.recv().await?;
        Some(self.apply(settlement))
    }

    /// Applies settlements until nothing is pending.
    pub async fn settle(&mut self) -> Vec<Notification> {
        let mut notifications = Vec::new();
        while let Some(notification) = self.next_settlement().await {
            notifications.push(notification);
        }
        notifications
    }

    fn apply(&mut self, settlement: Settlement<T>) -> Notification {
        let Settlement { seq, envelope } = settlement;
        let effect = update(&mut *self.shared.lock_state(), Event::Settled(envelope));
        debug!("Settlement #{seq} applied ({effect:?})");

        match effect {
            Effect::Notify => self.notify(),
            Effect::None => Notification::Skipped,
        }
    }

    /// Fires at most one callback for the current state.
    ///
    /// The state lock is released before any callback runs, so callbacks may
    /// trigger again.
    fn notify(&self) -> Notification {
        let (notification, data) = {
            let state = self.shared.lock_state();
            (select(&state, self.response_filter), state.data.clone())
        };

        match (notification, data) {
            (Notification::Success, Some(envelope)) => {
                info!("Mutation succeeded");
                if self.on_success.invoke(|cb| cb(&envelope)).is_none() {
                    debug!("No success callback configured");
                }
            }
            (Notification::Error, Some(envelope)) => {
                let message = envelope.error().unwrap_or_default();
                info!("Mutation failed: {message}");
                if self.on_error.invoke(|cb| cb(&envelope, message)).is_none() {
                    debug!("No error callback configured");
                }
            }
            _ => debug!("Settlement has nothing to report"),
        }

        notification
    }
}

impl<T, P> Drop for Mutation<T, P> {
    fn drop(&mut self) {
        let in_flight = self.shared.lock_state().in_flight;
        if in_flight > 0 {
            debug!("Mutation dropped with {in_flight} run(s) in flight; their settlements will be discarded");
        }
    }
}

impl<T: fmt::Debug, P> fmt::Debug for Mutation<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation")
            .field("state", &*self.shared.lock_state())
            .field("on_success", &self.on_success)
            .field("on_error", &self.on_error)
            .finish()
    }
}
