use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use log::{debug, warn};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;

use crate::core::action::Action;
use crate::core::callback_ref::CallbackRef;
use crate::core::envelope::{Envelope, Rejection, panic_message};
use crate::core::state::{Event, MutationState, update};

pub const NO_RUNTIME_MESSAGE: &str = "no async runtime available to run the action";
pub const NO_ACTION_MESSAGE: &str = "no action configured";
pub const ABANDONED_MESSAGE: &str = "action was dropped before it settled";

/// State shared between a `Mutation` and every `Trigger` handed out for it.
pub(super) struct Shared<T, P> {
    pub(super) state: Mutex<MutationState<T>>,
    pub(super) action: CallbackRef<dyn Action<T, P>>,
    pub(super) settlements: UnboundedSender<Settlement<T>>,
    pub(super) runtime: Option<Handle>,
}

impl<T, P> Shared<T, P> {
    pub(super) fn lock_state(&self) -> MutexGuard<'_, MutationState<T>> {
        // A panicking callback must not wedge the mutation.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The outcome of one action run, on its way back to the owning `Mutation`.
pub(super) struct Settlement<T> {
    pub(super) seq: u64,
    pub(super) envelope: Option<Envelope<T>>,
}

/// Owns the right to settle one run.
///
/// Exactly one settlement is posted per run: the action's envelope through
/// [`SettlementSlot::post`], or a failure if the slot is dropped first. The
/// runtime drops the spawned run when it has shut down or shuts down
/// mid-flight.
struct SettlementSlot<T> {
    seq: u64,
    settlements: Option<UnboundedSender<Settlement<T>>>,
}

impl<T> SettlementSlot<T> {
    fn new(seq: u64, settlements: UnboundedSender<Settlement<T>>) -> Self {
        Self {
            seq,
            settlements: Some(settlements),
        }
    }

    fn post(mut self, envelope: Option<Envelope<T>>) {
        if let Some(settlements) = self.settlements.take() {
            send(&settlements, self.seq, envelope);
        }
    }
}

impl<T> Drop for SettlementSlot<T> {
    fn drop(&mut self) {
        if let Some(settlements) = self.settlements.take() {
            warn!("Trigger #{}: {ABANDONED_MESSAGE}", self.seq);
            send(&settlements, self.seq, Some(Envelope::failure(ABANDONED_MESSAGE)));
        }
    }
}

fn send<T>(settlements: &UnboundedSender<Settlement<T>>, seq: u64, envelope: Option<Envelope<T>>) {
    if settlements.send(Settlement { seq, envelope }).is_err() {
        debug!("Settlement #{seq} discarded: mutation dropped");
    }
}

/// Entry point that schedules the mutation's action.
///
/// Every `Trigger` obtained from the same `Mutation` is the same trigger:
/// [`Trigger::ptr_eq`] holds across reconfiguration, including action swaps.
/// Calling it never panics and never blocks; failures come back as a failed
/// envelope on a later settlement.
pub struct Trigger<T, P> {
    shared: Arc<Shared<T, P>>,
}

impl<T, P> Trigger<T, P> {
    pub(super) fn new(shared: Arc<Shared<T, P>>) -> Self {
        Self { shared }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<T, P> Trigger<T, P>
where
    T: Clone + Send + 'static,
    P: Send + 'static,
{
    /// Runs the action with `payload` and the current envelope.
    pub fn call(&self, payload: P) {
        let (seq, previous) = {
            let mut state = self.shared.lock_state();
            update(&mut state, Event::Triggered);
            (state.triggered, state.data.clone())
        };

        let Some(action) = self.shared.action.current() else {
            warn!("Trigger #{seq}: {NO_ACTION_MESSAGE}");
            self.post(seq, Some(Envelope::failure(NO_ACTION_MESSAGE)));
            return;
        };

        let runtime = self
            .shared
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok());
        let Some(runtime) = runtime else {
            warn!("Trigger #{seq}: {NO_RUNTIME_MESSAGE}");
            self.post(seq, Some(Envelope::failure(NO_RUNTIME_MESSAGE)));
            return;
        };

        debug!("Trigger #{seq}: scheduling action");
        let slot = SettlementSlot::new(seq, self.shared.settlements.clone());
        runtime.spawn(async move {
            let envelope = run_guarded(&**action, previous, payload).await;
            slot.post(envelope);
        });
    }

    fn post(&self, seq: u64, envelope: Option<Envelope<T>>) {
        send(&self.shared.settlements, seq, envelope);
    }
}

/// Runs the action, turning a panic into a failed envelope.
async fn run_guarded<T, P>(
    action: &dyn Action<T, P>,
    previous: Option<Envelope<T>>,
    payload: P,
) -> Option<Envelope<T>> {
    match AssertUnwindSafe(action.run(previous, payload))
        .catch_unwind()
        .await
    {
        Ok(envelope) => envelope,
        Err(panic) => {
            let rejection = Rejection::Panic(panic_message(panic));
            warn!("Action {rejection}");
            Some(Envelope::Failure(rejection.message()))
        }
    }
}

impl<T, P> Clone for Trigger<T, P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, P> fmt::Debug for Trigger<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("shared", &Arc::as_ptr(&self.shared))
            .finish()
    }
}
