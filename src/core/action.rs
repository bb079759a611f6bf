//! # Actions
//!
//! An action is the unit of work a mutation runs. It gets the envelope from
//! the previous settlement (if any) plus the trigger payload, and returns the
//! next envelope. Returning `None` clears the state.
//!
//! ```text
//! (previous envelope, payload)  →  run()  →  next envelope
//! ```
//!
//! The controller treats actions as opaque: it never looks at the payload and
//! never validates the envelope beyond reading it for notifications.

use std::future::Future;

use async_trait::async_trait;

use super::envelope::Envelope;

#[async_trait]
pub trait Action<T, P>: Send + Sync {
    async fn run(&self, previous: Option<Envelope<T>>, payload: P) -> Option<Envelope<T>>;
}

/// Adapts a closure returning a future into an [`Action`].
///
/// ```ignore
/// let save = action_fn(|_prev, form: FormData| async move {
///     Some(normalize(|| store(form)).await)
/// });
/// ```
pub fn action_fn<F>(f: F) -> ActionFn<F> {
    ActionFn { f }
}

#[derive(Clone)]
pub struct ActionFn<F> {
    f: F,
}

#[async_trait]
impl<T, P, F, Fut> Action<T, P> for ActionFn<F>
where
    F: Fn(Option<Envelope<T>>, P) -> Fut + Send + Sync,
    Fut: Future<Output = Option<Envelope<T>>> + Send,
    T: Send + 'static,
    P: Send + 'static,
{
    async fn run(&self, previous: Option<Envelope<T>>, payload: P) -> Option<Envelope<T>> {
        (self.f)(previous, payload).await
    }
}
