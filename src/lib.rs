//! Mutator library exports

pub mod core;
pub mod mutation;
pub mod payload;

#[cfg(test)]
pub mod test_support;

pub use crate::core::{
    Action, ActionFn, CallbackRef, Envelope, MutationState, Notification, Rejection,
    ResponseCheck, Truthy, action_fn, normalize,
};
pub use mutation::{Mutation, MutationOptions, Trigger};
pub use payload::FormData;
