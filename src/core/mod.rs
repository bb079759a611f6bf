//! # Core Mutation Logic
//!
//! The pieces a mutation is built from. Nothing here spawns tasks or knows
//! about a runtime; the `mutation` module wires these into a controller.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CORE            │
//!                    │  (this module)          │
//!                    │                         │
//!                    │  • Envelope (outcome)   │
//!                    │  • CallbackRef (slots)  │
//!                    │  • MutationState        │
//!                    │  • update() (reducer)   │
//!                    └───────────┬─────────────┘
//!                                │
//!            ┌───────────────────┼───────────────────┐
//!            ▼                   ▼                   ▼
//!     ┌────────────┐      ┌────────────┐      ┌────────────┐
//!     │  Mutation  │      │  Trigger   │      │  Demo CLI  │
//!     │ (notifier) │      │  (tokio)   │      │   (clap)   │
//!     └────────────┘      └────────────┘      └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`envelope`]: `Envelope`, `Rejection` and the `normalize()` helper
//! - [`callback_ref`]: `CallbackRef`, a stable handle onto a swappable callback
//! - [`action`]: the `Action` trait, the unit of work a mutation runs
//! - [`state`]: `MutationState`, its events, and `update()`
//! - [`presence`]: what counts as "has a response"
//! - [`config`]: settings for the demo binary

pub mod action;
pub mod callback_ref;
pub mod config;
pub mod envelope;
pub mod presence;
pub mod state;

// Re-export commonly used types for convenience
pub use action::{Action, ActionFn, action_fn};
pub use callback_ref::CallbackRef;
pub use envelope::{Envelope, Rejection, normalize};
pub use presence::{ResponseCheck, Truthy};
pub use state::{MutationState, Notification};
