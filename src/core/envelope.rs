//! # Result Envelopes
//!
//! Every action settles into an `Envelope`: either a success carrying an
//! optional response, or a failure carrying an optional message.
//!
//! ```text
//! Envelope<T>
//! ├── Success(Some(response))   // settled with something to report
//! ├── Success(None)             // settled, nothing to report
//! ├── Failure(Some(message))    // failed with a readable reason
//! └── Failure(None)             // failed, reason had no message
//! ```
//!
//! On the wire an envelope is the flat record
//! `{ "success": bool, "response"?: T, "error"?: string }`.
//!
//! `normalize()` turns any fallible async producer into an envelope. It never
//! returns an error and never lets a panic escape.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The settled outcome of an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope<T> {
    Success(Option<T>),
    Failure(Option<String>),
}

impl<T> Envelope<T> {
    pub fn success(response: T) -> Self {
        Envelope::Success(Some(response))
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Envelope::Failure(Some(message.into()))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success(_))
    }

    pub fn response(&self) -> Option<&T> {
        match self {
            Envelope::Success(response) => response.as_ref(),
            Envelope::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Envelope::Success(_) => None,
            Envelope::Failure(message) => message.as_deref(),
        }
    }

    pub fn into_result(self) -> Result<Option<T>, Option<String>> {
        match self {
            Envelope::Success(response) => Ok(response),
            Envelope::Failure(message) => Err(message),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        match self {
            Envelope::Success(response) => Envelope::Success(response.map(f)),
            Envelope::Failure(message) => Envelope::Failure(message),
        }
    }
}

impl<T> From<Result<T, Rejection>> for Envelope<T> {
    fn from(result: Result<T, Rejection>) -> Self {
        match result {
            Ok(response) => Envelope::Success(Some(response)),
            Err(rejection) => Envelope::Failure(rejection.message()),
        }
    }
}

// ============================================================================
// Wire Shape
// ============================================================================

#[derive(Serialize)]
struct RecordRef<'a, T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

#[derive(Deserialize)]
struct Record<T> {
    // A record without `success` reads as a bare failure.
    #[serde(default)]
    success: bool,
    response: Option<T>,
    error: Option<String>,
}

impl<T: Serialize> Serialize for Envelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RecordRef {
            success: self.is_success(),
            response: self.response(),
            error: self.error(),
        }
        .serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Envelope<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = Record::<T>::deserialize(deserializer)?;
        Ok(if record.success {
            Envelope::Success(record.response)
        } else {
            Envelope::Failure(record.error)
        })
    }
}

// ============================================================================
// Rejections
// ============================================================================

/// Why a producer failed.
///
/// Any `std::error::Error` converts into a `Rejection` with `?`, so producers
/// can use their own error types.
pub enum Rejection {
    /// A real error; its `Display` output becomes the envelope message.
    Error(Box<dyn std::error::Error + Send + Sync>),
    /// A reason that is not an error value. Carries no message.
    Opaque(String),
    /// The producer panicked. Carries the panic message when it was a string.
    Panic(Option<String>),
}

impl Rejection {
    pub fn opaque(reason: impl fmt::Debug) -> Self {
        Rejection::Opaque(format!("{reason:?}"))
    }

    /// The human-readable message, if this rejection has one.
    pub fn message(&self) -> Option<String> {
        match self {
            Rejection::Error(e) => Some(e.to_string()),
            Rejection::Opaque(_) => None,
            Rejection::Panic(message) => message.clone(),
        }
    }
}

impl<E: std::error::Error + Send + Sync + 'static> From<E> for Rejection {
    fn from(error: E) -> Self {
        Rejection::Error(Box::new(error))
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Error(e) => write!(f, "{e}"),
            Rejection::Opaque(reason) => write!(f, "rejected with {reason}"),
            Rejection::Panic(Some(message)) => write!(f, "panicked: {message}"),
            Rejection::Panic(None) => write!(f, "panicked"),
        }
    }
}

impl fmt::Debug for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Error(e) => f.debug_tuple("Error").field(e).finish(),
            Rejection::Opaque(reason) => f.debug_tuple("Opaque").field(reason).finish(),
            Rejection::Panic(message) => f.debug_tuple("Panic").field(message).finish(),
        }
    }
}

/// Extracts the message from a panic payload (`panic!("...")` produces
/// either a `&'static str` or a `String`).
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> Option<String> {
    match payload.downcast::<String>() {
        Ok(message) => Some(*message),
        Err(payload) => payload.downcast_ref::<&str>().map(|s| s.to_string()),
    }
}

// ============================================================================
// Normalizer
// ============================================================================

/// Runs `producer` once and folds its outcome into an envelope.
///
/// `Ok(v)` becomes `Success(Some(v))`, including unit and `None`-like values.
/// `Err(r)` becomes `Failure(r.message())`. A panic inside the producer is
/// caught and reported as a failure with the panic message.
pub async fn normalize<T, E, F, Fut>(producer: F) -> Envelope<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<Rejection>,
{
    let outcome = AssertUnwindSafe(async move { producer().await })
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(response)) => Envelope::Success(Some(response)),
        Ok(Err(reason)) => {
            let rejection = reason.into();
            debug!("Producer rejected: {}", rejection);
            Envelope::Failure(rejection.message())
        }
        Err(payload) => {
            let rejection = Rejection::Panic(panic_message(payload));
            warn!("Producer {}", rejection);
            Envelope::Failure(rejection.message())
        }
    }
}
