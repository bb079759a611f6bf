//! # Response Presence
//!
//! Decides whether a successful envelope "has a response" worth reporting.
//!
//! - `Defined`: any `Success(Some(_))` counts. This is the default.
//! - `Truthy`: the response must also be truthy. `0`, `""`, `false`,
//!   `None` and JSON `null` count as absent. This is a known quirk
//!   kept for hosts that relied on it; opt in explicitly.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResponseCheck {
    #[default]
    Defined,
    Truthy,
}

impl ResponseCheck {
    pub fn label(&self) -> &'static str {
        match self {
            ResponseCheck::Defined => "defined",
            ResponseCheck::Truthy => "truthy",
        }
    }
}

impl fmt::Display for ResponseCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ResponseCheck {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "defined" => Ok(ResponseCheck::Defined),
            "truthy" => Ok(ResponseCheck::Truthy),
            other => Err(format!("unknown response check: {other}")),
        }
    }
}

/// Loose truthiness, in the sense of a dynamically typed host.
pub trait Truthy {
    fn is_truthy(&self) -> bool;
}

macro_rules! truthy_int {
    ($($t:ty),*) => {
        $(impl Truthy for $t {
            fn is_truthy(&self) -> bool {
                *self != 0
            }
        })*
    };
}

truthy_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl Truthy for f32 {
    fn is_truthy(&self) -> bool {
        *self != 0.0 && !self.is_nan()
    }
}

impl Truthy for f64 {
    fn is_truthy(&self) -> bool {
        *self != 0.0 && !self.is_nan()
    }
}

impl Truthy for bool {
    fn is_truthy(&self) -> bool {
        *self
    }
}

impl Truthy for () {
    fn is_truthy(&self) -> bool {
        false
    }
}

impl Truthy for str {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl Truthy for String {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

// Like JSON arrays, an empty Vec is still truthy.
impl<T> Truthy for Vec<T> {
    fn is_truthy(&self) -> bool {
        true
    }
}

impl<T: Truthy> Truthy for Option<T> {
    fn is_truthy(&self) -> bool {
        self.as_ref().is_some_and(Truthy::is_truthy)
    }
}

impl<T: Truthy + ?Sized> Truthy for &T {
    fn is_truthy(&self) -> bool {
        (**self).is_truthy()
    }
}

impl Truthy for serde_json::Value {
    fn is_truthy(&self) -> bool {
        use serde_json::Value;
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
            Value::String(s) => !s.is_empty(),
            // Objects and arrays are always truthy, even when empty.
            Value::Array(_) | Value::Object(_) => true,
        }
    }
}
