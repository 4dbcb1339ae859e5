use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Passenger contact data (phone numbers, mostly) that must not leak into log lines.
///
/// `Debug` and `Display` only reveal the last few characters, so a booking can be
/// traced with `tracing::info!("{:?}", booking)` without exposing the number.
/// Serialization is transparent: API responses and the store get the real value.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

const VISIBLE_TAIL: usize = 4;

impl<T> Masked<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: AsRef<str>> Masked<T> {
    /// `0812345678` becomes `******5678`. Values too short to keep a tail are fully masked.
    pub fn redacted(&self) -> String {
        let chars: Vec<char> = self.0.as_ref().chars().collect();
        if chars.len() <= VISIBLE_TAIL {
            return "*".repeat(chars.len().max(1));
        }
        let hidden = chars.len() - VISIBLE_TAIL;
        let tail: String = chars[hidden..].iter().collect();
        format!("{}{}", "*".repeat(hidden), tail)
    }
}

impl<T: AsRef<str>> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Masked({})", self.redacted())
    }
}

impl<T: AsRef<str>> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl From<String> for Masked<String> {
    fn from(value: String) -> Self {
        Self(value)
    }
}
