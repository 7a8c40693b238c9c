//! Speech priority levels.
//!
//! Priorities travel on the wire as plain integers (smaller = more urgent),
//! but inside the process they are a closed enum so two call sites can never
//! invent colliding ad hoc values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How urgently a line should be spoken.
///
/// The derived `Ord` follows declaration order, which matches the wire values:
/// `Test < Interrupt < Auto < Normal`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "i32", try_from = "i32")]
pub enum Priority {
    /// Voice check triggered by an operator; jumps everything.
    Test,
    /// Barge-in line (e.g. answering a viewer comment right now).
    Interrupt,
    /// Proactively generated filler. Subject to the cancellation window.
    Auto,
    /// Scripted copy.
    #[default]
    Normal,
}

/// Coarse bucket used to route work to a worker pool and to split counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriorityTier {
    Urgent,
    Normal,
}

impl Priority {
    /// Every priority, most urgent first.
    pub const ALL: [Self; 4] = [Self::Test, Self::Interrupt, Self::Auto, Self::Normal];

    /// Integer used on the wire.
    #[must_use]
    pub const fn value(self) -> i32 {
        match self {
            Self::Test => -1,
            Self::Interrupt => 0,
            Self::Auto => 1,
            Self::Normal => 2,
        }
    }

    /// Which tier this priority belongs to.
    #[must_use]
    pub const fn tier(self) -> PriorityTier {
        match self {
            Self::Normal => PriorityTier::Normal,
            Self::Test | Self::Interrupt | Self::Auto => PriorityTier::Urgent,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Interrupt => "interrupt",
            Self::Auto => "auto",
            Self::Normal => "normal",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Priority> for i32 {
    fn from(priority: Priority) -> Self {
        priority.value()
    }
}

/// An integer or name that does not correspond to any [`Priority`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown priority {0:?}")]
pub struct UnknownPriority(pub String);

impl TryFrom<i32> for Priority {
    type Error = UnknownPriority;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|p| p.value() == value)
            .ok_or_else(|| UnknownPriority(value.to_string()))
    }
}

impl FromStr for Priority {
    type Err = UnknownPriority;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        if let Ok(value) = needle.parse::<i32>() {
            return Self::try_from(value);
        }
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == needle)
            .ok_or_else(|| UnknownPriority(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_matches_wire_values() {
        let mut sorted = Priority::ALL;
        sorted.sort();
        let values: Vec<i32> = sorted.iter().map(|p| p.value()).collect();
        assert_eq!(values, vec![-1, 0, 1, 2]);
    }

    #[test]
    fn only_normal_is_normal_tier() {
        assert_eq!(Priority::Normal.tier(), PriorityTier::Normal);
        assert_eq!(Priority::Auto.tier(), PriorityTier::Urgent);
        assert_eq!(Priority::Interrupt.tier(), PriorityTier::Urgent);
        assert_eq!(Priority::Test.tier(), PriorityTier::Urgent);
    }

    #[test]
    fn serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Priority::Auto).unwrap(), "1");
        let p: Priority = serde_json::from_str("-1").unwrap();
        assert_eq!(p, Priority::Test);
    }

    #[test]
    fn rejects_unknown_integer() {
        assert!(serde_json::from_str::<Priority>("7").is_err());
        assert!(Priority::try_from(3).is_err());
    }

    #[test]
    fn parses_names_and_numbers() {
        assert_eq!("interrupt".parse::<Priority>().unwrap(), Priority::Interrupt);
        assert_eq!("AUTO".parse::<Priority>().unwrap(), Priority::Auto);
        assert_eq!("2".parse::<Priority>().unwrap(), Priority::Normal);
        assert!("urgent".parse::<Priority>().is_err());
    }
}
