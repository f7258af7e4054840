use serde::{Deserialize, Serialize};

/// Task priority. Higher values are dequeued first.
///
/// The repo this replaced had two conflicting priority representations — a
/// string enum on one surface and an integer enum on another. This is the
/// single canonical form; strings only exist at the HTTP boundary, mapped
/// in and out via [`Priority::from_label`] / [`Priority::label`].
///
/// # Examples
/// ```
/// use taskq_domain::Priority;
///
/// assert!(Priority::High > Priority::Normal);
/// assert_eq!(Priority::from_label("critical"), Some(Priority::Critical));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum Priority {
    Low = 1,
    Normal = 2,
    High = 3,
    Critical = 4,
}

impl Priority {
    /// Maps the HTTP-facing priority label to its canonical value.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Reconstructs a priority from the small integer stored in the record
    /// and broker envelope. Returns `None` for any value outside 1..=4.
    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            1 => Some(Self::Low),
            2 => Some(Self::Normal),
            3 => Some(Self::High),
            4 => Some(Self::Critical),
            _ => None,
        }
    }

    pub fn as_i16(self) -> i16 {
        self as i16
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_urgency() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
    }

    #[test]
    fn label_round_trips() {
        for p in [Priority::Low, Priority::Normal, Priority::High, Priority::Critical] {
            assert_eq!(Priority::from_label(p.label()), Some(p));
            assert_eq!(Priority::from_i16(p.as_i16()), Some(p));
        }
    }

    #[test]
    fn unknown_label_is_none() {
        assert_eq!(Priority::from_label("urgent"), None);
        assert_eq!(Priority::from_i16(0), None);
    }
}
