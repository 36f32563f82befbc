//! Capacity error classification.
//!
//! OCI reports "no hosts left for this shape" through ordinary service errors,
//! sometimes as `InternalError` or `LimitExceeded` rather than anything
//! capacity-specific. The only signal is the error text, which is not a
//! stable API, so this is a heuristic: an ordered list of matchers run against
//! the lowercased text, first hit wins.

use std::fmt;

/// Coarse class of a provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Temporary resource exhaustion; retrying later may succeed.
    Capacity,
    /// Anything else.
    Other,
}

/// A single rule deciding whether error text signals exhausted capacity.
pub trait ErrorMatcher: Send + Sync + fmt::Debug {
    /// `text` is already lowercased.
    fn matches(&self, text: &str) -> bool;
}

/// Case-insensitive substring rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstringMatcher {
    needle: String,
}

impl SubstringMatcher {
    pub fn new(needle: impl AsRef<str>) -> Self {
        Self {
            needle: needle.as_ref().to_lowercase(),
        }
    }
}

impl ErrorMatcher for SubstringMatcher {
    fn matches(&self, text: &str) -> bool {
        text.contains(&self.needle)
    }
}

/// Markers OCI is known to use for capacity exhaustion.
pub const DEFAULT_CAPACITY_MARKERS: &[&str] = &[
    "Out of host capacity",
    "Out of capacity",
    "capacity",
    "InternalError",
    "LimitExceeded",
];

/// Ordered list of matchers; an empty list classifies everything as
/// [`ErrorClass::Other`].
#[derive(Debug)]
pub struct CapacityClassifier {
    matchers: Vec<Box<dyn ErrorMatcher>>,
}

impl Default for CapacityClassifier {
    fn default() -> Self {
        Self::from_markers(DEFAULT_CAPACITY_MARKERS)
    }
}

impl CapacityClassifier {
    /// Classifier with no rules.
    pub fn empty() -> Self {
        Self {
            matchers: Vec::new(),
        }
    }

    /// One substring rule per marker, in order.
    pub fn from_markers<S: AsRef<str>>(markers: &[S]) -> Self {
        Self {
            matchers: markers
                .iter()
                .map(|m| Box::new(SubstringMatcher::new(m)) as Box<dyn ErrorMatcher>)
                .collect(),
        }
    }

    /// Append a rule after the existing ones.
    pub fn with_matcher(mut self, matcher: impl ErrorMatcher + 'static) -> Self {
        self.matchers.push(Box::new(matcher));
        self
    }

    pub fn classify(&self, text: &str) -> ErrorClass {
        let lowered = text.to_lowercase();
        if self.matchers.iter().any(|m| m.matches(&lowered)) {
            ErrorClass::Capacity
        } else {
            ErrorClass::Other
        }
    }

    pub fn is_capacity_error(&self, text: &str) -> bool {
        self.classify(text) == ErrorClass::Capacity
    }
}
