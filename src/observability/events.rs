//! Observable events
//!
//! Events are explicit and typed. Every log line carries exactly one.

use std::fmt;

/// Observable events of the engine and its clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Engine
    /// A full node was replaced by a folded copy
    SplitPerformed,
    /// A referencer was rewritten to point at a replacement
    PointerRewritten,

    // Structure
    /// The structure's root node was replaced by a split
    RootReplaced,
    /// A past-the-end index fell back to the configured policy
    PastEndFallback,
    /// A mutating operation was rejected
    OperationRejected,

    // Configuration
    /// Configuration loaded
    ConfigLoaded,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::SplitPerformed => "NODE_SPLIT",
            Event::PointerRewritten => "POINTER_REWRITTEN",
            Event::RootReplaced => "ROOT_REPLACED",
            Event::PastEndFallback => "PAST_END_FALLBACK",
            Event::OperationRejected => "OPERATION_REJECTED",
            Event::ConfigLoaded => "CONFIG_LOADED",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_distinct_names() {
        let events = [
            Event::SplitPerformed,
            Event::PointerRewritten,
            Event::RootReplaced,
            Event::PastEndFallback,
            Event::OperationRejected,
            Event::ConfigLoaded,
        ];

        let mut names: Vec<_> = events.iter().map(Event::as_str).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), events.len());
    }

    #[test]
    fn test_display_matches_as_str() {
        assert_eq!(Event::RootReplaced.to_string(), "ROOT_REPLACED");
    }
}
