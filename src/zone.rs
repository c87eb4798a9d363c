//! Target zone matching.
//!
//! Decides whether a queried name belongs to the zone whose addresses are
//! rerouted. Matching is on whole labels: the zone apex itself or any
//! subdomain of it, never a bare substring.

use std::fmt;

/// The zone whose resolved addresses get rerouted.
///
/// Stored fully qualified (dot-terminated) and lowercased so queried names
/// can be compared after the same normalization.
#[derive(Debug, Clone)]
pub struct TargetZone {
    apex: String,
    suffix: String,
}

impl TargetZone {
    /// Create a matcher for `zone` (with or without a trailing dot).
    pub fn new(zone: &str) -> Self {
        let mut apex = zone.trim().trim_start_matches('.').to_lowercase();
        if !apex.ends_with('.') {
            apex.push('.');
        }
        let suffix = format!(".{apex}");

        Self { apex, suffix }
    }

    /// Check whether `name` is the zone apex or a subdomain of it.
    ///
    /// The suffix test requires the label boundary, so `evilnetflix.com.`
    /// does not match a `netflix.com.` zone.
    pub fn matches(&self, name: &str) -> bool {
        let mut name = name.to_lowercase();
        if !name.ends_with('.') {
            name.push('.');
        }

        name == self.apex || name.ends_with(&self.suffix)
    }

    /// The fully qualified zone apex.
    pub fn apex(&self) -> &str {
        &self.apex
    }
}

impl fmt::Display for TargetZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.apex)
    }
}
