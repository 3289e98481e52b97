//! Criteria for selecting components during a lookup.

use crate::element::Component;
use std::fmt;

/// A predicate over components, pluggable into the finder
pub trait ComponentMatcher: Send + Sync {
    /// Whether the candidate matches. Backend faults while interrogating a
    /// candidate (e.g. a widget disposed mid-traversal) count as "no
    /// match", never as an aborted search.
    fn matches(&self, candidate: &Component) -> bool;

    /// Human-readable description used in lookup diagnostics
    fn description(&self) -> String;
}

/// Declarative criteria: name and/or role, plus a visibility requirement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchCriteria {
    pub name: Option<String>,
    pub role: Option<String>,
    pub require_showing: bool,
    /// Set when parsed from an unrecognized string; surfaces at find time
    invalid: Option<String>,
}

impl MatchCriteria {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn by_role(role: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            ..Self::default()
        }
    }

    /// Require the candidate to be showing on screen
    pub fn showing(mut self, require: bool) -> Self {
        self.require_showing = require;
        self
    }

    pub fn and_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn and_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// The parse error carried by criteria built from an invalid string
    pub fn invalid_reason(&self) -> Option<&str> {
        self.invalid.as_deref()
    }
}

impl ComponentMatcher for MatchCriteria {
    fn matches(&self, candidate: &Component) -> bool {
        if self.invalid.is_some() {
            return false;
        }
        if let Some(role) = &self.role {
            if !candidate.role().eq_ignore_ascii_case(role) {
                return false;
            }
        }
        if let Some(name) = &self.name {
            match candidate.name() {
                Some(candidate_name) if candidate_name == *name => {}
                _ => return false,
            }
        }
        if self.require_showing {
            return candidate.is_showing().unwrap_or(false);
        }
        true
    }

    fn description(&self) -> String {
        format!("{self}")
    }
}

impl fmt::Display for MatchCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(reason) = &self.invalid {
            return write!(f, "invalid criteria ({reason})");
        }
        let mut parts = Vec::new();
        if let Some(role) = &self.role {
            parts.push(format!("type:{role}"));
        }
        if let Some(name) = &self.name {
            parts.push(format!("name:{name}"));
        }
        if self.require_showing {
            parts.push("showing:true".to_string());
        }
        if parts.is_empty() {
            parts.push("any".to_string());
        }
        write!(f, "{}", parts.join(" && "))
    }
}

impl From<&str> for MatchCriteria {
    /// Parse criteria from segments joined by `&&`:
    /// `name:…`, `type:…`, `showing:true|false`.
    ///
    /// An unrecognized segment yields criteria that match nothing and
    /// report the reason when the lookup fails.
    fn from(s: &str) -> Self {
        let mut criteria = MatchCriteria::default();
        for segment in s.split("&&") {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            match segment.split_once(':') {
                Some(("name", value)) | Some(("Name", value)) => {
                    criteria.name = Some(value.trim().to_string());
                }
                Some(("type", value)) | Some(("role", value)) => {
                    criteria.role = Some(value.trim().to_string());
                }
                Some(("showing", value)) => {
                    criteria.require_showing = value.trim().eq_ignore_ascii_case("true");
                }
                _ => {
                    criteria.invalid = Some(format!(
                        "unknown criteria segment \"{segment}\"; use 'name:', 'type:' or 'showing:'"
                    ));
                }
            }
        }
        criteria
    }
}

impl From<String> for MatchCriteria {
    fn from(s: String) -> Self {
        MatchCriteria::from(s.as_str())
    }
}

/// An arbitrary predicate restricted to candidates of one role.
///
/// A role mismatch is "no match", never a fault: the predicate is only
/// consulted for candidates of the expected kind.
pub struct PredicateMatcher<F>
where
    F: Fn(&Component) -> bool + Send + Sync,
{
    role: Option<String>,
    require_showing: bool,
    predicate: F,
    label: String,
}

impl<F> PredicateMatcher<F>
where
    F: Fn(&Component) -> bool + Send + Sync,
{
    pub fn new(label: impl Into<String>, predicate: F) -> Self {
        Self {
            role: None,
            require_showing: false,
            predicate,
            label: label.into(),
        }
    }

    /// Only candidates of this role are offered to the predicate
    pub fn of_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn showing(mut self, require: bool) -> Self {
        self.require_showing = require;
        self
    }
}

impl<F> ComponentMatcher for PredicateMatcher<F>
where
    F: Fn(&Component) -> bool + Send + Sync,
{
    fn matches(&self, candidate: &Component) -> bool {
        if let Some(role) = &self.role {
            if !candidate.role().eq_ignore_ascii_case(role) {
                return false;
            }
        }
        if self.require_showing && !candidate.is_showing().unwrap_or(false) {
            return false;
        }
        (self.predicate)(candidate)
    }

    fn description(&self) -> String {
        match &self.role {
            Some(role) => format!("predicate \"{}\" on type:{role}", self.label),
            None => format!("predicate \"{}\"", self.label),
        }
    }
}
