//! Uniqueness-enforcing search over the component hierarchy.
//!
//! A lookup either returns exactly one component or fails: zero matches
//! raise [`AutomationError::LookupFailed`] (optionally carrying a dump of
//! the searched tree), several matches raise the same error enumerating
//! every candidate. The engine never guesses between ambiguous matches.

use crate::element::Component;
use crate::errors::AutomationError;
use crate::formatter;
use crate::hierarchy::ComponentHierarchy;
use crate::matcher::ComponentMatcher;
use crate::settings::{ComponentLookupScope, SharedSettings};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Search engine over a [`ComponentHierarchy`]
pub struct ComponentFinder {
    hierarchy: Arc<ComponentHierarchy>,
    settings: SharedSettings,
    /// Attach a rendered dump of the searched tree to zero-match failures
    include_hierarchy_on_failure: bool,
}

impl ComponentFinder {
    pub fn new(hierarchy: Arc<ComponentHierarchy>, settings: SharedSettings) -> Self {
        Self {
            hierarchy,
            settings,
            include_hierarchy_on_failure: true,
        }
    }

    pub fn include_hierarchy_on_failure(mut self, include: bool) -> Self {
        self.include_hierarchy_on_failure = include;
        self
    }

    pub fn hierarchy(&self) -> &ComponentHierarchy {
        &self.hierarchy
    }

    /// Find the single component matching `matcher` anywhere in the
    /// hierarchy
    #[instrument(level = "debug", skip(self, matcher), fields(criteria = %matcher.description()))]
    pub fn find(&self, matcher: &dyn ComponentMatcher) -> Result<Component, AutomationError> {
        let mut visited = HashSet::new();
        let mut found = Vec::new();
        for root in self.hierarchy.roots()? {
            self.collect(&root, matcher, &mut visited, &mut found)?;
        }
        self.resolve(matcher, found, None)
    }

    /// Find the single component matching `matcher` inside `root`'s subtree
    #[instrument(level = "debug", skip(self, root, matcher), fields(criteria = %matcher.description()))]
    pub fn find_in(
        &self,
        root: &Component,
        matcher: &dyn ComponentMatcher,
    ) -> Result<Component, AutomationError> {
        let mut visited = HashSet::new();
        let mut found = Vec::new();
        self.collect(root, matcher, &mut visited, &mut found)?;
        self.resolve(matcher, found, Some(root))
    }

    /// Every matching component, in traversal order. Used by callers that
    /// enumerate rather than address a unique target.
    pub fn all_matching(
        &self,
        matcher: &dyn ComponentMatcher,
    ) -> Result<Vec<Component>, AutomationError> {
        let mut visited = HashSet::new();
        let mut found = Vec::new();
        for root in self.hierarchy.roots()? {
            self.collect(&root, matcher, &mut visited, &mut found)?;
        }
        Ok(found)
    }

    /// Depth-first, children before their own node, de-duplicated so
    /// diamond reachability (a window found both directly and through an
    /// owner chain) yields a single candidate
    fn collect(
        &self,
        node: &Component,
        matcher: &dyn ComponentMatcher,
        visited: &mut HashSet<Component>,
        found: &mut Vec<Component>,
    ) -> Result<(), AutomationError> {
        if !visited.insert(node.clone()) {
            return Ok(());
        }
        for child in self.hierarchy.children_of(node)? {
            self.collect(&child, matcher, visited, found)?;
        }
        if self.in_scope(node) && matcher.matches(node) {
            found.push(node.clone());
        }
        Ok(())
    }

    fn in_scope(&self, node: &Component) -> bool {
        match self.settings.lookup_scope() {
            ComponentLookupScope::Default => true,
            ComponentLookupScope::ShowingOnly => node.is_showing().unwrap_or(false),
        }
    }

    fn resolve(
        &self,
        matcher: &dyn ComponentMatcher,
        mut found: Vec<Component>,
        root: Option<&Component>,
    ) -> Result<Component, AutomationError> {
        match found.len() {
            1 => {
                let component = found.remove(0);
                debug!(component = %component.describe(), "lookup matched");
                Ok(component)
            }
            0 => {
                let mut message =
                    format!("no component matched {}", matcher.description());
                if self.include_hierarchy_on_failure {
                    let dump = match root {
                        Some(root) => formatter::format_subtree(&self.hierarchy, root),
                        None => formatter::format_hierarchy(&self.hierarchy),
                    };
                    if let Ok(dump) = dump {
                        message.push_str("\nsearched hierarchy:\n");
                        message.push_str(&dump);
                    }
                }
                Err(AutomationError::LookupFailed(message))
            }
            n => {
                let listing = found
                    .iter()
                    .map(|c| format!("  - {}", c.describe()))
                    .collect::<Vec<_>>()
                    .join("\n");
                Err(AutomationError::LookupFailed(format!(
                    "{n} components matched {}:\n{listing}",
                    matcher.description()
                )))
            }
        }
    }
}
