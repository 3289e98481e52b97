//! The live component hierarchy: roots, children, and implicit relations.
//!
//! Children of a node are the union of its explicit container children and
//! whatever the implicit-relation strategies contribute (a menu's attached
//! popup, an iconified frame's proxy icon, a window's owned windows).
//! Implicit children are recomputed on every traversal and never cached;
//! they reflect transient toolkit state that can change between calls.

use crate::element::Component;
use crate::errors::AutomationError;
use crate::toolkit::ToolkitBackend;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// One source of implicit parent-child edges.
///
/// Strategies are consulted in order and each contributes zero or more
/// extra children for a node. The list is open: embedders can append their
/// own relation for toolkit-specific ownership edges.
pub trait ImplicitRelation: Send + Sync {
    fn name(&self) -> &'static str;
    fn extra_children(&self, node: &Component) -> Result<Vec<Component>, AutomationError>;
}

/// A menu's currently attached popup
struct MenuPopupRelation;

impl ImplicitRelation for MenuPopupRelation {
    fn name(&self) -> &'static str {
        "menu-popup"
    }

    fn extra_children(&self, node: &Component) -> Result<Vec<Component>, AutomationError> {
        Ok(node.attached_popup()?.into_iter().collect())
    }
}

/// The desktop icon standing in for an iconified frame
struct IconifiedFrameRelation;

impl ImplicitRelation for IconifiedFrameRelation {
    fn name(&self) -> &'static str {
        "iconified-frame"
    }

    fn extra_children(&self, node: &Component) -> Result<Vec<Component>, AutomationError> {
        Ok(node.proxy_icon()?.into_iter().collect())
    }
}

/// Windows transitively owned by a window
struct OwnedWindowsRelation;

impl ImplicitRelation for OwnedWindowsRelation {
    fn name(&self) -> &'static str {
        "owned-windows"
    }

    fn extra_children(&self, node: &Component) -> Result<Vec<Component>, AutomationError> {
        if !node.is_window() {
            return Ok(Vec::new());
        }
        node.owned_windows()
    }
}

/// Model of the live widget tree for one automation session
pub struct ComponentHierarchy {
    toolkit: Arc<dyn ToolkitBackend>,
    relations: Vec<Box<dyn ImplicitRelation>>,
    ignored: Mutex<HashSet<usize>>,
}

impl ComponentHierarchy {
    /// A hierarchy exposing everything the toolkit knows about
    pub fn new(toolkit: Arc<dyn ToolkitBackend>) -> Self {
        Self {
            toolkit,
            relations: vec![
                Box::new(MenuPopupRelation),
                Box::new(IconifiedFrameRelation),
                Box::new(OwnedWindowsRelation),
            ],
            ignored: Mutex::new(HashSet::new()),
        }
    }

    /// A hierarchy that ignores every window existing at creation time,
    /// letting a fresh session coexist with whatever is already on screen
    /// (including an implicitly shared native dialog owner)
    pub fn new_ignoring_existing(
        toolkit: Arc<dyn ToolkitBackend>,
    ) -> Result<Self, AutomationError> {
        let hierarchy = Self::new(toolkit);
        let existing = hierarchy.toolkit.root_windows()?;
        {
            let mut ignored = hierarchy
                .ignored
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            for root in &existing {
                ignored.insert(root.object_id());
            }
        }
        debug!(
            ignored = existing.len(),
            "created hierarchy ignoring pre-existing windows"
        );
        Ok(hierarchy)
    }

    /// Append an implicit-relation strategy, consulted after the built-in ones
    pub fn add_relation(&mut self, relation: Box<dyn ImplicitRelation>) {
        self.relations.push(relation);
    }

    /// Mark a node (and thereby the subtree it roots) as invisible to this
    /// session's traversals
    pub fn ignore(&self, component: &Component) {
        self.ignored
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(component.object_id());
    }

    /// Undo [`ignore`](Self::ignore)
    pub fn recognize(&self, component: &Component) {
        self.ignored
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&component.object_id());
    }

    pub fn is_ignored(&self, component: &Component) -> bool {
        self.ignored
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&component.object_id())
    }

    /// All root windows visible to this session
    pub fn roots(&self) -> Result<Vec<Component>, AutomationError> {
        let roots = self.toolkit.root_windows()?;
        Ok(roots
            .into_iter()
            .filter(|r| !self.is_ignored(r))
            .collect())
    }

    /// Explicit children plus implicit relations, computed per call.
    /// Order: explicit children first, then each strategy's contribution
    /// in strategy order; duplicates are dropped.
    pub fn children_of(&self, node: &Component) -> Result<Vec<Component>, AutomationError> {
        let mut seen: HashSet<usize> = HashSet::new();
        let mut children = Vec::new();
        for child in node.children()? {
            if self.is_ignored(&child) {
                continue;
            }
            if seen.insert(child.object_id()) {
                children.push(child);
            }
        }
        for relation in &self.relations {
            let extra = match relation.extra_children(node) {
                Ok(extra) => extra,
                Err(e) => {
                    // A widget disposed mid-traversal must not abort the walk
                    warn!(relation = relation.name(), error = %e, "implicit relation failed");
                    continue;
                }
            };
            for child in extra {
                if self.is_ignored(&child) {
                    continue;
                }
                if seen.insert(child.object_id()) {
                    children.push(child);
                }
            }
        }
        Ok(children)
    }
}
