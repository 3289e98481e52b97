//! Rendering component subtrees for diagnostics.
//!
//! Produces the indented `#index [Role] name (…)` dump attached to failed
//! lookups, and a serializable snapshot type for embedders that want to
//! ship the searched tree elsewhere.

use crate::element::Component;
use crate::errors::AutomationError;
use crate::hierarchy::ComponentHierarchy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A point-in-time copy of one node and its subtree
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ComponentSnapshot {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<(f64, f64, f64, f64)>,
    pub showing: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<ComponentSnapshot>,
}

/// Capture a subtree as it exists right now, implicit children included
pub fn snapshot(
    hierarchy: &ComponentHierarchy,
    node: &Component,
) -> Result<ComponentSnapshot, AutomationError> {
    let mut visited = HashSet::new();
    snapshot_node(hierarchy, node, &mut visited)
}

fn snapshot_node(
    hierarchy: &ComponentHierarchy,
    node: &Component,
    visited: &mut HashSet<usize>,
) -> Result<ComponentSnapshot, AutomationError> {
    let mut children = Vec::new();
    if visited.insert(node.object_id()) {
        for child in hierarchy.children_of(node)? {
            children.push(snapshot_node(hierarchy, &child, visited)?);
        }
    }
    Ok(ComponentSnapshot {
        role: node.role(),
        name: node.name(),
        bounds: node.bounds().ok(),
        showing: node.is_showing().unwrap_or(false),
        children,
    })
}

/// Render one subtree as an indented dump:
///
/// ```text
/// #1 [Window] "main" (bounds: [0,0,640,480], showing)
///   #2 [Button] "ok" (bounds: [10,10,80,24], showing)
///   #3 [Label] (hidden)
/// ```
pub fn format_subtree(
    hierarchy: &ComponentHierarchy,
    root: &Component,
) -> Result<String, AutomationError> {
    let snapshot = snapshot(hierarchy, root)?;
    let mut output = String::new();
    let mut next_index = 1u32;
    format_node(&snapshot, 0, &mut output, &mut next_index);
    Ok(output)
}

/// Render every root visible to the hierarchy
pub fn format_hierarchy(hierarchy: &ComponentHierarchy) -> Result<String, AutomationError> {
    let mut output = String::new();
    let mut next_index = 1u32;
    for root in hierarchy.roots()? {
        let snapshot = snapshot(hierarchy, &root)?;
        format_node(&snapshot, 0, &mut output, &mut next_index);
    }
    if output.is_empty() {
        output.push_str("(no roots)\n");
    }
    Ok(output)
}

fn format_node(node: &ComponentSnapshot, indent: usize, output: &mut String, next_index: &mut u32) {
    output.push_str(&"  ".repeat(indent));
    output.push_str(&format!("#{} [{}]", next_index, node.role));
    *next_index += 1;
    if let Some(name) = &node.name {
        output.push_str(&format!(" \"{name}\""));
    }
    let mut details = Vec::new();
    if let Some((x, y, w, h)) = node.bounds {
        details.push(format!("bounds: [{x:.0},{y:.0},{w:.0},{h:.0}]"));
    }
    details.push(if node.showing { "showing" } else { "hidden" }.to_string());
    output.push_str(&format!(" ({})", details.join(", ")));
    output.push('\n');
    for child in &node.children {
        format_node(child, indent + 1, output, next_index);
    }
}
