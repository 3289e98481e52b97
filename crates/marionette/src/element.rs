//! Opaque component handles over a toolkit-specific backend.
//!
//! A [`Component`] is a cheap, cloneable handle to one live widget or
//! window. Identity follows the backend's object id, never the handle
//! itself, so two handles to the same widget compare equal and hash the
//! same. The finder relies on this to de-duplicate diamond-shaped
//! reachability (e.g. a window found both directly and via an owner chain).

use crate::errors::AutomationError;
use std::collections::HashMap;
use std::fmt::Debug;

/// Attributes describing one component, captured at call time
#[derive(Debug, Clone, Default)]
pub struct ComponentAttributes {
    pub role: String,
    pub name: Option<String>,
    pub bounds: Option<(f64, f64, f64, f64)>,
    pub enabled: bool,
    pub showing: bool,
    pub focused: bool,
    pub properties: HashMap<String, Option<serde_json::Value>>,
}

/// Interface for toolkit-specific component implementations
pub trait ComponentImpl: Send + Sync + Debug {
    /// Stable identity of the underlying widget for the widget's lifetime
    fn object_id(&self) -> usize;
    /// Widget kind, e.g. "Window", "Button", "Menu"
    fn role(&self) -> String;
    fn name(&self) -> Option<String>;
    fn attributes(&self) -> ComponentAttributes;

    /// Children owned by this container. Implicit relations (popups, proxy
    /// icons, owned windows) are contributed separately by the hierarchy
    /// model and must not be reported here.
    fn children(&self) -> Result<Vec<Component>, AutomationError>;
    fn parent(&self) -> Result<Option<Component>, AutomationError>;

    /// Bounds relative to the parent: x, y, width, height
    fn bounds(&self) -> Result<(f64, f64, f64, f64), AutomationError>;
    /// Absolute screen position of the component origin, or `None` while
    /// the component is not realized on screen
    fn screen_position(&self) -> Result<Option<(i32, i32)>, AutomationError>;

    fn is_visible(&self) -> Result<bool, AutomationError>;
    /// Visible and all ancestors visible
    fn is_showing(&self) -> Result<bool, AutomationError>;
    fn is_enabled(&self) -> Result<bool, AutomationError>;
    fn is_focused(&self) -> Result<bool, AutomationError>;

    /// Whether this component is a top-level window
    fn is_window(&self) -> bool;
    /// Whether this window grabs all input on its queue while showing
    fn is_modal(&self) -> Result<bool, AutomationError> {
        Ok(false)
    }
    /// The top-level window this component lives in, resolved transiently
    /// by walking parents, never stored as a back-pointer
    fn window(&self) -> Result<Option<Component>, AutomationError>;

    fn request_focus(&self) -> Result<(), AutomationError>;
    /// Bring the owning window to the front
    fn raise(&self) -> Result<(), AutomationError>;
    /// Grow the window by one pixel and restore it, provoking the toolkit
    /// into completing input registration
    fn nudge_resize(&self) -> Result<(), AutomationError>;

    // Implicit-relation capabilities. A backend only overrides the ones its
    // widget kind can answer.

    /// The popup currently attached to this menu, if any
    fn attached_popup(&self) -> Result<Option<Component>, AutomationError> {
        Ok(None)
    }
    /// The desktop icon standing in for this iconified frame, if any
    fn proxy_icon(&self) -> Result<Option<Component>, AutomationError> {
        Ok(None)
    }
    /// Windows owned by this window
    fn owned_windows(&self) -> Result<Vec<Component>, AutomationError> {
        Ok(Vec::new())
    }

    fn as_any(&self) -> &dyn std::any::Any;
    fn clone_box(&self) -> Box<dyn ComponentImpl>;
}

/// Opaque handle to one widget or window in the live hierarchy
#[derive(Debug)]
pub struct Component {
    inner: Box<dyn ComponentImpl>,
}

impl Component {
    pub fn new(impl_: Box<dyn ComponentImpl>) -> Self {
        Self { inner: impl_ }
    }

    /// Backend identity of the underlying widget
    pub fn object_id(&self) -> usize {
        self.inner.object_id()
    }

    pub fn role(&self) -> String {
        self.inner.role()
    }

    pub fn name(&self) -> Option<String> {
        self.inner.name()
    }

    pub fn attributes(&self) -> ComponentAttributes {
        self.inner.attributes()
    }

    /// Explicit container children only; see
    /// [`ComponentHierarchy::children_of`](crate::hierarchy::ComponentHierarchy::children_of)
    /// for the full child set including implicit relations.
    pub fn children(&self) -> Result<Vec<Component>, AutomationError> {
        self.inner.children()
    }

    pub fn parent(&self) -> Result<Option<Component>, AutomationError> {
        self.inner.parent()
    }

    pub fn bounds(&self) -> Result<(f64, f64, f64, f64), AutomationError> {
        self.inner.bounds()
    }

    pub fn screen_position(&self) -> Result<Option<(i32, i32)>, AutomationError> {
        self.inner.screen_position()
    }

    /// Absolute screen coordinates of the component center, or `None`
    /// while the component is not realized
    pub fn center_on_screen(&self) -> Result<Option<(i32, i32)>, AutomationError> {
        let Some((x, y)) = self.inner.screen_position()? else {
            return Ok(None);
        };
        let (_, _, w, h) = self.inner.bounds()?;
        Ok(Some((x + (w / 2.0) as i32, y + (h / 2.0) as i32)))
    }

    pub fn is_visible(&self) -> Result<bool, AutomationError> {
        self.inner.is_visible()
    }

    pub fn is_showing(&self) -> Result<bool, AutomationError> {
        self.inner.is_showing()
    }

    pub fn is_enabled(&self) -> Result<bool, AutomationError> {
        self.inner.is_enabled()
    }

    pub fn is_focused(&self) -> Result<bool, AutomationError> {
        self.inner.is_focused()
    }

    pub fn is_window(&self) -> bool {
        self.inner.is_window()
    }

    pub fn is_modal(&self) -> Result<bool, AutomationError> {
        self.inner.is_modal()
    }

    /// The top-level window containing this component
    pub fn window(&self) -> Result<Option<Component>, AutomationError> {
        self.inner.window()
    }

    pub fn request_focus(&self) -> Result<(), AutomationError> {
        self.inner.request_focus()
    }

    pub fn raise(&self) -> Result<(), AutomationError> {
        self.inner.raise()
    }

    pub fn nudge_resize(&self) -> Result<(), AutomationError> {
        self.inner.nudge_resize()
    }

    pub fn attached_popup(&self) -> Result<Option<Component>, AutomationError> {
        self.inner.attached_popup()
    }

    pub fn proxy_icon(&self) -> Result<Option<Component>, AutomationError> {
        self.inner.proxy_icon()
    }

    pub fn owned_windows(&self) -> Result<Vec<Component>, AutomationError> {
        self.inner.owned_windows()
    }

    /// Get the underlying implementation as a specific type
    pub fn as_any(&self) -> &dyn std::any::Any {
        self.inner.as_any()
    }

    /// Short human-readable description used in diagnostics and logs
    pub fn describe(&self) -> String {
        match self.name() {
            Some(name) => format!("[{}] \"{}\"", self.role(), name),
            None => format!("[{}]", self.role()),
        }
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.inner.object_id() == other.inner.object_id()
    }
}

impl Eq for Component {}

impl std::hash::Hash for Component {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.object_id().hash(state);
    }
}

impl Clone for Component {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone_box(),
        }
    }
}
