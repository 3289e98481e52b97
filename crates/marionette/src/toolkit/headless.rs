//! An in-process simulated toolkit.
//!
//! Queues are real worker threads draining an mpsc channel, a faithful
//! stand-in for a GUI event thread, and components are synthetic widgets
//! that record every input event delivered to them. Window and focus
//! notifications fire on the owning queue's dispatch thread, exactly as a
//! real toolkit delivers them. This backend is what the engine's own
//! tests run against, and what embedders substitute when driving the
//! engine without a display.

use crate::element::{Component, ComponentAttributes, ComponentImpl};
use crate::errors::AutomationError;
use crate::toolkit::{
    ButtonMask, EventQueue, EventQueueImpl, FocusListener, InputEvent, KeyCode, KeyEvent, KeyKind,
    PointerEvent, PointerKind, Task, ToolkitBackend, WindowEvent, WindowListener,
};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, Weak};
use std::thread::{self, ThreadId};
use tracing::{debug, warn};

fn lock<'a, T>(m: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

enum Work {
    Input(InputEvent),
    Task(Task),
}

struct QueueState {
    id: usize,
    tx: Mutex<Option<mpsc::Sender<Work>>>,
    /// Events posted but not yet fully dispatched
    pending: AtomicUsize,
    dispatch_thread: Mutex<Option<ThreadId>>,
    toolkit: Weak<ToolkitState>,
}

impl fmt::Debug for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessQueue")
            .field("id", &self.id)
            .field("pending", &self.pending.load(Ordering::SeqCst))
            .finish()
    }
}

impl QueueState {
    fn post(&self, work: Work) -> Result<(), AutomationError> {
        let tx = lock(&self.tx);
        let Some(tx) = tx.as_ref() else {
            return Err(AutomationError::PlatformError(format!(
                "queue {} is shut down",
                self.id
            )));
        };
        self.pending.fetch_add(1, Ordering::SeqCst);
        tx.send(work).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            AutomationError::PlatformError(format!("queue {} worker exited", self.id))
        })
    }
}

impl EventQueueImpl for QueueState {
    fn queue_id(&self) -> usize {
        self.id
    }

    fn post_input(&self, event: InputEvent) -> Result<(), AutomationError> {
        self.post(Work::Input(event))
    }

    fn post_task(&self, task: Task) -> Result<(), AutomationError> {
        self.post(Work::Task(task))
    }

    fn has_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    fn is_dispatch_thread(&self) -> bool {
        *lock(&self.dispatch_thread) == Some(thread::current().id())
    }

    fn blocking_modal(&self) -> Option<Component> {
        let toolkit = self.toolkit.upgrade()?;
        let roots = lock(&toolkit.roots);
        roots
            .iter()
            .find(|node| {
                node.visible.load(Ordering::SeqCst)
                    && node.modal.load(Ordering::SeqCst)
                    && ToolkitState::queue_of(node).map(|q| q.id()) == Some(self.id)
            })
            .map(component)
    }
}

fn spawn_queue(toolkit: &Weak<ToolkitState>, id: usize) -> EventQueue {
    let (tx, rx) = mpsc::channel::<Work>();
    let state = Arc::new(QueueState {
        id,
        tx: Mutex::new(Some(tx)),
        pending: AtomicUsize::new(0),
        dispatch_thread: Mutex::new(None),
        toolkit: toolkit.clone(),
    });
    // The worker holds only a weak reference: once every queue handle is
    // gone the sender drops with the state and the thread drains out.
    let worker_state = Arc::downgrade(&state);
    *lock(&state.dispatch_thread) = thread::Builder::new()
        .name(format!("headless-queue-{id}"))
        .spawn(move || {
            while let Ok(work) = rx.recv() {
                let result = catch_unwind(AssertUnwindSafe(|| match work {
                    Work::Task(task) => task(),
                    Work::Input(event) => dispatch_input(event),
                }));
                if let Some(state) = worker_state.upgrade() {
                    state.pending.fetch_sub(1, Ordering::SeqCst);
                }
                if result.is_err() {
                    warn!(queue_id = id, "dispatched work panicked");
                }
            }
        })
        .ok()
        .map(|handle| handle.thread().id());
    EventQueue::new(state)
}

fn dispatch_input(event: InputEvent) {
    let target = match event.target() {
        Some(target) => target.clone(),
        None => return,
    };
    let Some(node) = HeadlessNode::of(&target) else {
        warn!("input event addressed to a non-headless component, dropping");
        return;
    };
    let node = node.node.clone();
    node.record(event.clone());

    // Minimal application behavior, mirroring what a real widget does with
    // these events on its dispatch thread.
    if let InputEvent::Pointer(ref pointer) = event {
        if pointer.kind == PointerKind::Press {
            if let Some(toolkit) = node.toolkit.upgrade() {
                toolkit.set_focus(Some(node.clone()));
            }
            if pointer.buttons.contains(ButtonMask::RIGHT) {
                let popup = lock(&node.popup).as_ref().and_then(Weak::upgrade);
                if let Some(popup) = popup {
                    popup.visible.store(true, Ordering::SeqCst);
                    if let Some(toolkit) = popup.toolkit.upgrade() {
                        toolkit.fire_window_event(WindowEvent::Shown(component(&popup)));
                    }
                }
            }
        }
    }
}

/// One synthetic widget
struct NodeState {
    id: usize,
    role: String,
    name: Option<String>,
    is_window: bool,
    toolkit: Weak<ToolkitState>,
    parent: Mutex<Option<Weak<NodeState>>>,
    children: Mutex<Vec<Arc<NodeState>>>,
    /// x, y, width, height; screen coordinates for windows, parent-local
    /// otherwise
    bounds: Mutex<(f64, f64, f64, f64)>,
    visible: AtomicBool,
    enabled: AtomicBool,
    modal: AtomicBool,
    closed: AtomicBool,
    /// Queue serving this window; `None` means the default queue
    queue: Mutex<Option<EventQueue>>,
    owned: Mutex<Vec<Weak<NodeState>>>,
    popup: Mutex<Option<Weak<NodeState>>>,
    icon: Mutex<Option<Weak<NodeState>>>,
    events: Mutex<Vec<InputEvent>>,
}

impl NodeState {
    fn record(&self, event: InputEvent) {
        lock(&self.events).push(event);
    }

    fn showing(&self) -> bool {
        if !self.visible.load(Ordering::SeqCst) {
            return false;
        }
        match lock(&self.parent).as_ref().and_then(Weak::upgrade) {
            Some(parent) => parent.showing(),
            None => self.is_window,
        }
    }

    fn screen_position(&self) -> Option<(i32, i32)> {
        if !self.showing() {
            return None;
        }
        let (x, y, _, _) = *lock(&self.bounds);
        match lock(&self.parent).as_ref().and_then(Weak::upgrade) {
            Some(parent) => {
                let (px, py) = parent.screen_position()?;
                Some((px + x as i32, py + y as i32))
            }
            None => Some((x as i32, y as i32)),
        }
    }

}

/// The top-level window `node` lives in, `node` itself included
fn window_node(node: &Arc<NodeState>) -> Option<Arc<NodeState>> {
    if node.is_window {
        return Some(node.clone());
    }
    let parent = lock(&node.parent).as_ref().and_then(Weak::upgrade)?;
    window_node(&parent)
}

fn component(node: &Arc<NodeState>) -> Component {
    Component::new(Box::new(HeadlessNode { node: node.clone() }))
}

/// [`ComponentImpl`] over a synthetic widget
struct HeadlessNode {
    node: Arc<NodeState>,
}

impl HeadlessNode {
    /// Downcast a generic handle back to its headless node
    fn of(c: &Component) -> Option<&HeadlessNode> {
        c.as_any().downcast_ref::<HeadlessNode>()
    }
}

impl fmt::Debug for HeadlessNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessNode")
            .field("id", &self.node.id)
            .field("role", &self.node.role)
            .field("name", &self.node.name)
            .finish()
    }
}

impl ComponentImpl for HeadlessNode {
    fn object_id(&self) -> usize {
        self.node.id
    }

    fn role(&self) -> String {
        self.node.role.clone()
    }

    fn name(&self) -> Option<String> {
        self.node.name.clone()
    }

    fn attributes(&self) -> ComponentAttributes {
        ComponentAttributes {
            role: self.node.role.clone(),
            name: self.node.name.clone(),
            bounds: Some(*lock(&self.node.bounds)),
            enabled: self.node.enabled.load(Ordering::SeqCst),
            showing: self.node.showing(),
            focused: self.is_focused().unwrap_or(false),
            properties: HashMap::new(),
        }
    }

    fn children(&self) -> Result<Vec<Component>, AutomationError> {
        Ok(lock(&self.node.children).iter().map(component).collect())
    }

    fn parent(&self) -> Result<Option<Component>, AutomationError> {
        Ok(lock(&self.node.parent)
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|p| component(&p)))
    }

    fn bounds(&self) -> Result<(f64, f64, f64, f64), AutomationError> {
        Ok(*lock(&self.node.bounds))
    }

    fn screen_position(&self) -> Result<Option<(i32, i32)>, AutomationError> {
        Ok(self.node.screen_position())
    }

    fn is_visible(&self) -> Result<bool, AutomationError> {
        Ok(self.node.visible.load(Ordering::SeqCst))
    }

    fn is_showing(&self) -> Result<bool, AutomationError> {
        Ok(self.node.showing())
    }

    fn is_enabled(&self) -> Result<bool, AutomationError> {
        Ok(self.node.enabled.load(Ordering::SeqCst))
    }

    fn is_focused(&self) -> Result<bool, AutomationError> {
        let Some(toolkit) = self.node.toolkit.upgrade() else {
            return Ok(false);
        };
        let is_focused = lock(&toolkit.focus)
            .as_ref()
            .map(|focused| focused.id == self.node.id)
            .unwrap_or(false);
        Ok(is_focused)
    }

    fn is_window(&self) -> bool {
        self.node.is_window
    }

    fn is_modal(&self) -> Result<bool, AutomationError> {
        Ok(self.node.modal.load(Ordering::SeqCst))
    }

    fn window(&self) -> Result<Option<Component>, AutomationError> {
        Ok(window_node(&self.node).map(|w| component(&w)))
    }

    fn request_focus(&self) -> Result<(), AutomationError> {
        let toolkit = upgrade(&self.node.toolkit)?;
        let queue = ToolkitState::queue_for(&toolkit, &self.node);
        let node = self.node.clone();
        queue.post_task(Box::new(move || {
            if let Some(toolkit) = node.toolkit.upgrade() {
                toolkit.set_focus(Some(node.clone()));
            }
        }))
    }

    fn raise(&self) -> Result<(), AutomationError> {
        let toolkit = upgrade(&self.node.toolkit)?;
        let queue = ToolkitState::queue_for(&toolkit, &self.node);
        let node = self.node.clone();
        queue.post_task(Box::new(move || {
            if let Some(toolkit) = node.toolkit.upgrade() {
                let mut roots = lock(&toolkit.roots);
                if let Some(pos) = roots.iter().position(|r| r.id == node.id) {
                    let raised = roots.remove(pos);
                    roots.insert(0, raised);
                }
            }
        }))
    }

    fn nudge_resize(&self) -> Result<(), AutomationError> {
        let toolkit = upgrade(&self.node.toolkit)?;
        let queue = ToolkitState::queue_for(&toolkit, &self.node);
        let node = self.node.clone();
        queue.post_task(Box::new(move || {
            let mut bounds = lock(&node.bounds);
            bounds.2 += 1.0;
        }))?;
        let node = self.node.clone();
        queue.post_task(Box::new(move || {
            let mut bounds = lock(&node.bounds);
            bounds.2 -= 1.0;
        }))
    }

    fn attached_popup(&self) -> Result<Option<Component>, AutomationError> {
        Ok(lock(&self.node.popup)
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|p| component(&p)))
    }

    fn proxy_icon(&self) -> Result<Option<Component>, AutomationError> {
        Ok(lock(&self.node.icon)
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|p| component(&p)))
    }

    fn owned_windows(&self) -> Result<Vec<Component>, AutomationError> {
        Ok(lock(&self.node.owned)
            .iter()
            .filter_map(Weak::upgrade)
            .map(|w| component(&w))
            .collect())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn clone_box(&self) -> Box<dyn ComponentImpl> {
        Box::new(HeadlessNode {
            node: self.node.clone(),
        })
    }
}

fn upgrade(toolkit: &Weak<ToolkitState>) -> Result<Arc<ToolkitState>, AutomationError> {
    toolkit
        .upgrade()
        .ok_or_else(|| AutomationError::PlatformError("toolkit has shut down".to_string()))
}

struct ToolkitState {
    default_queue: EventQueue,
    queues: Mutex<Vec<EventQueue>>,
    roots: Mutex<Vec<Arc<NodeState>>>,
    focus: Mutex<Option<Arc<NodeState>>>,
    window_listeners: Mutex<Vec<(u64, WindowListener)>>,
    focus_listeners: Mutex<Vec<(u64, FocusListener)>>,
    next_listener_id: AtomicU64,
    next_object_id: AtomicUsize,
    next_queue_id: AtomicUsize,
    pointer: Mutex<(i32, i32)>,
}

impl ToolkitState {
    fn queue_of(node: &Arc<NodeState>) -> Option<EventQueue> {
        let window = window_node(node)?;
        let queue = lock(&window.queue).clone();
        queue.or_else(|| {
            window
                .toolkit
                .upgrade()
                .map(|t| t.default_queue.clone())
        })
    }

    fn queue_for(toolkit: &ToolkitState, node: &Arc<NodeState>) -> EventQueue {
        Self::queue_of(node).unwrap_or_else(|| toolkit.default_queue.clone())
    }

    /// Runs on a dispatch thread
    fn set_focus(&self, node: Option<Arc<NodeState>>) {
        *lock(&self.focus) = node.clone();
        if let Some(node) = node {
            let owner = component(&node);
            let listeners: Vec<FocusListener> = lock(&self.focus_listeners)
                .iter()
                .map(|(_, l)| l.clone())
                .collect();
            for listener in listeners {
                listener(&owner);
            }
        }
    }

    /// Runs on a dispatch thread
    fn fire_window_event(&self, event: WindowEvent) {
        let listeners: Vec<WindowListener> = lock(&self.window_listeners)
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(&event);
        }
    }
}

/// The simulated toolkit backend
pub struct HeadlessToolkit {
    state: Arc<ToolkitState>,
}

impl HeadlessToolkit {
    pub fn new() -> Arc<Self> {
        let state = Arc::new_cyclic(|weak| {
            let default_queue = spawn_queue(weak, 0);
            ToolkitState {
                default_queue: default_queue.clone(),
                queues: Mutex::new(vec![default_queue]),
                roots: Mutex::new(Vec::new()),
                focus: Mutex::new(None),
                window_listeners: Mutex::new(Vec::new()),
                focus_listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(1),
                next_object_id: AtomicUsize::new(1),
                next_queue_id: AtomicUsize::new(1),
                pointer: Mutex::new((0, 0)),
            }
        });
        Arc::new(Self { state })
    }

    /// A fresh serial channel with its own dispatch thread, for isolated
    /// sub-contexts
    pub fn create_queue(&self) -> EventQueue {
        let id = self.state.next_queue_id.fetch_add(1, Ordering::SeqCst);
        let queue = spawn_queue(&Arc::downgrade(&self.state), id);
        lock(&self.state.queues).push(queue.clone());
        queue
    }

    fn new_node(
        &self,
        role: &str,
        name: Option<&str>,
        is_window: bool,
        bounds: (f64, f64, f64, f64),
    ) -> Arc<NodeState> {
        Arc::new(NodeState {
            id: self.state.next_object_id.fetch_add(1, Ordering::SeqCst),
            role: role.to_string(),
            name: name.map(str::to_string),
            is_window,
            toolkit: Arc::downgrade(&self.state),
            parent: Mutex::new(None),
            children: Mutex::new(Vec::new()),
            bounds: Mutex::new(bounds),
            visible: AtomicBool::new(!is_window),
            enabled: AtomicBool::new(true),
            modal: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            queue: Mutex::new(None),
            owned: Mutex::new(Vec::new()),
            popup: Mutex::new(None),
            icon: Mutex::new(None),
            events: Mutex::new(Vec::new()),
        })
    }

    /// A hidden top-level window on the default queue
    pub fn create_window(&self, name: &str) -> Component {
        self.create_window_on(name, None)
    }

    /// A hidden top-level window served by `queue` (default queue when
    /// `None`)
    pub fn create_window_on(&self, name: &str, queue: Option<&EventQueue>) -> Component {
        let node = self.new_node("Window", Some(name), true, (0.0, 0.0, 640.0, 480.0));
        *lock(&node.queue) = queue.cloned();
        lock(&self.state.roots).push(node.clone());
        component(&node)
    }

    /// A hidden window owned by `owner`; modal dialogs block their queue
    /// while showing
    pub fn create_dialog(&self, owner: &Component, name: &str, modal: bool) -> Component {
        let dialog = self.create_window_on(name, None);
        let dialog_node = HeadlessNode::of(&dialog).map(|n| n.node.clone());
        let owner_node = HeadlessNode::of(owner).map(|n| n.node.clone());
        if let (Some(dialog_node), Some(owner_node)) = (dialog_node, owner_node) {
            dialog_node.modal.store(modal, Ordering::SeqCst);
            *lock(&dialog_node.queue) = lock(&owner_node.queue).clone();
            lock(&owner_node.owned).push(Arc::downgrade(&dialog_node));
        }
        dialog
    }

    /// A child widget inside `parent`
    pub fn create_child(&self, parent: &Component, role: &str, name: &str) -> Component {
        let node = self.new_node(role, Some(name), false, (0.0, 0.0, 80.0, 24.0));
        if let Some(parent_node) = HeadlessNode::of(parent).map(|n| n.node.clone()) {
            *lock(&node.parent) = Some(Arc::downgrade(&parent_node));
            lock(&parent_node.children).push(node.clone());
        }
        component(&node)
    }

    /// Attach a popup window to a menu component, surfaced through the
    /// menu's implicit-children relation
    pub fn attach_popup(&self, menu: &Component, name: &str) -> Component {
        let popup = self.create_window_on(name, None);
        let popup_node = HeadlessNode::of(&popup).map(|n| n.node.clone());
        let menu_node = HeadlessNode::of(menu).map(|n| n.node.clone());
        if let (Some(popup_node), Some(menu_node)) = (popup_node, menu_node) {
            *lock(&popup_node.queue) = ToolkitState::queue_of(&menu_node);
            *lock(&menu_node.popup) = Some(Arc::downgrade(&popup_node));
        }
        popup
    }

    /// Attach a desktop proxy icon to an iconified frame
    pub fn attach_proxy_icon(&self, frame: &Component, name: &str) -> Component {
        let icon = self.create_window_on(name, None);
        let icon_node = HeadlessNode::of(&icon).map(|n| n.node.clone());
        let frame_node = HeadlessNode::of(frame).map(|n| n.node.clone());
        if let (Some(icon_node), Some(frame_node)) = (icon_node, frame_node) {
            *lock(&frame_node.icon) = Some(Arc::downgrade(&icon_node));
        }
        icon
    }

    pub fn set_bounds(&self, c: &Component, bounds: (f64, f64, f64, f64)) {
        if let Some(node) = HeadlessNode::of(c) {
            *lock(&node.node.bounds) = bounds;
        }
    }

    /// Show a window: visibility flips and the `Shown` notification fires
    /// asynchronously on the window's dispatch thread. Disposed windows
    /// stay closed.
    pub fn show(&self, c: &Component) -> Result<(), AutomationError> {
        self.deliver_window_transition(c, |node| {
            if node.closed.load(Ordering::SeqCst) {
                return None;
            }
            node.visible.store(true, Ordering::SeqCst);
            Some(WindowEvent::Shown(component(node)))
        })
    }

    /// Hide a window; fires `Hidden`
    pub fn hide(&self, c: &Component) -> Result<(), AutomationError> {
        self.deliver_window_transition(c, |node| {
            node.visible.store(false, Ordering::SeqCst);
            Some(WindowEvent::Hidden(component(node)))
        })
    }

    /// Dispose a window; fires `Closed` and removes it from the roots
    pub fn close(&self, c: &Component) -> Result<(), AutomationError> {
        self.deliver_window_transition(c, |node| {
            node.visible.store(false, Ordering::SeqCst);
            node.closed.store(true, Ordering::SeqCst);
            if let Some(toolkit) = node.toolkit.upgrade() {
                lock(&toolkit.roots).retain(|r| r.id != node.id);
            }
            Some(WindowEvent::Closed(component(node)))
        })
    }

    fn deliver_window_transition(
        &self,
        c: &Component,
        transition: impl FnOnce(&Arc<NodeState>) -> Option<WindowEvent> + Send + 'static,
    ) -> Result<(), AutomationError> {
        let node = HeadlessNode::of(c)
            .map(|n| n.node.clone())
            .ok_or_else(|| {
                AutomationError::InvalidArgument(
                    "component does not belong to this toolkit".to_string(),
                )
            })?;
        let queue = ToolkitState::queue_for(&self.state, &node);
        queue.post_task(Box::new(move || {
            let Some(toolkit) = node.toolkit.upgrade() else {
                return;
            };
            let Some(event) = transition(&node) else {
                return;
            };
            debug!(window_id = node.id, ?event, "window transition");
            toolkit.fire_window_event(event);
        }))
    }

    /// Events delivered to a component so far, in dispatch order
    pub fn recorded_events(&self, c: &Component) -> Vec<InputEvent> {
        HeadlessNode::of(c)
            .map(|n| lock(&n.node.events).clone())
            .unwrap_or_default()
    }

    /// Deepest showing component at a screen point, topmost window first
    fn component_at(&self, screen: (i32, i32)) -> Option<Arc<NodeState>> {
        let roots = lock(&self.state.roots).clone();
        for root in roots {
            if !root.showing() {
                continue;
            }
            if let Some(hit) = hit_test(&root, screen) {
                return Some(hit);
            }
        }
        None
    }
}

fn hit_test(node: &Arc<NodeState>, screen: (i32, i32)) -> Option<Arc<NodeState>> {
    let (x, y) = node.screen_position()?;
    let (_, _, w, h) = *lock(&node.bounds);
    if screen.0 < x || screen.1 < y || screen.0 >= x + w as i32 || screen.1 >= y + h as i32 {
        return None;
    }
    let children = lock(&node.children).clone();
    for child in children.iter().rev() {
        if let Some(hit) = hit_test(child, screen) {
            return Some(hit);
        }
    }
    Some(node.clone())
}

impl ToolkitBackend for HeadlessToolkit {
    fn root_windows(&self) -> Result<Vec<Component>, AutomationError> {
        Ok(lock(&self.state.roots).iter().map(component).collect())
    }

    fn default_queue(&self) -> EventQueue {
        self.state.default_queue.clone()
    }

    fn focus_owner(&self) -> Result<Option<Component>, AutomationError> {
        Ok(lock(&self.state.focus).as_ref().map(component))
    }

    fn add_window_listener(&self, listener: WindowListener) -> u64 {
        let id = self.state.next_listener_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.state.window_listeners).push((id, listener));
        id
    }

    fn remove_window_listener(&self, id: u64) {
        lock(&self.state.window_listeners).retain(|(listener_id, _)| *listener_id != id);
    }

    fn add_focus_listener(&self, listener: FocusListener) -> u64 {
        let id = self.state.next_listener_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.state.focus_listeners).push((id, listener));
        id
    }

    fn remove_focus_listener(&self, id: u64) {
        lock(&self.state.focus_listeners).retain(|(listener_id, _)| *listener_id != id);
    }

    fn inject_pointer(
        &self,
        kind: PointerKind,
        screen: (i32, i32),
        buttons: ButtonMask,
        click_count: u32,
    ) -> Result<(), AutomationError> {
        *lock(&self.state.pointer) = screen;
        let Some(node) = self.component_at(screen) else {
            // Nothing under the pointer; the OS swallows the event.
            return Ok(());
        };
        let (nx, ny) = node.screen_position().unwrap_or((0, 0));
        let target = component(&node);
        let queue = ToolkitState::queue_for(&self.state, &node);
        queue.post_input(InputEvent::Pointer(PointerEvent {
            kind,
            target,
            point: (screen.0 - nx, screen.1 - ny),
            buttons,
            modifiers: Default::default(),
            click_count,
        }))
    }

    fn inject_key(
        &self,
        kind: KeyKind,
        code: KeyCode,
        ch: Option<char>,
    ) -> Result<(), AutomationError> {
        let Some(owner) = lock(&self.state.focus).clone() else {
            // No focus owner; the OS drops the keystroke.
            return Ok(());
        };
        let queue = ToolkitState::queue_for(&self.state, &owner);
        queue.post_input(InputEvent::Key(KeyEvent {
            kind,
            target: Some(component(&owner)),
            code,
            ch,
            modifiers: Default::default(),
        }))
    }

    fn pointer_location(&self) -> (i32, i32) {
        *lock(&self.state.pointer)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
