//! Synthetic input generation.
//!
//! Two interchangeable backends deliver events: [`EventMode::NativeInjection`]
//! hands absolute screen coordinates to the toolkit's OS-level injection,
//! [`EventMode::DirectQueuePost`] constructs event objects and enqueues
//! them on the target's resolved queue. The shared [`InputState`] in the
//! registry is updated *before* each event is enqueued, so a later
//! synthesis call observes cumulative device state even though the GUI
//! thread has not dispatched the event yet.

use crate::element::Component;
use crate::errors::AutomationError;
use crate::registry::Registry;
use crate::settings::{EventMode, SharedSettings};
use crate::toolkit::{
    ButtonMask, EventQueue, InputEvent, KeyCode, KeyEvent, KeyKind, PointerEvent, PointerKind,
    ToolkitBackend,
};
use crate::tracker::WindowTracker;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// What kind of event was synthesized last, used to detect "no intervening
/// event" between a press and its release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PostedKind {
    Press(usize),
    Release(usize),
    Move,
    Wheel,
    Key,
}

/// Per-synthesizer state deriving multi-click grouping from the stream of
/// posted pointer events. Never persisted.
#[derive(Debug, Default)]
struct ClickState {
    last_posted: Option<PostedKind>,
    /// Target id and timestamp of the last press
    last_press: Option<(usize, Instant)>,
    click_count: u32,
    counting: bool,
    /// The delay value displaced while a multi-press sequence forces the
    /// inter-event delay to zero
    saved_delay_ms: Option<u64>,
}

/// Delivery strategy for synthesized events
trait InputBackend: Send + Sync {
    fn post_pointer(
        &self,
        queue: &EventQueue,
        event: PointerEvent,
    ) -> Result<(), AutomationError>;
    fn post_key(&self, queue: &EventQueue, event: KeyEvent) -> Result<(), AutomationError>;
    /// Whether this backend synthesizes the logical "clicked" event itself
    fn synthesizes_click(&self) -> bool;
}

/// Delegates to OS-level injection at absolute screen coordinates.
/// Silently returns when the target has no screen location yet, since the
/// OS cannot address a component that is not realized.
struct NativeInjection {
    toolkit: Arc<dyn ToolkitBackend>,
}

impl InputBackend for NativeInjection {
    fn post_pointer(
        &self,
        _queue: &EventQueue,
        event: PointerEvent,
    ) -> Result<(), AutomationError> {
        let Some((sx, sy)) = event.target.screen_position()? else {
            debug!(
                target = %event.target.describe(),
                "target not realized on screen, skipping native injection"
            );
            return Ok(());
        };
        let screen = (sx + event.point.0, sy + event.point.1);
        self.toolkit
            .inject_pointer(event.kind, screen, event.buttons, event.click_count)
    }

    fn post_key(&self, _queue: &EventQueue, event: KeyEvent) -> Result<(), AutomationError> {
        self.toolkit.inject_key(event.kind, event.code, event.ch)
    }

    fn synthesizes_click(&self) -> bool {
        // The OS pairs press/release into clicks on its own.
        false
    }
}

/// Constructs event objects and enqueues them on the resolved queue
struct DirectQueuePost;

impl InputBackend for DirectQueuePost {
    fn post_pointer(
        &self,
        queue: &EventQueue,
        event: PointerEvent,
    ) -> Result<(), AutomationError> {
        queue.post_input(InputEvent::Pointer(event))
    }

    fn post_key(&self, queue: &EventQueue, event: KeyEvent) -> Result<(), AutomationError> {
        queue.post_input(InputEvent::Key(event))
    }

    fn synthesizes_click(&self) -> bool {
        true
    }
}

/// Produces and posts synthetic input events on behalf of the driver thread
pub struct InputSynthesizer {
    registry: Arc<Registry>,
    tracker: Arc<WindowTracker>,
    settings: SharedSettings,
    native: NativeInjection,
    direct: DirectQueuePost,
    click_state: Mutex<ClickState>,
}

impl InputSynthesizer {
    pub fn new(
        toolkit: Arc<dyn ToolkitBackend>,
        tracker: Arc<WindowTracker>,
        settings: SharedSettings,
    ) -> Self {
        Self {
            registry: tracker.registry().clone(),
            tracker,
            settings,
            native: NativeInjection { toolkit },
            direct: DirectQueuePost,
            click_state: Mutex::new(ClickState::default()),
        }
    }

    fn backend(&self) -> &dyn InputBackend {
        match self.settings.event_mode() {
            EventMode::NativeInjection => &self.native,
            EventMode::DirectQueuePost => &self.direct,
        }
    }

    /// Refuse synthesis against a queue blocked by a modal popup, unless
    /// the target lives inside the blocking modal itself. Queuing behind a
    /// popup that will never yield would deadlock the driver.
    fn ensure_not_blocked(
        &self,
        queue: &EventQueue,
        target: Option<&Component>,
    ) -> Result<(), AutomationError> {
        let Some(modal) = queue.blocking_modal() else {
            return Ok(());
        };
        if let Some(target) = target {
            if let Ok(Some(window)) = target.window() {
                if window == modal {
                    return Ok(());
                }
            }
            if *target == modal {
                return Ok(());
            }
        }
        Err(AutomationError::ActionFailed(format!(
            "event queue {} is blocked by modal {}",
            queue.id(),
            modal.describe()
        )))
    }

    fn click_state<R>(&self, f: impl FnOnce(&mut ClickState) -> R) -> R {
        f(&mut self.click_state.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Restore the inter-event delay displaced by a multi-press sequence
    fn end_multi_sequence(&self, state: &mut ClickState) {
        if let Some(saved) = state.saved_delay_ms.take() {
            self.settings.update(|s| s.delay_between_events_ms = saved);
        }
    }

    fn pause_between_events(&self) {
        let delay = self.settings.delay_between_events();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }

    /// Press pointer buttons over `point` (component-local) on `target`
    #[instrument(level = "debug", skip(self, target), fields(target = %target.describe()))]
    pub fn press_mouse(
        &self,
        target: &Component,
        point: (i32, i32),
        buttons: ButtonMask,
    ) -> Result<(), AutomationError> {
        if buttons.is_empty() {
            return Err(AutomationError::InvalidArgument(
                "press_mouse requires at least one button".to_string(),
            ));
        }
        let queue = self.tracker.queue_for(target);
        self.ensure_not_blocked(&queue, Some(target))?;

        let now = Instant::now();
        let interval = self.settings.multi_click_interval();
        let target_id = target.object_id();
        let count = self.click_state(|state| {
            let grouped = state.counting
                && matches!(state.last_press, Some((id, at))
                    if id == target_id && now.duration_since(at) < interval);
            if grouped {
                state.click_count += 1;
                // The backend only perceives a multi-click when the press
                // pair lands inside the click interval; displace any
                // configured delay until the sequence ends.
                if state.saved_delay_ms.is_none() {
                    let prior = self
                        .settings
                        .update(|s| std::mem::replace(&mut s.delay_between_events_ms, 0));
                    state.saved_delay_ms = Some(prior);
                }
            } else {
                self.end_multi_sequence(state);
                state.click_count = 1;
            }
            state.counting = true;
            state.last_press = Some((target_id, now));
            state.last_posted = Some(PostedKind::Press(target_id));
            state.click_count
        });

        let modifiers = self.registry.with_input(|input| {
            input.buttons = input.buttons.union(buttons);
            input.dragging = false;
            input.pointer_target = Some(target.clone());
            input.modifiers
        });
        self.update_pointer_location(target, point)?;

        self.backend().post_pointer(
            &queue,
            PointerEvent {
                kind: PointerKind::Press,
                target: target.clone(),
                point,
                buttons,
                modifiers,
                click_count: count,
            },
        )?;
        self.pause_between_events();
        Ok(())
    }

    /// Release pointer buttons over `point` on `target`. When the release
    /// immediately follows a press on the same component with no
    /// intervening event, the direct-post backend additionally emits the
    /// logical "clicked" event carrying the accumulated click count.
    #[instrument(level = "debug", skip(self, target), fields(target = %target.describe()))]
    pub fn release_mouse(
        &self,
        target: &Component,
        point: (i32, i32),
        buttons: ButtonMask,
    ) -> Result<(), AutomationError> {
        let queue = self.tracker.queue_for(target);
        self.ensure_not_blocked(&queue, Some(target))?;

        let target_id = target.object_id();
        let (count, emit_click) = self.click_state(|state| {
            let emit = self.backend().synthesizes_click()
                && state.last_posted == Some(PostedKind::Press(target_id));
            state.last_posted = Some(PostedKind::Release(target_id));
            (state.click_count, emit)
        });

        let modifiers = self.registry.with_input(|input| {
            input.buttons = input.buttons.difference(buttons);
            if input.buttons.is_empty() {
                input.dragging = false;
            }
            input.modifiers
        });

        let backend = self.backend();
        backend.post_pointer(
            &queue,
            PointerEvent {
                kind: PointerKind::Release,
                target: target.clone(),
                point,
                buttons,
                modifiers,
                click_count: count,
            },
        )?;
        if emit_click {
            backend.post_pointer(
                &queue,
                PointerEvent {
                    kind: PointerKind::Clicked,
                    target: target.clone(),
                    point,
                    buttons,
                    modifiers,
                    click_count: count,
                },
            )?;
        }
        self.pause_between_events();
        Ok(())
    }

    /// Move the pointer to `(x, y)` in `target`'s coordinate space
    #[instrument(level = "debug", skip(self, target), fields(target = %target.describe()))]
    pub fn move_mouse(&self, target: &Component, x: i32, y: i32) -> Result<(), AutomationError> {
        let queue = self.tracker.queue_for(target);
        self.ensure_not_blocked(&queue, Some(target))?;

        self.click_state(|state| {
            self.end_multi_sequence(state);
            state.last_posted = Some(PostedKind::Move);
        });
        let (modifiers, buttons) = self.registry.with_input(|input| {
            if !input.buttons.is_empty() {
                input.dragging = true;
            }
            input.pointer_target = Some(target.clone());
            (input.modifiers, input.buttons)
        });
        self.update_pointer_location(target, (x, y))?;

        self.backend().post_pointer(
            &queue,
            PointerEvent {
                kind: PointerKind::Move,
                target: target.clone(),
                point: (x, y),
                buttons,
                modifiers,
                click_count: 0,
            },
        )?;
        self.pause_between_events();
        Ok(())
    }

    /// Rotate the wheel over the component the pointer was last moved over
    #[instrument(level = "debug", skip(self))]
    pub fn rotate_wheel(&self, amount: i32) -> Result<(), AutomationError> {
        let target = self
            .registry
            .with_input(|input| input.pointer_target.clone())
            .ok_or_else(|| {
                AutomationError::ActionFailed(
                    "rotate_wheel: no component under the synthesized pointer".to_string(),
                )
            })?;
        let queue = self.tracker.queue_for(&target);
        self.ensure_not_blocked(&queue, Some(&target))?;

        self.click_state(|state| {
            self.end_multi_sequence(state);
            state.last_posted = Some(PostedKind::Wheel);
        });
        let (modifiers, buttons, point) = self.registry.with_input(|input| {
            (input.modifiers, input.buttons, input.pointer_location)
        });

        self.backend().post_pointer(
            &queue,
            PointerEvent {
                kind: PointerKind::Wheel(amount),
                target: target.clone(),
                point,
                buttons,
                modifiers,
                click_count: 0,
            },
        )?;
        self.pause_between_events();
        Ok(())
    }

    /// Press a key, routed to the current focus owner's queue
    #[instrument(level = "debug", skip(self))]
    pub fn press_key(&self, code: KeyCode, ch: Option<char>) -> Result<(), AutomationError> {
        if code.0 == 0 {
            return Err(AutomationError::ActionFailed(
                "invalid key code 0".to_string(),
            ));
        }
        let target = self.native.toolkit.focus_owner()?;
        let queue = match &target {
            Some(target) => self.tracker.queue_for(target),
            None => self.native.toolkit.default_queue(),
        };
        self.ensure_not_blocked(&queue, target.as_ref())?;

        self.click_state(|state| {
            self.end_multi_sequence(state);
            state.last_posted = Some(PostedKind::Key);
        });
        let modifiers = self.registry.with_input(|input| {
            if !input.pressed_keys.iter().any(|(c, _)| *c == code) {
                input.pressed_keys.push((code, ch));
            }
            if let Some(modifier) = code.modifier() {
                input.modifiers = input.modifiers.union(modifier);
            }
            input.modifiers
        });

        self.backend().post_key(
            &queue,
            KeyEvent {
                kind: KeyKind::Press,
                target,
                code,
                ch,
                modifiers,
            },
        )?;
        self.pause_between_events();
        Ok(())
    }

    /// Release a previously pressed key
    #[instrument(level = "debug", skip(self))]
    pub fn release_key(&self, code: KeyCode, ch: Option<char>) -> Result<(), AutomationError> {
        if code.0 == 0 {
            return Err(AutomationError::ActionFailed(
                "invalid key code 0".to_string(),
            ));
        }
        let target = self.native.toolkit.focus_owner()?;
        let queue = match &target {
            Some(target) => self.tracker.queue_for(target),
            None => self.native.toolkit.default_queue(),
        };

        self.click_state(|state| {
            state.last_posted = Some(PostedKind::Key);
        });
        let modifiers = self.registry.with_input(|input| {
            let was_pressed = input.pressed_keys.iter().any(|(c, _)| *c == code);
            if !was_pressed {
                warn!(code = code.0, "releasing a key that was never pressed");
            }
            input.pressed_keys.retain(|(c, _)| *c != code);
            if let Some(modifier) = code.modifier() {
                input.modifiers = input.modifiers.difference(modifier);
            }
            input.modifiers
        });

        self.backend().post_key(
            &queue,
            KeyEvent {
                kind: KeyKind::Release,
                target,
                code,
                ch,
                modifiers,
            },
        )?;
        self.pause_between_events();
        Ok(())
    }

    /// Release every key and button still recorded as pressed. Used by
    /// session clean-up so a failed test never leaves a modifier stuck.
    pub fn release_all(&self) -> Result<(), AutomationError> {
        let pressed_keys: Vec<(KeyCode, Option<char>)> = self
            .registry
            .with_input(|input| input.pressed_keys.iter().rev().cloned().collect());
        for (code, ch) in pressed_keys {
            self.release_key(code, ch)?;
        }

        let (buttons, target) = self
            .registry
            .with_input(|input| (input.buttons, input.pointer_target.clone()));
        if !buttons.is_empty() {
            match target {
                Some(target) => self.release_mouse(&target, (0, 0), buttons)?,
                None => {
                    // No component to address the release to; clear the
                    // recorded state so clean-up converges anyway.
                    self.registry
                        .with_input(|input| input.buttons = ButtonMask::default());
                }
            }
        }
        self.click_state(|state| self.end_multi_sequence(state));
        Ok(())
    }

    fn update_pointer_location(
        &self,
        target: &Component,
        point: (i32, i32),
    ) -> Result<(), AutomationError> {
        if let Some((sx, sy)) = target.screen_position()? {
            self.registry.with_input(|input| {
                input.pointer_location = (sx + point.0, sy + point.1);
            });
        }
        Ok(())
    }
}
