use super::{drain, rig, rig_with, Rig};
use crate::errors::AutomationError;
use crate::input::InputSynthesizer;
use crate::settings::{EventMode, Settings};
use crate::toolkit::{
    ButtonMask, InputEvent, KeyCode, KeyKind, Modifiers, PointerKind, ToolkitBackend,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn direct_settings() -> Settings {
    let mut settings = Settings::default();
    settings.event_mode = EventMode::DirectQueuePost;
    settings
}

fn synthesizer_for(rig: &Rig) -> InputSynthesizer {
    let backend: Arc<dyn ToolkitBackend> = rig.toolkit.clone();
    InputSynthesizer::new(backend, rig.tracker.clone(), rig.settings.clone())
}

fn shown_button(rig: &Rig) -> (crate::Component, crate::Component) {
    let window = rig.toolkit.create_window("main");
    let button = rig.toolkit.create_child(&window, "Button", "ok");
    rig.toolkit.show(&window).expect("show");
    drain(&rig.toolkit.default_queue());
    (window, button)
}

fn press_counts(events: &[InputEvent]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|e| match e {
            InputEvent::Pointer(p) if p.kind == PointerKind::Press => Some(p.click_count),
            _ => None,
        })
        .collect()
}

fn click_counts(events: &[InputEvent]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|e| match e {
            InputEvent::Pointer(p) if p.kind == PointerKind::Clicked => Some(p.click_count),
            _ => None,
        })
        .collect()
}

#[test]
fn rapid_presses_on_one_target_accumulate_click_counts() {
    let rig = rig_with(direct_settings());
    let (_, button) = shown_button(&rig);
    let synthesizer = synthesizer_for(&rig);

    for _ in 0..3 {
        synthesizer
            .press_mouse(&button, (5, 5), ButtonMask::LEFT)
            .expect("press");
        synthesizer
            .release_mouse(&button, (5, 5), ButtonMask::LEFT)
            .expect("release");
    }
    drain(&rig.toolkit.default_queue());

    let events = rig.toolkit.recorded_events(&button);
    assert_eq!(press_counts(&events), vec![1, 2, 3]);
}

#[test]
fn a_gap_beyond_the_click_interval_resets_the_count() {
    let mut settings = direct_settings();
    settings.multi_click_interval_ms = 60;
    let rig = rig_with(settings);
    let (_, button) = shown_button(&rig);
    let synthesizer = synthesizer_for(&rig);

    synthesizer
        .press_mouse(&button, (5, 5), ButtonMask::LEFT)
        .expect("press");
    synthesizer
        .release_mouse(&button, (5, 5), ButtonMask::LEFT)
        .expect("release");
    thread::sleep(Duration::from_millis(150));
    synthesizer
        .press_mouse(&button, (5, 5), ButtonMask::LEFT)
        .expect("press");
    synthesizer
        .release_mouse(&button, (5, 5), ButtonMask::LEFT)
        .expect("release");
    drain(&rig.toolkit.default_queue());

    let events = rig.toolkit.recorded_events(&button);
    assert_eq!(press_counts(&events), vec![1, 1]);
}

#[test]
fn a_different_target_resets_the_count() {
    let rig = rig_with(direct_settings());
    let window = rig.toolkit.create_window("main");
    let first = rig.toolkit.create_child(&window, "Button", "a");
    let second = rig.toolkit.create_child(&window, "Button", "b");
    rig.toolkit.show(&window).expect("show");
    drain(&rig.toolkit.default_queue());
    let synthesizer = synthesizer_for(&rig);

    synthesizer
        .press_mouse(&first, (5, 5), ButtonMask::LEFT)
        .expect("press");
    synthesizer
        .release_mouse(&first, (5, 5), ButtonMask::LEFT)
        .expect("release");
    synthesizer
        .press_mouse(&second, (5, 5), ButtonMask::LEFT)
        .expect("press");
    drain(&rig.toolkit.default_queue());

    assert_eq!(press_counts(&rig.toolkit.recorded_events(&first)), vec![1]);
    assert_eq!(press_counts(&rig.toolkit.recorded_events(&second)), vec![1]);
}

#[test]
fn double_click_emits_one_clicked_event_with_count_two() {
    let rig = rig_with(direct_settings());
    let (_, button) = shown_button(&rig);
    let synthesizer = synthesizer_for(&rig);

    for _ in 0..2 {
        synthesizer
            .press_mouse(&button, (5, 5), ButtonMask::LEFT)
            .expect("press");
        synthesizer
            .release_mouse(&button, (5, 5), ButtonMask::LEFT)
            .expect("release");
    }
    drain(&rig.toolkit.default_queue());

    let events = rig.toolkit.recorded_events(&button);
    let clicks = click_counts(&events);
    assert_eq!(
        clicks.iter().filter(|&&c| c == 2).count(),
        1,
        "exactly one logical click carries the accumulated count"
    );
    assert_eq!(clicks.last(), Some(&2));
}

#[test]
fn an_intervening_event_suppresses_the_synthesized_click() {
    let rig = rig_with(direct_settings());
    let (_, button) = shown_button(&rig);
    let synthesizer = synthesizer_for(&rig);

    synthesizer
        .press_mouse(&button, (5, 5), ButtonMask::LEFT)
        .expect("press");
    synthesizer.move_mouse(&button, 6, 5).expect("move");
    synthesizer
        .release_mouse(&button, (6, 5), ButtonMask::LEFT)
        .expect("release");
    drain(&rig.toolkit.default_queue());

    let events = rig.toolkit.recorded_events(&button);
    assert!(click_counts(&events).is_empty());
}

#[test]
fn native_injection_pairs_clicks_itself() {
    let rig = rig();
    let (_, button) = shown_button(&rig);
    let synthesizer = synthesizer_for(&rig);

    synthesizer
        .press_mouse(&button, (5, 5), ButtonMask::LEFT)
        .expect("press");
    synthesizer
        .release_mouse(&button, (5, 5), ButtonMask::LEFT)
        .expect("release");
    drain(&rig.toolkit.default_queue());

    let events = rig.toolkit.recorded_events(&button);
    assert_eq!(press_counts(&events), vec![1]);
    assert!(click_counts(&events).is_empty(), "the OS pairs clicks, not the engine");
}

#[test]
fn native_injection_skips_unrealized_targets_silently() {
    let rig = rig();
    let window = rig.toolkit.create_window("hidden");
    let button = rig.toolkit.create_child(&window, "Button", "ok");
    let synthesizer = synthesizer_for(&rig);

    synthesizer
        .press_mouse(&button, (5, 5), ButtonMask::LEFT)
        .expect("silently skipped");
    drain(&rig.toolkit.default_queue());
    assert!(rig.toolkit.recorded_events(&button).is_empty());
}

#[test]
fn multi_press_sequences_zero_the_delay_then_restore_it() {
    let mut settings = direct_settings();
    settings.delay_between_events_ms = 20;
    let rig = rig_with(settings);
    let (_, button) = shown_button(&rig);
    let synthesizer = synthesizer_for(&rig);

    synthesizer
        .press_mouse(&button, (5, 5), ButtonMask::LEFT)
        .expect("press");
    synthesizer
        .release_mouse(&button, (5, 5), ButtonMask::LEFT)
        .expect("release");
    synthesizer
        .press_mouse(&button, (5, 5), ButtonMask::LEFT)
        .expect("second press");
    assert_eq!(
        rig.settings.snapshot().delay_between_events_ms,
        0,
        "the multi-press sequence displaces the configured delay"
    );
    synthesizer
        .release_mouse(&button, (5, 5), ButtonMask::LEFT)
        .expect("release");

    synthesizer.move_mouse(&button, 8, 8).expect("move");
    assert_eq!(
        rig.settings.snapshot().delay_between_events_ms,
        20,
        "the prior delay comes back once the sequence ends"
    );
    drain(&rig.toolkit.default_queue());
}

#[test]
fn input_state_reflects_a_post_before_the_queue_drains() {
    let rig = rig_with(direct_settings());
    let (_, button) = shown_button(&rig);
    let synthesizer = synthesizer_for(&rig);

    // Jam the queue so the press cannot possibly have been dispatched yet.
    rig.toolkit
        .default_queue()
        .post_task(Box::new(|| thread::sleep(Duration::from_millis(200))))
        .expect("stall");
    synthesizer
        .press_mouse(&button, (5, 5), ButtonMask::LEFT)
        .expect("press");

    let pressed = rig
        .registry
        .with_input(|input| input.buttons.contains(ButtonMask::LEFT));
    assert!(pressed, "input state must lead the queue, not follow it");

    drain(&rig.toolkit.default_queue());
    synthesizer
        .release_mouse(&button, (5, 5), ButtonMask::LEFT)
        .expect("release");
    drain(&rig.toolkit.default_queue());
}

#[test]
fn synthesis_against_a_modally_blocked_queue_is_refused() {
    let rig = rig_with(direct_settings());
    let (window, button) = shown_button(&rig);
    let dialog = rig.toolkit.create_dialog(&window, "confirm", true);
    let confirm = rig.toolkit.create_child(&dialog, "Button", "yes");
    rig.toolkit.show(&dialog).expect("show dialog");
    drain(&rig.toolkit.default_queue());

    let synthesizer = synthesizer_for(&rig);
    match synthesizer.press_mouse(&button, (5, 5), ButtonMask::LEFT) {
        Err(AutomationError::ActionFailed(message)) => {
            assert!(message.contains("blocked by modal"));
        }
        other => panic!("expected ActionFailed, got {other:?}"),
    }

    // The modal's own children stay reachable, otherwise it could never
    // be dismissed.
    synthesizer
        .press_mouse(&confirm, (5, 5), ButtonMask::LEFT)
        .expect("modal content accepts input");
    synthesizer
        .release_mouse(&confirm, (5, 5), ButtonMask::LEFT)
        .expect("release");
    drain(&rig.toolkit.default_queue());
}

#[test]
fn wheel_rotation_targets_the_component_under_the_pointer() {
    let rig = rig_with(direct_settings());
    let (_, button) = shown_button(&rig);
    let synthesizer = synthesizer_for(&rig);

    synthesizer.move_mouse(&button, 4, 4).expect("move");
    synthesizer.rotate_wheel(3).expect("wheel");
    drain(&rig.toolkit.default_queue());

    let events = rig.toolkit.recorded_events(&button);
    assert!(events.iter().any(|e| matches!(
        e,
        InputEvent::Pointer(p) if p.kind == PointerKind::Wheel(3)
    )));
}

#[test]
fn wheel_rotation_without_a_pointer_target_fails() {
    let rig = rig_with(direct_settings());
    let synthesizer = synthesizer_for(&rig);
    match synthesizer.rotate_wheel(1) {
        Err(AutomationError::ActionFailed(_)) => {}
        other => panic!("expected ActionFailed, got {other:?}"),
    }
}

#[test]
fn key_code_zero_is_rejected() {
    let rig = rig_with(direct_settings());
    let synthesizer = synthesizer_for(&rig);
    match synthesizer.press_key(KeyCode(0), None) {
        Err(AutomationError::ActionFailed(_)) => {}
        other => panic!("expected ActionFailed, got {other:?}"),
    }
}

#[test]
fn modifier_keys_update_the_shared_modifier_mask() {
    let rig = rig_with(direct_settings());
    let synthesizer = synthesizer_for(&rig);

    synthesizer.press_key(KeyCode::SHIFT, None).expect("press shift");
    assert!(rig
        .registry
        .with_input(|input| input.modifiers.contains(Modifiers::SHIFT)));

    synthesizer
        .release_key(KeyCode::SHIFT, None)
        .expect("release shift");
    assert!(rig
        .registry
        .with_input(|input| input.modifiers.is_empty()));
    drain(&rig.toolkit.default_queue());
}

#[test]
fn key_events_reach_the_focus_owner() {
    let rig = rig_with(direct_settings());
    let (_, button) = shown_button(&rig);
    button.request_focus().expect("focus");
    drain(&rig.toolkit.default_queue());

    let synthesizer = synthesizer_for(&rig);
    synthesizer
        .press_key(KeyCode(b'A' as u32), Some('a'))
        .expect("press");
    synthesizer
        .release_key(KeyCode(b'A' as u32), Some('a'))
        .expect("release");
    drain(&rig.toolkit.default_queue());

    let events = rig.toolkit.recorded_events(&button);
    let kinds: Vec<KeyKind> = events
        .iter()
        .filter_map(|e| match e {
            InputEvent::Key(k) => Some(k.kind),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, vec![KeyKind::Press, KeyKind::Release]);
}

#[test]
fn release_all_clears_every_pressed_key_and_button() {
    let rig = rig_with(direct_settings());
    let (_, button) = shown_button(&rig);
    let synthesizer = synthesizer_for(&rig);

    synthesizer.press_key(KeyCode::SHIFT, None).expect("press shift");
    synthesizer
        .press_key(KeyCode(b'A' as u32), Some('a'))
        .expect("press a");
    synthesizer
        .press_mouse(&button, (5, 5), ButtonMask::LEFT)
        .expect("press mouse");

    synthesizer.release_all().expect("release all");
    drain(&rig.toolkit.default_queue());

    rig.registry.with_input(|input| {
        assert!(input.pressed_keys.is_empty());
        assert!(input.buttons.is_empty());
        assert!(input.modifiers.is_empty());
    });
}
