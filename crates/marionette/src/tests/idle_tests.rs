use super::{drain, rig, rig_with};
use crate::errors::AutomationError;
use crate::idle::IdleWaiter;
use crate::settings::Settings;
use crate::toolkit::{EventQueue, ToolkitBackend};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn wait_for_idle_outlives_every_pending_task() {
    let rig = rig();
    let waiter = IdleWaiter::new(rig.registry.clone(), rig.settings.clone());
    let queue = rig.toolkit.default_queue();
    for _ in 0..5 {
        queue
            .post_task(Box::new(|| thread::sleep(Duration::from_millis(40))))
            .expect("post");
    }

    waiter.wait_for_idle().expect("idle");
    assert!(
        !queue.has_pending(),
        "wait_for_idle must not return while a queue has a pending event"
    );
}

#[test]
fn wait_for_idle_returns_immediately_on_quiet_queues() {
    let rig = rig();
    let waiter = IdleWaiter::new(rig.registry.clone(), rig.settings.clone());

    let start = Instant::now();
    waiter.wait_for_idle().expect("idle");
    assert!(start.elapsed() < Duration::from_secs(1));
}

fn repost(queue: EventQueue, stop: Arc<AtomicBool>) {
    if stop.load(Ordering::SeqCst) {
        return;
    }
    let next_queue = queue.clone();
    let next_stop = stop.clone();
    let _ = queue.post_task(Box::new(move || {
        thread::sleep(Duration::from_millis(1));
        repost(next_queue, next_stop);
    }));
}

#[test]
fn a_self_reposting_task_is_bounded_by_the_idle_timeout() {
    let mut settings = Settings::default();
    settings.idle_timeout_ms = 300;
    let rig = rig_with(settings);
    let waiter = IdleWaiter::new(rig.registry.clone(), rig.settings.clone());
    let queue = rig.toolkit.default_queue();

    let stop = Arc::new(AtomicBool::new(false));
    repost(queue.clone(), stop.clone());

    let start = Instant::now();
    waiter.wait_for_idle().expect("returns at the boundary, not an error");
    let elapsed = start.elapsed();
    assert!(
        elapsed >= Duration::from_millis(250),
        "returned after {elapsed:?}, before the timeout boundary"
    );
    assert!(elapsed < Duration::from_secs(5));

    stop.store(true, Ordering::SeqCst);
    drain(&queue);
}

#[test]
fn calling_wait_for_idle_from_a_dispatch_thread_fails_immediately() {
    let rig = rig();
    let waiter = Arc::new(IdleWaiter::new(rig.registry.clone(), rig.settings.clone()));
    let queue = rig.toolkit.default_queue();

    let on_thread_waiter = waiter.clone();
    let result = queue
        .submit_and_wait(Duration::from_secs(5), move || {
            on_thread_waiter.wait_for_idle()
        })
        .expect("rendezvous");
    match result {
        Err(AutomationError::ActionFailed(message)) => {
            assert!(message.contains("dispatch thread"));
        }
        other => panic!("expected ActionFailed, got {other:?}"),
    }
}

#[test]
fn idle_wait_covers_isolated_queues_too() {
    let rig = rig();
    let waiter = IdleWaiter::new(rig.registry.clone(), rig.settings.clone());
    let isolated = rig.toolkit.create_queue();
    rig.registry.register_queue(&isolated);

    isolated
        .post_task(Box::new(|| thread::sleep(Duration::from_millis(60))))
        .expect("post");
    waiter.wait_for_idle().expect("idle");
    assert!(!isolated.has_pending());
}
