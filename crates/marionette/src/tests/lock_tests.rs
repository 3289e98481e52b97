use crate::errors::AutomationError;
use crate::lock::{LockOwner, ScreenLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn acquire_from_two_owners_serializes() {
    let first = LockOwner::new();
    let second = LockOwner::new();
    let lock = ScreenLock::instance();

    lock.acquire(first);
    let acquired = Arc::new(AtomicBool::new(false));
    let acquired_flag = acquired.clone();
    let contender = thread::spawn(move || {
        ScreenLock::instance().acquire(second);
        acquired_flag.store(true, Ordering::SeqCst);
        ScreenLock::instance().release(second).expect("release");
    });

    thread::sleep(Duration::from_millis(100));
    assert!(
        !acquired.load(Ordering::SeqCst),
        "the second owner must block while the first holds the lock"
    );

    lock.release(first).expect("release");
    contender.join().expect("join");
    assert!(acquired.load(Ordering::SeqCst));
}

#[test]
fn release_by_a_non_holder_is_a_violation() {
    let holder = LockOwner::new();
    let imposter = LockOwner::new();
    let lock = ScreenLock::instance();

    lock.acquire(holder);
    match lock.release(imposter) {
        Err(AutomationError::ScreenLockViolation(_)) => {}
        other => panic!("expected ScreenLockViolation, got {other:?}"),
    }
    assert!(lock.is_held_by(holder));
    lock.release(holder).expect("release");
}

#[test]
fn reacquiring_as_the_holder_is_idempotent() {
    let owner = LockOwner::new();
    let lock = ScreenLock::instance();

    lock.acquire(owner);
    lock.acquire(owner);
    assert!(lock.is_held_by(owner));
    lock.release(owner).expect("release");

    match lock.release(owner) {
        Err(AutomationError::ScreenLockViolation(_)) => {}
        other => panic!("expected ScreenLockViolation on double release, got {other:?}"),
    }
}
