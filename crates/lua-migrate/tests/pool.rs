//! Create-once guarantees of the session and store pools.

mod common;

use std::sync::Barrier;
use std::thread;

use common::session_pool;
use lua_migrate::prelude::*;

#[test]
fn test_concurrent_get_must_creates_one_session() {
    let pool = session_pool();
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                pool.get_must("shared").unwrap()
            })
        })
        .collect();
    let sessions: Vec<Arc<Session>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(pool.created(), 1);
    assert_eq!(pool.len(), 1);
    for session in &sessions[1..] {
        assert!(Arc::ptr_eq(&sessions[0], session));
    }
}

#[test]
fn test_distinct_keys_get_distinct_sessions() {
    let pool = session_pool();
    let a = pool.get_must("a").unwrap();
    let b = pool.get_must("b").unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(a.name(), "a");
    assert_eq!(pool.created(), 2);
}

#[test]
fn test_registered_session_is_not_replaced() {
    let pool = session_pool();
    let mine = Arc::new(Session::new("mine", pool.context()).unwrap());
    assert!(pool.add("mine", Arc::clone(&mine)));
    assert!(Arc::ptr_eq(&pool.get_must("mine").unwrap(), &mine));
    assert_eq!(pool.created(), 0);
}

#[test]
fn test_sessions_do_not_share_globals() {
    let pool = session_pool();
    let a = pool.get_must("a").unwrap();
    let b = pool.get_must("b").unwrap();
    a.with_lua(|lua| lua.globals().set("marker", 1)).unwrap();
    let seen: Option<i64> = b.with_lua(|lua| lua.globals().get("marker")).unwrap();
    assert!(seen.is_none());
}
