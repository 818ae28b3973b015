//! Stress tests for concurrent registration during delivery.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use sysmsg_core::{
    AttrId, AttrListener, CategoryListener, DispatchStatus, Message, MsgCode, Registry, SharedLock,
};

const REGISTRARS: usize = 200;
const DELIVERIES: usize = 300;
const CODE: MsgCode = MsgCode::new(0x100);

#[test]
fn test_concurrent_registration_during_delivery() {
    let registry = Arc::new(Registry::new(Arc::new(SharedLock::new())));
    registry.init();

    let invocations = Arc::new(AtomicUsize::new(0));
    let attr_invocations = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(REGISTRARS + 1));

    // Processing thread: deliver continuously while registrations race in.
    let processor = {
        let registry = Arc::clone(&registry);
        let start = Arc::clone(&start);
        thread::spawn(move || {
            start.wait();
            let mut last_seen = 0;
            for i in 0..DELIVERIES {
                let msg = if i % 2 == 0 {
                    Message::new(CODE)
                } else {
                    Message::attr_changed(vec![AttrId::new(i as u16)])
                };
                let status = registry.deliver(&msg);
                if msg.code == CODE {
                    // Listener counts only ever grow between deliveries.
                    let seen = match status {
                        DispatchStatus::Routed { listeners } => listeners,
                        DispatchStatus::Unrouted => 0,
                    };
                    assert!(seen >= last_seen, "delivery saw a shrinking registry");
                    last_seen = seen;
                }
            }
        })
    };

    let mut registrars = Vec::with_capacity(REGISTRARS);
    for n in 0..REGISTRARS {
        let registry = Arc::clone(&registry);
        let start = Arc::clone(&start);
        let invocations = Arc::clone(&invocations);
        let attr_invocations = Arc::clone(&attr_invocations);
        registrars.push(thread::spawn(move || {
            start.wait();
            if n % 2 == 0 {
                registry
                    .register_category_listener(
                        CategoryListener::named(format!("stress-{}", n))
                            .with_category(CODE)
                            .with_callback(move |_| {
                                invocations.fetch_add(1, Ordering::Relaxed);
                            }),
                    )
                    .unwrap()
            } else {
                registry
                    .register_attr_listener(AttrListener::named(format!("stress-{}", n)).with_callback(
                        move |ids| {
                            assert_eq!(ids.len(), 1);
                            attr_invocations.fetch_add(1, Ordering::Relaxed);
                        },
                    ))
                    .unwrap()
            }
        }));
    }

    let mut ids: Vec<_> = registrars
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();
    processor.join().unwrap();

    // No lost registrations, no duplicated identities.
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), REGISTRARS);
    assert_eq!(registry.category_listener_count(), 1 + REGISTRARS / 2);
    assert_eq!(registry.attr_listener_count(), REGISTRARS / 2);

    // After the race, every listener is reached exactly once per message.
    let before = invocations.load(Ordering::Relaxed);
    assert_eq!(
        registry.deliver(&Message::new(CODE)),
        DispatchStatus::Routed {
            listeners: REGISTRARS / 2
        }
    );
    assert_eq!(invocations.load(Ordering::Relaxed) - before, REGISTRARS / 2);

    let before = attr_invocations.load(Ordering::Relaxed);
    registry.deliver(&Message::attr_changed(vec![AttrId::new(1)]));
    assert_eq!(attr_invocations.load(Ordering::Relaxed) - before, REGISTRARS / 2);

    assert_eq!(registry.stats().listener_panics(), 0);
}

#[test]
fn test_concurrent_router_and_delivery() {
    let registry = Arc::new(Registry::new(Arc::new(SharedLock::new())));
    registry.init();
    let hits = Arc::new(AtomicUsize::new(0));

    {
        let hits = Arc::clone(&hits);
        registry
            .register_category_listener(CategoryListener::new().with_category(CODE).with_callback(move |_| {
                hits.fetch_add(1, Ordering::Relaxed);
            }))
            .unwrap();
    }

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for _ in 0..100 {
                    if registry.has_handler(CODE) {
                        registry.deliver(&Message::new(CODE));
                    }
                    assert!(!registry.has_handler(MsgCode::new(0x200)));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(hits.load(Ordering::Relaxed), 800);
    assert_eq!(registry.stats().delivered(), 800);
}

#[test]
fn test_attr_listener_ids_follow_traversal_order() {
    let registry = Arc::new(Registry::new(Arc::new(SharedLock::new())));
    registry.init();
    let invoked = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let start = Arc::new(Barrier::new(REGISTRARS));

    let handles: Vec<_> = (0..REGISTRARS)
        .map(|n| {
            let registry = Arc::clone(&registry);
            let invoked = Arc::clone(&invoked);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                let id = registry
                    .register_attr_listener(AttrListener::new().with_callback(move |_| invoked.lock().push(n)))
                    .unwrap();
                (n, id)
            })
        })
        .collect();

    let mut ids = vec![None; REGISTRARS];
    for handle in handles {
        let (n, id) = handle.join().unwrap();
        ids[n] = Some(id);
    }

    registry.deliver(&Message::attr_changed(vec![AttrId::new(1)]));

    let in_traversal_order: Vec<_> = invoked
        .lock()
        .iter()
        .map(|&n| ids[n].expect("every registrar returned an id"))
        .collect();
    assert_eq!(in_traversal_order.len(), REGISTRARS);
    assert!(
        in_traversal_order.windows(2).all(|pair| pair[0] < pair[1]),
        "listener ids out of traversal order"
    );
}
