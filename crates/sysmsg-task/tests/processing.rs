//! Integration tests for the processing context.

use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sysmsg_core::{AttrId, AttrListener, AttrValue, CategoryListener, Message, Registry, SharedLock};
use sysmsg_task::{AttrDelivery, Error, ProcessingTask, Runtime, TaskConfig};

const TIMEOUT: Duration = Duration::from_secs(5);

fn ready_registry() -> Arc<Registry> {
    let registry = Arc::new(Registry::new(Arc::new(SharedLock::new())));
    registry.init();
    registry
}

#[test]
fn test_messages_delivered_in_order_on_processing_thread() {
    let registry = ready_registry();
    let seen = Arc::new(Mutex::new(Vec::new()));

    {
        let seen = Arc::clone(&seen);
        registry
            .register_category_listener(
                CategoryListener::named("order")
                    .with_categories([7u32, 8])
                    .with_callback(move |msg| {
                        let thread = thread::current().name().map(str::to_string);
                        seen.lock().push((msg.bytes().map(<[u8]>::to_vec), thread));
                    }),
            )
            .unwrap();
    }

    let (task, sender) = ProcessingTask::start(&TaskConfig::new(), Arc::clone(&registry)).unwrap();
    assert_eq!(task.thread_name(), "smt");

    // Several producers share cloned senders; each producer's order is kept.
    let producers: Vec<_> = (0u8..3)
        .map(|p| {
            let sender = sender.clone();
            thread::spawn(move || {
                for i in 0u8..10 {
                    sender.send(Message::with_bytes(7u32, vec![p, i])).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    task.stop();

    let seen = seen.lock();
    assert_eq!(seen.len(), 30);
    assert!(seen.iter().all(|(_, thread)| thread.as_deref() == Some("smt")));
    for p in 0u8..3 {
        let order: Vec<u8> = seen
            .iter()
            .filter_map(|(bytes, _)| bytes.as_ref())
            .filter(|bytes| bytes[0] == p)
            .map(|bytes| bytes[1])
            .collect();
        assert_eq!(order, (0u8..10).collect::<Vec<_>>());
    }
    assert_eq!(registry.stats().delivered(), 30);
}

#[test]
fn test_queue_full_when_consumer_is_busy() {
    let registry = ready_registry();
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);

    registry
        .register_category_listener(CategoryListener::new().with_category(1u32).with_callback(move |_| {
            let _ = entered_tx.send(());
            let _ = release_rx.lock().recv();
        }))
        .unwrap();

    let (task, sender) =
        ProcessingTask::start(&TaskConfig::new().with_queue_capacity(1), Arc::clone(&registry)).unwrap();

    // First message occupies the consumer, second fills the only slot.
    sender.try_send(Message::new(1u32)).unwrap();
    entered_rx.recv_timeout(TIMEOUT).unwrap();
    sender.try_send(Message::new(1u32)).unwrap();
    assert!(matches!(sender.try_send(Message::new(1u32)), Err(Error::QueueFull)));

    release_tx.send(()).unwrap();
    entered_rx.recv_timeout(TIMEOUT).unwrap();
    release_tx.send(()).unwrap();

    task.stop();
    assert_eq!(registry.stats().delivered(), 2);
}

#[test]
fn test_stop_drains_queue_then_closes() {
    let registry = ready_registry();
    let (task, sender) = ProcessingTask::start(&TaskConfig::new(), Arc::clone(&registry)).unwrap();

    for _ in 0..5 {
        sender.try_send(Message::new(42u32)).unwrap();
    }
    task.stop();

    // Nobody listens to 42, but every queued message was still processed.
    assert_eq!(registry.stats().unrouted(), 5);
    assert!(!task.is_running());
    assert!(sender.is_closed());
    assert!(matches!(sender.send(Message::new(42u32)), Err(Error::Closed)));
}

#[test]
fn test_thread_exits_when_task_and_senders_dropped() {
    let registry = ready_registry();
    let (task, sender) = ProcessingTask::start(&TaskConfig::new(), Arc::clone(&registry)).unwrap();
    let producer = sender.clone();

    for _ in 0..3 {
        producer.try_send(Message::new(11u32)).unwrap();
    }
    drop(producer);
    drop(sender);
    drop(task);

    // The thread holds the only other registry handle until it returns.
    let deadline = Instant::now() + TIMEOUT;
    while Arc::strong_count(&registry) > 1 {
        assert!(Instant::now() < deadline, "processing thread still running");
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(registry.stats().unrouted(), 3);
}

#[test]
fn test_queued_attr_changes_reach_listeners() {
    let runtime = Runtime::start(&TaskConfig::new()).unwrap();
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);

    // The listener reads the table from the processing thread while the
    // writer may still be holding the shared lock.
    {
        let table = Arc::clone(runtime.table());
        runtime
            .registry()
            .register_attr_listener(AttrListener::named("reader").with_callback(move |ids| {
                let values: Vec<_> = ids.iter().map(|&id| (id, table.get(id))).collect();
                let thread = thread::current().name().map(str::to_string);
                let _ = tx.lock().send((values, thread));
            }))
            .unwrap();
    }

    runtime.table().set_many([
        (AttrId::new(1), AttrValue::from(true)),
        (AttrId::new(2), AttrValue::from("on")),
    ]);

    let (values, thread) = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(
        values,
        vec![
            (AttrId::new(1), Some(AttrValue::Bool(true))),
            (AttrId::new(2), Some(AttrValue::Text("on".to_string()))),
        ]
    );
    assert_eq!(thread.as_deref(), Some("smt"));

    runtime.shutdown();
}

#[test]
fn test_sync_attr_changes_run_on_writer_thread() {
    let runtime = Runtime::start(&TaskConfig::new().with_attr_delivery(AttrDelivery::Sync)).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    {
        let seen = Arc::clone(&seen);
        runtime
            .registry()
            .register_attr_listener(AttrListener::new().with_callback(move |ids| {
                let thread = thread::current().id();
                seen.lock().push((ids.to_vec(), thread));
            }))
            .unwrap();
    }

    assert!(runtime.table().set(AttrId::new(9), 3u32));
    assert!(!runtime.table().set(AttrId::new(9), 3u32));

    // Delivered before `set` returned, on this thread.
    assert_eq!(*seen.lock(), vec![(vec![AttrId::new(9)], thread::current().id())]);
    assert_eq!(runtime.registry().stats().attr_fanouts(), 1);

    runtime.shutdown();
}
