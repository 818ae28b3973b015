//! Registry fixtures shared by the benchmarks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sysmsg_core::{AttrListener, CategoryListener, MsgCode, Registry, SharedLock, SharedRegistry};

/// Listener population sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Small,
    Medium,
    Large,
}

impl Scale {
    /// Number of listeners of each kind.
    pub fn listeners(self) -> usize {
        match self {
            Scale::Small => 4,
            Scale::Medium => 64,
            Scale::Large => 1024,
        }
    }

    pub const ALL: [Scale; 3] = [Scale::Small, Scale::Medium, Scale::Large];
}

/// An initialized registry with `scale` category listeners spread over
/// categories `1..=16` (every one also listening to `hot`) and `scale`
/// attribute listeners. Returns the registry and a counter bumped by every
/// callback.
pub fn populated_registry(scale: Scale, hot: MsgCode) -> (SharedRegistry, Arc<AtomicU64>) {
    let registry = Arc::new(Registry::new(Arc::new(SharedLock::new())));
    registry.init();
    let hits = Arc::new(AtomicU64::new(0));

    for n in 0..scale.listeners() {
        let category_hits = Arc::clone(&hits);
        let cold = (n % 16) as u32 + 1;
        registry.register_category_listener(
            CategoryListener::new()
                .with_categories([MsgCode::new(cold), hot])
                .with_callback(move |_| {
                    category_hits.fetch_add(1, Ordering::Relaxed);
                }),
        )
        .expect("fixture registration");

        let attr_hits = Arc::clone(&hits);
        registry.register_attr_listener(AttrListener::new().with_callback(move |ids| {
            attr_hits.fetch_add(ids.len() as u64, Ordering::Relaxed);
        }))
        .expect("fixture registration");
    }

    (registry, hits)
}
