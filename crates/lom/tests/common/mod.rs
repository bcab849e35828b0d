//! Shared fixtures for object model integration tests

#![allow(dead_code)]

use lom::arena::{ArenaService, CountingArena};
use lom::{Kind, LomConfig, NativeResource, ObjectRecord, Runtime};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Resource double that counts how often it is closed
///
/// Every promoted root must close its resource exactly once, on whichever
/// thread drops the last reference.
pub struct TestResource {
    kind: Kind,
    closes: Arc<AtomicUsize>,
}

impl TestResource {
    pub fn new(kind: Kind, closes: Arc<AtomicUsize>) -> Self {
        Self { kind, closes }
    }
}

impl NativeResource for TestResource {
    fn kind(&self) -> Kind {
        self.kind
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Runtime wired to an allocation-tracking arena
pub struct ModelFixture {
    pub runtime: Arc<Runtime>,
    pub arena: Arc<CountingArena>,
}

impl ModelFixture {
    pub fn with_defaults() -> Self {
        Self::with_config(LomConfig::default())
    }

    pub fn with_config(config: LomConfig) -> Self {
        let arena = Arc::new(CountingArena::new());
        let dyn_arena: Arc<dyn ArenaService> = arena.clone();
        let runtime = Runtime::with_arena(config, dyn_arena).expect("valid test configuration");

        Self {
            runtime: Arc::new(runtime),
            arena,
        }
    }

    /// Create a test object and the close counter observing its resource
    pub fn new_object(&self, kind: Kind) -> (ObjectRecord, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let record = self
            .runtime
            .new_object(Box::new(TestResource::new(kind, Arc::clone(&closes))));
        (record, closes)
    }
}
