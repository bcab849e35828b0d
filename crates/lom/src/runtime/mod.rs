//! Runtime Module - Object Model Orchestrator
//!
//! The [`Runtime`] owns the process-wide services of the model and injects
//! them into every operation: the unmanaged arena, the named registry, the
//! context tracker, and the statistics counters. It is the only entry point
//! the wrapper layer needs; nothing here lives in a module-level singleton,
//! so lifetime and threading discipline stay visible and testable.

pub mod context;

pub use context::{ContextGuard, ContextTracker};

use crate::arena::{ArenaService, SystemArena};
use crate::config::LomConfig;
use crate::error::{LomError, Result};
use crate::kind::NativeResource;
use crate::object::{promote, ObjectRecord, SharedPtr};
use crate::queue::TransferQueue;
use crate::refcount;
use crate::registry::NamedRegistry;
use crate::stats::{ModelStats, StatsSnapshot};
use crate::tuple::{self, TupleBuf, Value};
use std::sync::Arc;

/// Object model runtime
///
/// `Send + Sync`: one runtime is shared by every interpreter context in the
/// process.
pub struct Runtime {
    config: LomConfig,
    arena: Arc<dyn ArenaService>,
    registry: NamedRegistry,
    contexts: Arc<ContextTracker>,
    stats: Arc<ModelStats>,
}

impl Runtime {
    /// Create a runtime backed by the global allocator
    pub fn new(config: LomConfig) -> Result<Self> {
        Self::with_arena(config, Arc::new(SystemArena::new()))
    }

    /// Create a runtime with an explicit unmanaged arena
    ///
    /// Tests inject an allocation-tracking arena here.
    pub fn with_arena(config: LomConfig, arena: Arc<dyn ArenaService>) -> Result<Self> {
        config.validate().map_err(LomError::from)?;

        if config.verbose {
            log::info!(
                "object model runtime starting (queue capacity {}, tuple limit {})",
                config.queue_capacity,
                config.max_tuple_len
            );
        }

        Ok(Self {
            registry: NamedRegistry::new(config.registry_warn_threshold),
            contexts: Arc::new(ContextTracker::new()),
            stats: Arc::new(ModelStats::new(config.stats_enabled)),
            arena,
            config,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &LomConfig {
        &self.config
    }

    /// The arena service backing unmanaged allocations
    pub fn arena(&self) -> &Arc<dyn ArenaService> {
        &self.arena
    }

    // === Object lifecycle ===

    /// Wrap a native capability in a fresh managed record (refcount 1)
    pub fn new_object(&self, resource: Box<dyn NativeResource>) -> ObjectRecord {
        self.stats.record_object_created();
        ObjectRecord::new(resource)
    }

    /// Promote a record into a shared, unmanaged root
    ///
    /// Idempotent; see [`crate::object::promote`].
    pub fn promote(&self, record: &mut ObjectRecord) -> Result<SharedPtr> {
        let was_promoted = record.is_promoted();
        let root = promote(record, &self.arena)?;
        if !was_promoted {
            self.stats.record_promotion();
        }
        Ok(root)
    }

    /// Create an additional stub aliasing a promoted root
    ///
    /// The stub takes its own reference on the root and releases it when
    /// dropped.
    pub fn create_reference(&self, root: SharedPtr) -> ObjectRecord {
        let record = ObjectRecord::from_shared(root);
        refcount::increment(&record);
        self.stats.record_reference_created();
        record
    }

    // === Tuple transfer ===

    /// Pack values into a transferable buffer
    ///
    /// See [`crate::tuple::pack`]. Rejects sequences longer than the
    /// configured tuple limit.
    pub fn pack(&self, values: &mut [Value]) -> Result<TupleBuf> {
        if values.len() > self.config.max_tuple_len {
            return Err(LomError::InvalidArgument(format!(
                "tuple of {} elements exceeds limit {}",
                values.len(),
                self.config.max_tuple_len
            )));
        }

        let buf = tuple::pack(values, &self.arena)?;
        self.stats.record_pack(values.len());
        Ok(buf)
    }

    /// Unpack a buffer, consuming it
    ///
    /// See [`crate::tuple::unpack`]. Rejects buffers whose header claims
    /// more elements than the configured tuple limit.
    pub fn unpack(&self, buf: TupleBuf) -> Result<Vec<Value>> {
        if let Some(count) = buf.element_count() {
            if count > self.config.max_tuple_len {
                return Err(LomError::CorruptTuple {
                    tag: 0,
                    decoded: 0,
                });
            }
        }

        let values = tuple::unpack(buf)?;
        self.stats.record_unpack();
        Ok(values)
    }

    /// Create a transfer queue sized from configuration
    pub fn transfer_queue(&self) -> Arc<TransferQueue<TupleBuf>> {
        Arc::new(TransferQueue::new(self.config.queue_capacity))
    }

    // === Named registry ===

    /// Register an object under a fresh identifier
    pub fn ref_object(&self, record: &mut ObjectRecord) -> Result<String> {
        let id = self.registry.register(record, &self.arena)?;
        self.stats.record_registration();
        Ok(id)
    }

    /// Retrieve and consume a registered object
    pub fn deref_object(&self, identifier: &str) -> Result<ObjectRecord> {
        match self.registry.take(identifier) {
            Ok(record) => {
                self.stats.record_deref(true);
                Ok(record)
            }
            Err(err) => {
                self.stats.record_deref(false);
                Err(err)
            }
        }
    }

    /// Entries currently registered
    pub fn registry_len(&self) -> usize {
        self.registry.len()
    }

    // === Context lifecycle ===

    /// Register a child execution context
    pub fn register_context(&self) -> ContextGuard {
        ContextTracker::register(&self.contexts)
    }

    /// Contexts currently running
    pub fn running_contexts(&self) -> usize {
        self.contexts.running()
    }

    /// Block until every child context has finished
    pub fn wait_for_contexts(&self) {
        self.contexts.wait_idle();
    }

    /// Block until idle or until `timeout` elapses; true on idle
    pub fn wait_for_contexts_timeout(&self, timeout: std::time::Duration) -> bool {
        self.contexts.wait_idle_for(timeout)
    }

    // === Monitoring and teardown ===

    /// Point-in-time operation counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Orderly teardown
    ///
    /// Blocks until child contexts finish, then reports identifiers that
    /// were registered but never dereferenced. Registry references are
    /// released when the runtime drops.
    pub fn shutdown(self) {
        self.wait_for_contexts();

        let leaked = self.registry.log_leaked();
        if self.config.verbose {
            log::info!(
                "object model runtime stopping ({} leaked registry entries)",
                leaked
            );
        }
    }
}

static_assertions::assert_impl_all!(Runtime: Send, Sync);
