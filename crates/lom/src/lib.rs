//! # LOM - Lute Object Model
//!
//! LOM is the cross-thread-safe reference-counted object model behind the
//! Lute bindings to the portable runtime library. The wrapper layer turns
//! native capabilities (files, sockets, database connections) into script
//! values; LOM is the part that lets those values be shared, referenced, and
//! destroyed across independent interpreter contexts and OS threads without
//! use-after-free, double-free, or leaks.
//!
//! ## Overview
//!
//! The model reconciles two memory regimes. Records start in managed
//! memory, owned by the interpreter context that created them. The first
//! time a record has to cross a context boundary it is *promoted*: its
//! payload moves into an independently allocated, atomically refcounted
//! root, and the original record becomes a forwarding stub.
//!
//! ```text
//! context A                         unmanaged memory            context B
//! ┌────────────────┐                ┌──────────────┐       ┌──────────────┐
//! │ ObjectRecord   │   promotion    │  SharedRoot  │       │ ObjectRecord │
//! │  Local(payload)│ ─────────────► │  refcount: 2 │ ◄──── │  Forward ────│
//! │       becomes  │                │  resource    │       │  (from tuple │
//! │  Forward ──────┼──────────────► │              │       │   or deref)  │
//! └────────────────┘                └──────────────┘       └──────────────┘
//! ```
//!
//! Two transfer paths hand objects to other contexts:
//!
//! - the **tuple codec** packs an ordered value sequence
//!   (`nil`/`bool`/`number`/`string`/`object`) into one flat buffer, pushed
//!   through a bounded **transfer queue** and unpacked on the other side
//! - the **named registry** associates a promoted object with a fresh random
//!   identifier that an unrelated context may dereference exactly once
//!
//! Both take a reference on the root at send time and transfer it to the
//! reconstructed stub at receive time, so counts stay balanced without the
//! two sides ever synchronizing.
//!
//! ## Quick Start
//!
//! ```rust
//! use lom::{Kind, NativeResource, Value};
//!
//! struct Scratch;
//!
//! impl NativeResource for Scratch {
//!     fn kind(&self) -> Kind {
//!         Kind::Pool
//!     }
//!
//!     fn close(&mut self) {}
//! }
//!
//! fn main() -> Result<(), lom::LomError> {
//!     let runtime = lom::init()?;
//!
//!     // Wrap a native capability in a managed record.
//!     let mut object = runtime.new_object(Box::new(Scratch));
//!
//!     // Promote it so other contexts may alias it.
//!     let root = runtime.promote(&mut object)?;
//!     let alias = runtime.create_reference(root);
//!     assert!(alias.same_root(&object));
//!
//!     // Move values across a boundary as one flat buffer.
//!     let mut values = vec![
//!         Value::Number(3.14),
//!         Value::from("hello"),
//!         Value::Object(alias),
//!     ];
//!     let buf = runtime.pack(&mut values)?;
//!     let back = runtime.unpack(buf)?;
//!     assert_eq!(back.len(), 3);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Thread Safety
//!
//! - `Runtime` is `Send + Sync`; one instance serves every context
//! - Reference counts mutate through lock-free atomics only
//! - Promotion requires `&mut`, so it always happens under the originating
//!   context's exclusive ownership of the handle
//! - `collectable` is advisory; a check-then-act caller races against
//!   concurrent holders, which is an accepted property of the model
//!
//! ## Modules
//!
//! - [`arena`]: Unmanaged allocation service and managed scratch pools
//! - [`config`]: Runtime configuration and validation
//! - [`error`]: Error types for all model operations
//! - [`kind`]: Closed set of resource kinds and the resource trait
//! - [`object`]: Records, resolution, and promotion
//! - [`queue`]: Bounded blocking FIFO for cross-thread handoff
//! - [`refcount`]: Atomic share accounting
//! - [`registry`]: Identifier-keyed single-use handoff
//! - [`runtime`]: Service orchestrator and context tracking
//! - [`stats`]: Operation counters
//! - [`tuple`]: Value codec for boundary crossing
//! - [`util`]: Shared helpers

pub mod arena;
pub mod config;
pub mod error;
pub mod kind;
pub mod object;
pub mod queue;
pub mod refcount;
pub mod registry;
pub mod runtime;
pub mod stats;
pub mod tuple;
pub mod util;

pub use config::LomConfig;
pub use error::{LomError, Result};
pub use kind::{expect_kind, Kind, NativeResource};
pub use object::{ObjectRecord, RootRef, SharedPtr};
pub use queue::TransferQueue;
pub use refcount::DecrementOutcome;
pub use runtime::{ContextGuard, Runtime};
pub use stats::StatsSnapshot;
pub use tuple::{TupleBuf, Value};

/// Crate version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the object model with default configuration
///
/// # Examples
///
/// ```rust
/// let runtime = lom::init()?;
/// assert_eq!(runtime.running_contexts(), 0);
/// # Ok::<(), lom::LomError>(())
/// ```
pub fn init() -> Result<Runtime> {
    Runtime::new(LomConfig::default())
}

/// Initialize the object model with custom configuration
///
/// # Examples
///
/// ```rust
/// use lom::LomConfig;
///
/// let config = LomConfig {
///     queue_capacity: 64,
///     verbose: false,
///     ..Default::default()
/// };
/// let runtime = lom::init_with_config(config)?;
/// assert_eq!(runtime.config().queue_capacity, 64);
/// # Ok::<(), lom::LomError>(())
/// ```
pub fn init_with_config(config: LomConfig) -> Result<Runtime> {
    Runtime::new(config)
}
