//! Mapping engine: allocation, range enforcement, streaming.

pub mod allocator;
pub mod bounds;
pub mod checker;
pub mod driver;
pub mod observer;
pub mod point;

pub use allocator::{resolve_weights, Allocator};
pub use bounds::{resolver_for, Bound, BoundPair, BoundResolver, Side};
pub use checker::{CheckInput, Checker, Correction, Verdict};
pub use driver::{MappingDriver, RunPhase, RunSummary};
pub use observer::{ChunkBatch, CollectingObserver, MappingObserver};
pub use point::PointState;
