//! Sockengine Core
//!
//! Runtime-agnostic primitives backing the sockengine async socket engine:
//! - Pinned / io_uring-safe allocation (`alloc`)
//! - The tri-state I/O queue (`queue`)
//! - A pending-counter RAII guard (`guard`)
//! - Error types (`error`)
//! - Queue configuration (`options`)
//! - TCP tuning helpers (`tcp`)

#![deny(unsafe_code)]
// Allow some pedantic lints that are intentional in this crate
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::needless_pass_by_ref_mut)]
#![allow(clippy::match_same_arms)]

pub mod alloc;
pub mod error;
pub mod guard;
pub mod options;
pub mod queue;
pub mod tcp;

/// Small prelude to make downstream crates ergonomic. Kept minimal to avoid
/// API lock-in.
pub mod prelude {
    pub use crate::alloc::{IoArena, IoBytes, SlabMut};
    pub use crate::error::{EngineError, EngineResult};
    pub use crate::guard::PendingGuard;
    pub use crate::options::QueueOptions;
    pub use crate::queue::{IoQueue, QueueBuffer, QueueSlot};
}
