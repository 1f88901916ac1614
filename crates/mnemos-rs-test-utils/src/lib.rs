//! Test helpers shared across Mnemos crates.

pub mod memory;
pub mod sessions;

pub use memory::StubMemoryStore;
pub use sessions::{
    FailingSessionIndex, InMemorySessionIndex, InsertFailingSessionIndex, RacingSessionIndex,
};
