//! Infrastructure layer - concrete collaborator implementations

pub mod memory;

pub use memory::{
    InMemoryOracle, InMemoryRegistry, InMemoryReserve, InMemoryToken, ManualClock, OwnerAccess,
};
