//! Shared-store transports
//!
//! The bus only talks to the store through the `SharedStore` port, so an
//! external backend can be plugged in next to the in-process one.

pub mod memory;

pub use memory::{MemoryStore, MemorySubscription, glob_match};

#[cfg(test)]
mod tests {
    use super::*;
    use concord_ports::SharedStore;

    #[test]
    fn test_memory_store_is_a_shared_store() {
        let store: Box<dyn SharedStore> = Box::new(MemoryStore::new());
        assert!(store.subscription().is_ok());
    }
}
