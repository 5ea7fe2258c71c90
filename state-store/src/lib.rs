//! Object/State Store
//!
//! A small in-memory store of named objects (devices, channels, states)
//! and the current value of each state.
//!
//! # Features
//!
//! - **Typed descriptors**: every state declares its type, role, range and enumerated values
//! - **Acknowledgement flag**: writes with `ack == false` are commands, `ack == true` are confirmed values
//! - **Prefix access**: read states and delete object trees by dotted-id prefix
//! - **Change listeners**: callbacks for every write to a matching id
//!
//! # Quick Start
//!
//! ```rust
//! use state_store::{ObjectDescriptor, StateStore, ValueType};
//!
//! let store = StateStore::new();
//! store.set_object_not_exists("Canvas", ObjectDescriptor::device("Canvas Device"));
//! store.set_object_not_exists(
//!     "Canvas.brightness",
//!     ObjectDescriptor::state("Brightness level", ValueType::Number).writable(),
//! );
//!
//! // React to unacknowledged writes (commands)
//! store.subscribe("Canvas.*", |event| {
//!     if !event.state.ack {
//!         println!("command {} = {}", event.id, event.state.val);
//!     }
//! });
//!
//! store.set_state("Canvas.brightness", 40u8, false).unwrap();
//! ```
//!
//! # Architecture
//!
//! ```text
//! StateStore
//!     │
//!     ├── objects:   BTreeMap<id, ObjectDescriptor>
//!     ├── states:    BTreeMap<id, State { val, ack, ts }>
//!     └── listeners: Vec<(ListenerId, Pattern, Fn(&ChangeEvent))>
//! ```

// Modules
pub mod event;
pub mod object;
pub mod store;
pub mod value;

// Re-exports - Public API
pub use event::ChangeEvent;
pub use object::{CommonMeta, ObjectDescriptor, ObjectKind, ValueType};
pub use store::{ChangeListener, ListenerId, Pattern, State, StateStore, StoreError};
pub use value::StateValue;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::event::ChangeEvent;
    pub use crate::object::{ObjectDescriptor, ValueType};
    pub use crate::store::{State, StateStore};
    pub use crate::value::StateValue;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_workflow() {
        let store = StateStore::new();
        store.set_object_not_exists("Canvas", ObjectDescriptor::device("Canvas Device"));
        store.set_object_not_exists(
            "Canvas.state",
            ObjectDescriptor::state("Power State", ValueType::Boolean).writable(),
        );

        let (tx, rx) = std::sync::mpsc::channel();
        store.subscribe("Canvas.*", move |event| {
            let _ = tx.send(event.clone());
        });

        store.set_state("Canvas.state", true, false).unwrap();

        let event = rx.recv_timeout(std::time::Duration::from_millis(100)).unwrap();
        assert_eq!(event.state_name(), "state");
        assert_eq!(event.state.val, StateValue::Bool(true));
        assert!(!event.state.ack);
    }

    #[test]
    fn test_store_clone_shares_state() {
        let store1 = StateStore::new();
        let store2 = store1.clone();

        store1.set_object("Canvas.hue", ObjectDescriptor::state("Hue", ValueType::Number));
        store1.set_state("Canvas.hue", 50u8, true).unwrap();

        assert_eq!(store2.get_state("Canvas.hue").unwrap().val.as_i64(), Some(50));
    }
}
