//! Object and state storage
//!
//! This module provides the core storage primitives:
//! - `State`: a value plus its acknowledgement flag
//! - `StateStore`: objects keyed by dotted id, their current states and
//!   the listeners notified on every state write

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use crate::event::ChangeEvent;
use crate::object::ObjectDescriptor;
use crate::value::StateValue;

// ============================================================================
// Errors
// ============================================================================

/// Error type for store operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No object with this id exists
    UnknownObject(String),
    /// The object exists but is a device or channel
    NotAState(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::UnknownObject(id) => write!(f, "State '{}' does not exist", id),
            StoreError::NotAState(id) => write!(f, "Object '{}' is not a state", id),
        }
    }
}

impl std::error::Error for StoreError {}

pub type Result<T> = std::result::Result<T, StoreError>;

// ============================================================================
// State
// ============================================================================

/// Current value of a state
///
/// `ack == false` marks a command that has not been confirmed by the device.
#[derive(Debug, Clone)]
pub struct State {
    pub val: StateValue,
    pub ack: bool,
    pub ts: SystemTime,
}

impl State {
    pub fn new(val: StateValue, ack: bool) -> Self {
        Self {
            val,
            ack,
            ts: SystemTime::now(),
        }
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.val == other.val && self.ack == other.ack
    }
}

// ============================================================================
// Id patterns
// ============================================================================

/// Id filter: `*` matches everything, `prefix.*` a subtree, anything else exactly
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    All,
    Prefix(String),
    Exact(String),
}

impl Pattern {
    pub fn parse(pattern: &str) -> Self {
        if pattern == "*" {
            Pattern::All
        } else if let Some(prefix) = pattern.strip_suffix('*') {
            Pattern::Prefix(prefix.to_string())
        } else {
            Pattern::Exact(pattern.to_string())
        }
    }

    pub fn matches(&self, id: &str) -> bool {
        match self {
            Pattern::All => true,
            Pattern::Prefix(prefix) => id.starts_with(prefix.as_str()),
            Pattern::Exact(exact) => id == exact,
        }
    }
}

// ============================================================================
// StateStore
// ============================================================================

/// Callback invoked after each matching state write
pub type ChangeListener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Handle returned by [`StateStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Store of named objects and their states
///
/// Ids are dot-separated paths (`Canvas.info.model`). A state can only be
/// written once its object exists. Cloning the store shares its contents.
///
/// # Example
///
/// ```rust
/// use state_store::{ObjectDescriptor, StateStore, ValueType};
///
/// let store = StateStore::new();
/// store.set_object_not_exists("Canvas.hue", ObjectDescriptor::state("Hue", ValueType::Number));
/// store.set_state("Canvas.hue", 120u16, true).unwrap();
///
/// assert_eq!(store.get_state("Canvas.hue").unwrap().val.as_i64(), Some(120));
/// ```
#[derive(Clone, Default)]
pub struct StateStore {
    objects: Arc<RwLock<BTreeMap<String, ObjectDescriptor>>>,
    states: Arc<RwLock<BTreeMap<String, State>>>,
    listeners: Arc<RwLock<Vec<(ListenerId, Pattern, ChangeListener)>>>,
    next_listener: Arc<AtomicU64>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- objects -----------------------------------------------------------

    pub fn get_object(&self, id: &str) -> Option<ObjectDescriptor> {
        read(&self.objects).get(id).cloned()
    }

    pub fn object_exists(&self, id: &str) -> bool {
        read(&self.objects).contains_key(id)
    }

    /// Create or replace an object
    pub fn set_object(&self, id: &str, descriptor: ObjectDescriptor) {
        write(&self.objects).insert(id.to_string(), descriptor);
    }

    /// Create an object unless one already exists, returning whether it was created
    pub fn set_object_not_exists(&self, id: &str, descriptor: ObjectDescriptor) -> bool {
        let mut objects = write(&self.objects);
        if objects.contains_key(id) {
            return false;
        }
        objects.insert(id.to_string(), descriptor);
        true
    }

    /// Delete one object and its state, returning whether it existed
    pub fn del_object(&self, id: &str) -> bool {
        write(&self.states).remove(id);
        write(&self.objects).remove(id).is_some()
    }

    /// Delete an object together with everything below it, returning the number removed
    pub fn del_object_recursive(&self, id: &str) -> usize {
        let child_prefix = format!("{}.", id);
        let in_tree = |key: &String| key == id || key.starts_with(&child_prefix);

        write(&self.states).retain(|key, _| !in_tree(key));
        let mut objects = write(&self.objects);
        let before = objects.len();
        objects.retain(|key, _| !in_tree(key));
        before - objects.len()
    }

    /// Ids of all objects matching `pattern`
    pub fn object_ids(&self, pattern: &str) -> Vec<String> {
        let pattern = Pattern::parse(pattern);
        read(&self.objects)
            .keys()
            .filter(|id| pattern.matches(id))
            .cloned()
            .collect()
    }

    // ---- states ------------------------------------------------------------

    pub fn get_state(&self, id: &str) -> Option<State> {
        read(&self.states).get(id).cloned()
    }

    /// Current states of all ids matching `pattern`
    pub fn get_states(&self, pattern: &str) -> BTreeMap<String, State> {
        let pattern = Pattern::parse(pattern);
        read(&self.states)
            .iter()
            .filter(|(id, _)| pattern.matches(id))
            .map(|(id, state)| (id.clone(), state.clone()))
            .collect()
    }

    /// Write a state and notify matching listeners
    pub fn set_state(&self, id: &str, val: impl Into<StateValue>, ack: bool) -> Result<()> {
        match read(&self.objects).get(id) {
            None => return Err(StoreError::UnknownObject(id.to_string())),
            Some(object) if !object.is_state() => return Err(StoreError::NotAState(id.to_string())),
            Some(_) => {}
        }

        let state = State::new(val.into(), ack);
        write(&self.states).insert(id.to_string(), state.clone());
        self.notify(ChangeEvent::new(id, state));
        Ok(())
    }

    pub fn state_count(&self) -> usize {
        read(&self.states).len()
    }

    // ---- listeners ---------------------------------------------------------

    /// Register a listener for writes to ids matching `pattern`
    pub fn subscribe<F>(&self, pattern: &str, listener: F) -> ListenerId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        write(&self.listeners).push((id, Pattern::parse(pattern), Arc::new(listener)));
        id
    }

    /// Remove a listener, returning whether it was registered
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = write(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(listener_id, _, _)| *listener_id != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        read(&self.listeners).len()
    }

    /// Listeners run after all locks are released so they may write back
    fn notify(&self, event: ChangeEvent) {
        let matching: Vec<ChangeListener> = read(&self.listeners)
            .iter()
            .filter(|(_, pattern, _)| pattern.matches(&event.id))
            .map(|(_, _, listener)| Arc::clone(listener))
            .collect();

        for listener in matching {
            listener(&event);
        }
    }
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("object_count", &read(&self.objects).len())
            .field("state_count", &self.state_count())
            .finish()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
