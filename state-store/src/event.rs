//! Change events for state writes
//!
//! Every write to a state emits a `ChangeEvent` to the listeners whose
//! pattern matches the state id, whether or not the value changed.

use std::time::Instant;

use crate::store::State;

/// A state write observed by a listener
///
/// # Example
///
/// ```rust,ignore
/// store.subscribe("Canvas.*", |event| {
///     if !event.state.ack {
///         println!("command for {}: {}", event.id, event.state.val);
///     }
/// });
/// ```
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Full id of the written state
    pub id: String,

    /// The state as written
    pub state: State,

    /// When the write happened
    pub timestamp: Instant,
}

impl ChangeEvent {
    pub fn new(id: impl Into<String>, state: State) -> Self {
        Self {
            id: id.into(),
            state,
            timestamp: Instant::now(),
        }
    }

    /// Last dot-separated segment of the id
    pub fn state_name(&self) -> &str {
        self.id.rsplit('.').next().unwrap_or(&self.id)
    }

    /// Segment before the state name, if any
    pub fn parent_name(&self) -> Option<&str> {
        let mut segments = self.id.rsplit('.');
        segments.next();
        segments.next()
    }
}

impl PartialEq for ChangeEvent {
    fn eq(&self, other: &Self) -> bool {
        // Timestamp not included in equality
        self.id == other.id && self.state == other.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::StateValue;

    #[test]
    fn test_id_segments() {
        let event = ChangeEvent::new("Canvas.touch.gesture", State::new(StateValue::from(1u8), true));
        assert_eq!(event.state_name(), "gesture");
        assert_eq!(event.parent_name(), Some("touch"));

        let root = ChangeEvent::new("connection", State::new(StateValue::Bool(true), true));
        assert_eq!(root.state_name(), "connection");
        assert_eq!(root.parent_name(), None);
    }

    #[test]
    fn test_change_event_equality() {
        let a = ChangeEvent::new("Canvas.hue", State::new(StateValue::from(10u16), false));
        let b = ChangeEvent::new("Canvas.hue", State::new(StateValue::from(10u16), false));
        let c = ChangeEvent::new("Canvas.hue", State::new(StateValue::from(10u16), true));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
