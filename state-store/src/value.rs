//! Dynamically typed state values
//!
//! Values arrive both from the device (typed JSON) and from users (often
//! strings typed into a UI), so accessors are lenient about representation.

use std::fmt;

/// Value held by a state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StateValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl StateValue {
    pub fn is_null(&self) -> bool {
        matches!(self, StateValue::Null)
    }

    /// Truthiness: numbers are true when non-zero, text accepts `true/false/on/off/1/0`
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StateValue::Bool(b) => Some(*b),
            StateValue::Number(n) => Some(*n != 0.0),
            StateValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "on" | "1" => Some(true),
                "false" | "off" | "0" | "" => Some(false),
                _ => None,
            },
            StateValue::Null => None,
        }
    }

    /// Numeric view; text is parsed after trimming
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StateValue::Number(n) => Some(*n),
            StateValue::Text(s) => s.trim().parse().ok(),
            StateValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            StateValue::Null => None,
        }
    }

    /// Integer view, truncating any fraction
    pub fn as_i64(&self) -> Option<i64> {
        self.as_f64().filter(|n| n.is_finite()).map(|n| n.trunc() as i64)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StateValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Null => f.write_str("null"),
            StateValue::Bool(b) => write!(f, "{}", b),
            StateValue::Number(n) if n.fract() == 0.0 && n.is_finite() => write!(f, "{}", *n as i64),
            StateValue::Number(n) => write!(f, "{}", n),
            StateValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        StateValue::Bool(value)
    }
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        StateValue::Number(value)
    }
}

macro_rules! from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for StateValue {
                fn from(value: $ty) -> Self {
                    StateValue::Number(value as f64)
                }
            }
        )*
    };
}

from_integer!(u8, u16, u32, u64, i32, i64);

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        StateValue::Text(value.to_string())
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        StateValue::Text(value)
    }
}

impl<T: Into<StateValue>> From<Option<T>> for StateValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(StateValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(StateValue::Bool(true), Some(true))]
    #[case(StateValue::Number(0.0), Some(false))]
    #[case(StateValue::Text("on".into()), Some(true))]
    #[case(StateValue::Text("maybe".into()), None)]
    #[case(StateValue::Null, None)]
    fn test_as_bool(#[case] value: StateValue, #[case] expected: Option<bool>) {
        assert_eq!(value.as_bool(), expected);
    }

    #[rstest]
    #[case(StateValue::Number(42.9), Some(42))]
    #[case(StateValue::Text(" 75 ".into()), Some(75))]
    #[case(StateValue::Text("abc".into()), None)]
    #[case(StateValue::Bool(true), Some(1))]
    fn test_as_i64(#[case] value: StateValue, #[case] expected: Option<i64>) {
        assert_eq!(value.as_i64(), expected);
    }

    #[test]
    fn test_display() {
        assert_eq!(StateValue::Number(100.0).to_string(), "100");
        assert_eq!(StateValue::Number(2.5).to_string(), "2.5");
        assert_eq!(StateValue::from("Flames").to_string(), "Flames");
        assert_eq!(StateValue::Null.to_string(), "null");
    }

    #[test]
    fn test_from_option() {
        assert_eq!(StateValue::from(None::<u8>), StateValue::Null);
        assert_eq!(StateValue::from(Some(3u8)), StateValue::Number(3.0));
    }
}
