//! Object descriptors: devices, channels and states with their metadata

use std::collections::BTreeMap;

use crate::value::StateValue;

/// Kind of a stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Device,
    Channel,
    State,
}

/// Declared value type of a state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Boolean,
    Number,
    String,
}

/// Shared metadata of an object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommonMeta {
    pub name: String,
    pub value_type: Option<ValueType>,
    pub role: Option<String>,
    pub unit: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub def: Option<StateValue>,
    pub read: bool,
    pub write: bool,
    pub desc: Option<String>,
    /// Enumerated values: raw value -> display label
    pub states: Option<BTreeMap<String, String>>,
}

/// A device, channel or state definition
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDescriptor {
    pub kind: ObjectKind,
    pub common: CommonMeta,
}

impl ObjectDescriptor {
    pub fn device(name: impl Into<String>) -> Self {
        Self::container(ObjectKind::Device, name)
    }

    pub fn channel(name: impl Into<String>) -> Self {
        Self::container(ObjectKind::Channel, name)
    }

    /// A readable, non-writable state of the given type
    pub fn state(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            kind: ObjectKind::State,
            common: CommonMeta {
                name: name.into(),
                value_type: Some(value_type),
                read: true,
                ..CommonMeta::default()
            },
        }
    }

    fn container(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            common: CommonMeta {
                name: name.into(),
                ..CommonMeta::default()
            },
        }
    }

    pub fn is_state(&self) -> bool {
        self.kind == ObjectKind::State
    }

    pub fn writable(mut self) -> Self {
        self.common.write = true;
        self
    }

    /// Write-only states (buttons, payload inputs)
    pub fn write_only(mut self) -> Self {
        self.common.read = false;
        self.common.write = true;
        self
    }

    pub fn role(mut self, role: &str) -> Self {
        self.common.role = Some(role.to_string());
        self
    }

    pub fn unit(mut self, unit: &str) -> Self {
        self.common.unit = Some(unit.to_string());
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.common.min = Some(min);
        self.common.max = Some(max);
        self
    }

    pub fn default_value(mut self, def: impl Into<StateValue>) -> Self {
        self.common.def = Some(def.into());
        self
    }

    pub fn desc(mut self, desc: &str) -> Self {
        self.common.desc = Some(desc.to_string());
        self
    }

    pub fn states<I, K, V>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.common.states = Some(states.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }
}
