//!
//! Named typed parameters read by transition conditions and blend trees.
//!

use std::collections::HashMap;

use crate::base::DeterministicState;

/// Kind of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum ParamKind {
    Float,
    Integer,
    Boolean,
    Trigger,
}

/// Value of a parameter.
///
/// Writes of a mismatched kind are coerced to the kind already stored, see `ParamValue::coerce`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Integer(i32),
    Boolean(bool),
    Trigger(bool),
}

impl ParamValue {
    /// Default value of a kind: zero or false.
    pub fn default_of(kind: ParamKind) -> ParamValue {
        match kind {
            ParamKind::Float => ParamValue::Float(0.0),
            ParamKind::Integer => ParamValue::Integer(0),
            ParamKind::Boolean => ParamValue::Boolean(false),
            ParamKind::Trigger => ParamValue::Trigger(false),
        }
    }

    #[inline]
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Float(_) => ParamKind::Float,
            ParamValue::Integer(_) => ParamKind::Integer,
            ParamValue::Boolean(_) => ParamKind::Boolean,
            ParamValue::Trigger(_) => ParamKind::Trigger,
        }
    }

    /// Numeric view of the value, booleans are 0.0 or 1.0.
    #[inline]
    pub fn as_f32(&self) -> f32 {
        match *self {
            ParamValue::Float(v) => v,
            ParamValue::Integer(v) => v as f32,
            ParamValue::Boolean(v) | ParamValue::Trigger(v) => {
                if v {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Boolean view of the value, numbers are true when non zero.
    #[inline]
    pub fn as_bool(&self) -> bool {
        match *self {
            ParamValue::Float(v) => v != 0.0,
            ParamValue::Integer(v) => v != 0,
            ParamValue::Boolean(v) | ParamValue::Trigger(v) => v,
        }
    }

    /// Converts the value into the representation of `kind`.
    ///
    /// Floats are truncated toward zero when converted to integers.
    pub fn coerce(self, kind: ParamKind) -> ParamValue {
        match kind {
            ParamKind::Float => ParamValue::Float(self.as_f32()),
            ParamKind::Integer => match self {
                ParamValue::Integer(v) => ParamValue::Integer(v),
                ParamValue::Float(v) => ParamValue::Integer(v as i32),
                other => ParamValue::Integer(other.as_bool() as i32),
            },
            ParamKind::Boolean => ParamValue::Boolean(self.as_bool()),
            ParamKind::Trigger => ParamValue::Trigger(self.as_bool()),
        }
    }
}

/// Parameter store of an animation component.
///
/// Parameters are unique by name. Unknown names are created on first write with the kind of the
/// written value. Nothing in here fails: reads of unknown names return `None` and callers fall
/// back to a default.
#[derive(Debug, Default, Clone)]
pub struct ParameterStore {
    values: HashMap<String, ParamValue, DeterministicState>,
}

impl ParameterStore {
    pub fn new() -> ParameterStore {
        ParameterStore::default()
    }

    /// Declares a parameter, replacing its kind and value if it already exists.
    pub fn declare<S: Into<String>>(&mut self, name: S, value: ParamValue) {
        self.values.insert(name.into(), value);
    }

    /// Writes a value, coerced to the kind already stored under `name`.
    pub fn set(&mut self, name: &str, value: ParamValue) {
        match self.values.get_mut(name) {
            Some(stored) => {
                let coerced = value.coerce(stored.kind());
                if coerced.kind() != value.kind() {
                    log::trace!("parameter {} coerced {:?} => {:?}", name, value, coerced);
                }
                *stored = coerced;
            }
            None => {
                self.values.insert(name.to_string(), value);
            }
        }
    }

    #[inline]
    pub fn set_float(&mut self, name: &str, value: f32) {
        self.set(name, ParamValue::Float(value));
    }

    #[inline]
    pub fn set_integer(&mut self, name: &str, value: i32) {
        self.set(name, ParamValue::Integer(value));
    }

    #[inline]
    pub fn set_boolean(&mut self, name: &str, value: bool) {
        self.set(name, ParamValue::Boolean(value));
    }

    /// Sets a trigger. It stays set until a transition consumes it or the frame ends.
    #[inline]
    pub fn set_trigger(&mut self, name: &str) {
        self.set(name, ParamValue::Trigger(true));
    }

    #[inline]
    pub fn reset_trigger(&mut self, name: &str) {
        if let Some(ParamValue::Trigger(v)) = self.values.get_mut(name) {
            *v = false;
        }
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.values.get(name).copied()
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    #[inline]
    pub fn kind(&self, name: &str) -> Option<ParamKind> {
        self.values.get(name).map(|v| v.kind())
    }

    #[inline]
    pub fn get_float(&self, name: &str) -> Option<f32> {
        self.get(name).map(|v| v.as_f32())
    }

    #[inline]
    pub fn get_integer(&self, name: &str) -> Option<i32> {
        self.get(name).map(|v| match v.coerce(ParamKind::Integer) {
            ParamValue::Integer(i) => i,
            _ => 0,
        })
    }

    #[inline]
    pub fn get_boolean(&self, name: &str) -> Option<bool> {
        self.get(name).map(|v| v.as_bool())
    }

    /// Numeric value of a parameter, 0.0 for unknown names.
    #[inline]
    pub fn value_f32(&self, name: &str) -> f32 {
        self.get_float(name).unwrap_or(0.0)
    }

    /// Reads and clears a trigger. Returns whether it was set.
    pub fn consume_trigger(&mut self, name: &str) -> bool {
        match self.values.get_mut(name) {
            Some(ParamValue::Trigger(v)) => std::mem::replace(v, false),
            _ => false,
        }
    }

    /// Clears every trigger, called at the end of each update.
    pub fn clear_triggers(&mut self) {
        for value in self.values.values_mut() {
            if let ParamValue::Trigger(v) = value {
                *v = false;
            }
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }
}
