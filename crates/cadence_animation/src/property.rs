//! Animatable properties
//!
//! A tween drives named properties on any [`Tweenable`] target. Values are
//! either plain numbers or text with a leading number and a unit suffix
//! (`"90px"`, `"50%"`); both are animated as numbers.

use std::fmt;

use indexmap::IndexMap;

/// The value of one animatable property
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    Number(f64),
    Text(String),
}

impl PropertyValue {
    /// The numeric value, if this is a plain number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            PropertyValue::Text(_) => None,
        }
    }

    /// Split into the numeric part and the unit suffix
    ///
    /// Plain numbers have no suffix. Text must start with a number.
    pub fn split_numeric(&self) -> Option<(f64, Option<String>)> {
        match self {
            PropertyValue::Number(n) => Some((*n, None)),
            PropertyValue::Text(text) => {
                let end = text
                    .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
                    .unwrap_or(text.len());
                let (number, suffix) = text.split_at(end);
                let number = number.parse().ok()?;
                Some((number, Some(suffix.to_string())))
            }
        }
    }

    /// Join a number with an optional unit suffix
    pub fn with_suffix(number: f64, suffix: Option<&str>) -> Self {
        match suffix {
            Some(suffix) => PropertyValue::Text(format!("{number}{suffix}")),
            None => PropertyValue::Number(number),
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        PropertyValue::Number(n)
    }
}

impl From<&str> for PropertyValue {
    fn from(text: &str) -> Self {
        PropertyValue::Text(text.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(text: String) -> Self {
        PropertyValue::Text(text)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Number(n) => write!(f, "{n}"),
            PropertyValue::Text(text) => f.write_str(text),
        }
    }
}

/// A target whose named properties can be read and written by tweens
pub trait Tweenable {
    /// Current value of `name`, if the target has it
    fn property(&self, name: &str) -> Option<PropertyValue>;

    /// Overwrite `name`
    fn set_property(&mut self, name: &str, value: PropertyValue);
}

/// A plain bag of named properties, usable directly as a tween target
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyBag {
    values: IndexMap<String, PropertyValue>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set a property
    pub fn with(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<PropertyValue>) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    /// Get a plain numeric property
    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(PropertyValue::as_number)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Tweenable for PropertyBag {
    fn property(&self, name: &str) -> Option<PropertyValue> {
        self.values.get(name).cloned()
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) {
        self.values.insert(name.to_string(), value);
    }
}
