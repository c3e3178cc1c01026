//! Scenario parameters: named, typed values that conditions read and
//! global actions write.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ScenarioError, ScenarioResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl ParameterValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ParameterValue::Number(_) => "number",
            ParameterValue::Bool(_) => "bool",
            ParameterValue::Text(_) => "text",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParameterValue::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Number(v) => write!(f, "{v}"),
            ParameterValue::Bool(v) => write!(f, "{v}"),
            ParameterValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Number(v)
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        ParameterValue::Bool(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::Text(v.to_string())
    }
}

/// Declared parameters. Defaults are kept apart from current values so a
/// reset can restore them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    defaults: BTreeMap<String, ParameterValue>,
    current: BTreeMap<String, ParameterValue>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare (or redeclare) a parameter with its default value.
    pub fn declare(&mut self, name: impl Into<String>, value: impl Into<ParameterValue>) {
        let name = name.into();
        let value = value.into();
        self.defaults.insert(name.clone(), value.clone());
        self.current.insert(name, value);
    }

    pub fn get(&self, name: &str) -> ScenarioResult<&ParameterValue> {
        self.current
            .get(name)
            .ok_or_else(|| ScenarioError::ParameterNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.current.contains_key(name)
    }

    /// Overwrite a declared parameter. The new value must have the same
    /// type as the declared one.
    pub fn set(&mut self, name: &str, value: ParameterValue) -> ScenarioResult<()> {
        let slot = self
            .current
            .get_mut(name)
            .ok_or_else(|| ScenarioError::ParameterNotFound(name.to_string()))?;
        if std::mem::discriminant(slot) != std::mem::discriminant(&value) {
            return Err(ScenarioError::ParameterType {
                parameter: name.to_string(),
                detail: format!("declared {}, got {}", slot.type_name(), value.type_name()),
            });
        }
        *slot = value;
        Ok(())
    }

    /// Numeric value of a parameter, failing if it is not a number.
    pub fn number(&self, name: &str) -> ScenarioResult<f64> {
        let value = self.get(name)?;
        value.as_number().ok_or_else(|| ScenarioError::ParameterType {
            parameter: name.to_string(),
            detail: format!("expected number, found {}", value.type_name()),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.current.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Restore every parameter to its declared default.
    pub fn reset(&mut self) {
        self.current = self.defaults.clone();
    }

    pub fn clear(&mut self) {
        self.defaults.clear();
        self.current.clear();
    }
}
