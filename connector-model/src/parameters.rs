// Launch parameter descriptions
//
// Typed descriptors for connector launch arguments, the frozen ordered set a
// connector exposes, and the binding step that checks caller values against it

use crate::error::ValidationError;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Arguments supplied to a launch, keyed by parameter name
pub type LaunchArgs = BTreeMap<String, ParamValue>;

/// Value type of a launch parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Bool,
    Int,
    // Only ever found on arguments, never declared
    Number,
    Null,
    Array,
    Object,
}

impl ParamType {
    /// Name of the type in JSON schema terms
    pub fn schema_name(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Bool => "boolean",
            ParamType::Int => "integer",
            ParamType::Number => "number",
            ParamType::Null => "null",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.schema_name())
    }
}

/// A launch argument or parameter default
///
/// Any JSON value deserializes; shapes no parameter can declare land in
/// `Other` and fail binding with a type mismatch.
#[derive(Debug, Clone, PartialEq, serde::Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    String(String),
    Other(Value),
}

impl ParamValue {
    pub fn value_type(&self) -> ParamType {
        match self {
            ParamValue::Bool(_) => ParamType::Bool,
            ParamValue::Int(_) => ParamType::Int,
            ParamValue::String(_) => ParamType::String,
            ParamValue::Other(Value::Bool(_)) => ParamType::Bool,
            ParamValue::Other(Value::String(_)) => ParamType::String,
            ParamValue::Other(Value::Number(_)) => ParamType::Number,
            ParamValue::Other(Value::Null) => ParamType::Null,
            ParamValue::Other(Value::Array(_)) => ParamType::Array,
            ParamValue::Other(Value::Object(_)) => ParamType::Object,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) | ParamValue::Other(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) | ParamValue::Other(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Bool(b) => Value::Bool(*b),
            ParamValue::Int(i) => Value::from(*i),
            ParamValue::String(s) => Value::String(s.clone()),
            ParamValue::Other(v) => v.clone(),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::String(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::String(s)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Int(i)
    }
}

/// Describes one typed launch argument
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDescriptor {
    pub name: String,
    pub value_type: ParamType,
    pub required: bool,
    pub default: Option<ParamValue>,
    pub display_name: String,
    pub description: String,
}

impl ParameterDescriptor {
    /// Build a descriptor. An optional parameter's default must be of `value_type`.
    pub fn create(
        value_type: ParamType,
        name: impl Into<String>,
        required: bool,
        default: impl Into<ParamValue>,
        display_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let default = default.into();
        let name = name.into();
        debug_assert!(
            required || default.value_type() == value_type,
            "default for optional parameter '{}' must be {}",
            name,
            value_type
        );

        Self {
            name,
            value_type,
            required,
            default: Some(default),
            display_name: display_name.into(),
            description: description.into(),
        }
    }

    /// Pick this parameter's value out of `args`
    ///
    /// A present value must match the declared type. An absent value is an
    /// error for required parameters and the default otherwise.
    pub fn get(&self, args: &LaunchArgs) -> Result<ParamValue, ValidationError> {
        match args.get(&self.name) {
            Some(value) if value.value_type() == self.value_type => Ok(value.clone()),
            Some(value) => Err(ValidationError::TypeMismatch {
                name: self.name.clone(),
                expected: self.value_type,
                found: value.value_type(),
            }),
            None if self.required => Err(ValidationError::Missing(self.name.clone())),
            None => self
                .default
                .clone()
                .ok_or_else(|| ValidationError::Missing(self.name.clone())),
        }
    }
}

/// Ordered, name-unique, immutable set of parameter descriptors
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    entries: Arc<Vec<ParameterDescriptor>>,
}

impl ParameterSet {
    /// Snapshot `descriptors` in order. A repeated name replaces the earlier
    /// entry in its original position.
    pub fn copy_of(descriptors: impl IntoIterator<Item = ParameterDescriptor>) -> Self {
        let mut entries: Vec<ParameterDescriptor> = Vec::new();
        for desc in descriptors {
            match entries.iter_mut().find(|d| d.name == desc.name) {
                Some(existing) => *existing = desc,
                None => entries.push(desc),
            }
        }

        Self {
            entries: Arc::new(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.entries.iter().find(|d| d.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterDescriptor> {
        self.entries.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|d| d.name.as_str()).collect()
    }

    /// Validate `args` against every descriptor, in display order
    pub fn bind(&self, args: &LaunchArgs) -> Result<BoundArgs, ValidationError> {
        for name in args.keys() {
            if self.get(name).is_none() {
                debug!("Ignoring undeclared launch argument '{}'", name);
            }
        }

        let mut values = BTreeMap::new();
        for desc in self.iter() {
            values.insert(desc.name.clone(), desc.get(args)?);
        }

        Ok(BoundArgs { values })
    }

    /// Render as a JSON schema object for hosts that build launch forms
    pub fn to_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for desc in self.iter() {
            let mut prop = json!({
                "type": desc.value_type.schema_name(),
                "title": desc.display_name,
                "description": desc.description,
            });
            if let Some(default) = &desc.default {
                prop["default"] = default.to_json();
            }
            properties.insert(desc.name.clone(), prop);

            if desc.required {
                required.push(Value::String(desc.name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

impl Serialize for ParameterSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ParameterSet", 1)?;
        state.serialize_field("parameters", &*self.entries)?;
        state.end()
    }
}

/// Launch arguments that passed binding, one value per declared parameter
#[derive(Debug, Clone, PartialEq)]
pub struct BoundArgs {
    values: BTreeMap<String, ParamValue>,
}

impl BoundArgs {
    pub fn get(&self, name: &str) -> Result<&ParamValue, ValidationError> {
        self.values
            .get(name)
            .ok_or_else(|| ValidationError::Unknown(name.to_string()))
    }

    pub fn string(&self, name: &str) -> Result<&str, ValidationError> {
        let value = self.get(name)?;
        value.as_str().ok_or_else(|| ValidationError::TypeMismatch {
            name: name.to_string(),
            expected: ParamType::String,
            found: value.value_type(),
        })
    }

    pub fn boolean(&self, name: &str) -> Result<bool, ValidationError> {
        let value = self.get(name)?;
        value.as_bool().ok_or_else(|| ValidationError::TypeMismatch {
            name: name.to_string(),
            expected: ParamType::Bool,
            found: value.value_type(),
        })
    }
}
