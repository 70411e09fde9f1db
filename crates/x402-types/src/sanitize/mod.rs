//! JSON-safety sanitizer.
//!
//! Converts an arbitrary object graph held in a [`Heap`] into a
//! [`serde_json::Value`] that serializes without loss or failure:
//!
//! - dates become ISO-8601 strings (`2024-01-02T03:04:05.678Z`);
//! - big integers become base-10 strings;
//! - symbols become `Symbol(description)`, functions become `"[Function]"`;
//! - sets become arrays, maps become objects keyed by the key's string form;
//! - `undefined` and `null` object fields are dropped, while `null` array
//!   elements are kept;
//! - a node already on the current path is replaced with `{"[Circular]": true}`.
//!
//! Shared but acyclic references are expanded at every place they appear;
//! only a node reached again from inside itself counts as circular.

mod heap;

pub use heap::*;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Key of the object that replaces a circular reference.
pub const CIRCULAR_MARKER: &str = "[Circular]";
/// String that replaces a function value.
pub const FUNCTION_MARKER: &str = "[Function]";

/// Deepest nesting of objects, arrays, sets and maps that is converted.
pub const MAX_DEPTH: usize = 256;

/// Largest integer an `f64` holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SanitizeError {
    /// The top-level value is a primitive.
    #[error("input must be an object or array, found {0}")]
    InputType(&'static str),
    /// The traversal failed; carries the cause's message.
    #[error("failed to convert to JSON-safe value: {0}")]
    Conversion(String),
}

/// Causes that abort a traversal.
#[derive(Debug, thiserror::Error)]
enum Fault {
    #[error("{0} handle does not belong to this heap")]
    DanglingHandle(&'static str),
    #[error("map key of type {0} cannot be used as a property key")]
    MapKey(&'static str),
    #[error("value is nested deeper than {0} levels")]
    Depth(usize),
}

/// Sanitizes `value` and everything reachable from it.
///
/// `value` must be an object, array, set, map or date.
pub fn sanitize(heap: &Heap, value: &Dynamic) -> Result<Value, SanitizeError> {
    if !value.is_object_like() {
        return Err(SanitizeError::InputType(value.type_name()));
    }
    let mut walker = Walker {
        heap,
        path: HashSet::new(),
    };
    walker
        .element(value)
        .map_err(|fault| SanitizeError::Conversion(fault.to_string()))
}

/// Anything that can produce a JSON-safe tree.
pub trait JsonSafe {
    fn to_json_safe(&self) -> Result<Value, SanitizeError>;
}

impl JsonSafe for Rooted<'_> {
    fn to_json_safe(&self) -> Result<Value, SanitizeError> {
        sanitize(self.heap, &self.value)
    }
}

/// Plain JSON goes through the same rules, so `null` fields are dropped.
impl JsonSafe for Value {
    fn to_json_safe(&self) -> Result<Value, SanitizeError> {
        let mut heap = Heap::new();
        let value = heap.import_json(self);
        sanitize(&heap, &value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Identity {
    Object(ObjectId),
    Array(ArrayId),
    Set(SetId),
    Map(MapId),
}

struct Walker<'h> {
    heap: &'h Heap,
    /// Nodes on the path from the root to the node being converted. Its
    /// size is the current nesting depth.
    path: HashSet<Identity>,
}

impl Walker<'_> {
    /// Converts an object field. `None` drops the field.
    fn field(&mut self, value: &Dynamic) -> Result<Option<Value>, Fault> {
        match value {
            Dynamic::Undefined | Dynamic::Null => Ok(None),
            other => self.element(other).map(Some),
        }
    }

    /// Converts an array element, set member or map value.
    fn element(&mut self, value: &Dynamic) -> Result<Value, Fault> {
        let identity = match value {
            Dynamic::Undefined | Dynamic::Null => return Ok(Value::Null),
            Dynamic::Bool(b) => return Ok(Value::Bool(*b)),
            Dynamic::Number(n) => return Ok(number(*n)),
            Dynamic::String(s) => return Ok(Value::String(s.clone())),
            Dynamic::BigInt(i) => return Ok(Value::String(i.to_string())),
            Dynamic::Date(date) => return Ok(Value::String(iso_string(date))),
            Dynamic::Symbol(description) => return Ok(Value::String(symbol_string(description))),
            Dynamic::Function(_) => return Ok(Value::String(FUNCTION_MARKER.to_string())),
            Dynamic::Object(id) => Identity::Object(*id),
            Dynamic::Array(id) => Identity::Array(*id),
            Dynamic::Set(id) => Identity::Set(*id),
            Dynamic::Map(id) => Identity::Map(*id),
        };
        if self.path.contains(&identity) {
            return Ok(circular());
        }
        if self.path.len() >= MAX_DEPTH {
            return Err(Fault::Depth(MAX_DEPTH));
        }
        self.path.insert(identity);
        let converted = match identity {
            Identity::Object(id) => self.object(id)?,
            Identity::Array(id) => {
                let heap = self.heap;
                let elements = heap.array_elements(id).ok_or(Fault::DanglingHandle("array"))?;
                self.elements(elements)?
            }
            Identity::Set(id) => {
                let heap = self.heap;
                let members = heap.set_members(id).ok_or(Fault::DanglingHandle("set"))?;
                self.elements(members)?
            }
            Identity::Map(id) => self.map(id)?,
        };
        self.path.remove(&identity);
        Ok(converted)
    }

    fn object(&mut self, id: ObjectId) -> Result<Value, Fault> {
        let heap = self.heap;
        let fields = heap.object_fields(id).ok_or(Fault::DanglingHandle("object"))?;
        let mut result = Map::with_capacity(fields.len());
        for (key, value) in fields {
            if let Some(converted) = self.field(value)? {
                result.insert(key.clone(), converted);
            }
        }
        Ok(Value::Object(result))
    }

    fn elements(&mut self, items: &[Dynamic]) -> Result<Value, Fault> {
        let converted = items
            .iter()
            .map(|item| self.element(item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Array(converted))
    }

    fn map(&mut self, id: MapId) -> Result<Value, Fault> {
        let heap = self.heap;
        let entries = heap.map_entries(id).ok_or(Fault::DanglingHandle("map"))?;
        let mut result = Map::with_capacity(entries.len());
        for (key, value) in entries {
            let key = property_key(key)?;
            let value = self.element(value)?;
            result.insert(key, value);
        }
        Ok(Value::Object(result))
    }
}

fn circular() -> Value {
    let mut marker = Map::new();
    marker.insert(CIRCULAR_MARKER.to_string(), Value::Bool(true));
    Value::Object(marker)
}

fn iso_string(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn symbol_string(description: &Option<String>) -> String {
    format!("Symbol({})", description.as_deref().unwrap_or_default())
}

/// Integral values in the safe range are written without a fraction;
/// non-finite values have no JSON form and become `null`.
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// String form of a map key when used as an object property name.
fn property_key(key: &Dynamic) -> Result<String, Fault> {
    let key = match key {
        Dynamic::String(s) => s.clone(),
        Dynamic::Number(n) => number_key(*n),
        Dynamic::Bool(b) => b.to_string(),
        Dynamic::Null => "null".to_string(),
        Dynamic::Undefined => "undefined".to_string(),
        Dynamic::BigInt(i) => i.to_string(),
        Dynamic::Date(date) => iso_string(date),
        Dynamic::Symbol(description) => symbol_string(description),
        other => return Err(Fault::MapKey(other.type_name())),
    };
    Ok(key)
}

fn number_key(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let key = if n > 0.0 { "Infinity" } else { "-Infinity" };
        key.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        n.to_string()
    }
}
