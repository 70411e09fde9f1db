//! Arena model of arbitrary object graphs.
//!
//! Payment requirements assembled by callers may contain values JSON has no
//! type for (dates, big integers, sets, maps, symbols, functions) and may
//! reference themselves. A [`Heap`] owns every reference-typed node (objects,
//! arrays, sets, maps); a [`Dynamic`] is either a scalar or the id of such a
//! node. Cycles are just ids pointing back up the graph, so no reference
//! counting or interior mutability is involved.
//!
//! ```
//! use x402_types::sanitize::{Dynamic, Heap};
//!
//! let mut heap = Heap::new();
//! let requirements = heap.new_object();
//! heap.insert(requirements, "scheme", "exact");
//! heap.insert(requirements, "self", requirements);
//! assert_eq!(heap.object_fields(requirements).map(|f| f.len()), Some(2));
//! ```

use alloy_primitives::I256;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Handle to an object node of a [`Heap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub(crate) usize);

/// Handle to an array node of a [`Heap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayId(pub(crate) usize);

/// Handle to a set node of a [`Heap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SetId(pub(crate) usize);

/// Handle to a map node of a [`Heap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MapId(pub(crate) usize);

/// A value in an object graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    BigInt(I256),
    Date(DateTime<Utc>),
    /// A unique token with an optional description.
    Symbol(Option<String>),
    /// A callable, identified only by its name.
    Function(Option<String>),
    Object(ObjectId),
    Array(ArrayId),
    Set(SetId),
    Map(MapId),
}

impl Dynamic {
    /// Lowercase name of the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Undefined => "undefined",
            Dynamic::Null => "null",
            Dynamic::Bool(_) => "boolean",
            Dynamic::Number(_) => "number",
            Dynamic::String(_) => "string",
            Dynamic::BigInt(_) => "bigint",
            Dynamic::Date(_) => "date",
            Dynamic::Symbol(_) => "symbol",
            Dynamic::Function(_) => "function",
            Dynamic::Object(_) => "object",
            Dynamic::Array(_) => "array",
            Dynamic::Set(_) => "set",
            Dynamic::Map(_) => "map",
        }
    }

    /// Whether the value is a reference-typed node or a date.
    pub fn is_object_like(&self) -> bool {
        matches!(
            self,
            Dynamic::Object(_)
                | Dynamic::Array(_)
                | Dynamic::Set(_)
                | Dynamic::Map(_)
                | Dynamic::Date(_)
        )
    }

    /// Set/map key equality: NaN equals NaN, `+0` equals `-0`, nodes compare
    /// by identity, and symbols and functions are never equal to anything.
    fn same_value_zero(&self, other: &Dynamic) -> bool {
        match (self, other) {
            (Dynamic::Number(a), Dynamic::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Dynamic::Symbol(_), _) | (Dynamic::Function(_), _) => false,
            (a, b) => a == b,
        }
    }
}

impl From<&str> for Dynamic {
    fn from(value: &str) -> Self {
        Dynamic::String(value.to_string())
    }
}

impl From<String> for Dynamic {
    fn from(value: String) -> Self {
        Dynamic::String(value)
    }
}

impl From<bool> for Dynamic {
    fn from(value: bool) -> Self {
        Dynamic::Bool(value)
    }
}

impl From<f64> for Dynamic {
    fn from(value: f64) -> Self {
        Dynamic::Number(value)
    }
}

impl From<i32> for Dynamic {
    fn from(value: i32) -> Self {
        Dynamic::Number(value.into())
    }
}

impl From<I256> for Dynamic {
    fn from(value: I256) -> Self {
        Dynamic::BigInt(value)
    }
}

impl From<DateTime<Utc>> for Dynamic {
    fn from(value: DateTime<Utc>) -> Self {
        Dynamic::Date(value)
    }
}

impl From<ObjectId> for Dynamic {
    fn from(value: ObjectId) -> Self {
        Dynamic::Object(value)
    }
}

impl From<ArrayId> for Dynamic {
    fn from(value: ArrayId) -> Self {
        Dynamic::Array(value)
    }
}

impl From<SetId> for Dynamic {
    fn from(value: SetId) -> Self {
        Dynamic::Set(value)
    }
}

impl From<MapId> for Dynamic {
    fn from(value: MapId) -> Self {
        Dynamic::Map(value)
    }
}

/// Owner of every node of an object graph.
///
/// Node handles index into the heap that created them. Passing a handle to
/// a different heap's mutators panics, like an out-of-bounds slice index.
#[derive(Debug, Clone, Default)]
pub struct Heap {
    objects: Vec<Vec<(String, Dynamic)>>,
    arrays: Vec<Vec<Dynamic>>,
    sets: Vec<Vec<Dynamic>>,
    maps: Vec<Vec<(Dynamic, Dynamic)>>,
}

/// Largest integer an `f64` holds exactly.
const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_object(&mut self) -> ObjectId {
        self.objects.push(Vec::new());
        ObjectId(self.objects.len() - 1)
    }

    pub fn new_array(&mut self) -> ArrayId {
        self.arrays.push(Vec::new());
        ArrayId(self.arrays.len() - 1)
    }

    pub fn new_set(&mut self) -> SetId {
        self.sets.push(Vec::new());
        SetId(self.sets.len() - 1)
    }

    pub fn new_map(&mut self) -> MapId {
        self.maps.push(Vec::new());
        MapId(self.maps.len() - 1)
    }

    /// Sets a property. An existing key keeps its position and gets the new value.
    pub fn insert(&mut self, object: ObjectId, key: impl Into<String>, value: impl Into<Dynamic>) {
        let key = key.into();
        let value = value.into();
        let fields = &mut self.objects[object.0];
        match fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => fields.push((key, value)),
        }
    }

    pub fn push(&mut self, array: ArrayId, value: impl Into<Dynamic>) {
        self.arrays[array.0].push(value.into());
    }

    /// Adds a member unless an equal one is already present.
    pub fn add(&mut self, set: SetId, value: impl Into<Dynamic>) {
        let value = value.into();
        let members = &mut self.sets[set.0];
        if !members.iter().any(|m| m.same_value_zero(&value)) {
            members.push(value);
        }
    }

    /// Associates `value` with `key`. An existing key keeps its position.
    pub fn map_insert(&mut self, map: MapId, key: impl Into<Dynamic>, value: impl Into<Dynamic>) {
        let key = key.into();
        let value = value.into();
        let entries = &mut self.maps[map.0];
        match entries.iter_mut().find(|(k, _)| k.same_value_zero(&key)) {
            Some((_, slot)) => *slot = value,
            None => entries.push((key, value)),
        }
    }

    pub fn object_fields(&self, object: ObjectId) -> Option<&[(String, Dynamic)]> {
        self.objects.get(object.0).map(Vec::as_slice)
    }

    pub fn array_elements(&self, array: ArrayId) -> Option<&[Dynamic]> {
        self.arrays.get(array.0).map(Vec::as_slice)
    }

    pub fn set_members(&self, set: SetId) -> Option<&[Dynamic]> {
        self.sets.get(set.0).map(Vec::as_slice)
    }

    pub fn map_entries(&self, map: MapId) -> Option<&[(Dynamic, Dynamic)]> {
        self.maps.get(map.0).map(Vec::as_slice)
    }

    /// Copies a JSON tree into the heap.
    ///
    /// Integers outside the exactly representable `f64` range become
    /// [`Dynamic::BigInt`] so no digits are lost.
    pub fn import_json(&mut self, value: &Value) -> Dynamic {
        match value {
            Value::Null => Dynamic::Null,
            Value::Bool(b) => Dynamic::Bool(*b),
            Value::Number(n) => import_number(n),
            Value::String(s) => Dynamic::String(s.clone()),
            Value::Array(items) => {
                let array = self.new_array();
                for item in items {
                    let item = self.import_json(item);
                    self.push(array, item);
                }
                Dynamic::Array(array)
            }
            Value::Object(fields) => {
                let object = self.new_object();
                for (key, item) in fields {
                    let item = self.import_json(item);
                    self.insert(object, key.as_str(), item);
                }
                Dynamic::Object(object)
            }
        }
    }

    /// Copies any serializable value into the heap through its JSON form.
    pub fn import<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<Dynamic, serde_json::Error> {
        let json = serde_json::to_value(value)?;
        Ok(self.import_json(&json))
    }

    /// Pairs a value with this heap so it can be sanitized as a unit.
    pub fn root(&self, value: impl Into<Dynamic>) -> Rooted<'_> {
        Rooted {
            heap: self,
            value: value.into(),
        }
    }
}

fn import_number(n: &serde_json::Number) -> Dynamic {
    if let Some(i) = n.as_i64() {
        if i.unsigned_abs() <= MAX_SAFE_INTEGER {
            return Dynamic::Number(i as f64);
        }
        return Dynamic::BigInt(I256::try_from(i).unwrap_or(I256::ZERO));
    }
    if let Some(u) = n.as_u64() {
        return Dynamic::BigInt(I256::try_from(u).unwrap_or(I256::ZERO));
    }
    Dynamic::Number(n.as_f64().unwrap_or(f64::NAN))
}

/// A value together with the heap its node handles point into.
#[derive(Debug, Clone)]
pub struct Rooted<'h> {
    pub heap: &'h Heap,
    pub value: Dynamic,
}
