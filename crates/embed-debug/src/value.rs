//! Materialized host values handed to the debugger.
//! - Value: leaf values + shared object handles
//! - HostObject/ObjectId: objects with a stable minted identity
//! - type_tag/Display: client-facing type and text

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use smol_str::SmolStr;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity token minted once per object and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn mint() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Property key. Only `Name` keys are visible to the debugger.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    Name(SmolStr),
    Symbol(SmolStr),
}

impl From<&str> for PropertyKey {
    fn from(name: &str) -> Self {
        Self::Name(SmolStr::new(name))
    }
}

#[derive(Debug, Clone)]
pub struct Property {
    pub value: Value,
    pub enumerable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectKind {
    Plain { class: SmolStr },
    Array,
    Function { name: SmolStr },
}

/// Object as exposed by the engine.
pub struct HostObject {
    id: ObjectId,
    kind: ObjectKind,
    properties: RefCell<IndexMap<PropertyKey, Property>>,
}

impl HostObject {
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    #[must_use]
    pub fn properties(&self) -> Ref<'_, IndexMap<PropertyKey, Property>> {
        self.properties.borrow()
    }
}

/// Shared handle to a [`HostObject`]. Clones share identity.
#[derive(Clone)]
pub struct ObjectHandle(Rc<HostObject>);

// Object graphs may be cyclic; never recurse into properties.
impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostObject")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl ObjectHandle {
    #[must_use]
    pub fn new(kind: ObjectKind) -> Self {
        Self(Rc::new(HostObject {
            id: ObjectId::mint(),
            kind,
            properties: RefCell::new(IndexMap::new()),
        }))
    }

    /// `[object Object]`.
    #[must_use]
    pub fn plain() -> Self {
        Self::new(ObjectKind::Plain {
            class: SmolStr::new_inline("Object"),
        })
    }

    #[must_use]
    pub fn array(elements: impl IntoIterator<Item = Value>) -> Self {
        let array = Self::new(ObjectKind::Array);
        let mut len = 0usize;
        for (index, element) in elements.into_iter().enumerate() {
            array.set(index.to_string().as_str(), element);
            len = index + 1;
        }
        array.define(
            PropertyKey::from("length"),
            Value::Int(i32::try_from(len).unwrap_or(i32::MAX)),
            false,
        );
        array
    }

    #[must_use]
    pub fn function(name: &str) -> Self {
        Self::new(ObjectKind::Function {
            name: SmolStr::new(name),
        })
    }

    /// Set an enumerable string-keyed property.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> &Self {
        self.define(PropertyKey::from(name), value.into(), true);
        self
    }

    pub fn define(&self, key: PropertyKey, value: Value, enumerable: bool) {
        self.0
            .properties
            .borrow_mut()
            .insert(key, Property { value, enumerable });
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.0
            .properties
            .borrow()
            .get(&PropertyKey::from(name))
            .map(|property| property.value.clone())
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::ops::Deref for ObjectHandle {
    type Target = HostObject;

    fn deref(&self) -> &HostObject {
        &self.0
    }
}

/// Host value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Int(i32),
    Float(f64),
    /// Extended-precision float, in its textual form.
    BigFloat(SmolStr),
    /// Arbitrary-precision integer, in decimal.
    BigInt(SmolStr),
    String(SmolStr),
    Symbol(SmolStr),
    Object(ObjectHandle),
}

impl Value {
    /// Type tag reported to the client, if any.
    #[must_use]
    pub fn type_tag(&self) -> Option<&'static str> {
        let tag = match self {
            Value::String(_) => "string",
            Value::Int(_) => "integer",
            Value::Float(_) | Value::BigFloat(_) => "float",
            Value::Bool(_) => "boolean",
            Value::Null => "null",
            Value::Undefined => "undefined",
            Value::Object(_) => "object",
            Value::BigInt(_) | Value::Symbol(_) => return None,
        };
        Some(tag)
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectHandle> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Own enumerable string-keyed properties, in insertion order.
    #[must_use]
    pub fn enumerate(&self) -> Vec<(SmolStr, Value)> {
        let Some(object) = self.as_object() else {
            return Vec::new();
        };
        object
            .properties()
            .iter()
            .filter(|(_, property)| property.enumerable)
            .filter_map(|(key, property)| match key {
                PropertyKey::Name(name) => Some((name.clone(), property.value.clone())),
                PropertyKey::Symbol(_) => None,
            })
            .collect()
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(SmolStr::new(value))
    }
}

impl From<ObjectHandle> for Value {
    fn from(value: ObjectHandle) -> Self {
        Value::Object(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write_number(f, *value),
            Value::BigFloat(text) | Value::BigInt(text) | Value::String(text) => f.write_str(text),
            Value::Symbol(description) => write!(f, "Symbol({description})"),
            Value::Object(object) => write_object(f, object, 0),
        }
    }
}

fn write_number(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    if value.is_nan() {
        return f.write_str("NaN");
    }
    if value.is_infinite() {
        return f.write_str(if value > 0.0 { "Infinity" } else { "-Infinity" });
    }
    if value == 0.0 {
        return f.write_str("0");
    }
    let magnitude = value.abs();
    if !(1e-6..1e21).contains(&magnitude) {
        // Shortest round-trip digits; script notation signs the exponent.
        let text = format!("{value:e}");
        return match text.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                write!(f, "{mantissa}e+{exponent}")
            }
            _ => f.write_str(&text),
        };
    }
    if value.fract() == 0.0 {
        return write!(f, "{value:.0}");
    }
    write!(f, "{value}")
}

// Arrays may contain themselves.
const MAX_JOIN_DEPTH: usize = 8;

fn write_object(f: &mut fmt::Formatter<'_>, object: &ObjectHandle, depth: usize) -> fmt::Result {
    match object.kind() {
        ObjectKind::Plain { class } => write!(f, "[object {class}]"),
        ObjectKind::Function { name } => write!(f, "function {name}() {{ [native code] }}"),
        ObjectKind::Array if depth > MAX_JOIN_DEPTH => Ok(()),
        ObjectKind::Array => {
            let properties = object.properties();
            let len = match properties.get(&PropertyKey::from("length")) {
                Some(Property {
                    value: Value::Int(len),
                    ..
                }) => usize::try_from(*len).unwrap_or(0),
                _ => 0,
            };
            for index in 0..len {
                if index > 0 {
                    f.write_str(",")?;
                }
                let key = PropertyKey::Name(SmolStr::new(index.to_string()));
                match properties.get(&key).map(|property| &property.value) {
                    None | Some(Value::Undefined | Value::Null) => {}
                    Some(Value::Object(inner)) => write_object(f, inner, depth + 1)?,
                    Some(element) => write!(f, "{element}")?,
                }
            }
            Ok(())
        }
    }
}
