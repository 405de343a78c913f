use std::any::Any;
use std::cmp::Ordering;
use std::collections::HashMap as StdHashMap;
use std::fmt;
use std::sync::Arc;

use im::HashMap;
use serde::Serialize;

use crate::errors::TemplateError;

/// Reads one attribute from an object of the type that handed it out.
///
/// Accessors are plain function pointers so they can be cached per type and shared between
/// threads. An accessor returns `None` when the object is not of the expected type.
pub type Accessor = fn(&dyn Object) -> Option<Value>;

/// Capability for exposing a typed record to templates.
///
/// `{{ order.total }}` on an object value asks the object's type for an accessor named
/// `total`, then for the predicate form `is_total`. Discovered accessors (and misses) are
/// cached per type, so `accessor` should be a cheap, side-effect-free lookup.
///
/// ```rust
/// use std::any::Any;
/// use std::fmt;
/// use stencil::ast::value::{downcast, Accessor, Object, Value};
///
/// #[derive(Debug)]
/// struct Order { id: String, shipped: bool }
///
/// impl fmt::Display for Order {
///     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "order {}", self.id) }
/// }
///
/// fn order_id(obj: &dyn Object) -> Option<Value> {
///     downcast::<Order>(obj).map(|o| Value::from(o.id.as_str()))
/// }
/// fn order_shipped(obj: &dyn Object) -> Option<Value> {
///     downcast::<Order>(obj).map(|o| Value::Bool(o.shipped))
/// }
///
/// impl Object for Order {
///     fn as_any(&self) -> &dyn Any { self }
///     fn accessor(&self, name: &str) -> Option<Accessor> {
///         match name {
///             "id" => Some(order_id),
///             "is_shipped" => Some(order_shipped),
///             _ => None,
///         }
///     }
/// }
///
/// let value = Value::object(Order { id: "o-1".into(), shipped: true });
/// assert_eq!(value.to_string(), "order o-1");
/// ```
pub trait Object: fmt::Debug + fmt::Display + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;

    /// Accessor registered under exactly `name`, if any.
    fn accessor(&self, name: &str) -> Option<Accessor>;
}

/// Downcast helper for accessor implementations.
pub fn downcast<T: Object>(obj: &dyn Object) -> Option<&T> {
    obj.as_any().downcast_ref::<T>()
}

/// Represents a value flowing through template evaluation.
///
/// # Examples
///
/// ```rust
/// use stencil::ast::value::Value;
/// let n = Value::Int(3);
/// assert_eq!(n.type_name(), "Int");
/// assert!(Value::default().is_null());
/// assert_eq!(Value::Float(3.0).to_string(), "3.0");
/// ```
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
    Object(Arc<dyn Object>),
}

impl Value {
    pub fn object<T: Object>(object: T) -> Self {
        Value::Object(Arc::new(object))
    }

    /// Converts any serializable value through its JSON representation.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, TemplateError> {
        serde_json::to_value(value)
            .map(Value::from)
            .map_err(|e| TemplateError::custom(format!("cannot convert context value: {e}")))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Object(_) => "Object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Null, false, numeric zero and the empty string are false; everything else is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Widened numeric view of `Int` and `Float`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(n) => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Ordering for values that have one: numbers, strings and booleans.
    pub fn natural_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (a, b) if a.is_number() && b.is_number() => {
                let (a, b) = (a.as_f64()?, b.as_f64()?);
                a.partial_cmp(&b)
            }
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Integral floats keep one fractional digit (`3.0`). From 1e16 up the exponent form is
    /// used with the same rule on the mantissa (`1.0e16`, `2.5e20`).
    fn fmt_float(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
        if !n.is_finite() {
            return write!(f, "{n}");
        }
        if n.abs() >= 1e16 {
            let exp = format!("{n:e}");
            return match exp.split_once('e') {
                Some((mantissa, power)) if !mantissa.contains('.') => {
                    write!(f, "{mantissa}.0e{power}")
                }
                _ => write!(f, "{exp}"),
            };
        }
        if n.fract() == 0.0 {
            write!(f, "{n:.1}")
        } else {
            write!(f, "{n}")
        }
    }

    fn fmt_list(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
        write!(f, "[")?;
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{item}")?;
        }
        write!(f, "]")
    }

    fn fmt_map(f: &mut fmt::Formatter<'_>, map: &HashMap<String, Value>) -> fmt::Result {
        write!(f, "{{")?;
        let mut first = true;
        for (k, v) in map.iter() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{k}: {v}")?;
            first = false;
        }
        write!(f, "}}")
    }
}

/// Structural equality within a variant; `Int` and `Float` never compare equal, objects compare
/// by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Canonical string form. Output nodes skip `Null` themselves; here it reads `null`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => Value::fmt_float(f, *n),
            Value::String(s) => write!(f, "{s}"),
            Value::List(items) => Value::fmt_list(f, items),
            Value::Map(map) => Value::fmt_map(f, map),
            Value::Object(obj) => write!(f, "{obj}"),
        }
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<V: Into<Value>> From<StdHashMap<String, V>> for Value {
    fn from(map: StdHashMap<String, V>) -> Self {
        Value::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(map: HashMap<String, Value>) -> Self {
        Value::Map(map)
    }
}
