//! Dynamically typed values manipulated by the bytecode interpreter.
//!
//! Coercions are free functions of the value, applied per operation: arithmetic
//! reads `to_real`, string building reads `to_str`, branches read `to_bool`.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Sparse two-dimensional array. One-dimensional access uses row 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GmlArray {
    pub rows: BTreeMap<i32, BTreeMap<i32, Value>>,
}

impl GmlArray {
    pub fn new() -> Self {
        GmlArray::default()
    }

    /// Build a one-dimensional array from a list of values.
    pub fn from_values(values: &[Value]) -> Self {
        let mut array = GmlArray::new();
        for (i, v) in values.iter().enumerate() {
            array.set(i as i32, v.clone());
        }
        array
    }

    pub fn get(&self, index: i32) -> Option<&Value> {
        self.rows.get(&0).and_then(|row| row.get(&index))
    }

    pub fn set(&mut self, index: i32, value: Value) {
        self.rows.entry(0).or_default().insert(index, value);
    }

    /// Number of populated slots in row 0.
    pub fn len_1d(&self) -> usize {
        self.rows.get(&0).map(|row| row.len()).unwrap_or(0)
    }

    pub fn len_2d(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Real(f64),
    Str(String),
    /// Arrays are copy-on-write: writes go through `Rc::make_mut`.
    Array(Rc<GmlArray>),
    Undefined,
}

impl Value {
    pub const ZERO: Value = Value::Real(0.0);
    pub const ONE: Value = Value::Real(1.0);
    /// Instance id sentinel returned by lookups that find nothing.
    pub const NOONE: Value = Value::Real(-4.0);

    pub fn empty_string() -> Value {
        Value::Str(String::new())
    }

    pub fn to_real(&self) -> f64 {
        match self {
            Value::Real(v) => *v,
            Value::Str(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            Value::Array(_) | Value::Undefined => 0.0,
        }
    }

    /// Truncating conversion, saturating at the i32 range.
    pub fn to_int(&self) -> i32 {
        self.to_real() as i32
    }

    pub fn to_long(&self) -> i64 {
        self.to_real() as i64
    }

    pub fn to_str(&self) -> String {
        match self {
            Value::Real(v) => format_real(*v),
            Value::Str(s) => s.clone(),
            Value::Array(_) => "<array>".to_string(),
            Value::Undefined => "<undefined>".to_string(),
        }
    }

    pub fn to_bool(&self) -> bool {
        match self {
            Value::Real(v) => v.abs() >= 0.5,
            Value::Str(s) => !s.is_empty(),
            Value::Array(_) => true,
            Value::Undefined => false,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::Str(_))
    }

    pub fn as_array(&self) -> Option<&GmlArray> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Read one element of a one-dimensional array, 0 for anything else.
    pub fn array_get(&self, index: i32) -> Value {
        self.as_array()
            .and_then(|a| a.get(index))
            .cloned()
            .unwrap_or(Value::ZERO)
    }

    /// Store into a slot holding an array, replacing any non-array value.
    pub fn array_set(slot: &mut Value, index: i32, value: Value) {
        if !matches!(slot, Value::Array(_)) {
            *slot = Value::Array(Rc::new(GmlArray::new()));
        }
        if let Value::Array(array) = slot {
            Rc::make_mut(array).set(index, value);
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Real(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Undefined => "undefined",
        }
    }
}

/// Integral reals print without a fractional part.
fn format_real(v: f64) -> String {
    if v == (v as i64) as f64 {
        (v as i64).to_string()
    } else {
        v.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Real(v as f64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        if v {
            Value::ONE
        } else {
            Value::ZERO
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<GmlArray> for Value {
    fn from(v: GmlArray) -> Self {
        Value::Array(Rc::new(v))
    }
}
