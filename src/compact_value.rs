use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use smol_str::SmolStr;
use std::collections::BTreeMap;

/// Keyed children of a [`CompactValue::Object`].
pub type ValueMap = BTreeMap<SmolStr, CompactValue>;

// ─── CompactNumber ──────────────────────────────────────────────────────────

/// Numeric leaf. Integers that fit `i64` are `I64`; `U64` is meant for
/// values above `i64::MAX`. A `U64` in `i64` range is still accepted and
/// behaves as the equal `I64` for comparison, dedup identity and printing.
#[derive(Clone, Copy)]
pub enum CompactNumber {
    I64(i64),
    U64(u64),
    F64(f64),
}

impl std::fmt::Debug for CompactNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompactNumber::I64(i) => write!(f, "I64({})", i),
            CompactNumber::U64(u) => write!(f, "U64({})", u),
            CompactNumber::F64(v) => write!(f, "F64({})", v),
        }
    }
}

impl PartialEq for CompactNumber {
    fn eq(&self, other: &Self) -> bool {
        match (self.normalized(), other.normalized()) {
            (CompactNumber::I64(a), CompactNumber::I64(b)) => a == b,
            (CompactNumber::U64(a), CompactNumber::U64(b)) => a == b,
            (CompactNumber::F64(a), CompactNumber::F64(b)) => a == b,
            _ => false,
        }
    }
}

impl CompactNumber {
    /// Canonical integer kind: `U64` values that fit become `I64`.
    pub fn normalized(self) -> Self {
        match self {
            CompactNumber::U64(u) => match i64::try_from(u) {
                Ok(i) => CompactNumber::I64(i),
                Err(_) => self,
            },
            other => other,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            CompactNumber::I64(i) => i as f64,
            CompactNumber::U64(u) => u as f64,
            CompactNumber::F64(f) => f,
        }
    }

    pub fn as_i64(self) -> Option<i64> {
        match self {
            CompactNumber::I64(i) => Some(i),
            CompactNumber::U64(u) => i64::try_from(u).ok(),
            CompactNumber::F64(f) => {
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                    Some(f as i64)
                } else {
                    None
                }
            }
        }
    }

    pub fn as_u64(self) -> Option<u64> {
        match self {
            CompactNumber::U64(u) => Some(u),
            CompactNumber::I64(i) => u64::try_from(i).ok(),
            CompactNumber::F64(f) => {
                if f.fract() == 0.0 && f >= 0.0 && f <= u64::MAX as f64 {
                    Some(f as u64)
                } else {
                    None
                }
            }
        }
    }

    /// Textual form used by the token codec.
    ///
    /// Floats always carry a fraction or exponent (`1.0`, `1e21`) so the
    /// integer/float distinction survives a round-trip. Returns `None` for
    /// NaN and infinities.
    pub fn render(self) -> Option<String> {
        match self {
            CompactNumber::I64(i) => Some(i.to_string()),
            CompactNumber::U64(u) => Some(u.to_string()),
            CompactNumber::F64(f) => serde_json::Number::from_f64(f).map(|n| n.to_string()),
        }
    }
}

// ─── CompactValue ───────────────────────────────────────────────────────────

/// A record value. `Null` doubles as the absent marker for missing fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CompactValue {
    #[default]
    Null,
    Bool(bool),
    Number(CompactNumber),
    Str(SmolStr),
    Array(Vec<CompactValue>),
    Object(ValueMap),
}

impl CompactValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CompactValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CompactValue::Number(n) => Some(n.as_f64()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CompactValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            CompactValue::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CompactValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ValueMap> {
        match self {
            CompactValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<CompactValue>> {
        match self {
            CompactValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&CompactValue> {
        self.as_object()?.get(key)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CompactValue::Null)
    }
}

// ─── Serialize ──────────────────────────────────────────────────────────────

impl Serialize for CompactValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CompactValue::Null => serializer.serialize_none(),
            CompactValue::Bool(b) => serializer.serialize_bool(*b),
            CompactValue::Number(n) => match n {
                CompactNumber::I64(i) => serializer.serialize_i64(*i),
                CompactNumber::U64(u) => serializer.serialize_u64(*u),
                CompactNumber::F64(f) => serializer.serialize_f64(*f),
            },
            CompactValue::Str(s) => serializer.serialize_str(s.as_str()),
            CompactValue::Array(arr) => {
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for v in arr {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            CompactValue::Object(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    m.serialize_entry(k.as_str(), v)?;
                }
                m.end()
            }
        }
    }
}

// ─── From impls ─────────────────────────────────────────────────────────────

impl From<f64> for CompactValue {
    fn from(n: f64) -> Self {
        CompactValue::Number(CompactNumber::F64(n))
    }
}

impl From<i64> for CompactValue {
    fn from(n: i64) -> Self {
        CompactValue::Number(CompactNumber::I64(n))
    }
}

impl From<i32> for CompactValue {
    fn from(n: i32) -> Self {
        CompactValue::Number(CompactNumber::I64(n.into()))
    }
}

impl From<u64> for CompactValue {
    fn from(n: u64) -> Self {
        match i64::try_from(n) {
            Ok(i) => CompactValue::Number(CompactNumber::I64(i)),
            Err(_) => CompactValue::Number(CompactNumber::U64(n)),
        }
    }
}

impl From<bool> for CompactValue {
    fn from(b: bool) -> Self {
        CompactValue::Bool(b)
    }
}

impl From<&str> for CompactValue {
    fn from(s: &str) -> Self {
        CompactValue::Str(SmolStr::from(s))
    }
}

impl From<String> for CompactValue {
    fn from(s: String) -> Self {
        CompactValue::Str(SmolStr::from(s))
    }
}

impl From<SmolStr> for CompactValue {
    fn from(s: SmolStr) -> Self {
        CompactValue::Str(s)
    }
}

impl From<Vec<CompactValue>> for CompactValue {
    fn from(arr: Vec<CompactValue>) -> Self {
        CompactValue::Array(arr)
    }
}

impl From<ValueMap> for CompactValue {
    fn from(map: ValueMap) -> Self {
        CompactValue::Object(map)
    }
}

// ─── From/Into cbor4ii::core::Value ─────────────────────────────────────────

impl From<cbor4ii::core::Value> for CompactValue {
    fn from(v: cbor4ii::core::Value) -> Self {
        use cbor4ii::core::Value;
        match v {
            Value::Null => CompactValue::Null,
            Value::Bool(b) => CompactValue::Bool(b),
            Value::Integer(i) => {
                if let Ok(val) = i64::try_from(i) {
                    CompactValue::Number(CompactNumber::I64(val))
                } else if let Ok(val) = u64::try_from(i) {
                    CompactValue::Number(CompactNumber::U64(val))
                } else {
                    CompactValue::Number(CompactNumber::F64(i as f64))
                }
            }
            Value::Float(f) => CompactValue::Number(CompactNumber::F64(f)),
            Value::Text(s) => CompactValue::Str(SmolStr::from(s)),
            Value::Array(arr) => {
                CompactValue::Array(arr.into_iter().map(CompactValue::from).collect())
            }
            Value::Map(entries) => CompactValue::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| {
                        let key = match k {
                            Value::Text(s) => SmolStr::from(s),
                            Value::Integer(i) => SmolStr::from(i.to_string()),
                            other => SmolStr::from(format!("{:?}", other)),
                        };
                        (key, CompactValue::from(v))
                    })
                    .collect(),
            ),
            Value::Tag(_, inner) => CompactValue::from(*inner),
            _ => CompactValue::Null,
        }
    }
}

impl From<CompactValue> for cbor4ii::core::Value {
    fn from(val: CompactValue) -> Self {
        use cbor4ii::core::Value;
        match val {
            CompactValue::Null => Value::Null,
            CompactValue::Bool(b) => Value::Bool(b),
            CompactValue::Number(n) => match n {
                CompactNumber::I64(i) => Value::Integer(i as i128),
                CompactNumber::U64(u) => Value::Integer(u as i128),
                CompactNumber::F64(f) => Value::Float(f),
            },
            CompactValue::Str(s) => Value::Text(s.to_string()),
            CompactValue::Array(arr) => Value::Array(arr.into_iter().map(|v| v.into()).collect()),
            CompactValue::Object(obj) => Value::Map(
                obj.into_iter()
                    .map(|(k, v)| (Value::Text(k.to_string()), v.into()))
                    .collect(),
            ),
        }
    }
}

// ─── From/Into serde_json::Value ────────────────────────────────────────────

impl From<serde_json::Value> for CompactValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => CompactValue::Null,
            serde_json::Value::Bool(b) => CompactValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    CompactValue::Number(CompactNumber::I64(i))
                } else if let Some(u) = n.as_u64() {
                    CompactValue::Number(CompactNumber::U64(u))
                } else {
                    CompactValue::Number(CompactNumber::F64(n.as_f64().unwrap_or(0.0)))
                }
            }
            serde_json::Value::String(s) => CompactValue::Str(SmolStr::from(s)),
            serde_json::Value::Array(arr) => {
                CompactValue::Array(arr.into_iter().map(CompactValue::from).collect())
            }
            serde_json::Value::Object(obj) => CompactValue::Object(
                obj.into_iter()
                    .map(|(k, v)| (SmolStr::from(k), CompactValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<CompactValue> for serde_json::Value {
    fn from(val: CompactValue) -> Self {
        match val {
            CompactValue::Null => serde_json::Value::Null,
            CompactValue::Bool(b) => serde_json::Value::Bool(b),
            CompactValue::Number(n) => match n {
                CompactNumber::I64(i) => serde_json::json!(i),
                CompactNumber::U64(u) => serde_json::json!(u),
                CompactNumber::F64(f) => serde_json::json!(f),
            },
            CompactValue::Str(s) => serde_json::Value::String(s.to_string()),
            CompactValue::Array(arr) => {
                serde_json::Value::Array(arr.into_iter().map(|v| v.into()).collect())
            }
            CompactValue::Object(obj) => serde_json::Value::Object(
                obj.into_iter()
                    .map(|(k, v)| (k.to_string(), v.into()))
                    .collect(),
            ),
        }
    }
}

/// Build a [`CompactValue::Object`] from `key => value` pairs, with nested
/// `{ ... }` blocks becoming nested objects.
#[macro_export]
macro_rules! compact_obj {
    ({ $($key:expr => $val:tt),* $(,)? }) => {{
        let mut map = $crate::compact_value::ValueMap::new();
        $(
            map.insert(
                ::smol_str::SmolStr::new($key),
                $crate::compact_value::CompactValue::from($crate::compact_obj!(@value $val))
            );
        )*
        $crate::compact_value::CompactValue::Object(map)
    }};

    (@value { $($inner:tt)* }) => {
        $crate::compact_obj!({ $($inner)* })
    };

    (@value $val:expr) => {
        $val
    };
}
