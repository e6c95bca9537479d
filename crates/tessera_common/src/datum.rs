use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single bound value: a literal from the statement text or a parameter
/// supplied by the client. Sharding algorithms interpret it; the router
/// only compares and deduplicates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Datum {
    Null,
    Boolean(bool),
    Int64(i64),
    Float64(f64),
    Text(String),
    Timestamp(i64), // microseconds since Unix epoch
}

impl Datum {
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Integer view used by modulo/range algorithms. Integral floats and
    /// numeric text are accepted; everything else is `None`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Datum::Int64(v) => Some(*v),
            Datum::Timestamp(v) => Some(*v),
            Datum::Float64(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            Datum::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Datum::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Render as a SQL literal (strings quoted, quotes doubled).
    pub fn to_sql_literal(&self) -> String {
        match self {
            Datum::Null => "NULL".into(),
            Datum::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.into(),
            Datum::Int64(v) => v.to_string(),
            Datum::Float64(v) => v.to_string(),
            Datum::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Datum::Timestamp(us) => us.to_string(),
        }
    }

    /// Convert a plain JSON scalar (as fed by tools) into a datum.
    /// Arrays and objects are not bindable values.
    pub fn from_json(value: &JsonValue) -> Option<Datum> {
        match value {
            JsonValue::Null => Some(Datum::Null),
            JsonValue::Bool(b) => Some(Datum::Boolean(*b)),
            JsonValue::Number(n) => n
                .as_i64()
                .map(Datum::Int64)
                .or_else(|| n.as_f64().map(Datum::Float64)),
            JsonValue::String(s) => Some(Datum::Text(s.clone())),
            JsonValue::Array(_) | JsonValue::Object(_) => None,
        }
    }

    /// Stable, type-tagged byte encoding for hash-based sharding.
    /// Must not change across releases: it decides where rows live.
    pub fn encode_for_hash(&self, buf: &mut Vec<u8>) {
        match self {
            Datum::Null => buf.push(0x00),
            Datum::Boolean(b) => {
                buf.push(0x01);
                buf.push(u8::from(*b));
            }
            Datum::Int64(v) => {
                buf.push(0x03);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            Datum::Float64(v) => {
                buf.push(0x04);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            Datum::Text(s) => {
                buf.push(0x05);
                buf.extend_from_slice(s.as_bytes());
                buf.push(0x00);
            }
            Datum::Timestamp(v) => {
                buf.push(0x06);
                buf.extend_from_slice(&v.to_le_bytes());
            }
        }
    }

    fn type_tag(&self) -> u8 {
        match self {
            Datum::Null => 0,
            Datum::Boolean(_) => 1,
            Datum::Int64(_) => 2,
            Datum::Float64(_) => 3,
            Datum::Text(_) => 4,
            Datum::Timestamp(_) => 5,
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => write!(f, "NULL"),
            Datum::Boolean(b) => write!(f, "{}", b),
            Datum::Int64(v) => write!(f, "{}", v),
            Datum::Float64(v) => write!(f, "{}", v),
            Datum::Text(s) => write!(f, "{}", s),
            Datum::Timestamp(us) => write!(f, "{}", us),
        }
    }
}

impl From<i64> for Datum {
    fn from(v: i64) -> Self {
        Datum::Int64(v)
    }
}

impl From<&str> for Datum {
    fn from(v: &str) -> Self {
        Datum::Text(v.to_string())
    }
}

impl From<String> for Datum {
    fn from(v: String) -> Self {
        Datum::Text(v)
    }
}

// Sharding values are set members: NULL equals NULL here, unlike SQL
// comparison semantics, and equality never crosses types.
impl PartialEq for Datum {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Datum {}

impl Hash for Datum {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_tag().hash(state);
        match self {
            Datum::Null => {}
            Datum::Boolean(b) => b.hash(state),
            Datum::Int64(v) => v.hash(state),
            Datum::Float64(v) => v.to_bits().hash(state),
            Datum::Text(s) => s.hash(state),
            Datum::Timestamp(us) => us.hash(state),
        }
    }
}

impl PartialOrd for Datum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Total order: numbers compare numerically across Int64/Float64 with the
/// type tag as tie-break, so `Ord` stays consistent with `Eq`.
impl Ord for Datum {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Datum::Null, Datum::Null) => Ordering::Equal,
            (Datum::Boolean(a), Datum::Boolean(b)) => a.cmp(b),
            (Datum::Int64(a), Datum::Int64(b)) => a.cmp(b),
            (Datum::Float64(a), Datum::Float64(b)) => a.total_cmp(b),
            (Datum::Int64(a), Datum::Float64(b)) => (*a as f64)
                .total_cmp(b)
                .then(self.type_tag().cmp(&other.type_tag())),
            (Datum::Float64(a), Datum::Int64(b)) => a
                .total_cmp(&(*b as f64))
                .then(self.type_tag().cmp(&other.type_tag())),
            (Datum::Text(a), Datum::Text(b)) => a.cmp(b),
            (Datum::Timestamp(a), Datum::Timestamp(b)) => a.cmp(b),
            _ => self.type_tag().cmp(&other.type_tag()),
        }
    }
}
