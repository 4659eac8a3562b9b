//! Call fingerprinting
//!
//! A [`Fingerprint`] is the canonical form of a call's arguments:
//! positional values in call order followed by keyword values sorted by name.
//! It stores the canonical values themselves rather than a digest, so two
//! fingerprints are equal exactly when the calls were equal.
//!
//! Only values with a stable equality/hash contract can be fingerprinted.
//! Lists, maps, mutable sets, identity-only handles and NaN floats are
//! rejected with [`Error::UnhashableArgument`].
//!
//! Values of different types never share a fingerprint: `Int(1)`,
//! `Float(1.0)` and `Bool(true)` are three distinct keys, unlike dynamic
//! languages where numerically equal values hash alike. The only folding is
//! `UInt` into `Int` when the value fits, and `-0.0` into `0.0`.

use std::fmt;

use crate::error::{Error, Result};

/// A dynamically typed call argument
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value
    None,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Unsigned integer (values that fit in `i64` fingerprint as [`Value::Int`])
    UInt(u64),
    /// Floating point number; NaN is unhashable
    Float(f64),
    /// UTF-8 string
    Str(String),
    /// Byte string
    Bytes(Vec<u8>),
    /// Immutable ordered sequence
    Tuple(Vec<Value>),
    /// Immutable set; element order and duplicates are irrelevant
    FrozenSet(Vec<Value>),
    /// Mutable sequence (unhashable)
    List(Vec<Value>),
    /// Mutable mapping (unhashable)
    Map(Vec<(Value, Value)>),
    /// Mutable set (unhashable)
    Set(Vec<Value>),
    /// Handle compared by identity only (unhashable)
    Opaque {
        /// Type name reported in errors
        type_name: &'static str,
        /// Identity of the referenced object
        id: usize,
    },
}

impl Value {
    /// Build a tuple value
    pub fn tuple<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::Tuple(items.into_iter().map(Into::into).collect())
    }

    /// Build a frozen set value
    pub fn frozen_set<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::FrozenSet(items.into_iter().map(Into::into).collect())
    }

    /// Build a list value
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// Type name used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(f) if f.is_nan() => "float(nan)",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::Tuple(_) => "tuple",
            Value::FrozenSet(_) => "frozenset",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Opaque { type_name, .. } => *type_name,
        }
    }

    /// Canonical hashable form, or the kind of the first unhashable value found
    fn canonicalize(&self) -> std::result::Result<KeyPart, &'static str> {
        let part = match self {
            Value::None => KeyPart::None,
            Value::Bool(b) => KeyPart::Bool(*b),
            Value::Int(i) => KeyPart::Int(*i),
            Value::UInt(u) => match i64::try_from(*u) {
                Ok(i) => KeyPart::Int(i),
                Err(_) => KeyPart::UInt(*u),
            },
            Value::Float(f) if f.is_nan() => return Err(self.kind()),
            // -0.0 == 0.0, so they must share a fingerprint
            Value::Float(f) if *f == 0.0 => KeyPart::Float(0f64.to_bits()),
            Value::Float(f) => KeyPart::Float(f.to_bits()),
            Value::Str(s) => KeyPart::Str(s.as_str().into()),
            Value::Bytes(b) => KeyPart::Bytes(b.as_slice().into()),
            Value::Tuple(items) => KeyPart::Tuple(
                items
                    .iter()
                    .map(Value::canonicalize)
                    .collect::<std::result::Result<_, _>>()?,
            ),
            Value::FrozenSet(items) => {
                let mut parts = items
                    .iter()
                    .map(Value::canonicalize)
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                parts.sort();
                parts.dedup();
                KeyPart::FrozenSet(parts.into_boxed_slice())
            }
            Value::List(_) | Value::Map(_) | Value::Set(_) | Value::Opaque { .. } => {
                return Err(self.kind())
            }
        };
        Ok(part)
    }
}

macro_rules! impl_from_int {
    ($variant:ident, $target:ty, $($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v as $target)
                }
            }
        )*
    };
}

impl_from_int!(Int, i64, i8, i16, i32, i64, isize);
impl_from_int!(UInt, u64, u8, u16, u32, u64, usize);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
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

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::None, Into::into)
    }
}

/// JSON arrays and objects are mutable containers and stay unhashable.
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match v {
            Json::Null => Value::None,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(s) => Value::Str(s),
            Json::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (Value::Str(k), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Arguments of a single call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    positional: Vec<Value>,
    keywords: Vec<(String, Value)>,
}

impl Args {
    /// Empty argument list
    pub fn new() -> Self {
        Self::default()
    }

    /// Arguments made of positional values only
    pub fn positional<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Self {
            positional: values.into_iter().map(Into::into).collect(),
            keywords: Vec::new(),
        }
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Append a keyword argument
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keywords.push((name.into(), value.into()));
        self
    }

    /// Positional values in call order
    pub fn args(&self) -> &[Value] {
        &self.positional
    }

    /// Keyword arguments in specification order
    pub fn kwargs(&self) -> &[(String, Value)] {
        &self.keywords
    }

    /// Look up a keyword argument by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.keywords
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Derive this call's fingerprint
    pub fn fingerprint(&self) -> Result<Fingerprint> {
        Fingerprint::build(self)
    }
}

/// Canonical hashable form of a single value
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum KeyPart {
    None,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(u64),
    Str(Box<str>),
    Bytes(Box<[u8]>),
    Tuple(Box<[KeyPart]>),
    FrozenSet(Box<[KeyPart]>),
}

/// Canonical, hashable identity of a call's arguments
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    positional: Box<[KeyPart]>,
    keywords: Box<[(Box<str>, KeyPart)]>,
}

impl Fingerprint {
    /// Build the fingerprint of a call
    ///
    /// # Errors
    /// * [`Error::UnhashableArgument`] if any value (including nested ones)
    ///   lacks a stable equality/hash contract, or a keyword is repeated
    pub fn build(args: &Args) -> Result<Self> {
        let positional = args
            .positional
            .iter()
            .enumerate()
            .map(|(i, value)| {
                value.canonicalize().map_err(|kind| Error::UnhashableArgument {
                    argument: format!("#{}", i),
                    kind,
                })
            })
            .collect::<Result<Box<[_]>>>()?;

        let mut keywords = args
            .keywords
            .iter()
            .map(|(name, value)| {
                value
                    .canonicalize()
                    .map(|part| (Box::<str>::from(name.as_str()), part))
                    .map_err(|kind| Error::UnhashableArgument {
                        argument: format!("{}=", name),
                        kind,
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        keywords.sort_by(|a, b| a.0.cmp(&b.0));
        if let Some(pair) = keywords.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(Error::UnhashableArgument {
                argument: format!("{}=", pair[0].0),
                kind: "repeated keyword",
            });
        }

        Ok(Self {
            positional,
            keywords: keywords.into_boxed_slice(),
        })
    }

    /// Number of positional components
    pub fn arity(&self) -> usize {
        self.positional.len()
    }

    /// Keyword names in canonical order
    pub fn keyword_names(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(|(name, _)| name.as_ref())
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, parts: &[KeyPart]) -> fmt::Result {
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", part)?;
            }
            Ok(())
        }

        match self {
            KeyPart::None => write!(f, "None"),
            KeyPart::Bool(b) => write!(f, "{}", b),
            KeyPart::Int(i) => write!(f, "{}", i),
            KeyPart::UInt(u) => write!(f, "{}", u),
            KeyPart::Float(bits) => write!(f, "{:?}", f64::from_bits(*bits)),
            KeyPart::Str(s) => write!(f, "{:?}", s),
            KeyPart::Bytes(b) => write!(f, "b{:?}", String::from_utf8_lossy(b)),
            KeyPart::Tuple(parts) => {
                write!(f, "(")?;
                join(f, parts)?;
                if parts.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            KeyPart::FrozenSet(parts) => {
                write!(f, "{{")?;
                join(f, parts)?;
                write!(f, "}}")
            }
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        let mut first = true;
        for part in self.positional.iter() {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{}", part)?;
        }
        for (name, part) in self.keywords.iter() {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{}={}", name, part)?;
        }
        write!(f, ")")
    }
}
