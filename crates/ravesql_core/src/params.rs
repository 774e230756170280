//! Parameter shape normalization.
//!
//! # Responsibility
//! - Accept every admissible caller parameter shape as one tagged `Params`.
//! - Normalize it into a `ParameterSet` of named SQL values.
//!
//! # Invariants
//! - Key/value sequences have even length and text names.
//! - Later duplicate names overwrite earlier ones.
//! - Object shapes bind only the fields their type declares.

use crate::error::{RepoError, RepoResult};
use rusqlite::types::Value;
use std::collections::{BTreeMap, HashMap};

/// Named SQL values for one statement execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    values: BTreeMap<String, Value>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name`, replacing any earlier value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl IntoSqlValue) {
        self.values.insert(name.into(), value.into_sql_value());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl IntoSqlValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn names(&self) -> Vec<&str> {
        self.values.keys().map(String::as_str).collect()
    }
}

/// Per-type field declaration used to bind a structured object.
///
/// Implementations write each readable field; a field may skip itself.
/// `param_source!` generates this for plain structs.
pub trait ParamSource {
    fn write_params(&self, out: &mut ParameterSet);
}

impl ParamSource for ParameterSet {
    fn write_params(&self, out: &mut ParameterSet) {
        for (name, value) in self.iter() {
            out.insert(name, value.clone());
        }
    }
}

impl ParamSource for HashMap<String, Value> {
    fn write_params(&self, out: &mut ParameterSet) {
        for (name, value) in self {
            out.insert(name.as_str(), value.clone());
        }
    }
}

/// Caller-supplied parameter shape.
pub enum Params<'a> {
    None,
    /// Alternating name/value sequence.
    Pairs(Vec<Value>),
    Map(HashMap<String, Value>),
    Set(ParameterSet),
    Object(&'a dyn ParamSource),
}

impl<'a> Params<'a> {
    pub fn object(source: &'a dyn ParamSource) -> Self {
        Self::Object(source)
    }

    /// Short name of the shape, for log lines.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Pairs(_) => "pairs",
            Self::Map(_) => "map",
            Self::Set(_) => "set",
            Self::Object(_) => "object",
        }
    }
}

impl From<()> for Params<'_> {
    fn from(_: ()) -> Self {
        Self::None
    }
}

impl From<Vec<Value>> for Params<'_> {
    fn from(value: Vec<Value>) -> Self {
        Self::Pairs(value)
    }
}

impl From<HashMap<String, Value>> for Params<'_> {
    fn from(value: HashMap<String, Value>) -> Self {
        Self::Map(value)
    }
}

impl From<BTreeMap<String, Value>> for Params<'_> {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Self::Map(value.into_iter().collect())
    }
}

impl From<ParameterSet> for Params<'_> {
    fn from(value: ParameterSet) -> Self {
        Self::Set(value)
    }
}

/// Normalizes one parameter shape into a `ParameterSet`.
///
/// # Errors
/// - `MalformedParameters` for odd-length pair sequences or non-text names.
pub fn bind(params: Params<'_>) -> RepoResult<ParameterSet> {
    match params {
        Params::None => Ok(ParameterSet::new()),
        Params::Pairs(values) => bind_pairs(values),
        Params::Map(map) => Ok(ParameterSet {
            values: map.into_iter().collect(),
        }),
        Params::Set(set) => Ok(set),
        Params::Object(source) => Ok(bind_object(source)),
    }
}

/// Binds one structured object through its field declaration.
pub fn bind_object(source: &dyn ParamSource) -> ParameterSet {
    let mut set = ParameterSet::new();
    source.write_params(&mut set);
    set
}

fn bind_pairs(values: Vec<Value>) -> RepoResult<ParameterSet> {
    if values.len() % 2 != 0 {
        return Err(RepoError::MalformedParameters(format!(
            "key/value sequence must come in pairs, got {} items",
            values.len()
        )));
    }

    let mut set = ParameterSet::new();
    let mut items = values.into_iter().enumerate();
    while let (Some((index, name)), Some((_, value))) = (items.next(), items.next()) {
        let name = match name {
            Value::Text(name) => name,
            other => {
                return Err(RepoError::MalformedParameters(format!(
                    "parameter name at position {index} must be text, got {:?}",
                    other.data_type()
                )));
            }
        };
        set.values.insert(name, value);
    }
    Ok(set)
}

/// Conversion of Rust values into SQL parameter values.
pub trait IntoSqlValue {
    fn into_sql_value(self) -> Value;
}

impl IntoSqlValue for Value {
    fn into_sql_value(self) -> Value {
        self
    }
}

impl IntoSqlValue for &Value {
    fn into_sql_value(self) -> Value {
        self.clone()
    }
}

impl IntoSqlValue for &str {
    fn into_sql_value(self) -> Value {
        Value::Text(self.to_string())
    }
}

impl IntoSqlValue for String {
    fn into_sql_value(self) -> Value {
        Value::Text(self)
    }
}

impl IntoSqlValue for &String {
    fn into_sql_value(self) -> Value {
        Value::Text(self.clone())
    }
}

impl IntoSqlValue for Vec<u8> {
    fn into_sql_value(self) -> Value {
        Value::Blob(self)
    }
}

impl IntoSqlValue for bool {
    fn into_sql_value(self) -> Value {
        Value::Integer(i64::from(self))
    }
}

impl IntoSqlValue for f32 {
    fn into_sql_value(self) -> Value {
        Value::Real(f64::from(self))
    }
}

impl IntoSqlValue for f64 {
    fn into_sql_value(self) -> Value {
        Value::Real(self)
    }
}

impl<T: IntoSqlValue> IntoSqlValue for Option<T> {
    fn into_sql_value(self) -> Value {
        match self {
            Some(value) => value.into_sql_value(),
            None => Value::Null,
        }
    }
}

macro_rules! into_sql_integer {
    ($($ty:ty),*) => {
        $(
            impl IntoSqlValue for $ty {
                fn into_sql_value(self) -> Value {
                    Value::Integer(i64::from(self))
                }
            }
        )*
    };
}

into_sql_integer!(i8, i16, i32, i64, u8, u16, u32);

/// Builds `Params::Pairs` from `name => value` entries.
///
/// ```
/// use ravesql_core::{bind, param_pairs};
///
/// let set = bind(param_pairs!["id" => 1, "name" => "Alice"]).unwrap();
/// assert_eq!(set.len(), 2);
/// ```
#[macro_export]
macro_rules! param_pairs {
    () => {
        $crate::Params::Pairs(::std::vec::Vec::new())
    };
    ($($name:expr => $value:expr),+ $(,)?) => {
        $crate::Params::Pairs(::std::vec![
            $(
                $crate::IntoSqlValue::into_sql_value($name),
                $crate::IntoSqlValue::into_sql_value($value),
            )+
        ])
    };
}

/// Declares which struct fields bind as named parameters.
///
/// ```
/// use ravesql_core::{bind_object, param_source};
///
/// #[derive(Default)]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// param_source!(User { id, name });
///
/// let set = bind_object(&User { id: 7, name: "Eve".into() });
/// assert_eq!(set.len(), 2);
/// ```
#[macro_export]
macro_rules! param_source {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl $crate::ParamSource for $ty {
            fn write_params(&self, out: &mut $crate::ParameterSet) {
                $(
                    out.insert(
                        stringify!($field),
                        $crate::IntoSqlValue::into_sql_value(::std::clone::Clone::clone(
                            &self.$field,
                        )),
                    );
                )+
            }
        }
    };
}
