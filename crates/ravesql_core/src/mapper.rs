//! Row-to-target mapping.
//!
//! # Responsibility
//! - Map one result `Record` onto a caller-declared `RowTarget`.
//! - Coerce SQL values into Rust field types.
//!
//! # Invariants
//! - Column names match field names case-insensitively (underscores optional).
//! - Unmatched columns are ignored; unmatched fields keep their defaults.
//! - NULL only maps into `Option` fields.

use crate::executor::Record;
use rusqlite::types::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Failure to build or fill a target value.
#[derive(Debug, Clone, PartialEq)]
pub enum MappingError {
    Instantiation {
        target: String,
        message: String,
    },
    UnexpectedNull {
        expected: &'static str,
    },
    Coercion {
        expected: &'static str,
        found: String,
    },
    /// A field assignment failed for `column`.
    Column {
        column: String,
        source: Box<MappingError>,
    },
}

impl MappingError {
    fn coercion(expected: &'static str, value: &Value) -> Self {
        Self::Coercion {
            expected,
            found: describe_value(value),
        }
    }
}

impl Display for MappingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Instantiation { target, message } => {
                write!(f, "cannot instantiate `{target}`: {message}")
            }
            Self::UnexpectedNull { expected } => {
                write!(f, "NULL cannot be assigned to non-optional {expected}")
            }
            Self::Coercion { expected, found } => {
                write!(f, "cannot convert {found} into {expected}")
            }
            Self::Column { column, source } => write!(f, "column `{column}`: {source}"),
        }
    }
}

impl Error for MappingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Column { source, .. } => Some(&**source),
            _ => None,
        }
    }
}

/// Caller-declared row shape.
///
/// `row_target!` generates this for `Default` structs.
pub trait RowTarget: Sized {
    /// Settable field names, in declaration order.
    fn fields() -> &'static [&'static str];

    /// Creates the zero value that columns are assigned onto.
    fn instantiate() -> Result<Self, MappingError>;

    /// Assigns one column value to the field named `field`.
    fn assign(&mut self, field: &str, value: Value) -> Result<(), MappingError>;
}

/// Maps one record onto a new `T`.
///
/// # Errors
/// - `Instantiation` when `T` cannot be created.
/// - `Column` wrapping the coercion failure of the offending column.
pub fn map_row<T: RowTarget>(record: &Record) -> Result<T, MappingError> {
    let mut target = T::instantiate()?;
    let fields = T::fields();

    for (column, value) in record.iter() {
        let Some(field) = fields.iter().find(|field| column_matches(field, column)) else {
            continue;
        };
        target
            .assign(field, value.clone())
            .map_err(|err| MappingError::Column {
                column: column.to_string(),
                source: Box::new(err),
            })?;
    }

    Ok(target)
}

fn column_matches(field: &str, column: &str) -> bool {
    if field.eq_ignore_ascii_case(column) {
        return true;
    }
    let squash = |value: &str| -> String {
        value
            .chars()
            .filter(|c| *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect()
    };
    squash(field) == squash(column)
}

/// Conversion from a SQL column value into a field type.
pub trait FromColumn: Sized {
    fn from_column(value: Value) -> Result<Self, MappingError>;
}

impl FromColumn for Value {
    fn from_column(value: Value) -> Result<Self, MappingError> {
        Ok(value)
    }
}

impl<T: FromColumn> FromColumn for Option<T> {
    fn from_column(value: Value) -> Result<Self, MappingError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_column(other).map(Some),
        }
    }
}

impl FromColumn for i64 {
    fn from_column(value: Value) -> Result<Self, MappingError> {
        match &value {
            Value::Integer(number) => Ok(*number),
            Value::Real(number)
                if number.fract() == 0.0
                    && *number >= i64::MIN as f64
                    && *number < i64::MAX as f64 =>
            {
                Ok(*number as i64)
            }
            Value::Text(text) => text
                .trim()
                .parse::<i64>()
                .map_err(|_| MappingError::coercion("i64", &value)),
            Value::Null => Err(MappingError::UnexpectedNull { expected: "i64" }),
            _ => Err(MappingError::coercion("i64", &value)),
        }
    }
}

macro_rules! from_column_integer {
    ($($ty:ty),*) => {
        $(
            impl FromColumn for $ty {
                fn from_column(value: Value) -> Result<Self, MappingError> {
                    let expected = stringify!($ty);
                    let wide = i64::from_column(value).map_err(|err| match err {
                        MappingError::UnexpectedNull { .. } => {
                            MappingError::UnexpectedNull { expected }
                        }
                        MappingError::Coercion { found, .. } => {
                            MappingError::Coercion { expected, found }
                        }
                        other => other,
                    })?;
                    <$ty>::try_from(wide).map_err(|_| MappingError::Coercion {
                        expected,
                        found: format!("out-of-range integer {wide}"),
                    })
                }
            }
        )*
    };
}

from_column_integer!(i8, i16, i32, isize, u8, u16, u32, u64, usize);

impl FromColumn for f64 {
    fn from_column(value: Value) -> Result<Self, MappingError> {
        match &value {
            Value::Real(number) => Ok(*number),
            Value::Integer(number) => Ok(*number as f64),
            Value::Text(text) => text
                .trim()
                .parse::<f64>()
                .map_err(|_| MappingError::coercion("f64", &value)),
            Value::Null => Err(MappingError::UnexpectedNull { expected: "f64" }),
            Value::Blob(_) => Err(MappingError::coercion("f64", &value)),
        }
    }
}

impl FromColumn for f32 {
    fn from_column(value: Value) -> Result<Self, MappingError> {
        f64::from_column(value).map(|number| number as f32)
    }
}

impl FromColumn for bool {
    fn from_column(value: Value) -> Result<Self, MappingError> {
        match &value {
            Value::Integer(number) => Ok(*number != 0),
            Value::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(MappingError::coercion("bool", &value)),
            },
            Value::Null => Err(MappingError::UnexpectedNull { expected: "bool" }),
            _ => Err(MappingError::coercion("bool", &value)),
        }
    }
}

impl FromColumn for String {
    fn from_column(value: Value) -> Result<Self, MappingError> {
        match value {
            Value::Text(text) => Ok(text),
            Value::Integer(number) => Ok(number.to_string()),
            Value::Real(number) => Ok(number.to_string()),
            Value::Blob(bytes) => String::from_utf8(bytes).map_err(|_| MappingError::Coercion {
                expected: "String",
                found: "non UTF-8 blob".to_string(),
            }),
            Value::Null => Err(MappingError::UnexpectedNull { expected: "String" }),
        }
    }
}

impl FromColumn for Vec<u8> {
    fn from_column(value: Value) -> Result<Self, MappingError> {
        match value {
            Value::Blob(bytes) => Ok(bytes),
            Value::Text(text) => Ok(text.into_bytes()),
            Value::Null => Err(MappingError::UnexpectedNull { expected: "bytes" }),
            other => Err(MappingError::coercion("bytes", &other)),
        }
    }
}

/// Parses a text (or integer) column through `FromStr`.
///
/// Building block for enum fields:
///
/// ```
/// use ravesql_core::{from_text_column, FromColumn, MappingError, Value};
/// use std::str::FromStr;
///
/// #[derive(Debug, PartialEq)]
/// enum Role { Admin, Guest }
///
/// impl FromStr for Role {
///     type Err = ();
///     fn from_str(value: &str) -> Result<Self, ()> {
///         match value {
///             "admin" => Ok(Role::Admin),
///             "guest" => Ok(Role::Guest),
///             _ => Err(()),
///         }
///     }
/// }
///
/// impl FromColumn for Role {
///     fn from_column(value: Value) -> Result<Self, MappingError> {
///         from_text_column(value, "Role")
///     }
/// }
///
/// assert_eq!(Role::from_column(Value::Text("admin".into())), Ok(Role::Admin));
/// ```
pub fn from_text_column<T: FromStr>(value: Value, expected: &'static str) -> Result<T, MappingError> {
    let text = match &value {
        Value::Text(text) => text.trim().to_string(),
        Value::Integer(number) => number.to_string(),
        Value::Null => return Err(MappingError::UnexpectedNull { expected }),
        _ => return Err(MappingError::coercion(expected, &value)),
    };
    text.parse::<T>()
        .map_err(|_| MappingError::coercion(expected, &value))
}

fn describe_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(number) => format!("integer {number}"),
        Value::Real(number) => format!("real {number}"),
        Value::Text(text) => format!("text `{}`", truncate(text, 32)),
        Value::Blob(bytes) => format!("blob of {} bytes", bytes.len()),
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    let mut truncated: String = value.chars().take(max_chars).collect();
    if value.chars().count() > max_chars {
        truncated.push_str("...");
    }
    truncated
}

/// Declares which struct fields receive mapped columns.
///
/// The struct must implement `Default`; every listed field must implement
/// `FromColumn`.
///
/// ```
/// use ravesql_core::{map_row, row_target, Record, Value};
///
/// #[derive(Debug, Default)]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// row_target!(User { id, name });
///
/// let record = Record::new()
///     .with("ID", Value::Integer(1))
///     .with("NAME", Value::Text("Alice".into()));
/// let user: User = map_row(&record).unwrap();
/// assert_eq!(user.name, "Alice");
/// ```
#[macro_export]
macro_rules! row_target {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl $crate::RowTarget for $ty {
            fn fields() -> &'static [&'static str] {
                &[$(stringify!($field)),+]
            }

            fn instantiate() -> ::std::result::Result<Self, $crate::MappingError> {
                ::std::result::Result::Ok(<Self as ::std::default::Default>::default())
            }

            fn assign(
                &mut self,
                field: &str,
                value: $crate::Value,
            ) -> ::std::result::Result<(), $crate::MappingError> {
                match field {
                    $(
                        stringify!($field) => {
                            self.$field = $crate::FromColumn::from_column(value)?;
                        }
                    )+
                    _ => {}
                }
                ::std::result::Result::Ok(())
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::{from_text_column, map_row, FromColumn, MappingError, RowTarget};
    use crate::executor::Record;
    use rusqlite::types::Value;
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    enum Tier {
        #[default]
        Free,
        Pro,
    }

    impl FromStr for Tier {
        type Err = ();

        fn from_str(value: &str) -> Result<Self, Self::Err> {
            match value.to_ascii_lowercase().as_str() {
                "free" => Ok(Self::Free),
                "pro" => Ok(Self::Pro),
                _ => Err(()),
            }
        }
    }

    impl FromColumn for Tier {
        fn from_column(value: Value) -> Result<Self, MappingError> {
            from_text_column(value, "Tier")
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Member {
        id: i32,
        display_name: String,
        score: f64,
        nickname: Option<String>,
        tier: Tier,
        active: bool,
    }

    crate::row_target!(Member {
        id,
        display_name,
        score,
        nickname,
        tier,
        active,
    });

    fn text(value: &str) -> Value {
        Value::Text(value.to_string())
    }

    #[test]
    fn matches_columns_case_insensitively() {
        let record = Record::new()
            .with("ID", Value::Integer(7))
            .with("Display_Name", text("Alice"))
            .with("displayname", text("Alice B."));

        let member: Member = map_row(&record).expect("mapping should succeed");
        assert_eq!(member.id, 7);
        assert_eq!(member.display_name, "Alice B.");
    }

    #[test]
    fn ignores_extra_columns_and_defaults_missing_fields() {
        let record = Record::new()
            .with("id", Value::Integer(1))
            .with("unrelated", text("x"));

        let member: Member = map_row(&record).expect("mapping should succeed");
        assert_eq!(
            member,
            Member {
                id: 1,
                ..Member::default()
            }
        );
    }

    #[test]
    fn coerces_numeric_text_enum_and_bool_columns() {
        let record = Record::new()
            .with("id", text(" 42 "))
            .with("score", Value::Integer(3))
            .with("tier", text("PRO"))
            .with("active", Value::Integer(1))
            .with("nickname", Value::Null);

        let member: Member = map_row(&record).expect("mapping should succeed");
        assert_eq!(member.id, 42);
        assert_eq!(member.score, 3.0);
        assert_eq!(member.tier, Tier::Pro);
        assert!(member.active);
        assert_eq!(member.nickname, None);
    }

    #[test]
    fn non_numeric_text_into_integer_field_fails() {
        let record = Record::new().with("id", text("abc"));
        let err = map_row::<Member>(&record).expect_err("non-numeric text must fail");
        match err {
            MappingError::Column { column, source } => {
                assert_eq!(column, "id");
                assert!(matches!(*source, MappingError::Coercion { expected: "i32", .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn null_into_required_field_fails() {
        let record = Record::new().with("display_name", Value::Null);
        let err = map_row::<Member>(&record).expect_err("NULL into String must fail");
        assert!(err.to_string().contains("NULL"));
    }

    #[test]
    fn out_of_range_integer_fails() {
        let err = i8::from_column(Value::Integer(1_000)).expect_err("overflow must fail");
        assert!(matches!(err, MappingError::Coercion { expected: "i8", .. }));
        assert_eq!(u64::from_column(Value::Real(5.0)), Ok(5));
        assert!(i64::from_column(Value::Real(5.5)).is_err());
    }

    #[derive(Debug)]
    struct Unbuildable;

    impl RowTarget for Unbuildable {
        fn fields() -> &'static [&'static str] {
            &[]
        }

        fn instantiate() -> Result<Self, MappingError> {
            Err(MappingError::Instantiation {
                target: "Unbuildable".to_string(),
                message: "no default construction path".to_string(),
            })
        }

        fn assign(&mut self, _field: &str, _value: Value) -> Result<(), MappingError> {
            Ok(())
        }
    }

    #[test]
    fn instantiation_failure_is_reported() {
        let err = map_row::<Unbuildable>(&Record::new()).expect_err("instantiation must fail");
        assert!(matches!(err, MappingError::Instantiation { .. }));
    }
}
