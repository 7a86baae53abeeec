use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CfgError;

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Characters a decimal may carry for readability: a currency symbol and
/// group separators.
const DECIMAL_DECORATIONS: &[char] = &['$', ','];

/// The declared type of a bindable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    String,
    Bool,
    Char,
    Byte,
    Int16,
    Int32,
    Int64,
    UInt16,
    UInt32,
    UInt64,
    Single,
    Double,
    Decimal,
    Guid,
    DateTime,
}

impl ValueType {
    pub fn type_name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::Char => "char",
            Self::Byte => "u8",
            Self::Int16 => "i16",
            Self::Int32 => "i32",
            Self::Int64 => "i64",
            Self::UInt16 => "u16",
            Self::UInt32 => "u32",
            Self::UInt64 => "u64",
            Self::Single => "f32",
            Self::Double => "f64",
            Self::Decimal => "decimal",
            Self::Guid => "uuid",
            Self::DateTime => "datetime",
        }
    }

    /// Converts attribute text into a value of this type.
    ///
    /// Numeric, boolean, guid and date conversions ignore surrounding
    /// whitespace; strings are taken verbatim.
    pub fn parse(self, text: &str) -> Result<CfgValue, CfgError> {
        let trimmed = text.trim();
        let value = match self {
            Self::String => CfgValue::String(text.to_string()),
            Self::Bool => {
                if trimmed.eq_ignore_ascii_case("true") {
                    CfgValue::Bool(true)
                } else if trimmed.eq_ignore_ascii_case("false") {
                    CfgValue::Bool(false)
                } else {
                    return Err(conversion_error(
                        self,
                        text,
                        "expected \"true\" or \"false\"",
                    ));
                }
            }
            Self::Char => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => CfgValue::Char(ch),
                    _ => {
                        return Err(conversion_error(
                            self,
                            text,
                            "string must be exactly one character long",
                        ))
                    }
                }
            }
            Self::Byte => CfgValue::Byte(parse_number(self, text, trimmed)?),
            Self::Int16 => CfgValue::Int16(parse_number(self, text, trimmed)?),
            Self::Int32 => CfgValue::Int32(parse_number(self, text, trimmed)?),
            Self::Int64 => CfgValue::Int64(parse_number(self, text, trimmed)?),
            Self::UInt16 => CfgValue::UInt16(parse_number(self, text, trimmed)?),
            Self::UInt32 => CfgValue::UInt32(parse_number(self, text, trimmed)?),
            Self::UInt64 => CfgValue::UInt64(parse_number(self, text, trimmed)?),
            Self::Single => CfgValue::Single(parse_number(self, text, trimmed)?),
            Self::Double => CfgValue::Double(parse_number(self, text, trimmed)?),
            Self::Decimal => CfgValue::Decimal(parse_decimal(self, text, trimmed)?),
            Self::Guid => CfgValue::Guid(
                Uuid::parse_str(trimmed)
                    .map_err(|error| conversion_error(self, text, &error.to_string()))?,
            ),
            Self::DateTime => CfgValue::DateTime(parse_date_time(trimmed).ok_or_else(|| {
                conversion_error(self, text, "unrecognized date/time format")
            })?),
        };
        Ok(value)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

fn parse_number<N>(ty: ValueType, text: &str, trimmed: &str) -> Result<N, CfgError>
where
    N: std::str::FromStr,
    N::Err: fmt::Display,
{
    trimmed
        .parse::<N>()
        .map_err(|error| conversion_error(ty, text, &error.to_string()))
}

fn parse_decimal(ty: ValueType, text: &str, trimmed: &str) -> Result<Decimal, CfgError> {
    let plain: String = trimmed
        .chars()
        .filter(|ch| !DECIMAL_DECORATIONS.contains(ch))
        .collect();
    let parsed = if plain.contains(['e', 'E']) {
        Decimal::from_scientific(&plain)
    } else {
        plain.parse::<Decimal>()
    };
    parsed.map_err(|error| conversion_error(ty, text, &error.to_string()))
}

fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    if let Ok(value) = DateTime::parse_from_rfc3339(text) {
        return Some(value.naive_utc());
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(value) = NaiveDateTime::parse_from_str(text, format) {
            return Some(value);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

fn conversion_error(ty: ValueType, text: &str, reason: &str) -> CfgError {
    CfgError::new(
        "VALUE_CONVERSION_ERROR",
        format!("Cannot convert '{}' to {}: {}.", text, ty, reason),
    )
}

/// A bound field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum CfgValue {
    String(String),
    Bool(bool),
    Char(char),
    Byte(u8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Single(f32),
    Double(f64),
    Decimal(Decimal),
    Guid(Uuid),
    DateTime(NaiveDateTime),
}

impl CfgValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::String(_) => ValueType::String,
            Self::Bool(_) => ValueType::Bool,
            Self::Char(_) => ValueType::Char,
            Self::Byte(_) => ValueType::Byte,
            Self::Int16(_) => ValueType::Int16,
            Self::Int32(_) => ValueType::Int32,
            Self::Int64(_) => ValueType::Int64,
            Self::UInt16(_) => ValueType::UInt16,
            Self::UInt32(_) => ValueType::UInt32,
            Self::UInt64(_) => ValueType::UInt64,
            Self::Single(_) => ValueType::Single,
            Self::Double(_) => ValueType::Double,
            Self::Decimal(_) => ValueType::Decimal,
            Self::Guid(_) => ValueType::Guid,
            Self::DateTime(_) => ValueType::DateTime,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for CfgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(value) => f.write_str(value),
            Self::Bool(value) => write!(f, "{}", value),
            Self::Char(value) => write!(f, "{}", value),
            Self::Byte(value) => write!(f, "{}", value),
            Self::Int16(value) => write!(f, "{}", value),
            Self::Int32(value) => write!(f, "{}", value),
            Self::Int64(value) => write!(f, "{}", value),
            Self::UInt16(value) => write!(f, "{}", value),
            Self::UInt32(value) => write!(f, "{}", value),
            Self::UInt64(value) => write!(f, "{}", value),
            Self::Single(value) => write!(f, "{}", value),
            Self::Double(value) => write!(f, "{}", value),
            Self::Decimal(value) => write!(f, "{}", value),
            Self::Guid(value) => write!(f, "{}", value),
            Self::DateTime(value) => write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&str> for CfgValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// A Rust type that can be stored in a schema field.
pub trait FieldValue: Clone + Send + Sync + 'static {
    const VALUE_TYPE: ValueType;

    fn from_value(value: CfgValue) -> Option<Self>;

    fn to_value(&self) -> CfgValue;
}

macro_rules! field_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FieldValue for $ty {
                const VALUE_TYPE: ValueType = ValueType::$variant;

                fn from_value(value: CfgValue) -> Option<Self> {
                    match value {
                        CfgValue::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }

                fn to_value(&self) -> CfgValue {
                    CfgValue::$variant(self.clone())
                }
            }

            impl From<$ty> for CfgValue {
                fn from(value: $ty) -> Self {
                    CfgValue::$variant(value)
                }
            }
        )*
    };
}

field_value! {
    String => String,
    bool => Bool,
    char => Char,
    u8 => Byte,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Single,
    f64 => Double,
    Decimal => Decimal,
    Uuid => Guid,
    NaiveDateTime => DateTime,
}
