//! Safe numeric/enum/string conversion with well-typed failure kinds.
//!
//! Every property value that crosses the reflective object boundary (wire
//! serialisation, UI binding, script access) is conceptually a [`Value`];
//! converting between kinds never panics, it returns an [`Error`] instead.

use crate::error::Error;
use serde::{Deserialize, Serialize};

/// The dynamic value kinds a `Property<T>` may hold, stripped of `T`.
///
/// `EnumValue` carries both the symbolic name and the underlying integer so
/// a client can render either; `SetOfEnum` is a bitset of underlying
/// integer values (the set-of-enum kind from the data model).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    EnumValue { name: String, value: i64 },
    SetOfEnum(Vec<i64>),
}

/// Tag identifying a [`Value`] variant without its payload, used to request
/// a conversion target (`convert(v, ValueKind::I16)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    String,
    Enum,
    SetOfEnum,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::I8(_) => ValueKind::I8,
            Value::I16(_) => ValueKind::I16,
            Value::I32(_) => ValueKind::I32,
            Value::I64(_) => ValueKind::I64,
            Value::U8(_) => ValueKind::U8,
            Value::U16(_) => ValueKind::U16,
            Value::U32(_) => ValueKind::U32,
            Value::U64(_) => ValueKind::U64,
            Value::F32(_) => ValueKind::F32,
            Value::F64(_) => ValueKind::F64,
            Value::String(_) => ValueKind::String,
            Value::EnumValue { .. } => ValueKind::Enum,
            Value::SetOfEnum(_) => ValueKind::SetOfEnum,
        }
    }

    fn as_i128(&self) -> Option<i128> {
        match self {
            Value::I8(v) => Some(*v as i128),
            Value::I16(v) => Some(*v as i128),
            Value::I32(v) => Some(*v as i128),
            Value::I64(v) => Some(*v as i128),
            Value::U8(v) => Some(*v as i128),
            Value::U16(v) => Some(*v as i128),
            Value::U32(v) => Some(*v as i128),
            Value::U64(v) => Some(*v as i128),
            Value::EnumValue { value, .. } => Some(*value as i128),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F32(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            _ => self.as_i128().map(|v| v as f64),
        }
    }
}

macro_rules! narrow_int {
    ($value:expr, $to:ty, $variant:ident) => {{
        let v = $value;
        if v >= <$to>::MIN as i128 && v <= <$to>::MAX as i128 {
            Ok(Value::$variant(v as $to))
        } else {
            Err(Error::OutOfRange)
        }
    }};
}

/// Converts `value` to the requested `target` kind.
///
/// Rules (in order): identical kind passes through; widening integer
/// conversions always succeed; narrowing succeeds iff the value fits;
/// float → integer rounds half-away-from-zero and is range-checked;
/// integer ↔ enum is bit-preserving (the caller is responsible for then
/// validating the result against the enum's declared values — this
/// function only performs the numeric reinterpretation); bool is handled
/// explicitly rather than falling through the integer path; any other pair
/// is `ConversionError`.
pub fn convert(value: &Value, target: ValueKind) -> Result<Value, Error> {
    if value.kind() == target {
        return Ok(value.clone());
    }

    match (value, target) {
        (Value::Bool(_), ValueKind::Bool) => Ok(value.clone()),
        (Value::Bool(_), _) | (_, ValueKind::Bool) => Err(Error::ConversionError),

        // integer -> enum and enum -> integer are bit-preserving reinterprets
        (Value::EnumValue { value: v, .. }, ValueKind::I64) => Ok(Value::I64(*v)),
        (_, ValueKind::Enum) => {
            let v = value.as_i128().ok_or(Error::ConversionError)?;
            Ok(Value::EnumValue {
                name: String::new(),
                value: v as i64,
            })
        }

        (Value::String(s), ValueKind::String) => Ok(Value::String(s.clone())),
        (_, ValueKind::String) => Err(Error::ConversionError),
        (Value::String(_), _) => Err(Error::ConversionError),

        // float -> integer: round half-away-from-zero, range-checked
        (v, ValueKind::I8 | ValueKind::I16 | ValueKind::I32 | ValueKind::I64 |
             ValueKind::U8 | ValueKind::U16 | ValueKind::U32 | ValueKind::U64)
            if matches!(v, Value::F32(_) | Value::F64(_)) =>
        {
            let f = v.as_f64().ok_or(Error::ConversionError)?;
            let rounded = round_half_away_from_zero(f);
            integer_from_i128(rounded as i128, target)
        }

        // integer/enum -> integer (widening always ok, narrowing range-checked)
        (v, ValueKind::I8 | ValueKind::I16 | ValueKind::I32 | ValueKind::I64 |
             ValueKind::U8 | ValueKind::U16 | ValueKind::U32 | ValueKind::U64) => {
            let i = v.as_i128().ok_or(Error::ConversionError)?;
            integer_from_i128(i, target)
        }

        // anything -> float always succeeds if numeric
        (v, ValueKind::F32) => Ok(Value::F32(v.as_f64().ok_or(Error::ConversionError)? as f32)),
        (v, ValueKind::F64) => Ok(Value::F64(v.as_f64().ok_or(Error::ConversionError)?)),

        _ => Err(Error::ConversionError),
    }
}

fn round_half_away_from_zero(f: f64) -> f64 {
    if f >= 0.0 { (f + 0.5).floor() } else { (f - 0.5).ceil() }
}

fn integer_from_i128(v: i128, target: ValueKind) -> Result<Value, Error> {
    match target {
        ValueKind::I8 => narrow_int!(v, i8, I8),
        ValueKind::I16 => narrow_int!(v, i16, I16),
        ValueKind::I32 => narrow_int!(v, i32, I32),
        ValueKind::I64 => narrow_int!(v, i64, I64),
        ValueKind::U8 => narrow_int!(v, u8, U8),
        ValueKind::U16 => narrow_int!(v, u16, U16),
        ValueKind::U32 => narrow_int!(v, u32, U32),
        ValueKind::U64 => narrow_int!(v, u64, U64),
        _ => Err(Error::ConversionError),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_passthrough() {
        assert_eq!(convert(&Value::I32(42), ValueKind::I32), Ok(Value::I32(42)));
    }

    #[test]
    fn widening_always_succeeds() {
        assert_eq!(convert(&Value::I8(-5), ValueKind::I32), Ok(Value::I32(-5)));
        assert_eq!(convert(&Value::U8(250), ValueKind::U32), Ok(Value::U32(250)));
    }

    #[test]
    fn narrowing_checks_range() {
        assert_eq!(convert(&Value::I32(300), ValueKind::I8), Err(Error::OutOfRange));
        assert_eq!(convert(&Value::I32(100), ValueKind::I8), Ok(Value::I8(100)));
    }

    #[test]
    fn float_to_integer_rounds_half_away_from_zero() {
        assert_eq!(convert(&Value::F64(2.5), ValueKind::I32), Ok(Value::I32(3)));
        assert_eq!(convert(&Value::F64(-2.5), ValueKind::I32), Ok(Value::I32(-3)));
        assert_eq!(convert(&Value::F64(2.4), ValueKind::I32), Ok(Value::I32(2)));
    }

    #[test]
    fn float_to_integer_out_of_range() {
        assert_eq!(convert(&Value::F64(1e10), ValueKind::I32), Err(Error::OutOfRange));
    }

    #[test]
    fn bool_is_not_an_integer() {
        assert_eq!(convert(&Value::Bool(true), ValueKind::I32), Err(Error::ConversionError));
        assert_eq!(convert(&Value::I32(1), ValueKind::Bool), Err(Error::ConversionError));
    }

    #[test]
    fn enum_integer_round_trip_is_bit_preserving() {
        let e = Value::EnumValue { name: "DCC".into(), value: 2 };
        assert_eq!(convert(&e, ValueKind::I64), Ok(Value::I64(2)));
    }

    #[test]
    fn unrelated_pair_is_not_convertible() {
        assert_eq!(
            convert(&Value::String("x".into()), ValueKind::I32),
            Err(Error::ConversionError)
        );
    }
}
