//! Value Marshaller - conversion between Lua values and [`Variant`]s
//!
//! # Lua → foreign
//!
//! | Lua                         | Variant                                 |
//! |-----------------------------|-----------------------------------------|
//! | nil                         | `Null`                                  |
//! | boolean                     | `Bool`                                  |
//! | integer, number             | truncated, `I4` when it fits, else `I8` |
//! | string                      | `Str`                                   |
//! | live handle                 | `Dispatch` (the owned reference)        |
//! | `to_ole_integer` result     | the typed integer as-is                 |
//! | `{year=, month=, day=, ..}` | `Date`                                  |
//!
//! Anything else is rejected with [`BridgeError::UnsupportedArgument`].
//!
//! # Foreign → Lua
//!
//! Objects become new live handles, byte arrays become strings, arrays and
//! maps become tables. `Unknown` references cannot be represented and are a
//! hard error; kinds this crate does not model degrade to nil with a warning.

use luaole_sdk::{DateFields, Variant};
use mlua::{Lua, MetaMethod, Table, UserData, UserDataMethods, Value};

use crate::error::{BridgeError, BridgeResult};
use crate::handle::LiveHandle;
use crate::options::BridgeOptions;

// ============================================================================
// Lua → foreign
// ============================================================================

/// Convert one Lua value into a call argument
pub fn to_variant(value: &Value) -> BridgeResult<Variant> {
    match value {
        Value::Nil => Ok(Variant::Null),
        Value::Boolean(b) => Ok(Variant::Bool(*b)),
        Value::Integer(i) => Ok(narrow_integer(*i)),
        Value::Number(n) => narrow_number(*n),
        Value::String(s) => Ok(Variant::Str(s.to_string_lossy().into())),
        Value::UserData(ud) => {
            if let Ok(handle) = ud.borrow::<LiveHandle>() {
                return Ok(Variant::Dispatch(handle.receiver("argument")?));
            }
            if let Ok(typed) = ud.borrow::<TypedValue>() {
                return Ok(typed.0.clone());
            }
            Err(BridgeError::UnsupportedArgument("userdata".to_string()))
        }
        Value::Table(table) => date_from_table(table),
        other => Err(BridgeError::UnsupportedArgument(
            other.type_name().to_string(),
        )),
    }
}

/// Convert a list of Lua values, stopping at the first failure
pub fn to_variants(values: &[Value]) -> BridgeResult<Vec<Variant>> {
    values.iter().map(to_variant).collect()
}

fn narrow_integer(value: i64) -> Variant {
    match i32::try_from(value) {
        Ok(v) => Variant::I4(v),
        Err(_) => Variant::I8(value),
    }
}

// Fractions are dropped on the way in; typed values are the escape hatch.
fn narrow_number(value: f64) -> BridgeResult<Variant> {
    let truncated = value.trunc();
    if !truncated.is_finite() || truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(BridgeError::BadArgument {
            context: "argument".to_string(),
            expected: "number in integer range",
            got: value.to_string(),
        });
    }
    Ok(narrow_integer(truncated as i64))
}

fn date_from_table(table: &Table) -> BridgeResult<Variant> {
    let year: Option<i32> = date_field(table, "year")?;
    let month: Option<u32> = date_field(table, "month")?;
    let day: Option<u32> = date_field(table, "day")?;
    let (Some(year), Some(month), Some(day)) = (year, month, day) else {
        return Err(BridgeError::UnsupportedArgument("table".to_string()));
    };
    let fields = DateFields {
        year,
        month,
        day,
        hour: date_field(table, "hour")?.unwrap_or(0),
        min: date_field(table, "min")?.unwrap_or(0),
        sec: date_field(table, "sec")?.unwrap_or(0),
    };
    fields
        .to_ole()
        .map(Variant::Date)
        .ok_or_else(|| BridgeError::BadArgument {
            context: "argument".to_string(),
            expected: "valid calendar date",
            got: format!("{:04}-{:02}-{:02}", fields.year, fields.month, fields.day),
        })
}

/// One whole-number field of a date table; absent fields are `None`
fn date_field<T: TryFrom<i64>>(table: &Table, key: &str) -> BridgeResult<Option<T>> {
    let bad = |got: String| BridgeError::BadArgument {
        context: "argument".to_string(),
        expected: "date table with integer fields",
        got,
    };
    let whole = match table.raw_get::<Value>(key)? {
        Value::Nil => return Ok(None),
        Value::Integer(i) => i,
        Value::Number(n) if n.is_finite() && n.fract() == 0.0 => n as i64,
        other => return Err(bad(format!("{} of type {}", key, other.type_name()))),
    };
    T::try_from(whole)
        .map(Some)
        .map_err(|_| bad(format!("{} = {}", key, whole)))
}

// ============================================================================
// Foreign → Lua
// ============================================================================

/// Convert a foreign result into a Lua value
pub fn from_variant(lua: &Lua, value: Variant) -> BridgeResult<Value> {
    let converted = match value {
        Variant::Empty | Variant::Null => Value::Nil,
        Variant::Bool(b) => Value::Boolean(b),
        Variant::I1(v) => Value::Integer(v.into()),
        Variant::I2(v) => Value::Integer(v.into()),
        Variant::I4(v) => Value::Integer(v.into()),
        Variant::I8(v) => Value::Integer(v),
        Variant::UI1(v) => Value::Integer(v.into()),
        Variant::UI2(v) => Value::Integer(v.into()),
        Variant::UI4(v) => Value::Integer(v.into()),
        Variant::UI8(v) => match i64::try_from(v) {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::Number(v as f64),
        },
        Variant::R4(v) => Value::Number(v.into()),
        Variant::R8(v) => Value::Number(v),
        Variant::Date(days) => date_to_lua(lua, days)?,
        Variant::Str(s) => Value::String(lua.create_string(&s)?),
        Variant::Bytes(bytes) => Value::String(lua.create_string(&bytes)?),
        Variant::Dispatch(object) => Value::UserData(lua.create_userdata(LiveHandle::new(object))?),
        Variant::Array(items) => {
            let table = lua.create_table_with_capacity(items.len(), 0)?;
            for (i, item) in items.into_iter().enumerate() {
                table.raw_set(i + 1, from_variant(lua, item)?)?;
            }
            Value::Table(table)
        }
        Variant::Map(pairs) => {
            let table = lua.create_table_with_capacity(0, pairs.len())?;
            for (key, item) in pairs {
                let key = from_variant(lua, key)?;
                match key {
                    Value::Nil => continue,
                    Value::Number(n) if n.is_nan() => continue,
                    _ => {}
                }
                table.raw_set(key, from_variant(lua, item)?)?;
            }
            Value::Table(table)
        }
        value @ Variant::Unknown(_) => {
            return Err(BridgeError::Unconvertible(value.type_name().to_string()));
        }
        Variant::Other(kind) => {
            tracing::warn!(kind, "unsupported variant kind, using nil");
            Value::Nil
        }
    };
    Ok(converted)
}

fn date_to_lua(lua: &Lua, days: f64) -> BridgeResult<Value> {
    let as_tables = lua
        .app_data_ref::<BridgeOptions>()
        .map_or(true, |options| options.dates_as_tables);
    let fields = match DateFields::from_ole(days) {
        Some(fields) if as_tables => fields,
        _ => return Ok(Value::Number(days)),
    };
    let table = lua.create_table_with_capacity(0, 6)?;
    table.raw_set("year", fields.year)?;
    table.raw_set("month", fields.month)?;
    table.raw_set("day", fields.day)?;
    table.raw_set("hour", fields.hour)?;
    table.raw_set("min", fields.min)?;
    table.raw_set("sec", fields.sec)?;
    Ok(Value::Table(table))
}

// ============================================================================
// Typed integers
// ============================================================================

/// An exactly typed integer made by `to_ole_integer`, passed through as-is
#[derive(Debug, Clone)]
pub struct TypedValue(Variant);

impl TypedValue {
    /// The stored value
    pub fn variant(&self) -> &Variant {
        &self.0
    }
}

impl UserData for TypedValue {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            let text = match this.0 {
                Variant::UI8(v) => v.to_string(),
                ref other => other.as_i64().map(|v| v.to_string()).unwrap_or_default(),
            };
            Ok(format!("luaole.{}: {}", this.0.type_name(), text))
        });
    }
}

/// Coerce a Lua number into the integer kind named by `kind` (default `i4`)
pub fn to_ole_integer(value: &Value, kind: Option<&str>) -> BridgeResult<TypedValue> {
    let number: i128 = match value {
        Value::Integer(i) => (*i).into(),
        Value::Number(n) if n.is_finite() => n.trunc() as i128,
        Value::Number(n) => {
            return Err(BridgeError::Coercion(format!("{} is not a finite number", n)))
        }
        other => {
            return Err(BridgeError::Coercion(format!(
                "number expected, got {}",
                other.type_name()
            )))
        }
    };
    let kind = kind.unwrap_or("i4");
    let out_of_range = || BridgeError::Coercion(format!("{} is out of range for {}", number, kind));
    let variant = match kind {
        "i1" => Variant::I1(i8::try_from(number).map_err(|_| out_of_range())?),
        "i2" => Variant::I2(i16::try_from(number).map_err(|_| out_of_range())?),
        "i4" => Variant::I4(i32::try_from(number).map_err(|_| out_of_range())?),
        "i8" => Variant::I8(i64::try_from(number).map_err(|_| out_of_range())?),
        "ui1" => Variant::UI1(u8::try_from(number).map_err(|_| out_of_range())?),
        "ui2" => Variant::UI2(u16::try_from(number).map_err(|_| out_of_range())?),
        "ui4" => Variant::UI4(u32::try_from(number).map_err(|_| out_of_range())?),
        "ui8" => Variant::UI8(u64::try_from(number).map_err(|_| out_of_range())?),
        other => {
            return Err(BridgeError::Coercion(format!(
                "unknown integer kind: {}",
                other
            )))
        }
    };
    Ok(TypedValue(variant))
}
