//! Variant - the foreign system's self-describing value
//!
//! Every argument and result crossing the dispatch boundary is a [`Variant`].
//! Kind codes follow the automation `VARTYPE` numbering so backends can map
//! them one to one.
//!
//! # Kinds
//!
//! ```text
//! Empty     0        I1      16       R4     4        Dispatch 9
//! Null      1        UI1     17       R8     5        Unknown  13
//! I2        2        UI2     18       Date   7        Array    0x200C
//! I4        3        UI4     19       Str    8        Bytes    0x2011
//! I8        20       UI8     21       Bool   11       Map      36
//! ```

use std::fmt;
use std::rc::Rc;

use crate::dispatch::{ObjectRef, Unknown};

/// Kind code of a [`Variant`] (automation `VARTYPE` numbering)
pub type VarKind = u16;

/// `VT_EMPTY`
pub const VT_EMPTY: VarKind = 0;
/// `VT_NULL`
pub const VT_NULL: VarKind = 1;
/// `VT_I2`
pub const VT_I2: VarKind = 2;
/// `VT_I4`
pub const VT_I4: VarKind = 3;
/// `VT_R4`
pub const VT_R4: VarKind = 4;
/// `VT_R8`
pub const VT_R8: VarKind = 5;
/// `VT_DATE`
pub const VT_DATE: VarKind = 7;
/// `VT_BSTR`
pub const VT_BSTR: VarKind = 8;
/// `VT_DISPATCH`
pub const VT_DISPATCH: VarKind = 9;
/// `VT_BOOL`
pub const VT_BOOL: VarKind = 11;
/// `VT_VARIANT`
pub const VT_VARIANT: VarKind = 12;
/// `VT_UNKNOWN`
pub const VT_UNKNOWN: VarKind = 13;
/// `VT_I1`
pub const VT_I1: VarKind = 16;
/// `VT_UI1`
pub const VT_UI1: VarKind = 17;
/// `VT_UI2`
pub const VT_UI2: VarKind = 18;
/// `VT_UI4`
pub const VT_UI4: VarKind = 19;
/// `VT_I8`
pub const VT_I8: VarKind = 20;
/// `VT_UI8`
pub const VT_UI8: VarKind = 21;
/// `VT_RECORD`
pub const VT_RECORD: VarKind = 36;
/// `VT_ARRAY` flag
pub const VT_ARRAY: VarKind = 0x2000;

/// Tagged union exchanged with foreign objects.
#[derive(Clone)]
pub enum Variant {
    /// No value
    Empty,
    /// Explicit null
    Null,
    /// Boolean
    Bool(bool),
    /// Signed 8-bit integer
    I1(i8),
    /// Signed 16-bit integer
    I2(i16),
    /// Signed 32-bit integer
    I4(i32),
    /// Signed 64-bit integer
    I8(i64),
    /// Unsigned 8-bit integer
    UI1(u8),
    /// Unsigned 16-bit integer
    UI2(u16),
    /// Unsigned 32-bit integer
    UI4(u32),
    /// Unsigned 64-bit integer
    UI8(u64),
    /// 32-bit float
    R4(f32),
    /// 64-bit float
    R8(f64),
    /// Automation date: days since 1899-12-30, time of day in the fraction
    Date(f64),
    /// String
    Str(String),
    /// Array of raw 8-bit elements
    Bytes(Vec<u8>),
    /// Object with dynamic invocation
    Dispatch(ObjectRef),
    /// Foreign reference without dynamic invocation
    Unknown(Rc<dyn Unknown>),
    /// Sequence of values
    Array(Vec<Variant>),
    /// Key/value pairs
    Map(Vec<(Variant, Variant)>),
    /// A kind code this crate does not model
    Other(VarKind),
}

impl Variant {
    /// Kind code of this value
    pub fn kind(&self) -> VarKind {
        match self {
            Variant::Empty => VT_EMPTY,
            Variant::Null => VT_NULL,
            Variant::Bool(_) => VT_BOOL,
            Variant::I1(_) => VT_I1,
            Variant::I2(_) => VT_I2,
            Variant::I4(_) => VT_I4,
            Variant::I8(_) => VT_I8,
            Variant::UI1(_) => VT_UI1,
            Variant::UI2(_) => VT_UI2,
            Variant::UI4(_) => VT_UI4,
            Variant::UI8(_) => VT_UI8,
            Variant::R4(_) => VT_R4,
            Variant::R8(_) => VT_R8,
            Variant::Date(_) => VT_DATE,
            Variant::Str(_) => VT_BSTR,
            Variant::Bytes(_) => VT_ARRAY | VT_UI1,
            Variant::Dispatch(_) => VT_DISPATCH,
            Variant::Unknown(_) => VT_UNKNOWN,
            Variant::Array(_) => VT_ARRAY | VT_VARIANT,
            Variant::Map(_) => VT_RECORD,
            Variant::Other(kind) => *kind,
        }
    }

    /// Get type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Variant::Empty => "empty",
            Variant::Null => "null",
            Variant::Bool(_) => "bool",
            Variant::I1(_) => "i1",
            Variant::I2(_) => "i2",
            Variant::I4(_) => "i4",
            Variant::I8(_) => "i8",
            Variant::UI1(_) => "ui1",
            Variant::UI2(_) => "ui2",
            Variant::UI4(_) => "ui4",
            Variant::UI8(_) => "ui8",
            Variant::R4(_) => "r4",
            Variant::R8(_) => "r8",
            Variant::Date(_) => "date",
            Variant::Str(_) => "string",
            Variant::Bytes(_) => "bytes",
            Variant::Dispatch(_) => "dispatch",
            Variant::Unknown(_) => "unknown",
            Variant::Array(_) => "array",
            Variant::Map(_) => "map",
            Variant::Other(_) => "unsupported",
        }
    }

    /// Check for `Empty` or `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Empty | Variant::Null)
    }

    /// Integer value of any integer kind, if it fits in `i64`
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Variant::I1(v) => Some(v as i64),
            Variant::I2(v) => Some(v as i64),
            Variant::I4(v) => Some(v as i64),
            Variant::I8(v) => Some(v),
            Variant::UI1(v) => Some(v as i64),
            Variant::UI2(v) => Some(v as i64),
            Variant::UI4(v) => Some(v as i64),
            Variant::UI8(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Numeric value of any integer or float kind
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Variant::R4(v) => Some(v as f64),
            Variant::R8(v) => Some(v),
            Variant::UI8(v) => Some(v as f64),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    /// Borrow the string payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the object payload
    pub fn as_dispatch(&self) -> Option<&ObjectRef> {
        match self {
            Variant::Dispatch(obj) => Some(obj),
            _ => None,
        }
    }
}

impl Default for Variant {
    fn default() -> Self {
        Variant::Empty
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Empty => write!(f, "Variant::Empty"),
            Variant::Null => write!(f, "Variant::Null"),
            Variant::Bool(v) => write!(f, "Variant::Bool({})", v),
            Variant::I1(v) => write!(f, "Variant::I1({})", v),
            Variant::I2(v) => write!(f, "Variant::I2({})", v),
            Variant::I4(v) => write!(f, "Variant::I4({})", v),
            Variant::I8(v) => write!(f, "Variant::I8({})", v),
            Variant::UI1(v) => write!(f, "Variant::UI1({})", v),
            Variant::UI2(v) => write!(f, "Variant::UI2({})", v),
            Variant::UI4(v) => write!(f, "Variant::UI4({})", v),
            Variant::UI8(v) => write!(f, "Variant::UI8({})", v),
            Variant::R4(v) => write!(f, "Variant::R4({})", v),
            Variant::R8(v) => write!(f, "Variant::R8({})", v),
            Variant::Date(v) => write!(f, "Variant::Date({})", v),
            Variant::Str(s) => write!(f, "Variant::Str({:?})", s),
            Variant::Bytes(b) => write!(f, "Variant::Bytes({} bytes)", b.len()),
            Variant::Dispatch(obj) => match obj.type_name() {
                Some(name) => write!(f, "Variant::Dispatch({})", name),
                None => write!(f, "Variant::Dispatch({:p})", Rc::as_ptr(obj)),
            },
            Variant::Unknown(obj) => write!(f, "Variant::Unknown({:p})", Rc::as_ptr(obj)),
            Variant::Array(items) => f.debug_tuple("Variant::Array").field(items).finish(),
            Variant::Map(pairs) => f.debug_tuple("Variant::Map").field(pairs).finish(),
            Variant::Other(kind) => write!(f, "Variant::Other({:#06x})", kind),
        }
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Variant::Bool(v)
    }
}

impl From<i32> for Variant {
    fn from(v: i32) -> Self {
        Variant::I4(v)
    }
}

impl From<i64> for Variant {
    fn from(v: i64) -> Self {
        Variant::I8(v)
    }
}

impl From<f64> for Variant {
    fn from(v: f64) -> Self {
        Variant::R8(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::Str(v.to_string())
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Variant::Str(v)
    }
}

impl From<ObjectRef> for Variant {
    fn from(v: ObjectRef) -> Self {
        Variant::Dispatch(v)
    }
}
