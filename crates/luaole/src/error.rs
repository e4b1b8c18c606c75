//! Bridge error types and the script-level error convention
//!
//! Native entry points report ordinary failures to scripts as the pair
//! `(nil, message)`. Only fatal errors (unconvertible foreign values and
//! failures of the Lua state itself) are raised.

use luaole_sdk::DispatchError;
use mlua::{Lua, Value};
use thiserror::Error;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors produced by the bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A value in a required position is not a foreign object
    #[error("{0}: not an object")]
    NotAnObject(String),

    /// A member name argument is not a string
    #[error("{0}: member name must be a string")]
    NotAMemberName(String),

    /// Wrong script value kind in a required position
    #[error("{context}: {expected} expected, got {got}")]
    BadArgument {
        /// Operation that received the argument
        context: String,
        /// Expected value kind
        expected: &'static str,
        /// Actual value kind
        got: String,
    },

    /// The handle was released, or no handle was supplied
    #[error("{0}: no receiver")]
    NoReceiver(String),

    /// A detached member was called without an explicit receiver
    #[error("{0}: receiver is not found")]
    ReceiverNotFound(String),

    /// The foreign system rejected a call, get or put
    #[error("{op}({name}): {source}")]
    Foreign {
        /// Operation kind (`call`, `get`, `put`, `iter`)
        op: &'static str,
        /// Member name
        name: String,
        /// Foreign diagnostic
        source: DispatchError,
    },

    /// A script value cannot be passed to the foreign system
    #[error("unsupported argument type: {0}")]
    UnsupportedArgument(String),

    /// A foreign value cannot be represented in the script runtime
    #[error("unconvertible foreign value of kind {0}")]
    Unconvertible(String),

    /// Object creation failed
    #[error("create_object({class}): {source}")]
    Activation {
        /// Requested class name
        class: String,
        /// Foreign diagnostic
        source: DispatchError,
    },

    /// Typed integer coercion failed
    #[error("to_ole_integer: {0}")]
    Coercion(String),

    /// The Lua state reported an error
    #[error(transparent)]
    Lua(#[from] mlua::Error),
}

impl BridgeError {
    /// Fatal errors abort the running chunk instead of being returned
    pub fn is_fatal(&self) -> bool {
        matches!(self, BridgeError::Unconvertible(_) | BridgeError::Lua(_))
    }
}

impl From<BridgeError> for mlua::Error {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Lua(e) => e,
            other => mlua::Error::external(other),
        }
    }
}

/// Convert an outcome into the `(value, nil)` / `(nil, message)` pair.
pub(crate) fn two_value(lua: &Lua, result: BridgeResult<Value>) -> mlua::Result<(Value, Value)> {
    match result {
        Ok(value) => Ok((value, Value::Nil)),
        Err(err) if err.is_fatal() => Err(err.into()),
        Err(err) => {
            tracing::debug!(error = %err, "returning failure to script");
            let message = lua.create_string(err.to_string())?;
            Ok((Value::Nil, Value::String(message)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_receiver_message() {
        let err = BridgeError::NoReceiver("_release".to_string());
        assert_eq!(err.to_string(), "_release: no receiver");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_foreign_message_names_member() {
        let err = BridgeError::Foreign {
            op: "call",
            name: "Quit".to_string(),
            source: DispatchError::UnknownName("Quit".to_string()),
        };
        assert_eq!(err.to_string(), "call(Quit): unknown name: Quit");
    }

    #[test]
    fn test_two_value_convention() {
        let lua = Lua::new();
        let (value, message) =
            two_value(&lua, Err(BridgeError::ReceiverNotFound("Name".into()))).unwrap();
        assert!(value.is_nil());
        let message = message.as_string().unwrap().to_str().unwrap().to_string();
        assert_eq!(message, "Name: receiver is not found");

        let (value, message) = two_value(&lua, Ok(Value::Integer(3))).unwrap();
        assert_eq!(value.as_integer(), Some(3));
        assert!(message.is_nil());
    }

    #[test]
    fn test_unconvertible_is_raised() {
        let lua = Lua::new();
        let result = two_value(&lua, Err(BridgeError::Unconvertible("unknown".into())));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("unconvertible"));
    }
}
