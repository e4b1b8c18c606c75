//! Dispatch Resolver
//!
//! Decides what a member name means on a handle or on a chain intermediate,
//! and performs the foreign calls once a decision has been acted on.
//!
//! # Resolution
//!
//! ```text
//! name ∈ {_call, _get, _set, _release, _iter}  → Operator
//! any other name on a live handle              → Member (weak back-reference)
//! any other name on a chain intermediate       → Member (anchored, or detached
//!                                                 when the value is not an object)
//! non-name key on a handle                     → Value (nil)
//! ```
//!
//! Operators take their receiver from their first argument, so
//! `obj:_release()` works and `obj._release()` reports "no receiver".
//! Operators resolved in the middle of a chain also carry the intermediate
//! handle they were resolved on.

use std::cell::RefCell;

use luaole_sdk::{Enumerator, ObjectRef, Variant};
use mlua::{Function, Lua, Value, Variadic};

use crate::error::{two_value, BridgeError, BridgeResult};
use crate::handle::LiveHandle;
use crate::marshal;
use crate::member::{split_receiver, BoundMember};

// ============================================================================
// Operators
// ============================================================================

/// Reserved low-level operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `_call(name, args...)`: method call by a computed name
    Call,
    /// `_get(name, index...)`: property read, with index arguments
    Get,
    /// `_set(name, index..., value)`: property write
    Set,
    /// `_release()`: deterministic release of the handle
    Release,
    /// `_iter()`: iterator over the object's collection
    Iter,
}

impl Operator {
    /// Look up a reserved operator name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "_call" => Some(Operator::Call),
            "_get" => Some(Operator::Get),
            "_set" => Some(Operator::Set),
            "_release" => Some(Operator::Release),
            "_iter" => Some(Operator::Iter),
            _ => None,
        }
    }

    /// Script-visible name
    pub fn name(self) -> &'static str {
        match self {
            Operator::Call => "_call",
            Operator::Get => "_get",
            Operator::Set => "_set",
            Operator::Release => "_release",
            Operator::Iter => "_iter",
        }
    }
}

/// Outcome of resolving one member name
pub enum Resolution {
    /// A reserved operator, bound to a chain intermediate when there is one
    Operator(Operator, Option<LiveHandle>),
    /// A deferred member
    Member(BoundMember),
    /// A terminal value
    Value(Variant),
}

/// Resolve `name` on a script-visible handle
pub fn resolve(handle: &LiveHandle, name: &str) -> Resolution {
    match Operator::from_name(name) {
        Some(op) => Resolution::Operator(op, None),
        None => Resolution::Member(BoundMember::borrowed(name, handle)),
    }
}

/// Resolve `name` on a value produced by a chain step.
///
/// An object value becomes a new handle that the resolution keeps alive.
pub fn step(value: Variant, name: &str) -> Resolution {
    let op = Operator::from_name(name);
    match value {
        Variant::Dispatch(object) => {
            let handle = LiveHandle::new(object);
            match op {
                Some(op) => Resolution::Operator(op, Some(handle)),
                None => Resolution::Member(BoundMember::anchored(name, handle)),
            }
        }
        _ => match op {
            Some(op) => Resolution::Operator(op, None),
            None => Resolution::Member(BoundMember::detached(name)),
        },
    }
}

/// Turn a resolution into a Lua value
pub fn into_lua(lua: &Lua, resolution: Resolution) -> mlua::Result<Value> {
    match resolution {
        Resolution::Operator(op, bound) => {
            Ok(Value::Function(operator_function(lua, op, bound)?))
        }
        Resolution::Member(member) => Ok(Value::UserData(lua.create_userdata(member)?)),
        Resolution::Value(value) => Ok(marshal::from_variant(lua, value)?),
    }
}

// ============================================================================
// Foreign invocation
// ============================================================================

/// Call a method, prefixing failures with the member name
pub fn call_method(object: &ObjectRef, name: &str, args: &[Variant]) -> BridgeResult<Variant> {
    tracing::trace!(member = name, args = args.len(), "call");
    object
        .call_method(name, args)
        .map_err(|source| BridgeError::Foreign {
            op: "call",
            name: name.to_string(),
            source,
        })
}

/// Read a property, forwarding index arguments
pub fn get_property(object: &ObjectRef, name: &str, index: &[Variant]) -> BridgeResult<Variant> {
    tracing::trace!(member = name, args = index.len(), "get");
    object
        .get_property(name, index)
        .map_err(|source| BridgeError::Foreign {
            op: "get",
            name: name.to_string(),
            source,
        })
}

/// Write a property; the last argument is the value
pub fn put_property(object: &ObjectRef, name: &str, args: &[Variant]) -> BridgeResult<()> {
    tracing::trace!(member = name, args = args.len(), "put");
    object
        .put_property(name, args)
        .map_err(|source| BridgeError::Foreign {
            op: "put",
            name: name.to_string(),
            source,
        })
}

// ============================================================================
// Operator functions
// ============================================================================

fn operator_function(lua: &Lua, op: Operator, bound: Option<LiveHandle>) -> mlua::Result<Function> {
    lua.create_function(move |lua, args: Variadic<Value>| {
        two_value(lua, run_operator(lua, op, bound.as_ref(), &args))
    })
}

fn run_operator(
    lua: &Lua,
    op: Operator,
    bound: Option<&LiveHandle>,
    args: &[Value],
) -> BridgeResult<Value> {
    let (explicit, rest) = split_receiver(args)?;
    let handle = explicit
        .or_else(|| bound.cloned())
        .ok_or_else(|| BridgeError::NoReceiver(op.name().to_string()))?;

    match op {
        Operator::Release => {
            handle.release()?;
            Ok(Value::Boolean(true))
        }
        Operator::Call => {
            let (name, rest) = operator_member(op, rest)?;
            let object = handle.receiver(op.name())?;
            let args = marshal::to_variants(rest)?;
            let result = call_method(&object, &name, &args)?;
            marshal::from_variant(lua, result)
        }
        Operator::Get => {
            let (name, rest) = operator_member(op, rest)?;
            let object = handle.receiver(op.name())?;
            let index = marshal::to_variants(rest)?;
            let result = get_property(&object, &name, &index)?;
            marshal::from_variant(lua, result)
        }
        Operator::Set => {
            let (name, rest) = operator_member(op, rest)?;
            if rest.is_empty() {
                return Err(BridgeError::BadArgument {
                    context: format!("_set({})", name),
                    expected: "value",
                    got: "no value".to_string(),
                });
            }
            let object = handle.receiver(op.name())?;
            let args = marshal::to_variants(rest)?;
            put_property(&object, &name, &args)?;
            Ok(Value::Boolean(true))
        }
        Operator::Iter => {
            let object = handle.receiver(op.name())?;
            let enumerator = object.new_enum().map_err(|source| BridgeError::Foreign {
                op: "iter",
                name: "_NewEnum".to_string(),
                source,
            })?;
            Ok(Value::Function(iterator_function(lua, enumerator)?))
        }
    }
}

fn operator_member(op: Operator, args: &[Value]) -> BridgeResult<(String, &[Value])> {
    match args.split_first() {
        Some((Value::String(s), rest)) => Ok((s.to_string_lossy().into(), rest)),
        _ => Err(BridgeError::NotAMemberName(op.name().to_string())),
    }
}

// Items are yielded until the enumerator is exhausted. A null item ends a
// generic `for` early, as Lua iterators have no other end marker.
fn iterator_function(lua: &Lua, enumerator: Box<dyn Enumerator>) -> mlua::Result<Function> {
    let enumerator = RefCell::new(enumerator);
    lua.create_function(move |lua, ()| {
        let item = enumerator
            .borrow_mut()
            .next_item()
            .map_err(|source| BridgeError::Foreign {
                op: "iter",
                name: "_NewEnum".to_string(),
                source,
            })?;
        match item {
            Some(value) => Ok(marshal::from_variant(lua, value)?),
            None => Ok(Value::Nil),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use luaole_sdk::stub::{InvokeKind, StubSystem};
    use luaole_sdk::DispatchError;

    #[test]
    fn test_operator_names() {
        for op in [
            Operator::Call,
            Operator::Get,
            Operator::Set,
            Operator::Release,
            Operator::Iter,
        ] {
            assert_eq!(Operator::from_name(op.name()), Some(op));
        }
        assert_eq!(Operator::from_name("Quit"), None);
        assert_eq!(Operator::from_name("_CALL"), None);
    }

    #[test]
    fn test_resolve_does_not_touch_object() {
        let system = StubSystem::new();
        let obj = system.object("App");
        let handle = LiveHandle::new(obj.reference());

        assert!(matches!(
            resolve(&handle, "_release"),
            Resolution::Operator(Operator::Release, None)
        ));
        match resolve(&handle, "Quit") {
            Resolution::Member(member) => {
                assert_eq!(member.name(), "Quit");
                assert!(!member.is_detached());
            }
            _ => panic!("expected a bound member"),
        }
        assert!(obj.invocations().is_empty());
    }

    #[test]
    fn test_step_on_object_anchors_new_handle() {
        let system = StubSystem::new();
        let child = system.object("Child");
        child.set_property("Size", 4);

        let resolution = step(Variant::Dispatch(child.reference()), "Size");
        assert_eq!(system.ledger().outstanding(), 1);
        match resolution {
            Resolution::Member(member) => {
                assert!(matches!(member.fetch(&[]), Ok(Variant::I4(4))));
            }
            _ => panic!("expected a bound member"),
        }
        assert_eq!(system.ledger().outstanding(), 0);
        assert_eq!(child.count(InvokeKind::Get, "Size"), 1);
    }

    #[test]
    fn test_step_on_plain_value_detaches() {
        match step(Variant::I4(3), "Foo") {
            Resolution::Member(member) => assert!(member.is_detached()),
            _ => panic!("expected a detached member"),
        }
        assert!(matches!(
            step(Variant::Null, "_get"),
            Resolution::Operator(Operator::Get, None)
        ));
    }

    #[test]
    fn test_foreign_errors_carry_operation_and_name() {
        let system = StubSystem::new();
        let object = system.object("App").reference();
        let err = call_method(&object, "Missing", &[]).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Foreign {
                op: "call",
                source: DispatchError::UnknownName(_),
                ..
            }
        ));
        let err = put_property(&object, "Missing", &[Variant::Null]).unwrap_err();
        assert_eq!(err.to_string(), "put(Missing): unknown name: Missing");
    }

    #[test]
    fn test_release_operator_needs_receiver() {
        let lua = Lua::new();
        let err = run_operator(&lua, Operator::Release, None, &[]).unwrap_err();
        assert_eq!(err.to_string(), "_release: no receiver");
    }

    #[test]
    fn test_bound_operator_uses_intermediate() {
        let lua = Lua::new();
        let system = StubSystem::new();
        let obj = system.object("App");
        obj.define_method("Quit", |_| Ok(Variant::Empty));
        let handle = LiveHandle::new(obj.reference());

        let name = Value::String(lua.create_string("Quit").unwrap());
        let result = run_operator(&lua, Operator::Call, Some(&handle), &[name]).unwrap();
        assert!(result.is_nil());
        assert_eq!(obj.count(InvokeKind::Call, "Quit"), 1);

        let result = run_operator(&lua, Operator::Release, Some(&handle), &[]).unwrap();
        assert_eq!(result.as_boolean(), Some(true));
        assert_eq!(system.ledger().outstanding(), 0);
    }
}
