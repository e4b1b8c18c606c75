//! Bound-Member Proxy
//!
//! Indexing a handle with an ordinary name yields a [`BoundMember`] instead of
//! touching the foreign object. The proxy only acts when it is used:
//!
//! - called: one foreign method call by its name
//! - indexed by a name: one property read by its name, then resolution of the
//!   next name against the result (`a.b.c`)
//! - indexed by any other key: one indexed property read, `name(key)`
//! - assigned through: one property read, then a property write on the result
//!
//! A proxy never owns the reference it targets. It holds a weak
//! [`BackRef`] to the handle it was resolved from, except for proxies made
//! in the middle of a chain, which anchor the temporary handle they read.

use luaole_sdk::{ObjectRef, Variant};
use mlua::{AnyUserData, Lua, MetaMethod, UserData, UserDataMethods, Value, Variadic};

use crate::error::{two_value, BridgeError, BridgeResult};
use crate::handle::{member_name, BackRef, LiveHandle};
use crate::marshal;
use crate::resolver::{self, Resolution};

/// Where a bound member looks for its receiver
#[derive(Clone)]
enum Owner {
    /// Resolved directly on a script-visible handle
    Borrowed(BackRef),
    /// Resolved on a chain intermediate that nothing else holds
    Anchored(LiveHandle),
}

/// A named, not yet resolved member of a foreign object
#[derive(Clone)]
pub struct BoundMember {
    name: String,
    owner: Option<Owner>,
}

impl BoundMember {
    /// Member of a script-visible handle
    pub fn borrowed(name: impl Into<String>, handle: &LiveHandle) -> Self {
        Self {
            name: name.into(),
            owner: Some(Owner::Borrowed(handle.back_ref())),
        }
    }

    /// Member of a chain intermediate; the proxy keeps `handle` alive
    pub fn anchored(name: impl Into<String>, handle: LiveHandle) -> Self {
        Self {
            name: name.into(),
            owner: Some(Owner::Anchored(handle)),
        }
    }

    /// Member without a receiver; it can only be called with an explicit one
    pub fn detached(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: None,
        }
    }

    /// Member name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the proxy has a captured receiver
    pub fn is_detached(&self) -> bool {
        self.owner.is_none()
    }

    /// Pick the receiver of a foreign call.
    ///
    /// An explicit handle wins over the captured back-reference.
    pub fn target(&self, explicit: Option<&LiveHandle>) -> BridgeResult<ObjectRef> {
        if let Some(handle) = explicit {
            return handle.receiver(&self.name);
        }
        match &self.owner {
            Some(Owner::Borrowed(back)) => back
                .upgrade()
                .ok_or_else(|| BridgeError::NoReceiver(self.name.clone()))?
                .receiver(&self.name),
            Some(Owner::Anchored(handle)) => handle.receiver(&self.name),
            None => Err(BridgeError::ReceiverNotFound(self.name.clone())),
        }
    }

    /// Read the member as a property of the captured receiver
    pub fn fetch(&self, index: &[Variant]) -> BridgeResult<Variant> {
        let object = self.target(None)?;
        resolver::get_property(&object, &self.name, index)
    }

    /// Call the member as a method
    pub fn invoke(&self, explicit: Option<&LiveHandle>, args: &[Variant]) -> BridgeResult<Variant> {
        let object = self.target(explicit)?;
        resolver::call_method(&object, &self.name, args)
    }

    /// One chain step: read this member, then resolve `next` on the result
    pub fn chain(&self, next: &str) -> BridgeResult<Resolution> {
        let value = self.fetch(&[])?;
        Ok(resolver::step(value, next))
    }

    /// Assignment through the proxy: read this member, then write `next`
    pub fn chain_assign(&self, next: &str, value: Variant) -> BridgeResult<()> {
        match self.fetch(&[])? {
            Variant::Dispatch(object) => {
                let intermediate = LiveHandle::new(object);
                intermediate.set_property(next, value)
            }
            _ => Err(BridgeError::NotAnObject(self.name.clone())),
        }
    }

    fn describe(&self) -> String {
        match &self.owner {
            None => format!("luaole.member: {} (detached)", self.name),
            Some(_) => format!("luaole.member: {}", self.name),
        }
    }
}

/// Split a proxy call's arguments into an explicit receiver and positionals.
///
/// `obj:Method(a)` passes the handle first, `obj.A:Method(a)` passes the
/// proxy `obj.A` first. Any other first value is a positional argument.
pub(crate) fn split_receiver(args: &[Value]) -> BridgeResult<(Option<LiveHandle>, &[Value])> {
    match args.first() {
        Some(Value::UserData(ud)) if ud.is::<LiveHandle>() => {
            let handle = (*ud.borrow::<LiveHandle>()?).clone();
            Ok((Some(handle), &args[1..]))
        }
        Some(Value::UserData(ud)) if is_member(ud) => Ok((None, &args[1..])),
        _ => Ok((None, args)),
    }
}

fn call(lua: &Lua, this: &BoundMember, args: &[Value]) -> BridgeResult<Value> {
    let (explicit, rest) = split_receiver(args)?;
    let args = marshal::to_variants(rest)?;
    let result = this.invoke(explicit.as_ref(), &args)?;
    marshal::from_variant(lua, result)
}

fn index(lua: &Lua, this: &BoundMember, key: Value) -> mlua::Result<Value> {
    match key {
        Value::String(s) => {
            let next: String = s.to_string_lossy().into();
            let resolution = this.chain(&next)?;
            resolver::into_lua(lua, resolution)
        }
        Value::Nil => Ok(Value::Nil),
        other => {
            let index = marshal::to_variant(&other)?;
            let value = this.fetch(&[index])?;
            Ok(marshal::from_variant(lua, value)?)
        }
    }
}

impl UserData for BoundMember {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: Value| {
            index(lua, this, key)
        });

        methods.add_meta_method(
            MetaMethod::NewIndex,
            |_, this, (key, value): (Value, Value)| {
                let next = member_name(&key, &this.name)?;
                let value = marshal::to_variant(&value)?;
                this.chain_assign(&next, value)?;
                Ok(())
            },
        );

        methods.add_meta_method(MetaMethod::Call, |lua, this, args: Variadic<Value>| {
            two_value(lua, call(lua, this, &args))
        });

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| Ok(this.describe()));
    }
}

fn is_member(ud: &AnyUserData) -> bool {
    ud.is::<BoundMember>()
}
