//! Live Handle - the sole owner of one foreign reference inside Lua
//!
//! A [`LiveHandle`] wraps exactly one [`ObjectRef`]. The reference lives in a
//! shared capsule that can be emptied: explicit `_release` empties it, and
//! when the last Lua userdata (or anchoring proxy) holding the capsule is
//! collected the capsule is dropped. Both paths drop the same `ObjectRef`,
//! so a reference is released at most once.
//!
//! ```text
//! userdata ──Rc──► Capsule { object: Option<ObjectRef> } ◄──Weak── BoundMember
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use luaole_sdk::{ObjectRef, Variant};
use mlua::{MetaMethod, UserData, UserDataMethods, Value};

use crate::error::{BridgeError, BridgeResult};
use crate::marshal;
use crate::resolver::{self, Resolution};

/// Prefix of every handle's `__tostring` text
pub const HANDLE_TAG: &str = "luaole.object";

struct Capsule {
    object: RefCell<Option<ObjectRef>>,
}

impl Drop for Capsule {
    fn drop(&mut self) {
        if let Some(object) = self.object.get_mut().take() {
            tracing::debug!(
                type_name = object.type_name().as_deref().unwrap_or("?"),
                "finalizing live handle"
            );
        }
    }
}

/// Owner of one foreign reference.
///
/// Clones share the same capsule, so releasing through any clone releases
/// the single underlying reference.
#[derive(Clone)]
pub struct LiveHandle {
    capsule: Rc<Capsule>,
}

impl LiveHandle {
    /// Take ownership of a freshly obtained reference
    pub fn new(object: ObjectRef) -> Self {
        tracing::debug!(
            type_name = object.type_name().as_deref().unwrap_or("?"),
            "new live handle"
        );
        Self {
            capsule: Rc::new(Capsule {
                object: RefCell::new(Some(object)),
            }),
        }
    }

    /// Borrow the owned reference for one foreign call.
    ///
    /// `context` names the operation in the "no receiver" error.
    pub fn receiver(&self, context: &str) -> BridgeResult<ObjectRef> {
        self.capsule
            .object
            .borrow()
            .clone()
            .ok_or_else(|| BridgeError::NoReceiver(context.to_string()))
    }

    /// Release the owned reference. A second release is an error.
    pub fn release(&self) -> BridgeResult<()> {
        let object = self
            .capsule
            .object
            .borrow_mut()
            .take()
            .ok_or_else(|| BridgeError::NoReceiver("_release".to_string()))?;
        tracing::debug!(
            type_name = object.type_name().as_deref().unwrap_or("?"),
            "released live handle"
        );
        drop(object);
        Ok(())
    }

    /// Whether the reference has been released
    pub fn is_released(&self) -> bool {
        self.capsule.object.borrow().is_none()
    }

    /// Non-owning reference to this handle
    pub fn back_ref(&self) -> BackRef {
        BackRef(Rc::downgrade(&self.capsule))
    }

    /// Whether `other` shares this handle's capsule
    pub fn same_as(&self, other: &LiveHandle) -> bool {
        Rc::ptr_eq(&self.capsule, &other.capsule)
    }

    /// Write a property of the owned object
    pub fn set_property(&self, name: &str, value: Variant) -> BridgeResult<()> {
        let object = self.receiver(name)?;
        resolver::put_property(&object, name, &[value])
    }

    /// Diagnostic text used by `__tostring`
    pub fn describe(&self) -> String {
        match self.capsule.object.borrow().as_ref() {
            None => format!("{}: released", HANDLE_TAG),
            Some(object) => match object.type_name() {
                Some(name) => format!("{}: {}", HANDLE_TAG, name),
                None => HANDLE_TAG.to_string(),
            },
        }
    }
}

impl fmt::Debug for LiveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Weak back-reference from a bound member to its owning handle
#[derive(Clone)]
pub struct BackRef(Weak<Capsule>);

impl BackRef {
    /// The owning handle, if its capsule is still alive
    pub fn upgrade(&self) -> Option<LiveHandle> {
        self.0.upgrade().map(|capsule| LiveHandle { capsule })
    }
}

/// Extract a member name from a trap key
pub(crate) fn member_name(key: &Value, context: &str) -> BridgeResult<String> {
    match key {
        Value::String(s) => Ok(s.to_string_lossy().into()),
        _ => Err(BridgeError::NotAMemberName(context.to_string())),
    }
}

impl UserData for LiveHandle {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: Value| {
            let resolution = match member_name(&key, "__index") {
                Ok(name) => resolver::resolve(this, &name),
                Err(_) => Resolution::Value(Variant::Empty),
            };
            resolver::into_lua(lua, resolution)
        });

        methods.add_meta_method(
            MetaMethod::NewIndex,
            |_, this, (key, value): (Value, Value)| {
                let name = member_name(&key, "__newindex")?;
                let value = marshal::to_variant(&value)?;
                this.set_property(&name, value)?;
                Ok(())
            },
        );

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| Ok(this.describe()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use luaole_sdk::stub::StubSystem;

    #[test]
    fn test_release_twice_reports_no_receiver() {
        let system = StubSystem::new();
        let handle = LiveHandle::new(system.object("Thing").reference());
        assert!(handle.release().is_ok());
        assert!(handle.is_released());
        let err = handle.release().unwrap_err();
        assert!(err.to_string().contains("no receiver"));
        assert_eq!(system.ledger().released(), 1);
    }

    #[test]
    fn test_drop_releases_once() {
        let system = StubSystem::new();
        let handle = LiveHandle::new(system.object("Thing").reference());
        let clone = handle.clone();
        drop(handle);
        assert_eq!(system.ledger().outstanding(), 1);
        drop(clone);
        assert_eq!(system.ledger().outstanding(), 0);
        assert_eq!(system.ledger().released(), 1);
    }

    #[test]
    fn test_drop_after_release_is_silent() {
        let system = StubSystem::new();
        let handle = LiveHandle::new(system.object("Thing").reference());
        handle.release().unwrap();
        drop(handle);
        assert_eq!(system.ledger().released(), 1);
    }

    #[test]
    fn test_back_ref_does_not_keep_handle_alive() {
        let system = StubSystem::new();
        let handle = LiveHandle::new(system.object("Thing").reference());
        let back = handle.back_ref();
        assert!(back.upgrade().is_some_and(|h| h.same_as(&handle)));
        drop(handle);
        assert!(back.upgrade().is_none());
        assert_eq!(system.ledger().outstanding(), 0);
    }

    #[test]
    fn test_set_property_after_release() {
        let system = StubSystem::new();
        let obj = system.object("Thing");
        obj.set_property("Visible", false);
        let handle = LiveHandle::new(obj.reference());
        handle.set_property("Visible", Variant::Bool(true)).unwrap();
        assert!(matches!(obj.property("Visible"), Some(Variant::Bool(true))));

        handle.release().unwrap();
        let err = handle.set_property("Visible", Variant::Bool(false)).unwrap_err();
        assert_eq!(err.to_string(), "Visible: no receiver");
    }

    #[test]
    fn test_describe() {
        let system = StubSystem::new();
        let handle = LiveHandle::new(system.object("Folder").reference());
        assert_eq!(handle.describe(), "luaole.object: Folder");
        handle.release().unwrap();
        assert_eq!(handle.describe(), "luaole.object: released");
    }

    #[test]
    fn test_debug_matches_describe() {
        let system = StubSystem::new();
        let handle = LiveHandle::new(system.object("Folder").reference());
        assert_eq!(format!("{:?}", handle), "luaole.object: Folder");
        let result: BridgeResult<LiveHandle> = Ok(handle.clone());
        assert_eq!(format!("{:?}", result), "Ok(luaole.object: Folder)");
    }
}
