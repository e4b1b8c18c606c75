//! Dispatch traits - the foreign object system as seen by the bridge
//!
//! A backend (a COM runtime, an in-process automation host, the in-memory
//! [`stub`](crate::stub) system) implements these traits. The bridge only
//! ever talks to foreign objects through them and never depends on backend
//! internals.
//!
//! # Reference counting
//!
//! An [`ObjectRef`] is one counted reference. Cloning it takes another count
//! and dropping it is the release primitive, so ownership rules follow plain
//! Rust ownership.

use std::rc::Rc;

use crate::error::DispatchResult;
use crate::variant::Variant;

/// One counted reference to a foreign object with dynamic invocation.
pub type ObjectRef = Rc<dyn Dispatch>;

/// Dynamic invocation interface of a foreign object.
///
/// Members are resolved by name at call time. Positional arguments are passed
/// in script order; backends that need reverse order (COM `DISPPARAMS`)
/// reverse them internally.
pub trait Dispatch {
    /// Invoke a method by name
    fn call_method(&self, name: &str, args: &[Variant]) -> DispatchResult<Variant>;

    /// Read a property by name. `args` carries index arguments for
    /// parameterized properties and is empty otherwise.
    fn get_property(&self, name: &str, args: &[Variant]) -> DispatchResult<Variant>;

    /// Write a property by name. The last element of `args` is the new value,
    /// any preceding elements are index arguments.
    fn put_property(&self, name: &str, args: &[Variant]) -> DispatchResult<()>;

    /// Obtain an enumerator over the object's items (`_NewEnum`)
    fn new_enum(&self) -> DispatchResult<Box<dyn Enumerator>> {
        Err(crate::DispatchError::NotEnumerable)
    }

    /// Name of the object's type for diagnostics, if the backend knows it
    fn type_name(&self) -> Option<String> {
        None
    }
}

/// Forward-only cursor over a foreign collection.
pub trait Enumerator {
    /// Fetch the next item, `None` once the collection is exhausted
    fn next_item(&mut self) -> DispatchResult<Option<Variant>>;
}

/// A raw foreign reference before it has been queried for [`Dispatch`].
pub trait Unknown {
    /// Query the object for its dynamic invocation interface.
    ///
    /// The returned reference is independent of `self` and owns its own count.
    fn query_dispatch(&self) -> DispatchResult<ObjectRef>;
}

/// Activation side of the foreign object system.
pub trait ObjectSystem {
    /// Prepare the calling environment. Called once before the first
    /// activation.
    fn initialize(&self) -> DispatchResult<()>;

    /// Create a new instance of the class registered under `class_name`
    fn create_instance(&self, class_name: &str) -> DispatchResult<Rc<dyn Unknown>>;
}

/// Enumerator over an already materialized list of items.
pub struct VecEnumerator {
    items: std::vec::IntoIter<Variant>,
}

impl VecEnumerator {
    /// Create an enumerator that yields `items` in order
    pub fn new(items: Vec<Variant>) -> Self {
        Self {
            items: items.into_iter(),
        }
    }
}

impl Enumerator for VecEnumerator {
    fn next_item(&mut self) -> DispatchResult<Option<Variant>> {
        Ok(self.items.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DispatchError;

    struct Empty;

    impl Dispatch for Empty {
        fn call_method(&self, name: &str, _args: &[Variant]) -> DispatchResult<Variant> {
            Err(DispatchError::UnknownName(name.to_string()))
        }

        fn get_property(&self, name: &str, _args: &[Variant]) -> DispatchResult<Variant> {
            Err(DispatchError::UnknownName(name.to_string()))
        }

        fn put_property(&self, name: &str, _args: &[Variant]) -> DispatchResult<()> {
            Err(DispatchError::UnknownName(name.to_string()))
        }
    }

    #[test]
    fn test_default_enum_is_not_supported() {
        let obj = Empty;
        assert!(matches!(obj.new_enum(), Err(DispatchError::NotEnumerable)));
        assert!(obj.type_name().is_none());
    }

    #[test]
    fn test_vec_enumerator_yields_in_order() {
        let mut e = VecEnumerator::new(vec![Variant::I4(1), Variant::I4(2)]);
        assert!(matches!(e.next_item(), Ok(Some(Variant::I4(1)))));
        assert!(matches!(e.next_item(), Ok(Some(Variant::I4(2)))));
        assert!(matches!(e.next_item(), Ok(None)));
    }
}
