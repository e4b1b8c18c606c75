//! In-memory automation host
//!
//! A small [`ObjectSystem`] that keeps its objects in process. It is used by
//! the test suites and by embedders that want to expose Rust-side objects to
//! scripts through the same dispatch protocol as real foreign objects.
//!
//! Every reference handed out is counted in a shared [`Ledger`], so callers
//! can check that each acquired reference was released exactly once. Member
//! names are case-insensitive, as in automation.
//!
//! ```ignore
//! let system = StubSystem::new();
//! let app = system.object("Application");
//! app.set_property("Visible", false);
//! app.define_method("Quit", |_| Ok(Variant::Empty));
//! system.register_class("Stub.Application", app);
//! ```

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::dispatch::{Dispatch, Enumerator, ObjectRef, ObjectSystem, Unknown, VecEnumerator};
use crate::error::{DispatchError, DispatchResult};
use crate::variant::Variant;

/// Method or indexed-property implementation
pub type MemberFn = Box<dyn Fn(&[Variant]) -> DispatchResult<Variant>>;

// ============================================================================
// Ledger
// ============================================================================

/// Reference and lifecycle counters shared by every object of a system.
#[derive(Debug, Default)]
pub struct Ledger {
    acquired: Cell<usize>,
    released: Cell<usize>,
    initializations: Cell<usize>,
}

impl Ledger {
    /// References handed out so far
    pub fn acquired(&self) -> usize {
        self.acquired.get()
    }

    /// References released so far
    pub fn released(&self) -> usize {
        self.released.get()
    }

    /// References currently held by callers
    pub fn outstanding(&self) -> usize {
        self.acquired.get() - self.released.get()
    }

    /// Number of `initialize` calls
    pub fn initializations(&self) -> usize {
        self.initializations.get()
    }
}

// ============================================================================
// Invocation log
// ============================================================================

/// Kind of a recorded invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeKind {
    /// Method call
    Call,
    /// Property read
    Get,
    /// Property write
    Put,
}

/// One recorded invocation on a stub object
#[derive(Debug, Clone)]
pub struct Invocation {
    /// What kind of access this was
    pub kind: InvokeKind,
    /// Member name as spelled by the caller
    pub name: String,
    /// Arguments in script order
    pub args: Vec<Variant>,
}

// ============================================================================
// StubObject
// ============================================================================

enum Slot {
    Value(Variant),
    Object(Rc<StubObject>),
    Indexed(MemberFn),
}

/// An object living in a [`StubSystem`].
///
/// Configure it through the builder-style setters, then hand references to
/// callers with [`StubObject::reference`].
pub struct StubObject {
    type_name: String,
    ledger: Rc<Ledger>,
    properties: RefCell<HashMap<String, Slot>>,
    methods: RefCell<HashMap<String, MemberFn>>,
    items: RefCell<Vec<Slot>>,
    enumerable: Cell<bool>,
    log: RefCell<Vec<Invocation>>,
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl StubObject {
    /// Hand out a new counted reference to this object
    pub fn reference(self: &Rc<Self>) -> ObjectRef {
        self.ledger.acquired.set(self.ledger.acquired.get() + 1);
        Rc::new(StubRef {
            object: Rc::clone(self),
        })
    }

    /// Type name reported through [`Dispatch::type_name`]
    pub fn name(&self) -> &str {
        &self.type_name
    }

    /// Define or replace a plain property
    pub fn set_property(&self, name: &str, value: impl Into<Variant>) {
        self.properties
            .borrow_mut()
            .insert(key(name), Slot::Value(value.into()));
    }

    /// Define a property whose value is another stub object.
    ///
    /// Each read hands out a fresh reference.
    pub fn set_object(&self, name: &str, object: Rc<StubObject>) {
        self.properties
            .borrow_mut()
            .insert(key(name), Slot::Object(object));
    }

    /// Define a property computed from its index arguments
    pub fn define_indexed(
        &self,
        name: &str,
        getter: impl Fn(&[Variant]) -> DispatchResult<Variant> + 'static,
    ) {
        self.properties
            .borrow_mut()
            .insert(key(name), Slot::Indexed(Box::new(getter)));
    }

    /// Define or replace a method
    pub fn define_method(
        &self,
        name: &str,
        method: impl Fn(&[Variant]) -> DispatchResult<Variant> + 'static,
    ) {
        self.methods.borrow_mut().insert(key(name), Box::new(method));
    }

    /// Mark the object as a collection, even while it has no items
    pub fn set_enumerable(&self) {
        self.enumerable.set(true);
    }

    /// Append a plain value to the enumerable items
    pub fn push_item(&self, value: impl Into<Variant>) {
        self.enumerable.set(true);
        self.items.borrow_mut().push(Slot::Value(value.into()));
    }

    /// Append an object to the enumerable items
    pub fn push_object_item(&self, object: Rc<StubObject>) {
        self.enumerable.set(true);
        self.items.borrow_mut().push(Slot::Object(object));
    }

    /// Current value of a plain property, without logging an access
    pub fn property(&self, name: &str) -> Option<Variant> {
        match self.properties.borrow().get(&key(name)) {
            Some(Slot::Value(v)) => Some(v.clone()),
            _ => None,
        }
    }

    /// All invocations recorded so far
    pub fn invocations(&self) -> Vec<Invocation> {
        self.log.borrow().clone()
    }

    /// Number of recorded invocations of `kind` on `name`
    pub fn count(&self, kind: InvokeKind, name: &str) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|inv| inv.kind == kind && inv.name.eq_ignore_ascii_case(name))
            .count()
    }

    fn record(&self, kind: InvokeKind, name: &str, args: &[Variant]) {
        self.log.borrow_mut().push(Invocation {
            kind,
            name: name.to_string(),
            args: args.to_vec(),
        });
    }

    fn materialize(slot: &Slot, args: &[Variant]) -> DispatchResult<Variant> {
        match slot {
            Slot::Value(v) => Ok(v.clone()),
            Slot::Object(obj) => Ok(Variant::Dispatch(obj.reference())),
            Slot::Indexed(getter) => getter(args),
        }
    }
}

// A counted reference; dropping it is the release.
struct StubRef {
    object: Rc<StubObject>,
}

impl Drop for StubRef {
    fn drop(&mut self) {
        let ledger = &self.object.ledger;
        ledger.released.set(ledger.released.get() + 1);
    }
}

impl Dispatch for StubRef {
    fn call_method(&self, name: &str, args: &[Variant]) -> DispatchResult<Variant> {
        let obj = &self.object;
        obj.record(InvokeKind::Call, name, args);
        let methods = obj.methods.borrow();
        let method = methods
            .get(&key(name))
            .ok_or_else(|| DispatchError::UnknownName(name.to_string()))?;
        method(args)
    }

    fn get_property(&self, name: &str, args: &[Variant]) -> DispatchResult<Variant> {
        let obj = &self.object;
        obj.record(InvokeKind::Get, name, args);
        let properties = obj.properties.borrow();
        let slot = properties
            .get(&key(name))
            .ok_or_else(|| DispatchError::UnknownName(name.to_string()))?;
        if !args.is_empty() && !matches!(slot, Slot::Indexed(_)) {
            return Err(DispatchError::BadParamCount {
                expected: 0,
                got: args.len(),
            });
        }
        StubObject::materialize(slot, args)
    }

    fn put_property(&self, name: &str, args: &[Variant]) -> DispatchResult<()> {
        let obj = &self.object;
        obj.record(InvokeKind::Put, name, args);
        let value = match args {
            [value] => value.clone(),
            _ => {
                return Err(DispatchError::BadParamCount {
                    expected: 1,
                    got: args.len(),
                })
            }
        };
        let mut properties = obj.properties.borrow_mut();
        match properties.get(&key(name)) {
            Some(Slot::Value(_)) => {
                properties.insert(key(name), Slot::Value(value));
                Ok(())
            }
            Some(_) => Err(DispatchError::Exception {
                source_name: obj.type_name.clone(),
                description: format!("property {} is read-only", name),
            }),
            None => Err(DispatchError::UnknownName(name.to_string())),
        }
    }

    fn new_enum(&self) -> DispatchResult<Box<dyn Enumerator>> {
        if !self.object.enumerable.get() {
            return Err(DispatchError::NotEnumerable);
        }
        let values = self
            .object
            .items
            .borrow()
            .iter()
            .map(|slot| StubObject::materialize(slot, &[]))
            .collect::<DispatchResult<Vec<_>>>()?;
        Ok(Box::new(VecEnumerator::new(values)))
    }

    fn type_name(&self) -> Option<String> {
        Some(self.object.type_name.clone())
    }
}

// ============================================================================
// StubSystem
// ============================================================================

struct StubUnknown {
    object: Option<Rc<StubObject>>,
    class_name: String,
}

impl Unknown for StubUnknown {
    fn query_dispatch(&self) -> DispatchResult<ObjectRef> {
        match &self.object {
            Some(obj) => Ok(obj.reference()),
            None => Err(DispatchError::InterfaceNotSupported(format!(
                "{} does not implement IDispatch",
                self.class_name
            ))),
        }
    }
}

/// A foreign reference that only supports `Unknown`
pub fn opaque_unknown(class_name: &str) -> Rc<dyn Unknown> {
    Rc::new(StubUnknown {
        object: None,
        class_name: class_name.to_string(),
    })
}

/// In-memory [`ObjectSystem`] with a class registry.
pub struct StubSystem {
    ledger: Rc<Ledger>,
    classes: RefCell<HashMap<String, Option<Rc<StubObject>>>>,
    init_failure: Option<String>,
}

impl StubSystem {
    /// Create an empty system
    pub fn new() -> Self {
        Self {
            ledger: Rc::new(Ledger::default()),
            classes: RefCell::new(HashMap::new()),
            init_failure: None,
        }
    }

    /// Create a system whose `initialize` always fails with `message`
    pub fn failing_init(message: impl Into<String>) -> Self {
        Self {
            init_failure: Some(message.into()),
            ..Self::new()
        }
    }

    /// Create a new object belonging to this system
    pub fn object(&self, type_name: &str) -> Rc<StubObject> {
        Rc::new(StubObject {
            type_name: type_name.to_string(),
            ledger: Rc::clone(&self.ledger),
            properties: RefCell::new(HashMap::new()),
            methods: RefCell::new(HashMap::new()),
            items: RefCell::new(Vec::new()),
            enumerable: Cell::new(false),
            log: RefCell::new(Vec::new()),
        })
    }

    /// Register `object` as the instance served for `class_name`.
    ///
    /// Every activation hands out a new reference to the same object.
    pub fn register_class(&self, class_name: &str, object: Rc<StubObject>) {
        self.classes
            .borrow_mut()
            .insert(key(class_name), Some(object));
    }

    /// Register a class whose instances do not support dynamic invocation
    pub fn register_opaque_class(&self, class_name: &str) {
        self.classes.borrow_mut().insert(key(class_name), None);
    }

    /// The shared reference ledger
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }
}

impl Default for StubSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectSystem for StubSystem {
    fn initialize(&self) -> DispatchResult<()> {
        self.ledger
            .initializations
            .set(self.ledger.initializations.get() + 1);
        match &self.init_failure {
            Some(message) => Err(DispatchError::InitializationFailed(message.clone())),
            None => Ok(()),
        }
    }

    fn create_instance(&self, class_name: &str) -> DispatchResult<Rc<dyn Unknown>> {
        let classes = self.classes.borrow();
        let entry = classes
            .get(&key(class_name))
            .ok_or_else(|| DispatchError::ClassNotFound(class_name.to_string()))?;
        Ok(Rc::new(StubUnknown {
            object: entry.clone(),
            class_name: class_name.to_string(),
        }))
    }
}
