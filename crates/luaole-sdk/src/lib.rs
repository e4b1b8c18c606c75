//! luaole SDK - the foreign object system interface
//!
//! This crate provides the types and traits a foreign object system has to
//! implement to be driven from scripts by the `luaole` bridge, without
//! depending on the scripting runtime.
//!
//! - [`Variant`]: the self-describing value exchanged with foreign objects
//! - [`Dispatch`]: call/get/put by name on a live foreign object
//! - [`Unknown`] and [`ObjectSystem`]: activation by class name
//! - [`DateFields`]: automation date decomposition
//! - [`stub`]: an in-memory object system with a reference ledger
//!
//! # Example
//!
//! ```ignore
//! use luaole_sdk::{stub::StubSystem, ObjectSystem, Variant};
//!
//! let system = StubSystem::new();
//! let app = system.object("Application");
//! app.define_method("Version", |_| Ok(Variant::from("1.0")));
//! system.register_class("Stub.Application", app);
//!
//! let obj = system.create_instance("Stub.Application")?.query_dispatch()?;
//! let version = obj.call_method("Version", &[])?;
//! ```

#![warn(missing_docs)]

pub mod date;
pub mod dispatch;
pub mod error;
pub mod stub;
pub mod variant;

pub use date::DateFields;
pub use dispatch::{Dispatch, Enumerator, ObjectRef, ObjectSystem, Unknown, VecEnumerator};
pub use error::{DispatchError, DispatchResult};
pub use variant::{VarKind, Variant};
