//! luaole - drive automation objects from Lua
//!
//! This crate exposes objects of a foreign dynamic-invocation system
//! (anything implementing the [`luaole_sdk`] traits) to Lua scripts running
//! in an [`mlua::Lua`] state.
//!
//! # Script surface
//!
//! ```lua
//! local excel, err = create_object("Excel.Application")
//! excel.Visible = true                          -- property write
//! local book = excel.Workbooks:Add()            -- chain, then method call
//! book.Worksheets(1).Name = "data"              -- call result, then write
//! excel:_call("Quit")                           -- method by computed name
//! excel:_release()                              -- deterministic release
//! ```
//!
//! Every fallible entry point returns `(value, nil)` on success and
//! `(nil, message)` on failure. The metamethod traps return a single value,
//! so a failed chain step (`a.b.c`) or assignment (`a.b = v`) is raised
//! instead. Using a released handle reports an error containing
//! "no receiver".
//!
//! # Components
//!
//! - [`marshal`]: Lua values to [`Variant`](luaole_sdk::Variant)s and back
//! - [`handle`]: [`LiveHandle`], the single owner of a foreign reference
//! - [`member`]: [`BoundMember`], deferred `object.member` proxies
//! - [`resolver`]: reserved operators and member resolution
//! - [`factory`]: [`ObjectFactory`], activation by class name
//!
//! # Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use luaole::{install, BridgeOptions, ObjectFactory};
//! use luaole_sdk::stub::StubSystem;
//!
//! let lua = mlua::Lua::new();
//! let system = Rc::new(StubSystem::new());
//! install(&lua, ObjectFactory::new(system), BridgeOptions::default())?;
//! lua.load(r#"local obj = create_object("Stub.App")"#).exec()?;
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod factory;
pub mod handle;
pub mod marshal;
pub mod member;
pub mod options;
pub mod resolver;

pub use error::{BridgeError, BridgeResult};
pub use factory::ObjectFactory;
pub use handle::LiveHandle;
pub use marshal::TypedValue;
pub use member::BoundMember;
pub use options::BridgeOptions;
pub use resolver::{Operator, Resolution};

use mlua::{Lua, Value};

use crate::error::two_value;

/// Register the bridge entry points as globals of `lua`.
///
/// `factory` is owned by the registered `create_object` function for the
/// lifetime of the state. `options` is stored as app data and read by the
/// value conversions.
pub fn install(lua: &Lua, factory: ObjectFactory, options: BridgeOptions) -> mlua::Result<()> {
    let create_object = lua.create_function(move |lua, class: Value| {
        let result = match &class {
            Value::String(name) => factory
                .create(&name.to_str()?)
                .and_then(|handle| Ok(Value::UserData(lua.create_userdata(handle)?))),
            other => Err(BridgeError::BadArgument {
                context: "create_object".to_string(),
                expected: "class name string",
                got: other.type_name().to_string(),
            }),
        };
        two_value(lua, result)
    })?;

    let to_ole_integer = lua.create_function(|lua, (value, kind): (Value, Option<String>)| {
        let result = marshal::to_ole_integer(&value, kind.as_deref())
            .and_then(|typed| Ok(Value::UserData(lua.create_userdata(typed)?)));
        two_value(lua, result)
    })?;

    let globals = lua.globals();
    globals.set(options.create_object_name.as_str(), create_object)?;
    globals.set(options.to_integer_name.as_str(), to_ole_integer)?;
    tracing::debug!(
        create_object = %options.create_object_name,
        to_ole_integer = %options.to_integer_name,
        "installed luaole bridge"
    );
    lua.set_app_data(options);
    Ok(())
}
