//! Object Factory - class name to live handle

use std::rc::Rc;

use luaole_sdk::{DispatchError, ObjectSystem};
use once_cell::unsync::OnceCell;

use crate::error::{BridgeError, BridgeResult};
use crate::handle::LiveHandle;

/// Creates live handles by class name.
///
/// The object system's environment is initialized on the first `create`,
/// exactly once per factory. A failed initialization is remembered and
/// reported on every later call.
pub struct ObjectFactory {
    system: Rc<dyn ObjectSystem>,
    ready: OnceCell<Result<(), DispatchError>>,
}

impl ObjectFactory {
    /// Create a factory over `system`
    pub fn new(system: Rc<dyn ObjectSystem>) -> Self {
        Self {
            system,
            ready: OnceCell::new(),
        }
    }

    /// Whether initialization has been attempted
    pub fn is_initialized(&self) -> bool {
        self.ready.get().is_some()
    }

    /// Activate `class_name` and wrap the new object
    pub fn create(&self, class_name: &str) -> BridgeResult<LiveHandle> {
        let activation = |source: DispatchError| BridgeError::Activation {
            class: class_name.to_string(),
            source,
        };

        self.ready
            .get_or_init(|| {
                tracing::debug!("initializing object system");
                self.system.initialize()
            })
            .clone()
            .map_err(activation)?;

        let unknown = self.system.create_instance(class_name).map_err(activation)?;
        let object = unknown.query_dispatch().map_err(activation)?;
        tracing::debug!(class = class_name, "created object");
        Ok(LiveHandle::new(object))
    }
}
