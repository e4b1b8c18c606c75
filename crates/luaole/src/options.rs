//! Bridge configuration

/// Options applied when the bridge is installed into a Lua state.
///
/// Stored as Lua app data, so every trap handler of that state sees the same
/// values.
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Global name of the object factory entry point
    pub create_object_name: String,
    /// Global name of the typed integer coercion helper
    pub to_integer_name: String,
    /// Convert automation dates to `{year, month, day, hour, min, sec}`
    /// tables. When off, or when a date is out of range, the raw day count
    /// is returned as a number.
    pub dates_as_tables: bool,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            create_object_name: "create_object".to_string(),
            to_integer_name: "to_ole_integer".to_string(),
            dates_as_tables: true,
        }
    }
}
