//! Well-known protocol string constants.

/// Interface implemented by objects that can describe themselves as
/// introspection XML. Callers doing interface auto-discovery issue their
/// `Introspect` call against this name.
pub const INTROSPECTABLE_INTERFACE: &str = "org.freedesktop.DBus.Introspectable";

/// Interface carrying the standard `Get`/`Set`/`GetAll` property methods
/// and the `PropertiesChanged` signal.
pub const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";
