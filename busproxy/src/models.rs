use std::fmt::{Display, Formatter};
use thiserror::Error;
use zvariant::{ObjectPath, OwnedObjectPath};

/// Errors that can occur while building or using a proxy graph.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The given string is not a syntactically valid object path.
    #[error("invalid object path: {0:?}")]
    InvalidPath(String),

    /// An interface name was empty.
    #[error("interface name cannot be empty")]
    InvalidInterfaceName,

    /// A method with the same name already exists on the interface.
    #[error("method {0:?} already exists on this interface")]
    DuplicateMethod(String),

    /// A signal with the same name already exists on the interface.
    #[error("signal {0:?} already exists on this interface")]
    DuplicateSignal(String),

    /// A property with the same name already exists on the interface.
    #[error("property {0:?} already exists on this interface")]
    DuplicateProperty(String),

    /// The named property is not registered on the interface.
    #[error("no property named {0:?} on this interface")]
    UnknownProperty(String),

    /// An operation needed a default interface but none is set.
    #[error("no default interface is set")]
    NoDefaultInterface,

    /// A property was accessed before any value was cached for it.
    #[error("property {0:?} has no cached value")]
    NoCachedValue(String),

    /// A value did not match the statically requested type.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A blocking call did not receive a reply within its deadline.
    #[error("call timed out waiting for a reply")]
    Timeout,

    /// The remote peer answered with an explicit error reply.
    #[error("remote error {name}: {message}")]
    Remote {
        /// Peer-supplied error name, e.g. `org.freedesktop.DBus.Error.Failed`.
        name: String,
        /// Peer-supplied human-readable description.
        message: String,
    },

    /// The object proxy has no bus connection bound to it.
    #[error("no connection is bound to this object proxy")]
    NoConnection,

    /// The method or property is not attached to a live interface/object.
    #[error("proxy is not attached to an object")]
    Detached,

    /// A pending call completed without a reply (the connection dropped it).
    #[error("pending call completed without a reply")]
    NoReply,

    /// A value failed to convert at the protocol value layer.
    #[error("value conversion failed: {0}")]
    Variant(#[from] zvariant::Error),
}

/// What a property emits on the bus when its value is set locally.
///
/// Fixed at property creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyUpdateType {
    /// Setting the property emits the full new value.
    Updates,
    /// Setting the property emits a bare invalidation marker with no payload.
    Invalidates,
    /// Setting the property emits nothing. On a proxy this also marks the
    /// property read-only.
    DoesNotUpdate,
}

impl Display for PropertyUpdateType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Updates => write!(f, "updates value"),
            Self::Invalidates => write!(f, "invalidates value"),
            Self::DoesNotUpdate => write!(f, "does not update"),
        }
    }
}

/// Which side of the bus a property handle lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyRole {
    /// Remote-backed handle: `set_value` forwards to the remote object.
    Proxy,
    /// Locally exposed handle: `set_value` emits the change notification
    /// shaped by the property's [`PropertyUpdateType`].
    Adapter,
}

/// Validates `path` against the object-path grammar and returns the owned form.
///
/// The grammar is the bus one: must start with `/`, segments are non-empty
/// and limited to `[A-Za-z0-9_]`, no trailing `/` except for the root path.
pub(crate) fn parse_object_path(path: &str) -> Result<OwnedObjectPath, ProxyError> {
    ObjectPath::try_from(path)
        .map(Into::into)
        .map_err(|_| ProxyError::InvalidPath(path.to_string()))
}
