//! A Rust library for D-Bus style object proxies.
//!
//! This crate provides the object-proxy layer of a message-bus IPC
//! stack: local stand-ins for remote bus objects, with their interfaces,
//! methods, signals, and properties mapped onto callable and observable
//! Rust constructs.
//!
//! - [`ObjectProxy`] binds a destination and object path and owns a
//!   keyed, insertion-ordered collection of interfaces, one of which may
//!   be the default
//! - [`InterfaceProxy`] owns typed method, signal, and property handles
//!   and supports renaming with automatic re-keying in the parent
//! - [`MethodProxy`] / [`SignalProxy`] are created from compile-time
//!   type lists; their protocol signatures are computed from the types
//! - [`PropertyProxy`] caches the remote value and notifies observers on
//!   change
//!
//! The raw bus connection is a boundary: implement the [`Connection`]
//! trait over your transport (or a mock in tests) and the proxy graph
//! routes every outbound call through it. Wire marshaling of body values
//! is likewise the connection's concern; bodies travel as
//! [`zvariant::OwnedValue`] lists.
//!
//! # Example
//!
//! ```no_run
//! use busproxy::ObjectProxy;
//!
//! # fn example(conn: std::sync::Arc<dyn busproxy::Connection>) -> busproxy::Result<()> {
//! let obj = ObjectProxy::builder()
//!     .connection(conn)
//!     .destination("org.example.Daemon")
//!     .path("/org/example/Obj")?
//!     .build()?;
//!
//! // A typed method proxy: one i32 argument (signature "i"), String reply.
//! let echo = obj.create_method::<String, (i32,)>("org.example.Iface", "Echo")?;
//! let reply = echo.call((42,), None)?;
//! println!("{reply}");
//!
//! // A typed signal proxy with a local observer.
//! let changed = obj.create_signal::<(u32,)>("org.example.Iface", "Changed")?;
//! changed.connect(|(level,)| println!("level is now {level}"));
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! All operations return `Result<T, ProxyError>`. Structural failures
//! (duplicate member names, missing default interface, bad paths) are
//! reported at the call site; I/O failures (timeout, remote error)
//! surface through `call` or through the pending handle of `call_async`.
//!
//! # Threading
//!
//! The proxy graph is a passive structure safe to use from application
//! threads and the connection's dispatch thread concurrently. All change
//! notifications are delivered synchronously at the point of mutation,
//! with no internal lock held while observers run.
//!
//! # Logging
//!
//! This crate uses the [`log`](https://docs.rs/log) facade. Add a logging
//! implementation like `env_logger` to see output.

// Public API modules
pub mod connection;
pub mod constants;
pub mod events;
pub mod interface;
pub mod message;
pub mod method;
pub mod models;
pub mod object;
pub mod property;
pub mod signal;
pub mod signature;

// Re-exported public API
pub use connection::{Connection, PendingCall, PendingReply, ReplyHandle};
pub use events::{EventRegistry, SubscriptionId};
pub use interface::{InterfaceProxy, InterfaceRenamed};
pub use message::{CallMessage, ErrorMessage, ReturnMessage};
pub use method::{MethodProxy, MethodProxyBase};
pub use models::{PropertyRole, PropertyUpdateType, ProxyError};
pub use object::{DefaultInterfaceChanged, ObjectProxy, ObjectProxyBuilder};
pub use property::{PropertyEvent, PropertyProxy, PropertyProxyBase};
pub use signal::{ProxySignal, SignalProxy};
pub use signature::{ArgList, MethodReturn};

/// A specialized `Result` type for proxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;
