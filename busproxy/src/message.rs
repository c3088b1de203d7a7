//! Message envelopes exchanged with the bus connection.
//!
//! These are pure data carriers: building one performs no I/O, and the
//! wire-level encoding of the body values is the connection's concern.

use zvariant::{OwnedObjectPath, OwnedValue, Type, Value};

use crate::models::ProxyError;

/// An outbound method-call envelope.
#[derive(Debug, Clone)]
pub struct CallMessage {
    destination: Option<String>,
    path: OwnedObjectPath,
    interface: Option<String>,
    member: String,
    body: Vec<OwnedValue>,
    body_signature: String,
}

impl CallMessage {
    pub fn new(
        destination: Option<&str>,
        path: OwnedObjectPath,
        interface: Option<&str>,
        member: &str,
    ) -> Self {
        Self {
            destination: destination.map(str::to_string),
            path,
            interface: interface.map(str::to_string),
            member: member.to_string(),
            body: Vec::new(),
            body_signature: String::new(),
        }
    }

    /// Bus name the call is addressed to, `None` meaning "any owner".
    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    pub fn path(&self) -> &OwnedObjectPath {
        &self.path
    }

    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    pub fn body(&self) -> &[OwnedValue] {
        &self.body
    }

    /// Concatenated signature of the body values appended so far.
    pub fn body_signature(&self) -> &str {
        &self.body_signature
    }

    /// Appends one typed argument, extending the body signature by the
    /// type's canonical fragment.
    pub fn append<T>(&mut self, value: T) -> Result<(), ProxyError>
    where
        T: Type + Into<Value<'static>>,
    {
        self.body_signature.push_str(&T::SIGNATURE.to_string());
        let value: Value<'static> = value.into();
        self.body.push(value.try_to_owned()?);
        Ok(())
    }

    /// Appends an already-converted value under an explicit signature
    /// fragment.
    pub fn append_value(&mut self, value: OwnedValue, signature: &str) {
        self.body_signature.push_str(signature);
        self.body.push(value);
    }

    /// Replaces the whole body at once.
    pub fn set_body(&mut self, body: Vec<OwnedValue>, signature: impl Into<String>) {
        self.body = body;
        self.body_signature = signature.into();
    }
}

/// A successful method reply.
#[derive(Debug, Clone, Default)]
pub struct ReturnMessage {
    body: Vec<OwnedValue>,
    body_signature: String,
}

impl ReturnMessage {
    pub fn new(body: Vec<OwnedValue>, signature: impl Into<String>) -> Self {
        Self {
            body,
            body_signature: signature.into(),
        }
    }

    /// A reply with no return arguments.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn body(&self) -> &[OwnedValue] {
        &self.body
    }

    pub fn body_signature(&self) -> &str {
        &self.body_signature
    }

    pub fn into_body(self) -> Vec<OwnedValue> {
        self.body
    }
}

/// An error reply from the remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    name: String,
    message: String,
}

impl ErrorMessage {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Protocol error name, e.g. `org.freedesktop.DBus.Error.UnknownMethod`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ErrorMessage> for ProxyError {
    fn from(error: ErrorMessage) -> Self {
        ProxyError::Remote {
            name: error.name,
            message: error.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_object_path;

    #[test]
    fn append_tracks_the_body_signature() {
        let path = parse_object_path("/org/example/Obj").unwrap();
        let mut msg = CallMessage::new(Some("org.example"), path, None, "Ping");
        msg.append(31i32).unwrap();
        msg.append("hello".to_string()).unwrap();
        assert_eq!(msg.body_signature(), "is");
        assert_eq!(msg.body().len(), 2);
        assert_eq!(msg.interface(), None);
        assert_eq!(msg.member(), "Ping");
    }

    #[test]
    fn error_message_converts_to_remote_error() {
        let err = ErrorMessage::new("org.example.Error.Busy", "try again");
        match ProxyError::from(err) {
            ProxyError::Remote { name, message } => {
                assert_eq!(name, "org.example.Error.Busy");
                assert_eq!(message, "try again");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
