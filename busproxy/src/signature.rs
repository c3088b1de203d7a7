//! Compile-time signature computation for typed method and signal proxies.
//!
//! A method's protocol signature is the concatenation of its argument
//! signatures in declaration order; each type contributes the canonical
//! fragment exposed through [`zvariant::Type`]. [`ArgList`] folds an
//! argument tuple into that string (plus a human-readable type list for
//! diagnostics) and converts tuples to and from message bodies.
//! [`MethodReturn`] decodes a reply body into the statically requested
//! return type.

use zvariant::{OwnedObjectPath, OwnedValue, Type, Value};

use crate::models::ProxyError;

/// An ordered list of marshalable argument types, expressed as a tuple.
///
/// The zero-argument case is `()` with an empty signature and an empty
/// type-name list.
pub trait ArgList: Sized + Send + Sync + 'static {
    /// Concatenated protocol type signature of the list, e.g. `"is"` for
    /// `(i32, String)`.
    fn signature() -> String;

    /// Comma-joined Rust type names, for diagnostics only.
    fn type_names() -> String;

    /// Number of arguments in the list.
    fn arity() -> usize;

    /// Encodes the tuple into a message body.
    fn into_values(self) -> crate::Result<Vec<OwnedValue>>;

    /// Decodes a message body back into the tuple. Fails with
    /// [`ProxyError::TypeMismatch`] when the body shape does not match.
    fn from_values(values: &[OwnedValue]) -> crate::Result<Self>;
}

impl ArgList for () {
    fn signature() -> String {
        String::new()
    }

    fn type_names() -> String {
        String::new()
    }

    fn arity() -> usize {
        0
    }

    fn into_values(self) -> crate::Result<Vec<OwnedValue>> {
        Ok(Vec::new())
    }

    fn from_values(values: &[OwnedValue]) -> crate::Result<Self> {
        if values.is_empty() {
            Ok(())
        } else {
            Err(ProxyError::TypeMismatch(format!(
                "expected an empty body, got {} argument(s)",
                values.len()
            )))
        }
    }
}

macro_rules! arg_list_impl {
    ($($ty:ident : $idx:tt),+) => {
        impl<$($ty),+> ArgList for ($($ty,)+)
        where
            $($ty: Type
                + Into<Value<'static>>
                + TryFrom<OwnedValue, Error = zvariant::Error>
                + Send
                + Sync
                + 'static,)+
        {
            fn signature() -> String {
                let mut signature = String::new();
                $(signature.push_str(&<$ty as Type>::SIGNATURE.to_string());)+
                signature
            }

            fn type_names() -> String {
                [$(std::any::type_name::<$ty>()),+].join(", ")
            }

            fn arity() -> usize {
                [$(stringify!($ty)),+].len()
            }

            fn into_values(self) -> crate::Result<Vec<OwnedValue>> {
                Ok(vec![$({
                    let value: Value<'static> = self.$idx.into();
                    value.try_to_owned()?
                }),+])
            }

            fn from_values(values: &[OwnedValue]) -> crate::Result<Self> {
                if values.len() != Self::arity() {
                    return Err(ProxyError::TypeMismatch(format!(
                        "expected {} argument(s) for signature {:?}, got {}",
                        Self::arity(),
                        Self::signature(),
                        values.len()
                    )));
                }
                Ok(($($ty::try_from(values[$idx].clone())
                    .map_err(|e| ProxyError::TypeMismatch(e.to_string()))?,)+))
            }
        }
    };
}

arg_list_impl!(A: 0);
arg_list_impl!(A: 0, B: 1);
arg_list_impl!(A: 0, B: 1, C: 2);
arg_list_impl!(A: 0, B: 1, C: 2, D: 3);
arg_list_impl!(A: 0, B: 1, C: 2, D: 3, E: 4);
arg_list_impl!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
arg_list_impl!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
arg_list_impl!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);

/// A type a method reply body can be decoded into.
pub trait MethodReturn: Sized + Send + 'static {
    /// Protocol signature of the reply, for diagnostics.
    fn reply_signature() -> String;

    /// Decodes the reply body. Fails with [`ProxyError::TypeMismatch`]
    /// when the body cannot be read as `Self`.
    fn from_body(body: Vec<OwnedValue>) -> crate::Result<Self>;
}

/// Void return: the reply body is ignored.
impl MethodReturn for () {
    fn reply_signature() -> String {
        String::new()
    }

    fn from_body(_body: Vec<OwnedValue>) -> crate::Result<Self> {
        Ok(())
    }
}

/// Untyped return: the first reply argument, whatever its runtime type.
impl MethodReturn for OwnedValue {
    fn reply_signature() -> String {
        <OwnedValue as Type>::SIGNATURE.to_string()
    }

    fn from_body(body: Vec<OwnedValue>) -> crate::Result<Self> {
        body.into_iter().next().ok_or_else(|| {
            ProxyError::TypeMismatch("reply body is empty, expected one value".into())
        })
    }
}

macro_rules! method_return_impl {
    ($($ty:ty),+ $(,)?) => {$(
        impl MethodReturn for $ty {
            fn reply_signature() -> String {
                <$ty as Type>::SIGNATURE.to_string()
            }

            fn from_body(body: Vec<OwnedValue>) -> crate::Result<Self> {
                let first = body.into_iter().next().ok_or_else(|| {
                    ProxyError::TypeMismatch(format!(
                        "reply body is empty, expected {:?}",
                        Self::reply_signature()
                    ))
                })?;
                <$ty>::try_from(first).map_err(|e| ProxyError::TypeMismatch(e.to_string()))
            }
        }
    )+};
}

method_return_impl!(
    bool,
    u8,
    i16,
    u16,
    i32,
    u32,
    i64,
    u64,
    f64,
    String,
    OwnedObjectPath,
);
