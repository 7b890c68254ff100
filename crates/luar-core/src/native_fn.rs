//! Host callable storage.
//!
//! A [`HostFn`] pairs a [`Signature`] with a type-erased callable. Arguments
//! arrive already converted to the parameter types; when the signature is
//! variadic the trailing arguments are packed into a single slice value.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crate::error::NativeError;
use crate::types::{Signature, Type};
use crate::value::Value;

/// Trait for callable host functions.
pub trait NativeCallable {
    /// Call this function with arguments matching its signature.
    fn call(&self, args: Vec<Value>) -> Result<Vec<Value>, NativeError>;
}

// Implement NativeCallable for closures over the argument vector
impl<F> NativeCallable for F
where
    F: Fn(Vec<Value>) -> Result<Vec<Value>, NativeError>,
{
    fn call(&self, args: Vec<Value>) -> Result<Vec<Value>, NativeError> {
        (self)(args)
    }
}

/// Type-erased host function.
///
/// Cloning shares the underlying callable, so clones have the same identity.
#[derive(Clone)]
pub struct HostFn {
    signature: Signature,
    inner: Rc<dyn NativeCallable>,
}

impl HostFn {
    pub fn new<F>(signature: Signature, f: F) -> Self
    where
        F: NativeCallable + 'static,
    {
        Self {
            signature,
            inner: Rc::new(f),
        }
    }

    /// Wrap a closure. Unlike [`HostFn::new`], the closure's argument and
    /// result types are inferred from this bound.
    pub fn from_fn<F>(signature: Signature, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Vec<Value>, NativeError> + 'static,
    {
        Self::new(signature, f)
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The `func(...)` type of this function.
    pub fn ty(&self) -> Type {
        Type::func(self.signature.clone())
    }

    pub fn call(&self, args: Vec<Value>) -> Result<Vec<Value>, NativeError> {
        self.inner.call(args)
    }

    /// Call the function, turning a panic into [`NativeError::Panic`].
    pub fn call_guarded(&self, args: Vec<Value>) -> Result<Vec<Value>, NativeError> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.inner.call(args))) {
            Ok(result) => result,
            Err(payload) => {
                let message = if let Some(s) = payload.downcast_ref::<&str>() {
                    (*s).to_string()
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                Err(NativeError::Panic { message })
            }
        }
    }

    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }
}

impl fmt::Debug for HostFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFn")
            .field("type", &self.ty().to_string())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add() -> HostFn {
        HostFn::from_fn(
            Signature::new(vec![Type::int(), Type::int()], vec![Type::int()]),
            |args| {
                let sum = args.iter().filter_map(Value::as_i64).sum::<i64>();
                Ok(vec![Value::int(sum)])
            },
        )
    }

    #[test]
    fn call_closure() {
        let result = add().call(vec![Value::int(2), Value::int(3)]).unwrap();
        assert_eq!(result[0].as_i64(), Some(5));
    }

    #[test]
    fn clones_share_identity() {
        let f = add();
        let g = f.clone();
        assert_eq!(f.identity(), g.identity());
        assert_ne!(f.identity(), add().identity());
        assert_eq!(f.ty().to_string(), "func(int, int) int");
    }

    #[test]
    fn panics_are_recovered() {
        let f = HostFn::from_fn(Signature::new(vec![], vec![]), |_| {
            panic!("boom")
        });
        match f.call_guarded(vec![]) {
            Err(NativeError::Panic { message }) => assert_eq!(message, "boom"),
            other => panic!("expected panic error, got {other:?}"),
        }
    }

    #[test]
    fn formatted_panic_message() {
        let f = HostFn::from_fn(Signature::new(vec![], vec![]), |_| {
            panic!("bad index {}", 7)
        });
        let err = f.call_guarded(vec![]).unwrap_err();
        assert!(err.to_string().contains("bad index 7"));
    }
}
