//! Host-side type descriptors and values for the luar marshaling engine.
//!
//! This crate knows nothing about Lua. It models the host side of the
//! boundary:
//!
//! - [`Type`] / [`TypeKind`]: runtime type descriptors (named types, struct
//!   field tables with annotations, function signatures)
//! - [`Value`]: typed host values with shared reference semantics for
//!   slices, maps, pointers, channels and functions
//! - [`HostFn`] / [`NativeCallable`]: type-erased host callables with panic
//!   recovery
//!
//! # Example
//!
//! ```
//! use luar_core::{Field, Type, Value};
//!
//! let point = Type::named_struct(
//!     "Point",
//!     vec![Field::new("X", Type::int()), Field::new("Y", Type::int())],
//! );
//! let p = Value::structure(&point, vec![Value::int(1), Value::int(2)]).unwrap();
//! assert_eq!(p.field("Y").unwrap().as_i64(), Some(2));
//! ```

mod error;
mod native_fn;
mod types;
mod value;

pub use error::{NativeError, ValueError};
pub use native_fn::{HostFn, NativeCallable};
pub use types::{
    DescribeFn, Field, FieldFlags, FloatWidth, IntWidth, Signature, StructDef, Type, TypeKind,
};
pub use value::{HostMap, MapKey, Repr, Shared, Value};
