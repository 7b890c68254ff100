//! Marshaling between host values and Lua.
//!
//! `luar` converts [`Value`]s described by runtime [`Type`]s into Lua values
//! and back, on top of `mlua`:
//!
//! - [`host_to_lua`] copies composites into tables, [`host_to_lua_proxy`]
//!   wraps them as [`Proxy`] userdata that write through to the host value
//! - [`lua_to_host`] / [`lua_to_host_into`] decode Lua values into a
//!   destination type, honoring field annotations and cycles
//! - host functions ([`HostFn`]) become callable Lua functions with argument
//!   decoding, variadic packing and panic recovery
//! - [`register`] installs values into a table and [`init`] builds a state
//!   with the `luar` helper table
//!
//! # Example
//!
//! ```
//! use luar::{Field, Type, Value, host_to_lua, lua_to_host};
//!
//! let lua = mlua::Lua::new();
//! let point = Type::named_struct(
//!     "Point",
//!     vec![
//!         Field::new("X", Type::int()).with_tag("lua", "x"),
//!         Field::new("Y", Type::int()).with_tag("lua", "y"),
//!     ],
//! );
//! let p = Value::structure(&point, vec![Value::int(3), Value::int(4)]).unwrap();
//!
//! lua.globals().set("p", host_to_lua(&lua, &p).unwrap()).unwrap();
//! let moved = lua.load("return { x = p.x + 1, y = p.y }").eval().unwrap();
//! let back = lua_to_host(&lua, &moved, &point).unwrap();
//! assert_eq!(back.field("X").unwrap().as_i64(), Some(4));
//! ```

mod bridge;
mod error;
mod from_lua;
mod object;
mod options;
mod proxy;
mod register;
mod to_lua;
mod tracker;

pub use luar_core::{
    DescribeFn, Field, FieldFlags, FloatWidth, HostFn, HostMap, IntWidth, MapKey, NativeCallable,
    NativeError, Repr, Shared, Signature, StructDef, Type, TypeKind, Value, ValueError,
};

pub use bridge::{raise, where_prefix, wrap_fn};
pub use error::ConversionError;
pub use from_lua::{lua_to_host, lua_to_host_into};
pub use object::LuaObject;
pub use options::{ConvertOptions, DEFAULT_MAX_DEPTH, DEFAULT_TAG_KEY, Mode, configure};
pub use proxy::{Capability, Proxy, is_proxy, make_proxy, unwrap_proxy};
pub use register::{Target, init, register};
pub use to_lua::{host_to_lua, host_to_lua_proxy};
