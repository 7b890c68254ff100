//! Opaque host handles to script values.

use std::rc::Rc;

use luar_core::{Type, Value};
use mlua::Value as LuaValue;

/// A script value held on the host side without conversion.
///
/// Decoding a Lua function or a non-proxy userdata into a `luar.LuaObject`
/// destination wraps it; encoding the wrapper pushes the original script
/// value back. Wrapping a native function created with
/// [`mlua::Lua::create_function`] lets it be registered next to bridged host
/// functions.
///
/// ```
/// use luar::{LuaObject, Target, register};
///
/// let lua = mlua::Lua::new();
/// let answer = lua.create_function(|_, ()| Ok(42)).unwrap();
/// let handle = LuaObject::new(mlua::Value::Function(answer)).into_value();
/// register(&lua, Target::Globals, [("answer", handle)]).unwrap();
/// assert_eq!(lua.load("return answer()").eval::<i64>().unwrap(), 42);
/// ```
#[derive(Debug, Clone)]
pub struct LuaObject {
    value: LuaValue,
}

impl LuaObject {
    pub fn new(value: LuaValue) -> Self {
        Self { value }
    }

    pub fn to_value(&self) -> LuaValue {
        self.value.clone()
    }

    /// Wrap into a host value of type `dest`, which must be a script object type.
    pub fn into_host(self, dest: &Type) -> Value {
        Value::opaque(dest, Rc::new(self))
    }

    /// Wrap into a host value of the plain script object type.
    pub fn into_value(self) -> Value {
        self.into_host(&Type::script_object())
    }

    /// The wrapper held by a script object value.
    pub fn from_host(value: &Value) -> Option<&LuaObject> {
        value
            .as_opaque()
            .and_then(|payload| payload.downcast_ref::<LuaObject>())
    }
}
