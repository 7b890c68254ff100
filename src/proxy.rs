//! Proxy handles.
//!
//! A proxy is a Lua userdata holding a host [`Value`] by reference together
//! with a [`Capability`] tag that selects its metamethods. Proxies over
//! pointers, slices and maps write through to the shared host value:
//!
//! ```
//! use luar::{Field, Type, Value, host_to_lua_proxy};
//!
//! let lua = mlua::Lua::new();
//! let point = Type::named_struct(
//!     "Point",
//!     vec![Field::new("X", Type::int()), Field::new("Y", Type::int())],
//! );
//! let p = Value::pointer_to(Value::structure(&point, vec![Value::int(1), Value::int(2)]).unwrap());
//!
//! lua.globals().set("p", host_to_lua_proxy(&lua, &p).unwrap()).unwrap();
//! lua.load("p.X = p.X + p.Y").exec().unwrap();
//! assert_eq!(p.deref().unwrap().field("X").unwrap().as_i64(), Some(3));
//! ```

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use luar_core::{Shared, TypeKind, Value};
use mlua::{
    AnyUserData, Lua, MetaMethod, UserData, UserDataMethods, Value as LuaValue, Variadic,
};

use crate::error::ConversionError;
use crate::from_lua::{field_map, lua_to_host};
use crate::options;
use crate::to_lua::host_to_lua_proxy;

/// Selects the metamethods of a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Number,
    String,
    Complex,
    Slice,
    Map,
    Struct,
    Channel,
    Interface,
}

impl Capability {
    pub fn name(self) -> &'static str {
        match self {
            Capability::Number => "number",
            Capability::String => "string",
            Capability::Complex => "complex",
            Capability::Slice => "slice",
            Capability::Map => "map",
            Capability::Struct => "struct",
            Capability::Channel => "channel",
            Capability::Interface => "interface",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A host value wrapped for Lua.
#[derive(Debug, Clone)]
pub struct Proxy {
    value: Value,
    capability: Capability,
}

impl Proxy {
    pub fn new(value: Value, capability: Capability) -> Self {
        Self { value, capability }
    }

    /// The wrapped value, pointer level included.
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// The wrapped value with all pointers followed.
    pub fn target(&self) -> Value {
        let mut target = self.value.clone();
        while let Some(next) = target.deref() {
            target = next;
        }
        target
    }

    /// The innermost pointer cell, which writes go through.
    fn cell(&self) -> Option<Shared<Value>> {
        let mut cell = self.value.pointee()?.clone();
        loop {
            let next = cell.borrow().pointee().cloned();
            match next {
                Some(inner) => cell = inner,
                None => return Some(cell),
            }
        }
    }

    fn get(&self, lua: &Lua, key: LuaValue) -> mlua::Result<LuaValue> {
        let target = self.target();
        match self.capability {
            Capability::Struct => {
                let name = key_string(&key)?;
                let index = struct_field(lua, &target, &name)?;
                match target.field_at(index) {
                    Some(field) => Ok(host_to_lua_proxy(lua, &field)?),
                    None => Ok(LuaValue::Nil),
                }
            }
            Capability::Slice => match element_index(&key) {
                Some(i) => match target.index(i) {
                    Some(item) => Ok(host_to_lua_proxy(lua, &item)?),
                    None => Ok(LuaValue::Nil),
                },
                None => Ok(LuaValue::Nil),
            },
            Capability::Map => {
                let Some(key_ty) = target.ty().key() else {
                    return Ok(LuaValue::Nil);
                };
                let key = lua_to_host(lua, &key, key_ty)?;
                match target.map_get(&key) {
                    Some(item) => Ok(host_to_lua_proxy(lua, &item)?),
                    None => Ok(LuaValue::Nil),
                }
            }
            Capability::Complex => {
                let (re, im) = target.as_complex().unwrap_or_default();
                match key_string(&key)?.as_str() {
                    "real" => Ok(LuaValue::Number(re)),
                    "imag" => Ok(LuaValue::Number(im)),
                    _ => Ok(LuaValue::Nil),
                }
            }
            Capability::Channel => match key_string(&key)?.as_str() {
                "send" => channel_send(lua, target),
                "recv" => channel_recv(lua, target),
                _ => Ok(LuaValue::Nil),
            },
            Capability::Number | Capability::String | Capability::Interface => Err(
                mlua::Error::RuntimeError(format!("cannot index a {} proxy", self.capability)),
            ),
        }
    }

    fn set(&self, lua: &Lua, key: LuaValue, item: LuaValue) -> mlua::Result<()> {
        match self.capability {
            Capability::Struct => {
                let cell = self.cell().ok_or_else(|| {
                    mlua::Error::RuntimeError("cannot assign to a field of a struct value".into())
                })?;
                let ty = cell.borrow().ty().clone();
                let name = key_string(&key)?;
                let index = struct_field(lua, &cell.borrow(), &name)?;
                let field = &ty.fields()[index];
                if !field.is_settable() {
                    return Err(mlua::Error::RuntimeError(format!(
                        "field `{name}` of type {ty} is not settable"
                    )));
                }
                let decoded = lua_to_host(lua, &item, &field.ty)?;
                cell.borrow_mut()
                    .set_field_at(index, decoded)
                    .map_err(ConversionError::from)?;
                Ok(())
            }
            Capability::Slice => {
                let mut target = self.target();
                let elem = target.ty().elem().cloned().ok_or_else(|| {
                    mlua::Error::RuntimeError(format!("cannot index {}", target.ty()))
                })?;
                let index = element_index(&key).ok_or_else(|| {
                    mlua::Error::RuntimeError(format!(
                        "invalid index for {}: expected a positive integer",
                        target.ty()
                    ))
                })?;
                let decoded = lua_to_host(lua, &item, &elem)?;
                let written = if matches!(target.kind(), TypeKind::Array { .. }) {
                    let cell = self.cell().ok_or_else(|| {
                        mlua::Error::RuntimeError(
                            "cannot assign to an element of an array value".into(),
                        )
                    })?;
                    let mut array = cell.borrow_mut();
                    array.set_index(index, decoded)
                } else {
                    target.set_index(index, decoded)
                };
                written.map_err(ConversionError::from)?;
                Ok(())
            }
            Capability::Map => {
                let target = self.target();
                let (Some(key_ty), Some(value_ty)) = (target.ty().key(), target.ty().elem()) else {
                    return Ok(());
                };
                let key = lua_to_host(lua, &key, key_ty)?;
                if item.is_nil() {
                    target.map_remove(&key);
                    return Ok(());
                }
                let decoded = lua_to_host(lua, &item, value_ty)?;
                target
                    .map_insert(key, decoded)
                    .map_err(ConversionError::from)?;
                Ok(())
            }
            _ => Err(mlua::Error::RuntimeError(format!(
                "cannot assign to a {} proxy",
                self.capability
            ))),
        }
    }

    /// Key/value pairs for `__pairs`, snapshotted when iteration starts.
    fn entries(&self, lua: &Lua) -> mlua::Result<Vec<(LuaValue, LuaValue)>> {
        let target = self.target();
        let mut entries = Vec::new();
        match self.capability {
            Capability::Struct => {
                let tag_key = options::current(lua).tag_key().to_string();
                for (i, field) in target.ty().fields().iter().enumerate() {
                    if let Some(item) = target.field_at(i) {
                        let key = LuaValue::String(lua.create_string(field.script_name(&tag_key))?);
                        entries.push((key, host_to_lua_proxy(lua, &item)?));
                    }
                }
            }
            Capability::Slice => {
                for (i, item) in target.elements().unwrap_or_default().iter().enumerate() {
                    entries.push((LuaValue::Integer(i as i64 + 1), host_to_lua_proxy(lua, item)?));
                }
            }
            Capability::Map => {
                for (key, item) in target.entries().unwrap_or_default() {
                    entries.push((host_to_lua_proxy(lua, &key)?, host_to_lua_proxy(lua, &item)?));
                }
            }
            _ => {
                return Err(mlua::Error::RuntimeError(format!(
                    "cannot iterate over a {} proxy",
                    self.capability
                )));
            }
        }
        Ok(entries)
    }
}

fn key_string(key: &LuaValue) -> mlua::Result<String> {
    match key {
        LuaValue::String(s) => Ok(s.to_string_lossy().into()),
        LuaValue::Integer(i) => Ok(i.to_string()),
        LuaValue::Number(n) => Ok(n.to_string()),
        other => Err(mlua::Error::RuntimeError(format!(
            "invalid key of type {}",
            other.type_name()
        ))),
    }
}

/// 1-based Lua index to 0-based element index.
fn element_index(key: &LuaValue) -> Option<usize> {
    let i = match *key {
        LuaValue::Integer(i) => i,
        LuaValue::Number(n) if n.fract() == 0.0 => n as i64,
        _ => return None,
    };
    usize::try_from(i).ok()?.checked_sub(1)
}

fn struct_field(lua: &Lua, target: &Value, name: &str) -> mlua::Result<usize> {
    let tag_key = options::current(lua).tag_key().to_string();
    field_map(target.ty(), &tag_key)
        .get(name)
        .copied()
        .ok_or_else(|| {
            mlua::Error::RuntimeError(format!("no field `{name}` for type {}", target.ty()))
        })
}

fn channel_send(lua: &Lua, channel: Value) -> mlua::Result<LuaValue> {
    let f = lua.create_function(move |lua, (_this, item): (LuaValue, LuaValue)| {
        let elem = channel.ty().elem().cloned().unwrap_or_else(luar_core::Type::any);
        let decoded = lua_to_host(lua, &item, &elem)?;
        channel.send(decoded).map_err(ConversionError::from)?;
        Ok(())
    })?;
    Ok(LuaValue::Function(f))
}

fn channel_recv(lua: &Lua, channel: Value) -> mlua::Result<LuaValue> {
    let f = lua.create_function(move |lua, _this: LuaValue| {
        match channel.recv().map_err(ConversionError::from)? {
            Some(item) => Ok(host_to_lua_proxy(lua, &item)?),
            None => Ok(LuaValue::Nil),
        }
    })?;
    Ok(LuaValue::Function(f))
}

impl UserData for Proxy {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: LuaValue| this.get(lua, key));

        methods.add_meta_method(
            MetaMethod::NewIndex,
            |lua, this, (key, item): (LuaValue, LuaValue)| this.set(lua, key, item),
        );

        methods.add_meta_method(MetaMethod::Len, |_, this, ()| {
            this.target().len().ok_or_else(|| {
                mlua::Error::RuntimeError(format!("cannot take the length of {}", this.value.ty()))
            })
        });

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(this.target().to_string())
        });

        methods.add_meta_function(MetaMethod::Eq, |_, (a, b): (AnyUserData, AnyUserData)| {
            let (Ok(a), Ok(b)) = (a.borrow::<Proxy>(), b.borrow::<Proxy>()) else {
                return Ok(false);
            };
            Ok(match (a.value.identity(), b.value.identity()) {
                (Some(x), Some(y)) => x == y,
                _ => a.target().deep_eq(&b.target()),
            })
        });

        methods.add_meta_method(MetaMethod::Pairs, |lua, this, ()| {
            let entries = Rc::new(this.entries(lua)?);
            let cursor = Rc::new(Cell::new(0usize));
            let next = lua.create_function(move |_, _: Variadic<LuaValue>| {
                let i = cursor.get();
                cursor.set(i + 1);
                Ok(match entries.get(i) {
                    Some((key, item)) => (key.clone(), item.clone()),
                    None => (LuaValue::Nil, LuaValue::Nil),
                })
            })?;
            Ok((next, LuaValue::Nil, LuaValue::Nil))
        });
    }
}

/// Wrap `value` in a new proxy userdata.
pub fn make_proxy(lua: &Lua, value: Value, capability: Capability) -> mlua::Result<LuaValue> {
    lua.create_userdata(Proxy::new(value, capability))
        .map(LuaValue::UserData)
}

pub fn is_proxy(value: &LuaValue) -> bool {
    matches!(value, LuaValue::UserData(ud) if ud.is::<Proxy>())
}

/// The host value behind a proxy, pointer level included.
pub fn unwrap_proxy(value: &LuaValue) -> Option<Value> {
    let LuaValue::UserData(ud) = value else {
        return None;
    };
    ud.borrow::<Proxy>().ok().map(|proxy| proxy.value.clone())
}
