//! Host to Lua conversion.
//!
//! The encoder walks a host value graph and produces a Lua value. In
//! [`Mode::Copy`] composites become Lua tables; in [`Mode::Proxy`] values
//! with an addressable identity become [`Proxy`](crate::Proxy) userdata
//! instead. Elements of copied composites are always copied.
//!
//! # Example
//!
//! ```
//! use luar::{Type, Value, host_to_lua};
//!
//! let lua = mlua::Lua::new();
//! let list = Value::slice(&Type::int(), vec![Value::int(1), Value::int(2)]);
//! let table = host_to_lua(&lua, &list).unwrap();
//! lua.globals().set("list", table).unwrap();
//! assert_eq!(lua.load("return list[2]").eval::<i64>().unwrap(), 2);
//! ```

use luar_core::{Repr, TypeKind, Value};
use mlua::{Lua, Value as LuaValue};

use crate::bridge;
use crate::error::ConversionError;
use crate::object::LuaObject;
use crate::options::{self, Mode};
use crate::proxy::{self, Capability};
use crate::tracker::{Depth, Visited};

/// Converts host values for one top-level call.
pub(crate) struct Encoder<'lua> {
    lua: &'lua Lua,
    visited: Visited<LuaValue>,
    depth: Depth,
    tag_key: String,
}

impl<'lua> Encoder<'lua> {
    pub(crate) fn new(lua: &'lua Lua) -> Self {
        let options = options::current(lua);
        Self {
            lua,
            visited: Visited::new(),
            depth: Depth::new(options.max_depth()),
            tag_key: options.tag_key().to_string(),
        }
    }

    pub(crate) fn encode(&mut self, value: &Value, mode: Mode) -> Result<LuaValue, ConversionError> {
        self.depth.descend()?;
        let result = self.encode_value(value, mode);
        self.depth.ascend();
        result
    }

    fn encode_value(&mut self, value: &Value, mode: Mode) -> Result<LuaValue, ConversionError> {
        // One level of interface boxing is transparent.
        let value = match value.repr() {
            Repr::Interface(None) => return Ok(LuaValue::Nil),
            Repr::Interface(Some(inner)) => inner.as_ref(),
            _ => value,
        };

        // Follow pointers, keeping the outermost reference for proxies.
        let pointer = value.ty().is_pointer();
        let mut target = value.clone();
        loop {
            let next = match target.repr() {
                Repr::Pointer(None) => return Ok(LuaValue::Nil),
                Repr::Pointer(Some(cell)) => cell.borrow().clone(),
                _ => break,
            };
            target = next;
        }

        if target.is_null() {
            return self.proxy(target, Capability::Interface);
        }

        let proxify = mode == Mode::Proxy;
        match target.kind() {
            TypeKind::Bool => match target.as_bool() {
                Some(b) if !(proxify && target.ty().is_named()) => Ok(LuaValue::Boolean(b)),
                _ => self.proxy(value.clone(), Capability::Interface),
            },
            TypeKind::Int(_) | TypeKind::Uint(_) | TypeKind::Float(_) => {
                if proxify && target.ty().is_named() {
                    self.proxy(value.clone(), Capability::Number)
                } else {
                    Ok(number(&target))
                }
            }
            TypeKind::String => match target.as_str() {
                Some(s) if !(proxify && target.ty().is_named()) => {
                    Ok(LuaValue::String(self.lua.create_string(s)?))
                }
                _ => self.proxy(value.clone(), Capability::String),
            },
            TypeKind::Complex(_) => self.proxy(value.clone(), Capability::Complex),
            TypeKind::Array { .. } => {
                if proxify && pointer {
                    return self.proxy(value.clone(), Capability::Slice);
                }
                let identity = if pointer { value.identity() } else { None };
                if let Some(hit) = identity.and_then(|id| self.visited.lookup(id)) {
                    return Ok(hit);
                }
                self.copy_sequence(&target, identity)
            }
            TypeKind::Slice(_) => {
                if let Some(hit) = target.identity().and_then(|id| self.visited.lookup(id)) {
                    return Ok(hit);
                }
                if proxify {
                    return self.proxy(value.clone(), Capability::Slice);
                }
                self.copy_sequence(&target, target.identity())
            }
            TypeKind::Map { .. } => {
                if let Some(hit) = target.identity().and_then(|id| self.visited.lookup(id)) {
                    return Ok(hit);
                }
                if proxify {
                    return self.proxy(value.clone(), Capability::Map);
                }
                self.copy_map(&target)
            }
            TypeKind::Struct(_) => {
                if proxify && pointer {
                    if let Some(describe) = target.ty().describe_fn() {
                        let message = describe(&target);
                        return Ok(LuaValue::String(self.lua.create_string(&message)?));
                    }
                    return self.proxy(value.clone(), Capability::Struct);
                }
                let identity = if pointer { value.identity() } else { None };
                if let Some(hit) = identity.and_then(|id| self.visited.lookup(id)) {
                    return Ok(hit);
                }
                self.copy_struct(&target, identity)
            }
            TypeKind::Chan(_) => self.proxy(value.clone(), Capability::Channel),
            TypeKind::Func(_) => match target.as_func() {
                Some(f) => Ok(LuaValue::Function(bridge::wrap_fn(self.lua, f.clone())?)),
                None => Ok(LuaValue::Nil),
            },
            TypeKind::ScriptObject => {
                Ok(LuaObject::from_host(&target).map_or(LuaValue::Nil, LuaObject::to_value))
            }
            TypeKind::Interface | TypeKind::Pointer(_) | TypeKind::Null => {
                if let Some(describe) = target.ty().describe_fn() {
                    let message = describe(&target);
                    Ok(LuaValue::String(self.lua.create_string(&message)?))
                } else if target.is_nil() {
                    Ok(LuaValue::Nil)
                } else {
                    self.proxy(value.clone(), Capability::Interface)
                }
            }
        }
    }

    fn proxy(&self, value: Value, capability: Capability) -> Result<LuaValue, ConversionError> {
        Ok(proxy::make_proxy(self.lua, value, capability)?)
    }

    /// Copy an array or slice into a 1-based table. Nil elements become the
    /// Null sentinel.
    fn copy_sequence(
        &mut self,
        seq: &Value,
        identity: Option<usize>,
    ) -> Result<LuaValue, ConversionError> {
        let items = seq.elements().unwrap_or_default();
        let table = self.lua.create_table_with_capacity(items.len(), 0)?;
        if let Some(id) = identity {
            self.visited
                .mark_composite(id, items.len(), LuaValue::Table(table.clone()));
        }
        for (i, item) in items.iter().enumerate() {
            let encoded = if item.is_nil() {
                self.encode(&Value::null(), Mode::Copy)?
            } else {
                self.encode(item, Mode::Copy)?
            };
            table.raw_set(i + 1, encoded)?;
        }
        Ok(LuaValue::Table(table))
    }

    /// Copy a map into a table. Keys are always proxied so they keep their
    /// identity; nil values become the Null sentinel.
    fn copy_map(&mut self, map: &Value) -> Result<LuaValue, ConversionError> {
        let entries = map.entries().unwrap_or_default();
        let table = self.lua.create_table_with_capacity(0, entries.len())?;
        if let Some(id) = map.identity() {
            self.visited
                .mark_composite(id, entries.len(), LuaValue::Table(table.clone()));
        }
        for (key, item) in &entries {
            let key = self.encode(key, Mode::Proxy)?;
            let encoded = if item.is_nil() {
                self.encode(&Value::null(), Mode::Copy)?
            } else {
                self.encode(item, Mode::Copy)?
            };
            table.raw_set(key, encoded)?;
        }
        Ok(LuaValue::Table(table))
    }

    /// Copy a struct into a table keyed by each field's script-visible name.
    fn copy_struct(
        &mut self,
        record: &Value,
        identity: Option<usize>,
    ) -> Result<LuaValue, ConversionError> {
        let fields = record.ty().fields();
        let table = self.lua.create_table_with_capacity(0, fields.len())?;
        if let Some(id) = identity {
            self.visited
                .mark_composite(id, fields.len(), LuaValue::Table(table.clone()));
        }
        for (i, field) in fields.iter().enumerate() {
            let Some(item) = record.field_at(i) else {
                continue;
            };
            let encoded = self.encode(&item, Mode::Copy)?;
            table.raw_set(field.script_name(&self.tag_key), encoded)?;
        }
        Ok(LuaValue::Table(table))
    }
}

fn number(value: &Value) -> LuaValue {
    match value.repr() {
        Repr::Int(i) => LuaValue::Integer(*i),
        Repr::Uint(u) => match i64::try_from(*u) {
            Ok(i) => LuaValue::Integer(i),
            Err(_) => LuaValue::Number(*u as f64),
        },
        Repr::Float(f) => LuaValue::Number(*f),
        _ => LuaValue::Nil,
    }
}

/// Convert `value` to Lua, copying composites into tables.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn host_to_lua(lua: &Lua, value: &Value) -> Result<LuaValue, ConversionError> {
    Encoder::new(lua).encode(value, Mode::Copy)
}

/// Convert `value` to Lua, wrapping addressable composites and named
/// scalar types as proxies.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn host_to_lua_proxy(lua: &Lua, value: &Value) -> Result<LuaValue, ConversionError> {
    Encoder::new(lua).encode(value, Mode::Proxy)
}
