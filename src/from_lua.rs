//! Lua to host conversion.
//!
//! The decoder coerces a Lua value into a destination [`Type`]. Tables
//! decode into arrays, slices, maps, structs and pointers; tables seen
//! earlier in the same call decode to the host value already produced for
//! them, so shared and cyclic tables keep their shape.
//!
//! # Example
//!
//! ```
//! use luar::{Type, lua_to_host};
//!
//! let lua = mlua::Lua::new();
//! let table = lua.load("return { 1, 2, 3 }").eval().unwrap();
//! let list = lua_to_host(&lua, &table, &Type::slice(&Type::int())).unwrap();
//! assert_eq!(list.len(), Some(3));
//! assert_eq!(list.index(2).unwrap().as_i64(), Some(3));
//! ```

use std::rc::Rc;

use luar_core::{Repr, Type, TypeKind, Value};
use mlua::{Lua, Table, Value as LuaValue};
use rustc_hash::FxHashMap;

use crate::error::ConversionError;
use crate::object::LuaObject;
use crate::options;
use crate::proxy;
use crate::tracker::{Depth, Visited};

/// Script-visible key to field index, for one struct type.
pub(crate) type FieldMap = FxHashMap<String, usize>;

/// Build the field mapping of a struct type. An annotation under `tag_key`
/// takes precedence over the declared name.
pub(crate) fn field_map(ty: &Type, tag_key: &str) -> FieldMap {
    let mut map = FieldMap::default();
    for (i, field) in ty.fields().iter().enumerate() {
        map.insert(field.script_name(tag_key).to_string(), i);
    }
    map
}

/// Type name of a Lua value as scripts see it.
pub(crate) fn script_type_name(value: &LuaValue) -> &'static str {
    match value {
        LuaValue::Nil => "nil",
        LuaValue::Boolean(_) => "boolean",
        LuaValue::Integer(_) | LuaValue::Number(_) => "number",
        LuaValue::String(_) => "string",
        LuaValue::Table(_) => "table",
        LuaValue::Function(_) => "function",
        LuaValue::Thread(_) => "thread",
        LuaValue::UserData(_) | LuaValue::LightUserData(_) => "userdata",
        _ => "unknown",
    }
}

/// Key of a table entry as a field name: strings verbatim, numbers in their
/// printed form, anything else unnamed.
fn key_name(key: &LuaValue) -> Option<String> {
    match key {
        LuaValue::String(s) => Some(s.to_string_lossy().into()),
        LuaValue::Integer(i) => Some(i.to_string()),
        LuaValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Converts Lua values for one top-level call.
pub(crate) struct Decoder {
    visited: Visited<Value>,
    depth: Depth,
    tag_key: String,
    field_maps: FxHashMap<usize, Rc<FieldMap>>,
}

impl Decoder {
    pub(crate) fn new(lua: &Lua) -> Self {
        let options = options::current(lua);
        Self {
            visited: Visited::new(),
            depth: Depth::new(options.max_depth()),
            tag_key: options.tag_key().to_string(),
            field_maps: FxHashMap::default(),
        }
    }

    pub(crate) fn decode(&mut self, value: &LuaValue, dest: &Type) -> Result<Value, ConversionError> {
        self.depth.descend()?;
        let result = self.decode_value(value, dest);
        self.depth.ascend();
        result
    }

    fn decode_value(&mut self, value: &LuaValue, dest: &Type) -> Result<Value, ConversionError> {
        let mismatch = || ConversionError::mismatch(script_type_name(value), dest);
        // Scalars decode into a fresh pointee.
        if let (
            TypeKind::Pointer(elem),
            LuaValue::Boolean(_) | LuaValue::String(_) | LuaValue::Integer(_) | LuaValue::Number(_),
        ) = (dest.kind(), value)
        {
            return Ok(Value::pointer_as(dest, self.decode(value, elem)?));
        }
        match value {
            LuaValue::Nil => Ok(Value::zero(dest)),
            LuaValue::Boolean(b) => match dest.kind() {
                TypeKind::Bool | TypeKind::Interface => {
                    Value::bool(*b).convert(dest).ok_or_else(mismatch)
                }
                _ => Err(mismatch()),
            },
            LuaValue::String(s) => match dest.kind() {
                TypeKind::String | TypeKind::Interface => {
                    let s: String = s.to_string_lossy().into();
                    Value::string(s).convert(dest).ok_or_else(mismatch)
                }
                _ => Err(mismatch()),
            },
            LuaValue::Integer(i) => match dest.kind() {
                TypeKind::Int(_) | TypeKind::Uint(_) | TypeKind::Float(_) => {
                    Value::int(*i).convert(dest).ok_or_else(mismatch)
                }
                _ => decode_float(*i as f64, dest).ok_or_else(mismatch),
            },
            LuaValue::Number(n) => decode_float(*n, dest).ok_or_else(mismatch),
            LuaValue::Function(_) => match dest.kind() {
                TypeKind::ScriptObject => Ok(LuaObject::new(value.clone()).into_host(dest)),
                _ => Err(mismatch()),
            },
            LuaValue::UserData(_) => self.decode_userdata(value, dest),
            LuaValue::Table(table) => self.decode_table(table, dest),
            _ => Err(mismatch()),
        }
    }

    fn decode_userdata(&mut self, value: &LuaValue, dest: &Type) -> Result<Value, ConversionError> {
        let Some(inner) = proxy::unwrap_proxy(value) else {
            return match dest.kind() {
                TypeKind::ScriptObject => Ok(LuaObject::new(value.clone()).into_host(dest)),
                _ => Err(ConversionError::mismatch(script_type_name(value), dest)),
            };
        };
        if inner.is_null() {
            return Ok(Value::zero(dest));
        }
        if let Some(converted) = inner.convert(dest) {
            return Ok(converted);
        }
        // A proxy over *T also satisfies a T destination.
        let mut pointee = inner.deref();
        while let Some(target) = pointee {
            if let Some(converted) = target.convert(dest) {
                return Ok(converted);
            }
            pointee = target.deref();
        }
        Err(ConversionError::mismatch(inner.ty().to_string(), dest))
    }

    fn decode_table(&mut self, table: &Table, dest: &Type) -> Result<Value, ConversionError> {
        let identity = table.to_pointer() as usize;
        if let Some(existing) = self.visited.lookup(identity) {
            return reuse(existing, dest);
        }
        match dest.kind() {
            TypeKind::Array { elem, len } => {
                // Arrays are values and cannot be cyclic, so they are not tracked.
                let mut array = Value::zero(dest);
                let n = table.raw_len().min(*len);
                self.fill_sequence(table, &mut array, elem, n)?;
                Ok(array)
            }
            TypeKind::Slice(elem) => {
                let n = table.raw_len();
                let mut slice = Value::make(dest, n)?;
                self.visited.mark_composite(identity, n, slice.clone());
                self.fill_sequence(table, &mut slice, elem, n)?;
                Ok(slice)
            }
            TypeKind::Map { .. } => self.decode_map(table, dest),
            TypeKind::Struct(_) => {
                let cell = Value::pointer_to(Value::zero(dest));
                if !table_is_empty(table) {
                    self.visited.mark(identity, cell.clone());
                }
                self.fill_struct(table, &cell)?;
                Ok(cell.deref().unwrap_or_else(|| Value::zero(dest)))
            }
            TypeKind::Pointer(elem) => match elem.kind() {
                TypeKind::Struct(_) => {
                    let cell = Value::pointer_as(dest, Value::zero(elem));
                    if !table_is_empty(table) {
                        self.visited.mark(identity, cell.clone());
                    }
                    self.fill_struct(table, &cell)?;
                    Ok(cell)
                }
                _ => {
                    let inner = self.decode_table(table, elem)?;
                    Ok(Value::pointer_as(dest, inner))
                }
            },
            TypeKind::Interface => {
                // Tables with a non-zero length are taken for sequences.
                let natural = if table.raw_len() > 0 {
                    Type::slice(dest)
                } else {
                    Type::map(&Type::string(), dest)
                };
                let decoded = self.decode_table(table, &natural)?;
                decoded
                    .convert(dest)
                    .ok_or_else(|| ConversionError::mismatch("table", dest))
            }
            _ => Err(ConversionError::mismatch("table", dest)),
        }
    }

    /// Decode elements `1..=n` of `table` into `seq`.
    fn fill_sequence(
        &mut self,
        table: &Table,
        seq: &mut Value,
        elem: &Type,
        n: usize,
    ) -> Result<(), ConversionError> {
        for i in 1..=n {
            let item: LuaValue = table.raw_get(i)?;
            let decoded = self.decode(&item, elem)?;
            seq.set_index(i - 1, null_to_zero(decoded, elem))?;
        }
        Ok(())
    }

    fn decode_map(&mut self, table: &Table, dest: &Type) -> Result<Value, ConversionError> {
        let map_ty = match dest.kind() {
            TypeKind::Map { .. } => dest.clone(),
            _ => Type::map(&Type::string(), &Type::any()),
        };
        let (Some(key_ty), Some(value_ty)) = (map_ty.key(), map_ty.elem()) else {
            return Err(ConversionError::mismatch("table", dest));
        };
        let map = Value::make(&map_ty, 0)?;
        if !table_is_empty(table) {
            self.visited.mark(table.to_pointer() as usize, map.clone());
        }
        for pair in table.pairs::<LuaValue, LuaValue>() {
            let (key, item) = pair?;
            let key = self.decode(&key, key_ty)?;
            let item = self.decode(&item, value_ty)?;
            map.map_insert(key, null_to_zero(item, value_ty))?;
        }
        Ok(map)
    }

    /// Populate the struct behind `cell` from `table`. Unmapped keys,
    /// unexported fields and fields that fail to convert are skipped.
    fn fill_struct(&mut self, table: &Table, cell: &Value) -> Result<(), ConversionError> {
        let Some(target) = cell.pointee() else {
            return Err(ConversionError::NotAPointer {
                ty: cell.ty().to_string(),
            });
        };
        let ty = target.borrow().ty().clone();
        let fields = self.field_map_for(&ty);
        for pair in table.pairs::<LuaValue, LuaValue>() {
            let (key, item) = pair?;
            let Some(index) = key_name(&key).and_then(|name| fields.get(&name).copied()) else {
                continue;
            };
            let field = &ty.fields()[index];
            if !field.is_settable() {
                continue;
            }
            let decoded = match self.decode(&item, &field.ty) {
                Ok(decoded) => decoded,
                Err(err) if err.is_recoverable() => {
                    tracing::trace!(
                        target: "luar::decode",
                        field = %field.name,
                        ty = %ty,
                        error = %err,
                        "skipping struct field"
                    );
                    continue;
                }
                Err(err) => return Err(err),
            };
            if let Err(err) = target.borrow_mut().set_field_at(index, decoded) {
                tracing::trace!(target: "luar::decode", field = %field.name, error = %err, "skipping struct field");
            }
        }
        Ok(())
    }

    fn field_map_for(&mut self, ty: &Type) -> Rc<FieldMap> {
        let tag_key = &self.tag_key;
        self.field_maps
            .entry(ty.descriptor_id())
            .or_insert_with(|| Rc::new(field_map(ty, tag_key)))
            .clone()
    }
}

/// Numbers are double precision on the script side.
fn decode_float(n: f64, dest: &Type) -> Option<Value> {
    match dest.kind() {
        TypeKind::Int(_) | TypeKind::Uint(_) | TypeKind::Float(_) | TypeKind::Interface => {
            Value::float(n).convert(dest)
        }
        TypeKind::Complex(_) => Value::complex(n, 0.0).convert(dest),
        _ => None,
    }
}

fn null_to_zero(value: Value, ty: &Type) -> Value {
    let null = value.is_null() || value.elem().is_some_and(Value::is_null);
    if null { Value::zero(ty) } else { value }
}

fn table_is_empty(table: &Table) -> bool {
    table.pairs::<LuaValue, LuaValue>().next().is_none()
}

/// Resolve a table seen earlier in this call to the value produced for it.
fn reuse(existing: Value, dest: &Type) -> Result<Value, ConversionError> {
    if let Some(converted) = existing.convert(dest) {
        return Ok(converted);
    }
    if let Some(target) = existing.deref() {
        if let Some(converted) = target.convert(dest) {
            return Ok(converted);
        }
    }
    if let TypeKind::Pointer(elem) = dest.kind() {
        if let Some(converted) = existing.convert(elem) {
            return Ok(Value::pointer_as(dest, converted));
        }
    }
    Err(ConversionError::mismatch(existing.ty().to_string(), dest))
}

/// Convert a Lua value to a host value of type `ty`.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn lua_to_host(lua: &Lua, value: &LuaValue, ty: &Type) -> Result<Value, ConversionError> {
    Decoder::new(lua).decode(value, ty)
}

/// Convert a Lua value and store it through `dest`, which must be a non-nil
/// pointer. Nothing is decoded otherwise.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn lua_to_host_into(lua: &Lua, value: &LuaValue, dest: &Value) -> Result<(), ConversionError> {
    let (TypeKind::Pointer(elem), Repr::Pointer(Some(_))) = (dest.kind(), dest.repr()) else {
        return Err(ConversionError::NotAPointer {
            ty: dest.ty().to_string(),
        });
    };
    let decoded = lua_to_host(lua, value, elem)?;
    dest.store(decoded)?;
    Ok(())
}
