//! Host functions callable from Lua.
//!
//! A bridged call decodes each Lua argument into the declared parameter
//! type, packs trailing arguments of a variadic function into one slice,
//! calls the host function with panic recovery and pushes every result back
//! in proxy mode. Struct results are boxed behind a fresh pointer first so
//! they stay proxies rather than being copied into tables.
//!
//! Failures surface in Lua as errors prefixed with the caller's position,
//! e.g. `chunk:3: cannot convert host function arguments: ...`.

use luar_core::{HostFn, NativeError, TypeKind, Value};
use mlua::{Function, Lua, MultiValue, Value as LuaValue, Variadic};

use crate::error::ConversionError;
use crate::from_lua::lua_to_host;
use crate::to_lua::host_to_lua_proxy;

/// Wrap a host function as a Lua function.
pub fn wrap_fn(lua: &Lua, f: HostFn) -> mlua::Result<Function> {
    lua.create_function(move |lua, args: Variadic<LuaValue>| call(lua, &f, &args))
}

/// Position of the calling Lua code, as `chunk:line: `, or empty when the
/// caller has no line information.
pub fn where_prefix(lua: &Lua) -> String {
    let Some(frame) = lua.inspect_stack(1) else {
        return String::new();
    };
    let line = frame.curr_line();
    if line <= 0 {
        return String::new();
    }
    let source = frame.source();
    format!("{}:{line}: ", source.short_src.as_deref().unwrap_or("?"))
}

/// A Lua error carrying the caller's position.
pub fn raise(lua: &Lua, message: impl std::fmt::Display) -> mlua::Error {
    mlua::Error::RuntimeError(format!("{}{message}", where_prefix(lua)))
}

fn call(lua: &Lua, f: &HostFn, args: &[LuaValue]) -> mlua::Result<MultiValue> {
    let host_args = decode_args(lua, f, args)
        .map_err(|err| raise(lua, format!("cannot convert host function arguments: {err}")))?;

    let results = f.call_guarded(host_args).map_err(|err| {
        tracing::debug!(target: "luar::bridge", function = %f.ty(), error = %err, "host call failed");
        match err {
            NativeError::Panic { message } => raise(lua, format!("error {message}")),
            other => raise(lua, other),
        }
    })?;

    let mut pushed = Vec::with_capacity(results.len());
    for result in results {
        let result = match result.kind() {
            TypeKind::Struct(_) => Value::pointer_to(result),
            _ => result,
        };
        pushed.push(host_to_lua_proxy(lua, &result)?);
    }
    Ok(pushed.into_iter().collect())
}

fn decode_args(lua: &Lua, f: &HostFn, args: &[LuaValue]) -> Result<Vec<Value>, ConversionError> {
    let signature = f.signature();
    let fixed = signature.fixed_params();
    let mut host_args = Vec::with_capacity(signature.params.len());
    for (i, ty) in fixed.iter().enumerate() {
        let arg = args.get(i).unwrap_or(&LuaValue::Nil);
        host_args.push(lua_to_host(lua, arg, ty)?);
    }

    if let (Some(slice_ty), Some(elem)) = (signature.params.last(), signature.variadic_elem()) {
        let extra = args.get(fixed.len()..).unwrap_or_default();
        let mut packed = Value::make(slice_ty, extra.len())?;
        for (i, arg) in extra.iter().enumerate() {
            packed.set_index(i, lua_to_host(lua, arg, elem)?)?;
        }
        host_args.push(packed);
    }
    Ok(host_args)
}
