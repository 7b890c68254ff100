// tests/test_harness.rs
//! Shared fixtures for the integration tests.
//!
//! Each test file pulls this in with `mod test_harness;` and drives a real
//! Lua state through the public API.

#![allow(dead_code)]

use luar::{Field, Type, Value};
use mlua::{FromLuaMulti, Lua, Value as LuaValue};

/// A state with the `luar` helper table installed.
pub fn lua() -> Lua {
    luar::init().unwrap_or_else(|e| panic!("failed to initialize lua: {e}"))
}

/// Evaluate `chunk` and return its first result.
pub fn eval<R: FromLuaMulti>(lua: &Lua, chunk: &str) -> R {
    lua.load(chunk)
        .set_name("=test")
        .eval()
        .unwrap_or_else(|e| panic!("chunk failed: {e}\n{chunk}"))
}

/// Run `chunk` and return the error it raises.
pub fn eval_err(lua: &Lua, chunk: &str) -> String {
    match lua.load(chunk).set_name("=test").exec() {
        Ok(()) => panic!("expected an error from:\n{chunk}"),
        Err(e) => e.to_string(),
    }
}

/// Bind `value` to the global `name`, copying composites.
pub fn set_copy(lua: &Lua, name: &str, value: &Value) {
    let encoded = luar::host_to_lua(lua, value).unwrap();
    lua.globals().set(name, encoded).unwrap();
}

/// Bind `value` to the global `name` in proxy mode.
pub fn set_proxy(lua: &Lua, name: &str, value: &Value) {
    let encoded = luar::host_to_lua_proxy(lua, value).unwrap();
    lua.globals().set(name, encoded).unwrap();
}

pub fn global(lua: &Lua, name: &str) -> LuaValue {
    lua.globals().get(name).unwrap()
}

/// `Point { X int \`lua:"x"\`, Y int \`lua:"y"\` }`
pub fn point_type() -> Type {
    Type::named_struct(
        "Point",
        vec![
            Field::new("X", Type::int()).with_tag("lua", "x"),
            Field::new("Y", Type::int()).with_tag("lua", "y"),
        ],
    )
}

pub fn point(x: i64, y: i64) -> Value {
    Value::structure(&point_type(), vec![Value::int(x), Value::int(y)]).unwrap()
}

/// `Node { Value int, Next *Node }`
pub fn node_type() -> Type {
    let node = Type::declare_struct("Node");
    node.define_fields(vec![
        Field::new("Value", Type::int()),
        Field::new("Next", Type::pointer(&node)),
    ])
    .unwrap();
    node
}

/// A pointer to a new node holding `value` with a nil `Next`.
pub fn node(node_ty: &Type, value: i64) -> Value {
    Value::pointer_to(
        Value::structure(
            node_ty,
            vec![Value::int(value), Value::zero(&Type::pointer(node_ty))],
        )
        .unwrap(),
    )
}

/// Point the `Next` field of node `from` at `to`.
pub fn link(from: &Value, to: &Value) {
    let cell = from.pointee().unwrap();
    cell.borrow_mut().set_field("Next", to.clone()).unwrap();
}
