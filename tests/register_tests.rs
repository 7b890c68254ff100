mod test_harness;

use luar::{
    ConversionError, HostFn, LuaObject, Signature, Target, Type, Value, lua_to_host, register,
};
use mlua::{Lua, Value as LuaValue};
use test_harness::*;

#[test]
fn test_register_globals() {
    let lua = Lua::new();
    let names = Value::slice(&Type::string(), vec![Value::string("ann"), Value::string("bo")]);
    register(
        &lua,
        Target::Globals,
        [("names", names.clone()), ("limit", Value::int(3))],
    )
    .unwrap();

    lua.load("names[1] = 'cy'").exec().unwrap();
    assert_eq!(names.index(0).unwrap().as_str(), Some("cy"));
    let limit: i64 = eval(&lua, "return limit");
    assert_eq!(limit, 3);
}

#[test]
fn test_register_named_table() {
    let lua = Lua::new();
    let table = register(&lua, Target::named("game"), [("level", Value::int(1))]).unwrap();
    register(&lua, Target::named("game"), [("lives", Value::int(3))]).unwrap();

    assert_eq!(table.get::<i64>("lives").unwrap(), 3);
    let total: i64 = eval(&lua, "return game.level + game.lives");
    assert_eq!(total, 4);
}

#[test]
fn test_register_named_rejects_non_table() {
    let lua = Lua::new();
    lua.globals().set("game", "taken").unwrap();
    let err = register(&lua, Target::named("game"), [("level", Value::int(1))]).unwrap_err();
    assert!(matches!(err, ConversionError::TypeMismatch { .. }));
}

#[test]
fn test_register_into_table() {
    let lua = Lua::new();
    let table = lua.create_table().unwrap();
    register(&lua, Target::Table(table.clone()), [("greeting", Value::string("hi"))]).unwrap();
    assert_eq!(table.get::<String>("greeting").unwrap(), "hi");
    assert!(lua.globals().get::<mlua::Value>("greeting").unwrap().is_nil());
}

#[test]
fn test_init_constructors() {
    let lua = lua();
    let (len, re, received, kind): (i64, f64, String, String) = eval(
        &lua,
        r#"
        local s = luar.slice(3)
        local m = luar.map()
        m.name = "x"
        local c = luar.complex(1.5, 2)
        local ch = luar.chan(1)
        ch:send(m.name)
        return #s, c.real, ch:recv(), luar.type(m)
        "#,
    );
    assert_eq!(len, 3);
    assert_eq!(re, 1.5);
    assert_eq!(received, "x");
    assert_eq!(kind, "map[string]interface {}");
}

#[test]
fn test_init_type_of_plain_values() {
    let lua = lua();
    let names: Vec<String> = eval(
        &lua,
        "return { luar.type(1), luar.type('s'), luar.type({}), luar.type(nil) }",
    );
    assert_eq!(names, ["number", "string", "table", "nil"]);
}

#[test]
fn test_null_decodes_to_zero() {
    let lua = lua();
    let null = eval(&lua, "return luar.null");
    let v = lua_to_host(&lua, &null, &Type::slice(&Type::int())).unwrap();
    assert!(v.is_nil());
    let v = lua_to_host(&lua, &null, &Type::int()).unwrap();
    assert_eq!(v.as_i64(), Some(0));
}

#[test]
fn test_unproxify_passes_plain_values() {
    let lua = lua();
    let same: bool = eval(&lua, "local t = {} return luar.unproxify(t) == t and luar.unproxify(4) == 4");
    assert!(same);
}

#[test]
fn test_register_native_function() {
    let lua = lua();
    let native = lua.create_function(|_, (a, b): (i64, i64)| Ok(a * b)).unwrap();
    let inc = HostFn::from_fn(
        Signature::new(vec![Type::int()], vec![Type::int()]),
        |args| Ok(vec![Value::int(args[0].as_i64().unwrap_or(0) + 1)]),
    );
    register(
        &lua,
        Target::named("calc"),
        [
            ("mul", LuaObject::new(LuaValue::Function(native.clone())).into_value()),
            ("inc", Value::func(inc)),
        ],
    )
    .unwrap();
    lua.globals().set("native", native).unwrap();

    let (product, same): (i64, bool) = eval(
        &lua,
        "return calc.mul(calc.inc(2), 4), calc.mul == native",
    );
    assert_eq!(product, 12);
    assert!(same);
}
