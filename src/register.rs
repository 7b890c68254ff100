//! Installing host values into Lua tables.

use luar_core::{HostFn, NativeError, Signature, Type, Value};
use mlua::{Lua, Table, Value as LuaValue};

use crate::error::ConversionError;
use crate::from_lua::script_type_name;
use crate::proxy::unwrap_proxy;
use crate::to_lua::{host_to_lua, host_to_lua_proxy};

/// Where [`register`] installs its values.
#[derive(Debug, Clone)]
pub enum Target {
    /// The global table.
    Globals,
    /// A global table of this name, created if absent.
    Named(String),
    /// A table the caller already holds.
    Table(Table),
}

impl Target {
    pub fn named(name: impl Into<String>) -> Self {
        Target::Named(name.into())
    }

    fn resolve(self, lua: &Lua) -> Result<Table, ConversionError> {
        match self {
            Target::Globals => Ok(lua.globals()),
            Target::Named(name) => {
                let globals = lua.globals();
                match globals.get::<LuaValue>(name.as_str())? {
                    LuaValue::Nil => {
                        let table = lua.create_table()?;
                        globals.set(name.as_str(), table.clone())?;
                        Ok(table)
                    }
                    LuaValue::Table(table) => Ok(table),
                    other => Err(ConversionError::mismatch(
                        script_type_name(&other),
                        format!("table `{name}`"),
                    )),
                }
            }
            Target::Table(table) => Ok(table),
        }
    }
}

/// Convert each value in proxy mode and install it under its name in
/// `target`. Functions become callable Lua functions. Returns the table.
///
/// # Example
///
/// ```
/// use luar::{HostFn, Signature, Target, Type, Value, register};
///
/// let lua = mlua::Lua::new();
/// let double = HostFn::from_fn(
///     Signature::new(vec![Type::int()], vec![Type::int()]),
///     |args| Ok(vec![Value::int(args[0].as_i64().unwrap_or(0) * 2)]),
/// );
/// register(
///     &lua,
///     Target::named("util"),
///     [("double", Value::func(double)), ("answer", Value::int(42))],
/// )
/// .unwrap();
/// assert_eq!(lua.load("return util.double(util.answer)").eval::<i64>().unwrap(), 84);
/// ```
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn register<'a, I>(lua: &Lua, target: Target, values: I) -> Result<Table, ConversionError>
where
    I: IntoIterator<Item = (&'a str, Value)>,
{
    let table = target.resolve(lua)?;
    for (name, value) in values {
        let encoded = host_to_lua_proxy(lua, &value)?;
        table.set(name, encoded)?;
        tracing::debug!(target: "luar::register", name, ty = %value.ty(), "registered");
    }
    Ok(table)
}

/// Create a Lua state with the standard library and the `luar` helper table:
///
/// - `luar.null`: the Null sentinel
/// - `luar.unproxify(v)`: copy a proxy's value into plain Lua values
/// - `luar.type(v)`: the host type name of a proxy, or the Lua type name
/// - `luar.slice(n)`, `luar.map()`, `luar.complex(re, im)`, `luar.chan(n)`:
///   fresh host values
pub fn init() -> Result<Lua, ConversionError> {
    let lua = Lua::new();
    let helpers = lua.create_table()?;

    helpers.set(
        "unproxify",
        lua.create_function(|lua, value: LuaValue| match unwrap_proxy(&value) {
            Some(host) => Ok(host_to_lua(lua, &host)?),
            None => Ok(value),
        })?,
    )?;
    helpers.set(
        "type",
        lua.create_function(|lua, value: LuaValue| {
            let name = match unwrap_proxy(&value) {
                Some(host) => host.ty().to_string(),
                None => script_type_name(&value).to_string(),
            };
            lua.create_string(&name)
        })?,
    )?;

    register(
        &lua,
        Target::Table(helpers.clone()),
        [
            ("null", Value::null()),
            ("slice", Value::func(make_fn(Type::slice(&Type::any()), true))),
            (
                "map",
                Value::func(make_fn(Type::map(&Type::string(), &Type::any()), false)),
            ),
            ("chan", Value::func(make_fn(Type::chan(&Type::any()), true))),
            ("complex", Value::func(complex_fn())),
        ],
    )?;

    lua.globals().set("luar", helpers)?;
    tracing::debug!(target: "luar::register", "initialized lua state");
    Ok(lua)
}

/// A host function returning `Value::make(ty, n)`, taking `n` when `sized`.
fn make_fn(ty: Type, sized: bool) -> HostFn {
    let params = if sized { vec![Type::int()] } else { Vec::new() };
    let signature = Signature::new(params, vec![ty.clone()]);
    HostFn::from_fn(signature, move |args| {
        let len = match args.first().and_then(Value::as_i64) {
            Some(n) => usize::try_from(n)
                .map_err(|_| NativeError::other(format!("negative length {n} for {ty}")))?,
            None => 0,
        };
        Ok(vec![Value::make(&ty, len)?])
    })
}

fn complex_fn() -> HostFn {
    let signature = Signature::new(
        vec![Type::float64(), Type::float64()],
        vec![Type::complex128()],
    );
    HostFn::from_fn(signature, |args| {
        let part = |i: usize| args.get(i).and_then(Value::as_f64).unwrap_or(0.0);
        Ok(vec![Value::complex(part(0), part(1))])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_target_rejects_non_tables() {
        let lua = Lua::new();
        lua.globals().set("taken", 5).unwrap();
        let err = register(&lua, Target::named("taken"), [("x", Value::int(1))]).unwrap_err();
        assert_eq!(err.to_string(), "cannot convert number to table `taken`");
    }

    #[test]
    fn named_target_is_reused() {
        let lua = Lua::new();
        register(&lua, Target::named("ns"), [("a", Value::int(1))]).unwrap();
        register(&lua, Target::named("ns"), [("b", Value::int(2))]).unwrap();
        assert_eq!(lua.load("return ns.a + ns.b").eval::<i64>().unwrap(), 3);
    }

    #[test]
    fn init_installs_helpers() {
        let lua = init().unwrap();
        let ok: bool = lua
            .load(
                r#"
                local s = luar.slice(2)
                s[1] = "a"
                local m = luar.map()
                m.k = 1
                return #s == 2 and m.k == 1 and luar.type(s) == "[]interface {}"
                    and luar.type(3) == "number"
                "#,
            )
            .eval()
            .unwrap();
        assert!(ok);
    }

    #[test]
    fn negative_slice_length_raises() {
        let lua = init().unwrap();
        let err = lua.load("return luar.slice(-1)").exec().unwrap_err();
        assert!(err.to_string().contains("negative length -1"));
    }
}
