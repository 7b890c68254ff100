//! Conversion benchmarks.
//!
//! - copy: host slices, maps and structs copied into Lua tables
//! - decode: Lua tables decoded back into host values
//! - proxy: field access through proxies and bridged calls
//!
//! ## Profiling with Puffin
//!
//! ```bash
//! cargo bench --features profile-with-puffin -- --profile-time 5
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use luar::{
    Field, HostFn, Signature, Type, Value, host_to_lua, host_to_lua_proxy, lua_to_host, register,
    Target,
};
use mlua::{Lua, Value as LuaValue};
use std::hint::black_box;

#[cfg(feature = "profile-with-puffin")]
use std::collections::HashMap;

#[cfg(feature = "profile-with-puffin")]
static FRAME_VIEW: std::sync::OnceLock<puffin::GlobalFrameView> = std::sync::OnceLock::new();

#[cfg(feature = "profile-with-puffin")]
fn setup_profiler() {
    puffin::set_scopes_on(true);
    FRAME_VIEW.get_or_init(puffin::GlobalFrameView::default);
}

#[cfg(not(feature = "profile-with-puffin"))]
fn setup_profiler() {}

#[cfg(feature = "profile-with-puffin")]
fn end_profiling_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}

#[cfg(not(feature = "profile-with-puffin"))]
fn end_profiling_frame() {}

/// Print the total time of each top-level scope across recorded frames.
#[cfg(feature = "profile-with-puffin")]
fn print_profiling_stats() {
    use puffin::Reader;

    let Some(frame_view) = FRAME_VIEW.get() else {
        return;
    };
    let view = frame_view.lock();
    let scope_collection = view.scope_collection();

    let mut scope_timings: HashMap<String, i64> = HashMap::new();
    for frame in view.recent_frames() {
        let Ok(unpacked) = frame.unpacked() else {
            continue;
        };
        for (_thread_info, stream_info) in unpacked.thread_streams.iter() {
            let reader = Reader::from_start(&stream_info.stream);
            if let Ok(scopes) = reader.read_top_scopes() {
                for scope in scopes {
                    if let Some(details) = scope_collection.fetch_by_id(&scope.id) {
                        *scope_timings.entry(details.name().to_string()).or_insert(0) +=
                            scope.record.duration_ns;
                    }
                }
            }
        }
    }

    let mut entries: Vec<_> = scope_timings.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    println!("\n=== Profiling Summary ===");
    for (name, ns) in entries {
        println!(
            "  {:30} {:>10.2?}",
            name,
            std::time::Duration::from_nanos(ns as u64)
        );
    }
}

#[cfg(not(feature = "profile-with-puffin"))]
fn print_profiling_stats() {}

fn point_type() -> Type {
    Type::named_struct(
        "Point",
        vec![
            Field::new("X", Type::float64()).with_tag("lua", "x"),
            Field::new("Y", Type::float64()).with_tag("lua", "y"),
            Field::new("Label", Type::string()),
        ],
    )
}

fn points(n: usize) -> Value {
    let point = point_type();
    let items = (0..n)
        .map(|i| {
            Value::structure(
                &point,
                vec![
                    Value::float(i as f64),
                    Value::float(i as f64 * 0.5),
                    Value::string(format!("p{i}")),
                ],
            )
            .unwrap()
        })
        .collect();
    Value::slice(&point, items)
}

fn copy_benchmarks(c: &mut Criterion) {
    setup_profiler();
    let lua = Lua::new();
    let mut group = c.benchmark_group("convert/copy");

    for n in [10usize, 100, 1000] {
        let ints = Value::slice(&Type::int(), (0..n as i64).map(Value::int).collect());
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("int_slice", n), &ints, |b, ints| {
            b.iter(|| {
                let table = host_to_lua(&lua, black_box(ints)).unwrap();
                end_profiling_frame();
                black_box(table)
            });
        });

        let structs = points(n);
        group.bench_with_input(BenchmarkId::new("struct_slice", n), &structs, |b, structs| {
            b.iter(|| {
                let table = host_to_lua(&lua, black_box(structs)).unwrap();
                end_profiling_frame();
                black_box(table)
            });
        });

        let map = Value::map(
            &Type::string(),
            &Type::int(),
            (0..n as i64).map(|i| (Value::string(format!("k{i}")), Value::int(i))),
        );
        group.bench_with_input(BenchmarkId::new("string_map", n), &map, |b, map| {
            b.iter(|| {
                let table = host_to_lua(&lua, black_box(map)).unwrap();
                end_profiling_frame();
                black_box(table)
            });
        });
    }

    group.finish();
    print_profiling_stats();
}

fn decode_benchmarks(c: &mut Criterion) {
    setup_profiler();
    let lua = Lua::new();
    let point = point_type();
    let dest = Type::slice(&point);
    let mut group = c.benchmark_group("convert/decode");

    for n in [10usize, 100, 1000] {
        let table: LuaValue = lua
            .load(format!(
                "local t = {{}} for i = 1, {n} do t[i] = {{ x = i, y = i / 2, Label = 'p' .. i }} end return t"
            ))
            .eval()
            .unwrap();
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("struct_slice", n), &table, |b, table| {
            b.iter(|| {
                let value = lua_to_host(&lua, black_box(table), &dest).unwrap();
                end_profiling_frame();
                black_box(value)
            });
        });
    }

    group.finish();
    print_profiling_stats();
}

fn proxy_benchmarks(c: &mut Criterion) {
    setup_profiler();
    let lua = Lua::new();
    let point = point_type();
    let p = Value::pointer_to(
        Value::structure(
            &point,
            vec![Value::float(1.0), Value::float(2.0), Value::string("p")],
        )
        .unwrap(),
    );
    let add = HostFn::from_fn(
        Signature::new(vec![Type::int(), Type::int()], vec![Type::int()]),
        |args| {
            let a = args[0].as_i64().unwrap_or(0);
            let b = args[1].as_i64().unwrap_or(0);
            Ok(vec![Value::int(a + b)])
        },
    );
    lua.globals()
        .set("p", host_to_lua_proxy(&lua, &p).unwrap())
        .unwrap();
    register(&lua, Target::Globals, [("add", Value::func(add))]).unwrap();

    let field_loop = lua
        .load("local s = 0 for i = 1, 1000 do p.x = i s = s + p.x end return s")
        .into_function()
        .unwrap();
    let call_loop = lua
        .load("local s = 0 for i = 1, 1000 do s = add(s, i) end return s")
        .into_function()
        .unwrap();

    let mut group = c.benchmark_group("convert/proxy");
    group.throughput(Throughput::Elements(1000));
    group.bench_function("field_read_write_1000", |b| {
        b.iter(|| {
            let sum: f64 = field_loop.call(()).unwrap();
            end_profiling_frame();
            black_box(sum)
        });
    });
    group.bench_function("bridged_call_1000", |b| {
        b.iter(|| {
            let sum: i64 = call_loop.call(()).unwrap();
            end_profiling_frame();
            black_box(sum)
        });
    });

    group.finish();
    print_profiling_stats();
}

criterion_group!(
    benches,
    copy_benchmarks,
    decode_benchmarks,
    proxy_benchmarks
);
criterion_main!(benches);
