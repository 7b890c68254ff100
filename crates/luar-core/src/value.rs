//! Host values.
//!
//! A [`Value`] pairs a [`Type`] with its representation. Scalars, arrays and
//! structs are stored by value. Slices, maps, pointers, channels and
//! functions are reference types: cloning the `Value` shares the underlying
//! cell, and [`Value::identity`] exposes the cell address used to detect
//! shared and cyclic structure.
//!
//! # Example
//!
//! ```
//! use luar_core::{Type, Value};
//!
//! let list = Value::slice(&Type::any(), vec![Value::int(1)]);
//! let alias = list.clone();
//! assert_eq!(list.identity(), alias.identity());
//!
//! let mut list = list;
//! list.set_index(0, alias.clone()).unwrap();
//! let first = list.index(0).unwrap();
//! assert_eq!(first.elem().unwrap().identity(), alias.identity());
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt::{self, Debug, Display, Formatter};
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::ValueError;
use crate::native_fn::HostFn;
use crate::types::{FloatWidth, IntWidth, Type, TypeKind};

/// A shared, mutable cell. Backs every host reference type.
pub type Shared<T> = Rc<RefCell<T>>;

fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

fn addr<T: ?Sized>(rc: &Rc<T>) -> usize {
    Rc::as_ptr(rc) as *const () as usize
}

/// Representation of a host value. `None` marks the nil state of a
/// reference kind.
#[derive(Clone)]
pub enum Repr {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Complex(f64, f64),
    Str(String),
    Array(Vec<Value>),
    Slice(Option<Shared<Vec<Value>>>),
    Map(Option<Shared<HostMap>>),
    Struct(Vec<Value>),
    Pointer(Option<Shared<Value>>),
    Chan(Option<Shared<VecDeque<Value>>>),
    Func(Option<HostFn>),
    Interface(Option<Box<Value>>),
    Opaque(Option<Rc<dyn Any>>),
    Null,
}

/// Hashable projection of a map key.
///
/// Scalars hash by value, reference kinds by identity and arrays/structs
/// element-wise. Interface keys project their dynamic value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Nil,
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(u64),
    Complex(u64, u64),
    Str(String),
    Ref(usize),
    Composite(Vec<MapKey>),
}

fn float_bits(f: f64) -> u64 {
    // +0.0 and -0.0 are the same key.
    if f == 0.0 { 0 } else { f.to_bits() }
}

impl MapKey {
    pub fn of(value: &Value) -> MapKey {
        match &value.repr {
            Repr::Bool(b) => MapKey::Bool(*b),
            Repr::Int(i) => MapKey::Int(*i),
            Repr::Uint(u) => MapKey::Uint(*u),
            Repr::Float(f) => MapKey::Float(float_bits(*f)),
            Repr::Complex(re, im) => MapKey::Complex(float_bits(*re), float_bits(*im)),
            Repr::Str(s) => MapKey::Str(s.clone()),
            Repr::Array(items) | Repr::Struct(items) => {
                MapKey::Composite(items.iter().map(MapKey::of).collect())
            }
            Repr::Interface(Some(inner)) => MapKey::of(inner),
            Repr::Null => MapKey::Null,
            _ => value.identity().map_or(MapKey::Nil, MapKey::Ref),
        }
    }
}

/// Storage of a host map.
#[derive(Clone, Default)]
pub struct HostMap {
    entries: FxHashMap<MapKey, (Value, Value)>,
}

impl HostMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.get(&MapKey::of(key)).map(|(_, v)| v)
    }

    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        self.entries
            .insert(MapKey::of(&key), (key, value))
            .map(|(_, old)| old)
    }

    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        self.entries.remove(&MapKey::of(key)).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.values().map(|(k, v)| (k, v))
    }
}

/// A typed host value.
#[derive(Clone)]
pub struct Value {
    ty: Type,
    repr: Repr,
}

/// Convert `value` to `ty` unless it already has that type.
fn coerce(value: Value, ty: &Type) -> Result<Value, ValueError> {
    if value.ty == *ty {
        return Ok(value);
    }
    value.convert(ty).ok_or_else(|| ValueError::TypeMismatch {
        expected: ty.to_string(),
        actual: value.ty.to_string(),
    })
}

fn narrow_int(v: i64, width: IntWidth) -> i64 {
    match width {
        IntWidth::W8 => v as i8 as i64,
        IntWidth::W16 => v as i16 as i64,
        IntWidth::W32 => v as i32 as i64,
        IntWidth::W64 | IntWidth::Size => v,
    }
}

fn narrow_uint(v: u64, width: IntWidth) -> u64 {
    match width {
        IntWidth::W8 => v as u8 as u64,
        IntWidth::W16 => v as u16 as u64,
        IntWidth::W32 => v as u32 as u64,
        IntWidth::W64 | IntWidth::Size => v,
    }
}

fn narrow_float(v: f64, width: FloatWidth) -> f64 {
    match width {
        FloatWidth::F32 => v as f32 as f64,
        FloatWidth::F64 => v,
    }
}

/// Numeric conversion; floats truncate toward zero, integers wrap.
fn cast_number(repr: &Repr, kind: &TypeKind) -> Option<Repr> {
    let (as_int, as_uint, as_float) = match *repr {
        Repr::Int(i) => (i, i as u64, i as f64),
        Repr::Uint(u) => (u as i64, u, u as f64),
        Repr::Float(f) => {
            let uint = if f < 0.0 { f as i64 as u64 } else { f as u64 };
            (f as i64, uint, f)
        }
        _ => return None,
    };
    match kind {
        TypeKind::Int(w) => Some(Repr::Int(narrow_int(as_int, *w))),
        TypeKind::Uint(w) => Some(Repr::Uint(narrow_uint(as_uint, *w))),
        TypeKind::Float(w) => Some(Repr::Float(narrow_float(as_float, *w))),
        _ => None,
    }
}

impl Value {
    /// Pair a type with a representation. The caller keeps them consistent.
    pub fn new(ty: Type, repr: Repr) -> Self {
        Self { ty, repr }
    }

    /// The untyped nil: a nil `interface {}`.
    pub fn nil() -> Self {
        Self::new(Type::any(), Repr::Interface(None))
    }

    /// The Null sentinel, marking an explicitly absent element.
    pub fn null() -> Self {
        Self::new(Type::null(), Repr::Null)
    }

    pub fn bool(b: bool) -> Self {
        Self::new(Type::bool(), Repr::Bool(b))
    }

    pub fn int(i: i64) -> Self {
        Self::new(Type::int(), Repr::Int(i))
    }

    pub fn uint(u: u64) -> Self {
        Self::new(Type::uint(), Repr::Uint(u))
    }

    pub fn float(f: f64) -> Self {
        Self::new(Type::float64(), Repr::Float(f))
    }

    pub fn complex(re: f64, im: f64) -> Self {
        Self::new(Type::complex128(), Repr::Complex(re, im))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::new(Type::string(), Repr::Str(s.into()))
    }

    pub fn array(elem: &Type, items: Vec<Value>) -> Self {
        Self::new(Type::array(elem, items.len()), Repr::Array(items))
    }

    pub fn slice(elem: &Type, items: Vec<Value>) -> Self {
        Self::new(Type::slice(elem), Repr::Slice(Some(shared(items))))
    }

    pub fn map(key: &Type, value: &Type, entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        let mut map = HostMap::new();
        for (k, v) in entries {
            map.insert(k, v);
        }
        Self::new(Type::map(key, value), Repr::Map(Some(shared(map))))
    }

    pub fn structure(ty: &Type, fields: Vec<Value>) -> Result<Self, ValueError> {
        let expected = ty.fields().len();
        if !matches!(ty.kind(), TypeKind::Struct(_)) || fields.len() != expected {
            return Err(ValueError::FieldCount {
                ty: ty.to_string(),
                expected,
                got: fields.len(),
            });
        }
        let fields = fields
            .into_iter()
            .zip(ty.fields())
            .map(|(v, f)| coerce(v, &f.ty))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(ty.clone(), Repr::Struct(fields)))
    }

    /// Allocate a new cell holding `target` and point at it.
    pub fn pointer_to(target: Value) -> Self {
        Self::new(Type::pointer(&target.ty), Repr::Pointer(Some(shared(target))))
    }

    /// Like [`Value::pointer_to`], with an explicit pointer type `ty`.
    pub fn pointer_as(ty: &Type, target: Value) -> Self {
        Self::new(ty.clone(), Repr::Pointer(Some(shared(target))))
    }

    /// Box a value into an `interface {}`.
    pub fn boxed(inner: Value) -> Self {
        if inner.ty.is_interface() {
            return inner;
        }
        Self::new(Type::any(), Repr::Interface(Some(Box::new(inner))))
    }

    pub fn func(f: HostFn) -> Self {
        Self::new(f.ty(), Repr::Func(Some(f)))
    }

    pub fn chan(elem: &Type) -> Self {
        Self::new(Type::chan(elem), Repr::Chan(Some(shared(VecDeque::new()))))
    }

    pub fn opaque(ty: &Type, payload: Rc<dyn Any>) -> Self {
        Self::new(ty.clone(), Repr::Opaque(Some(payload)))
    }

    /// The zero value of `ty`: nil for reference kinds.
    pub fn zero(ty: &Type) -> Self {
        let repr = match ty.kind() {
            TypeKind::Bool => Repr::Bool(false),
            TypeKind::Int(_) => Repr::Int(0),
            TypeKind::Uint(_) => Repr::Uint(0),
            TypeKind::Float(_) => Repr::Float(0.0),
            TypeKind::Complex(_) => Repr::Complex(0.0, 0.0),
            TypeKind::String => Repr::Str(String::new()),
            TypeKind::Array { elem, len } => {
                Repr::Array((0..*len).map(|_| Value::zero(elem)).collect())
            }
            TypeKind::Slice(_) => Repr::Slice(None),
            TypeKind::Map { .. } => Repr::Map(None),
            TypeKind::Struct(def) => {
                Repr::Struct(def.fields().iter().map(|f| Value::zero(&f.ty)).collect())
            }
            TypeKind::Pointer(_) => Repr::Pointer(None),
            TypeKind::Chan(_) => Repr::Chan(None),
            TypeKind::Func(_) => Repr::Func(None),
            TypeKind::Interface => Repr::Interface(None),
            TypeKind::ScriptObject => Repr::Opaque(None),
            TypeKind::Null => Repr::Null,
        };
        Self::new(ty.clone(), repr)
    }

    /// Allocate a non-nil slice of `len` zero elements, an empty map or an
    /// empty channel, depending on the kind of `ty`.
    pub fn make(ty: &Type, len: usize) -> Result<Self, ValueError> {
        let repr = match ty.kind() {
            TypeKind::Slice(elem) => {
                Repr::Slice(Some(shared((0..len).map(|_| Value::zero(elem)).collect())))
            }
            TypeKind::Map { .. } => Repr::Map(Some(shared(HostMap::new()))),
            TypeKind::Chan(_) => Repr::Chan(Some(shared(VecDeque::with_capacity(len)))),
            _ => {
                return Err(ValueError::TypeMismatch {
                    expected: "slice, map or chan".to_string(),
                    actual: ty.to_string(),
                });
            }
        };
        Ok(Self::new(ty.clone(), repr))
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn repr(&self) -> &Repr {
        &self.repr
    }

    pub fn kind(&self) -> &TypeKind {
        self.ty.kind()
    }

    pub fn into_parts(self) -> (Type, Repr) {
        (self.ty, self.repr)
    }

    pub fn is_null(&self) -> bool {
        matches!(self.repr, Repr::Null)
    }

    /// Whether this is the nil state of a reference kind or interface.
    pub fn is_nil(&self) -> bool {
        matches!(
            self.repr,
            Repr::Slice(None)
                | Repr::Map(None)
                | Repr::Pointer(None)
                | Repr::Chan(None)
                | Repr::Func(None)
                | Repr::Interface(None)
                | Repr::Opaque(None)
        )
    }

    /// Address of the shared allocation behind a non-nil reference value.
    pub fn identity(&self) -> Option<usize> {
        match &self.repr {
            Repr::Slice(Some(rc)) => Some(addr(rc)),
            Repr::Map(Some(rc)) => Some(addr(rc)),
            Repr::Pointer(Some(rc)) => Some(addr(rc)),
            Repr::Chan(Some(rc)) => Some(addr(rc)),
            Repr::Func(Some(f)) => Some(f.identity()),
            Repr::Opaque(Some(rc)) => Some(addr(rc)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.repr {
            Repr::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.repr {
            Repr::Int(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self.repr {
            Repr::Uint(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.repr {
            Repr::Float(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_complex(&self) -> Option<(f64, f64)> {
        match self.repr {
            Repr::Complex(re, im) => Some((re, im)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.repr {
            Repr::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_func(&self) -> Option<&HostFn> {
        match &self.repr {
            Repr::Func(f) => f.as_ref(),
            _ => None,
        }
    }

    pub fn as_opaque(&self) -> Option<&Rc<dyn Any>> {
        match &self.repr {
            Repr::Opaque(payload) => payload.as_ref(),
            _ => None,
        }
    }

    /// The dynamic value held by a non-nil interface.
    pub fn elem(&self) -> Option<&Value> {
        match &self.repr {
            Repr::Interface(inner) => inner.as_deref(),
            _ => None,
        }
    }

    /// The cell a non-nil pointer refers to.
    pub fn pointee(&self) -> Option<&Shared<Value>> {
        match &self.repr {
            Repr::Pointer(cell) => cell.as_ref(),
            _ => None,
        }
    }

    /// A copy of the value a non-nil pointer refers to.
    pub fn deref(&self) -> Option<Value> {
        self.pointee().map(|cell| cell.borrow().clone())
    }

    /// Write through a pointer.
    pub fn store(&self, value: Value) -> Result<(), ValueError> {
        let TypeKind::Pointer(elem) = self.kind() else {
            return Err(ValueError::NotAPointer {
                ty: self.ty.to_string(),
            });
        };
        let cell = self.pointee().ok_or_else(|| ValueError::NilReference {
            ty: self.ty.to_string(),
        })?;
        let value = coerce(value, elem)?;
        *cell.borrow_mut() = value;
        Ok(())
    }

    /// Length of strings, arrays, slices, maps and channels.
    pub fn len(&self) -> Option<usize> {
        match &self.repr {
            Repr::Str(s) => Some(s.len()),
            Repr::Array(items) => Some(items.len()),
            Repr::Slice(items) => Some(items.as_ref().map_or(0, |rc| rc.borrow().len())),
            Repr::Map(map) => Some(map.as_ref().map_or(0, |rc| rc.borrow().len())),
            Repr::Chan(queue) => Some(queue.as_ref().map_or(0, |rc| rc.borrow().len())),
            _ => None,
        }
    }

    /// Element `index` (0-based) of an array or slice.
    pub fn index(&self, index: usize) -> Option<Value> {
        match &self.repr {
            Repr::Array(items) => items.get(index).cloned(),
            Repr::Slice(Some(rc)) => rc.borrow().get(index).cloned(),
            _ => None,
        }
    }

    pub fn set_index(&mut self, index: usize, value: Value) -> Result<(), ValueError> {
        let elem = match self.kind() {
            TypeKind::Array { elem, .. } | TypeKind::Slice(elem) => elem.clone(),
            _ => {
                return Err(ValueError::TypeMismatch {
                    expected: "array or slice".to_string(),
                    actual: self.ty.to_string(),
                });
            }
        };
        let value = coerce(value, &elem)?;
        match &mut self.repr {
            Repr::Array(items) => {
                let len = items.len();
                let slot = items
                    .get_mut(index)
                    .ok_or(ValueError::IndexOutOfRange { index, len })?;
                *slot = value;
            }
            Repr::Slice(Some(rc)) => {
                let mut items = rc.borrow_mut();
                let len = items.len();
                let slot = items
                    .get_mut(index)
                    .ok_or(ValueError::IndexOutOfRange { index, len })?;
                *slot = value;
            }
            _ => return Err(ValueError::IndexOutOfRange { index, len: 0 }),
        }
        Ok(())
    }

    /// Array or slice elements, copied out.
    pub fn elements(&self) -> Option<Vec<Value>> {
        match &self.repr {
            Repr::Array(items) => Some(items.clone()),
            Repr::Slice(items) => Some(items.as_ref().map_or_else(Vec::new, |rc| rc.borrow().clone())),
            _ => None,
        }
    }

    /// Struct field by declared name.
    pub fn field(&self, name: &str) -> Option<Value> {
        let index = self.ty.field_index(name)?;
        self.field_at(index)
    }

    pub fn field_at(&self, index: usize) -> Option<Value> {
        match &self.repr {
            Repr::Struct(fields) => fields.get(index).cloned(),
            _ => None,
        }
    }

    pub fn set_field(&mut self, name: &str, value: Value) -> Result<(), ValueError> {
        let index = self.ty.field_index(name).ok_or_else(|| ValueError::NoField {
            name: name.to_string(),
            ty: self.ty.to_string(),
        })?;
        self.set_field_at(index, value)
    }

    pub fn set_field_at(&mut self, index: usize, value: Value) -> Result<(), ValueError> {
        let field_ty = match self.ty.fields().get(index) {
            Some(field) => field.ty.clone(),
            None => {
                return Err(ValueError::IndexOutOfRange {
                    index,
                    len: self.ty.fields().len(),
                });
            }
        };
        let value = coerce(value, &field_ty)?;
        match &mut self.repr {
            Repr::Struct(fields) if index < fields.len() => {
                fields[index] = value;
                Ok(())
            }
            _ => Err(ValueError::TypeMismatch {
                expected: "struct".to_string(),
                actual: self.ty.to_string(),
            }),
        }
    }

    pub fn map_get(&self, key: &Value) -> Option<Value> {
        match &self.repr {
            Repr::Map(Some(rc)) => {
                let key = self.ty.key().and_then(|k| key.convert(k))?;
                rc.borrow().get(&key).cloned()
            }
            _ => None,
        }
    }

    pub fn map_insert(&self, key: Value, value: Value) -> Result<(), ValueError> {
        let TypeKind::Map {
            key: key_ty,
            value: value_ty,
        } = self.kind()
        else {
            return Err(ValueError::TypeMismatch {
                expected: "map".to_string(),
                actual: self.ty.to_string(),
            });
        };
        let Repr::Map(Some(rc)) = &self.repr else {
            return Err(ValueError::NilReference {
                ty: self.ty.to_string(),
            });
        };
        let key = coerce(key, key_ty)?;
        let value = coerce(value, value_ty)?;
        rc.borrow_mut().insert(key, value);
        Ok(())
    }

    pub fn map_remove(&self, key: &Value) -> Option<Value> {
        match &self.repr {
            Repr::Map(Some(rc)) => rc.borrow_mut().remove(key),
            _ => None,
        }
    }

    /// Map entries, copied out in unspecified order.
    pub fn entries(&self) -> Option<Vec<(Value, Value)>> {
        match &self.repr {
            Repr::Map(map) => Some(map.as_ref().map_or_else(Vec::new, |rc| {
                rc.borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })),
            _ => None,
        }
    }

    pub fn send(&self, value: Value) -> Result<(), ValueError> {
        let (TypeKind::Chan(elem), Repr::Chan(queue)) = (self.kind(), &self.repr) else {
            return Err(ValueError::TypeMismatch {
                expected: "chan".to_string(),
                actual: self.ty.to_string(),
            });
        };
        let queue = queue.as_ref().ok_or_else(|| ValueError::NilReference {
            ty: self.ty.to_string(),
        })?;
        queue.borrow_mut().push_back(coerce(value, elem)?);
        Ok(())
    }

    /// Take the oldest queued value, `None` if the channel is empty.
    pub fn recv(&self) -> Result<Option<Value>, ValueError> {
        match &self.repr {
            Repr::Chan(Some(queue)) => Ok(queue.borrow_mut().pop_front()),
            Repr::Chan(None) => Err(ValueError::NilReference {
                ty: self.ty.to_string(),
            }),
            _ => Err(ValueError::TypeMismatch {
                expected: "chan".to_string(),
                actual: self.ty.to_string(),
            }),
        }
    }

    /// Convert to `dest` following [`Type::convertible_to`].
    pub fn convert(&self, dest: &Type) -> Option<Value> {
        if dest.is_interface() {
            let repr = match &self.repr {
                Repr::Interface(_) => self.repr.clone(),
                _ => Repr::Interface(Some(Box::new(self.clone()))),
            };
            return Some(Self::new(dest.clone(), repr));
        }
        if !self.ty.convertible_to(dest) {
            return None;
        }
        let repr = match (&self.repr, dest.kind()) {
            (Repr::Int(_) | Repr::Uint(_) | Repr::Float(_), kind) => cast_number(&self.repr, kind)?,
            (Repr::Complex(re, im), TypeKind::Complex(w)) => {
                Repr::Complex(narrow_float(*re, *w), narrow_float(*im, *w))
            }
            _ => self.repr.clone(),
        };
        Some(Self::new(dest.clone(), repr))
    }

    /// Structural equality over the whole value graph. Cycle safe; map
    /// entry order is ignored; reference kinds without contents compare by
    /// identity.
    pub fn deep_eq(&self, other: &Value) -> bool {
        deep_eq(self, other, &mut FxHashSet::default())
    }
}

fn deep_eq_all(a: &[Value], b: &[Value], seen: &mut FxHashSet<(usize, usize)>) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| deep_eq(x, y, seen))
}

fn deep_eq(a: &Value, b: &Value, seen: &mut FxHashSet<(usize, usize)>) -> bool {
    if a.ty != b.ty {
        return false;
    }
    if let (Some(x), Some(y)) = (a.identity(), b.identity()) {
        if x == y || !seen.insert((x, y)) {
            return true;
        }
    }
    match (&a.repr, &b.repr) {
        (Repr::Bool(x), Repr::Bool(y)) => x == y,
        (Repr::Int(x), Repr::Int(y)) => x == y,
        (Repr::Uint(x), Repr::Uint(y)) => x == y,
        (Repr::Float(x), Repr::Float(y)) => x == y,
        (Repr::Complex(r1, i1), Repr::Complex(r2, i2)) => r1 == r2 && i1 == i2,
        (Repr::Str(x), Repr::Str(y)) => x == y,
        (Repr::Array(x), Repr::Array(y)) | (Repr::Struct(x), Repr::Struct(y)) => {
            deep_eq_all(x, y, seen)
        }
        (Repr::Slice(Some(x)), Repr::Slice(Some(y))) => {
            deep_eq_all(&x.borrow(), &y.borrow(), seen)
        }
        (Repr::Map(Some(x)), Repr::Map(Some(y))) => {
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| deep_eq(v, w, seen)))
        }
        (Repr::Pointer(Some(x)), Repr::Pointer(Some(y))) => deep_eq(&x.borrow(), &y.borrow(), seen),
        (Repr::Interface(Some(x)), Repr::Interface(Some(y))) => deep_eq(x, y, seen),
        (Repr::Null, Repr::Null) => true,
        _ => a.is_nil() && b.is_nil(),
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Bool(b) => write!(f, "{b}"),
            Repr::Int(i) => write!(f, "{i}"),
            Repr::Uint(u) => write!(f, "{u}"),
            Repr::Float(x) => write!(f, "{x}"),
            Repr::Complex(re, im) => write!(f, "({re}{im:+}i)"),
            Repr::Str(s) => f.write_str(s),
            Repr::Array(items) | Repr::Struct(items) => {
                let (open, close) = match &self.repr {
                    Repr::Array(_) => ('[', ']'),
                    _ => ('{', '}'),
                };
                write!(f, "{open}")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "{close}")
            }
            Repr::Interface(Some(inner)) => write!(f, "{inner}"),
            Repr::Null => f.write_str("null"),
            _ => match self.identity() {
                Some(id) => write!(f, "{}@{id:#x}", self.ty),
                None => f.write_str("<nil>"),
            },
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Value({}: {self})", self.ty)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}
