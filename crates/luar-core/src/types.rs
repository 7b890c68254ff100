//! Runtime type descriptors for host values.
//!
//! The conversion engine never introspects Rust types directly. Every host
//! value carries a [`Type`] describing its kind, its element/key/value types
//! and, for structs, its field table. Descriptors are reference counted and
//! cheap to clone.
//!
//! # Example
//!
//! ```
//! use luar_core::{Field, Type};
//!
//! let celsius = Type::named("Celsius", &Type::float64());
//! assert!(celsius.is_named());
//! assert_eq!(celsius.to_string(), "Celsius");
//!
//! let point = Type::named_struct(
//!     "Point",
//!     vec![
//!         Field::new("X", Type::int()).with_tag("lua", "x"),
//!         Field::new("Y", Type::int()).with_tag("lua", "y"),
//!     ],
//! );
//! assert_eq!(point.fields().len(), 2);
//! assert_eq!(Type::slice(&point).to_string(), "[]Point");
//! ```

use std::cell::OnceCell;
use std::fmt::{self, Debug, Display, Formatter};
use std::rc::Rc;

use bitflags::bitflags;

use crate::error::ValueError;
use crate::value::Value;

/// Bit width of an integer kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
    /// The platform-sized `int` / `uint`.
    Size,
}

/// Bit width of a floating point kind (also used for complex numbers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    F32,
    F64,
}

/// Renders a value of a failure-describing type as its message.
pub type DescribeFn = Rc<dyn Fn(&Value) -> String>;

bitflags! {
    /// Per-field flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FieldFlags: u8 {
        /// The field is visible to scripts and may be set from a script table.
        const EXPORTED = 1 << 0;
    }
}

/// A struct field: declared name, type, flags and `key:"value"` annotations.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    pub flags: FieldFlags,
    tags: Vec<(String, String)>,
}

impl Field {
    /// Create an exported field.
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            flags: FieldFlags::EXPORTED,
            tags: Vec::new(),
        }
    }

    /// Create a field that scripts cannot set.
    pub fn private(name: impl Into<String>, ty: Type) -> Self {
        Self {
            flags: FieldFlags::empty(),
            ..Self::new(name, ty)
        }
    }

    /// Attach an annotation, e.g. `with_tag("lua", "x")`.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Look up an annotation. An empty annotation counts as absent.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.as_str())
    }

    /// The key scripts use for this field: the `tag_key` annotation if
    /// present, otherwise the declared name.
    pub fn script_name(&self, tag_key: &str) -> &str {
        self.tag(tag_key).unwrap_or(&self.name)
    }

    pub fn is_settable(&self) -> bool {
        self.flags.contains(FieldFlags::EXPORTED)
    }
}

/// Parameter and result types of a host callable.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub params: Vec<Type>,
    pub results: Vec<Type>,
    /// When set, the last parameter is a slice receiving all trailing arguments.
    pub variadic: bool,
}

impl Signature {
    pub fn new(params: Vec<Type>, results: Vec<Type>) -> Self {
        Self {
            params,
            results,
            variadic: false,
        }
    }

    /// Create a variadic signature. The last parameter must be a slice type.
    pub fn variadic(params: Vec<Type>, results: Vec<Type>) -> Result<Self, ValueError> {
        let trailing_slice = matches!(params.last().map(Type::kind), Some(TypeKind::Slice(_)));
        if !trailing_slice {
            return Err(ValueError::TypeMismatch {
                expected: "slice as last variadic parameter".to_string(),
                actual: params
                    .last()
                    .map_or_else(|| "no parameters".to_string(), Type::to_string),
            });
        }
        Ok(Self {
            params,
            results,
            variadic: true,
        })
    }

    /// Parameters filled positionally, i.e. all but the variadic tail.
    pub fn fixed_params(&self) -> &[Type] {
        if self.variadic {
            &self.params[..self.params.len() - 1]
        } else {
            &self.params
        }
    }

    /// Element type of the variadic tail, if any.
    pub fn variadic_elem(&self) -> Option<&Type> {
        if !self.variadic {
            return None;
        }
        self.params.last().and_then(Type::elem)
    }
}

/// Field table of a struct type. May be filled after the type is created so
/// that a struct can point to itself.
#[derive(Clone, Default)]
pub struct StructDef {
    fields: OnceCell<Vec<Field>>,
}

impl StructDef {
    pub fn fields(&self) -> &[Field] {
        self.fields.get().map_or(&[], Vec::as_slice)
    }

    pub fn is_defined(&self) -> bool {
        self.fields.get().is_some()
    }
}

impl Debug for StructDef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.fields().iter().map(|field| &field.name))
            .finish()
    }
}

/// The closed set of host value kinds.
#[derive(Debug, Clone)]
pub enum TypeKind {
    Bool,
    Int(IntWidth),
    Uint(IntWidth),
    Float(FloatWidth),
    Complex(FloatWidth),
    String,
    Array { elem: Type, len: usize },
    Slice(Type),
    Map { key: Type, value: Type },
    Struct(StructDef),
    Pointer(Type),
    Chan(Type),
    Func(Signature),
    /// Fully dynamic: holds any value.
    Interface,
    /// An opaque handle to a script value.
    ScriptObject,
    /// Kind of the Null sentinel.
    Null,
}

struct TypeInfo {
    name: Option<String>,
    kind: TypeKind,
    describe: Option<DescribeFn>,
}

/// A shared runtime type descriptor.
#[derive(Clone)]
pub struct Type(Rc<TypeInfo>);

impl Type {
    fn from_kind(kind: TypeKind) -> Self {
        Type(Rc::new(TypeInfo {
            name: None,
            kind,
            describe: None,
        }))
    }

    pub fn bool() -> Self {
        Self::from_kind(TypeKind::Bool)
    }

    pub fn int() -> Self {
        Self::from_kind(TypeKind::Int(IntWidth::Size))
    }

    pub fn int8() -> Self {
        Self::from_kind(TypeKind::Int(IntWidth::W8))
    }

    pub fn int16() -> Self {
        Self::from_kind(TypeKind::Int(IntWidth::W16))
    }

    pub fn int32() -> Self {
        Self::from_kind(TypeKind::Int(IntWidth::W32))
    }

    pub fn int64() -> Self {
        Self::from_kind(TypeKind::Int(IntWidth::W64))
    }

    pub fn uint() -> Self {
        Self::from_kind(TypeKind::Uint(IntWidth::Size))
    }

    pub fn uint8() -> Self {
        Self::from_kind(TypeKind::Uint(IntWidth::W8))
    }

    pub fn uint16() -> Self {
        Self::from_kind(TypeKind::Uint(IntWidth::W16))
    }

    pub fn uint32() -> Self {
        Self::from_kind(TypeKind::Uint(IntWidth::W32))
    }

    pub fn uint64() -> Self {
        Self::from_kind(TypeKind::Uint(IntWidth::W64))
    }

    pub fn float32() -> Self {
        Self::from_kind(TypeKind::Float(FloatWidth::F32))
    }

    pub fn float64() -> Self {
        Self::from_kind(TypeKind::Float(FloatWidth::F64))
    }

    pub fn complex64() -> Self {
        Self::from_kind(TypeKind::Complex(FloatWidth::F32))
    }

    pub fn complex128() -> Self {
        Self::from_kind(TypeKind::Complex(FloatWidth::F64))
    }

    pub fn string() -> Self {
        Self::from_kind(TypeKind::String)
    }

    /// The fully dynamic `interface {}` type.
    pub fn any() -> Self {
        Self::from_kind(TypeKind::Interface)
    }

    pub fn script_object() -> Self {
        Self::from_kind(TypeKind::ScriptObject)
    }

    pub fn null() -> Self {
        Self::from_kind(TypeKind::Null)
    }

    pub fn array(elem: &Type, len: usize) -> Self {
        Self::from_kind(TypeKind::Array {
            elem: elem.clone(),
            len,
        })
    }

    pub fn slice(elem: &Type) -> Self {
        Self::from_kind(TypeKind::Slice(elem.clone()))
    }

    pub fn map(key: &Type, value: &Type) -> Self {
        Self::from_kind(TypeKind::Map {
            key: key.clone(),
            value: value.clone(),
        })
    }

    pub fn pointer(elem: &Type) -> Self {
        Self::from_kind(TypeKind::Pointer(elem.clone()))
    }

    pub fn chan(elem: &Type) -> Self {
        Self::from_kind(TypeKind::Chan(elem.clone()))
    }

    pub fn func(signature: Signature) -> Self {
        Self::from_kind(TypeKind::Func(signature))
    }

    /// An anonymous struct type.
    pub fn structure(fields: Vec<Field>) -> Self {
        let def = StructDef::default();
        let _ = def.fields.set(fields);
        Self::from_kind(TypeKind::Struct(def))
    }

    pub fn named_struct(name: impl Into<String>, fields: Vec<Field>) -> Self {
        let ty = Self::declare_struct(name);
        let _ = ty.define_fields(fields);
        ty
    }

    /// Declare a named struct whose fields are supplied later with
    /// [`Type::define_fields`], so fields may refer back to the type.
    pub fn declare_struct(name: impl Into<String>) -> Self {
        Type(Rc::new(TypeInfo {
            name: Some(name.into()),
            kind: TypeKind::Struct(StructDef::default()),
            describe: None,
        }))
    }

    pub fn define_fields(&self, fields: Vec<Field>) -> Result<(), ValueError> {
        match &self.0.kind {
            TypeKind::Struct(def) => def.fields.set(fields).map_err(|_| ValueError::AlreadyDefined {
                ty: self.to_string(),
            }),
            _ => Err(ValueError::TypeMismatch {
                expected: "struct".to_string(),
                actual: self.to_string(),
            }),
        }
    }

    /// A named variant of `underlying`, distinct from it for proxying purposes.
    pub fn named(name: impl Into<String>, underlying: &Type) -> Self {
        Type(Rc::new(TypeInfo {
            name: Some(name.into()),
            kind: underlying.0.kind.clone(),
            describe: None,
        }))
    }

    /// Give the type a failure-describing capability. Values of this type are
    /// then rendered to scripts as the returned message instead of proxied.
    ///
    /// This builds a new descriptor carrying the fields already defined.
    /// Field types that refer back to `self`, as in a type built with
    /// [`Type::declare_struct`], keep pointing at the old descriptor, so give
    /// such types their describe capability before referring to them.
    pub fn with_describe(self, describe: impl Fn(&Value) -> String + 'static) -> Self {
        Type(Rc::new(TypeInfo {
            name: self.0.name.clone(),
            kind: self.0.kind.clone(),
            describe: Some(Rc::new(describe)),
        }))
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn is_named(&self) -> bool {
        self.0.name.is_some()
    }

    pub fn kind(&self) -> &TypeKind {
        &self.0.kind
    }

    pub fn describe_fn(&self) -> Option<&DescribeFn> {
        self.0.describe.as_ref()
    }

    /// Struct fields, empty for every other kind.
    pub fn fields(&self) -> &[Field] {
        match &self.0.kind {
            TypeKind::Struct(def) => def.fields(),
            _ => &[],
        }
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields().iter().position(|f| f.name == name)
    }

    /// Element type of arrays, slices, pointers and channels; value type of maps.
    pub fn elem(&self) -> Option<&Type> {
        match &self.0.kind {
            TypeKind::Array { elem, .. }
            | TypeKind::Slice(elem)
            | TypeKind::Pointer(elem)
            | TypeKind::Chan(elem) => Some(elem),
            TypeKind::Map { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn key(&self) -> Option<&Type> {
        match &self.0.kind {
            TypeKind::Map { key, .. } => Some(key),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self.0.kind,
            TypeKind::Int(_) | TypeKind::Uint(_) | TypeKind::Float(_)
        )
    }

    pub fn is_interface(&self) -> bool {
        matches!(self.0.kind, TypeKind::Interface)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.0.kind, TypeKind::Pointer(_))
    }

    /// Address of the descriptor, stable for the descriptor's lifetime.
    pub fn descriptor_id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// Whether a value of this type may be converted to `dest`.
    pub fn convertible_to(&self, dest: &Type) -> bool {
        if self == dest {
            return true;
        }
        match (self.kind(), dest.kind()) {
            (_, TypeKind::Interface) => true,
            (TypeKind::Null, _) => false,
            _ if self.is_numeric() && dest.is_numeric() => true,
            (TypeKind::String, TypeKind::String)
            | (TypeKind::Bool, TypeKind::Bool)
            | (TypeKind::Complex(_), TypeKind::Complex(_)) => true,
            _ => self.underlying_eq(dest),
        }
    }

    /// Structural identity of the underlying kinds, ignoring the names of
    /// `self` and `other` themselves.
    fn underlying_eq(&self, other: &Type) -> bool {
        match (self.kind(), other.kind()) {
            (TypeKind::Bool, TypeKind::Bool)
            | (TypeKind::String, TypeKind::String)
            | (TypeKind::Interface, TypeKind::Interface)
            | (TypeKind::ScriptObject, TypeKind::ScriptObject)
            | (TypeKind::Null, TypeKind::Null) => true,
            (TypeKind::Int(a), TypeKind::Int(b)) | (TypeKind::Uint(a), TypeKind::Uint(b)) => a == b,
            (TypeKind::Float(a), TypeKind::Float(b))
            | (TypeKind::Complex(a), TypeKind::Complex(b)) => a == b,
            (
                TypeKind::Array { elem: a, len: n },
                TypeKind::Array { elem: b, len: m },
            ) => n == m && a == b,
            (TypeKind::Slice(a), TypeKind::Slice(b))
            | (TypeKind::Pointer(a), TypeKind::Pointer(b))
            | (TypeKind::Chan(a), TypeKind::Chan(b)) => a == b,
            (
                TypeKind::Map { key: k1, value: v1 },
                TypeKind::Map { key: k2, value: v2 },
            ) => k1 == k2 && v1 == v2,
            (TypeKind::Struct(a), TypeKind::Struct(b)) => a.fields() == b.fields(),
            (TypeKind::Func(a), TypeKind::Func(b)) => a == b,
            _ => false,
        }
    }
}

impl Type {
    /// Kind comparison for two types sharing a name. Struct fields compare by
    /// name only so self-referential struct types terminate.
    fn named_kind_eq(&self, other: &Type) -> bool {
        match (self.kind(), other.kind()) {
            (TypeKind::Struct(a), TypeKind::Struct(b)) => {
                a.fields().len() == b.fields().len()
                    && a.fields().iter().zip(b.fields()).all(|(x, y)| x.name == y.name)
            }
            _ => self.underlying_eq(other),
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Type) -> bool {
        if Rc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        match (self.name(), other.name()) {
            (Some(a), Some(b)) => a == b && self.named_kind_eq(other),
            (None, None) => self.underlying_eq(other),
            _ => false,
        }
    }
}

impl Debug for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Type({self})")
    }
}

fn write_list(f: &mut Formatter<'_>, types: &[Type], variadic: bool) -> fmt::Result {
    for (i, ty) in types.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        match ty.kind() {
            TypeKind::Slice(elem) if variadic && i == types.len() - 1 => write!(f, "...{elem}")?,
            _ => write!(f, "{ty}")?,
        }
    }
    Ok(())
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.name() {
            return f.write_str(name);
        }
        match self.kind() {
            TypeKind::Bool => f.write_str("bool"),
            TypeKind::Int(w) => match w {
                IntWidth::W8 => f.write_str("int8"),
                IntWidth::W16 => f.write_str("int16"),
                IntWidth::W32 => f.write_str("int32"),
                IntWidth::W64 => f.write_str("int64"),
                IntWidth::Size => f.write_str("int"),
            },
            TypeKind::Uint(w) => match w {
                IntWidth::W8 => f.write_str("uint8"),
                IntWidth::W16 => f.write_str("uint16"),
                IntWidth::W32 => f.write_str("uint32"),
                IntWidth::W64 => f.write_str("uint64"),
                IntWidth::Size => f.write_str("uint"),
            },
            TypeKind::Float(FloatWidth::F32) => f.write_str("float32"),
            TypeKind::Float(FloatWidth::F64) => f.write_str("float64"),
            TypeKind::Complex(FloatWidth::F32) => f.write_str("complex64"),
            TypeKind::Complex(FloatWidth::F64) => f.write_str("complex128"),
            TypeKind::String => f.write_str("string"),
            TypeKind::Array { elem, len } => write!(f, "[{len}]{elem}"),
            TypeKind::Slice(elem) => write!(f, "[]{elem}"),
            TypeKind::Map { key, value } => write!(f, "map[{key}]{value}"),
            TypeKind::Struct(def) => {
                f.write_str("struct {")?;
                for (i, field) in def.fields().iter().enumerate() {
                    let sep = if i == 0 { " " } else { "; " };
                    write!(f, "{sep}{} {}", field.name, field.ty)?;
                }
                f.write_str(" }")
            }
            TypeKind::Pointer(elem) => write!(f, "*{elem}"),
            TypeKind::Chan(elem) => write!(f, "chan {elem}"),
            TypeKind::Func(sig) => {
                f.write_str("func(")?;
                write_list(f, &sig.params, sig.variadic)?;
                f.write_str(")")?;
                match sig.results.len() {
                    0 => Ok(()),
                    1 => write!(f, " {}", sig.results[0]),
                    _ => {
                        f.write_str(" (")?;
                        write_list(f, &sig.results, false)?;
                        f.write_str(")")
                    }
                }
            }
            TypeKind::Interface => f.write_str("interface {}"),
            TypeKind::ScriptObject => f.write_str("luar.LuaObject"),
            TypeKind::Null => f.write_str("luar.NullT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_composites() {
        let point = Type::named_struct("Point", vec![Field::new("X", Type::int())]);
        assert_eq!(Type::map(&Type::string(), &Type::int()).to_string(), "map[string]int");
        assert_eq!(Type::array(&Type::float64(), 3).to_string(), "[3]float64");
        assert_eq!(Type::pointer(&point).to_string(), "*Point");
        assert_eq!(
            Type::structure(vec![Field::new("A", Type::int()), Field::new("B", Type::string())])
                .to_string(),
            "struct { A int; B string }"
        );
    }

    #[test]
    fn display_variadic_func() {
        let sig = Signature::variadic(
            vec![Type::int(), Type::slice(&Type::string())],
            vec![Type::bool()],
        )
        .unwrap();
        assert_eq!(Type::func(sig).to_string(), "func(int, ...string) bool");
    }

    #[test]
    fn variadic_requires_trailing_slice() {
        let err = Signature::variadic(vec![Type::int()], vec![]).unwrap_err();
        assert!(matches!(err, ValueError::TypeMismatch { .. }));
    }

    #[test]
    fn named_types_differ_from_primitives() {
        let celsius = Type::named("Celsius", &Type::float64());
        assert_ne!(celsius, Type::float64());
        assert_eq!(celsius, Type::named("Celsius", &Type::float64()));
        assert_eq!(Type::slice(&Type::int()), Type::slice(&Type::int()));
        assert!(celsius.convertible_to(&Type::float64()));
        assert!(celsius.convertible_to(&Type::int()));
        assert!(!celsius.convertible_to(&Type::string()));
    }

    #[test]
    fn same_name_different_width() {
        let narrow = Type::named("Num", &Type::int8());
        let wide = Type::named("Num", &Type::int64());
        assert_ne!(narrow, wide);
        assert_eq!(narrow, Type::named("Num", &Type::int8()));
        assert_ne!(Type::named("Flag", &Type::bool()), Type::named("Flag", &Type::string()));
    }

    #[test]
    fn same_name_struct_compares_field_names() {
        let a = Type::named_struct("P", vec![Field::new("X", Type::int())]);
        let b = Type::named_struct("P", vec![Field::new("X", Type::int())]);
        let c = Type::named_struct("P", vec![Field::new("Y", Type::int())]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn struct_underlying_conversion() {
        let a = Type::named_struct("A", vec![Field::new("X", Type::int())]);
        let b = Type::named_struct("B", vec![Field::new("X", Type::int())]);
        let c = Type::named_struct("C", vec![Field::new("Y", Type::int())]);
        assert!(a.convertible_to(&b));
        assert!(!a.convertible_to(&c));
        assert!(a.convertible_to(&Type::any()));
    }

    #[test]
    fn self_referential_struct() {
        let node = Type::declare_struct("Node");
        node.define_fields(vec![
            Field::new("Value", Type::int()),
            Field::new("Next", Type::pointer(&node)),
        ])
        .unwrap();
        assert_eq!(node.fields().len(), 2);
        assert_eq!(node.fields()[1].ty.to_string(), "*Node");
        assert_eq!(node.fields()[1].ty.elem(), Some(&node));
        assert!(matches!(
            node.define_fields(vec![]),
            Err(ValueError::AlreadyDefined { .. })
        ));
    }

    #[test]
    fn describe_keeps_defined_fields() {
        let failure = Type::named_struct("Failure", vec![Field::new("Code", Type::int())])
            .with_describe(|_| "failed".to_string());
        assert_eq!(failure.fields().len(), 1);
        assert!(failure.describe_fn().is_some());
    }

    #[test]
    fn field_script_name_prefers_tag() {
        let tagged = Field::new("Y", Type::int()).with_tag("lua", "x");
        let empty_tag = Field::new("Z", Type::int()).with_tag("lua", "");
        assert_eq!(tagged.script_name("lua"), "x");
        assert_eq!(tagged.script_name("json"), "Y");
        assert_eq!(empty_tag.script_name("lua"), "Z");
        assert!(tagged.is_settable());
        assert!(!Field::private("w", Type::int()).is_settable());
    }
}
