//! Type descriptors shared between the type checker and the middle end.
//!
//! Named types may self-refer; cross-references are therefore carried as
//! names resolved through the definitions registered in a [`crate::Scope`]
//! (and later in the MIR module), never as owned cycles.

use std::fmt;

use malc_util::{FxHashMap, Symbol};

/// A type in the Malphas type system.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Default integer (64-bit signed).
    Int,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
    /// Default float (64-bit).
    Float,
    Bool,
    Str,
    Nil,
    Void,
    /// Fixed-length array `[N]T`.
    Array(Box<Type>, usize),
    /// Growable slice `[]T`, backed by the runtime.
    Slice(Box<Type>),
    /// Hash map, backed by the runtime.
    Map(Box<Type>, Box<Type>),
    /// Channel `chan T`, backed by the runtime.
    Channel(Box<Type>),
    Pointer(Box<Type>),
    Ref(Box<Type>),
    Optional(Box<Type>),
    Tuple(Vec<Type>),
    /// Function type `fn(A, B) -> C`.
    Fn(Vec<Type>, Box<Type>),
    /// A struct or enum referenced by name.
    Named(Symbol),
    /// Instantiated generic type, e.g. `List[int]`.
    Generic { base: Symbol, args: Vec<Type> },
    /// An in-scope type parameter, referenced by name.
    Param(Symbol),
    Trait(Symbol),
}

impl Type {
    pub fn is_float(&self) -> bool {
        matches!(self, Type::Float)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Type::Int
                | Type::I8
                | Type::I16
                | Type::I32
                | Type::I64
                | Type::U8
                | Type::U16
                | Type::U32
                | Type::U64
                | Type::U128
                | Type::Usize
        )
    }

    /// The name a named or generic-instance type resolves through, if any.
    pub fn base_name(&self) -> Option<Symbol> {
        match self {
            Type::Named(name) => Some(*name),
            Type::Generic { base, .. } => Some(*base),
            Type::Ref(inner) | Type::Pointer(inner) => inner.base_name(),
            _ => None,
        }
    }

    /// Replace type parameters by the types in `map`, recursively.
    /// Parameters absent from the map are kept as-is.
    pub fn substitute(&self, map: &FxHashMap<Symbol, Type>) -> Type {
        match self {
            Type::Param(name) => map.get(name).cloned().unwrap_or_else(|| self.clone()),
            Type::Array(elem, len) => Type::Array(Box::new(elem.substitute(map)), *len),
            Type::Slice(elem) => Type::Slice(Box::new(elem.substitute(map))),
            Type::Map(k, v) => {
                Type::Map(Box::new(k.substitute(map)), Box::new(v.substitute(map)))
            }
            Type::Channel(elem) => Type::Channel(Box::new(elem.substitute(map))),
            Type::Pointer(inner) => Type::Pointer(Box::new(inner.substitute(map))),
            Type::Ref(inner) => Type::Ref(Box::new(inner.substitute(map))),
            Type::Optional(inner) => Type::Optional(Box::new(inner.substitute(map))),
            Type::Tuple(elems) => {
                Type::Tuple(elems.iter().map(|e| e.substitute(map)).collect())
            }
            Type::Fn(params, ret) => Type::Fn(
                params.iter().map(|p| p.substitute(map)).collect(),
                Box::new(ret.substitute(map)),
            ),
            Type::Generic { base, args } => Type::Generic {
                base: *base,
                args: args.iter().map(|a| a.substitute(map)).collect(),
            },
            _ => self.clone(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::I8 => write!(f, "i8"),
            Type::I16 => write!(f, "i16"),
            Type::I32 => write!(f, "i32"),
            Type::I64 => write!(f, "i64"),
            Type::U8 => write!(f, "u8"),
            Type::U16 => write!(f, "u16"),
            Type::U32 => write!(f, "u32"),
            Type::U64 => write!(f, "u64"),
            Type::U128 => write!(f, "u128"),
            Type::Usize => write!(f, "usize"),
            Type::Float => write!(f, "float"),
            Type::Bool => write!(f, "bool"),
            Type::Str => write!(f, "string"),
            Type::Nil => write!(f, "nil"),
            Type::Void => write!(f, "void"),
            Type::Array(elem, len) => write!(f, "[{}]{}", len, elem),
            Type::Slice(elem) => write!(f, "[]{}", elem),
            Type::Map(k, v) => write!(f, "map[{}]{}", k, v),
            Type::Channel(elem) => write!(f, "chan {}", elem),
            Type::Pointer(inner) => write!(f, "*{}", inner),
            Type::Ref(inner) => write!(f, "&{}", inner),
            Type::Optional(inner) => write!(f, "?{}", inner),
            Type::Tuple(elems) => {
                write!(f, "(")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, ")")
            }
            Type::Fn(params, ret) => {
                write!(f, "fn(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ") -> {}", ret)
            }
            Type::Named(name) => write!(f, "{}", name),
            Type::Generic { base, args } => {
                write!(f, "{}[", base)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, "]")
            }
            Type::Param(name) => write!(f, "{}", name),
            Type::Trait(name) => write!(f, "{}", name),
        }
    }
}

/// A generic type parameter with its trait bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParamDecl {
    pub name: Symbol,
    pub bounds: Vec<Symbol>,
}

impl TypeParamDecl {
    pub fn new(name: Symbol) -> Self {
        Self {
            name,
            bounds: Vec::new(),
        }
    }
}

/// Struct definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDef {
    pub name: Symbol,
    pub type_params: Vec<Symbol>,
    pub fields: Vec<FieldDef>,
}

impl StructDef {
    pub fn field(&self, name: Symbol) -> Option<(usize, &FieldDef)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == name)
    }
}

/// A single struct field. Declaration order is layout order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: Symbol,
    pub ty: Type,
}

/// Enum definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    pub name: Symbol,
    pub type_params: Vec<Symbol>,
    pub variants: Vec<VariantDef>,
}

impl EnumDef {
    /// Position of `variant` in the declaration order.
    pub fn variant_index(&self, variant: Symbol) -> Option<usize> {
        self.variants.iter().position(|v| v.name == variant)
    }

    pub fn variant(&self, index: usize) -> Option<&VariantDef> {
        self.variants.get(index)
    }
}

/// A single enum variant and its payload types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDef {
    pub name: Symbol,
    pub params: Vec<Type>,
}

/// Trait definition; only the method surface matters to the middle end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitDef {
    pub name: Symbol,
    pub methods: Vec<FnSig>,
}

/// Function signature without a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnSig {
    pub name: Symbol,
    pub type_params: Vec<TypeParamDecl>,
    pub params: Vec<Type>,
    pub ret: Option<Type>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_readable() {
        let ty = Type::Slice(Box::new(Type::Generic {
            base: Symbol::intern("List"),
            args: vec![Type::Int],
        }));
        assert_eq!(ty.to_string(), "[]List[int]");
    }

    #[test]
    fn variant_index_follows_declaration_order() {
        let def = EnumDef {
            name: Symbol::intern("Option"),
            type_params: vec![Symbol::intern("T")],
            variants: vec![
                VariantDef {
                    name: Symbol::intern("Some"),
                    params: vec![Type::Param(Symbol::intern("T"))],
                },
                VariantDef {
                    name: Symbol::intern("None"),
                    params: vec![],
                },
            ],
        };

        assert_eq!(def.variant_index(Symbol::intern("Some")), Some(0));
        assert_eq!(def.variant_index(Symbol::intern("None")), Some(1));
        assert_eq!(def.variant_index(Symbol::intern("Other")), None);
    }

    #[test]
    fn base_name_sees_through_indirection() {
        let name = Symbol::intern("Point");
        let ty = Type::Ref(Box::new(Type::Named(name)));
        assert_eq!(ty.base_name(), Some(name));
    }
}
