//! Specialization name mangling.
//!
//! A specialization of `func` over `(T1, T2)` is named `func$T1_T2`, with
//! each component mangled recursively. Distinct type-argument tuples must
//! map to distinct names; the mangler is the single source of truth for
//! both function and struct specializations.

use malc_sem::Type;
use malc_util::Symbol;

/// Mangled name of `name` specialized over `type_args`. With no type
/// arguments the name is returned unchanged.
pub fn mangle(name: Symbol, type_args: &[Type]) -> Symbol {
    if type_args.is_empty() {
        return name;
    }
    let suffix: Vec<String> = type_args.iter().map(type_suffix).collect();
    Symbol::intern(&format!("{}${}", name, suffix.join("_")))
}

/// Mangled spelling of one type.
pub fn type_suffix(ty: &Type) -> String {
    match ty {
        Type::Int => "int".to_string(),
        Type::I8 => "i8".to_string(),
        Type::I16 => "i16".to_string(),
        Type::I32 => "i32".to_string(),
        Type::I64 => "i64".to_string(),
        Type::U8 => "u8".to_string(),
        Type::U16 => "u16".to_string(),
        Type::U32 => "u32".to_string(),
        Type::U64 => "u64".to_string(),
        Type::U128 => "u128".to_string(),
        Type::Usize => "usize".to_string(),
        Type::Float => "float".to_string(),
        Type::Bool => "bool".to_string(),
        Type::Str => "string".to_string(),
        Type::Nil => "nil".to_string(),
        Type::Void => "void".to_string(),
        Type::Pointer(inner) => format!("ptr_{}", type_suffix(inner)),
        Type::Ref(inner) => format!("ref_{}", type_suffix(inner)),
        Type::Optional(inner) => format!("opt_{}", type_suffix(inner)),
        Type::Slice(elem) => format!("slice_{}", type_suffix(elem)),
        Type::Array(elem, len) => format!("arr_{}_{}", len, type_suffix(elem)),
        Type::Map(k, v) => format!("map_{}_{}", type_suffix(k), type_suffix(v)),
        Type::Channel(elem) => format!("chan_{}", type_suffix(elem)),
        Type::Tuple(elems) => {
            let parts: Vec<String> = elems.iter().map(type_suffix).collect();
            format!("tup{}_{}", elems.len(), parts.join("_"))
        }
        Type::Fn(params, ret) => {
            let parts: Vec<String> = params.iter().map(type_suffix).collect();
            format!("fn{}_{}_{}", params.len(), parts.join("_"), type_suffix(ret))
        }
        Type::Named(name) | Type::Trait(name) | Type::Param(name) => name.to_string(),
        Type::Generic { base, args } => {
            let parts: Vec<String> = args.iter().map(type_suffix).collect();
            format!("{}${}", base, parts.join("_"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    fn sym(s: &str) -> Symbol {
        Symbol::intern(s)
    }

    #[test]
    fn plain_name_passes_through() {
        assert_eq!(mangle(sym("id"), &[]), sym("id"));
    }

    #[test]
    fn suffixes_follow_argument_order() {
        assert_eq!(mangle(sym("id"), &[Type::Int]), sym("id$int"));
        assert_eq!(mangle(sym("id"), &[Type::Bool]), sym("id$bool"));
        assert_eq!(
            mangle(sym("pair"), &[Type::Int, Type::Bool]),
            sym("pair$int_bool")
        );
    }

    #[test]
    fn compound_types_nest() {
        assert_eq!(
            mangle(sym("f"), &[Type::Pointer(Box::new(Type::Int))]),
            sym("f$ptr_int")
        );
        assert_eq!(
            mangle(sym("f"), &[Type::Slice(Box::new(Type::Float))]),
            sym("f$slice_float")
        );
        assert_eq!(
            mangle(sym("f"), &[Type::Array(Box::new(Type::I32), 4)]),
            sym("f$arr_4_i32")
        );
        assert_eq!(
            mangle(
                sym("f"),
                &[Type::Generic {
                    base: sym("List"),
                    args: vec![Type::Int],
                }]
            ),
            sym("f$List$int")
        );
    }

    /// Structured type generator for the injectivity property.
    #[derive(Debug, Clone)]
    struct AnyType(Type);

    impl Arbitrary for AnyType {
        fn arbitrary(g: &mut Gen) -> Self {
            fn gen_type(g: &mut Gen, depth: usize) -> Type {
                let leaf = depth == 0 || bool::arbitrary(g);
                if leaf {
                    let choices = [
                        Type::Int,
                        Type::I8,
                        Type::I32,
                        Type::Float,
                        Type::Bool,
                        Type::Str,
                    ];
                    choices[usize::arbitrary(g) % choices.len()].clone()
                } else {
                    match usize::arbitrary(g) % 4 {
                        0 => Type::Pointer(Box::new(gen_type(g, depth - 1))),
                        1 => Type::Slice(Box::new(gen_type(g, depth - 1))),
                        2 => Type::Array(Box::new(gen_type(g, depth - 1)), usize::arbitrary(g) % 8),
                        _ => Type::Channel(Box::new(gen_type(g, depth - 1))),
                    }
                }
            }
            AnyType(gen_type(g, 3))
        }
    }

    /// Distinct (function, type-arg-list) pairs mangle to distinct names.
    #[quickcheck]
    fn mangling_is_injective(a: AnyType, b: AnyType) -> bool {
        let name = sym("f");
        a.0 == b.0 || mangle(name, &[a.0]) != mangle(name, &[b.0])
    }
}
