//! Type mapping from Malphas types to LLVM IR types, plus size and
//! alignment computation for enum payload layout and slice elements.

use malc_mir::Module;
use malc_sem::Type;

use crate::error::{CodeGenError, Result};

/// LLVM spelling of a type. Structs and enums are always handled by
/// pointer.
pub fn llvm_type(module: &Module, ty: &Type) -> Result<String> {
    Ok(match ty {
        Type::Int | Type::I64 | Type::U64 | Type::Usize => "i64".to_string(),
        Type::I8 | Type::U8 => "i8".to_string(),
        Type::I16 | Type::U16 => "i16".to_string(),
        Type::I32 | Type::U32 => "i32".to_string(),
        Type::U128 => "i128".to_string(),
        Type::Float => "double".to_string(),
        Type::Bool => "i1".to_string(),
        Type::Str => "%String*".to_string(),
        Type::Nil => "i8*".to_string(),
        Type::Void => "void".to_string(),
        Type::Array(elem, len) => format!("[{} x {}]", len, llvm_type(module, elem)?),
        Type::Slice(_) => "%Slice*".to_string(),
        Type::Map(_, _) => "%HashMap*".to_string(),
        Type::Channel(_) => "%Channel*".to_string(),
        Type::Fn(_, _) => "%Closure*".to_string(),
        Type::Pointer(inner) | Type::Ref(inner) | Type::Optional(inner) => {
            format!("{}*", llvm_type(module, inner)?)
        }
        Type::Tuple(elems) if elems.is_empty() => "void".to_string(),
        Type::Tuple(elems) => {
            let parts: Result<Vec<String>> =
                elems.iter().map(|e| llvm_type(module, e)).collect();
            format!("{{ {} }}", parts?.join(", "))
        }
        Type::Named(name) => {
            let text = crate::llvm::sanitize(name.as_str());
            if module.enums.contains_key(name) {
                format!("%enum.{}*", text)
            } else if module.structs.contains_key(name) {
                format!("%struct.{}*", text)
            } else {
                return Err(CodeGenError::TypeMapping(format!(
                    "unknown named type `{}`",
                    name
                )));
            }
        }
        // Already mangled by the monomorphizer; only generic enums keep
        // their instantiation.
        Type::Generic { base, .. } => {
            let text = crate::llvm::sanitize(base.as_str());
            if module.enums.contains_key(base) {
                format!("%enum.{}*", text)
            } else {
                format!("%struct.{}*", text)
            }
        }
        // Should not appear after monomorphization.
        Type::Param(_) | Type::Trait(_) => "i8*".to_string(),
    })
}

const POINTER_SIZE: u64 = 8;

/// Byte size of a value of `ty` as stored in a slot, payload, or slice
/// element.
pub fn size_of(module: &Module, ty: &Type) -> u64 {
    match ty {
        Type::I8 | Type::U8 | Type::Bool => 1,
        Type::I16 | Type::U16 => 2,
        Type::I32 | Type::U32 => 4,
        Type::Int | Type::I64 | Type::U64 | Type::Usize | Type::Float => 8,
        Type::U128 => 16,
        Type::Void => 0,
        Type::Array(elem, len) => size_of(module, elem) * (*len as u64),
        Type::Tuple(elems) => {
            let mut size = 0;
            for elem in elems {
                let align = align_of(module, elem);
                size = round_up(size, align) + size_of(module, elem);
            }
            round_up(size, align_of(module, ty))
        }
        // Everything else is carried behind a pointer.
        _ => POINTER_SIZE,
    }
}

pub fn align_of(module: &Module, ty: &Type) -> u64 {
    match ty {
        Type::I8 | Type::U8 | Type::Bool => 1,
        Type::I16 | Type::U16 => 2,
        Type::I32 | Type::U32 => 4,
        Type::U128 => 16,
        Type::Void => 1,
        Type::Array(elem, _) => align_of(module, elem),
        Type::Tuple(elems) => elems.iter().map(|e| align_of(module, e)).max().unwrap_or(1),
        _ => POINTER_SIZE,
    }
}

/// Payload byte count of one enum variant: a single member is stored
/// inline, several as an anonymous struct.
pub fn variant_payload_size(module: &Module, params: &[Type]) -> u64 {
    match params {
        [] => 0,
        [single] => size_of(module, single),
        many => size_of(module, &Type::Tuple(many.to_vec())),
    }
}

/// Payload array length of the whole enum: the maximum across variants.
pub fn enum_payload_size(module: &Module, def: &malc_sem::EnumDef) -> u64 {
    def.variants
        .iter()
        .map(|v| variant_payload_size(module, &v.params))
        .max()
        .unwrap_or(0)
}

fn round_up(value: u64, align: u64) -> u64 {
    if align == 0 {
        return value;
    }
    value.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;
    use malc_sem::{EnumDef, VariantDef};
    use malc_util::Symbol;

    fn empty_module() -> Module {
        Module::default()
    }

    #[test]
    fn primitive_widths() {
        let m = empty_module();
        assert_eq!(llvm_type(&m, &Type::Int).unwrap(), "i64");
        assert_eq!(llvm_type(&m, &Type::Usize).unwrap(), "i64");
        assert_eq!(llvm_type(&m, &Type::U128).unwrap(), "i128");
        assert_eq!(llvm_type(&m, &Type::Float).unwrap(), "double");
        assert_eq!(llvm_type(&m, &Type::Bool).unwrap(), "i1");
        assert_eq!(llvm_type(&m, &Type::Str).unwrap(), "%String*");
        assert_eq!(llvm_type(&m, &Type::Nil).unwrap(), "i8*");
    }

    #[test]
    fn compound_types() {
        let m = empty_module();
        assert_eq!(
            llvm_type(&m, &Type::Array(Box::new(Type::I32), 3)).unwrap(),
            "[3 x i32]"
        );
        assert_eq!(
            llvm_type(&m, &Type::Slice(Box::new(Type::Int))).unwrap(),
            "%Slice*"
        );
        assert_eq!(
            llvm_type(&m, &Type::Pointer(Box::new(Type::U8))).unwrap(),
            "i8*"
        );
        assert_eq!(
            llvm_type(&m, &Type::Tuple(vec![Type::Int, Type::Bool])).unwrap(),
            "{ i64, i1 }"
        );
        assert_eq!(llvm_type(&m, &Type::Tuple(vec![])).unwrap(), "void");
    }

    #[test]
    fn unknown_named_type_is_an_error() {
        let m = empty_module();
        assert!(matches!(
            llvm_type(&m, &Type::Named(Symbol::intern("Ghost"))),
            Err(CodeGenError::TypeMapping(_))
        ));
    }

    #[test]
    fn enum_payload_takes_widest_variant() {
        let m = empty_module();
        let def = EnumDef {
            name: Symbol::intern("Shape"),
            type_params: vec![],
            variants: vec![
                VariantDef {
                    name: Symbol::intern("Circle"),
                    params: vec![Type::Float],
                },
                VariantDef {
                    name: Symbol::intern("Rect"),
                    params: vec![Type::Float, Type::Float],
                },
                VariantDef {
                    name: Symbol::intern("Unit"),
                    params: vec![],
                },
            ],
        };
        assert_eq!(enum_payload_size(&m, &def), 16);
    }
}
