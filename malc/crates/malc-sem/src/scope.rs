//! Global scope and module metadata.

use malc_util::{FxHashMap, Symbol};

use crate::types::{EnumDef, FnSig, StructDef, TraitDef};

/// A top-level definition visible in the global scope.
#[derive(Debug, Clone)]
pub enum Def {
    Struct(StructDef),
    Enum(EnumDef),
    Trait(TraitDef),
    Fn(FnSig),
}

/// Flat global scope produced by the type checker.
#[derive(Debug, Default)]
pub struct Scope {
    defs: FxHashMap<Symbol, Def>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: Symbol, def: Def) {
        self.defs.insert(name, def);
    }

    pub fn lookup(&self, name: Symbol) -> Option<&Def> {
        self.defs.get(&name)
    }

    pub fn lookup_struct(&self, name: Symbol) -> Option<&StructDef> {
        match self.defs.get(&name) {
            Some(Def::Struct(def)) => Some(def),
            _ => None,
        }
    }

    pub fn lookup_enum(&self, name: Symbol) -> Option<&EnumDef> {
        match self.defs.get(&name) {
            Some(Def::Enum(def)) => Some(def),
            _ => None,
        }
    }

    pub fn lookup_trait(&self, name: Symbol) -> Option<&TraitDef> {
        match self.defs.get(&name) {
            Some(Def::Trait(def)) => Some(def),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &Def)> {
        self.defs.iter().map(|(k, v)| (*k, v))
    }
}

/// Per-module metadata supplied by the front end.
#[derive(Debug)]
pub struct ModuleInfo {
    pub name: Symbol,
    pub file: Symbol,
    pub scope: Scope,
}

/// Module name to metadata.
pub type ModuleMap = FxHashMap<Symbol, ModuleInfo>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldDef;
    use crate::Type;

    #[test]
    fn lookup_discriminates_kinds() {
        let mut scope = Scope::new();
        let name = Symbol::intern("Point");
        scope.define(
            name,
            Def::Struct(StructDef {
                name,
                type_params: vec![],
                fields: vec![FieldDef {
                    name: Symbol::intern("x"),
                    ty: Type::Float,
                }],
            }),
        );

        assert!(scope.lookup_struct(name).is_some());
        assert!(scope.lookup_enum(name).is_none());
    }
}
