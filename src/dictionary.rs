use indexmap::IndexMap;

use crate::interner::Symbol;
use crate::types::{Constraint, Qualified, Type};

/// How a dictionary value is produced at runtime. Overlap detection
/// compares evidence for equality, so two distinct named instances always
/// count as different candidates.
#[derive(Debug, Clone, PartialEq)]
pub enum Evidence {
    /// A user-declared named instance
    NamedInstance(Qualified),
    /// Compiler-solved `Warn` instance carrying the message type
    WarnInstance(Type),
    /// Compiler-solved `IsSymbol` instance carrying the literal
    IsSymbolInstance(Symbol),
    /// Instance of a class with no members
    EmptyClassInstance,
}

impl Evidence {
    /// The identifier behind a named instance, if this evidence has one.
    pub fn named_instance(&self) -> Option<&Qualified> {
        match self {
            Evidence::NamedInstance(name) => Some(name),
            _ => None,
        }
    }
}

/// A dictionary available to the solver, user-declared or synthesised.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeClassDict {
    /// Chain this instance belongs to; instances declared outside any
    /// chain use `None` and stand alone
    pub chain: Option<Symbol>,
    /// Position within the chain
    pub index: i32,
    pub value: Evidence,
    /// Superclass accessor path; non-empty marks a derived dictionary
    pub path: Vec<(Qualified, usize)>,
    pub class_name: Qualified,
    pub instance_types: Vec<Type>,
    /// Subgoals the instance requires. `None` marks a local assumption,
    /// `Some(vec![])` a user instance without subgoals; overlap detection
    /// only considers the `Some` dictionaries.
    pub dependencies: Option<Vec<Constraint>>,
}

impl TypeClassDict {
    /// A solver-synthesised dictionary with the given subgoals.
    pub fn synthesised(
        class_name: Qualified,
        instance_types: Vec<Type>,
        value: Evidence,
        dependencies: Vec<Constraint>,
    ) -> Self {
        TypeClassDict {
            chain: None,
            index: 0,
            value,
            path: Vec::new(),
            class_name,
            instance_types,
            dependencies: Some(dependencies),
        }
    }

    /// A user-declared named instance.
    pub fn named(
        name: Qualified,
        class_name: Qualified,
        instance_types: Vec<Type>,
        dependencies: Vec<Constraint>,
    ) -> Self {
        TypeClassDict {
            chain: None,
            index: 0,
            value: Evidence::NamedInstance(name),
            path: Vec::new(),
            class_name,
            instance_types,
            dependencies: Some(dependencies),
        }
    }
}

/// Dictionaries in scope, keyed by module, class, then dictionary name.
/// The `None` module key holds local dictionaries: assumptions from the
/// enclosing binder and names the solver introduced itself. Insertion
/// order is preserved so candidate gathering stays deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceContext {
    entries: IndexMap<Option<Symbol>, IndexMap<Qualified, IndexMap<Qualified, TypeClassDict>>>,
}

impl InstanceContext {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register a dictionary under a module key.
    pub fn insert(&mut self, module: Option<Symbol>, ident: Qualified, dict: TypeClassDict) {
        self.entries
            .entry(module)
            .or_default()
            .entry(dict.class_name)
            .or_default()
            .insert(ident, dict);
    }

    /// All dictionaries for a class under one module key, in insertion
    /// order.
    pub fn find_dicts(&self, class: &Qualified, module: Option<Symbol>) -> Vec<TypeClassDict> {
        self.entries
            .get(&module)
            .and_then(|by_class| by_class.get(class))
            .map(|dicts| dicts.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Left-biased union at every level: entries of `left` win over
    /// `right` wherever both define the same key.
    pub fn combine(left: &InstanceContext, right: &InstanceContext) -> InstanceContext {
        let mut out = left.clone();
        for (module, by_class) in &right.entries {
            let out_by_class = out.entries.entry(*module).or_default();
            for (class, dicts) in by_class {
                let out_dicts = out_by_class.entry(*class).or_default();
                for (ident, dict) in dicts {
                    out_dicts.entry(*ident).or_insert_with(|| dict.clone());
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    fn dict_for(class: Qualified, name: &str, ty: Type) -> TypeClassDict {
        TypeClassDict::named(Qualified::local(name), class, vec![ty], vec![])
    }

    #[test]
    fn test_find_dicts_scoped_by_module() {
        let class = Qualified::new("Data.Show", "Show");
        let module = crate::interner::intern("Main");
        let mut ctx = InstanceContext::new();
        ctx.insert(Some(module), Qualified::local("showInt"), dict_for(class, "showInt", Type::int()));
        assert_eq!(ctx.find_dicts(&class, Some(module)).len(), 1);
        assert!(ctx.find_dicts(&class, None).is_empty());
    }

    #[test]
    fn test_combine_is_left_biased() {
        let class = Qualified::new("Data.Show", "Show");
        let ident = Qualified::local("showInt");
        let mut left = InstanceContext::new();
        left.insert(None, ident, dict_for(class, "showInt", Type::int()));
        let mut right = InstanceContext::new();
        right.insert(None, ident, dict_for(class, "showInt", Type::string()));
        let combined = InstanceContext::combine(&left, &right);
        let dicts = combined.find_dicts(&class, None);
        assert_eq!(dicts.len(), 1);
        assert_eq!(dicts[0].instance_types, vec![Type::int()]);
    }
}
