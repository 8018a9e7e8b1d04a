use std::collections::HashMap;

use thiserror::Error;

use crate::dictionary::InstanceContext;
use crate::interner::{self, Symbol};
use crate::types::{prim, replace_type_vars, unapply, Constraint, Qualified, Type};

/// A data constructor: name plus field types.
#[derive(Debug, Clone)]
pub struct DataConstructor {
    pub name: Symbol,
    pub fields: Vec<Type>,
}

impl DataConstructor {
    pub fn new(name: &str, fields: Vec<Type>) -> Self {
        DataConstructor {
            name: interner::intern(name),
            fields,
        }
    }
}

/// A declared data type: parameters in declaration order and constructors.
#[derive(Debug, Clone)]
pub struct TypeData {
    pub params: Vec<Symbol>,
    pub constructors: Vec<DataConstructor>,
    pub is_newtype: bool,
}

/// A functional dependency over class parameter positions.
#[derive(Debug, Clone)]
pub struct FunctionalDependency {
    pub determiners: Vec<usize>,
    pub determined: Vec<usize>,
}

impl FunctionalDependency {
    pub fn new(determiners: Vec<usize>, determined: Vec<usize>) -> Self {
        FunctionalDependency {
            determiners,
            determined,
        }
    }
}

/// Class metadata: ordered parameters, superclass constraint templates
/// over those parameters, and functional dependencies.
#[derive(Debug, Clone)]
pub struct TypeClassData {
    pub params: Vec<Symbol>,
    pub superclasses: Vec<Constraint>,
    pub fundeps: Vec<FunctionalDependency>,
}

impl TypeClassData {
    pub fn new(params: &[&str]) -> Self {
        TypeClassData {
            params: params.iter().map(|p| interner::intern(p)).collect(),
            superclasses: Vec::new(),
            fundeps: Vec::new(),
        }
    }

    pub fn with_superclasses(mut self, superclasses: Vec<Constraint>) -> Self {
        self.superclasses = superclasses;
        self
    }

    pub fn with_fundeps(mut self, fundeps: Vec<FunctionalDependency>) -> Self {
        self.fundeps = fundeps;
        self
    }
}

/// Failures from type synonym expansion.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExpandError {
    #[error("type synonym {0} is partially applied")]
    PartiallyApplied(String),
    #[error("cycle in type synonym expansion involving {0}")]
    CycleInSynonym(String),
}

/// Expansion steps allowed before a synonym is declared cyclic.
const EXPANSION_FUEL: u32 = 1000;

/// The compiler environment the solver consults: data types, classes,
/// synonyms and the dictionaries user code brought into scope. The
/// compiler-solved classes are pre-registered so their functional
/// dependencies participate in head matching.
#[derive(Debug, Clone)]
pub struct Environment {
    pub types: HashMap<Qualified, TypeData>,
    pub type_classes: HashMap<Qualified, TypeClassData>,
    pub type_synonyms: HashMap<Qualified, (Vec<Symbol>, Type)>,
    pub instances: InstanceContext,
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        let mut env = Environment {
            types: HashMap::new(),
            type_classes: HashMap::new(),
            type_synonyms: HashMap::new(),
            instances: InstanceContext::new(),
        };
        env.register_prim_classes();
        env
    }

    /// Register a data type declaration.
    pub fn add_data_type(
        &mut self,
        name: Qualified,
        params: &[&str],
        constructors: Vec<DataConstructor>,
    ) {
        self.types.insert(
            name,
            TypeData {
                params: params.iter().map(|p| interner::intern(p)).collect(),
                constructors,
                is_newtype: false,
            },
        );
    }

    /// Register a newtype declaration: one constructor, one field.
    pub fn add_newtype(&mut self, name: Qualified, params: &[&str], ctor: &str, wrapped: Type) {
        self.types.insert(
            name,
            TypeData {
                params: params.iter().map(|p| interner::intern(p)).collect(),
                constructors: vec![DataConstructor::new(ctor, vec![wrapped])],
                is_newtype: true,
            },
        );
    }

    /// Register a type class declaration.
    pub fn add_class(&mut self, name: Qualified, data: TypeClassData) {
        self.type_classes.insert(name, data);
    }

    /// Register a type synonym declaration.
    pub fn add_synonym(&mut self, name: Qualified, params: &[&str], body: Type) {
        self.type_synonyms.insert(
            name,
            (params.iter().map(|p| interner::intern(p)).collect(), body),
        );
    }

    /// The newtype structure of a named type: parameter names, wrapped
    /// field type and constructor name.
    pub fn newtype_constructor(&self, name: &Qualified) -> Option<(&[Symbol], &Type, Symbol)> {
        let data = self.types.get(name)?;
        if !data.is_newtype {
            return None;
        }
        match data.constructors.as_slice() {
            [ctor] if ctor.fields.len() == 1 => Some((&data.params, &ctor.fields[0], ctor.name)),
            _ => None,
        }
    }

    /// Fully expand type synonyms. Partial application and cycles are
    /// reported as errors.
    pub fn expand_synonyms(&self, ty: &Type) -> Result<Type, ExpandError> {
        self.expand_with_fuel(ty, EXPANSION_FUEL)
    }

    fn expand_with_fuel(&self, ty: &Type, fuel: u32) -> Result<Type, ExpandError> {
        if matches!(ty, Type::App(..) | Type::Con(_)) {
            let (head, args) = unapply(ty);
            if let Type::Con(con) = head {
                if let Some((params, body)) = self.type_synonyms.get(con) {
                    if fuel == 0 {
                        return Err(ExpandError::CycleInSynonym(con.to_string()));
                    }
                    if args.len() < params.len() {
                        return Err(ExpandError::PartiallyApplied(con.to_string()));
                    }
                    let subst: HashMap<Symbol, Type> = params
                        .iter()
                        .copied()
                        .zip(args.iter().map(|a| (*a).clone()))
                        .collect();
                    let expanded = replace_type_vars(&subst, body);
                    let reapplied = args[params.len()..]
                        .iter()
                        .fold(expanded, |acc, a| Type::app(acc, (*a).clone()));
                    return self.expand_with_fuel(&reapplied, fuel - 1);
                }
            }
        }
        Ok(match ty {
            Type::App(f, a) => Type::app(
                self.expand_with_fuel(f, fuel)?,
                self.expand_with_fuel(a, fuel)?,
            ),
            Type::ForAll { var, body, skolem } => Type::ForAll {
                var: *var,
                body: Box::new(self.expand_with_fuel(body, fuel)?),
                skolem: *skolem,
            },
            Type::Kinded(inner, kind) => Type::Kinded(
                Box::new(self.expand_with_fuel(inner, fuel)?),
                Box::new((**kind).clone()),
            ),
            Type::RCons(label, head, tail) => Type::RCons(
                *label,
                Box::new(self.expand_with_fuel(head, fuel)?),
                Box::new(self.expand_with_fuel(tail, fuel)?),
            ),
            other => other.clone(),
        })
    }

    /// The compiler-solved classes, with the functional dependencies head
    /// matching relies on to cover their output positions.
    fn register_prim_classes(&mut self) {
        let fd = FunctionalDependency::new;
        self.add_class(prim::partial(), TypeClassData::new(&[]));
        self.add_class(prim::coercible(), TypeClassData::new(&["a", "b"]));
        self.add_class(prim::warn(), TypeClassData::new(&["message"]));
        self.add_class(prim::is_symbol(), TypeClassData::new(&["sym"]));
        self.add_class(
            prim::symbol_compare(),
            TypeClassData::new(&["left", "right", "ordering"])
                .with_fundeps(vec![fd(vec![0, 1], vec![2])]),
        );
        self.add_class(
            prim::symbol_append(),
            TypeClassData::new(&["left", "right", "appended"]).with_fundeps(vec![
                fd(vec![0, 1], vec![2]),
                fd(vec![1, 2], vec![0]),
                fd(vec![2, 0], vec![1]),
            ]),
        );
        self.add_class(
            prim::symbol_cons(),
            TypeClassData::new(&["head", "tail", "symbol"]).with_fundeps(vec![
                fd(vec![0, 1], vec![2]),
                fd(vec![2], vec![0, 1]),
            ]),
        );
        self.add_class(
            prim::row_union(),
            TypeClassData::new(&["left", "right", "union"]).with_fundeps(vec![
                fd(vec![0, 1], vec![2]),
                fd(vec![1, 2], vec![0]),
                fd(vec![2, 0], vec![1]),
            ]),
        );
        self.add_class(
            prim::row_nub(),
            TypeClassData::new(&["original", "nubbed"]).with_fundeps(vec![fd(vec![0], vec![1])]),
        );
        self.add_class(prim::row_lacks(), TypeClassData::new(&["label", "row"]));
        self.add_class(
            prim::row_cons(),
            TypeClassData::new(&["label", "a", "tail", "row"]).with_fundeps(vec![
                fd(vec![0, 1, 2], vec![3]),
                fd(vec![0, 3], vec![1, 2]),
            ]),
        );
        self.add_class(
            prim::row_to_list(),
            TypeClassData::new(&["row", "list"]).with_fundeps(vec![fd(vec![0], vec![1])]),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_synonym_fully_applied() {
        let mut env = Environment::new();
        env.add_synonym(
            Qualified::new("Main", "Pair"),
            &["a"],
            Type::app(
                Type::app(Type::con("Main", "Tuple"), Type::var("a")),
                Type::var("a"),
            ),
        );
        let ty = Type::app(Type::con("Main", "Pair"), Type::int());
        let expanded = env.expand_synonyms(&ty).unwrap();
        assert_eq!(
            expanded,
            Type::app(Type::app(Type::con("Main", "Tuple"), Type::int()), Type::int())
        );
    }

    #[test]
    fn test_expand_synonym_partially_applied() {
        let mut env = Environment::new();
        env.add_synonym(
            Qualified::new("Main", "Pair"),
            &["a"],
            Type::app(Type::con("Main", "Tuple"), Type::var("a")),
        );
        let err = env.expand_synonyms(&Type::con("Main", "Pair")).unwrap_err();
        assert!(matches!(err, ExpandError::PartiallyApplied(_)));
    }

    #[test]
    fn test_expand_synonym_cycle() {
        let mut env = Environment::new();
        env.add_synonym(Qualified::new("Main", "A"), &[], Type::con("Main", "B"));
        env.add_synonym(Qualified::new("Main", "B"), &[], Type::con("Main", "A"));
        let err = env.expand_synonyms(&Type::con("Main", "A")).unwrap_err();
        assert!(matches!(err, ExpandError::CycleInSynonym(_)));
    }

    #[test]
    fn test_newtype_constructor_lookup() {
        let mut env = Environment::new();
        env.add_newtype(Qualified::new("Main", "Age"), &[], "Age", Type::int());
        let (params, wrapped, _) = env
            .newtype_constructor(&Qualified::new("Main", "Age"))
            .unwrap();
        assert!(params.is_empty());
        assert_eq!(*wrapped, Type::int());
    }
}
