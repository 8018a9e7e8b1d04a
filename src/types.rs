use std::collections::HashMap;
use std::fmt;

use crate::interner::{self, Symbol};
use crate::span::Span;

/// A module-qualified name. `module == None` marks a locally bound name,
/// e.g. a dictionary the solver introduced itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Qualified {
    pub module: Option<Symbol>,
    pub name: Symbol,
}

impl Qualified {
    pub fn new(module: &str, name: &str) -> Self {
        Qualified {
            module: Some(interner::intern(module)),
            name: interner::intern(name),
        }
    }

    /// A name with no module qualifier.
    pub fn local(name: &str) -> Self {
        Qualified {
            module: None,
            name: interner::intern(name),
        }
    }
}

impl fmt::Display for Qualified {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.module {
            Some(module) => write!(f, "{}.{}", interner::show(module), interner::show(self.name)),
            None => write!(f, "{}", interner::show(self.name)),
        }
    }
}

/// Internal type representation the solver operates on.
/// Rows are cons lists (`RCons`/`REmpty`); label order is not significant,
/// so every comparison goes through `align_rows`.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// Unification unknown, resolved through the shared Substitution
    Unknown(u32),
    /// Rigid type variable, bound by an instance head or a forall
    Var(Symbol),
    /// Skolem constant: the original variable name plus a unique id
    Skolem(Symbol, u32),
    /// Type constructor
    Con(Qualified),
    /// Type application
    App(Box<Type>, Box<Type>),
    /// Universal quantification; `skolem` records the scope the binder was
    /// opened with, if any
    ForAll {
        var: Symbol,
        body: Box<Type>,
        skolem: Option<u32>,
    },
    /// Kind-annotated type; transparent to every comparison in the solver
    Kinded(Box<Type>, Box<Type>),
    /// Type-level string literal
    TypeString(Symbol),
    /// The empty row
    REmpty,
    /// Row cons: label, head type, tail row
    RCons(Symbol, Box<Type>, Box<Type>),
}

impl Type {
    pub fn app(f: Type, arg: Type) -> Type {
        Type::App(Box::new(f), Box::new(arg))
    }

    pub fn con(module: &str, name: &str) -> Type {
        Type::Con(Qualified::new(module, name))
    }

    pub fn var(name: &str) -> Type {
        Type::Var(interner::intern(name))
    }

    pub fn type_string(s: &str) -> Type {
        Type::TypeString(interner::intern(s))
    }

    pub fn rcons(label: &str, head: Type, tail: Type) -> Type {
        Type::RCons(interner::intern(label), Box::new(head), Box::new(tail))
    }

    pub fn forall(var: &str, body: Type) -> Type {
        Type::ForAll {
            var: interner::intern(var),
            body: Box::new(body),
            skolem: None,
        }
    }

    pub fn int() -> Type {
        Type::con("Prim", "Int")
    }

    pub fn string() -> Type {
        Type::con("Prim", "String")
    }

    pub fn boolean() -> Type {
        Type::con("Prim", "Boolean")
    }

    pub fn array(elem: Type) -> Type {
        Type::app(Type::con("Prim", "Array"), elem)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Unknown(u) => write!(f, "?{}", u),
            Type::Var(v) => write!(f, "{}", interner::show(*v)),
            Type::Skolem(name, id) => write!(f, "{}#{}", interner::show(*name), id),
            Type::Con(q) => write!(f, "{}", q),
            Type::App(func, arg) => write!(f, "({} {})", func, arg),
            Type::ForAll { var, body, .. } => {
                write!(f, "(forall {}. {})", interner::show(*var), body)
            }
            Type::Kinded(ty, kind) => write!(f, "({} :: {})", ty, kind),
            Type::TypeString(s) => write!(f, "\"{}\"", interner::show(*s)),
            Type::REmpty => write!(f, "()"),
            Type::RCons(..) => {
                let (items, tail) = row_to_list(self);
                write!(f, "( ")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} :: {}", interner::show(item.label), item.ty)?;
                }
                if !matches!(tail, Type::REmpty) {
                    write!(f, " | {}", tail)?;
                }
                write!(f, " )")
            }
        }
    }
}

/// Strip kind annotations from the head of a type.
pub fn strip_kinds(ty: &Type) -> &Type {
    match ty {
        Type::Kinded(inner, _) => strip_kinds(inner),
        other => other,
    }
}

/// Split a type application into its head and argument list, looking
/// through kind annotations.
pub fn unapply(ty: &Type) -> (&Type, Vec<&Type>) {
    let mut head = ty;
    let mut args = Vec::new();
    loop {
        match head {
            Type::App(f, a) => {
                args.push(a.as_ref());
                head = f.as_ref();
            }
            Type::Kinded(inner, _) => head = inner.as_ref(),
            _ => break,
        }
    }
    args.reverse();
    (head, args)
}

/// One entry of a row, produced by `row_to_list`.
#[derive(Debug, Clone, PartialEq)]
pub struct RowItem {
    pub label: Symbol,
    pub ty: Type,
}

impl RowItem {
    pub fn new(label: Symbol, ty: Type) -> Self {
        RowItem { label, ty }
    }
}

/// Split a row into its fixed entries and tail, preserving entry order.
pub fn row_to_list(row: &Type) -> (Vec<RowItem>, Type) {
    let mut items = Vec::new();
    let mut current = row;
    loop {
        match current {
            Type::RCons(label, head, tail) => {
                items.push(RowItem::new(*label, (**head).clone()));
                current = tail.as_ref();
            }
            Type::Kinded(inner, _) => current = inner.as_ref(),
            _ => return (items, current.clone()),
        }
    }
}

/// Rebuild a row from entries and a tail.
pub fn row_from_list(items: &[RowItem], tail: Type) -> Type {
    items.iter().rev().fold(tail, |acc, item| {
        Type::RCons(item.label, Box::new(item.ty.clone()), Box::new(acc))
    })
}

/// The result of aligning two rows by label.
#[derive(Debug, Clone)]
pub struct RowAlignment {
    /// Entries present in both rows, paired by label
    pub common: Vec<(RowItem, RowItem)>,
    pub left_rest: Vec<RowItem>,
    pub left_tail: Type,
    pub right_rest: Vec<RowItem>,
    pub right_tail: Type,
}

/// Pair the entries of two rows by label, ignoring declaration order.
/// Duplicate labels pair up positionally, first with first.
pub fn align_rows(left: &Type, right: &Type) -> RowAlignment {
    let (left_items, left_tail) = row_to_list(left);
    let (right_items, right_tail) = row_to_list(right);
    let mut right_slots: Vec<Option<RowItem>> = right_items.into_iter().map(Some).collect();
    let mut common = Vec::new();
    let mut left_rest = Vec::new();
    for item in left_items {
        let slot = right_slots
            .iter_mut()
            .find(|slot| matches!(slot, Some(r) if r.label == item.label));
        match slot {
            Some(slot) => common.push((item, slot.take().expect("slot was matched non-empty"))),
            None => left_rest.push(item),
        }
    }
    let right_rest = right_slots.into_iter().flatten().collect();
    RowAlignment {
        common,
        left_rest,
        left_tail,
        right_rest,
        right_tail,
    }
}

/// Substitute named type variables in a type. `ForAll` binders shadow.
pub fn replace_type_vars(subst: &HashMap<Symbol, Type>, ty: &Type) -> Type {
    match ty {
        Type::Var(v) => subst.get(v).cloned().unwrap_or_else(|| ty.clone()),
        Type::App(f, a) => Type::app(replace_type_vars(subst, f), replace_type_vars(subst, a)),
        Type::ForAll { var, body, skolem } => {
            let body = if subst.contains_key(var) {
                let mut inner = subst.clone();
                inner.remove(var);
                replace_type_vars(&inner, body)
            } else {
                replace_type_vars(subst, body)
            };
            Type::ForAll {
                var: *var,
                body: Box::new(body),
                skolem: *skolem,
            }
        }
        Type::Kinded(inner, kind) => Type::Kinded(
            Box::new(replace_type_vars(subst, inner)),
            Box::new((**kind).clone()),
        ),
        Type::RCons(label, head, tail) => Type::RCons(
            *label,
            Box::new(replace_type_vars(subst, head)),
            Box::new(replace_type_vars(subst, tail)),
        ),
        Type::Unknown(_) | Type::Skolem(..) | Type::Con(_) | Type::TypeString(_) | Type::REmpty => {
            ty.clone()
        }
    }
}

/// Collect free named type variables in order of first occurrence.
pub fn collect_type_vars(ty: &Type, out: &mut Vec<Symbol>) {
    fn go(ty: &Type, bound: &mut Vec<Symbol>, out: &mut Vec<Symbol>) {
        match ty {
            Type::Var(v) => {
                if !bound.contains(v) && !out.contains(v) {
                    out.push(*v);
                }
            }
            Type::App(f, a) => {
                go(f, bound, out);
                go(a, bound, out);
            }
            Type::ForAll { var, body, .. } => {
                bound.push(*var);
                go(body, bound, out);
                bound.pop();
            }
            Type::Kinded(inner, _) => go(inner, bound, out),
            Type::RCons(_, head, tail) => {
                go(head, bound, out);
                go(tail, bound, out);
            }
            Type::Unknown(_) | Type::Skolem(..) | Type::Con(_) | Type::TypeString(_)
            | Type::REmpty => {}
        }
    }
    go(ty, &mut Vec::new(), out);
}

/// Collect the modules owning any constructor in a type, walking through
/// applications and kind annotations. Used to scope instance lookup.
pub fn constructor_modules(ty: &Type, out: &mut Vec<Symbol>) {
    match ty {
        Type::Con(q) => {
            if let Some(module) = q.module {
                if !out.contains(&module) {
                    out.push(module);
                }
            }
        }
        Type::App(f, a) => {
            constructor_modules(f, out);
            constructor_modules(a, out);
        }
        Type::Kinded(inner, _) => constructor_modules(inner, out),
        _ => {}
    }
}

/// A wanted or given class constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub class: Qualified,
    pub args: Vec<Type>,
    /// Source location of the constraint, if it came from user code
    pub span: Option<Span>,
}

impl Constraint {
    pub fn new(class: Qualified, args: Vec<Type>) -> Self {
        Constraint {
            class,
            args,
            span: None,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.class)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Qualified names of the compiler-solved classes and their support types.
pub mod prim {
    use super::Qualified;

    pub fn partial() -> Qualified {
        Qualified::new("Prim", "Partial")
    }

    pub fn coercible() -> Qualified {
        Qualified::new("Prim.Coerce", "Coercible")
    }

    pub fn warn() -> Qualified {
        Qualified::new("Prim.TypeError", "Warn")
    }

    pub fn is_symbol() -> Qualified {
        Qualified::new("Data.Symbol", "IsSymbol")
    }

    pub fn symbol_compare() -> Qualified {
        Qualified::new("Prim.Symbol", "Compare")
    }

    pub fn symbol_append() -> Qualified {
        Qualified::new("Prim.Symbol", "Append")
    }

    pub fn symbol_cons() -> Qualified {
        Qualified::new("Prim.Symbol", "Cons")
    }

    pub fn row_union() -> Qualified {
        Qualified::new("Prim.Row", "Union")
    }

    pub fn row_nub() -> Qualified {
        Qualified::new("Prim.Row", "Nub")
    }

    pub fn row_lacks() -> Qualified {
        Qualified::new("Prim.Row", "Lacks")
    }

    pub fn row_cons() -> Qualified {
        Qualified::new("Prim.Row", "Cons")
    }

    pub fn row_to_list() -> Qualified {
        Qualified::new("Prim.RowList", "RowToList")
    }

    pub fn row_list_cons() -> Qualified {
        Qualified::new("Prim.RowList", "Cons")
    }

    pub fn row_list_nil() -> Qualified {
        Qualified::new("Prim.RowList", "Nil")
    }

    pub fn ordering_lt() -> Qualified {
        Qualified::new("Prim.Ordering", "LT")
    }

    pub fn ordering_eq() -> Qualified {
        Qualified::new("Prim.Ordering", "EQ")
    }

    pub fn ordering_gt() -> Qualified {
        Qualified::new("Prim.Ordering", "GT")
    }

    pub fn function() -> Qualified {
        Qualified::new("Prim", "Function")
    }

    pub fn array() -> Qualified {
        Qualified::new("Prim", "Array")
    }

    pub fn record() -> Qualified {
        Qualified::new("Prim", "Record")
    }

    pub fn undefined() -> Qualified {
        Qualified::new("Prim", "undefined")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_round_trip() {
        let row = Type::rcons(
            "foo",
            Type::int(),
            Type::rcons("bar", Type::string(), Type::REmpty),
        );
        let (items, tail) = row_to_list(&row);
        assert_eq!(items.len(), 2);
        assert_eq!(tail, Type::REmpty);
        assert_eq!(row_from_list(&items, tail), row);
    }

    #[test]
    fn test_align_rows_by_label() {
        let left = Type::rcons(
            "a",
            Type::int(),
            Type::rcons("b", Type::string(), Type::REmpty),
        );
        let right = Type::rcons(
            "b",
            Type::boolean(),
            Type::rcons("c", Type::int(), Type::Unknown(0)),
        );
        let aligned = align_rows(&left, &right);
        assert_eq!(aligned.common.len(), 1);
        assert_eq!(interner::show(aligned.common[0].0.label), "b");
        assert_eq!(aligned.left_rest.len(), 1);
        assert_eq!(aligned.right_rest.len(), 1);
        assert_eq!(aligned.left_tail, Type::REmpty);
        assert_eq!(aligned.right_tail, Type::Unknown(0));
    }

    #[test]
    fn test_replace_type_vars_shadowing() {
        let mut subst = HashMap::new();
        subst.insert(interner::intern("a"), Type::int());
        let ty = Type::app(Type::var("a"), Type::forall("a", Type::var("a")));
        let replaced = replace_type_vars(&subst, &ty);
        assert_eq!(
            replaced,
            Type::app(Type::int(), Type::forall("a", Type::var("a")))
        );
    }

    #[test]
    fn test_unapply_through_kinds() {
        let ty = Type::app(
            Type::Kinded(
                Box::new(Type::app(Type::con("Prim", "Function"), Type::int())),
                Box::new(Type::var("k")),
            ),
            Type::string(),
        );
        let (head, args) = unapply(&ty);
        assert_eq!(*head, Type::con("Prim", "Function"));
        assert_eq!(args.len(), 2);
    }
}
