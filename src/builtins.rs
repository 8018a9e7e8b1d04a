use std::cmp::Ordering;
use std::collections::HashMap;

use crate::dictionary::{Evidence, InstanceContext, TypeClassDict};
use crate::environment::Environment;
use crate::interner::{self, Symbol};
use crate::roles::{Role, RoleTable};
use crate::types::{
    prim, row_from_list, row_to_list, strip_kinds, unapply, Constraint, Qualified, Type,
};

/// Solve classes whose instances are computed from type structure.
/// `None` means the class is not solver-owned or no progress can be made
/// yet; the generic instance search proceeds in that case.
pub fn for_class(
    env: &Environment,
    roles: &RoleTable,
    context: &InstanceContext,
    class: &Qualified,
    args: &[Type],
) -> Option<Vec<TypeClassDict>> {
    if *class == prim::warn() {
        solve_warn(context, args)
    } else if *class == prim::coercible() {
        solve_coercible(env, roles, args)
    } else if *class == prim::is_symbol() {
        solve_is_symbol(args)
    } else if *class == prim::symbol_compare() {
        solve_symbol_compare(args)
    } else if *class == prim::symbol_append() {
        solve_symbol_append(args)
    } else if *class == prim::symbol_cons() {
        solve_symbol_cons(args)
    } else if *class == prim::row_union() {
        solve_union(args)
    } else if *class == prim::row_nub() {
        solve_nub(args)
    } else if *class == prim::row_lacks() {
        solve_lacks(args)
    } else if *class == prim::row_cons() {
        solve_row_cons(args)
    } else if *class == prim::row_to_list() {
        solve_row_to_list(args)
    } else {
        None
    }
}

/// In-scope `Warn` dictionaries come first so a user-supplied dictionary
/// wins and the warning is deferred; the synthesised instance is appended
/// as the fallback.
fn solve_warn(context: &InstanceContext, args: &[Type]) -> Option<Vec<TypeClassDict>> {
    let [msg] = args else { return None };
    let mut dicts = context.find_dicts(&prim::warn(), None);
    dicts.push(TypeClassDict::synthesised(
        prim::warn(),
        vec![msg.clone()],
        Evidence::WarnInstance(msg.clone()),
        vec![],
    ));
    Some(dicts)
}

fn coercible_constraint(a: &Type, b: &Type) -> Constraint {
    Constraint::new(prim::coercible(), vec![a.clone(), b.clone()])
}

/// `Coercible a b`: reflexivity after synonym expansion, otherwise reduce
/// one side by newtype unwrapping or role-driven congruence.
fn solve_coercible(
    env: &Environment,
    roles: &RoleTable,
    args: &[Type],
) -> Option<Vec<TypeClassDict>> {
    let [a, b] = args else { return None };
    let a_expanded = env.expand_synonyms(a).ok()?;
    let b_expanded = env.expand_synonyms(b).ok()?;
    let subgoals = if a_expanded == b_expanded {
        vec![]
    } else {
        coercible_reduce(env, roles, &a_expanded, &b_expanded)
            .or_else(|| coercible_reduce(env, roles, &b_expanded, &a_expanded))?
    };
    Some(vec![TypeClassDict::synthesised(
        prim::coercible(),
        vec![a.clone(), b.clone()],
        Evidence::EmptyClassInstance,
        subgoals,
    )])
}

fn coercible_reduce(
    env: &Environment,
    roles: &RoleTable,
    a: &Type,
    b: &Type,
) -> Option<Vec<Constraint>> {
    let (head_a, args_a) = unapply(a);
    let (head_b, args_b) = unapply(b);

    // Same constructor on both sides: decompose argument-wise by role.
    // Phantom positions and syntactically identical arguments need no
    // subgoal.
    if let (Type::Con(con_a), Type::Con(con_b)) = (head_a, head_b) {
        if con_a == con_b && args_a.len() == args_b.len() {
            let param_roles = roles.param_roles(con_a);
            let mut subgoals = Vec::new();
            for (i, (x, y)) in args_a.iter().zip(args_b.iter()).enumerate() {
                match param_roles.get(i).copied().unwrap_or(Role::Representational) {
                    Role::Representational if x != y => subgoals.push(coercible_constraint(x, y)),
                    Role::Representational | Role::Phantom => {}
                }
            }
            return Some(subgoals);
        }
    }

    // Left side is a saturated newtype: unwrap it.
    if let Type::Con(con_a) = head_a {
        if let Some((params, wrapped, _)) = env.newtype_constructor(con_a) {
            if params.len() == args_a.len() {
                let subst: HashMap<Symbol, Type> = params
                    .iter()
                    .copied()
                    .zip(args_a.iter().map(|t| (*t).clone()))
                    .collect();
                let unwrapped = crate::types::replace_type_vars(&subst, wrapped);
                return Some(vec![coercible_constraint(&unwrapped, b)]);
            }
        }
    }

    None
}

fn solve_is_symbol(args: &[Type]) -> Option<Vec<TypeClassDict>> {
    let [ty] = args else { return None };
    match strip_kinds(ty) {
        Type::TypeString(sym) => Some(vec![TypeClassDict::synthesised(
            prim::is_symbol(),
            vec![ty.clone()],
            Evidence::IsSymbolInstance(*sym),
            vec![],
        )]),
        _ => None,
    }
}

fn solve_symbol_compare(args: &[Type]) -> Option<Vec<TypeClassDict>> {
    let [lhs, rhs, _] = args else { return None };
    let (Type::TypeString(left), Type::TypeString(right)) = (strip_kinds(lhs), strip_kinds(rhs))
    else {
        return None;
    };
    let ordering = match interner::show(*left).cmp(&interner::show(*right)) {
        Ordering::Less => prim::ordering_lt(),
        Ordering::Equal => prim::ordering_eq(),
        Ordering::Greater => prim::ordering_gt(),
    };
    Some(vec![TypeClassDict::synthesised(
        prim::symbol_compare(),
        vec![lhs.clone(), rhs.clone(), Type::Con(ordering)],
        Evidence::EmptyClassInstance,
        vec![],
    )])
}

fn solve_symbol_append(args: &[Type]) -> Option<Vec<TypeClassDict>> {
    let [left, right, appended] = args else { return None };
    let head = append_symbols(
        strip_kinds(left),
        strip_kinds(right),
        strip_kinds(appended),
    )?;
    Some(vec![TypeClassDict::synthesised(
        prim::symbol_append(),
        head,
        Evidence::EmptyClassInstance,
        vec![],
    )])
}

/// Fill in the one underdetermined position of `Append left right out`:
/// concatenate two known inputs, or strip a known prefix/suffix from a
/// known result.
fn append_symbols(left: &Type, right: &Type, out: &Type) -> Option<Vec<Type>> {
    match (left, right, out) {
        (Type::TypeString(a), Type::TypeString(b), _) => {
            let joined = format!("{}{}", interner::show(*a), interner::show(*b));
            Some(vec![
                left.clone(),
                right.clone(),
                Type::type_string(&joined),
            ])
        }
        (Type::TypeString(a), _, Type::TypeString(c)) => {
            let full = interner::show(*c);
            let rest = full.strip_prefix(&interner::show(*a))?;
            Some(vec![left.clone(), Type::type_string(rest), out.clone()])
        }
        (_, Type::TypeString(b), Type::TypeString(c)) => {
            let full = interner::show(*c);
            let rest = full.strip_suffix(&interner::show(*b))?;
            Some(vec![Type::type_string(rest), right.clone(), out.clone()])
        }
        _ => None,
    }
}

fn solve_symbol_cons(args: &[Type]) -> Option<Vec<TypeClassDict>> {
    let [head, tail, symbol] = args else { return None };
    let filled = cons_symbol(strip_kinds(head), strip_kinds(tail), strip_kinds(symbol))?;
    Some(vec![TypeClassDict::synthesised(
        prim::symbol_cons(),
        filled,
        Evidence::EmptyClassInstance,
        vec![],
    )])
}

/// Decompose a non-empty literal into first character and remainder, or
/// compose a single-character head with a tail.
fn cons_symbol(head: &Type, tail: &Type, symbol: &Type) -> Option<Vec<Type>> {
    match (head, tail, symbol) {
        (_, _, Type::TypeString(full)) => {
            let s = interner::show(*full);
            let mut chars = s.chars();
            let first = chars.next()?;
            let rest = chars.as_str();
            Some(vec![
                Type::type_string(&first.to_string()),
                Type::type_string(rest),
                symbol.clone(),
            ])
        }
        (Type::TypeString(h), Type::TypeString(t), _) => {
            let head_str = interner::show(*h);
            let mut chars = head_str.chars();
            chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            let joined = format!("{}{}", head_str, interner::show(*t));
            Some(vec![head.clone(), tail.clone(), Type::type_string(&joined)])
        }
        _ => None,
    }
}

/// Left-biased row union. With a closed left row the result is committed
/// outright; an open left row commits its fixed prefix and re-raises the
/// union of the tail as a subgoal.
fn solve_union(args: &[Type]) -> Option<Vec<TypeClassDict>> {
    let [left, right, _] = args else { return None };
    let (fixed, tail) = row_to_list(left);
    let (out, subgoals) = match strip_kinds(&tail) {
        Type::REmpty => {
            let (right_items, right_tail) = row_to_list(right);
            let merged: Vec<_> = fixed
                .iter()
                .cloned()
                .chain(
                    right_items
                        .into_iter()
                        .filter(|item| !fixed.iter().any(|f| f.label == item.label)),
                )
                .collect();
            (row_from_list(&merged, right_tail), vec![])
        }
        Type::Unknown(_) | Type::Var(_) => {
            if fixed.is_empty() {
                return None;
            }
            // The rest variable is freshened into an unknown when the
            // instance head is committed. The reserved name cannot clash
            // with a surface-syntax variable.
            let rest = Type::var("$rest");
            (
                row_from_list(&fixed, rest.clone()),
                vec![Constraint::new(
                    prim::row_union(),
                    vec![tail.clone(), right.clone(), rest],
                )],
            )
        }
        _ => return None,
    };
    Some(vec![TypeClassDict::synthesised(
        prim::row_union(),
        vec![left.clone(), right.clone(), out],
        Evidence::EmptyClassInstance,
        subgoals,
    )])
}

/// `Nub` only commits on a closed row: entries sort by label and the
/// first entry per label survives.
fn solve_nub(args: &[Type]) -> Option<Vec<TypeClassDict>> {
    let [row, _] = args else { return None };
    let (fixed, tail) = row_to_list(row);
    if !matches!(strip_kinds(&tail), Type::REmpty) {
        return None;
    }
    let mut sorted = fixed;
    sorted.sort_by_key(|item| interner::show(item.label));
    sorted.dedup_by_key(|item| item.label);
    Some(vec![TypeClassDict::synthesised(
        prim::row_nub(),
        vec![row.clone(), row_from_list(&sorted, tail)],
        Evidence::EmptyClassInstance,
        vec![],
    )])
}

/// `Lacks label row`: the label must be absent from the fixed entries;
/// an open tail re-raises the constraint on the tail.
fn solve_lacks(args: &[Type]) -> Option<Vec<TypeClassDict>> {
    let [sym, row] = args else { return None };
    let Type::TypeString(label) = strip_kinds(sym) else {
        return None;
    };
    let (fixed, tail) = row_to_list(row);
    if fixed.iter().any(|item| item.label == *label) {
        return None;
    }
    let subgoals = match strip_kinds(&tail) {
        Type::REmpty => vec![],
        _ if !fixed.is_empty() => vec![Constraint::new(
            prim::row_lacks(),
            vec![sym.clone(), tail.clone()],
        )],
        _ => return None,
    };
    Some(vec![TypeClassDict::synthesised(
        prim::row_lacks(),
        vec![sym.clone(), row.clone()],
        Evidence::EmptyClassInstance,
        subgoals,
    )])
}

fn solve_row_cons(args: &[Type]) -> Option<Vec<TypeClassDict>> {
    let [sym, ty, row, _] = args else { return None };
    let Type::TypeString(label) = strip_kinds(sym) else {
        return None;
    };
    let out = Type::RCons(*label, Box::new(ty.clone()), Box::new(row.clone()));
    Some(vec![TypeClassDict::synthesised(
        prim::row_cons(),
        vec![sym.clone(), ty.clone(), row.clone(), out],
        Evidence::EmptyClassInstance,
        vec![],
    )])
}

/// Reflect a closed row into a `RowList`, sorted by label.
fn solve_row_to_list(args: &[Type]) -> Option<Vec<TypeClassDict>> {
    let [row, _] = args else { return None };
    let (fixed, tail) = row_to_list(row);
    if !matches!(strip_kinds(&tail), Type::REmpty) {
        return None;
    }
    let mut sorted = fixed;
    sorted.sort_by_key(|item| interner::show(item.label));
    let list = sorted
        .into_iter()
        .rev()
        .fold(Type::Con(prim::row_list_nil()), |acc, item| {
            Type::app(
                Type::app(
                    Type::app(Type::Con(prim::row_list_cons()), Type::TypeString(item.label)),
                    item.ty,
                ),
                acc,
            )
        });
    Some(vec![TypeClassDict::synthesised(
        prim::row_to_list(),
        vec![row.clone(), list],
        Evidence::EmptyClassInstance,
        vec![],
    )])
}
