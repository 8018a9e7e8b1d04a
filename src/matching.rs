use std::collections::{HashMap, HashSet};

use crate::dictionary::TypeClassDict;
use crate::environment::FunctionalDependency;
use crate::interner::Symbol;
use crate::types::{align_rows, row_from_list, strip_kinds, RowAlignment, Type};

/// Result of a matching step. `Apart` is definitive failure, `Unknown`
/// means matching cannot be decided yet, `Match` carries its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Matched<T> {
    Match(T),
    Apart,
    Unknown,
}

impl Matched<()> {
    /// Monoidal combination: `Apart` absorbs, `Match` is the unit.
    pub fn and(self, other: Matched<()>) -> Matched<()> {
        match (self, other) {
            (Matched::Apart, _) | (_, Matched::Apart) => Matched::Apart,
            (Matched::Unknown, _) | (_, Matched::Unknown) => Matched::Unknown,
            _ => Matched::Match(()),
        }
    }
}

/// Per-variable candidate bindings accumulated while matching an instance
/// head. A variable bound at several positions keeps every candidate;
/// they are compared pairwise before the match is accepted.
pub type Matching = HashMap<Symbol, Vec<Type>>;

fn merge_matching(into: &mut Matching, from: Matching) {
    for (var, types) in from {
        into.entry(var).or_default().extend(types);
    }
}

fn no_bindings(result: Matched<()>) -> (Matched<()>, Matching) {
    (result, Matching::new())
}

fn single_binding(var: Symbol, ty: Type) -> (Matched<()>, Matching) {
    let mut matching = Matching::new();
    matching.insert(var, vec![ty]);
    (Matched::Match(()), matching)
}

fn combine(
    left: (Matched<()>, Matching),
    right: (Matched<()>, Matching),
) -> (Matched<()>, Matching) {
    let (lm, mut lb) = left;
    let (rm, rb) = right;
    merge_matching(&mut lb, rb);
    (lm.and(rm), lb)
}

/// Decide whether an instance head matches the wanted types, honouring
/// the class's functional dependencies. The returned matching keeps the
/// bindings of every position, including those only covered through a
/// dependency, because the commit step unifies with all of them.
pub fn matches(
    fundeps: &[FunctionalDependency],
    dict: &TypeClassDict,
    wanted: &[Type],
) -> Matched<Matching> {
    let compared: Vec<(Matched<()>, Matching)> = wanted
        .iter()
        .zip(dict.instance_types.iter())
        .map(|(w, i)| type_heads_are_equal(w, i))
        .collect();

    if !covers(fundeps, &compared) {
        return if compared.iter().any(|(m, _)| *m == Matched::Apart) {
            Matched::Apart
        } else {
            Matched::Unknown
        };
    }

    // Positions a dependency determines are inferred rather than matched;
    // their bindings are excluded from verification.
    let determined: HashSet<usize> = fundeps
        .iter()
        .flat_map(|fd| fd.determined.iter().copied())
        .collect();
    let mut to_verify = Matching::new();
    for (position, (_, matching)) in compared.iter().enumerate() {
        if determined.contains(&position) {
            continue;
        }
        merge_matching(&mut to_verify, matching.clone());
    }
    if verify_substitution(&to_verify) == Matched::Apart {
        return Matched::Apart;
    }

    let mut all = Matching::new();
    for (_, matching) in compared {
        merge_matching(&mut all, matching);
    }
    Matched::Match(all)
}

/// Close the set of directly matched positions under the functional
/// dependencies; the instance is usable only if the closure covers every
/// position.
fn covers(fundeps: &[FunctionalDependency], compared: &[(Matched<()>, Matching)]) -> bool {
    let mut matched: Vec<bool> = compared
        .iter()
        .map(|(m, _)| *m == Matched::Match(()))
        .collect();
    loop {
        let mut changed = false;
        for fd in fundeps {
            if fd
                .determiners
                .iter()
                .all(|&i| matched.get(i).copied().unwrap_or(false))
            {
                for &i in &fd.determined {
                    if let Some(slot) = matched.get_mut(i) {
                        if !*slot {
                            *slot = true;
                            changed = true;
                        }
                    }
                }
            }
        }
        if !changed {
            break;
        }
    }
    matched.iter().all(|&m| m)
}

/// Pairwise comparison of every variable's candidate bindings. Only a
/// provable apartness rejects the match; undecided pairs are left to the
/// commit step's unification.
fn verify_substitution(matching: &Matching) -> Matched<()> {
    for types in matching.values() {
        for i in 0..types.len() {
            for j in (i + 1)..types.len() {
                if types_are_equal(&types[i], &types[j]) == Matched::Apart {
                    return Matched::Apart;
                }
            }
        }
    }
    Matched::Match(())
}

/// Compare a wanted type against an instance head position. Variables in
/// the instance head are binders and capture the wanted type; variables in
/// the wanted types are rigid.
pub fn type_heads_are_equal(wanted: &Type, instance: &Type) -> (Matched<()>, Matching) {
    match (wanted, instance) {
        (Type::Kinded(inner, _), _) => type_heads_are_equal(inner, instance),
        (_, Type::Kinded(inner, _)) => type_heads_are_equal(wanted, inner),
        (Type::Unknown(u1), Type::Unknown(u2)) if u1 == u2 => no_bindings(Matched::Match(())),
        (Type::Skolem(_, s1), Type::Skolem(_, s2)) if s1 == s2 => no_bindings(Matched::Match(())),
        (_, Type::Var(var)) => single_binding(*var, wanted.clone()),
        (Type::Con(c1), Type::Con(c2)) if c1 == c2 => no_bindings(Matched::Match(())),
        (Type::TypeString(s1), Type::TypeString(s2)) if s1 == s2 => no_bindings(Matched::Match(())),
        (Type::App(h1, a1), Type::App(h2, a2)) => {
            combine(type_heads_are_equal(h1, h2), type_heads_are_equal(a1, a2))
        }
        (Type::REmpty, Type::REmpty) => no_bindings(Matched::Match(())),
        (Type::RCons(..), Type::RCons(..)) => row_heads_are_equal(wanted, instance),
        (Type::Unknown(_), _) => no_bindings(Matched::Unknown),
        _ => no_bindings(Matched::Apart),
    }
}

/// Rows align by label; common labels recurse and the unaligned remainder
/// is settled by the tails.
fn row_heads_are_equal(wanted: &Type, instance: &Type) -> (Matched<()>, Matching) {
    let aligned = align_rows(wanted, instance);
    let mut result = row_tails_are_equal(&aligned);
    for (w, i) in &aligned.common {
        result = combine(result, type_heads_are_equal(&w.ty, &i.ty));
    }
    result
}

fn row_tails_are_equal(aligned: &RowAlignment) -> (Matched<()>, Matching) {
    let wanted_tail = strip_kinds(&aligned.left_tail);
    let instance_tail = strip_kinds(&aligned.right_tail);
    match (wanted_tail, instance_tail) {
        // A trailing variable on the instance side absorbs whatever the
        // wanted row has left.
        (_, Type::Var(var)) if aligned.right_rest.is_empty() => single_binding(
            *var,
            row_from_list(&aligned.left_rest, wanted_tail.clone()),
        ),
        _ if aligned.left_rest.is_empty() && aligned.right_rest.is_empty() => {
            type_heads_are_equal(wanted_tail, instance_tail)
        }
        _ if matches!(wanted_tail, Type::Unknown(_))
            || matches!(instance_tail, Type::Unknown(_)) =>
        {
            no_bindings(Matched::Unknown)
        }
        _ => no_bindings(Matched::Apart),
    }
}

/// Strict head equality used to reconcile repeated bindings of one
/// instance variable. Kind wrappers are transparent, a skolem against
/// anything else stays undecided, rows align by label.
pub fn types_are_equal(t1: &Type, t2: &Type) -> Matched<()> {
    match (t1, t2) {
        (Type::Kinded(inner, _), _) => types_are_equal(inner, t2),
        (_, Type::Kinded(inner, _)) => types_are_equal(t1, inner),
        (Type::Unknown(a), Type::Unknown(b)) if a == b => Matched::Match(()),
        (Type::Skolem(_, a), Type::Skolem(_, b)) if a == b => Matched::Match(()),
        (Type::Skolem(..), _) | (_, Type::Skolem(..)) => Matched::Unknown,
        (Type::Var(a), Type::Var(b)) if a == b => Matched::Match(()),
        (Type::Con(a), Type::Con(b)) if a == b => Matched::Match(()),
        (Type::TypeString(a), Type::TypeString(b)) if a == b => Matched::Match(()),
        (Type::App(f1, a1), Type::App(f2, a2)) => {
            types_are_equal(f1, f2).and(types_are_equal(a1, a2))
        }
        (Type::REmpty, Type::REmpty) => Matched::Match(()),
        _ if matches!(t1, Type::RCons(..)) || matches!(t2, Type::RCons(..)) => {
            rows_are_equal(t1, t2)
        }
        _ => Matched::Apart,
    }
}

fn rows_are_equal(t1: &Type, t2: &Type) -> Matched<()> {
    let aligned = align_rows(t1, t2);
    let mut result = Matched::Match(());
    for (left, right) in &aligned.common {
        result = result.and(types_are_equal(&left.ty, &right.ty));
    }
    let tails = if aligned.left_rest.is_empty() && aligned.right_rest.is_empty() {
        types_are_equal(&aligned.left_tail, &aligned.right_tail)
    } else if matches!(strip_kinds(&aligned.left_tail), Type::Unknown(_))
        || matches!(strip_kinds(&aligned.right_tail), Type::Unknown(_))
    {
        Matched::Unknown
    } else {
        Matched::Apart
    };
    result.and(tails)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::{Evidence, TypeClassDict};
    use crate::interner;
    use crate::types::{prim, Qualified};

    fn instance_dict(types: Vec<Type>) -> TypeClassDict {
        TypeClassDict::synthesised(
            Qualified::new("Data.Show", "Show"),
            types,
            Evidence::EmptyClassInstance,
            vec![],
        )
    }

    #[test]
    fn test_instance_var_binds_wanted() {
        let dict = instance_dict(vec![Type::array(Type::var("a"))]);
        let wanted = vec![Type::array(Type::int())];
        match matches(&[], &dict, &wanted) {
            Matched::Match(matching) => {
                assert_eq!(matching[&interner::intern("a")], vec![Type::int()]);
            }
            other => panic!("expected match, got {:?}", other),
        }
    }

    #[test]
    fn test_apart_constructors() {
        let dict = instance_dict(vec![Type::int()]);
        assert_eq!(matches(&[], &dict, &[Type::string()]), Matched::Apart);
    }

    #[test]
    fn test_unknown_wanted_blocks() {
        let dict = instance_dict(vec![Type::int()]);
        assert_eq!(matches(&[], &dict, &[Type::Unknown(0)]), Matched::Unknown);
    }

    #[test]
    fn test_conflicting_bindings_are_apart() {
        let dict = instance_dict(vec![Type::var("a"), Type::var("a")]);
        let wanted = vec![Type::int(), Type::string()];
        assert_eq!(matches(&[], &dict, &wanted), Matched::Apart);
    }

    #[test]
    fn test_skolem_binding_stays_matchable() {
        let dict = instance_dict(vec![Type::var("a"), Type::var("a")]);
        let skolem = Type::Skolem(interner::intern("s"), 0);
        let wanted = vec![Type::int(), skolem];
        assert!(matches!(matches(&[], &dict, &wanted), Matched::Match(_)));
    }

    #[test]
    fn test_fundep_covers_output_position() {
        use crate::environment::FunctionalDependency;
        // Matching on the first position only, the dependency 0 -> 1
        // completes the cover even though position 1 is undecided.
        let dict = instance_dict(vec![Type::int(), Type::string()]);
        let fundeps = [FunctionalDependency::new(vec![0], vec![1])];
        let wanted = vec![Type::int(), Type::Unknown(3)];
        assert!(matches!(matches(&fundeps, &dict, &wanted), Matched::Match(_)));
    }

    #[test]
    fn test_row_absorbed_by_instance_var() {
        let dict = instance_dict(vec![Type::rcons("foo", Type::int(), Type::var("r"))]);
        let wanted = vec![Type::rcons(
            "bar",
            Type::string(),
            Type::rcons("foo", Type::int(), Type::REmpty),
        )];
        match matches(&[], &dict, &wanted) {
            Matched::Match(matching) => {
                let bound = &matching[&interner::intern("r")];
                assert_eq!(
                    bound,
                    &vec![Type::rcons("bar", Type::string(), Type::REmpty)]
                );
            }
            other => panic!("expected match, got {:?}", other),
        }
    }

    #[test]
    fn test_row_mismatched_labels_apart() {
        let dict = instance_dict(vec![Type::rcons("foo", Type::int(), Type::REmpty)]);
        let wanted = vec![Type::rcons("bar", Type::int(), Type::REmpty)];
        assert_eq!(matches(&[], &dict, &wanted), Matched::Apart);
    }

    #[test]
    fn test_kinded_wrappers_are_transparent() {
        let dict = instance_dict(vec![Type::int()]);
        let wanted = vec![Type::Kinded(
            Box::new(Type::int()),
            Box::new(Type::Con(prim::record())),
        )];
        assert!(matches!(matches(&[], &dict, &wanted), Matched::Match(_)));
    }
}
