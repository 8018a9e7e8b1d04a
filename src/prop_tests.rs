//! Property tests for the solver using proptest.
//!
//! These stress laws that must hold for ANY input, not just hand-picked
//! examples:
//!
//! 1. Symbol round-trips: appending then stripping recovers the operand,
//!    and decomposing a cons recovers head and tail
//! 2. Row union left bias: for a closed left row, the union keeps the
//!    left type at every label the left row mentions
//! 3. Coercible confluence: solving `Coercible a b` succeeds exactly when
//!    `Coercible b a` does, with the same subgoals up to argument order

use proptest::prelude::*;

use crate::builtins;
use crate::dictionary::InstanceContext;
use crate::entailment::{Solver, SolverOptions};
use crate::environment::{DataConstructor, Environment};
use crate::interner;
use crate::roles::RoleTable;
use crate::types::{prim, row_to_list, Constraint, Qualified, Type};

const LABEL_POOL: &[&str] = &["a", "b", "c", "d", "x", "y"];

fn strict() -> SolverOptions {
    SolverOptions {
        should_generalize: false,
        defer_errors: false,
    }
}

fn arb_label() -> impl Strategy<Value = &'static str> {
    prop::sample::select(LABEL_POOL)
}

fn arb_ground_type() -> impl Strategy<Value = Type> {
    prop_oneof![
        Just(Type::int()),
        Just(Type::string()),
        Just(Type::boolean()),
    ]
}

fn arb_row_entries() -> impl Strategy<Value = Vec<(&'static str, Type)>> {
    prop::collection::vec((arb_label(), arb_ground_type()), 0..5)
}

fn closed_row(entries: &[(&str, Type)]) -> Type {
    entries.iter().rev().fold(Type::REmpty, |acc, (label, ty)| {
        Type::rcons(label, ty.clone(), acc)
    })
}

/// An environment with one representational wrapper, one phantom-tagged
/// type and one newtype, enough to exercise every Coercible rule.
fn coercible_env() -> Environment {
    let mut env = Environment::new();
    env.add_data_type(
        Qualified::new("Main", "Box"),
        &["a"],
        vec![DataConstructor::new("Box", vec![Type::var("a")])],
    );
    env.add_data_type(
        Qualified::new("Main", "Tag"),
        &["p", "a"],
        vec![DataConstructor::new("Tag", vec![Type::var("a")])],
    );
    env.add_newtype(Qualified::new("Main", "Age"), &[], "Age", Type::int());
    env
}

fn arb_coercible_type() -> impl Strategy<Value = Type> {
    let leaf = prop_oneof![
        Just(Type::int()),
        Just(Type::string()),
        Just(Type::con("Main", "Age")),
    ];
    leaf.prop_recursive(2, 8, 2, |inner| {
        prop_oneof![
            inner
                .clone()
                .prop_map(|t| Type::app(Type::con("Main", "Box"), t)),
            (inner.clone(), inner).prop_map(|(p, a)| {
                Type::app(Type::app(Type::con("Main", "Tag"), p), a)
            }),
        ]
    })
}

/// Subgoal fingerprint that ignores the order of a Coercible pair.
fn subgoal_keys(subgoals: &[Constraint]) -> Vec<String> {
    let mut keys: Vec<String> = subgoals
        .iter()
        .map(|goal| {
            let mut parts: Vec<String> = goal.args.iter().map(|t| t.to_string()).collect();
            parts.sort();
            format!("{} {}", goal.class, parts.join(" | "))
        })
        .collect();
    keys.sort();
    keys
}

proptest! {
    #[test]
    fn prop_append_then_strip_recovers_operand(a in "[a-z]{0,6}", b in "[a-z]{0,6}") {
        let env = Environment::new();
        let mut solver = Solver::new(&env, None);
        let out = Type::type_string(&format!("{}{}", a, b));
        let unknown = solver.subst.fresh_unknown();
        let wanted = Constraint::new(
            prim::symbol_append(),
            vec![Type::type_string(&a), unknown.clone(), out],
        );
        solver
            .entails(strict(), wanted, &InstanceContext::new(), vec![])
            .expect("append with known prefix and result must solve");
        prop_assert_eq!(solver.subst.zonk(&unknown), Type::type_string(&b));
    }

    #[test]
    fn prop_cons_round_trip(s in "[a-z]{1,8}") {
        let env = Environment::new();
        let mut solver = Solver::new(&env, None);
        let head = solver.subst.fresh_unknown();
        let tail = solver.subst.fresh_unknown();
        let decompose = Constraint::new(
            prim::symbol_cons(),
            vec![head.clone(), tail.clone(), Type::type_string(&s)],
        );
        solver
            .entails(strict(), decompose, &InstanceContext::new(), vec![])
            .expect("non-empty literal must decompose");
        let head_ty = solver.subst.zonk(&head);
        let tail_ty = solver.subst.zonk(&tail);

        let recomposed = solver.subst.fresh_unknown();
        let compose = Constraint::new(
            prim::symbol_cons(),
            vec![head_ty, tail_ty, recomposed.clone()],
        );
        solver
            .entails(strict(), compose, &InstanceContext::new(), vec![])
            .expect("single-character head must compose");
        prop_assert_eq!(solver.subst.zonk(&recomposed), Type::type_string(&s));
    }

    #[test]
    fn prop_row_union_left_bias(
        left in arb_row_entries(),
        right in arb_row_entries(),
    ) {
        let env = Environment::new();
        let roles = RoleTable::build(&env);
        let args = [
            closed_row(&left),
            closed_row(&right),
            Type::Unknown(0),
        ];
        let dicts = builtins::for_class(
            &env,
            &roles,
            &InstanceContext::new(),
            &prim::row_union(),
            &args,
        )
        .expect("closed rows always union");
        let (union_items, union_tail) = row_to_list(&dicts[0].instance_types[2]);
        prop_assert_eq!(union_tail, Type::REmpty);

        // Any label the left row mentions keeps the left row's first type.
        for (label, _) in &left {
            let sym = interner::intern(label);
            let first_left = left.iter().find(|(l, _)| l == label).map(|(_, t)| t);
            let first_union = union_items.iter().find(|item| item.label == sym).map(|item| &item.ty);
            prop_assert_eq!(first_union, first_left);
        }
        // Every right-row label appears in the union.
        for (label, _) in &right {
            let sym = interner::intern(label);
            prop_assert!(union_items.iter().any(|item| item.label == sym));
        }
    }

    #[test]
    fn prop_coercible_confluence(a in arb_coercible_type(), b in arb_coercible_type()) {
        let env = coercible_env();
        let roles = RoleTable::build(&env);
        let ctx = InstanceContext::new();
        let forward = builtins::for_class(
            &env, &roles, &ctx, &prim::coercible(), &[a.clone(), b.clone()],
        );
        let backward = builtins::for_class(
            &env, &roles, &ctx, &prim::coercible(), &[b, a],
        );
        match (forward, backward) {
            (None, None) => {}
            (Some(f), Some(g)) => {
                let f_goals = f[0].dependencies.as_deref().unwrap_or_default();
                let g_goals = g[0].dependencies.as_deref().unwrap_or_default();
                prop_assert_eq!(subgoal_keys(f_goals), subgoal_keys(g_goals));
            }
            (f, g) => prop_assert!(false, "asymmetric Coercible outcome: {:?} vs {:?}", f, g),
        }
    }
}
