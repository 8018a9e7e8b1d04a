//! Type class entailment solver for a PureScript-style type checker.
//!
//! Given a wanted constraint `C t1 .. tn` and the dictionaries currently in
//! scope, the solver decides whether the constraint holds and synthesises
//! the dictionary term that replaces its placeholder in the elaborated
//! program. Resolution proceeds in three stages:
//! 1. Candidate gathering over the instance context and the built-in
//!    (compiler-solved) classes: `Coercible`, the `Symbol` family and the
//!    row operators
//! 2. Head matching modulated by functional dependencies
//! 3. Instance chains, overlap detection and recursive subgoal solving
//!    under a shared substitution

pub mod interner;
pub mod span;
pub mod types;
pub mod error;
pub mod environment;
pub mod substitution;
pub mod expr;
pub mod roles;
pub mod dictionary;
pub mod matching;
pub mod builtins;
pub mod entailment;

#[cfg(test)]
mod prop_tests;

// Re-export main types
pub use entailment::{Obligation, Solver, SolverOptions};
pub use environment::Environment;
pub use error::{SolverError, SolverWarning};
pub use expr::Expr;
pub use types::{Constraint, Qualified, Type};
