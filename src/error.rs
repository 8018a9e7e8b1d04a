use std::fmt;

use crate::types::{Constraint, Qualified, Type};

/// Errors the entailment solver can produce. Search failures embed the
/// offending constraint; unification failures carry the two types.
#[derive(Debug, Clone, PartialEq)]
pub enum SolverError {
    /// Two types could not be unified
    UnificationError { expected: Type, found: Type },

    /// Occurs check failure (infinite type)
    InfiniteType { unknown: u32, ty: Type },

    /// Constraint references a class missing from the environment
    UnknownClass { class: Qualified },

    /// No instance matched and the constraint is neither deferrable nor
    /// generalisable
    NoInstanceFound { constraint: Constraint },

    /// Multiple non-derived, non-local instances matched with distinct
    /// evidence
    OverlappingInstances {
        class: Qualified,
        args: Vec<Type>,
        instances: Vec<Qualified>,
    },

    /// The subgoal chain exceeded the work limit
    PossiblyInfiniteInstance { constraint: Constraint },

    /// An error raised while solving the given constraint; nesting records
    /// the stack of constraints from the outermost wanted to the failing
    /// subgoal
    SolvingConstraint {
        constraint: Constraint,
        inner: Box<SolverError>,
    },
}

impl SolverError {
    /// Attach the constraint currently being solved.
    pub fn solving(self, constraint: &Constraint) -> SolverError {
        SolverError::SolvingConstraint {
            constraint: constraint.clone(),
            inner: Box::new(self),
        }
    }

    /// The innermost error, unwrapping constraint hints.
    pub fn root(&self) -> &SolverError {
        match self {
            SolverError::SolvingConstraint { inner, .. } => inner.root(),
            other => other,
        }
    }
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverError::UnificationError { expected, found } => {
                write!(f, "could not match type {} with {}", expected, found)
            }
            SolverError::InfiniteType { unknown, ty } => {
                write!(f, "infinite type: ?{} occurs in {}", unknown, ty)
            }
            SolverError::UnknownClass { class } => {
                write!(f, "unknown type class: {}", class)
            }
            SolverError::NoInstanceFound { constraint } => {
                write!(f, "no instance found for {}", constraint)
            }
            SolverError::OverlappingInstances {
                class,
                args,
                instances,
            } => {
                write!(f, "overlapping instances for {}", class)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                if !instances.is_empty() {
                    let names: Vec<String> = instances.iter().map(|q| q.to_string()).collect();
                    write!(f, " ({})", names.join(", "))?;
                }
                Ok(())
            }
            SolverError::PossiblyInfiniteInstance { constraint } => {
                write!(f, "possibly infinite instance for {}", constraint)
            }
            SolverError::SolvingConstraint { constraint, inner } => {
                write!(f, "{} (while solving {})", inner, constraint)
            }
        }
    }
}

impl std::error::Error for SolverError {}

/// Warnings recorded during solving; never fatal.
#[derive(Debug, Clone, PartialEq)]
pub enum SolverWarning {
    /// Commit of a `Warn msg` dictionary surfaced the message type
    UserDefinedWarning { message: Type },
}

impl fmt::Display for SolverWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverWarning::UserDefinedWarning { message } => {
                write!(f, "user-defined warning: {}", message)
            }
        }
    }
}
