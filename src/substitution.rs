use crate::error::SolverError;
use crate::types::{align_rows, row_from_list, RowAlignment, Type};

/// The shared substitution: a dense table from unknown id to its solution,
/// together with the fresh unknown supply. Every solver step reads types
/// through `zonk`, so no step ever observes a stale binding.
#[derive(Debug, Default)]
pub struct Substitution {
    entries: Vec<Option<Type>>,
}

impl Substitution {
    pub fn new() -> Self {
        Substitution {
            entries: Vec::new(),
        }
    }

    /// Allocate a fresh unification unknown.
    pub fn fresh_unknown(&mut self) -> Type {
        let id = self.entries.len() as u32;
        self.entries.push(None);
        Type::Unknown(id)
    }

    /// Grow the table to cover an unknown created outside this supply.
    fn ensure(&mut self, id: u32) {
        if self.entries.len() <= id as usize {
            self.entries.resize(id as usize + 1, None);
        }
    }

    /// The solved type for an unknown, if any.
    pub fn probe(&self, id: u32) -> Option<&Type> {
        self.entries.get(id as usize).and_then(|e| e.as_ref())
    }

    /// Walk a type, replacing solved unknowns with their solutions.
    pub fn zonk(&self, ty: &Type) -> Type {
        match ty {
            Type::Unknown(u) => match self.probe(*u) {
                Some(solved) => self.zonk(&solved.clone()),
                None => ty.clone(),
            },
            Type::App(f, a) => Type::app(self.zonk(f), self.zonk(a)),
            Type::ForAll { var, body, skolem } => Type::ForAll {
                var: *var,
                body: Box::new(self.zonk(body)),
                skolem: *skolem,
            },
            Type::Kinded(inner, kind) => {
                Type::Kinded(Box::new(self.zonk(inner)), Box::new(self.zonk(kind)))
            }
            Type::RCons(label, head, tail) => Type::RCons(
                *label,
                Box::new(self.zonk(head)),
                Box::new(self.zonk(tail)),
            ),
            Type::Var(_) | Type::Skolem(..) | Type::Con(_) | Type::TypeString(_) | Type::REmpty => {
                ty.clone()
            }
        }
    }

    /// Check if an unknown occurs in a type (prevents infinite types).
    fn occurs(&self, id: u32, ty: &Type) -> bool {
        match ty {
            Type::Unknown(u) => {
                if *u == id {
                    return true;
                }
                match self.probe(*u) {
                    Some(solved) => self.occurs(id, &solved.clone()),
                    None => false,
                }
            }
            Type::App(f, a) => self.occurs(id, f) || self.occurs(id, a),
            Type::ForAll { body, .. } => self.occurs(id, body),
            Type::Kinded(inner, _) => self.occurs(id, inner),
            Type::RCons(_, head, tail) => self.occurs(id, head) || self.occurs(id, tail),
            Type::Var(_) | Type::Skolem(..) | Type::Con(_) | Type::TypeString(_) | Type::REmpty => {
                false
            }
        }
    }

    fn solve(&mut self, id: u32, ty: Type) -> Result<(), SolverError> {
        if self.occurs(id, &ty) {
            return Err(SolverError::InfiniteType { unknown: id, ty });
        }
        self.ensure(id);
        self.entries[id as usize] = Some(ty);
        Ok(())
    }

    /// Unify two types under the current substitution.
    pub fn unify(&mut self, t1: &Type, t2: &Type) -> Result<(), SolverError> {
        let t1 = self.zonk(t1);
        let t2 = self.zonk(t2);

        match (&t1, &t2) {
            (Type::Kinded(inner, _), _) => return self.unify(&inner.clone(), &t2),
            (_, Type::Kinded(inner, _)) => return self.unify(&t1, &inner.clone()),
            _ => {}
        }

        match (&t1, &t2) {
            (Type::Unknown(a), Type::Unknown(b)) if a == b => Ok(()),
            (Type::Unknown(a), other) | (other, Type::Unknown(a)) => {
                self.solve(*a, (*other).clone())
            }
            (Type::Var(a), Type::Var(b)) if a == b => Ok(()),
            (Type::Skolem(_, a), Type::Skolem(_, b)) if a == b => Ok(()),
            (Type::Con(a), Type::Con(b)) if a == b => Ok(()),
            (Type::TypeString(a), Type::TypeString(b)) if a == b => Ok(()),
            (Type::App(f1, a1), Type::App(f2, a2)) => {
                self.unify(&f1.clone(), &f2.clone())?;
                self.unify(&a1.clone(), &a2.clone())
            }
            (Type::REmpty, Type::REmpty) => Ok(()),
            (Type::RCons(..), _) | (_, Type::RCons(..)) => self.unify_rows(&t1, &t2),
            _ => Err(SolverError::UnificationError {
                expected: t1.clone(),
                found: t2.clone(),
            }),
        }
    }

    /// Unify two rows by label alignment: common labels unify pointwise,
    /// leftover labels flow into the other side's tail.
    fn unify_rows(&mut self, r1: &Type, r2: &Type) -> Result<(), SolverError> {
        let aligned = align_rows(r1, r2);
        for (left, right) in &aligned.common {
            self.unify(&left.ty, &right.ty)?;
        }
        self.unify_tails(aligned)
    }

    fn unify_tails(&mut self, aligned: RowAlignment) -> Result<(), SolverError> {
        let mismatch = |aligned: &RowAlignment| SolverError::UnificationError {
            expected: row_from_list(&aligned.left_rest, aligned.left_tail.clone()),
            found: row_from_list(&aligned.right_rest, aligned.right_tail.clone()),
        };
        match (aligned.left_rest.is_empty(), aligned.right_rest.is_empty()) {
            (true, true) => self.unify(&aligned.left_tail, &aligned.right_tail),
            (true, false) => match aligned.left_tail {
                Type::Unknown(u) => {
                    self.solve(u, row_from_list(&aligned.right_rest, aligned.right_tail))
                }
                _ => Err(mismatch(&aligned)),
            },
            (false, true) => match aligned.right_tail {
                Type::Unknown(u) => {
                    self.solve(u, row_from_list(&aligned.left_rest, aligned.left_tail))
                }
                _ => Err(mismatch(&aligned)),
            },
            (false, false) => match (&aligned.left_tail, &aligned.right_tail) {
                // Both rows are open: each tail absorbs the other side's
                // leftovers around a shared fresh tail.
                (Type::Unknown(ul), Type::Unknown(ur)) if ul != ur => {
                    let fresh = self.fresh_unknown();
                    self.solve(*ul, row_from_list(&aligned.right_rest, fresh.clone()))?;
                    self.solve(*ur, row_from_list(&aligned.left_rest, fresh))
                }
                _ => Err(mismatch(&aligned)),
            },
        }
    }
}
