use std::collections::HashMap;

use crate::builtins;
use crate::dictionary::{Evidence, InstanceContext, TypeClassDict};
use crate::environment::{Environment, FunctionalDependency};
use crate::error::{SolverError, SolverWarning};
use crate::expr::{rewrite_top_down, Expr};
use crate::interner::{self, Symbol};
use crate::matching::{matches, Matched, Matching};
use crate::roles::RoleTable;
use crate::substitution::Substitution;
use crate::types::{
    collect_type_vars, constructor_modules, replace_type_vars, strip_kinds, Constraint, Qualified,
    Type,
};

/// Subgoal depth at which a constraint is reported as possibly infinite.
const WORK_LIMIT: u32 = 1000;

/// Options for a single entailment run.
#[derive(Debug, Clone, Copy)]
pub struct SolverOptions {
    /// Generalise unsolved constraints instead of failing
    pub should_generalize: bool,
    /// Convert search failures into deferred placeholders
    pub defer_errors: bool,
}

/// A constraint that must be abstracted over at the enclosing binding:
/// the fresh dictionary name, the context at the point of deferral, and
/// the constraint itself.
#[derive(Debug, Clone)]
pub struct Obligation {
    pub ident: Qualified,
    pub context: InstanceContext,
    pub constraint: Constraint,
}

/// Outcome of disambiguating the chain winners for one constraint.
enum EntailsResult {
    Solved(Matching, TypeClassDict),
    Unsolved(Constraint),
    Deferred,
}

/// Mutable entailment state: the shared substitution, the inferred
/// context of deferred constraints, the fresh-name supply, and the run
/// outputs (progress flag, generalisation obligations, warnings).
pub struct Solver<'e> {
    env: &'e Environment,
    roles: RoleTable,
    /// Module the expression under elaboration belongs to
    module: Option<Symbol>,
    pub subst: Substitution,
    inferred: InstanceContext,
    next_ident: u32,
    progress: bool,
    obligations: Vec<Obligation>,
    warnings: Vec<SolverWarning>,
}

impl<'e> Solver<'e> {
    pub fn new(env: &'e Environment, module: Option<Symbol>) -> Self {
        Solver {
            env,
            roles: RoleTable::build(env),
            module,
            subst: Substitution::new(),
            inferred: InstanceContext::new(),
            next_ident: 0,
            progress: false,
            obligations: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Warnings recorded by `WarnInstance` commits.
    pub fn warnings(&self) -> &[SolverWarning] {
        &self.warnings
    }

    /// The context of dictionaries the solver assumed while generalising.
    pub fn inferred_context(&self) -> &InstanceContext {
        &self.inferred
    }

    fn fresh_dict_ident(&mut self, prefix: &str) -> Qualified {
        let n = self.next_ident;
        self.next_ident += 1;
        Qualified {
            module: None,
            name: interner::intern(&format!("{}{}", prefix, n)),
        }
    }

    /// Resolve every dictionary placeholder in an expression: run the
    /// solve-or-defer pass to a fixed point, then a final pass that
    /// generalises or reports whatever is left. Returns the rewritten
    /// expression and the constraints the caller must abstract over.
    pub fn replace_type_class_dictionaries(
        &mut self,
        should_generalize: bool,
        expr: Expr,
    ) -> Result<(Expr, Vec<Obligation>), SolverError> {
        let mut expr = expr;
        loop {
            self.progress = false;
            expr = self.pass(
                SolverOptions {
                    should_generalize,
                    defer_errors: true,
                },
                expr,
            )?;
            if !self.progress {
                break;
            }
        }
        let expr = self.pass(
            SolverOptions {
                should_generalize,
                defer_errors: false,
            },
            expr,
        )?;
        Ok((expr, std::mem::take(&mut self.obligations)))
    }

    fn pass(&mut self, opts: SolverOptions, expr: Expr) -> Result<Expr, SolverError> {
        rewrite_top_down(expr, &mut |node| match node {
            Expr::TypeClassDictionary(constraint, context, hints) => {
                self.entails(opts, constraint, &context, hints)
            }
            other => Ok(other),
        })
    }

    /// Solve a single wanted constraint against the given context,
    /// producing the dictionary term that discharges it.
    pub fn entails(
        &mut self,
        opts: SolverOptions,
        constraint: Constraint,
        context: &InstanceContext,
        hints: Vec<Constraint>,
    ) -> Result<Expr, SolverError> {
        self.solve(opts, 0, &constraint, context, &hints)
    }

    fn solve(
        &mut self,
        opts: SolverOptions,
        work: u32,
        constraint: &Constraint,
        context: &InstanceContext,
        hints: &[Constraint],
    ) -> Result<Expr, SolverError> {
        self.solve_inner(opts, work, constraint, context, hints)
            .map_err(|e| e.solving(constraint))
    }

    fn solve_inner(
        &mut self,
        opts: SolverOptions,
        work: u32,
        constraint: &Constraint,
        context: &InstanceContext,
        hints: &[Constraint],
    ) -> Result<Expr, SolverError> {
        if work > WORK_LIMIT {
            return Err(SolverError::PossiblyInfiniteInstance {
                constraint: constraint.clone(),
            });
        }
        let class_data = self
            .env
            .type_classes
            .get(&constraint.class)
            .ok_or(SolverError::UnknownClass {
                class: constraint.class,
            })?
            .clone();

        // Refresh the wanted types against the latest substitution.
        let tys: Vec<Type> = constraint
            .args
            .iter()
            .map(|t| self.subst.zonk(t))
            .collect();
        let refreshed = Constraint {
            class: constraint.class,
            args: tys.clone(),
            span: constraint.span,
        };

        // Gather candidates: the built-in solver owns its classes, the
        // instance index covers everything else. The inherited context
        // shadows inferred dictionaries, which shadow the environment's.
        let combined = InstanceContext::combine(
            &InstanceContext::combine(context, &self.inferred),
            &self.env.instances,
        );
        let candidates =
            match builtins::for_class(self.env, &self.roles, &combined, &refreshed.class, &tys) {
                Some(dicts) => dicts,
                None => self.find_candidates(&combined, &refreshed.class, &tys),
            };

        let winners = self.run_chains(&class_data.fundeps, candidates, &tys);

        match self.disambiguate(opts, winners, &refreshed)? {
            EntailsResult::Solved(matching, dict) => {
                self.commit_solved(opts, work, matching, dict, &tys, &refreshed, context, hints)
            }
            EntailsResult::Unsolved(unsolved) => self.commit_unsolved(unsolved, context),
            EntailsResult::Deferred => Ok(Expr::TypeClassDictionary(
                refreshed,
                context.clone(),
                hints.to_vec(),
            )),
        }
    }

    /// Every dictionary registered for the class under the local key, the
    /// current module, or a module owning one of the wanted constructors.
    fn find_candidates(
        &self,
        ctx: &InstanceContext,
        class: &Qualified,
        tys: &[Type],
    ) -> Vec<TypeClassDict> {
        let mut modules: Vec<Option<Symbol>> = vec![None, self.module];
        let mut ctor_modules = Vec::new();
        for ty in tys {
            constructor_modules(ty, &mut ctor_modules);
        }
        modules.extend(ctor_modules.into_iter().map(Some));

        let mut seen: Vec<Option<Symbol>> = Vec::new();
        let mut out = Vec::new();
        for module in modules {
            if seen.contains(&module) {
                continue;
            }
            seen.push(module);
            out.extend(ctx.find_dicts(class, module));
        }
        out
    }

    /// Walk each chain in `(chain, index)` order. The first match wins the
    /// chain, apartness advances, and an undecided head blocks the chain:
    /// it can neither commit nor be skipped without a proof of apartness.
    /// Chainless dictionaries stand alone.
    fn run_chains(
        &self,
        fundeps: &[FunctionalDependency],
        candidates: Vec<TypeClassDict>,
        tys: &[Type],
    ) -> Vec<(Matching, TypeClassDict)> {
        let mut sorted = candidates;
        sorted.sort_by_key(|dict| match dict.chain {
            None => (false, String::new(), dict.index),
            Some(chain) => (true, interner::show(chain), dict.index),
        });

        let mut chains: Vec<Vec<TypeClassDict>> = Vec::new();
        for dict in sorted {
            match (&dict.chain, chains.last_mut()) {
                (Some(chain), Some(last))
                    if last.first().and_then(|d| d.chain) == Some(*chain) =>
                {
                    last.push(dict)
                }
                _ => chains.push(vec![dict]),
            }
        }

        let mut winners = Vec::new();
        for chain in chains {
            for dict in chain {
                match matches(fundeps, &dict, tys) {
                    Matched::Match(matching) => {
                        winners.push((matching, dict));
                        break;
                    }
                    Matched::Apart => continue,
                    Matched::Unknown => break,
                }
            }
        }
        winners
    }

    fn disambiguate(
        &self,
        opts: SolverOptions,
        winners: Vec<(Matching, TypeClassDict)>,
        refreshed: &Constraint,
    ) -> Result<EntailsResult, SolverError> {
        match winners.len() {
            0 => {
                if opts.defer_errors {
                    Ok(EntailsResult::Deferred)
                } else if opts.should_generalize
                    && (refreshed.args.is_empty()
                        || refreshed.args.iter().any(can_be_generalized))
                {
                    Ok(EntailsResult::Unsolved(refreshed.clone()))
                } else {
                    Err(SolverError::NoInstanceFound {
                        constraint: refreshed.clone(),
                    })
                }
            }
            1 => {
                let (matching, dict) = winners.into_iter().next().expect("one winner");
                Ok(EntailsResult::Solved(matching, dict))
            }
            _ => {
                let overlap = winners.iter().enumerate().any(|(i, (_, a))| {
                    winners[i + 1..].iter().any(|(_, b)| overlapping(a, b))
                });
                if overlap {
                    let instances = winners
                        .iter()
                        .filter_map(|(_, d)| d.value.named_instance().copied())
                        .collect();
                    return Err(SolverError::OverlappingInstances {
                        class: refreshed.class,
                        args: refreshed.args.clone(),
                        instances,
                    });
                }
                // Shortest superclass path wins; ties resolve to the
                // earliest candidate so gathering order stays observable.
                let index = winners
                    .iter()
                    .enumerate()
                    .min_by_key(|(i, (_, d))| (d.path.len(), *i))
                    .map(|(i, _)| i)
                    .expect("winners is non-empty");
                let (matching, dict) = winners.into_iter().nth(index).expect("index in range");
                Ok(EntailsResult::Solved(matching, dict))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn commit_solved(
        &mut self,
        opts: SolverOptions,
        work: u32,
        matching: Matching,
        dict: TypeClassDict,
        tys: &[Type],
        refreshed: &Constraint,
        context: &InstanceContext,
        hints: &[Constraint],
    ) -> Result<Expr, SolverError> {
        self.progress = true;

        // A variable bound at several positions must name one type.
        for types in matching.values() {
            for pair in types.windows(2) {
                self.subst.unify(&pair[0], &pair[1])?;
            }
        }

        // Commit the head of each binding list and freshen any instance
        // variable matching left unbound, so unification below can
        // determine it.
        let mut binding: HashMap<Symbol, Type> = matching
            .into_iter()
            .filter_map(|(var, types)| types.into_iter().next().map(|ty| (var, ty)))
            .collect();
        for ty in binding.values_mut() {
            *ty = self.subst.zonk(ty);
        }
        self.freshen_instance_head(&dict, &mut binding);

        // Unify the instantiated instance head with the wanted types;
        // this is where functional dependencies propagate.
        for (inst_ty, wanted) in dict.instance_types.iter().zip(tys) {
            let inferred = replace_type_vars(&binding, inst_ty);
            self.subst.unify(&inferred, wanted)?;
        }
        let binding: HashMap<Symbol, Type> = binding
            .into_iter()
            .map(|(var, ty)| (var, self.subst.zonk(&ty)))
            .collect();

        // Solve the instance's subgoals under the committed binding.
        let args = match &dict.dependencies {
            None => None,
            Some(subgoals) => {
                let mut next_hints = hints.to_vec();
                next_hints.push(refreshed.clone());
                let mut solved = Vec::new();
                for subgoal in subgoals {
                    let instantiated = Constraint {
                        class: subgoal.class,
                        args: subgoal
                            .args
                            .iter()
                            .map(|ty| replace_type_vars(&binding, ty))
                            .collect(),
                        span: subgoal.span,
                    };
                    solved.push(self.solve(opts, work + 1, &instantiated, context, &next_hints)?);
                }
                Some(solved)
            }
        };

        let mut term = match &dict.value {
            Evidence::NamedInstance(name) => args
                .unwrap_or_default()
                .into_iter()
                .fold(Expr::Var(*name), Expr::app),
            Evidence::EmptyClassInstance => use_empty_dict(args),
            Evidence::WarnInstance(message) => {
                self.warnings.push(SolverWarning::UserDefinedWarning {
                    message: message.clone(),
                });
                use_empty_dict(args)
            }
            Evidence::IsSymbolInstance(sym) => Expr::ObjectLiteral(vec![(
                interner::intern("reflectSymbol"),
                Expr::unused_abs(Expr::StringLiteral(*sym)),
            )]),
        };

        // A derived dictionary is reached through its superclass
        // accessors, wrapped innermost outward.
        for (class, index) in dict.path.iter().rev() {
            term = Expr::app(
                Expr::Accessor(superclass_field(class, *index), Box::new(term)),
                Expr::undefined(),
            );
        }
        Ok(term)
    }

    fn commit_unsolved(
        &mut self,
        constraint: Constraint,
        context: &InstanceContext,
    ) -> Result<Expr, SolverError> {
        let ident =
            self.fresh_dict_ident(&format!("dict{}", interner::show(constraint.class.name)));
        let dicts = self.new_dictionaries(Vec::new(), ident, &constraint)?;
        let mut fresh = InstanceContext::new();
        for dict in dicts {
            fresh.insert(None, ident, dict);
        }
        self.inferred = InstanceContext::combine(&fresh, &self.inferred);
        self.obligations.push(Obligation {
            ident,
            context: context.clone(),
            constraint,
        });
        Ok(Expr::Var(ident))
    }

    /// Construct the dictionaries a constraint binder brings into scope:
    /// one local assumption for the constraint itself and one derived
    /// dictionary for every transitively implied superclass.
    pub fn new_dictionaries(
        &self,
        path: Vec<(Qualified, usize)>,
        ident: Qualified,
        constraint: &Constraint,
    ) -> Result<Vec<TypeClassDict>, SolverError> {
        let class_data = self
            .env
            .type_classes
            .get(&constraint.class)
            .ok_or(SolverError::UnknownClass {
                class: constraint.class,
            })?;
        let mut dicts = vec![TypeClassDict {
            chain: None,
            index: 0,
            value: Evidence::NamedInstance(ident),
            path: path.clone(),
            class_name: constraint.class,
            instance_types: constraint.args.clone(),
            dependencies: None,
        }];
        let instantiation: HashMap<Symbol, Type> = class_data
            .params
            .iter()
            .copied()
            .zip(constraint.args.iter().cloned())
            .collect();
        for (index, superclass) in class_data.superclasses.iter().enumerate() {
            let sup_constraint = Constraint::new(
                superclass.class,
                superclass
                    .args
                    .iter()
                    .map(|ty| replace_type_vars(&instantiation, ty))
                    .collect(),
            );
            let mut sup_path = vec![(superclass.class, index)];
            sup_path.extend(path.iter().copied());
            dicts.extend(self.new_dictionaries(sup_path, ident, &sup_constraint)?);
        }
        Ok(dicts)
    }

    /// Variables appearing in the instance head or its subgoals but not
    /// pinned by matching become fresh unknowns.
    fn freshen_instance_head(&mut self, dict: &TypeClassDict, binding: &mut HashMap<Symbol, Type>) {
        let mut vars = Vec::new();
        for ty in &dict.instance_types {
            collect_type_vars(ty, &mut vars);
        }
        if let Some(subgoals) = &dict.dependencies {
            for subgoal in subgoals {
                for ty in &subgoal.args {
                    collect_type_vars(ty, &mut vars);
                }
            }
        }
        for var in vars {
            binding
                .entry(var)
                .or_insert_with(|| self.subst.fresh_unknown());
        }
    }
}

/// Only candidates that are neither local assumptions nor derived from a
/// superclass participate in overlap detection.
fn overlapping(a: &TypeClassDict, b: &TypeClassDict) -> bool {
    a.dependencies.is_some()
        && b.dependencies.is_some()
        && a.path.is_empty()
        && b.path.is_empty()
        && a.value != b.value
}

fn can_be_generalized(ty: &Type) -> bool {
    matches!(strip_kinds(ty), Type::Unknown(_))
}

/// A placeholder dictionary for classes without members. The subgoal
/// dictionaries are applied one by one so they are still evaluated.
fn use_empty_dict(args: Option<Vec<Expr>>) -> Expr {
    args.unwrap_or_default()
        .into_iter()
        .fold(Expr::undefined(), |acc, arg| {
            Expr::app(Expr::unused_abs(acc), arg)
        })
}

/// Field name holding the `index`-th superclass dictionary of `class`.
fn superclass_field(class: &Qualified, index: usize) -> Symbol {
    interner::intern(&format!("{}{}", interner::show(class.name), index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_use_empty_dict_keeps_arguments() {
        let args = vec![Expr::Var(Qualified::local("d0")), Expr::Var(Qualified::local("d1"))];
        let term = use_empty_dict(Some(args));
        // ((\_ -> ((\_ -> undefined) d0)) d1)
        match term {
            Expr::App(f, arg) => {
                assert!(matches!(*f, Expr::Abs(..)));
                assert_eq!(*arg, Expr::Var(Qualified::local("d1")));
            }
            other => panic!("expected application, got {:?}", other),
        }
    }

    #[test]
    fn test_overlapping_requires_user_instances() {
        let class = Qualified::new("Main", "C");
        let user1 = TypeClassDict::named(Qualified::local("a"), class, vec![Type::int()], vec![]);
        let user2 = TypeClassDict::named(Qualified::local("b"), class, vec![Type::int()], vec![]);
        let mut local = user1.clone();
        local.dependencies = None;
        let mut derived = user2.clone();
        derived.path = vec![(class, 0)];

        assert!(overlapping(&user1, &user2));
        assert!(!overlapping(&user1, &local));
        assert!(!overlapping(&user1, &derived));
        assert!(!overlapping(&user1, &user1));
    }
}
