use std::collections::HashMap;

use crate::environment::{Environment, TypeData};
use crate::interner::{self, Symbol};
use crate::types::{prim, unapply, Qualified, Type};

/// Role of a data type parameter for `Coercible` reasoning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The parameter's representation affects the representation of the
    /// containing type
    Representational,
    /// The parameter never appears in a constructor field
    Phantom,
}

/// Inferred roles for every data type in an environment.
///
/// Computed as a fixed point over the whole type graph: every parameter
/// starts Phantom and is promoted to Representational when it occurs in a
/// constructor field outside phantom positions. Promotion is one-way, so
/// mutually recursive types converge.
#[derive(Debug, Default)]
pub struct RoleTable {
    roles: HashMap<Qualified, Vec<Role>>,
}

impl RoleTable {
    pub fn build(env: &Environment) -> RoleTable {
        let mut table = RoleTable {
            roles: HashMap::new(),
        };
        for (name, data) in &env.types {
            table
                .roles
                .insert(*name, vec![Role::Phantom; data.params.len()]);
        }
        loop {
            let mut changed = false;
            let names: Vec<Qualified> = env.types.keys().copied().collect();
            for name in names {
                let computed = table.compute(&env.types[&name]);
                let entry = table.roles.get_mut(&name).expect("role entry was seeded");
                if *entry != computed {
                    *entry = computed;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        table
    }

    /// Roles of a named type's parameters by position. Primitive entries
    /// come first; unknown types yield an empty list, which downstream
    /// lookups default to Representational per argument.
    pub fn param_roles(&self, name: &Qualified) -> Vec<Role> {
        if let Some(roles) = primitive_roles(name) {
            return roles;
        }
        self.roles.get(name).cloned().unwrap_or_default()
    }

    /// Roles of a named type, one `(parameter, role)` entry per declared
    /// parameter in declaration order.
    pub fn roles_of(&self, env: &Environment, name: &Qualified) -> Vec<(Symbol, Role)> {
        if let Some(roles) = primitive_roles(name) {
            return PRIM_PARAM_NAMES
                .iter()
                .map(|p| interner::intern(p))
                .zip(roles)
                .collect();
        }
        match env.types.get(name) {
            Some(data) => data
                .params
                .iter()
                .copied()
                .zip(self.param_roles(name))
                .collect(),
            None => Vec::new(),
        }
    }

    fn compute(&self, data: &TypeData) -> Vec<Role> {
        let mut seen: HashMap<Symbol, Role> = HashMap::new();
        for ctor in &data.constructors {
            for field in &ctor.fields {
                self.walk(field, &mut seen);
            }
        }
        data.params
            .iter()
            .map(|p| seen.get(p).copied().unwrap_or(Role::Phantom))
            .collect()
    }

    /// Mark every variable occurring representationally in a field type.
    /// Arguments under a phantom position of a known constructor are
    /// skipped; quantifiers are transparent because only the declared
    /// parameters survive the final projection.
    fn walk(&self, ty: &Type, out: &mut HashMap<Symbol, Role>) {
        match ty {
            Type::Var(v) => {
                out.insert(*v, Role::Representational);
            }
            Type::ForAll { body, .. } => self.walk(body, out),
            Type::Kinded(inner, _) => self.walk(inner, out),
            Type::App(..) => {
                let (head, args) = unapply(ty);
                match head {
                    Type::Con(con) => {
                        let roles = self.param_roles(con);
                        for (i, arg) in args.iter().enumerate() {
                            match roles.get(i).copied().unwrap_or(Role::Representational) {
                                Role::Representational => self.walk(arg, out),
                                Role::Phantom => {}
                            }
                        }
                    }
                    _ => {
                        self.walk(head, out);
                        for arg in args {
                            self.walk(arg, out);
                        }
                    }
                }
            }
            Type::RCons(_, head, tail) => {
                self.walk(head, out);
                self.walk(tail, out);
            }
            Type::Unknown(_) | Type::Skolem(..) | Type::Con(_) | Type::TypeString(_)
            | Type::REmpty => {}
        }
    }
}

const PRIM_PARAM_NAMES: [&str; 2] = ["a", "b"];

fn primitive_roles(name: &Qualified) -> Option<Vec<Role>> {
    if *name == prim::function() {
        Some(vec![Role::Representational, Role::Representational])
    } else if *name == prim::array() || *name == prim::record() {
        Some(vec![Role::Representational])
    } else {
        None
    }
}

/// Infer the roles of a data type's parameters.
pub fn infer_roles(env: &Environment, name: &Qualified) -> Vec<(Symbol, Role)> {
    RoleTable::build(env).roles_of(env, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::DataConstructor;

    fn show_roles(roles: &[(Symbol, Role)]) -> Vec<(String, Role)> {
        roles
            .iter()
            .map(|(name, role)| (interner::show(*name), *role))
            .collect()
    }

    #[test]
    fn test_phantom_and_representational() {
        let mut env = Environment::new();
        // data Tag p a = Tag a
        env.add_data_type(
            Qualified::new("Main", "Tag"),
            &["p", "a"],
            vec![DataConstructor::new("Tag", vec![Type::var("a")])],
        );
        let roles = infer_roles(&env, &Qualified::new("Main", "Tag"));
        assert_eq!(
            show_roles(&roles),
            vec![
                ("p".to_string(), Role::Phantom),
                ("a".to_string(), Role::Representational),
            ]
        );
    }

    #[test]
    fn test_recursive_type_converges() {
        let mut env = Environment::new();
        // data List a = Nil | Cons a (List a)
        let list = Qualified::new("Main", "List");
        env.add_data_type(
            list,
            &["a"],
            vec![
                DataConstructor::new("Nil", vec![]),
                DataConstructor::new(
                    "Cons",
                    vec![
                        Type::var("a"),
                        Type::app(Type::Con(list), Type::var("a")),
                    ],
                ),
            ],
        );
        let roles = infer_roles(&env, &list);
        assert_eq!(roles[0].1, Role::Representational);
    }

    #[test]
    fn test_mutually_recursive_phantom() {
        let mut env = Environment::new();
        // data A t = MkA (B t); data B t = MkB (A t)
        // t never hits a field directly, so it stays phantom on both sides.
        let a = Qualified::new("Main", "A");
        let b = Qualified::new("Main", "B");
        env.add_data_type(
            a,
            &["t"],
            vec![DataConstructor::new(
                "MkA",
                vec![Type::app(Type::Con(b), Type::var("t"))],
            )],
        );
        env.add_data_type(
            b,
            &["t"],
            vec![DataConstructor::new(
                "MkB",
                vec![Type::app(Type::Con(a), Type::var("t"))],
            )],
        );
        assert_eq!(infer_roles(&env, &a)[0].1, Role::Phantom);
        assert_eq!(infer_roles(&env, &b)[0].1, Role::Phantom);
    }

    #[test]
    fn test_parameter_under_array_is_representational() {
        let mut env = Environment::new();
        env.add_data_type(
            Qualified::new("Main", "Box"),
            &["a"],
            vec![DataConstructor::new(
                "Box",
                vec![Type::array(Type::var("a"))],
            )],
        );
        let roles = infer_roles(&env, &Qualified::new("Main", "Box"));
        assert_eq!(roles[0].1, Role::Representational);
    }

    #[test]
    fn test_quantifier_is_transparent() {
        let mut env = Environment::new();
        // data W a = W (forall r. a)
        env.add_data_type(
            Qualified::new("Main", "W"),
            &["a"],
            vec![DataConstructor::new(
                "W",
                vec![Type::forall("r", Type::var("a"))],
            )],
        );
        let roles = infer_roles(&env, &Qualified::new("Main", "W"));
        assert_eq!(roles[0].1, Role::Representational);
    }
}
