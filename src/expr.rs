use std::fmt;

use crate::dictionary::InstanceContext;
use crate::interner::{self, Symbol};
use crate::types::{prim, Constraint, Qualified};

/// Elaborated expressions: the node set is exactly what dictionary terms
/// need, plus the placeholder the solver rewrites.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Reference to a value by (possibly qualified) name
    Var(Qualified),
    /// Application
    App(Box<Expr>, Box<Expr>),
    /// Single-argument lambda
    Abs(Symbol, Box<Expr>),
    /// Record field access
    Accessor(Symbol, Box<Expr>),
    /// Record literal
    ObjectLiteral(Vec<(Symbol, Expr)>),
    /// String literal
    StringLiteral(Symbol),
    /// Placeholder for an unsolved constraint: the constraint, the context
    /// it must be solved in, and the stack of enclosing constraints
    TypeClassDictionary(Constraint, InstanceContext, Vec<Constraint>),
}

impl Expr {
    pub fn app(f: Expr, arg: Expr) -> Expr {
        Expr::App(Box::new(f), Box::new(arg))
    }

    /// The canonical placeholder value for dictionaries with no runtime
    /// content.
    pub fn undefined() -> Expr {
        Expr::Var(prim::undefined())
    }

    /// `\_ -> body` with the reserved wildcard binder.
    pub fn unused_abs(body: Expr) -> Expr {
        Expr::Abs(interner::intern("$__unused"), Box::new(body))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var(name) => write!(f, "{}", name),
            Expr::App(func, arg) => write!(f, "({} {})", func, arg),
            Expr::Abs(binder, body) => write!(f, "(\\{} -> {})", interner::show(*binder), body),
            Expr::Accessor(field, inner) => write!(f, "{}.{}", inner, interner::show(*field)),
            Expr::ObjectLiteral(fields) => {
                write!(f, "{{ ")?;
                for (i, (label, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", interner::show(*label), value)?;
                }
                write!(f, " }}")
            }
            Expr::StringLiteral(s) => write!(f, "\"{}\"", interner::show(*s)),
            Expr::TypeClassDictionary(constraint, ..) => write!(f, "{{dict {}}}", constraint),
        }
    }
}

/// Rewrite an expression top-down: `f` transforms each node before its
/// children are visited. A node `f` produces is descended into, but `f`
/// is not re-applied to the node itself.
pub fn rewrite_top_down<E, F>(expr: Expr, f: &mut F) -> Result<Expr, E>
where
    F: FnMut(Expr) -> Result<Expr, E>,
{
    let expr = f(expr)?;
    Ok(match expr {
        Expr::App(func, arg) => Expr::App(
            Box::new(rewrite_top_down(*func, f)?),
            Box::new(rewrite_top_down(*arg, f)?),
        ),
        Expr::Abs(binder, body) => Expr::Abs(binder, Box::new(rewrite_top_down(*body, f)?)),
        Expr::Accessor(field, inner) => {
            Expr::Accessor(field, Box::new(rewrite_top_down(*inner, f)?))
        }
        Expr::ObjectLiteral(fields) => Expr::ObjectLiteral(
            fields
                .into_iter()
                .map(|(label, value)| Ok((label, rewrite_top_down(value, f)?)))
                .collect::<Result<Vec<_>, E>>()?,
        ),
        leaf @ (Expr::Var(_) | Expr::StringLiteral(_) | Expr::TypeClassDictionary(..)) => leaf,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{prim, Constraint, Type};

    #[test]
    fn test_rewrite_replaces_placeholders() {
        let placeholder = Expr::TypeClassDictionary(
            Constraint::new(prim::partial(), vec![]),
            InstanceContext::new(),
            vec![],
        );
        let expr = Expr::app(Expr::Var(Qualified::local("f")), placeholder);
        let rewritten = rewrite_top_down(expr, &mut |e| -> Result<Expr, ()> {
            match e {
                Expr::TypeClassDictionary(..) => Ok(Expr::undefined()),
                other => Ok(other),
            }
        })
        .unwrap();
        assert_eq!(
            rewritten,
            Expr::app(Expr::Var(Qualified::local("f")), Expr::undefined())
        );
    }

    #[test]
    fn test_rewrite_does_not_loop_on_returned_placeholder() {
        let placeholder = Expr::TypeClassDictionary(
            Constraint::new(prim::warn(), vec![Type::type_string("msg")]),
            InstanceContext::new(),
            vec![],
        );
        let mut calls = 0;
        let rewritten = rewrite_top_down(placeholder.clone(), &mut |e| -> Result<Expr, ()> {
            calls += 1;
            Ok(e)
        })
        .unwrap();
        assert_eq!(rewritten, placeholder);
        assert_eq!(calls, 1);
    }
}
