use std::sync::{Mutex, OnceLock};

use string_interner::{DefaultBackend, DefaultSymbol, StringInterner};

/// An interned name. Every identifier the solver touches (type variables,
/// row labels, class and instance names) is a `Symbol`, so comparisons and
/// map keys are cheap; resolution back to text only happens at display
/// time.
pub type Symbol = DefaultSymbol;

static INTERNER: OnceLock<Mutex<StringInterner<DefaultBackend>>> = OnceLock::new();

fn interner() -> &'static Mutex<StringInterner<DefaultBackend>> {
    INTERNER.get_or_init(|| Mutex::new(StringInterner::new()))
}

/// Intern a string, returning its symbol.
pub fn intern(name: &str) -> Symbol {
    interner()
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .get_or_intern(name)
}

/// Resolve a symbol back to the string it was interned from.
pub fn resolve(sym: Symbol) -> Option<String> {
    interner()
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .resolve(sym)
        .map(str::to_string)
}

/// Resolve a symbol for display. Every symbol in the solver comes from
/// `intern`, so the empty-string fallback is unreachable in practice.
pub fn show(sym: Symbol) -> String {
    resolve(sym).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_stable() {
        let a = intern("reflectSymbol");
        let b = intern("reflectSymbol");
        assert_eq!(a, b);
        assert_eq!(resolve(a).as_deref(), Some("reflectSymbol"));
    }

    #[test]
    fn test_distinct_names_get_distinct_symbols() {
        assert_ne!(intern("foo"), intern("bar"));
        assert_eq!(show(intern("foo")), "foo");
    }
}
