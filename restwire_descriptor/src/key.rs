use core::fmt;

/// Identity of a declared method: overloads differ by parameter types or
/// generic arity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodKey {
    pub interface: String,
    pub name: String,
    pub parameter_types: Vec<String>,
    pub generic_arity: usize,
}

impl MethodKey {
    pub fn new(
        interface: impl Into<String>,
        name: impl Into<String>,
        parameter_types: impl IntoIterator<Item = impl Into<String>>,
        generic_arity: usize,
    ) -> Self {
        Self {
            interface: interface.into(),
            name: name.into(),
            parameter_types: parameter_types.into_iter().map(Into::into).collect(),
            generic_arity,
        }
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.interface, self.name)?;
        if self.generic_arity > 0 {
            write!(f, "<{}>", self.generic_arity)?;
        }
        write!(f, "({})", self.parameter_types.join(", "))
    }
}

/// Cache key of an emitted procedure: one per method and generic
/// instantiation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProcedureKey {
    pub method: MethodKey,
    pub generic_args: Vec<String>,
}

impl ProcedureKey {
    #[inline]
    pub fn new(method: MethodKey) -> Self {
        Self {
            method,
            generic_args: Vec::new(),
        }
    }

    #[inline]
    pub fn with_generic_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.generic_args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Display for ProcedureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.method)?;
        if !self.generic_args.is_empty() {
            write!(f, " with [{}]", self.generic_args.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        let k = MethodKey::new("Users", "get", ["u64", "String"], 0);
        assert_eq!(k.to_string(), "Users::get(u64, String)");
        let p = ProcedureKey::new(MethodKey::new("Users", "find", ["T"], 1))
            .with_generic_args(["my::User"]);
        assert_eq!(p.to_string(), "Users::find<1>(T) with [my::User]");
    }

    #[test]
    fn overloads_are_distinct() {
        let a = MethodKey::new("Users", "get", ["u64"], 0);
        let b = MethodKey::new("Users", "get", ["String"], 0);
        let c = MethodKey::new("Users", "get", ["u64"], 1);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
