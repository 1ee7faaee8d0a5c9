//! Lexical scopes for locals, constants and type aliases.

use kage_ir::{Constant, Type};

use crate::ast::Pos;

#[derive(Clone, Debug)]
pub(super) struct Variable {
    /// Empty for compiler temporaries.
    pub name: String,
    pub ty: Type,
    pub pos: Pos,
    /// Entry point inputs cannot be written.
    pub read_only: bool,
    pub for_counter: bool,
    pub used: bool,
    /// Parameters and temporaries are exempt from the unused check.
    pub check_unused: bool,
}

impl Variable {
    pub fn param(name: &str, ty: Type, pos: Pos, read_only: bool) -> Self {
        Self {
            name: name.to_string(),
            ty,
            pos,
            read_only,
            for_counter: false,
            used: true,
            check_unused: false,
        }
    }

    pub fn local(name: &str, ty: Type, pos: Pos) -> Self {
        Self {
            name: name.to_string(),
            ty,
            pos,
            read_only: false,
            for_counter: false,
            used: false,
            check_unused: true,
        }
    }

    pub fn temporary(ty: Type) -> Self {
        Self {
            name: String::new(),
            ty,
            pos: Pos::default(),
            read_only: false,
            for_counter: false,
            used: true,
            check_unused: false,
        }
    }
}

/// A named constant. `ty` is [`Type::NONE`] for untyped constants.
#[derive(Clone, Debug)]
pub(super) struct NamedConst {
    pub name: String,
    pub ty: Type,
    pub value: Constant,
}

#[derive(Debug, Default)]
pub(super) struct Scope {
    /// Absolute local index of `vars[0]`.
    pub base: usize,
    pub vars: Vec<Variable>,
    pub consts: Vec<NamedConst>,
    pub types: Vec<(String, Type)>,
    /// Leading entries of `vars` that are function parameters.
    pub param_count: usize,
}

impl Scope {
    pub fn new(base: usize) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }

    /// `true` if `name` is already declared directly in this scope.
    pub fn declares(&self, name: &str) -> bool {
        self.vars.iter().any(|v| v.name == name)
            || self.consts.iter().any(|c| c.name == name)
            || self.types.iter().any(|(n, _)| n == name)
    }

    pub fn find_var(&self, name: &str) -> Option<usize> {
        self.vars.iter().rposition(|v| v.name == name)
    }

    pub fn find_const(&self, name: &str) -> Option<&NamedConst> {
        self.consts.iter().find(|c| c.name == name)
    }

    pub fn find_type(&self, name: &str) -> Option<&Type> {
        self.types.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn end(&self) -> usize {
        self.base + self.vars.len()
    }

    /// Types of the block-local variables, for-loop counters as `NONE`.
    pub fn local_types(&self) -> Vec<Type> {
        self.vars[self.param_count..]
            .iter()
            .map(|v| if v.for_counter { Type::NONE } else { v.ty.clone() })
            .collect()
    }

    /// Declared locals never read nor written, in declaration order.
    pub fn unused(&self) -> impl Iterator<Item = &Variable> {
        self.vars
            .iter()
            .filter(|v| v.check_unused && !v.used && !v.name.is_empty() && v.name != "_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_types_skip_params_and_hide_counters() {
        let mut scope = Scope::new(0);
        scope
            .vars
            .push(Variable::param("p", Type::FLOAT, Pos::default(), false));
        scope.param_count = 1;
        scope.vars.push(Variable::local("a", Type::INT, Pos::default()));
        let mut counter = Variable::local("i", Type::INT, Pos::default());
        counter.for_counter = true;
        scope.vars.push(counter);
        assert_eq!(scope.local_types(), vec![Type::INT, Type::NONE]);
        assert_eq!(scope.end(), 3);
    }

    #[test]
    fn unused_ignores_temporaries() {
        let mut scope = Scope::new(4);
        scope.vars.push(Variable::temporary(Type::FLOAT));
        scope.vars.push(Variable::local("x", Type::FLOAT, Pos::default()));
        let unused: Vec<_> = scope.unused().map(|v| v.name.as_str()).collect();
        assert_eq!(unused, ["x"]);
        assert!(scope.declares("x"));
        assert_eq!(scope.find_var("x"), Some(1));
    }
}
