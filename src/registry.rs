use std::{collections::HashMap, rc::Rc};

use crate::token::Span;

/// The set of defined function names, in definition order.
///
/// Parsing consults it to tell calls from variable reads, so a name is only
/// callable after its definition has started.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    map: HashMap<Rc<str>, Span>,
    vec: Vec<Rc<str>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DuplicateFunction {
    pub first_definition: Span,
}

impl FunctionRegistry {
    pub fn with_capacity(capacity: usize) -> Self {
        FunctionRegistry {
            map: HashMap::with_capacity(capacity),
            vec: Vec::with_capacity(capacity),
        }
    }

    /// Registers `name`, defined at `span`. Each name may be registered once.
    pub fn register(&mut self, name: &str, span: Span) -> Result<(), DuplicateFunction> {
        if let Some(&first_definition) = self.map.get(name) {
            return Err(DuplicateFunction { first_definition });
        }
        let key: Rc<str> = name.into();
        self.vec.push(Rc::clone(&key));
        self.map.insert(key, span);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.vec.iter().map(|name| &**name)
    }

    pub fn len(&self) -> usize {
        self.vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variable {
    pub name: Rc<str>,
    /// Filled in by type resolution.
    pub operated: bool,
}

/// Every name targeted by an assignment anywhere in the program, in order of
/// first assignment. The namespace is flat: function bodies share it with the
/// top level.
#[derive(Debug, Default)]
pub struct VariableRegistry {
    map: HashMap<Rc<str>, usize>,
    vec: Vec<Variable>,
}

impl VariableRegistry {
    pub fn with_capacity(capacity: usize) -> Self {
        VariableRegistry {
            map: HashMap::with_capacity(capacity),
            vec: Vec::with_capacity(capacity),
        }
    }

    /// Registers `name`. Registering an already known name is a no-op.
    pub fn register(&mut self, name: &str) {
        if self.map.contains_key(name) {
            return;
        }
        let key: Rc<str> = name.into();
        self.map.insert(Rc::clone(&key), self.vec.len());
        self.vec.push(Variable {
            name: key,
            operated: false,
        });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vec.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vec.iter().map(|var| &*var.name)
    }

    /// Marks `name` as operated. Returns false if the name is unknown.
    pub fn mark_operated(&mut self, name: &str) -> bool {
        match self.map.get(name) {
            Some(&i) => {
                self.vec[i].operated = true;
                true
            }
            None => false,
        }
    }

    pub fn is_operated(&self, name: &str) -> Option<bool> {
        self.map.get(name).map(|&i| self.vec[i].operated)
    }

    pub fn len(&self) -> usize {
        self.vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }
}
