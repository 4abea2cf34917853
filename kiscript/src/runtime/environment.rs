use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::values::Value;

/// A scope: name bindings plus an optional enclosing scope.
///
/// Scopes are shared (`Rc`) because closures keep their defining scope
/// alive. Call [`Environment::clear`] when a run ends to break the cycles a
/// function stored in its own scope creates.
#[derive(Clone, Default)]
pub struct Environment {
    frame: Rc<RefCell<Frame>>,
}

#[derive(Default)]
struct Frame {
    bindings: HashMap<String, Value>,
    parent: Option<Environment>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: &Environment) -> Self {
        Environment {
            frame: Rc::new(RefCell::new(Frame {
                bindings: HashMap::new(),
                parent: Some(parent.clone()),
            })),
        }
    }

    pub fn define(&self, name: &str, value: Value) {
        self.frame
            .borrow_mut()
            .bindings
            .insert(name.to_string(), value);
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        let frame = self.frame.borrow();
        match frame.bindings.get(name) {
            Some(value) => Some(value.clone()),
            None => frame.parent.as_ref().and_then(|p| p.lookup(name)),
        }
    }

    pub fn has_local(&self, name: &str) -> bool {
        self.frame.borrow().bindings.contains_key(name)
    }

    /// Names visible from this scope, sorted.
    pub fn names(&self) -> Vec<String> {
        let frame = self.frame.borrow();
        let mut names: Vec<String> = frame.bindings.keys().cloned().collect();
        if let Some(parent) = &frame.parent {
            names.extend(parent.names());
        }
        names.sort();
        names.dedup();
        names
    }

    /// Drop every binding and the parent link.
    pub fn clear(&self) {
        // Take the contents out first so values dropped here can't observe
        // this frame mid-borrow.
        let (bindings, parent) = {
            let mut frame = self.frame.borrow_mut();
            (std::mem::take(&mut frame.bindings), frame.parent.take())
        };
        drop(bindings);
        drop(parent);
    }

    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.frame, &other.frame)
    }
}
