// Lexical scoping, deliberately without a parent pointer.
//
// A Scope is a flat name -> binding map. There is no chain to walk: at
// frame entry (a function call or an `if` branch), every binding in
// the calling scope that is not already shadowed by the new scope is
// copied in once. After that the two scopes are independent except
// through whatever shared, interior-mutable values (arrays, function
// closures) happen to be bound in both.
//
// `if` additionally writes back: after its child scope runs, any name
// that existed in the parent before entry gets its (possibly updated)
// value copied back. Names the child introduced for the first time are
// discarded when the child scope is dropped. This is what keeps `if`
// from leaking new bindings into its enclosing scope while still
// letting it mutate ones that already existed there.
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::value::Value;

pub type Scope = Rc<RefCell<HashMap<String, Value>>>;

pub fn new_scope() -> Scope {
    Rc::new(RefCell::new(HashMap::new()))
}

// Copy every binding from `parent` into `child` that `child` doesn't
// already define. Called once at frame entry, never again.
pub fn merge_parent(child: &Scope, parent: &Scope) {
    let parent_bindings = parent.borrow();
    let mut child_bindings = child.borrow_mut();
    for (name, value) in parent_bindings.iter() {
        if !child_bindings.contains_key(name) {
            child_bindings.insert(name.clone(), value.clone());
        }
    }
}

// Snapshot of the names `parent` defines before a child frame merges
// into and possibly mutates a fresh scope derived from it. Used by
// `if`'s write-back so that only pre-existing names get propagated.
pub fn existing_names(parent: &Scope) -> HashSet<String> {
    parent.borrow().keys().cloned().collect()
}

// Propagate back into `parent` any binding in `child` whose name is in
// `existing`. New names the child introduced are left behind.
pub fn write_back(parent: &Scope, child: &Scope, existing: &HashSet<String>) {
    let child_bindings = child.borrow();
    let mut parent_bindings = parent.borrow_mut();
    for (name, value) in child_bindings.iter() {
        if existing.contains(name) {
            parent_bindings.insert(name.clone(), value.clone());
        }
    }
}

pub fn get(scope: &Scope, key: &str) -> Option<Value> {
    scope.borrow().get(key).cloned()
}

pub fn set(scope: &Scope, key: &str, value: Value) {
    scope.borrow_mut().insert(key.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_if_does_not_leak_new_bindings() {
        let parent = new_scope();
        set(&parent, "a", Value::Number(0.0));

        let existing = existing_names(&parent);
        let child = new_scope();
        merge_parent(&child, &parent);
        set(&child, "a", Value::Number(1.0));
        set(&child, "b", Value::Number(5.0));
        write_back(&parent, &child, &existing);

        assert_eq!(get(&parent, "a"), Some(Value::Number(1.0)));
        assert_eq!(get(&parent, "b"), None);
    }
}
