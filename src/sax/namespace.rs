use std::{collections::HashMap, sync::Arc};

use crate::XML_XML_NAMESPACE;

/// A scoped stack of namespace bindings.
///
/// The bindings declared on one element occupy a contiguous range at the top of the
/// stack, and they are removed together when the element is closed.  
/// The default namespace is represented by the empty prefix, and an empty namespace name
/// means that the prefix is explicitly undeclared.
#[derive(Debug, Clone)]
pub struct NamespaceStack {
    // (prefix, namespace name, index of the binding shadowed by this one)
    namespaces: Vec<(Arc<str>, Arc<str>, usize)>,
    // prefix -> index of the innermost binding
    prefix_map: HashMap<Arc<str>, usize>,
}

impl NamespaceStack {
    /// Returned by [`NamespaceStack::push`] if the binding was not pushed because
    /// the same binding is already in scope.
    pub const DISCARDED: usize = usize::MAX;

    pub fn new() -> Self {
        let prefix: Arc<str> = "xml".into();
        Self {
            namespaces: vec![(prefix.clone(), XML_XML_NAMESPACE.into(), usize::MAX)],
            prefix_map: HashMap::from([(prefix, 0)]),
        }
    }

    /// Push a new binding and return its index.
    ///
    /// If `remove_redundant` is `true` and the same binding is already in scope,
    /// nothing is pushed and [`NamespaceStack::DISCARDED`] is returned.
    pub fn push(&mut self, prefix: &str, namespace_name: &str, remove_redundant: bool) -> usize {
        let old = self.prefix_map.get(prefix).copied();
        if remove_redundant
            && let Some(old) = old
            && self.namespaces[old].1.as_ref() == namespace_name
        {
            return Self::DISCARDED;
        }

        let index = self.namespaces.len();
        let prefix: Arc<str> = prefix.into();
        self.namespaces.push((
            prefix.clone(),
            namespace_name.into(),
            old.unwrap_or(usize::MAX),
        ));
        self.prefix_map.insert(prefix, index);
        index
    }

    /// Remove the top `n` bindings and return them, innermost first.
    ///
    /// The built-in binding for `xml` is never removed.
    pub fn pop(&mut self, n: usize) -> Vec<(Arc<str>, Arc<str>)> {
        let n = n.min(self.namespaces.len() - 1);
        let mut ret = Vec::with_capacity(n);
        for _ in 0..n {
            let Some((prefix, namespace_name, old)) = self.namespaces.pop() else {
                break;
            };
            if old == usize::MAX {
                self.prefix_map.remove(&prefix);
            } else {
                self.prefix_map.insert(prefix.clone(), old);
            }
            ret.push((prefix, namespace_name));
        }
        ret
    }

    /// Remove bindings until the stack length becomes `len`.
    pub fn truncate(&mut self, len: usize) -> Vec<(Arc<str>, Arc<str>)> {
        self.pop(self.len().saturating_sub(len))
    }

    /// Resolve `prefix` to a namespace name.  
    /// The empty prefix means the default namespace.
    ///
    /// Returns `None` if `prefix` is not bound or is explicitly undeclared.
    pub fn resolve(&self, prefix: &str) -> Option<&Arc<str>> {
        let &index = self.prefix_map.get(prefix)?;
        let namespace_name = &self.namespaces[index].1;
        (!namespace_name.is_empty()).then_some(namespace_name)
    }

    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    /// Iterate the bindings from the outermost to the innermost,
    /// including shadowed ones.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.namespaces
            .iter()
            .map(|(prefix, namespace_name, _)| (prefix.as_ref(), namespace_name.as_ref()))
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

impl Default for NamespaceStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_bindings() {
        let mut stack = NamespaceStack::new();
        assert_eq!(stack.resolve("xml").map(|s| s.as_ref()), Some(XML_XML_NAMESPACE));

        let base = stack.len();
        stack.push("p", "urn:outer", false);
        stack.push("", "urn:default", false);
        let inner = stack.len();
        stack.push("p", "urn:inner", false);
        assert_eq!(stack.resolve("p").map(|s| s.as_ref()), Some("urn:inner"));

        let popped = stack.truncate(inner);
        assert_eq!(popped.len(), 1);
        assert_eq!(stack.resolve("p").map(|s| s.as_ref()), Some("urn:outer"));
        assert_eq!(stack.resolve("").map(|s| s.as_ref()), Some("urn:default"));

        let popped = stack.pop(2);
        assert_eq!(popped[0].0.as_ref(), "");
        assert_eq!(popped[1].0.as_ref(), "p");
        assert_eq!(stack.len(), base);
        assert!(stack.resolve("p").is_none());
        assert!(stack.resolve("").is_none());
    }

    #[test]
    fn undeclared_default_namespace() {
        let mut stack = NamespaceStack::new();
        stack.push("", "urn:x", false);
        stack.push("", "", false);
        assert!(stack.resolve("").is_none());
        stack.pop(1);
        assert_eq!(stack.resolve("").map(|s| s.as_ref()), Some("urn:x"));
    }

    #[test]
    fn redundant_binding_is_discarded() {
        let mut stack = NamespaceStack::new();
        assert_ne!(stack.push("p", "urn:x", true), NamespaceStack::DISCARDED);
        assert_eq!(stack.push("p", "urn:x", true), NamespaceStack::DISCARDED);
        assert_ne!(stack.push("p", "urn:y", true), NamespaceStack::DISCARDED);
        assert_ne!(stack.push("p", "urn:y", false), NamespaceStack::DISCARDED);
        // the built-in binding survives any number of pops
        stack.pop(100);
        assert_eq!(stack.len(), 1);
    }
}
