use std::{collections::HashSet, sync::Arc};

/// Per-reader intern table for names.
///
/// Interned names can be compared with [`Arc::ptr_eq`] before falling back to
/// string comparison.
#[derive(Debug, Default)]
pub struct NameDictionary {
    names: HashSet<Arc<str>>,
}

impl NameDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> Arc<str> {
        if let Some(name) = self.names.get(name) {
            return name.clone();
        }
        let name: Arc<str> = name.into();
        self.names.insert(name.clone());
        name
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }
}

/// Compare two interned names.
pub(crate) fn same_name(left: &Arc<str>, right: &Arc<str>) -> bool {
    Arc::ptr_eq(left, right) || left == right
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interned_names_share_storage() {
        let mut dict = NameDictionary::new();
        let a = dict.intern("element");
        let b = dict.intern(&String::from("element"));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(same_name(&a, &b));
        assert_eq!(dict.len(), 1);
        let c = dict.intern("other");
        assert!(!same_name(&a, &c));
    }
}
