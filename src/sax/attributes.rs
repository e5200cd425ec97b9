use std::{collections::HashMap, ops::Index, sync::Arc};

use crate::error::XMLError;

#[derive(Debug, Clone)]
pub struct Attribute {
    pub uri: Option<Arc<str>>,
    pub local_name: Option<Arc<str>>,
    pub qname: Arc<str>,
    pub value: Box<str>,
    // 0: is declared in DTD
    // 1: is specified explicitly (in other words, `value` is not the default value provided by DTD)
    // 2: is namespace declaration attribute
    pub(crate) flag: u8,
}

impl Attribute {
    pub(crate) fn new(qname: Arc<str>, value: impl Into<Box<str>>) -> Self {
        Self {
            uri: None,
            local_name: None,
            qname,
            value: value.into(),
            flag: 0,
        }
    }

    pub(crate) fn set_declared(&mut self) {
        self.flag |= 1 << 0;
    }
    pub(crate) fn set_specified(&mut self) {
        self.flag |= 1 << 1;
    }
    pub(crate) fn set_nsdecl(&mut self) {
        self.flag |= 1 << 2;
    }

    /// Check if this attribute is declared in DTD.
    pub fn is_declared(&self) -> bool {
        self.flag & (1 << 0) != 0
    }
    /// Check if this attribute is specified explicitly.
    ///
    /// `false` means that this attribute was injected from a default declaration.
    pub fn is_specified(&self) -> bool {
        self.flag & (1 << 1) != 0
    }
    /// Check if this attribute is a namespace declaration attribute.
    pub fn is_nsdecl(&self) -> bool {
        self.flag & (1 << 2) != 0
    }

    /// The prefix of the QName, if the attribute has been resolved as a prefixed name.
    pub fn prefix(&self) -> Option<&str> {
        let local_name = self.local_name.as_deref()?;
        let len = self.qname.len().checked_sub(local_name.len() + 1)?;
        Some(&self.qname[..len])
    }
}

/// A list of attributes.
///
/// This list may contain namespace declarations.  
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    attributes: Vec<Attribute>,
    index_by_qname: HashMap<Arc<str>, usize>,
    // key      : local_name
    // value    : uri_map
    index_by_expanded_name: HashMap<Arc<str>, HashMap<Arc<str>, usize>>,
}

impl Attributes {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Get the index of an attribute whose QName is `qname`.
    pub fn get_index_by_qname(&self, qname: &str) -> Option<usize> {
        self.index_by_qname.get(qname).copied()
    }

    /// Get the index of an attribute whose extended name is `{namespace_name}local_name`.
    pub fn get_index_by_expanded_name(
        &self,
        namespace_name: Option<&str>,
        local_name: &str,
    ) -> Option<usize> {
        self.index_by_expanded_name
            .get(local_name)?
            .get(namespace_name.unwrap_or(""))
            .copied()
    }

    /// The number of attributes contained in this list.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Check if this list has no attributes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if this list has an attribute whose QName is `qname`.
    pub fn contains_qname(&self, qname: &str) -> bool {
        self.get_index_by_qname(qname).is_some()
    }

    /// Check if this list has an attribute whose extended name is `{namespace_name}local_name`.
    pub fn contains_expanded_name(&self, namespace_name: Option<&str>, local_name: &str) -> bool {
        self.get_index_by_expanded_name(namespace_name, local_name)
            .is_some()
    }

    /// Get the local name of `index`-th attribute in this list.
    pub fn get_local_name(&self, index: usize) -> Option<&str> {
        self.attributes.get(index)?.local_name.as_deref()
    }

    /// Get the QName of `index`-th attribute in this list.
    pub fn get_qname(&self, index: usize) -> Option<&str> {
        Some(self.attributes.get(index)?.qname.as_ref())
    }

    /// Get the namespace name of `index`-th attribute in this list.
    pub fn get_namespace_uri(&self, index: usize) -> Option<&str> {
        self.attributes.get(index)?.uri.as_deref()
    }

    /// Get the value of `index`-th attribute in this list.
    pub fn get_value(&self, index: usize) -> Option<&str> {
        Some(self.attributes.get(index)?.value.as_ref())
    }

    /// Get the value of an attribute whose QName is `qname`.
    pub fn get_value_by_qname(&self, qname: &str) -> Option<&str> {
        let index = self.get_index_by_qname(qname)?;
        self.get_value(index)
    }

    /// Get the value of an attribute whose extended name is `{namespace_name}local_name`.
    pub fn get_value_by_expanded_name(
        &self,
        namespace_name: Option<&str>,
        local_name: &str,
    ) -> Option<&str> {
        let index = self.get_index_by_expanded_name(namespace_name, local_name)?;
        self.get_value(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.attributes.iter()
    }

    /// Append an attribute whose namespace has not been resolved yet.
    ///
    /// If the list already has an attribute with the same QName, `attribute` is returned
    /// back with [`XMLError::ParserDuplicateAttributes`].
    pub(crate) fn push(&mut self, attribute: Attribute) -> Result<usize, (Attribute, XMLError)> {
        use std::collections::hash_map::Entry::*;

        let index = self.attributes.len();
        match self.index_by_qname.entry(attribute.qname.clone()) {
            Vacant(entry) => {
                entry.insert(index);
            }
            Occupied(_) => return Err((attribute, XMLError::ParserDuplicateAttributes)),
        }
        self.attributes.push(attribute);
        Ok(index)
    }

    /// Set the expanded name of `index`-th attribute.
    ///
    /// If another attribute has already had the same expanded name,
    /// [`XMLError::ParserDuplicateAttributes`] is returned, but the name is still set.
    pub(crate) fn set_expanded_name(
        &mut self,
        index: usize,
        namespace_name: Option<Arc<str>>,
        local_name: Arc<str>,
    ) -> Result<(), XMLError> {
        use std::collections::hash_map::Entry::*;

        let att = &mut self.attributes[index];
        att.uri = namespace_name.clone();
        att.local_name = Some(local_name.clone());
        match self
            .index_by_expanded_name
            .entry(local_name)
            .or_default()
            .entry(namespace_name.unwrap_or_default())
        {
            Vacant(entry) => {
                entry.insert(index);
                Ok(())
            }
            Occupied(_) => Err(XMLError::ParserDuplicateAttributes),
        }
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Attribute> {
        self.attributes.get_mut(index)
    }
}

impl Index<usize> for Attributes {
    type Output = Attribute;

    fn index(&self, index: usize) -> &Self::Output {
        &self.attributes[index]
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type IntoIter = std::slice::Iter<'a, Attribute>;
    type Item = &'a Attribute;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_detection() {
        let mut atts = Attributes::new();
        let a = atts.push(Attribute::new("p:a".into(), "1")).unwrap();
        let b = atts.push(Attribute::new("q:a".into(), "2")).unwrap();
        assert!(atts.push(Attribute::new("p:a".into(), "3")).is_err());

        let uri: Arc<str> = "urn:x".into();
        assert!(atts.set_expanded_name(a, Some(uri.clone()), "a".into()).is_ok());
        // `p` and `q` are bound to the same namespace
        assert!(atts.set_expanded_name(b, Some(uri), "a".into()).is_err());
        assert_eq!(atts[a].prefix(), Some("p"));
        assert_eq!(atts.get_value_by_expanded_name(Some("urn:x"), "a"), Some("1"));
    }
}
