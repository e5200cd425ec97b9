pub mod attributes;
pub mod contentspec;
pub mod dict;
pub mod error;
pub mod handler;
pub mod namespace;
pub mod parser;
pub mod source;

use std::{
    collections::HashMap,
    sync::{
        Arc, LazyLock, PoisonError, RwLock,
        atomic::{AtomicUsize, Ordering},
    },
};

pub use contentspec::{ContentSpec, ElementContent, ElementContentNode, Occurrence};

use crate::error::XMLError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum AttributeType {
    #[default]
    CDATA,
    ID,
    IDREF,
    IDREFS,
    ENTITY,
    ENTITIES,
    NMTOKEN,
    NMTOKENS,
    NOTATION(Vec<Box<str>>),
    Enumeration(Vec<Box<str>>),
}

impl AttributeType {
    /// Check if the value of an attribute with this type is further normalized
    /// after the CDATA normalization.
    pub fn is_tokenized(&self) -> bool {
        !matches!(self, Self::CDATA)
    }
}

impl std::fmt::Display for AttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CDATA => write!(f, "CDATA"),
            Self::ID => write!(f, "ID"),
            Self::IDREF => write!(f, "IDREF"),
            Self::IDREFS => write!(f, "IDREFS"),
            Self::ENTITY => write!(f, "ENTITY"),
            Self::ENTITIES => write!(f, "ENTITIES"),
            Self::NMTOKEN => write!(f, "NMTOKEN"),
            Self::NMTOKENS => write!(f, "NMTOKENS"),
            Self::NOTATION(names) => write!(f, "NOTATION ({})", names.join("|")),
            Self::Enumeration(tokens) => write!(f, "({})", tokens.join("|")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DefaultDecl {
    REQUIRED,
    IMPLIED,
    FIXED(Box<str>),
    None(Box<str>),
}

impl DefaultDecl {
    /// Returns the default value if this declaration provides one.
    pub fn default_value(&self) -> Option<&str> {
        match self {
            Self::FIXED(value) | Self::None(value) => Some(value),
            Self::REQUIRED | Self::IMPLIED => None,
        }
    }
}

impl std::fmt::Display for DefaultDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::REQUIRED => write!(f, "#REQUIRED"),
            Self::IMPLIED => write!(f, "#IMPLIED"),
            Self::FIXED(value) => write!(f, "#FIXED \"{value}\""),
            Self::None(value) => write!(f, "\"{value}\""),
        }
    }
}

/// A declaration of one attribute in an attribute-list declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDecl {
    pub name: Box<str>,
    pub attribute_type: AttributeType,
    pub default_decl: DefaultDecl,
    /// `true` if this is declared in the external subset or an external parameter entity.
    pub is_external_markup: bool,
}

/// Attribute-list declarations, grouped by element type.
///
/// Declarations are kept in document order, so default attributes are always injected
/// in the same order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttlistDeclMap(HashMap<Box<str>, Vec<AttributeDecl>>);

impl AttlistDeclMap {
    /// Returns `true` if newly inserted, and `false` if an element or attribute with
    /// the same name is already registered.
    ///
    /// The first declaration is binding, so the existing one is not overwritten.
    pub fn insert(
        &mut self,
        elem_name: &str,
        attr_name: &str,
        attribute_type: AttributeType,
        default_decl: DefaultDecl,
        is_external_markup: bool,
    ) -> bool {
        let decls = self.0.entry(elem_name.into()).or_default();
        if decls.iter().any(|decl| decl.name.as_ref() == attr_name) {
            return false;
        }
        decls.push(AttributeDecl {
            name: attr_name.into(),
            attribute_type,
            default_decl,
            is_external_markup,
        });
        true
    }

    pub fn get(&self, elem_name: &str, attr_name: &str) -> Option<&AttributeDecl> {
        self.0
            .get(elem_name)?
            .iter()
            .find(|decl| decl.name.as_ref() == attr_name)
    }

    pub fn contains(&self, elem_name: &str, attr_name: &str) -> bool {
        self.get(elem_name, attr_name).is_some()
    }

    /// Iterate all attribute declarations for `elem_name` in document order.
    pub fn attlist(&self, elem_name: &str) -> impl Iterator<Item = &AttributeDecl> {
        self.0.get(elem_name).into_iter().flatten()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementDeclMap(HashMap<Box<str>, ContentSpec>);

impl ElementDeclMap {
    pub fn insert(&mut self, name: impl Into<Box<str>>, contentspec: ContentSpec) -> Result<(), XMLError> {
        use std::collections::hash_map::Entry::*;
        match self.0.entry(name.into()) {
            Occupied(_) => Err(XMLError::ParserDuplicateElementDecl),
            Vacant(entry) => {
                entry.insert(contentspec);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ContentSpec> {
        self.0.get(name)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityDecl {
    InternalGeneralEntity {
        base_uri: Option<Arc<str>>,
        replacement_text: Arc<str>,
    },
    InternalParameterEntity {
        base_uri: Option<Arc<str>>,
        replacement_text: Arc<str>,
    },
    ExternalGeneralParsedEntity {
        base_uri: Option<Arc<str>>,
        system_id: Box<str>,
        public_id: Option<Box<str>>,
    },
    ExternalGeneralUnparsedEntity {
        base_uri: Option<Arc<str>>,
        system_id: Box<str>,
        public_id: Option<Box<str>>,
        notation_name: Box<str>,
    },
    ExternalParameterEntity {
        base_uri: Option<Arc<str>>,
        system_id: Box<str>,
        public_id: Option<Box<str>>,
    },
}

impl EntityDecl {
    pub fn is_external(&self) -> bool {
        !matches!(
            self,
            Self::InternalGeneralEntity { .. } | Self::InternalParameterEntity { .. }
        )
    }
}

/// A declared entity and the bookkeeping of its substitution cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    pub decl: EntityDecl,
    /// `true` if this is declared in the external subset or an external parameter entity.
    pub is_external_markup: bool,
    // 0 while the expansion cost is unknown, otherwise `2 * (cost + 1)`
    checked: u64,
    // the normalized expansion in attribute values, shared by later references
    att_value: Option<Arc<str>>,
}

impl EntityRecord {
    pub fn new(decl: EntityDecl, is_external_markup: bool) -> Self {
        Self {
            decl,
            is_external_markup,
            checked: 0,
            att_value: None,
        }
    }

    /// The memoized cost of expanding this entity once, including nested references.
    ///
    /// Returns `None` if the entity has never been expanded completely.
    pub fn checked_cost(&self) -> Option<u64> {
        (self.checked > 0).then(|| self.checked / 2 - 1)
    }

    /// Memoize the expansion cost.  
    /// The first measurement wins; later calls do not overwrite it.
    pub(crate) fn set_checked_cost(&mut self, cost: u64) {
        if self.checked == 0 {
            self.checked = cost.saturating_add(1).saturating_mul(2);
        }
    }

    pub(crate) fn cached_att_value(&self) -> Option<Arc<str>> {
        self.att_value.clone()
    }

    pub(crate) fn set_cached_att_value(&mut self, value: Arc<str>) {
        self.att_value.get_or_insert(value);
    }
}

macro_rules! predefined_entity {
    ($name:ident, $text:literal) => {
        static $name: LazyLock<EntityRecord> = LazyLock::new(|| {
            EntityRecord::new(
                EntityDecl::InternalGeneralEntity {
                    base_uri: None,
                    replacement_text: $text.into(),
                },
                false,
            )
        });
    };
}

predefined_entity!(PREDEFINED_ENTITY_LT, "&#60;");
predefined_entity!(PREDEFINED_ENTITY_GT, "&#62;");
predefined_entity!(PREDEFINED_ENTITY_AMP, "&#38;");
predefined_entity!(PREDEFINED_ENTITY_APOS, "&#39;");
predefined_entity!(PREDEFINED_ENTITY_QUOT, "&#34;");

/// Returns the character a predefined entity stands for.
pub fn predefined_entity_char(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => None,
    }
}

/// General and parameter entities declared in a DTD.
///
/// Parameter entities are stored with a leading `'%'` in their names, so they never
/// collide with general entities.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntityMap(HashMap<Box<str>, EntityRecord>);

impl EntityMap {
    /// Register a new entity.
    ///
    /// The first declaration is binding. If `name` is already declared, or is the name of
    /// a predefined entity, the new one is discarded and an error is returned.
    pub fn insert(
        &mut self,
        name: impl Into<Box<str>>,
        decl: EntityDecl,
        is_external_markup: bool,
    ) -> Result<(), XMLError> {
        use std::collections::hash_map::Entry::*;
        let name: Box<str> = name.into();
        if predefined_entity_char(&name).is_some() {
            return Err(XMLError::ParserDuplicateEntityDecl);
        }
        match self.0.entry(name) {
            Occupied(_) => Err(XMLError::ParserDuplicateEntityDecl),
            Vacant(entry) => {
                entry.insert(EntityRecord::new(decl, is_external_markup));
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&EntityRecord> {
        if let Some(record) = self.0.get(name) {
            return Some(record);
        }

        match name {
            "lt" => Some(&PREDEFINED_ENTITY_LT),
            "gt" => Some(&PREDEFINED_ENTITY_GT),
            "amp" => Some(&PREDEFINED_ENTITY_AMP),
            "apos" => Some(&PREDEFINED_ENTITY_APOS),
            "quot" => Some(&PREDEFINED_ENTITY_QUOT),
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut EntityRecord> {
        self.0.get_mut(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EntityRecord)> {
        self.0.iter().map(|(name, record)| (name.as_ref(), record))
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotationDecl {
    pub public_id: Option<Box<str>>,
    pub system_id: Option<Box<str>>,
}

pub struct Locator {
    system_id: RwLock<Option<Arc<str>>>,
    public_id: RwLock<Option<Arc<str>>>,
    line: AtomicUsize,
    column: AtomicUsize,
}

impl Locator {
    pub(crate) fn new(
        system_id: Option<Arc<str>>,
        public_id: Option<Arc<str>>,
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            system_id: RwLock::new(system_id),
            public_id: RwLock::new(public_id),
            line: line.into(),
            column: column.into(),
        }
    }

    pub fn system_id(&self) -> Option<Arc<str>> {
        self.system_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn public_id(&self) -> Option<Arc<str>> {
        self.public_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn line(&self) -> usize {
        self.line.load(Ordering::Acquire)
    }

    pub fn column(&self) -> usize {
        self.column.load(Ordering::Acquire)
    }

    pub(crate) fn set_system_id(&self, system_id: Option<Arc<str>>) {
        *self
            .system_id
            .write()
            .unwrap_or_else(PoisonError::into_inner) = system_id;
    }

    pub(crate) fn set_public_id(&self, public_id: Option<Arc<str>>) {
        *self
            .public_id
            .write()
            .unwrap_or_else(PoisonError::into_inner) = public_id;
    }

    pub(crate) fn set_line(&self, line: usize) {
        self.line.store(line, Ordering::Release);
    }

    pub(crate) fn set_column(&self, column: usize) {
        self.column.store(column, Ordering::Release);
    }
}

impl Default for Locator {
    fn default() -> Self {
        Self::new(None, None, 1, 1)
    }
}
