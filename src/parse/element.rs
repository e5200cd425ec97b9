use std::sync::Arc;

use crate::{
    XML_NS_NAMESPACE, XML_XML_NAMESPACE,
    error::XMLError,
    parse::literals::normalize_tokenized,
    sax::{
        attributes::{Attribute, Attributes},
        dict::same_name,
        error::{fatal_error, ns_error, warning},
        handler::SAXHandler,
        namespace::NamespaceStack,
        parser::{OpenElement, ParserOption, XMLReader},
    },
    uri::Components,
};

impl<H: SAXHandler> XMLReader<H> {
    /// Parse a start tag or an empty-element tag.
    ///
    /// The whole tag must be available in the current frame.
    ///
    /// ```text
    /// [40] STag         ::= '<' Name (S Attribute)* S? '>'
    /// [44] EmptyElemTag ::= '<' Name (S Attribute)* S? '/>'
    /// ```
    pub(crate) fn parse_start_tag(&mut self) -> Result<(), XMLError> {
        let max_depth = self.limits().max_element_depth;
        if self.context.element_stack.len() >= max_depth {
            log::warn!("element nesting depth exceeds {max_depth}");
            fatal_error!(
                self,
                ParserTooDeepElement,
                "Elements are nested too deeply. The maximum depth is {}.",
                max_depth
            );
            return Err(XMLError::ParserTooDeepElement);
        }

        let line = self.source.line();
        // skip '<'
        self.source.advance(1);
        let mut name = String::new();
        let prefix_len = self.parse_qname(&mut name)?;
        let name = self.dict.intern(&name);

        let mut atts = Attributes::new();
        let empty = loop {
            let s = self.skip_whitespaces() > 0;
            match self.source.peek_char() {
                Some('>') => {
                    self.source.advance(1);
                    break false;
                }
                Some('/') if self.source.content_bytes().starts_with(b"/>") => {
                    self.source.advance(2);
                    break true;
                }
                Some(_) if s => self.parse_attribute(&name, &mut atts)?,
                Some(_) => {
                    fatal_error!(
                        self,
                        ParserInvalidStartOrEmptyTag,
                        "The start tag '{}' is malformed.",
                        name
                    );
                    return Err(XMLError::ParserInvalidStartOrEmptyTag);
                }
                None => {
                    fatal_error!(self, ParserUnexpectedEOF, "The start tag '{}' is not closed.", name);
                    return Err(XMLError::ParserUnexpectedEOF);
                }
            }
        };

        self.add_default_attributes(&name, &mut atts);

        let ns_depth = self.namespaces.len();
        let mut uri = None;
        let mut local_name = None;
        if self.config.is_enable(ParserOption::Namespaces) {
            atts = self.declare_namespaces(atts);
            self.resolve_attribute_names(&mut atts);
            (uri, local_name) = self.resolve_element_name(&name, prefix_len, true);
        }

        if !self.fatal_error_occurred {
            for (prefix, namespace_name) in self.namespaces.iter().skip(ns_depth) {
                self.handler
                    .start_prefix_mapping((!prefix.is_empty()).then_some(prefix), namespace_name);
            }
            self.handler
                .start_element(uri.as_deref(), local_name.as_deref(), &name, &atts);
        }

        let open = OpenElement {
            name,
            prefix_len,
            ns_depth,
            line,
        };
        if empty {
            self.close_element(open);
        } else {
            self.context.element_stack.push(open);
        }
        Ok(())
    }

    /// ```text
    /// [41] Attribute ::= Name Eq AttValue
    /// ```
    fn parse_attribute(&mut self, element: &str, atts: &mut Attributes) -> Result<(), XMLError> {
        let mut qname = String::new();
        self.parse_qname(&mut qname)?;
        self.parse_eq()?;
        let mut value = String::new();
        self.parse_att_value(&mut value)?;

        let decl = self.attlistdecls.get(element, &qname);
        let declared = decl.is_some();
        if decl.is_some_and(|decl| decl.attribute_type.is_tokenized()) {
            value = normalize_tokenized(&value);
        }
        let mut att = Attribute::new(self.dict.intern(&qname), value);
        att.set_specified();
        if declared {
            att.set_declared();
        }
        if let Err((att, _)) = atts.push(att) {
            fatal_error!(
                self,
                ParserDuplicateAttributes,
                "The attribute '{}' is specified more than once in the start tag '{}'.",
                att.qname,
                element
            );
        }
        Ok(())
    }

    /// Inject attributes that have default values in the DTD but are not specified.
    fn add_default_attributes(&mut self, element: &str, atts: &mut Attributes) {
        let defaults = self
            .attlistdecls
            .attlist(element)
            .filter(|decl| !atts.contains_qname(&decl.name))
            .filter_map(|decl| Some((decl.name.clone(), decl.default_decl.default_value()?.to_owned())))
            .collect::<Vec<_>>();
        for (qname, value) in defaults {
            let mut att = Attribute::new(self.dict.intern(&qname), value);
            att.set_declared();
            let pushed = atts.push(att);
            debug_assert!(pushed.is_ok());
        }
    }

    /// Bind namespaces declared by the attributes in `atts`.
    ///
    /// Returns the attribute list without declarations that were discarded as redundant.
    ///
    /// # Reference
    /// [Namespaces in XML 1.0 3 Declaring Namespaces](https://www.w3.org/TR/xml-names/#ns-decl)
    fn declare_namespaces(&mut self, mut atts: Attributes) -> Attributes {
        let clean = self.config.is_enable(ParserOption::CleanNamespaces);
        let mut discarded = vec![];
        for i in 0..atts.len() {
            let qname = atts[i].qname.clone();
            let prefix = match qname.as_ref() {
                "xmlns" => "",
                qname => match qname.strip_prefix("xmlns:") {
                    Some(prefix) if !prefix.is_empty() => prefix,
                    _ => continue,
                },
            };
            if let Some(att) = atts.get_mut(i) {
                att.set_nsdecl();
            }
            let namespace_name = atts[i].value.clone();

            if prefix == "xml" {
                if namespace_name.as_ref() != XML_XML_NAMESPACE {
                    fatal_error!(
                        self,
                        ParserUnacceptableNamespaceName,
                        "The prefix 'xml' must not be bound to any namespace other than '{}'.",
                        XML_XML_NAMESPACE
                    );
                }
                continue;
            }
            if prefix == "xmlns" {
                fatal_error!(
                    self,
                    ParserUnacceptableNamespaceName,
                    "The prefix 'xmlns' must not be declared."
                );
                continue;
            }
            if namespace_name.as_ref() == XML_XML_NAMESPACE {
                fatal_error!(
                    self,
                    ParserUnacceptableNamespaceName,
                    "The namespace '{}' must be bound only to the prefix 'xml'.",
                    XML_XML_NAMESPACE
                );
                continue;
            }
            if namespace_name.as_ref() == XML_NS_NAMESPACE {
                fatal_error!(
                    self,
                    ParserUnacceptableNamespaceName,
                    "The namespace '{}' must not be declared.",
                    XML_NS_NAMESPACE
                );
                continue;
            }
            if !prefix.is_empty() && namespace_name.is_empty() {
                ns_error!(
                    self,
                    ParserUnacceptableNamespaceName,
                    "The prefix '{}' cannot be undeclared.",
                    prefix
                );
                continue;
            }
            if !namespace_name.is_empty() && !Components::parse(&namespace_name).is_absolute() {
                warning!(
                    self,
                    ParserNamespaceNameNotURI,
                    "The namespace name '{}' is not an absolute URI.",
                    namespace_name
                );
            }
            if self.namespaces.push(prefix, &namespace_name, clean) == NamespaceStack::DISCARDED {
                log::trace!("discard the redundant namespace declaration '{qname}'");
                discarded.push(i);
            }
        }

        if discarded.is_empty() {
            return atts;
        }
        let mut rebuilt = Attributes::new();
        for (i, att) in atts.iter().enumerate() {
            if !discarded.contains(&i) {
                let pushed = rebuilt.push(att.clone());
                debug_assert!(pushed.is_ok());
            }
        }
        rebuilt
    }

    /// Set the expanded names of all attributes.
    fn resolve_attribute_names(&mut self, atts: &mut Attributes) {
        for i in 0..atts.len() {
            let att = &atts[i];
            let qname = att.qname.clone();
            let (namespace_name, local_name) = if att.is_nsdecl() {
                let local_name = qname.strip_prefix("xmlns:").unwrap_or("xmlns");
                (Some(Arc::from(XML_NS_NAMESPACE)), local_name)
            } else if let Some((prefix, local_name)) = qname.split_once(':')
                && !prefix.is_empty()
                && !local_name.is_empty()
            {
                let namespace_name = self.namespaces.resolve(prefix).cloned();
                if namespace_name.is_none() {
                    ns_error!(
                        self,
                        ParserUndefinedNamespace,
                        "The prefix '{}' of the attribute '{}' is not bound.",
                        prefix,
                        qname
                    );
                }
                (namespace_name, local_name)
            } else {
                (None, qname.as_ref())
            };
            let local_name = self.dict.intern(local_name);
            if atts
                .set_expanded_name(i, namespace_name.clone(), local_name.clone())
                .is_err()
            {
                ns_error!(
                    self,
                    ParserDuplicateAttributes,
                    "The attribute '{{{}}}{}' is specified more than once.",
                    namespace_name.as_deref().unwrap_or(""),
                    local_name
                );
            }
        }
    }

    /// Returns the namespace name and the local name of an element type.
    fn resolve_element_name(
        &mut self,
        name: &Arc<str>,
        prefix_len: usize,
        report: bool,
    ) -> (Option<Arc<str>>, Option<Arc<str>>) {
        if prefix_len == 0 {
            return (self.namespaces.resolve("").cloned(), Some(name.clone()));
        }
        let prefix = &name[..prefix_len];
        let namespace_name = self.namespaces.resolve(prefix).cloned();
        if namespace_name.is_none() && report {
            ns_error!(
                self,
                ParserUndefinedNamespace,
                "The prefix '{}' of the element '{}' is not bound.",
                prefix,
                name
            );
        }
        let local_name = self.dict.intern(&name[prefix_len + 1..]);
        (namespace_name, Some(local_name))
    }

    /// ```text
    /// [42] ETag ::= '</' Name S? '>'
    /// ```
    pub(crate) fn parse_end_tag(&mut self) -> Result<(), XMLError> {
        // skip '</'
        self.source.advance(2);
        let mut name = String::new();
        self.parse_name(&mut name)?;
        self.skip_whitespaces();
        if self.source.next_char_if(|c| c == '>').is_none() {
            fatal_error!(self, ParserInvalidEndTag, "The end tag '{}' is not closed by '>'.", name);
            return Err(XMLError::ParserInvalidEndTag);
        }

        let name = self.dict.intern(&name);
        let Some(open) = self.context.element_stack.pop() else {
            fatal_error!(self, ParserInvalidEndTag, "The end tag '{}' has no start tag.", name);
            return Err(XMLError::ParserInvalidEndTag);
        };
        if !same_name(&open.name, &name) {
            fatal_error!(
                self,
                ParserMismatchElementType,
                "The end tag '{}' does not match the start tag '{}' at line {}.",
                name,
                open.name,
                open.line
            );
            return Err(XMLError::ParserMismatchElementType);
        }
        if let Some(&depth) = self.context.entity_stack.last()
            && self.context.element_stack.len() < depth
        {
            fatal_error!(
                self,
                ParserEntityIncorrectNesting,
                "The element '{}' is closed in an entity that did not open it.",
                name
            );
            return Err(XMLError::ParserEntityIncorrectNesting);
        }
        self.close_element(open);
        Ok(())
    }

    fn close_element(&mut self, open: OpenElement) {
        let (uri, local_name) = if self.config.is_enable(ParserOption::Namespaces) {
            self.resolve_element_name(&open.name, open.prefix_len, false)
        } else {
            (None, None)
        };
        let popped = self.namespaces.truncate(open.ns_depth);
        if self.fatal_error_occurred {
            return;
        }
        self.handler
            .end_element(uri.as_deref(), local_name.as_deref(), &open.name);
        for (prefix, _) in popped {
            self.handler
                .end_prefix_mapping((!prefix.is_empty()).then_some(prefix.as_ref()));
        }
    }
}
