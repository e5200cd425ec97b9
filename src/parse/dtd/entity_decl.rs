use std::sync::Arc;

use crate::{
    error::XMLError,
    sax::{
        EntityDecl,
        error::{fatal_error, ns_error, warning},
        handler::SAXHandler,
        parser::{ParserOption, XMLReader},
        predefined_entity_char,
    },
};

impl<H: SAXHandler> XMLReader<H> {
    /// ```text
    /// [70] EntityDecl ::= GEDecl | PEDecl
    /// [71] GEDecl     ::= '<!ENTITY' S Name S EntityDef S? '>'
    /// [72] PEDecl     ::= '<!ENTITY' S '%' S Name S PEDef S? '>'
    /// [73] EntityDef  ::= EntityValue | (ExternalID NDataDecl?)
    /// [74] PEDef      ::= EntityValue | ExternalID
    /// [76] NDataDecl  ::= S 'NDATA' S Name
    /// ```
    pub(crate) fn parse_entity_decl(&mut self) -> Result<(), XMLError> {
        let depth = self.source_stack.len();
        // skip '<!ENTITY'
        self.source.advance(8);
        if !self.skip_whitespaces_in_dtd(true)? {
            fatal_error!(self, ParserInvalidEntityDecl, "White spaces are required after '<!ENTITY'.");
            return Err(XMLError::ParserInvalidEntityDecl);
        }
        let pe = self.source.next_char_if(|c| c == '%').is_some();
        if pe && !self.skip_whitespaces_in_dtd(true)? {
            fatal_error!(self, ParserInvalidEntityDecl, "White spaces are required after '%'.");
            return Err(XMLError::ParserInvalidEntityDecl);
        }
        let mut name = String::new();
        self.parse_name(&mut name)?;
        if self.config.is_enable(ParserOption::Namespaces) && name.contains(':') {
            ns_error!(
                self,
                ParserInvalidQNameSeparator,
                "The entity name '{}' must not contain ':'.",
                name
            );
        }
        if !self.skip_whitespaces_in_dtd(true)? {
            fatal_error!(
                self,
                ParserInvalidEntityDecl,
                "White spaces are required after the entity name '{}'.",
                name
            );
            return Err(XMLError::ParserInvalidEntityDecl);
        }

        let base_uri = self
            .source
            .base_uri
            .clone()
            .or_else(|| self.base_uri.clone());
        let is_external_markup = self.in_external_markup();
        let decl = if matches!(self.source.peek_char(), Some('"' | '\'')) {
            let mut value = String::new();
            self.parse_entity_value(&mut value)?;
            let replacement_text: Arc<str> = value.into();
            if pe {
                EntityDecl::InternalParameterEntity {
                    base_uri,
                    replacement_text,
                }
            } else {
                EntityDecl::InternalGeneralEntity {
                    base_uri,
                    replacement_text,
                }
            }
        } else {
            let (system_id, public_id) = self.parse_external_id(false)?;
            let Some(system_id) = system_id else {
                return Err(XMLError::InternalError);
            };
            let system_id: Box<str> = system_id.into();
            let public_id: Option<Box<str>> = public_id.map(Into::into);

            let mut notation_name = None;
            if !pe {
                let s = self.skip_whitespaces_in_dtd(true)?;
                if self.consume_keyword("NDATA") {
                    if !s || !self.skip_whitespaces_in_dtd(true)? {
                        fatal_error!(self, ParserInvalidEntityDecl, "White spaces are required around 'NDATA'.");
                        return Err(XMLError::ParserInvalidEntityDecl);
                    }
                    let mut notation = String::new();
                    self.parse_name(&mut notation)?;
                    notation_name = Some(notation);
                }
            }
            match notation_name {
                Some(notation_name) => EntityDecl::ExternalGeneralUnparsedEntity {
                    base_uri,
                    system_id,
                    public_id,
                    notation_name: notation_name.into(),
                },
                None if pe => EntityDecl::ExternalParameterEntity {
                    base_uri,
                    system_id,
                    public_id,
                },
                None => EntityDecl::ExternalGeneralParsedEntity {
                    base_uri,
                    system_id,
                    public_id,
                },
            }
        };

        self.skip_whitespaces_in_dtd(true)?;
        if self.source.next_char_if(|c| c == '>').is_none() {
            fatal_error!(
                self,
                ParserInvalidEntityDecl,
                "The entity declaration of '{}' is not closed by '>'.",
                name
            );
            return Err(XMLError::ParserInvalidEntityDecl);
        }
        self.check_decl_nesting(depth, "entity");

        let key = if pe { format!("%{name}") } else { name.clone() };
        if self
            .entities
            .insert(key.as_str(), decl.clone(), is_external_markup)
            .is_err()
        {
            // redeclarations of predefined entities are accepted and ignored
            if pe || predefined_entity_char(&name).is_none() {
                warning!(
                    self,
                    ParserDuplicateEntityDecl,
                    "The entity '{}' is already declared.",
                    key
                );
            }
            return Ok(());
        }
        if self.fatal_error_occurred {
            return Ok(());
        }
        match &decl {
            EntityDecl::InternalGeneralEntity {
                replacement_text, ..
            }
            | EntityDecl::InternalParameterEntity {
                replacement_text, ..
            } => self.handler.internal_entity_decl(&key, replacement_text),
            EntityDecl::ExternalGeneralParsedEntity {
                system_id,
                public_id,
                ..
            }
            | EntityDecl::ExternalParameterEntity {
                system_id,
                public_id,
                ..
            } => {
                let system_id = self.reported_system_id(system_id);
                self.handler
                    .external_entity_decl(&key, public_id.as_deref(), &system_id);
            }
            EntityDecl::ExternalGeneralUnparsedEntity {
                system_id,
                public_id,
                notation_name,
                ..
            } => {
                let system_id = self.reported_system_id(system_id);
                self.handler.unparsed_entity_decl(
                    &key,
                    public_id.as_deref(),
                    &system_id,
                    notation_name,
                );
            }
        }
        Ok(())
    }

    /// Parse an entity value literal into its replacement text.
    ///
    /// Character references and parameter entity references are substituted, but
    /// general entity references are kept as they are.
    ///
    /// ```text
    /// [9] EntityValue ::= '"' ([^%&"] | PEReference | Reference)* '"'
    ///                   | "'" ([^%&'] | PEReference | Reference)* "'"
    /// ```
    ///
    /// # Reference
    /// [4.5 Construction of Entity Replacement Text](https://www.w3.org/TR/xml/#intern-replacement)
    fn parse_entity_value(&mut self, buffer: &mut String) -> Result<(), XMLError> {
        let quote = self.parse_quote(XMLError::ParserInvalidEntityValue)?;
        let depth = self.source_stack.len();
        let max = self.limits().max_text_length;
        let mut reported = false;
        loop {
            // references in the literal open their own frames
            if self.source_stack.len() > depth && self.source.content_bytes().is_empty() {
                self.pop_entity_source()?;
                continue;
            }
            let Some(c) = self.source.peek_char() else {
                fatal_error!(self, ParserInvalidEntityValue, "The entity value is not closed.");
                return Err(XMLError::ParserInvalidEntityValue);
            };
            match c {
                c if c == quote && self.source_stack.len() == depth => {
                    self.source.advance(1);
                    return Ok(());
                }
                '%' => {
                    if !self.in_external_markup() {
                        fatal_error!(
                            self,
                            ParserPEReferenceInInternalSubset,
                            "Parameter entity references are not allowed in entity values in the internal subset."
                        );
                        return Err(XMLError::ParserPEReferenceInInternalSubset);
                    }
                    self.reference_parameter_entity(false)?;
                }
                '&' if self.source.content_bytes().get(1) == Some(&b'#') => {
                    if let Some(c) = self.parse_char_ref() {
                        buffer.push(c);
                    }
                }
                '&' => {
                    // bypassed, but the syntax is checked
                    let name = self.parse_entity_ref_name()?;
                    buffer.push('&');
                    buffer.push_str(&name);
                    buffer.push(';');
                }
                '\r' => {
                    self.source.advance(1);
                    self.source.next_char_if(|c| c == '\n');
                    buffer.push('\n');
                }
                c => {
                    if !self.is_char(c) && !reported {
                        fatal_error!(
                            self,
                            ParserInvalidCharacter,
                            "The character U+{:04X} is not allowed in XML documents.",
                            c as u32
                        );
                        reported = true;
                    }
                    self.source.advance(c.len_utf8());
                    buffer.push(c);
                }
            }
            if buffer.len() > max {
                fatal_error!(self, ParserTooLongText, "The entity value is longer than {} bytes.", max);
                return Err(XMLError::ParserTooLongText);
            }
        }
    }
}
