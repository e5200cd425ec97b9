use std::sync::Arc;

use crate::{
    error::XMLError,
    sax::{
        EntityDecl,
        predefined_entity_char,
        error::{error, fatal_error, warning},
        handler::SAXHandler,
        parser::{ParserOption, ParserState, XMLReader},
        source::{InputSource, SourceKind},
    },
    uri::resolve_uri,
};

impl<H: SAXHandler> XMLReader<H> {
    /// Parse a character reference and return the character it refers to.
    ///
    /// A malformed reference or a reference to an illegal character is reported as a
    /// fatal error, but parsing can continue, so this returns `None` in that case.
    ///
    /// ```text
    /// [66] CharRef ::= '&#' [0-9]+ ';' | '&#x' [0-9a-fA-F]+ ';'
    /// ```
    pub(crate) fn parse_char_ref(&mut self) -> Option<char> {
        // skip '&#'
        self.source.advance(2);
        let hex = self.source.next_char_if(|c| c == 'x').is_some();
        let content = self.source.content_bytes();
        let digits = content
            .iter()
            .take_while(|b| {
                if hex {
                    b.is_ascii_hexdigit()
                } else {
                    b.is_ascii_digit()
                }
            })
            .count();
        let terminated = content.get(digits) == Some(&b';');
        let value = std::str::from_utf8(&content[..digits])
            .ok()
            .and_then(|digits| u32::from_str_radix(digits, if hex { 16 } else { 10 }).ok());
        self.source.advance(digits + terminated as usize);

        if digits == 0 || !terminated {
            fatal_error!(self, ParserInvalidCharacterReference, "The character reference is malformed.");
            return None;
        }
        match value.and_then(char::from_u32) {
            Some(c) if self.is_char(c) => Some(c),
            _ => {
                fatal_error!(
                    self,
                    ParserInvalidCharacterReference,
                    "The character reference does not refer to a legal character."
                );
                None
            }
        }
    }

    /// ```text
    /// [68] EntityRef ::= '&' Name ';'
    /// ```
    pub(crate) fn parse_entity_ref_name(&mut self) -> Result<String, XMLError> {
        // skip '&'
        self.source.advance(1);
        let mut name = String::new();
        self.parse_name(&mut name)?;
        if self.source.next_char_if(|c| c == ';').is_none() {
            fatal_error!(
                self,
                ParserInvalidEntityReference,
                "The entity reference '&{};' is not terminated by ';'.",
                name
            );
            return Err(XMLError::ParserInvalidEntityReference);
        }
        Ok(name)
    }

    /// ```text
    /// [69] PEReference ::= '%' Name ';'
    /// ```
    pub(crate) fn parse_pe_reference_name(&mut self) -> Result<String, XMLError> {
        // skip '%'
        self.source.advance(1);
        let mut name = String::new();
        self.parse_name(&mut name)?;
        if self.source.next_char_if(|c| c == ';').is_none() {
            fatal_error!(
                self,
                ParserInvalidParameterEntityReference,
                "The parameter entity reference '%{};' is not terminated by ';'.",
                name
            );
            return Err(XMLError::ParserInvalidParameterEntityReference);
        }
        Ok(name)
    }

    /// Check if a reference to an undeclared entity violates the well-formedness constraint
    /// rather than the validity constraint.
    ///
    /// # Reference
    /// [WFC: Entity Declared](https://www.w3.org/TR/xml/#wf-entdeclared)
    pub(crate) fn entity_must_be_declared(&self) -> bool {
        self.standalone == Some(true)
            || self.dtd_name.is_none()
            || (!self.has_external_subset && !self.has_parameter_entity)
    }

    fn report_undeclared_entity(&mut self, name: &str) -> bool {
        if self.entity_must_be_declared() {
            fatal_error!(
                self,
                ParserUndeclaredEntityReference,
                "The entity '{}' is not declared.",
                name
            );
            false
        } else {
            warning!(
                self,
                ParserUndeclaredEntityReference,
                "The entity '{}' is not declared.",
                name
            );
            true
        }
    }

    /// Substitute a general entity reference in an attribute value.
    ///
    /// The normalized expansion is cached in the entity record, and later references reuse
    /// it with its memoized cost.
    pub(crate) fn substitute_entity_in_att_value(
        &mut self,
        name: &str,
        buffer: &mut String,
    ) -> Result<(), XMLError> {
        if let Some(c) = predefined_entity_char(name) {
            buffer.push(c);
            return Ok(());
        }
        let Some(record) = self.entities.get(name).cloned() else {
            self.report_undeclared_entity(name);
            return Ok(());
        };
        if self.standalone == Some(true) && record.is_external_markup {
            fatal_error!(
                self,
                ParserUndeclaredEntityReference,
                "The standalone document refers to the entity '{}' declared in external markup.",
                name
            );
        }
        let cached = record.cached_att_value();
        let checked_cost = record.checked_cost();
        let (replacement_text, base_uri) = match record.decl {
            EntityDecl::InternalGeneralEntity {
                replacement_text,
                base_uri,
            } => (replacement_text, base_uri),
            EntityDecl::ExternalGeneralParsedEntity { .. }
            | EntityDecl::ExternalGeneralUnparsedEntity { .. } => {
                fatal_error!(
                    self,
                    ParserExternalEntityInAttValue,
                    "The external entity '{}' is referenced in an attribute value.",
                    name
                );
                return Ok(());
            }
            _ => return Err(XMLError::InternalError),
        };
        if self.is_entity_in_use(name) {
            fatal_error!(self, ParserEntityRecursion, "The entity '{}' refers to itself.", name);
            return Err(XMLError::ParserEntityRecursion);
        }
        self.check_entity_depth(name)?;

        if let Some(cached) = cached {
            let cost = checked_cost.unwrap_or_default();
            self.copied = self.copied.saturating_add(cost);
            self.check_amplification(self.copied)?;
            buffer.push_str(&cached);
            return Ok(());
        }

        let mut source = InputSource::from_content(&replacement_text);
        source.entity_name = Some(name.into());
        source.kind = SourceKind::GeneralEntity;
        source.base_uri = base_uri;
        self.push_source(source)?;
        self.account_substitution(replacement_text.len())?;
        let mut expanded = String::new();
        self.parse_att_value_content(&mut expanded, None)?;
        self.pop_entity_source()?;
        if let Some(record) = self.entities.get_mut(name) {
            record.set_cached_att_value(expanded.as_str().into());
        }
        buffer.push_str(&expanded);
        Ok(())
    }

    /// Handle a general entity reference in content.
    ///
    /// An internal entity and a loaded external entity become the current frame, and
    /// their text is parsed as content until [`XMLReader::end_entity_in_content`].
    pub(crate) fn reference_entity_in_content(&mut self, name: &str) -> Result<(), XMLError> {
        let Some(record) = self.entities.get(name).cloned() else {
            if self.report_undeclared_entity(name) && !self.fatal_error_occurred {
                self.handler.skipped_entity(name);
            }
            return Ok(());
        };
        if self.standalone == Some(true) && record.is_external_markup {
            fatal_error!(
                self,
                ParserUndeclaredEntityReference,
                "The standalone document refers to the entity '{}' declared in external markup.",
                name
            );
        }

        let name: Arc<str> = name.into();
        let checked_cost = record.checked_cost();
        match record.decl {
            EntityDecl::InternalGeneralEntity {
                replacement_text,
                base_uri,
            } => {
                if self.is_entity_in_use(&name) {
                    fatal_error!(self, ParserEntityRecursion, "The entity '{}' refers to itself.", name);
                    return Err(XMLError::ParserEntityRecursion);
                }
                self.check_entity_depth(&name)?;
                if let Some(cost) = checked_cost {
                    self.check_amplification(self.copied.saturating_add(cost))?;
                }
                let mut source = InputSource::from_content(&replacement_text);
                source.entity_name = Some(name.clone());
                source.kind = SourceKind::GeneralEntity;
                source.base_uri = base_uri;
                self.push_source(source)?;
                self.account_substitution(replacement_text.len())?;
            }
            EntityDecl::ExternalGeneralParsedEntity {
                base_uri,
                system_id,
                public_id,
            } => {
                if !self.config.is_enable(ParserOption::ExternalGeneralEntities) {
                    if !self.fatal_error_occurred {
                        self.handler.skipped_entity(&name);
                    }
                    return Ok(());
                }
                if self.is_entity_in_use(&name) {
                    fatal_error!(self, ParserEntityRecursion, "The entity '{}' refers to itself.", name);
                    return Err(XMLError::ParserEntityRecursion);
                }
                self.check_entity_depth(&name)?;
                let source = match self.handler.resolve_entity(
                    &name,
                    public_id.as_deref(),
                    base_uri.as_deref(),
                    &system_id,
                ) {
                    Ok(source) => source,
                    Err(err) => {
                        log::debug!("failed to resolve the entity '{name}' ({system_id}): {err}");
                        error!(
                            self,
                            ParserEntityNotFound,
                            "The external entity '{}' cannot be loaded from '{}'.",
                            name,
                            system_id
                        );
                        if !self.fatal_error_occurred {
                            self.handler.skipped_entity(&name);
                        }
                        return Ok(());
                    }
                };
                self.push_external_source(source, name.clone(), SourceKind::GeneralEntity, base_uri.as_deref(), &system_id)?;
                self.state = ParserState::InTextDeclaration;
            }
            EntityDecl::ExternalGeneralUnparsedEntity { .. } => {
                fatal_error!(
                    self,
                    ParserUnparsedEntityReference,
                    "The unparsed entity '{}' is referenced in content.",
                    name
                );
                return Ok(());
            }
            _ => return Err(XMLError::InternalError),
        }

        self.context
            .entity_stack
            .push(self.context.element_stack.len());
        if !self.fatal_error_occurred {
            self.handler.start_entity(&name);
        }
        Ok(())
    }

    /// Close the frame of a general entity whose text has been parsed as content.
    pub(crate) fn end_entity_in_content(&mut self) -> Result<(), XMLError> {
        let Some(depth) = self.context.entity_stack.pop() else {
            return Err(XMLError::InternalError);
        };
        if self.context.element_stack.len() != depth {
            let name = self.source.entity_name.clone().unwrap_or_default();
            fatal_error!(
                self,
                ParserEntityIncorrectNesting,
                "The replacement text of the entity '{}' does not contain complete elements.",
                name
            );
            return Err(XMLError::ParserEntityIncorrectNesting);
        }
        self.pop_entity_source()?;
        if !self.fatal_error_occurred {
            self.handler.end_entity();
        }
        Ok(())
    }

    /// Make an entity returned by the resolver the current frame.
    pub(crate) fn push_external_source(
        &mut self,
        mut source: InputSource,
        name: Arc<str>,
        kind: SourceKind,
        base_uri: Option<&str>,
        system_id: &str,
    ) -> Result<(), XMLError> {
        let uri: Arc<str> = match base_uri {
            Some(base) => resolve_uri(base, system_id).into(),
            None => system_id.into(),
        };
        if source.system_id().is_none() {
            source.set_system_id(uri.clone());
        }
        source.base_uri.get_or_insert(uri);
        source.entity_name = Some(name);
        source.kind = kind;
        source.external = true;
        log::debug!("load the external entity from {:?}", source.system_id());
        if let Err(err) = self.push_source(source) {
            fatal_error!(
                self,
                err.clone(),
                "The encoding of the external entity '{}' is not supported.",
                system_id
            );
            return Err(err);
        }
        Ok(())
    }

    /// Expand a parameter entity reference in a DTD.
    ///
    /// If `padded` is `true`, the replacement text of an internal entity is enlarged by one
    /// space on each side.
    ///
    /// # Reference
    /// [4.4.8 Included as PE](https://www.w3.org/TR/xml/#inter-entity)
    pub(crate) fn reference_parameter_entity(&mut self, padded: bool) -> Result<(), XMLError> {
        let name = self.parse_pe_reference_name()?;
        self.has_parameter_entity = true;
        let key: Arc<str> = format!("%{name}").into();
        let Some(record) = self.entities.get(&key).cloned() else {
            if self.standalone == Some(true) || (!self.has_external_subset && !self.in_external_markup()) {
                fatal_error!(
                    self,
                    ParserUndeclaredEntityReference,
                    "The parameter entity '%{};' is not declared.",
                    name
                );
            } else {
                warning!(
                    self,
                    ParserUndeclaredEntityReference,
                    "The parameter entity '%{};' is not declared.",
                    name
                );
            }
            return Ok(());
        };
        if self.is_entity_in_use(&key) {
            fatal_error!(self, ParserEntityRecursion, "The parameter entity '%{};' refers to itself.", name);
            return Err(XMLError::ParserEntityRecursion);
        }
        self.check_entity_depth(&key)?;

        match record.decl {
            EntityDecl::InternalParameterEntity {
                replacement_text,
                base_uri,
            } => {
                let mut source = if padded {
                    InputSource::from_content(&format!(" {replacement_text} "))
                } else {
                    InputSource::from_content(&replacement_text)
                };
                source.entity_name = Some(key);
                source.kind = SourceKind::ParameterEntity;
                source.base_uri = base_uri;
                source.pe_padded = padded;
                self.push_source(source)?;
                self.account_substitution(replacement_text.len())?;
            }
            EntityDecl::ExternalParameterEntity {
                base_uri,
                system_id,
                public_id,
            } => {
                if !self.config.is_enable(ParserOption::ExternalParameterEntities) {
                    return Ok(());
                }
                let source = match self.handler.resolve_entity(
                    &key,
                    public_id.as_deref(),
                    base_uri.as_deref(),
                    &system_id,
                ) {
                    Ok(source) => source,
                    Err(err) => {
                        log::debug!("failed to resolve the entity '{key}' ({system_id}): {err}");
                        error!(
                            self,
                            ParserEntityNotFound,
                            "The external parameter entity '%{};' cannot be loaded from '{}'.",
                            name,
                            system_id
                        );
                        return Ok(());
                    }
                };
                self.push_external_source(
                    source,
                    key,
                    SourceKind::ParameterEntity,
                    base_uri.as_deref(),
                    &system_id,
                )?;
                self.parse_text_decl_if_present()?;
            }
            _ => return Err(XMLError::InternalError),
        }
        Ok(())
    }
}
