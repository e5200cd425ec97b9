mod attlist_decl;
mod element_decl;
mod entity_decl;
mod ext_subset;
mod notation_decl;

use std::sync::Arc;

use crate::{
    error::XMLError,
    parse::find_unquoted_gt,
    sax::{
        EntityDecl,
        error::{fatal_error, validity_error},
        handler::SAXHandler,
        parser::{ParserOption, XMLReader},
        source::{InputSource, SourceKind},
    },
};

impl<H: SAXHandler> XMLReader<H> {
    /// Parse a document type declaration.
    ///
    /// The whole declaration must be available in the document frame. If it has an
    /// internal subset, `subset_end` is the offset of the `']'` closing the subset from
    /// the beginning of the declaration.
    ///
    /// ```text
    /// [28] doctypedecl ::= '<!DOCTYPE' S Name (S ExternalID)? S? ('[' intSubset ']' S?)? '>'
    /// ```
    pub(crate) fn parse_doctypedecl(&mut self, subset_end: Option<usize>) -> Result<(), XMLError> {
        let base = self.source.position();
        // skip '<!DOCTYPE'
        self.source.advance(9);
        if self.skip_whitespaces() == 0 {
            fatal_error!(self, ParserInvalidDoctypeDecl, "White spaces are required after '<!DOCTYPE'.");
            return Err(XMLError::ParserInvalidDoctypeDecl);
        }
        let mut name = String::new();
        self.parse_qname(&mut name)?;
        let name: Arc<str> = name.into();

        let s = self.skip_whitespaces() > 0;
        let (mut system_id, mut public_id) = (None, None);
        let content = self.source.content_bytes();
        if content.starts_with(b"SYSTEM") || content.starts_with(b"PUBLIC") {
            if !s {
                fatal_error!(
                    self,
                    ParserInvalidDoctypeDecl,
                    "White spaces are required before the external ID."
                );
            }
            (system_id, public_id) = self.parse_external_id(false)?;
            self.skip_whitespaces();
        }

        self.dtd_name = Some(name.clone());
        self.has_external_subset = system_id.is_some();
        if !self.fatal_error_occurred {
            self.handler
                .start_dtd(&name, public_id.as_deref(), system_id.as_deref());
        }

        if self.source.peek_char() == Some('[') {
            let Some(subset_end) = subset_end else {
                return Err(XMLError::InternalError);
            };
            // skip '['
            self.source.advance(1);
            let start = (self.source.position() - base) as usize;
            let len = subset_end.saturating_sub(start);
            self.has_internal_subset = true;
            self.parse_internal_subset(len)?;
            // skip ']'
            self.source.advance(1);
            self.skip_whitespaces();
        }
        if self.source.next_char_if(|c| c == '>').is_none() {
            fatal_error!(self, ParserInvalidDoctypeDecl, "The document type declaration is not closed by '>'.");
            return Err(XMLError::ParserInvalidDoctypeDecl);
        }

        if self.config.is_enable(ParserOption::ExternalParameterEntities) {
            self.load_external_subset(&name, public_id.as_deref(), system_id.as_deref())?;
        }
        self.check_unparsed_entity_notations();
        if !self.fatal_error_occurred {
            self.handler.end_dtd();
        }
        Ok(())
    }

    /// Parse the first `len` bytes of the document frame as the internal subset.
    ///
    /// The subset is parsed in its own frame, so recovery from broken declarations never
    /// goes beyond the subset.
    fn parse_internal_subset(&mut self, len: usize) -> Result<(), XMLError> {
        let Some(text) = self.source.content_str().get(..len).map(str::to_owned) else {
            return Err(XMLError::InternalError);
        };
        let mut subset = InputSource::from_content(&text);
        subset.set_position(self.source.line(), self.source.column());
        subset.base_uri = self.source.base_uri.clone();
        if let Some(system_id) = self.source.system_id().cloned() {
            subset.set_system_id(system_id);
        }
        if let Some(public_id) = self.source.public_id().cloned() {
            subset.set_public_id(public_id);
        }

        let depth = self.source_stack.len();
        self.push_source(subset)?;
        let result = self.parse_subset_decls(true);
        while self.source_stack.len() > depth {
            self.pop_source();
        }
        result?;
        self.source.advance(len);
        Ok(())
    }

    /// Parse markup declarations, conditional sections and parameter entity references
    /// until the current frame is exhausted.
    ///
    /// If `recover` is `true`, a broken declaration is skipped up to its closing `'>'`
    /// unless the error makes further parsing impossible.
    ///
    /// ```text
    /// [28b] intSubset    ::= (markupdecl | DeclSep)*
    /// [31]  extSubsetDecl ::= ( markupdecl | conditionalSect | DeclSep)*
    /// ```
    pub(crate) fn parse_subset_decls(&mut self, recover: bool) -> Result<(), XMLError> {
        let depth = self.source_stack.len();
        let mut includes = 0;
        loop {
            match self.parse_subset_decl_once(&mut includes) {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) if recover && err.is_recoverable() => {
                    log::debug!("recover from {err} in the DTD");
                    self.skip_broken_decl(depth);
                }
                Err(err) => return Err(err),
            }
        }
        if includes > 0 {
            fatal_error!(self, ParserInvalidConditionalSect, "The conditional section is not closed.");
            return Err(XMLError::ParserInvalidConditionalSect);
        }
        Ok(())
    }

    /// Returns `Ok(false)` if no declarations remain.
    fn parse_subset_decl_once(&mut self, includes: &mut usize) -> Result<bool, XMLError> {
        self.skip_whitespaces_in_dtd(false)?;
        let content = self.source.content_bytes();
        if content.is_empty() {
            return Ok(false);
        }
        if content.starts_with(b"<![") {
            self.parse_conditional_sect(includes)?;
        } else if content.starts_with(b"]]>") && *includes > 0 {
            self.source.advance(3);
            *includes -= 1;
        } else {
            self.parse_markup_decl()?;
        }
        Ok(true)
    }

    /// ```text
    /// [29] markupdecl ::= elementdecl | AttlistDecl | EntityDecl | NotationDecl | PI | Comment
    /// ```
    fn parse_markup_decl(&mut self) -> Result<(), XMLError> {
        let content = self.source.content_bytes();
        if content.starts_with(b"<!ELEMENT") {
            self.parse_element_decl()
        } else if content.starts_with(b"<!ATTLIST") {
            self.parse_attlist_decl()
        } else if content.starts_with(b"<!ENTITY") {
            self.parse_entity_decl()
        } else if content.starts_with(b"<!NOTATION") {
            self.parse_notation_decl()
        } else if content.starts_with(b"<!--") {
            self.parse_comment()
        } else if content.starts_with(b"<?") {
            self.parse_pi()
        } else {
            fatal_error!(self, ParserInvalidDoctypeDecl, "A markup declaration is expected.");
            Err(XMLError::ParserInvalidDoctypeDecl)
        }
    }

    /// Skip the rest of a broken declaration.
    fn skip_broken_decl(&mut self, depth: usize) {
        while self.source_stack.len() > depth {
            self.pop_source();
        }
        let content = self.source.content_bytes();
        let mut quote = 0;
        let end = find_unquoted_gt(content, 0, &mut quote).map_or(content.len(), |i| i + 1);
        self.source.advance(end);
    }

    /// Skip white spaces in a DTD, expanding parameter entity references and closing
    /// exhausted parameter entities.
    ///
    /// Returns `true` if any white space was skipped.
    ///
    /// ```text
    /// [28a] DeclSep ::= PEReference | S
    /// ```
    pub(crate) fn skip_whitespaces_in_dtd(&mut self, in_markup: bool) -> Result<bool, XMLError> {
        let mut skipped = false;
        loop {
            skipped |= self.skip_whitespaces() > 0;
            let content = self.source.content_str();
            if content.is_empty() {
                if self.source.kind != SourceKind::ParameterEntity {
                    return Ok(skipped);
                }
                self.pop_entity_source()?;
                continue;
            }
            let is_reference = content.starts_with('%')
                && content[1..]
                    .chars()
                    .next()
                    .is_some_and(|c| self.is_name_start_char(c));
            if !is_reference {
                return Ok(skipped);
            }
            if in_markup && !self.in_external_markup() {
                fatal_error!(
                    self,
                    ParserPEReferenceInInternalSubset,
                    "Parameter entity references are not allowed within markup declarations in the internal subset."
                );
                return Err(XMLError::ParserPEReferenceInInternalSubset);
            }
            self.reference_parameter_entity(true)?;
        }
    }

    /// Report a fatal error if a markup declaration starts and ends in different entities.
    pub(crate) fn check_decl_nesting(&mut self, depth: usize, decl: &str) {
        if self.source_stack.len() != depth {
            fatal_error!(
                self,
                ParserEntityIncorrectNesting,
                "The {} declaration is not properly nested in a parameter entity.",
                decl
            );
        }
    }

    /// Check that every unparsed entity names a declared notation.
    fn check_unparsed_entity_notations(&mut self) {
        let mut missing = self
            .entities
            .iter()
            .filter_map(|(name, record)| match &record.decl {
                EntityDecl::ExternalGeneralUnparsedEntity { notation_name, .. }
                    if !self.notations.contains_key(notation_name) =>
                {
                    Some((name.to_owned(), notation_name.to_string()))
                }
                _ => None,
            })
            .collect::<Vec<_>>();
        missing.sort();
        for (name, notation_name) in missing {
            validity_error!(
                self,
                ParserUndeclaredNotation,
                "The notation '{}' of the unparsed entity '{}' is not declared.",
                notation_name,
                name
            );
        }
    }
}
