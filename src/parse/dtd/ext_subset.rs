use crate::{
    error::XMLError,
    sax::{
        error::{fatal_error, warning},
        handler::SAXHandler,
        parser::XMLReader,
        source::SourceKind,
    },
};

impl<H: SAXHandler> XMLReader<H> {
    /// Load the external subset through the entity resolver and parse it.
    ///
    /// If the document type declaration has no external ID, the resolver may still
    /// provide one through [`EntityResolver::get_external_subset`](crate::sax::handler::EntityResolver::get_external_subset).
    ///
    /// ```text
    /// [30] extSubset ::= TextDecl? extSubsetDecl
    /// ```
    pub(crate) fn load_external_subset(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<(), XMLError> {
        let base_uri = self
            .source
            .base_uri
            .clone()
            .or_else(|| self.base_uri.clone());
        let source = match system_id {
            Some(system_id) => {
                self.handler
                    .resolve_entity("[dtd]", public_id, base_uri.as_deref(), system_id)
            }
            None => self.handler.get_external_subset(name, base_uri.as_deref()),
        };
        let source = match source {
            Ok(source) => source,
            Err(err) => {
                log::debug!("failed to load the external subset {system_id:?}: {err}");
                if let Some(system_id) = system_id {
                    warning!(
                        self,
                        ParserEntityNotFound,
                        "The external subset '{}' cannot be loaded.",
                        system_id
                    );
                }
                return Ok(());
            }
        };

        self.has_external_subset = true;
        let depth = self.source_stack.len();
        self.push_external_source(
            source,
            "[dtd]".into(),
            SourceKind::ExternalSubset,
            base_uri.as_deref(),
            system_id.unwrap_or_default(),
        )?;
        let result = self
            .parse_text_decl_if_present()
            .and_then(|_| self.parse_subset_decls(false));
        while self.source_stack.len() > depth {
            self.pop_source();
        }
        result
    }

    /// Parse the beginning of a conditional section.
    ///
    /// The contents of an `INCLUDE` section are parsed as usual, and `includes` counts the
    /// sections waiting for their `']]>'`. An `IGNORE` section is skipped at once.
    ///
    /// ```text
    /// [61] conditionalSect ::= includeSect | ignoreSect
    /// [62] includeSect     ::= '<![' S? 'INCLUDE' S? '[' extSubsetDecl ']]>'
    /// [63] ignoreSect      ::= '<![' S? 'IGNORE' S? '[' ignoreSectContents* ']]>'
    /// ```
    pub(crate) fn parse_conditional_sect(&mut self, includes: &mut usize) -> Result<(), XMLError> {
        if !self.in_external_markup() {
            fatal_error!(
                self,
                ParserInvalidConditionalSect,
                "Conditional sections are not allowed in the internal subset."
            );
            return Err(XMLError::ParserInvalidConditionalSect);
        }
        // skip '<!['
        self.source.advance(3);
        self.skip_whitespaces_in_dtd(true)?;
        let include = if self.consume_keyword("INCLUDE") {
            true
        } else if self.consume_keyword("IGNORE") {
            false
        } else {
            fatal_error!(
                self,
                ParserInvalidConditionalSect,
                "'INCLUDE' or 'IGNORE' is expected."
            );
            return Err(XMLError::ParserInvalidConditionalSect);
        };
        self.skip_whitespaces_in_dtd(true)?;
        if self.source.next_char_if(|c| c == '[').is_none() {
            fatal_error!(
                self,
                ParserInvalidConditionalSect,
                "'[' is expected after the keyword of the conditional section."
            );
            return Err(XMLError::ParserInvalidConditionalSect);
        }
        if include {
            *includes += 1;
            Ok(())
        } else {
            self.skip_ignore_sect()
        }
    }

    /// ```text
    /// [64] ignoreSectContents ::= Ignore ('<![' ignoreSectContents ']]>' Ignore)*
    /// [65] Ignore             ::= Char* - (Char* ('<![' | ']]>') Char*)
    /// ```
    fn skip_ignore_sect(&mut self) -> Result<(), XMLError> {
        let content = self.source.content_bytes();
        let mut depth = 1;
        let mut i = 0;
        while i < content.len() {
            if content[i..].starts_with(b"<![") {
                depth += 1;
                i += 3;
            } else if content[i..].starts_with(b"]]>") {
                depth -= 1;
                i += 3;
                if depth == 0 {
                    self.source.advance(i);
                    return Ok(());
                }
            } else {
                i += 1;
            }
        }
        fatal_error!(self, ParserInvalidConditionalSect, "The IGNORE section is not closed.");
        Err(XMLError::ParserInvalidConditionalSect)
    }
}
