use crate::{
    error::XMLError,
    sax::{
        NotationDecl,
        error::{fatal_error, validity_error},
        handler::SAXHandler,
        parser::XMLReader,
    },
};

impl<H: SAXHandler> XMLReader<H> {
    /// ```text
    /// [82] NotationDecl ::= '<!NOTATION' S Name S (ExternalID | PublicID) S? '>'
    /// ```
    pub(crate) fn parse_notation_decl(&mut self) -> Result<(), XMLError> {
        let depth = self.source_stack.len();
        // skip '<!NOTATION'
        self.source.advance(10);
        if !self.skip_whitespaces_in_dtd(true)? {
            fatal_error!(self, ParserInvalidNotationDecl, "White spaces are required after '<!NOTATION'.");
            return Err(XMLError::ParserInvalidNotationDecl);
        }
        let mut name = String::new();
        self.parse_name(&mut name)?;
        if !self.skip_whitespaces_in_dtd(true)? {
            fatal_error!(
                self,
                ParserInvalidNotationDecl,
                "White spaces are required after the notation name '{}'.",
                name
            );
            return Err(XMLError::ParserInvalidNotationDecl);
        }
        let (system_id, public_id) = self.parse_external_id(true)?;
        self.skip_whitespaces_in_dtd(true)?;
        if self.source.next_char_if(|c| c == '>').is_none() {
            fatal_error!(
                self,
                ParserInvalidNotationDecl,
                "The notation declaration of '{}' is not closed by '>'.",
                name
            );
            return Err(XMLError::ParserInvalidNotationDecl);
        }
        self.check_decl_nesting(depth, "notation");

        if self.notations.contains_key(name.as_str()) {
            validity_error!(
                self,
                ParserDuplicateNotationDecl,
                "The notation '{}' is declared more than once.",
                name
            );
            return Ok(());
        }
        self.notations.insert(
            name.as_str().into(),
            NotationDecl {
                public_id: public_id.as_deref().map(Into::into),
                system_id: system_id.as_deref().map(Into::into),
            },
        );
        if !self.fatal_error_occurred {
            let system_id = system_id.as_deref().map(|id| self.reported_system_id(id));
            self.handler
                .notation_decl(&name, public_id.as_deref(), system_id.as_deref());
        }
        Ok(())
    }
}
