use crate::{
    error::XMLError,
    sax::{
        contentspec::{ContentSpec, ElementContent, Occurrence},
        error::{fatal_error, validity_error},
        handler::SAXHandler,
        parser::XMLReader,
    },
};

impl<H: SAXHandler> XMLReader<H> {
    /// ```text
    /// [45] elementdecl ::= '<!ELEMENT' S Name S contentspec S? '>'
    /// [46] contentspec ::= 'EMPTY' | 'ANY' | Mixed | children
    /// ```
    pub(crate) fn parse_element_decl(&mut self) -> Result<(), XMLError> {
        let depth = self.source_stack.len();
        // skip '<!ELEMENT'
        self.source.advance(9);
        if !self.skip_whitespaces_in_dtd(true)? {
            fatal_error!(self, ParserInvalidElementDecl, "White spaces are required after '<!ELEMENT'.");
            return Err(XMLError::ParserInvalidElementDecl);
        }
        let mut name = String::new();
        self.parse_qname(&mut name)?;
        if !self.skip_whitespaces_in_dtd(true)? {
            fatal_error!(
                self,
                ParserInvalidElementDecl,
                "White spaces are required after the element type name '{}'.",
                name
            );
            return Err(XMLError::ParserInvalidElementDecl);
        }

        let contentspec = if self.consume_keyword("EMPTY") {
            ContentSpec::EMPTY
        } else if self.consume_keyword("ANY") {
            ContentSpec::ANY
        } else if self.source.next_char_if(|c| c == '(').is_some() {
            self.skip_whitespaces_in_dtd(true)?;
            if self.consume_keyword("#PCDATA") {
                self.parse_mixed()?
            } else {
                let mut model = ElementContent::new();
                let id = self.parse_choice_or_seq(&mut model, 1)?;
                self.parse_occurrence(&mut model, id);
                ContentSpec::Children(model)
            }
        } else {
            fatal_error!(
                self,
                ParserInvalidElementDecl,
                "The content specification of '{}' is malformed.",
                name
            );
            return Err(XMLError::ParserInvalidElementDecl);
        };

        self.skip_whitespaces_in_dtd(true)?;
        if self.source.next_char_if(|c| c == '>').is_none() {
            fatal_error!(
                self,
                ParserInvalidElementDecl,
                "The element type declaration of '{}' is not closed by '>'.",
                name
            );
            return Err(XMLError::ParserInvalidElementDecl);
        }
        self.check_decl_nesting(depth, "element type");

        if self.elementdecls.insert(name.as_str(), contentspec.clone()).is_err() {
            validity_error!(
                self,
                ParserDuplicateElementDecl,
                "The element type '{}' is declared more than once.",
                name
            );
        } else if !self.fatal_error_occurred {
            self.handler.element_decl(&name, &contentspec);
        }
        Ok(())
    }

    /// `'(' S? '#PCDATA'` has already been read.
    ///
    /// ```text
    /// [51] Mixed ::= '(' S? '#PCDATA' (S? '|' S? Name)* S? ')*' | '(' S? '#PCDATA' S? ')'
    /// ```
    fn parse_mixed(&mut self) -> Result<ContentSpec, XMLError> {
        let mut names: Vec<Box<str>> = vec![];
        loop {
            self.skip_whitespaces_in_dtd(true)?;
            match self.source.next_char() {
                Some('|') => {
                    self.skip_whitespaces_in_dtd(true)?;
                    let mut name = String::new();
                    self.parse_qname(&mut name)?;
                    if names.iter().any(|n| n.as_ref() == name) {
                        validity_error!(
                            self,
                            ParserDuplicateMixedContent,
                            "'{}' appears more than once in the mixed content.",
                            name
                        );
                    } else {
                        names.push(name.into());
                    }
                }
                Some(')') => break,
                _ => {
                    fatal_error!(self, ParserInvalidElementDecl, "The mixed content declaration is malformed.");
                    return Err(XMLError::ParserInvalidElementDecl);
                }
            }
        }
        let repeated = self.source.next_char_if(|c| c == '*').is_some();
        if !names.is_empty() && !repeated {
            fatal_error!(
                self,
                ParserInvalidElementDecl,
                "The mixed content with element types must end with ')*'."
            );
            return Err(XMLError::ParserInvalidElementDecl);
        }
        Ok(ContentSpec::Mixed(names))
    }

    /// `'('` has already been read. `depth` is the nesting level of the group.
    ///
    /// ```text
    /// [49] choice ::= '(' S? cp ( S? '|' S? cp )+ S? ')'
    /// [50] seq    ::= '(' S? cp ( S? ',' S? cp )* S? ')'
    /// ```
    fn parse_choice_or_seq(
        &mut self,
        model: &mut ElementContent,
        depth: usize,
    ) -> Result<usize, XMLError> {
        let max = self.limits().max_content_model_depth;
        if depth > max {
            log::warn!("content model nesting depth exceeds {max}");
            fatal_error!(
                self,
                ParserTooDeepContentModel,
                "The content model is nested too deeply. The maximum depth is {}.",
                max
            );
            return Err(XMLError::ParserTooDeepContentModel);
        }

        let mut children = vec![];
        let mut separator = None;
        loop {
            self.skip_whitespaces_in_dtd(true)?;
            children.push(self.parse_cp(model, depth)?);
            self.skip_whitespaces_in_dtd(true)?;
            match self.source.next_char() {
                Some(')') => break,
                Some(c @ (',' | '|')) if separator.is_none_or(|s| s == c) => separator = Some(c),
                Some(',' | '|') => {
                    fatal_error!(
                        self,
                        ParserInvalidElementDecl,
                        "',' and '|' must not be mixed in one group."
                    );
                    return Err(XMLError::ParserInvalidElementDecl);
                }
                _ => {
                    fatal_error!(self, ParserInvalidElementDecl, "The content model is malformed.");
                    return Err(XMLError::ParserInvalidElementDecl);
                }
            }
        }
        Ok(match separator {
            Some('|') => model.create_choice(children),
            _ => model.create_sequence(children),
        })
    }

    /// ```text
    /// [48] cp ::= (Name | choice | seq) ('?' | '*' | '+')?
    /// ```
    fn parse_cp(&mut self, model: &mut ElementContent, depth: usize) -> Result<usize, XMLError> {
        let id = if self.source.next_char_if(|c| c == '(').is_some() {
            self.parse_choice_or_seq(model, depth + 1)?
        } else {
            let mut name = String::new();
            self.parse_qname(&mut name)?;
            model.create_name(name)
        };
        Ok(self.parse_occurrence(model, id))
    }

    fn parse_occurrence(&mut self, model: &mut ElementContent, id: usize) -> usize {
        match self
            .source
            .content_bytes()
            .first()
            .and_then(|&b| Occurrence::from_byte(b))
        {
            Some(occurrence) => {
                self.source.advance(1);
                model.create_repeat(id, occurrence)
            }
            None => id,
        }
    }
}
