use crate::{
    error::XMLError,
    parse::literals::normalize_tokenized,
    sax::{
        AttributeType, DefaultDecl,
        error::{fatal_error, validity_error, warning},
        handler::SAXHandler,
        parser::XMLReader,
    },
};

impl<H: SAXHandler> XMLReader<H> {
    /// ```text
    /// [52] AttlistDecl ::= '<!ATTLIST' S Name AttDef* S? '>'
    /// ```
    pub(crate) fn parse_attlist_decl(&mut self) -> Result<(), XMLError> {
        let depth = self.source_stack.len();
        // skip '<!ATTLIST'
        self.source.advance(9);
        if !self.skip_whitespaces_in_dtd(true)? {
            fatal_error!(self, ParserInvalidAttlistDecl, "White spaces are required after '<!ATTLIST'.");
            return Err(XMLError::ParserInvalidAttlistDecl);
        }
        let mut element = String::new();
        self.parse_qname(&mut element)?;

        // nothing is registered unless the whole declaration is well-formed
        let mut definitions = vec![];
        loop {
            let s = self.skip_whitespaces_in_dtd(true)?;
            if self.source.next_char_if(|c| c == '>').is_some() {
                break;
            }
            if !s {
                fatal_error!(
                    self,
                    ParserInvalidAttlistDecl,
                    "The attribute-list declaration of '{}' is malformed.",
                    element
                );
                return Err(XMLError::ParserInvalidAttlistDecl);
            }
            definitions.push(self.parse_att_def()?);
        }
        self.check_decl_nesting(depth, "attribute-list");

        let is_external_markup = self.in_external_markup();
        for (name, attribute_type, default_decl) in definitions {
            if self.attlistdecls.insert(
                &element,
                &name,
                attribute_type.clone(),
                default_decl.clone(),
                is_external_markup,
            ) {
                if !self.fatal_error_occurred {
                    self.handler
                        .attribute_decl(&element, &name, &attribute_type, &default_decl);
                }
            } else {
                warning!(
                    self,
                    ParserDuplicateAttlistDecl,
                    "The attribute '{}' of the element type '{}' is already declared.",
                    name,
                    element
                );
            }
        }
        Ok(())
    }

    /// ```text
    /// [53] AttDef ::= S Name S AttType S DefaultDecl
    /// ```
    fn parse_att_def(&mut self) -> Result<(String, AttributeType, DefaultDecl), XMLError> {
        let mut name = String::new();
        self.parse_qname(&mut name)?;
        if !self.skip_whitespaces_in_dtd(true)? {
            fatal_error!(
                self,
                ParserInvalidAttlistDecl,
                "White spaces are required after the attribute name '{}'.",
                name
            );
            return Err(XMLError::ParserInvalidAttlistDecl);
        }
        let attribute_type = self.parse_att_type()?;
        if !self.skip_whitespaces_in_dtd(true)? {
            fatal_error!(
                self,
                ParserInvalidAttlistDecl,
                "White spaces are required after the type of the attribute '{}'.",
                name
            );
            return Err(XMLError::ParserInvalidAttlistDecl);
        }
        let default_decl = self.parse_default_decl(&attribute_type)?;
        Ok((name, attribute_type, default_decl))
    }

    /// ```text
    /// [54] AttType        ::= StringType | TokenizedType | EnumeratedType
    /// [55] StringType     ::= 'CDATA'
    /// [56] TokenizedType  ::= 'ID' | 'IDREF' | 'IDREFS' | 'ENTITY' | 'ENTITIES' | 'NMTOKEN' | 'NMTOKENS'
    /// [57] EnumeratedType ::= NotationType | Enumeration
    /// [58] NotationType   ::= 'NOTATION' S '(' S? Name (S? '|' S? Name)* S? ')'
    /// [59] Enumeration    ::= '(' S? Nmtoken (S? '|' S? Nmtoken)* S? ')'
    /// ```
    fn parse_att_type(&mut self) -> Result<AttributeType, XMLError> {
        // longer keywords first
        let keywords = [
            ("CDATA", AttributeType::CDATA),
            ("IDREFS", AttributeType::IDREFS),
            ("IDREF", AttributeType::IDREF),
            ("ID", AttributeType::ID),
            ("ENTITIES", AttributeType::ENTITIES),
            ("ENTITY", AttributeType::ENTITY),
            ("NMTOKENS", AttributeType::NMTOKENS),
            ("NMTOKEN", AttributeType::NMTOKEN),
        ];
        for (keyword, attribute_type) in keywords {
            if self.consume_keyword(keyword) {
                return Ok(attribute_type);
            }
        }
        if self.consume_keyword("NOTATION") {
            if !self.skip_whitespaces_in_dtd(true)? {
                fatal_error!(self, ParserInvalidAttlistDecl, "White spaces are required after 'NOTATION'.");
                return Err(XMLError::ParserInvalidAttlistDecl);
            }
            return Ok(AttributeType::NOTATION(self.parse_enumerated_list(true)?));
        }
        if self.source.peek_char() == Some('(') {
            return Ok(AttributeType::Enumeration(self.parse_enumerated_list(false)?));
        }
        fatal_error!(self, ParserInvalidAttlistDecl, "The attribute type is malformed.");
        Err(XMLError::ParserInvalidAttlistDecl)
    }

    fn parse_enumerated_list(&mut self, notation: bool) -> Result<Vec<Box<str>>, XMLError> {
        if self.source.next_char_if(|c| c == '(').is_none() {
            fatal_error!(self, ParserInvalidAttlistDecl, "'(' is expected.");
            return Err(XMLError::ParserInvalidAttlistDecl);
        }
        let mut tokens: Vec<Box<str>> = vec![];
        loop {
            self.skip_whitespaces_in_dtd(true)?;
            let mut token = String::new();
            if notation {
                self.parse_name(&mut token)?;
            } else {
                self.parse_nmtoken(&mut token)?;
            }
            if tokens.iter().any(|t| t.as_ref() == token) {
                validity_error!(
                    self,
                    ParserDuplicateTokensInAttlistDecl,
                    "The token '{}' appears more than once in one declaration.",
                    token
                );
            } else {
                tokens.push(token.into());
            }
            self.skip_whitespaces_in_dtd(true)?;
            match self.source.next_char() {
                Some('|') => {}
                Some(')') => return Ok(tokens),
                _ => {
                    fatal_error!(self, ParserInvalidAttlistDecl, "The enumerated type is malformed.");
                    return Err(XMLError::ParserInvalidAttlistDecl);
                }
            }
        }
    }

    /// ```text
    /// [60] DefaultDecl ::= '#REQUIRED' | '#IMPLIED' | (('#FIXED' S)? AttValue)
    /// ```
    fn parse_default_decl(&mut self, attribute_type: &AttributeType) -> Result<DefaultDecl, XMLError> {
        if self.consume_keyword("#REQUIRED") {
            return Ok(DefaultDecl::REQUIRED);
        }
        if self.consume_keyword("#IMPLIED") {
            return Ok(DefaultDecl::IMPLIED);
        }
        let fixed = self.consume_keyword("#FIXED");
        if fixed && !self.skip_whitespaces_in_dtd(true)? {
            fatal_error!(self, ParserInvalidAttlistDecl, "White spaces are required after '#FIXED'.");
            return Err(XMLError::ParserInvalidAttlistDecl);
        }
        let mut value = String::new();
        self.parse_att_value(&mut value)?;
        if attribute_type.is_tokenized() {
            value = normalize_tokenized(&value);
        }
        Ok(if fixed {
            DefaultDecl::FIXED(value.into())
        } else {
            DefaultDecl::None(value.into())
        })
    }
}
