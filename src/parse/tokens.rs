use crate::{
    chars,
    error::XMLError,
    sax::{
        error::{fatal_error, ns_error},
        handler::SAXHandler,
        parser::{ParserOption, XMLReader},
    },
};

impl<H: SAXHandler> XMLReader<H> {
    pub(crate) fn is_char(&self, c: char) -> bool {
        self.version.is_char(c)
    }

    pub(crate) fn is_name_start_char(&self, c: char) -> bool {
        if self.config.is_enable(ParserOption::FourthEditionNames) {
            chars::is_name_start_char(c)
        } else {
            self.version.is_name_start_char(c)
        }
    }

    pub(crate) fn is_name_char(&self, c: char) -> bool {
        if self.config.is_enable(ParserOption::FourthEditionNames) {
            chars::is_name_char(c)
        } else {
            self.version.is_name_char(c)
        }
    }

    pub(crate) fn is_whitespace(&self, c: char) -> bool {
        self.version.is_whitespace(c)
    }

    /// Skip white spaces in the current frame and return how many bytes were skipped.
    pub(crate) fn skip_whitespaces(&mut self) -> usize {
        let len = self
            .source
            .content_bytes()
            .iter()
            .take_while(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
            .count();
        self.source.advance(len);
        len
    }

    /// The length of the longest prefix of the content that matches `Name`
    /// (or `Nmtoken` if `start` is `false`).
    fn name_length(&self, start: bool) -> usize {
        let content = self.source.content_str();
        let mut len = 0;
        for (i, c) in content.char_indices() {
            let accept = match c {
                // fast path for the usual delimiters
                ' ' | '\t' | '\r' | '\n' | '>' | '/' | '=' | '"' | '\'' | ';' | '<' | '&' => false,
                'a'..='z' | 'A'..='Z' | '_' | ':' => true,
                c if i == 0 && start => self.is_name_start_char(c),
                c => self.is_name_char(c),
            };
            if !accept {
                break;
            }
            len = i + c.len_utf8();
        }
        len
    }

    fn take_name(&mut self, len: usize, buffer: &mut String) -> Result<(), XMLError> {
        let max = self.limits().max_name_length;
        if len > max {
            fatal_error!(self, ParserTooLongName, "The name is longer than {} bytes.", max);
            return Err(XMLError::ParserTooLongName);
        }
        buffer.push_str(&self.source.content_str()[..len]);
        self.source.advance(len);
        Ok(())
    }

    /// ```text
    /// [5] Name ::= NameStartChar (NameChar)*
    /// ```
    pub(crate) fn parse_name(&mut self, buffer: &mut String) -> Result<(), XMLError> {
        let len = self.name_length(true);
        if len == 0 {
            return match self.source.peek_char() {
                Some(c) if self.is_name_char(c) => {
                    fatal_error!(
                        self,
                        ParserInvalidNameStartChar,
                        "The character '{}' cannot start a name.",
                        c
                    );
                    Err(XMLError::ParserInvalidNameStartChar)
                }
                _ => {
                    fatal_error!(self, ParserEmptyName, "A name is expected.");
                    Err(XMLError::ParserEmptyName)
                }
            };
        }
        self.take_name(len, buffer)
    }

    /// ```text
    /// [7] Nmtoken ::= (NameChar)+
    /// ```
    pub(crate) fn parse_nmtoken(&mut self, buffer: &mut String) -> Result<(), XMLError> {
        let len = self.name_length(false);
        if len == 0 {
            fatal_error!(self, ParserEmptyNmtoken, "A name token is expected.");
            return Err(XMLError::ParserEmptyNmtoken);
        }
        self.take_name(len, buffer)
    }

    /// Parse a `Name` and check that it is also a `QName` if namespaces are processed.
    ///
    /// Returns the length of the prefix, or 0 if the name has no prefix or is not a `QName`.
    ///
    /// ```text
    /// [7] QName ::= PrefixedName | UnprefixedName
    /// ```
    pub(crate) fn parse_qname(&mut self, buffer: &mut String) -> Result<usize, XMLError> {
        let orig = buffer.len();
        self.parse_name(buffer)?;
        if !self.config.is_enable(ParserOption::Namespaces) {
            return Ok(0);
        }
        let name = &buffer[orig..];
        if !self.version.validate_qname(name) {
            ns_error!(
                self,
                ParserInvalidQNameSeparator,
                "'{}' is not a qualified name.",
                name
            );
            return Ok(0);
        }
        Ok(name.find(':').unwrap_or(0))
    }

    /// Consume `keyword` if the content starts with it.
    pub(crate) fn consume_keyword(&mut self, keyword: &str) -> bool {
        if self.source.content_bytes().starts_with(keyword.as_bytes()) {
            self.source.advance(keyword.len());
            true
        } else {
            false
        }
    }

    /// ```text
    /// [25] Eq ::= S? '=' S?
    /// ```
    pub(crate) fn parse_eq(&mut self) -> Result<(), XMLError> {
        self.skip_whitespaces();
        if self.source.next_char_if(|c| c == '=').is_none() {
            fatal_error!(self, ParserInvalidCharacter, "'=' is expected.");
            return Err(XMLError::ParserInvalidCharacter);
        }
        self.skip_whitespaces();
        Ok(())
    }
}
