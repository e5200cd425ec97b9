use crate::{
    error::XMLError,
    sax::{
        error::{error, fatal_error},
        handler::SAXHandler,
        parser::XMLReader,
    },
};

impl<H: SAXHandler> XMLReader<H> {
    pub(crate) fn parse_quote(&mut self, code: XMLError) -> Result<char, XMLError> {
        match self.source.next_char_if(|c| c == '"' || c == '\'') {
            Some(quote) => Ok(quote),
            None => {
                fatal_error!(self, code.clone(), "A quoted literal is expected.");
                Err(code)
            }
        }
    }

    /// ```text
    /// [11] SystemLiteral ::= ('"' [^"]* '"') | ("'" [^']* "'")
    /// ```
    pub(crate) fn parse_system_literal(&mut self, buffer: &mut String) -> Result<(), XMLError> {
        let quote = self.parse_quote(XMLError::ParserInvalidSystemLiteral)?;
        let content = self.source.content_str();
        let Some(end) = content.find(quote) else {
            fatal_error!(self, ParserInvalidSystemLiteral, "The system literal is not closed.");
            return Err(XMLError::ParserInvalidSystemLiteral);
        };
        let literal = &content[..end];
        let illegal = literal.chars().find(|&c| !self.is_char(c));
        let fragment = literal.contains('#');
        buffer.push_str(literal);
        self.source.advance(end + 1);

        if let Some(c) = illegal {
            fatal_error!(
                self,
                ParserInvalidCharacter,
                "The character U+{:04X} is not allowed in XML documents.",
                c as u32
            );
        }
        if fragment {
            error!(
                self,
                ParserSystemLiteralWithFragment,
                "The system literal '{}' has a fragment identifier.",
                buffer
            );
        }
        Ok(())
    }

    /// White spaces in the literal are collapsed into one space, and leading and trailing
    /// ones are removed.
    ///
    /// ```text
    /// [12] PubidLiteral ::= '"' PubidChar* '"' | "'" (PubidChar - "'")* "'"
    /// ```
    pub(crate) fn parse_pubid_literal(&mut self, buffer: &mut String) -> Result<(), XMLError> {
        let quote = self.parse_quote(XMLError::ParserInvalidPubidLiteral)?;
        let content = self.source.content_str();
        let Some(end) = content.find(quote) else {
            fatal_error!(self, ParserInvalidPubidLiteral, "The public ID literal is not closed.");
            return Err(XMLError::ParserInvalidPubidLiteral);
        };
        let literal = &content[..end];
        if let Some(c) = literal.chars().find(|&c| !self.version.is_pubid_char(c)) {
            fatal_error!(
                self,
                ParserInvalidPubidLiteral,
                "The character '{}' is not allowed in public IDs.",
                c
            );
            return Err(XMLError::ParserInvalidPubidLiteral);
        }
        let mut words = literal.split_ascii_whitespace();
        if let Some(first) = words.next() {
            buffer.push_str(first);
            for word in words {
                buffer.push(' ');
                buffer.push_str(word);
            }
        }
        self.source.advance(end + 1);
        Ok(())
    }

    /// Parse an attribute value and normalize it as `CDATA`.
    ///
    /// References are substituted here, so `buffer` receives the normalized value.
    ///
    /// ```text
    /// [10] AttValue ::= '"' ([^<&"] | Reference)* '"' | "'" ([^<&'] | Reference)* "'"
    /// ```
    ///
    /// # Reference
    /// [3.3.3 Attribute-Value Normalization](https://www.w3.org/TR/xml/#AVNormalize)
    pub(crate) fn parse_att_value(&mut self, buffer: &mut String) -> Result<(), XMLError> {
        let quote = self.parse_quote(XMLError::ParserInvalidAttValue)?;
        self.parse_att_value_content(buffer, Some(quote))
    }

    /// Normalize the text of the current frame into `buffer`.
    ///
    /// If `quote` is `Some`, this reads an attribute value literal up to the closing quote.
    /// Otherwise, this reads the replacement text of an entity to its end.
    pub(crate) fn parse_att_value_content(
        &mut self,
        buffer: &mut String,
        quote: Option<char>,
    ) -> Result<(), XMLError> {
        let max = self.limits().max_text_length;
        let mut reported = false;
        loop {
            let Some(c) = self.source.peek_char() else {
                if quote.is_none() {
                    return Ok(());
                }
                fatal_error!(self, ParserUnexpectedEOF, "The attribute value is not closed.");
                return Err(XMLError::ParserUnexpectedEOF);
            };
            match c {
                c if Some(c) == quote => {
                    self.source.advance(1);
                    return Ok(());
                }
                '<' if quote.is_some() => {
                    fatal_error!(self, ParserInvalidAttValue, "'<' is not allowed in attribute values.");
                    return Err(XMLError::ParserInvalidAttValue);
                }
                '<' => {
                    fatal_error!(
                        self,
                        ParserMarkupInAttValue,
                        "The replacement text of an entity referenced in an attribute value must not contain '<'."
                    );
                    self.source.advance(1);
                }
                '&' if self.source.content_bytes().get(1) == Some(&b'#') => {
                    if let Some(c) = self.parse_char_ref() {
                        buffer.push(c);
                    }
                }
                '&' => {
                    let name = self.parse_entity_ref_name()?;
                    self.substitute_entity_in_att_value(&name, buffer)?;
                }
                '\r' if quote.is_some() => {
                    self.source.advance(1);
                    self.source.next_char_if(|c| c == '\n');
                    buffer.push(' ');
                }
                '\r' | '\n' | '\t' => {
                    self.source.advance(1);
                    buffer.push(' ');
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
                fatal_error!(self, ParserTooLongText, "The attribute value is longer than {} bytes.", max);
                return Err(XMLError::ParserTooLongText);
            }
        }
    }

    /// ```text
    /// [75] ExternalID ::= 'SYSTEM' S SystemLiteral | 'PUBLIC' S PubidLiteral S SystemLiteral
    /// [83] PublicID   ::= 'PUBLIC' S PubidLiteral
    /// ```
    ///
    /// Returns `(system_id, public_id)`. If `public_only` is `true`, the system literal after
    /// a public ID may be omitted, as in notation declarations.
    pub(crate) fn parse_external_id(
        &mut self,
        public_only: bool,
    ) -> Result<(Option<String>, Option<String>), XMLError> {
        if self.consume_keyword("SYSTEM") {
            if !self.skip_whitespaces_in_dtd(true)? {
                fatal_error!(self, ParserInvalidExternalID, "White spaces are required after 'SYSTEM'.");
                return Err(XMLError::ParserInvalidExternalID);
            }
            let mut system_id = String::new();
            self.parse_system_literal(&mut system_id)?;
            return Ok((Some(system_id), None));
        }
        if !self.consume_keyword("PUBLIC") {
            fatal_error!(self, ParserInvalidExternalID, "'SYSTEM' or 'PUBLIC' is expected.");
            return Err(XMLError::ParserInvalidExternalID);
        }
        if !self.skip_whitespaces_in_dtd(true)? {
            fatal_error!(self, ParserInvalidExternalID, "White spaces are required after 'PUBLIC'.");
            return Err(XMLError::ParserInvalidExternalID);
        }
        let mut public_id = String::new();
        self.parse_pubid_literal(&mut public_id)?;

        let s = self.skip_whitespaces_in_dtd(true)?;
        let quoted = matches!(self.source.peek_char(), Some('"' | '\''));
        if public_only && !quoted {
            return Ok((None, Some(public_id)));
        }
        if !s {
            fatal_error!(self, ParserInvalidExternalID, "White spaces are required after the public ID.");
            return Err(XMLError::ParserInvalidExternalID);
        }
        let mut system_id = String::new();
        self.parse_system_literal(&mut system_id)?;
        Ok((Some(system_id), Some(public_id)))
    }
}

/// Normalize an attribute value of a tokenized type.
///
/// `value` must already be normalized as `CDATA`, so it has no white spaces other than
/// `#x20`.
pub(crate) fn normalize_tokenized(value: &str) -> String {
    value.split(' ').filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenized_normalization() {
        assert_eq!(normalize_tokenized("  a  b c "), "a b c");
        assert_eq!(normalize_tokenized(""), "");
    }
}
