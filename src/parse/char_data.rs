use crate::{
    error::XMLError,
    parse::normalize_line_ends,
    sax::{error::fatal_error, handler::SAXHandler, parser::XMLReader, predefined_entity_char},
};

impl<H: SAXHandler> XMLReader<H> {
    /// Parse a run of character data that is `end` bytes long.
    ///
    /// The run may contain character references and references to predefined entities,
    /// and they are substituted here. The whole run is delivered as one piece of text.
    ///
    /// ```text
    /// [14] CharData ::= [^<&]* - ([^<&]* ']]>' [^<&]*)
    /// ```
    pub(crate) fn parse_char_data(&mut self, end: usize) -> Result<(), XMLError> {
        let max = self.limits().max_text_length;
        let start = self.source.position();
        let mut buffer = String::new();
        let mut illegal_reported = false;
        loop {
            let consumed = (self.source.position() - start) as usize;
            if consumed >= end {
                break;
            }
            let rest = &self.source.content_str()[..end - consumed];
            let literal_len = rest.find('&').unwrap_or(rest.len());

            if literal_len > 0 {
                let literal = &rest[..literal_len];
                let has_cdata_end = literal.contains("]]>");
                let illegal = literal.chars().find(|&c| !self.is_char(c));
                buffer.push_str(&normalize_line_ends(literal));
                self.source.advance(literal_len);

                if has_cdata_end {
                    fatal_error!(
                        self,
                        ParserUnacceptablePatternInCharData,
                        "']]>' is not allowed in character data."
                    );
                }
                if let Some(c) = illegal
                    && !illegal_reported
                {
                    fatal_error!(
                        self,
                        ParserInvalidCharacter,
                        "The character U+{:04X} is not allowed in XML documents.",
                        c as u32
                    );
                    illegal_reported = true;
                }
            } else if rest.as_bytes().get(1) == Some(&b'#') {
                if let Some(c) = self.parse_char_ref() {
                    buffer.push(c);
                }
            } else {
                // predefined entities are the only references included in a run
                let Some((c, semi)) = rest
                    .find(';')
                    .and_then(|semi| predefined_entity_char(&rest[1..semi]).map(|c| (c, semi)))
                else {
                    return Err(XMLError::InternalError);
                };
                self.source.advance(semi + 1);
                buffer.push(c);
            }

            if buffer.len() > max {
                fatal_error!(self, ParserTooLongText, "The character data is longer than {} bytes.", max);
                return Err(XMLError::ParserTooLongText);
            }
        }
        self.report_characters(&buffer);
        Ok(())
    }
}
