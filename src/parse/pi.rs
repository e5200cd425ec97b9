use crate::{
    error::XMLError,
    parse::normalize_line_ends,
    sax::{
        error::{fatal_error, ns_error},
        handler::SAXHandler,
        parser::{ParserOption, XMLReader},
    },
};

impl<H: SAXHandler> XMLReader<H> {
    /// ```text
    /// [16] PI       ::= '<?' PITarget (S (Char* - (Char* '?>' Char*)))? '?>'
    /// [17] PITarget ::= Name - (('X' | 'x') ('M' | 'm') ('L' | 'l'))
    /// ```
    pub(crate) fn parse_pi(&mut self) -> Result<(), XMLError> {
        // skip '<?'
        self.source.advance(2);
        let mut target = String::new();
        self.parse_name(&mut target)?;
        if target.eq_ignore_ascii_case("xml") {
            fatal_error!(
                self,
                ParserUnacceptablePITarget,
                "The PI target '{}' is reserved.",
                target
            );
        } else if self.config.is_enable(ParserOption::Namespaces) && target.contains(':') {
            ns_error!(
                self,
                ParserInvalidProcessingInstruction,
                "The PI target '{}' must not contain ':'.",
                target
            );
        }

        let s = self.skip_whitespaces();
        let content = self.source.content_str();
        let Some(end) = content.find("?>") else {
            fatal_error!(self, ParserUnexpectedEOF, "The processing instruction is not closed.");
            return Err(XMLError::ParserUnexpectedEOF);
        };
        if s == 0 && end > 0 {
            fatal_error!(
                self,
                ParserInvalidProcessingInstruction,
                "White spaces are required between the PI target and data."
            );
            return Err(XMLError::ParserInvalidProcessingInstruction);
        }
        let body = &content[..end];
        let illegal = body.chars().find(|&c| !self.is_char(c));
        let data = (!body.is_empty()).then(|| normalize_line_ends(body).into_owned());
        self.source.advance(end + 2);

        if let Some(c) = illegal {
            fatal_error!(
                self,
                ParserInvalidCharacter,
                "The character U+{:04X} is not allowed in XML documents.",
                c as u32
            );
        }
        let max = self.limits().max_text_length;
        if data.as_ref().is_some_and(|data| data.len() > max) {
            fatal_error!(
                self,
                ParserTooLongText,
                "The processing instruction is longer than {} bytes.",
                max
            );
            return Err(XMLError::ParserTooLongText);
        }
        if !self.fatal_error_occurred {
            self.handler.processing_instruction(&target, data.as_deref());
        }
        Ok(())
    }
}
