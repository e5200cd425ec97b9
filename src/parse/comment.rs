use crate::{
    error::XMLError,
    parse::normalize_line_ends,
    sax::{error::fatal_error, handler::SAXHandler, parser::XMLReader},
};

impl<H: SAXHandler> XMLReader<H> {
    /// ```text
    /// [15] Comment ::= '<!--' ((Char - '-') | ('-' (Char - '-')))* '-->'
    /// ```
    pub(crate) fn parse_comment(&mut self) -> Result<(), XMLError> {
        // skip '<!--'
        self.source.advance(4);
        let content = self.source.content_str();
        let Some(end) = content.find("-->") else {
            fatal_error!(self, ParserUnexpectedEOF, "The comment is not closed.");
            return Err(XMLError::ParserUnexpectedEOF);
        };
        let body = &content[..end];
        let double_hyphen = body.contains("--") || body.ends_with('-');
        let illegal = body.chars().find(|&c| !self.is_char(c));
        let data = normalize_line_ends(body).into_owned();
        self.source.advance(end + 3);

        if double_hyphen {
            fatal_error!(
                self,
                ParserInvalidComment,
                "'--' is not allowed in comments except for the delimiter."
            );
        }
        if let Some(c) = illegal {
            fatal_error!(
                self,
                ParserInvalidCharacter,
                "The character U+{:04X} is not allowed in XML documents.",
                c as u32
            );
        }
        let max = self.limits().max_text_length;
        if data.len() > max {
            fatal_error!(self, ParserTooLongText, "The comment is longer than {} bytes.", max);
            return Err(XMLError::ParserTooLongText);
        }
        if !self.fatal_error_occurred {
            self.handler.comment(&data);
        }
        Ok(())
    }
}
