use crate::{
    error::XMLError,
    parse::normalize_line_ends,
    sax::{error::fatal_error, handler::SAXHandler, parser::XMLReader},
};

impl<H: SAXHandler> XMLReader<H> {
    /// ```text
    /// [18] CDSect  ::= CDStart CData CDEnd
    /// [19] CDStart ::= '<![CDATA['
    /// [20] CData   ::= (Char* - (Char* ']]>' Char*))
    /// [21] CDEnd   ::= ']]>'
    /// ```
    pub(crate) fn parse_cdsect(&mut self) -> Result<(), XMLError> {
        // skip '<![CDATA['
        self.source.advance(9);
        let content = self.source.content_str();
        let Some(end) = content.find("]]>") else {
            fatal_error!(self, ParserUnexpectedEOF, "The CDATA section is not closed.");
            return Err(XMLError::ParserUnexpectedEOF);
        };
        let body = &content[..end];
        let illegal = body.chars().find(|&c| !self.is_char(c));
        let data = normalize_line_ends(body).into_owned();
        self.source.advance(end + 3);

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
            fatal_error!(self, ParserTooLongText, "The CDATA section is longer than {} bytes.", max);
            return Err(XMLError::ParserTooLongText);
        }
        if !self.fatal_error_occurred {
            self.handler.start_cdata();
            self.report_characters(&data);
            self.handler.end_cdata();
        }
        Ok(())
    }
}
