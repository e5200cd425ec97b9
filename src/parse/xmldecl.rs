use crate::{
    ENCODING_NAME_LIMIT_LENGTH, XML_VERSION_NUM_LIMIT_LENGTH,
    encoding::{UTF8_NAME, find_decoder, is_utf16_name},
    error::XMLError,
    sax::{
        error::{fatal_error, warning},
        handler::SAXHandler,
        parser::XMLReader,
        source::EncodingFamily,
    },
};

impl<H: SAXHandler> XMLReader<H> {
    /// ```text
    /// [23] XMLDecl ::= '<?xml' VersionInfo EncodingDecl? SDDecl? S? '?>'
    /// ```
    pub(crate) fn parse_xml_decl(&mut self) -> Result<(), XMLError> {
        // skip '<?xml'
        self.source.advance(5);
        let version = self.parse_version_info()?;

        let mut s = self.skip_whitespaces() > 0;
        let mut encoding = None;
        if self.source.content_bytes().starts_with(b"encoding") {
            if !s {
                fatal_error!(
                    self,
                    ParserInvalidXMLDecl,
                    "White spaces are required before 'encoding'."
                );
            }
            encoding = Some(self.parse_encoding_decl()?);
            s = self.skip_whitespaces() > 0;
        }

        let mut standalone = None;
        if self.source.content_bytes().starts_with(b"standalone") {
            if !s {
                fatal_error!(
                    self,
                    ParserInvalidXMLDecl,
                    "White spaces are required before 'standalone'."
                );
            }
            standalone = Some(self.parse_sddecl()?);
            self.skip_whitespaces();
        }

        if !self.consume_keyword("?>") {
            fatal_error!(self, ParserInvalidXMLDecl, "The XML declaration is not closed by '?>'.");
            return Err(XMLError::ParserInvalidXMLDecl);
        }

        self.apply_encoding_decl(encoding.as_deref())?;
        self.version = version.parse().unwrap_or_default();
        self.encoding = encoding.clone();
        self.standalone = standalone;
        if !self.fatal_error_occurred {
            self.handler
                .declaration(&version, encoding.as_deref(), standalone);
        }
        Ok(())
    }

    /// Read `keyword`, `Eq` and a quoted value, and return the value.
    fn parse_decl_value(&mut self, keyword: &str, code: XMLError) -> Result<String, XMLError> {
        if !self.consume_keyword(keyword) {
            fatal_error!(self, code.clone(), "'{}' is expected.", keyword);
            return Err(code);
        }
        self.parse_eq()?;
        let Some(quote) = self.source.next_char_if(|c| c == '"' || c == '\'') else {
            fatal_error!(self, code.clone(), "The value of '{}' must be quoted.", keyword);
            return Err(code);
        };
        let content = self.source.content_str();
        let Some(end) = content.find(quote) else {
            fatal_error!(self, code.clone(), "The value of '{}' is not closed.", keyword);
            return Err(code);
        };
        let value = content[..end].to_owned();
        self.source.advance(end + 1);
        Ok(value)
    }

    /// ```text
    /// [24] VersionInfo ::= S 'version' Eq ("'" VersionNum "'" | '"' VersionNum '"')
    /// [26] VersionNum  ::= '1.' [0-9]+
    /// ```
    fn parse_version_info(&mut self) -> Result<String, XMLError> {
        if self.skip_whitespaces() == 0 {
            fatal_error!(self, ParserInvalidXMLDecl, "White spaces are required before 'version'.");
            return Err(XMLError::ParserInvalidXMLDecl);
        }
        let version = self.parse_decl_value("version", XMLError::ParserInvalidXMLVersion)?;
        if version.len() > XML_VERSION_NUM_LIMIT_LENGTH {
            fatal_error!(
                self,
                ParserTooLongXMLVersionNumber,
                "The version number is longer than {} bytes.",
                XML_VERSION_NUM_LIMIT_LENGTH
            );
            return Err(XMLError::ParserTooLongXMLVersionNumber);
        }
        let Some(minor) = version.strip_prefix("1.") else {
            fatal_error!(
                self,
                ParserUnsupportedXMLVersion,
                "The XML version '{}' is not supported.",
                version
            );
            return Err(XMLError::ParserUnsupportedXMLVersion);
        };
        if minor.is_empty() || !minor.bytes().all(|b| b.is_ascii_digit()) {
            fatal_error!(
                self,
                ParserInvalidXMLVersion,
                "'{}' is not a valid version number.",
                version
            );
            return Err(XMLError::ParserInvalidXMLVersion);
        }
        if version != "1.0" {
            log::debug!("XML version {version} is processed as 1.0");
        }
        Ok(version)
    }

    /// ```text
    /// [80] EncodingDecl ::= S 'encoding' Eq ('"' EncName '"' | "'" EncName "'" )
    /// [81] EncName      ::= [A-Za-z] ([A-Za-z0-9._] | '-')*
    /// ```
    fn parse_encoding_decl(&mut self) -> Result<String, XMLError> {
        let name = self.parse_decl_value("encoding", XMLError::ParserInvalidEncodingDecl)?;
        if name.len() > ENCODING_NAME_LIMIT_LENGTH {
            fatal_error!(
                self,
                ParserTooLongEncodingName,
                "The encoding name is longer than {} bytes.",
                ENCODING_NAME_LIMIT_LENGTH
            );
            return Err(XMLError::ParserTooLongEncodingName);
        }
        let mut bytes = name.bytes();
        let valid = bytes.next().is_some_and(|b| b.is_ascii_alphabetic())
            && bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
        if !valid {
            fatal_error!(
                self,
                ParserInvalidEncodingName,
                "'{}' is not a valid encoding name.",
                name
            );
            return Err(XMLError::ParserInvalidEncodingName);
        }
        Ok(name)
    }

    /// ```text
    /// [32] SDDecl ::= S 'standalone' Eq (("'" ('yes' | 'no') "'") | ('"' ('yes' | 'no') '"'))
    /// ```
    fn parse_sddecl(&mut self) -> Result<bool, XMLError> {
        let value = self.parse_decl_value("standalone", XMLError::ParserInvalidSDDecl)?;
        match value.as_str() {
            "yes" => Ok(true),
            "no" => Ok(false),
            _ => {
                fatal_error!(
                    self,
                    ParserInvalidSDDecl,
                    "The value of 'standalone' must be 'yes' or 'no', but '{}' is found.",
                    value
                );
                Err(XMLError::ParserInvalidSDDecl)
            }
        }
    }

    /// ```text
    /// [77] TextDecl ::= '<?xml' VersionInfo? EncodingDecl S? '?>'
    /// ```
    pub(crate) fn parse_text_decl(&mut self) -> Result<(), XMLError> {
        // skip '<?xml'
        self.source.advance(5);
        let mut s = self.skip_whitespaces() > 0;
        if self.source.content_bytes().starts_with(b"version") {
            if !s {
                fatal_error!(self, ParserInvalidTextDecl, "White spaces are required before 'version'.");
            }
            self.parse_decl_value("version", XMLError::ParserInvalidXMLVersion)?;
            s = self.skip_whitespaces() > 0;
        }
        if !self.source.content_bytes().starts_with(b"encoding") {
            fatal_error!(
                self,
                ParserInvalidTextDecl,
                "The text declaration must have an encoding declaration."
            );
            return Err(XMLError::ParserInvalidTextDecl);
        }
        if !s {
            fatal_error!(self, ParserInvalidTextDecl, "White spaces are required before 'encoding'.");
        }
        let encoding = self.parse_encoding_decl()?;
        self.skip_whitespaces();
        if !self.consume_keyword("?>") {
            fatal_error!(self, ParserInvalidTextDecl, "The text declaration is not closed by '?>'.");
            return Err(XMLError::ParserInvalidTextDecl);
        }
        self.apply_encoding_decl(Some(&encoding))
    }

    /// Parse a text declaration if the current frame starts with one.
    ///
    /// Otherwise, the encoding detected for the frame is settled.
    pub(crate) fn parse_text_decl_if_present(&mut self) -> Result<(), XMLError> {
        let content = self.source.content_bytes();
        if content.starts_with(b"<?xml")
            && content
                .get(5)
                .is_some_and(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
        {
            self.parse_text_decl()
        } else {
            self.apply_encoding_decl(None)
        }
    }

    /// Reconcile the encoding declared in the current frame with the detected one.
    pub(crate) fn apply_encoding_decl(&mut self, label: Option<&str>) -> Result<(), XMLError> {
        let Some(family) = self.source.family() else {
            return Ok(());
        };
        let Some(label) = label else {
            return self.source.release_decode_limit();
        };
        match family {
            EncodingFamily::Utf8 | EncodingFamily::External => Ok(()),
            EncodingFamily::Utf16BE | EncodingFamily::Utf16LE => {
                if !is_utf16_name(label) {
                    warning!(
                        self,
                        ParserEncodingMismatch,
                        "The entity is encoded in UTF-16, but the declaration says '{}'.",
                        label
                    );
                }
                Ok(())
            }
            EncodingFamily::Utf8Bom | EncodingFamily::EightBit if is_utf16_name(label) => {
                fatal_error!(
                    self,
                    ParserEncodingMismatch,
                    "The encoding is declared as '{}', but the entity is not encoded in UTF-16.",
                    label
                );
                Err(XMLError::ParserEncodingMismatch)
            }
            EncodingFamily::Utf8Bom => {
                if find_decoder(label).is_none_or(|decoder| decoder.name() != UTF8_NAME) {
                    warning!(
                        self,
                        ParserEncodingMismatch,
                        "The entity starts with the UTF-8 BOM, but the declaration says '{}'.",
                        label
                    );
                }
                Ok(())
            }
            EncodingFamily::EightBit => {
                let Some(decoder) = find_decoder(label) else {
                    fatal_error!(
                        self,
                        ParserUnsupportedEncoding,
                        "The encoding '{}' is not supported.",
                        label
                    );
                    return Err(XMLError::ParserUnsupportedEncoding);
                };
                if decoder.name() == UTF8_NAME {
                    self.source.release_decode_limit()
                } else {
                    self.source.switch_encoding(decoder)
                }
            }
        }
    }
}
