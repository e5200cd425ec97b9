use crate::{
    error::XMLError,
    parse::find_unquoted_gt,
    sax::{
        error::fatal_error,
        handler::SAXHandler,
        parser::{ParserState, ParserSubState, XMLReader},
        predefined_entity_char,
    },
};

impl<H: SAXHandler> XMLReader<H> {
    /// Returns results based on the following conditions:
    /// - If a single step is successfully parsed, return `Ok(true)`.
    /// - If insufficient data is available to parse a single step, return `Ok(false)`.
    /// - If an unrecoverable error occurs, return `Err`.
    ///
    /// Nothing is consumed until the terminator of the construct being parsed is buffered,
    /// so the same steps are taken however the input is split into chunks.
    pub(crate) fn parse_event_once(&mut self) -> Result<bool, XMLError> {
        match self.state {
            ParserState::BeforeStart => {
                if self.source.family().is_none() {
                    return Ok(false);
                }
                if !self.fatal_error_occurred {
                    self.handler.set_document_locator(self.locator.clone());
                    self.handler.start_document();
                }
                self.set_state(ParserState::InXMLDeclaration);
                Ok(true)
            }
            ParserState::InXMLDeclaration => self.parse_xml_decl_once(),
            ParserState::InMiscAfterXMLDeclaration
            | ParserState::InMiscAfterDOCTYPEDeclaration
            | ParserState::InMiscAfterDocumentElement => self.parse_misc_once(),
            ParserState::InInternalSubset => self.parse_doctypedecl_once(),
            ParserState::DocumentElement => {
                if !self.ready_start_tag()? {
                    return Ok(false);
                }
                self.parse_start_tag()?;
                self.after_tag();
                Ok(true)
            }
            ParserState::InContent => self.parse_content_once(),
            ParserState::InTextDeclaration => {
                self.parse_text_decl_if_present()?;
                self.set_state(ParserState::InContent);
                Ok(true)
            }
            ParserState::Finished => Ok(false),
        }
    }

    fn set_state(&mut self, state: ParserState) {
        log::trace!("state: {:?} -> {:?}", self.state, state);
        self.state = state;
        self.context.rewind();
    }

    /// Check if more text may be appended to the current frame.
    fn may_grow(&self) -> bool {
        !self.source.is_complete()
            && !self.source.has_decode_error()
            && !self.source.at_decode_limit()
    }

    /// Search the current frame for the terminator `pattern` of a construct, starting
    /// `from` bytes after its beginning.
    ///
    /// Returns `None` if the terminator is not buffered yet.
    fn ready(
        &mut self,
        from: usize,
        pattern: &[u8],
        construct: &str,
    ) -> Result<Option<usize>, XMLError> {
        let content = self.source.content_bytes();
        let start = self.context.seen.max(from);
        if let Some(pos) = content
            .get(start..)
            .and_then(|rest| rest.windows(pattern.len()).position(|w| w == pattern))
        {
            return Ok(Some(start + pos));
        }
        let len = content.len();
        self.context.seen = (len + 1).saturating_sub(pattern.len()).max(from);
        self.suspend_or_eof(construct).map(|_| None)
    }

    /// Check if a whole start tag or empty-element tag is buffered.
    fn ready_start_tag(&mut self) -> Result<bool, XMLError> {
        let content = self.source.content_bytes();
        let from = self.context.seen.max(1);
        let mut quote = self.context.quote;
        if find_unquoted_gt(content, from, &mut quote).is_some() {
            return Ok(true);
        }
        self.context.seen = content.len();
        self.context.quote = quote;
        self.suspend_or_eof("start tag")
    }

    /// Move to the state that follows a start tag or an end tag.
    fn after_tag(&mut self) {
        if self.context.element_stack.is_empty() {
            self.set_state(ParserState::InMiscAfterDocumentElement);
        } else {
            self.set_state(ParserState::InContent);
        }
    }

    /// ```text
    /// [23] XMLDecl ::= '<?xml' VersionInfo EncodingDecl? SDDecl? S? '?>'
    /// ```
    fn parse_xml_decl_once(&mut self) -> Result<bool, XMLError> {
        let content = self.source.content_str();
        // "<?xml" followed by one white space
        if content.len() < 6 && self.may_grow() {
            return self.suspend_or_eof("XML declaration");
        }
        let is_decl = content.starts_with("<?xml")
            && content[5..].starts_with(|c| self.is_whitespace(c));
        if !is_decl {
            self.apply_encoding_decl(None)?;
            self.set_state(ParserState::InMiscAfterXMLDeclaration);
            return Ok(true);
        }
        if self.ready(5, b"?>", "XML declaration")?.is_none() {
            return Ok(false);
        }
        self.parse_xml_decl()?;
        self.set_state(ParserState::InMiscAfterXMLDeclaration);
        Ok(true)
    }

    /// ```text
    /// [22] prolog ::= XMLDecl? Misc* (doctypedecl Misc*)?
    /// [27] Misc   ::= Comment | PI | S
    /// ```
    fn parse_misc_once(&mut self) -> Result<bool, XMLError> {
        self.skip_whitespaces();
        let content = self.source.content_bytes();
        if content.is_empty() {
            if !self.source.is_complete() {
                return self.suspend_or_eof("prolog");
            }
            if self.state == ParserState::InMiscAfterDocumentElement {
                if !self.fatal_error_occurred {
                    self.handler.end_document();
                }
                self.set_state(ParserState::Finished);
                return Ok(true);
            }
            fatal_error!(self, ParserEmptyDocument, "The document element is missing.");
            return Err(XMLError::ParserEmptyDocument);
        }

        // wait until the kind of markup can be decided
        let undecided = [&b"<!--"[..], b"<!DOCTYPE"]
            .iter()
            .any(|markup| content.len() < markup.len() && markup.starts_with(content));
        if undecided && self.may_grow() {
            return Ok(false);
        }

        if content.starts_with(b"<?") {
            if self.ready(2, b"?>", "processing instruction")?.is_none() {
                return Ok(false);
            }
            self.parse_pi()?;
            self.context.rewind();
        } else if content.starts_with(b"<!--") {
            if self.ready(4, b"-->", "comment")?.is_none() {
                return Ok(false);
            }
            self.parse_comment()?;
            self.context.rewind();
        } else if content.starts_with(b"<!DOCTYPE") {
            if self.state != ParserState::InMiscAfterXMLDeclaration {
                fatal_error!(
                    self,
                    ParserMultipleDoctypeDecl,
                    "The document type declaration must appear once before the document element."
                );
                return Err(XMLError::ParserMultipleDoctypeDecl);
            }
            self.set_state(ParserState::InInternalSubset);
        } else if content.starts_with(b"<")
            && self.state != ParserState::InMiscAfterDocumentElement
        {
            self.set_state(ParserState::DocumentElement);
        } else if self.state == ParserState::InMiscAfterDocumentElement {
            fatal_error!(
                self,
                ParserUnexpectedDocumentContent,
                "Extra content at the end of the document."
            );
            return Err(XMLError::ParserUnexpectedDocumentContent);
        } else {
            fatal_error!(
                self,
                ParserUnexpectedDocumentContent,
                "Only comments, processing instructions and white spaces are allowed in the prolog."
            );
            return Err(XMLError::ParserUnexpectedDocumentContent);
        }
        Ok(true)
    }

    /// Buffer the whole document type declaration, including the internal subset, and
    /// parse it at once.
    fn parse_doctypedecl_once(&mut self) -> Result<bool, XMLError> {
        if self.context.sub_state == ParserSubState::None {
            self.context.sub_state = ParserSubState::Doctype;
        }
        if !self.scan_doctypedecl() {
            return self.suspend_or_eof("document type declaration");
        }
        let subset_end = (self.context.mark > 0).then_some(self.context.mark);
        self.parse_doctypedecl(subset_end)?;
        self.set_state(ParserState::InMiscAfterDOCTYPEDeclaration);
        Ok(true)
    }

    /// Returns `true` once the `'>'` closing the declaration is buffered.
    ///
    /// Quotes, comments and processing instructions are tracked so that `']'` and `'>'`
    /// in them are not taken as delimiters.
    fn scan_doctypedecl(&mut self) -> bool {
        let may_grow = self.may_grow();
        let content = self.source.content_bytes();
        let context = &mut self.context;
        // skip '<!DOCTYPE'
        let mut i = context.seen.max(9);
        while i < content.len() {
            let b = content[i];
            if context.quote != 0 {
                if b == context.quote {
                    context.quote = 0;
                }
                i += 1;
                continue;
            }
            match context.sub_state {
                ParserSubState::Doctype => match b {
                    b'"' | b'\'' => context.quote = b,
                    b'[' => context.sub_state = ParserSubState::InternalSubset,
                    b'>' => return true,
                    _ => {}
                },
                ParserSubState::InternalSubset => match b {
                    b']' => {
                        context.mark = i;
                        context.sub_state = ParserSubState::AfterInternalSubset;
                    }
                    b'<' => {
                        let rest = &content[i..];
                        if rest.len() < 4 && may_grow {
                            context.seen = i;
                            return false;
                        }
                        if rest.starts_with(b"<!--") {
                            context.sub_state = ParserSubState::SubsetComment;
                            i += 4;
                            continue;
                        } else if rest.starts_with(b"<?") {
                            context.sub_state = ParserSubState::SubsetPI;
                            i += 2;
                            continue;
                        }
                        context.sub_state = ParserSubState::MarkupDecl;
                    }
                    _ => {}
                },
                ParserSubState::MarkupDecl => match b {
                    b'"' | b'\'' => context.quote = b,
                    b'>' => context.sub_state = ParserSubState::InternalSubset,
                    _ => {}
                },
                ParserSubState::SubsetComment | ParserSubState::SubsetPI => {
                    let end: &[u8] = if context.sub_state == ParserSubState::SubsetComment {
                        b"-->"
                    } else {
                        b"?>"
                    };
                    match content[i..].windows(end.len()).position(|w| w == end) {
                        Some(pos) => {
                            context.sub_state = ParserSubState::InternalSubset;
                            i += pos + end.len();
                        }
                        None => {
                            context.seen = (content.len() + 1).saturating_sub(end.len()).max(i);
                            return false;
                        }
                    }
                    continue;
                }
                ParserSubState::AfterInternalSubset => {
                    if b == b'>' {
                        return true;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        context.seen = i.min(content.len());
        false
    }

    /// ```text
    /// [43] content ::= CharData? ((element | Reference | CDSect | PI | Comment) CharData?)*
    /// ```
    fn parse_content_once(&mut self) -> Result<bool, XMLError> {
        let content = self.source.content_bytes();
        if content.is_empty() {
            if !self.source_stack.is_empty() && !self.source.has_decode_error() {
                self.end_entity_in_content()?;
                self.context.rewind();
                return Ok(true);
            }
            return self.suspend_or_eof("element content");
        }

        if content[0] != b'<' {
            let Some(end) = self.scan_char_data() else {
                return self.suspend_or_eof("character data");
            };
            if end > 0 {
                self.parse_char_data(end)?;
            } else {
                let name = self.parse_entity_ref_name()?;
                self.reference_entity_in_content(&name)?;
            }
            self.context.rewind();
            return Ok(true);
        }

        let undecided = [&b"<!--"[..], b"<![CDATA["]
            .iter()
            .any(|markup| content.len() < markup.len() && markup.starts_with(content));
        if (undecided || content.len() < 2) && self.may_grow() {
            return Ok(false);
        }
        if content.starts_with(b"</") {
            if self.ready(2, b">", "end tag")?.is_none() {
                return Ok(false);
            }
            self.parse_end_tag()?;
            self.after_tag();
        } else if content.starts_with(b"<!--") {
            if self.ready(4, b"-->", "comment")?.is_none() {
                return Ok(false);
            }
            self.parse_comment()?;
            self.context.rewind();
        } else if content.starts_with(b"<![CDATA[") {
            if self.ready(9, b"]]>", "CDATA section")?.is_none() {
                return Ok(false);
            }
            self.parse_cdsect()?;
            self.context.rewind();
        } else if content.starts_with(b"<?") {
            if self.ready(2, b"?>", "processing instruction")?.is_none() {
                return Ok(false);
            }
            self.parse_pi()?;
            self.context.rewind();
        } else if content.starts_with(b"<!") {
            fatal_error!(
                self,
                ParserUnexpectedDocumentContent,
                "Only comments and CDATA sections may start with '<!' in content."
            );
            return Err(XMLError::ParserUnexpectedDocumentContent);
        } else {
            if !self.ready_start_tag()? {
                return Ok(false);
            }
            self.parse_start_tag()?;
            self.after_tag();
        }
        Ok(true)
    }

    /// Find the end of the run of character data at the beginning of the current frame.
    ///
    /// Character references and references to predefined entities belong to the run.
    /// Returns `Some(0)` if the frame begins with any other entity reference, and `None`
    /// if the end of the run is not buffered yet.
    fn scan_char_data(&mut self) -> Option<usize> {
        let may_grow = self.may_grow();
        let content = self.source.content_bytes();
        let mut i = self.context.seen;
        while let Some(pos) = content[i..].iter().position(|&b| b == b'<' || b == b'&') {
            let at = i + pos;
            if content[at] == b'<' {
                return Some(at);
            }
            let rest = &content[at..];
            let Some(semi) = rest.iter().position(|&b| b == b';' || b == b'<') else {
                if may_grow {
                    self.context.seen = at;
                    return None;
                }
                return Some(at);
            };
            let in_run = rest[semi] == b';'
                && (rest.get(1) == Some(&b'#')
                    || std::str::from_utf8(&rest[1..semi])
                        .ok()
                        .and_then(predefined_entity_char)
                        .is_some());
            if !in_run {
                return Some(at);
            }
            i = at + semi + 1;
        }
        if may_grow {
            self.context.seen = content.len();
            return None;
        }
        Some(content.len())
    }
}
