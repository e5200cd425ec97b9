mod cdsect;
mod char_data;
mod comment;
mod dtd;
mod element;
mod literals;
mod pi;
mod progressive;
mod reference;
mod tokens;
mod xmldecl;

use std::borrow::Cow;

use crate::{
    CHARDATA_CHUNK_LENGTH,
    error::XMLError,
    sax::{
        error::fatal_error,
        handler::SAXHandler,
        parser::{ParserOption, XMLReader},
        source::{InputSource, SourceKind},
    },
    uri::resolve_uri,
};

impl<H: SAXHandler> XMLReader<H> {
    /// Make `source` the current frame.
    pub(crate) fn push_source(&mut self, mut source: InputSource) -> Result<(), XMLError> {
        source.decode()?;
        source.expansion_mark = self.copied;
        log::trace!(
            "push source: {:?} ({:?}), depth: {}",
            source.entity_name,
            source.kind,
            self.source_stack.len() + 1
        );
        let parent = std::mem::replace(&mut self.source, Box::new(source));
        self.source_stack.push(parent);
        self.locator.set_system_id(self.source.system_id().cloned());
        self.locator.set_public_id(self.source.public_id().cloned());
        Ok(())
    }

    /// Close the current frame and return it.
    ///
    /// The document frame is never closed.
    pub(crate) fn pop_source(&mut self) -> Option<Box<InputSource>> {
        let parent = self.source_stack.pop()?;
        let popped = std::mem::replace(&mut self.source, parent);
        log::trace!(
            "pop source: {:?} ({:?}), depth: {}",
            popped.entity_name,
            popped.kind,
            self.source_stack.len()
        );
        if popped.external {
            self.consumed_external += popped.total_length();
        }
        self.locator.set_system_id(self.source.system_id().cloned());
        self.locator.set_public_id(self.source.public_id().cloned());
        Some(popped)
    }

    /// Close the current frame and memoize the expansion cost of its entity.
    pub(crate) fn pop_entity_source(&mut self) -> Result<(), XMLError> {
        let Some(popped) = self.pop_source() else {
            return Err(XMLError::InternalError);
        };
        if let Some(name) = popped.entity_name.as_deref()
            && let Some(record) = self.entities.get_mut(name)
        {
            record.set_checked_cost(self.copied - popped.expansion_mark);
        }
        Ok(())
    }

    /// Check if the current frame is anything other than the document entity,
    /// that is, the external subset or the replacement text of some entity.
    pub(crate) fn in_external_markup(&self) -> bool {
        self.source.kind != SourceKind::Document
    }

    /// Check if an entity named `name` is being substituted.
    ///
    /// Parameter entity names are prefixed with `%`.
    pub(crate) fn is_entity_in_use(&self, name: &str) -> bool {
        std::iter::once(&self.source)
            .chain(self.source_stack.iter())
            .any(|source| source.entity_name.as_deref() == Some(name))
    }

    /// The number of decoded bytes read from real input, that is, the document entity
    /// and external entities.
    pub(crate) fn consumed(&self) -> u64 {
        let document = std::iter::once(&self.source)
            .chain(self.source_stack.iter())
            .filter(|source| source.kind == SourceKind::Document)
            .map(|source| source.position())
            .sum::<u64>();
        document + self.consumed_external
    }

    pub(crate) fn check_entity_depth(&mut self, name: &str) -> Result<(), XMLError> {
        let depth = self
            .source_stack
            .iter()
            .chain(std::iter::once(&self.source))
            .filter(|source| source.entity_name.is_some())
            .count();
        let max = self.limits().max_entity_depth;
        if depth >= max {
            log::warn!("entity nesting depth exceeds {max} at '{name}'");
            fatal_error!(
                self,
                ParserEntityTooDeep,
                "The entity '{}' is nested too deeply. The maximum depth is {}.",
                name,
                max
            );
            return Err(XMLError::ParserEntityTooDeep);
        }
        Ok(())
    }

    /// Check if `copied` bytes of substituted text are acceptable for the input
    /// consumed so far.
    pub(crate) fn is_amplification_acceptable(&self, copied: u64) -> bool {
        if self.config.is_enable(ParserOption::Huge) {
            return true;
        }
        let limits = self.limits();
        copied <= limits.amplification_threshold
            || copied / limits.amplification_ratio.max(1) <= self.consumed()
    }

    pub(crate) fn check_amplification(&mut self, copied: u64) -> Result<(), XMLError> {
        if self.is_amplification_acceptable(copied) {
            return Ok(());
        }
        log::warn!(
            "entity amplification: {copied} bytes substituted for {} bytes of input",
            self.consumed()
        );
        fatal_error!(
            self,
            ParserEntityAmplification,
            "Maximum entity amplification factor exceeded."
        );
        Err(XMLError::ParserEntityAmplification)
    }

    /// Add the cost of substituting `len` bytes of replacement text.
    pub(crate) fn account_substitution(&mut self, len: usize) -> Result<(), XMLError> {
        self.copied = self
            .copied
            .saturating_add(len as u64 + self.limits().entity_fixed_cost);
        self.check_amplification(self.copied)
    }

    /// Decide what to do when the current construct is not complete.
    ///
    /// Returns `Ok(false)` to wait for the next chunk. If no more input can arrive,
    /// the construct is truncated and an error is returned.
    pub(crate) fn suspend_or_eof(&mut self, construct: &str) -> Result<bool, XMLError> {
        if let Some(err) = self.source.take_decode_error() {
            fatal_error!(
                self,
                XMLError::DecodeError(err.clone()),
                "The input is not encoded correctly: {}",
                err
            );
            return Err(XMLError::DecodeError(err));
        }
        if self.source.is_complete() || self.source.at_decode_limit() {
            fatal_error!(
                self,
                ParserUnexpectedEOF,
                "Unexpected end of input in {}.",
                construct
            );
            return Err(XMLError::ParserUnexpectedEOF);
        }
        let buffered = self.source.content_bytes().len();
        let max = self.limits().max_text_length;
        if buffered > max {
            fatal_error!(
                self,
                ParserTooLongText,
                "The {} is longer than {} bytes.",
                construct,
                max
            );
            return Err(XMLError::ParserTooLongText);
        }
        Ok(false)
    }

    /// Resolve a system identifier for reporting in declaration events.
    pub(crate) fn reported_system_id<'a>(&self, system_id: &'a str) -> Cow<'a, str> {
        match self.source.base_uri.as_deref().or(self.base_uri.as_deref()) {
            Some(base) if self.config.is_enable(ParserOption::ResolveDTDURIs) => {
                Cow::Owned(resolve_uri(base, system_id))
            }
            _ => Cow::Borrowed(system_id),
        }
    }

    /// Deliver character data, split into chunks of a bounded length.
    pub(crate) fn report_characters(&mut self, data: &str) {
        if self.fatal_error_occurred {
            return;
        }
        let mut rest = data;
        while !rest.is_empty() {
            let mut end = CHARDATA_CHUNK_LENGTH.min(rest.len());
            while !rest.is_char_boundary(end) {
                end += 1;
            }
            let (chunk, next) = rest.split_at(end);
            self.handler.characters(chunk);
            rest = next;
        }
    }
}

/// Replace `"\r\n"` and lone `'\r'` with `'\n'`.
pub(crate) fn normalize_line_ends(text: &str) -> Cow<'_, str> {
    if !text.contains('\r') {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Find `>` that is not enclosed in quotes, starting from `from`.
///
/// `quote` carries the quotation state across calls.
pub(crate) fn find_unquoted_gt(content: &[u8], from: usize, quote: &mut u8) -> Option<usize> {
    for (i, &b) in content.iter().enumerate().skip(from) {
        match b {
            _ if *quote != 0 => {
                if b == *quote {
                    *quote = 0;
                }
            }
            b'"' | b'\'' => *quote = b,
            b'>' => return Some(i),
            _ => {}
        }
    }
    None
}
