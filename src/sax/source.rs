use std::{io::Read, sync::Arc};

use crate::{
    encoding::{
        DecodeError, Decoder, UTF8_NAME, UTF8Decoder, UTF16BE_NAME, UTF16BEDecoder,
        UTF16LE_NAME, UTF16LEDecoder, find_decoder,
    },
    error::XMLError,
};

/// Consumed prefix of the decoded buffer is discarded once it grows beyond this length.
const SHRINK_THRESHOLD: usize = 4096;

/// The encoding family detected from the first bytes of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EncodingFamily {
    /// No BOM and no declaration.
    Utf8,
    /// UTF-8 with a byte order mark.
    Utf8Bom,
    Utf16BE,
    Utf16LE,
    /// Some ASCII compatible encoding starting with `<?xm`.
    /// The declaration decides the actual one.
    EightBit,
    /// Given by the application. The declaration is ignored.
    External,
}

/// What kind of entity an input frame holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum SourceKind {
    #[default]
    Document,
    ExternalSubset,
    ParameterEntity,
    GeneralEntity,
}

/// One entity's text and the cursor into it.
///
/// The document entity is fed progressively through [`InputSource::push_bytes`].
/// Every other entity is complete when it is pushed onto the reader.
/// Bytes are decoded into UTF-8 lazily, and the parser only sees the decoded text.
pub struct InputSource {
    raw: Vec<u8>,
    raw_next: usize,
    decoded: String,
    decoded_next: usize,
    decoder: Option<Box<dyn Decoder>>,
    family: Option<EncodingFamily>,
    eof: bool,
    // the number of decoded bytes discarded by shrinking
    drained: usize,
    pending_error: Option<DecodeError>,
    // decode no further than the first '>' until the declaration is handled
    decode_limit: bool,
    limit_reached: bool,

    line: usize,
    column: usize,
    last_cr: bool,

    system_id: Option<Arc<str>>,
    public_id: Option<Arc<str>>,
    pub(crate) base_uri: Option<Arc<str>>,
    pub(crate) entity_name: Option<Arc<str>>,
    pub(crate) kind: SourceKind,
    pub(crate) external: bool,
    /// `true` if this is the replacement text of a parameter entity padded with blanks.
    pub(crate) pe_padded: bool,
    /// `copied` of the reader when this frame was pushed.
    pub(crate) expansion_mark: u64,
}

impl InputSource {
    /// Create a complete entity from already decoded text.
    pub fn from_content(content: &str) -> Self {
        let mut ret = Self::new();
        ret.decoded.push_str(content);
        ret.family = Some(EncodingFamily::Utf8);
        ret.eof = true;
        ret
    }

    /// Create a complete entity from encoded bytes.
    ///
    /// The encoding is detected from the first bytes and the text declaration.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let mut ret = Self::new();
        ret.raw = bytes.into();
        ret.eof = true;
        ret
    }

    /// Read `reader` to the end and create a complete entity from its content.
    pub fn from_reader(mut reader: impl Read) -> Result<Self, XMLError> {
        let mut bytes = vec![];
        reader.read_to_end(&mut bytes)?;
        Ok(Self::from_bytes(bytes))
    }

    /// Create an empty document entity that is filled by [`InputSource::push_bytes`].
    pub(crate) fn progressive() -> Self {
        Self::new()
    }

    fn new() -> Self {
        Self {
            raw: vec![],
            raw_next: 0,
            decoded: String::new(),
            decoded_next: 0,
            decoder: None,
            family: None,
            eof: false,
            drained: 0,
            pending_error: None,
            decode_limit: false,
            limit_reached: false,
            line: 1,
            column: 1,
            last_cr: false,
            system_id: None,
            public_id: None,
            base_uri: None,
            entity_name: None,
            kind: SourceKind::Document,
            external: false,
            pe_padded: false,
            expansion_mark: 0,
        }
    }

    pub fn set_system_id(&mut self, system_id: impl Into<Arc<str>>) {
        self.system_id = Some(system_id.into());
    }

    pub fn set_public_id(&mut self, public_id: impl Into<Arc<str>>) {
        self.public_id = Some(public_id.into());
    }

    /// Fix the encoding of this entity.
    /// The encoding declaration in the content is ignored after this.
    ///
    /// This has no effect once decoding has started.
    pub fn set_encoding(&mut self, encoding: &str) -> Result<(), XMLError> {
        let decoder = find_decoder(encoding).ok_or(XMLError::ParserUnsupportedEncoding)?;
        self.set_decoder(decoder);
        Ok(())
    }

    pub(crate) fn set_decoder(&mut self, decoder: Box<dyn Decoder>) {
        if self.family.is_none() {
            self.decoder = Some(decoder);
            self.family = Some(EncodingFamily::External);
        }
    }

    pub fn system_id(&self) -> Option<&Arc<str>> {
        self.system_id.as_ref()
    }

    pub fn public_id(&self) -> Option<&Arc<str>> {
        self.public_id.as_ref()
    }

    pub(crate) fn family(&self) -> Option<EncodingFamily> {
        self.family
    }

    /// The name of the encoding currently used for decoding.
    pub fn encoding_name(&self) -> &'static str {
        self.decoder.as_ref().map_or(UTF8_NAME, |decoder| decoder.name())
    }

    pub(crate) fn line(&self) -> usize {
        self.line
    }

    pub(crate) fn column(&self) -> usize {
        self.column
    }

    pub(crate) fn set_position(&mut self, line: usize, column: usize) {
        self.line = line;
        self.column = column;
    }

    /// Append `bytes` to the raw buffer and decode as much as possible.
    ///
    /// If `finish` is `true`, no more bytes follow.
    pub(crate) fn push_bytes(&mut self, bytes: &[u8], finish: bool) -> Result<(), XMLError> {
        if self.decoded_next >= SHRINK_THRESHOLD {
            self.decoded.drain(..self.decoded_next);
            self.drained += self.decoded_next;
            self.decoded_next = 0;
        }
        if self.raw_next >= SHRINK_THRESHOLD {
            self.raw.drain(..self.raw_next);
            self.raw_next = 0;
        }
        self.raw.extend_from_slice(bytes);
        self.eof |= finish;
        self.decode()
    }

    /// Decode the buffered raw bytes.
    ///
    /// A malformed sequence stops decoding. Everything before it remains readable, and
    /// the error is kept until the parser asks for it by [`InputSource::take_decode_error`].
    pub(crate) fn decode(&mut self) -> Result<(), XMLError> {
        if self.family.is_none() {
            if self.raw.len() - self.raw_next < 4 && !self.eof {
                return Ok(());
            }
            self.sniff()?;
        } else if self.family == Some(EncodingFamily::External) && self.raw_next == 0 {
            self.skip_bom_for_external();
        }

        if self.pending_error.is_some() || (self.decode_limit && self.limit_reached) {
            return Ok(());
        }
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(());
        };

        let mut end = self.raw.len();
        let mut finish = self.eof;
        if self.decode_limit
            && let Some(pos) = self.raw[self.raw_next..].iter().position(|&b| b == b'>')
        {
            end = self.raw_next + pos + 1;
            finish = self.eof && end == self.raw.len();
            self.limit_reached = true;
        }
        match decoder.decode(&self.raw[self.raw_next..end], &mut self.decoded, finish) {
            Ok((read, _)) => self.raw_next += read,
            Err(err) => {
                if let DecodeError::Malformed { read, .. } = err {
                    self.raw_next += read;
                }
                log::debug!("decoding stopped by {err}");
                self.pending_error = Some(err);
            }
        }
        Ok(())
    }

    fn skip_bom_for_external(&mut self) {
        let name = self.encoding_name();
        let bom: &[u8] = match name {
            UTF8_NAME => &[0xEF, 0xBB, 0xBF],
            UTF16BE_NAME => &[0xFE, 0xFF],
            UTF16LE_NAME => &[0xFF, 0xFE],
            _ => return,
        };
        if self.raw.starts_with(bom) {
            self.raw_next = bom.len();
        }
    }

    /// Detect the encoding family from the first four bytes.
    ///
    /// # Reference
    /// [Appendix F Autodetection of Character Encodings](https://www.w3.org/TR/xml/#sec-guessing)
    fn sniff(&mut self) -> Result<(), XMLError> {
        let head = &self.raw[self.raw_next..];
        let (family, skip): (EncodingFamily, usize) = match head {
            // UCS-4 with BOM, in any byte order
            [0x00, 0x00, 0xFE, 0xFF, ..]
            | [0xFF, 0xFE, 0x00, 0x00, ..]
            | [0x00, 0x00, 0xFF, 0xFE, ..]
            | [0xFE, 0xFF, 0x00, 0x00, ..]
            // UCS-4 without BOM
            | [0x00, 0x00, 0x00, 0x3C, ..]
            | [0x3C, 0x00, 0x00, 0x00, ..]
            | [0x00, 0x00, 0x3C, 0x00, ..]
            | [0x00, 0x3C, 0x00, 0x00, ..]
            // EBCDIC
            | [0x4C, 0x6F, 0xA7, 0x94, ..] => {
                log::debug!("unsupported byte pattern {:02X?}", &head[..4]);
                return Err(XMLError::ParserUnsupportedEncoding);
            }
            [0xEF, 0xBB, 0xBF, ..] => (EncodingFamily::Utf8Bom, 3),
            [0xFE, 0xFF, ..] => (EncodingFamily::Utf16BE, 2),
            [0xFF, 0xFE, ..] => (EncodingFamily::Utf16LE, 2),
            [0x00, 0x3C, 0x00, 0x3F, ..] => (EncodingFamily::Utf16BE, 0),
            [0x3C, 0x00, 0x3F, 0x00, ..] => (EncodingFamily::Utf16LE, 0),
            [0x3C, 0x3F, 0x78, 0x6D, ..] => (EncodingFamily::EightBit, 0),
            _ => (EncodingFamily::Utf8, 0),
        };
        log::debug!("detected encoding family: {family:?}");
        self.raw_next += skip;
        self.family = Some(family);
        self.decoder = Some(match family {
            EncodingFamily::Utf16BE => Box::new(UTF16BEDecoder),
            EncodingFamily::Utf16LE => Box::new(UTF16LEDecoder),
            _ => Box::new(UTF8Decoder),
        });
        self.decode_limit = family == EncodingFamily::EightBit;
        Ok(())
    }

    /// Replace the provisional decoder chosen by sniffing.
    ///
    /// Only the content up to the end of the declaration has been decoded, so the rest is
    /// decoded by `decoder`.
    pub(crate) fn switch_encoding(&mut self, decoder: Box<dyn Decoder>) -> Result<(), XMLError> {
        log::debug!(
            "switch encoding from {} to {}",
            self.encoding_name(),
            decoder.name()
        );
        self.decoder = Some(decoder);
        self.release_decode_limit()
    }

    /// Allow decoding beyond the declaration.
    pub(crate) fn release_decode_limit(&mut self) -> Result<(), XMLError> {
        if self.decode_limit {
            self.decode_limit = false;
            self.limit_reached = false;
            self.decode()?;
        }
        Ok(())
    }

    pub(crate) fn take_decode_error(&mut self) -> Option<DecodeError> {
        self.pending_error.take()
    }

    pub(crate) fn has_decode_error(&self) -> bool {
        self.pending_error.is_some()
    }

    /// Check if no more text will be appended to this entity.
    pub(crate) fn is_complete(&self) -> bool {
        self.eof
            && self.family.is_some()
            && self.pending_error.is_none()
            && !(self.decode_limit && self.raw_next < self.raw.len())
    }

    /// Check if decoding is held back until the declaration is handled.
    pub(crate) fn at_decode_limit(&self) -> bool {
        self.decode_limit && self.limit_reached
    }

    /// The number of decoded bytes the parser has consumed from this entity.
    pub(crate) fn position(&self) -> u64 {
        (self.drained + self.decoded_next) as u64
    }

    /// The total length of the decoded text of this entity so far.
    pub(crate) fn total_length(&self) -> u64 {
        (self.drained + self.decoded.len()) as u64
    }

    pub(crate) fn content_str(&self) -> &str {
        &self.decoded[self.decoded_next..]
    }

    pub(crate) fn content_bytes(&self) -> &[u8] {
        &self.decoded.as_bytes()[self.decoded_next..]
    }

    pub(crate) fn peek_char(&self) -> Option<char> {
        self.content_str().chars().next()
    }

    pub(crate) fn next_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.decoded_next += c.len_utf8();
        self.track(c);
        Some(c)
    }

    pub(crate) fn next_char_if(&mut self, f: impl Fn(char) -> bool) -> Option<char> {
        self.peek_char()
            .filter(|&c| f(c))
            .and_then(|_| self.next_char())
    }

    /// Consume `len` bytes of decoded text.
    ///
    /// `len` must be on a character boundary and within the content.
    pub(crate) fn advance(&mut self, len: usize) {
        let end = (self.decoded_next + len).min(self.decoded.len());
        let (decoded, mut line, mut column, mut last_cr) =
            (&self.decoded, self.line, self.column, self.last_cr);
        for c in decoded[self.decoded_next..end].chars() {
            match c {
                '\r' => {
                    line += 1;
                    column = 1;
                    last_cr = true;
                }
                '\n' if last_cr => last_cr = false,
                '\n' => {
                    line += 1;
                    column = 1;
                }
                _ => {
                    column += 1;
                    last_cr = false;
                }
            }
        }
        self.line = line;
        self.column = column;
        self.last_cr = last_cr;
        self.decoded_next = end;
    }

    fn track(&mut self, c: char) {
        match c {
            '\r' => {
                self.line += 1;
                self.column = 1;
                self.last_cr = true;
            }
            '\n' if self.last_cr => self.last_cr = false,
            '\n' => {
                self.line += 1;
                self.column = 1;
            }
            _ => {
                self.column += 1;
                self.last_cr = false;
            }
        }
    }
}

impl std::fmt::Debug for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputSource")
            .field("encoding", &self.encoding_name())
            .field("family", &self.family)
            .field("eof", &self.eof)
            .field("system_id", &self.system_id)
            .field("entity_name", &self.entity_name)
            .field("line", &self.line)
            .field("column", &self.column)
            .finish_non_exhaustive()
    }
}
