use std::{borrow::Cow, collections::HashMap, io::Read, sync::Arc};

use crate::{
    INPUT_CHUNK_LENGTH, XMLVersion,
    encoding::{UTF8Decoder, find_decoder},
    error::{XMLError, XMLErrorDomain, XMLErrorLevel},
    sax::{
        AttlistDeclMap, ElementDeclMap, EntityMap, Locator, NotationDecl,
        dict::NameDictionary,
        error::{SAXParseError, fatal_error},
        handler::{DefaultSAXHandler, SAXHandler},
        namespace::NamespaceStack,
        source::InputSource,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParserOption {
    /// Load external parsed general entities through the entity resolver.
    ExternalGeneralEntities = 0,
    /// Load the external subset and external parameter entities through the entity resolver.
    ExternalParameterEntities = 1,
    /// Process namespaces.
    Namespaces = 2,
    /// Report system identifiers in declarations as absolute URIs.
    ResolveDTDURIs = 3,
    /// Trust the input. Every ceiling in [`ParserLimits`] is relaxed to its huge value,
    /// and the entity amplification check is disabled.
    Huge = 4,
    /// Use the name character classes of XML 1.0 4th edition.
    FourthEditionNames = 5,
    /// Discard namespace declarations that rebind a prefix to the URI already in scope.
    CleanNamespaces = 6,
}

impl std::ops::BitOr<Self> for ParserOption {
    type Output = ParserConfig;

    fn bitor(self, rhs: Self) -> Self::Output {
        ParserConfig {
            flags: (1 << self as i32) | (1 << rhs as i32),
        }
    }
}

impl std::ops::BitOr<ParserConfig> for ParserOption {
    type Output = ParserConfig;

    fn bitor(self, rhs: ParserConfig) -> Self::Output {
        ParserConfig {
            flags: rhs.flags | (1 << self as i32),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParserConfig {
    flags: u64,
}

impl ParserConfig {
    pub fn is_enable(&self, option: ParserOption) -> bool {
        self.flags & (1 << option as i32) != 0
    }

    pub fn enable(&mut self, option: ParserOption) {
        self.flags |= 1 << option as i32;
    }

    pub fn disable(&mut self, option: ParserOption) {
        self.flags &= !(1 << option as i32);
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserOption::Namespaces | ParserOption::ResolveDTDURIs
    }
}

impl From<ParserOption> for ParserConfig {
    fn from(value: ParserOption) -> Self {
        ParserConfig {
            flags: 1 << value as i32,
        }
    }
}

impl std::ops::BitOr<Self> for ParserConfig {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        ParserConfig {
            flags: self.flags | rhs.flags,
        }
    }
}

impl std::ops::BitOr<ParserOption> for ParserConfig {
    type Output = Self;

    fn bitor(self, rhs: ParserOption) -> Self::Output {
        ParserConfig {
            flags: self.flags | (1 << rhs as i32),
        }
    }
}

impl std::ops::BitOrAssign<ParserOption> for ParserConfig {
    fn bitor_assign(&mut self, rhs: ParserOption) {
        self.flags |= 1 << rhs as i32;
    }
}

impl std::ops::BitOrAssign<Self> for ParserConfig {
    fn bitor_assign(&mut self, rhs: Self) {
        self.flags |= rhs.flags;
    }
}

/// Resource ceilings of the parser.
///
/// Exceeding any of them is a fatal error.
/// If [`ParserOption::Huge`] is enabled, [`ParserLimits::huge`] is used instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParserLimits {
    /// Maximum nesting depth of entity substitution.
    pub max_entity_depth: usize,
    /// Maximum nesting depth of elements.
    pub max_element_depth: usize,
    /// Maximum nesting depth of parentheses in content models.
    pub max_content_model_depth: usize,
    /// Maximum length of a name in bytes.
    pub max_name_length: usize,
    /// Maximum length of a text token (character data, comments, literals, ...)
    /// or of buffered input waiting for its terminator, in bytes.
    pub max_text_length: usize,
    /// The substituted text may not exceed `amplification_ratio` times the consumed input.
    pub amplification_ratio: u64,
    /// The ratio check applies only after this many bytes have been substituted.
    pub amplification_threshold: u64,
    /// The cost added for each entity substitution in addition to its length.
    pub entity_fixed_cost: u64,
}

impl ParserLimits {
    pub const fn huge() -> Self {
        Self {
            max_entity_depth: 1024,
            max_element_depth: 2048,
            max_content_model_depth: 2048,
            max_name_length: 10_000_000,
            max_text_length: 1_000_000_000,
            amplification_ratio: 10,
            amplification_threshold: 1_000_000,
            entity_fixed_cost: 20,
        }
    }
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_entity_depth: 40,
            max_element_depth: 256,
            max_content_model_depth: 128,
            max_name_length: 50_000,
            max_text_length: 10_000_000,
            amplification_ratio: 10,
            amplification_threshold: 1_000_000,
            entity_fixed_cost: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParserState {
    #[default]
    BeforeStart,
    InXMLDeclaration,
    InMiscAfterXMLDeclaration,
    InInternalSubset,
    InMiscAfterDOCTYPEDeclaration,
    DocumentElement,
    InContent,
    InMiscAfterDocumentElement,
    InTextDeclaration,
    Finished,
}

/// Where the scan of a document type declaration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum ParserSubState {
    #[default]
    None,
    /// in a document type declaration, before `[`
    Doctype,
    /// in the internal subset, outside markup
    InternalSubset,
    /// in a markup declaration in the internal subset
    MarkupDecl,
    SubsetComment,
    SubsetPI,
    /// after `]` of the internal subset
    AfterInternalSubset,
}

#[derive(Debug, Clone)]
pub(crate) struct OpenElement {
    pub(crate) name: Arc<str>,
    pub(crate) prefix_len: usize,
    /// the length of the namespace stack before the start tag
    pub(crate) ns_depth: usize,
    pub(crate) line: usize,
}

/// The state kept between feeds.
#[derive(Debug, Default)]
pub(crate) struct ProgressiveContext {
    /// How far the current construct has been scanned for its terminator.
    pub(crate) seen: usize,
    pub(crate) quote: u8,
    pub(crate) sub_state: ParserSubState,
    /// An offset remembered by a scanner, such as the `]` closing the internal subset.
    pub(crate) mark: usize,
    pub(crate) element_stack: Vec<OpenElement>,
    /// the depth of the element stack when each substituted entity began
    pub(crate) entity_stack: Vec<usize>,
}

impl ProgressiveContext {
    pub(crate) fn rewind(&mut self) {
        self.seen = 0;
        self.quote = 0;
        self.sub_state = ParserSubState::None;
        self.mark = 0;
    }
}

pub struct XMLReader<H: SAXHandler = DefaultSAXHandler> {
    pub(crate) source: Box<InputSource>,
    pub(crate) source_stack: Vec<Box<InputSource>>,
    pub(crate) handler: H,
    pub(crate) locator: Arc<Locator>,
    pub(crate) config: ParserConfig,
    pub(crate) limits: ParserLimits,
    pub(crate) default_base_uri: Option<Arc<str>>,
    pub(crate) base_uri: Option<Arc<str>>,
    pub(crate) external_encoding: Option<String>,

    // Parser Context
    pub(crate) state: ParserState,
    pub(crate) context: ProgressiveContext,
    pub(crate) version: XMLVersion,
    pub(crate) encoding: Option<String>,
    pub(crate) standalone: Option<bool>,
    pub(crate) dtd_name: Option<Arc<str>>,
    pub(crate) has_internal_subset: bool,
    pub(crate) has_external_subset: bool,
    pub(crate) has_parameter_entity: bool,
    pub(crate) namespaces: NamespaceStack,
    pub(crate) dict: NameDictionary,
    pub(crate) entities: EntityMap,
    pub(crate) notations: HashMap<Box<str>, NotationDecl>,
    pub(crate) elementdecls: ElementDeclMap,
    pub(crate) attlistdecls: AttlistDeclMap,
    /// the total length of substituted entity text
    pub(crate) copied: u64,
    /// the total length of external entities loaded
    pub(crate) consumed_external: u64,

    // Status
    pub(crate) fatal_error_occurred: bool,
    pub(crate) fatal_count: usize,
    pub(crate) ns_well_formed: bool,
    pub(crate) first_fatal: Option<XMLError>,
    pub(crate) last_error: Option<XMLError>,
    pub(crate) setup_error: Option<XMLError>,
}

impl<H: SAXHandler> XMLReader<H> {
    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn config(&self) -> ParserConfig {
        self.config
    }

    pub fn set_config(&mut self, config: ParserConfig) {
        self.config = config;
    }

    /// The ceilings currently in effect.
    pub fn limits(&self) -> ParserLimits {
        if self.config.is_enable(ParserOption::Huge) {
            ParserLimits::huge()
        } else {
            self.limits
        }
    }

    pub fn locator(&self) -> Arc<Locator> {
        self.locator.clone()
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Check if no well-formedness errors have been found so far.
    pub fn is_well_formed(&self) -> bool {
        !self.fatal_error_occurred
    }

    /// Check if no well-formedness or namespace errors have been found so far.
    pub fn is_namespace_well_formed(&self) -> bool {
        self.is_well_formed() && self.ns_well_formed
    }

    /// Feed the next chunk of the document.
    ///
    /// Events are delivered to the handler before this method returns. If `finish` is
    /// `true`, no more input follows and the document is finished.
    ///
    /// If the document has a well-formedness error that makes further parsing impossible,
    /// the error is returned, and all later calls return the same error without doing
    /// anything. When the last chunk is fed, the first fatal error found in the document
    /// is returned even if parsing could continue after it.
    pub fn push(&mut self, bytes: &[u8], finish: bool) -> Result<(), XMLError> {
        if let Some(err) = self.last_error.clone() {
            return Err(err);
        }
        log::trace!("push: {} bytes, finish: {finish}", bytes.len());
        if self.state == ParserState::Finished {
            return self.first_fatal.clone().map_or(Ok(()), Err);
        }

        if let Some(err) = self.setup_error.take() {
            fatal_error!(self, err.clone(), "The encoding '{}' is not supported.", self.external_encoding.as_deref().unwrap_or(""));
            return self.terminate(err);
        }
        let document = match self.source_stack.first_mut() {
            Some(document) => document,
            None => &mut self.source,
        };
        if let Err(err) = document.push_bytes(bytes, finish) {
            fatal_error!(self, err.clone(), "Failed to detect the encoding of the document.");
            return self.terminate(err);
        }

        loop {
            self.sync_locator();
            let fatal_count = self.fatal_count;
            match self.parse_event_once() {
                Ok(true) => {
                    if let Some(err) = self.handler.take_error() {
                        let message = err.message().to_owned();
                        let err = XMLError::ParserHandlerFailure(err);
                        fatal_error!(self, err.clone(), "The handler failed: {}", message);
                        return self.terminate(err);
                    }
                }
                Ok(false) => break,
                Err(err) => {
                    if self.fatal_count == fatal_count {
                        fatal_error!(self, err.clone(), "Parsing cannot continue.");
                    }
                    return self.terminate(err);
                }
            }
        }

        if self.state == ParserState::Finished {
            return self.first_fatal.clone().map_or(Ok(()), Err);
        }
        Ok(())
    }

    fn terminate(&mut self, err: XMLError) -> Result<(), XMLError> {
        log::trace!("terminate: {err}");
        self.state = ParserState::Finished;
        self.last_error = Some(err.clone());
        Err(err)
    }

    /// Parse a whole document held in a string.
    ///
    /// The encoding is fixed to UTF-8, so the encoding declaration is ignored.
    pub fn parse_str(&mut self, document: &str, uri: Option<&str>) -> Result<(), XMLError> {
        self.reset();
        if let Some(uri) = uri {
            self.set_document_uri(uri);
        }
        self.setup_error = None;
        self.source.set_decoder(Box::new(UTF8Decoder));
        self.push(document.as_bytes(), true)
    }

    /// Parse a whole document held in a byte sequence.
    ///
    /// If `encoding` is `Some`, it overrides both the detected encoding and the encoding
    /// declaration.
    pub fn parse_bytes(
        &mut self,
        document: &[u8],
        encoding: Option<&str>,
        uri: Option<&str>,
    ) -> Result<(), XMLError> {
        self.reset();
        self.prepare_one_shot(encoding, uri);
        self.push(document, true)
    }

    /// Parse a whole document read from `reader`.
    pub fn parse_reader(
        &mut self,
        mut reader: impl Read,
        encoding: Option<&str>,
        uri: Option<&str>,
    ) -> Result<(), XMLError> {
        self.reset();
        self.prepare_one_shot(encoding, uri);
        let mut buffer = [0; INPUT_CHUNK_LENGTH];
        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    let err = XMLError::from(err);
                    fatal_error!(self, err.clone(), "Failed to read the document: {}", err);
                    return self.terminate(err);
                }
            };
            self.push(&buffer[..read], false)?;
        }
        self.push(&[], true)
    }

    fn prepare_one_shot(&mut self, encoding: Option<&str>, uri: Option<&str>) {
        if let Some(uri) = uri {
            self.set_document_uri(uri);
        }
        if let Some(encoding) = encoding {
            self.external_encoding = Some(encoding.to_owned());
            self.setup_error = None;
            match find_decoder(encoding) {
                Some(decoder) => self.source.set_decoder(decoder),
                None => self.setup_error = Some(XMLError::ParserUnsupportedEncoding),
            }
        }
    }

    fn set_document_uri(&mut self, uri: &str) {
        let uri: Arc<str> = uri.into();
        self.base_uri = Some(uri.clone());
        self.source.base_uri = Some(uri.clone());
        self.source.set_system_id(uri.clone());
        self.locator.set_system_id(Some(uri));
    }

    /// Abort parsing.
    ///
    /// Later feeds do nothing and return [`XMLError::ParserStopped`].
    pub fn stop(&mut self) {
        log::debug!("parser is stopped in state {:?}", self.state);
        self.state = ParserState::Finished;
        self.last_error = Some(XMLError::ParserStopped);
    }

    /// Prepare for the next document.
    ///
    /// The handler, the configuration, the limits, the base URI and the external encoding
    /// given to the builder are retained.
    pub fn reset(&mut self) {
        self.source = Box::new(InputSource::progressive());
        self.source_stack.clear();
        self.base_uri = self.default_base_uri.clone();
        self.locator = Arc::new(Locator::new(self.base_uri.clone(), None, 1, 1));
        self.source.base_uri = self.base_uri.clone();
        if let Some(uri) = self.base_uri.clone() {
            self.source.set_system_id(uri);
        }
        self.setup_error = None;
        if let Some(encoding) = self.external_encoding.as_deref() {
            match find_decoder(encoding) {
                Some(decoder) => self.source.set_decoder(decoder),
                None => self.setup_error = Some(XMLError::ParserUnsupportedEncoding),
            }
        }

        self.state = ParserState::BeforeStart;
        self.context = ProgressiveContext::default();
        self.version = XMLVersion::default();
        self.encoding = None;
        self.standalone = None;
        self.dtd_name = None;
        self.has_internal_subset = false;
        self.has_external_subset = false;
        self.has_parameter_entity = false;
        self.namespaces.clear();
        self.dict.clear();
        self.entities.clear();
        self.notations.clear();
        self.elementdecls.clear();
        self.attlistdecls.clear();
        self.copied = 0;
        self.consumed_external = 0;

        self.fatal_error_occurred = false;
        self.fatal_count = 0;
        self.ns_well_formed = true;
        self.first_fatal = None;
        self.last_error = None;
    }

    /// Deliver a diagnostic to the handler.
    pub(crate) fn report_error(
        &mut self,
        error: XMLError,
        level: XMLErrorLevel,
        domain: XMLErrorDomain,
        message: Cow<'static, str>,
    ) {
        let err = SAXParseError {
            error: error.clone(),
            level,
            domain,
            line: self.source.line(),
            column: self.source.column(),
            system_id: self
                .source
                .system_id()
                .cloned()
                .or_else(|| self.base_uri.clone()),
            public_id: self.source.public_id().cloned(),
            message,
        };
        match level {
            XMLErrorLevel::FatalError => {
                self.fatal_error_occurred = true;
                self.fatal_count += 1;
                self.first_fatal.get_or_insert(error);
                self.handler.fatal_error(err);
            }
            XMLErrorLevel::Error => {
                if domain == XMLErrorDomain::Namespace {
                    self.ns_well_formed = false;
                }
                self.handler.error(err);
            }
            XMLErrorLevel::Warning => self.handler.warning(err),
        }
    }

    pub(crate) fn sync_locator(&self) {
        self.locator.set_line(self.source.line());
        self.locator.set_column(self.source.column());
    }
}

pub struct XMLReaderBuilder<H: SAXHandler = DefaultSAXHandler> {
    handler: H,
    config: ParserConfig,
    limits: ParserLimits,
    base_uri: Option<Arc<str>>,
    encoding: Option<String>,
}

impl XMLReaderBuilder {
    pub fn new() -> Self {
        Self {
            handler: DefaultSAXHandler,
            config: ParserConfig::default(),
            limits: ParserLimits::default(),
            base_uri: None,
            encoding: None,
        }
    }
}

impl Default for XMLReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: SAXHandler> XMLReaderBuilder<H> {
    pub fn set_handler<S: SAXHandler>(self, handler: S) -> XMLReaderBuilder<S> {
        XMLReaderBuilder {
            handler,
            config: self.config,
            limits: self.limits,
            base_uri: self.base_uri,
            encoding: self.encoding,
        }
    }

    pub fn set_parser_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    pub fn enable_option(mut self, option: ParserOption) -> Self {
        self.config.enable(option);
        self
    }

    pub fn disable_option(mut self, option: ParserOption) -> Self {
        self.config.disable(option);
        self
    }

    pub fn set_limits(mut self, limits: ParserLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the URI of the document. Relative system identifiers are resolved against it.
    pub fn set_base_uri(mut self, uri: &str) -> Self {
        self.base_uri = Some(uri.into());
        self
    }

    /// Fix the encoding of documents. The encoding declaration is ignored.
    pub fn set_encoding(mut self, encoding: &str) -> Self {
        self.encoding = Some(encoding.to_owned());
        self
    }

    pub fn build(self) -> XMLReader<H> {
        let mut reader = XMLReader {
            source: Box::new(InputSource::progressive()),
            source_stack: vec![],
            handler: self.handler,
            locator: Arc::new(Locator::default()),
            config: self.config,
            limits: self.limits,
            default_base_uri: self.base_uri,
            base_uri: None,
            external_encoding: self.encoding,
            state: ParserState::BeforeStart,
            context: ProgressiveContext::default(),
            version: XMLVersion::default(),
            encoding: None,
            standalone: None,
            dtd_name: None,
            has_internal_subset: false,
            has_external_subset: false,
            has_parameter_entity: false,
            namespaces: NamespaceStack::new(),
            dict: NameDictionary::new(),
            entities: EntityMap::default(),
            notations: HashMap::new(),
            elementdecls: ElementDeclMap::default(),
            attlistdecls: AttlistDeclMap::default(),
            copied: 0,
            consumed_external: 0,
            fatal_error_occurred: false,
            fatal_count: 0,
            ns_well_formed: true,
            first_fatal: None,
            last_error: None,
            setup_error: None,
        };
        reader.reset();
        reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_flags() {
        let mut config = ParserConfig::default();
        assert!(config.is_enable(ParserOption::Namespaces));
        assert!(!config.is_enable(ParserOption::Huge));
        config |= ParserOption::Huge;
        assert!(config.is_enable(ParserOption::Huge));
        config.disable(ParserOption::Namespaces);
        assert!(!config.is_enable(ParserOption::Namespaces));
        let config = ParserOption::ExternalGeneralEntities | ParserOption::ExternalParameterEntities;
        assert!(config.is_enable(ParserOption::ExternalParameterEntities));
        assert!(!config.is_enable(ParserOption::ResolveDTDURIs));
    }

    #[test]
    fn huge_limits_replace_configured_ones() {
        let limits = ParserLimits {
            max_element_depth: 3,
            ..Default::default()
        };
        let reader = XMLReaderBuilder::new().set_limits(limits).build();
        assert_eq!(reader.limits().max_element_depth, 3);
        let reader = XMLReaderBuilder::new()
            .set_limits(limits)
            .enable_option(ParserOption::Huge)
            .build();
        assert_eq!(reader.limits(), ParserLimits::huge());
    }

    #[test]
    fn default_builder_is_new_builder() {
        let mut reader = XMLReaderBuilder::default().build();
        assert_eq!(reader.limits(), ParserLimits::default());
        assert!(reader.parse_str("<a/>", None).is_ok());
        assert!(reader.is_well_formed());
    }
}
