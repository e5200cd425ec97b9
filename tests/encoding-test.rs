use streamxml::{
    error::{XMLError, XMLErrorLevel},
    sax::{
        error::SAXParseError,
        handler::{DebugHandler, EntityResolver, SAXHandler},
        parser::XMLReaderBuilder,
    },
};

#[derive(Default)]
struct Diagnostics {
    errors: Vec<SAXParseError>,
}

impl EntityResolver for Diagnostics {}
impl SAXHandler for Diagnostics {
    fn error(&mut self, error: SAXParseError) {
        self.errors.push(error);
    }
    fn fatal_error(&mut self, error: SAXParseError) {
        self.errors.push(error);
    }
    fn warning(&mut self, error: SAXParseError) {
        self.errors.push(error);
    }
}

fn parse(
    document: &[u8],
    encoding: Option<&str>,
) -> (String, Vec<SAXParseError>, Result<(), XMLError>) {
    let mut reader = XMLReaderBuilder::new()
        .set_handler(DebugHandler::new(Diagnostics::default()))
        .build();
    let result = reader.parse_bytes(document, encoding, None);
    let handler = reader.handler_mut();
    (
        std::mem::take(&mut handler.buffer),
        std::mem::take(&mut handler.child.errors),
        result,
    )
}

fn utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

fn utf16be(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_be_bytes).collect()
}

#[test]
fn utf8_with_and_without_bom() {
    let (log, errors, result) = parse(b"\xEF\xBB\xBF<a>caf\xC3\xA9</a>", None);
    assert!(result.is_ok());
    assert!(errors.is_empty());
    assert!(log.contains("characters(caf\u{e9})\n"));

    let (log, _, result) = parse("<a>\u{1f600}</a>".as_bytes(), None);
    assert!(result.is_ok());
    assert!(log.contains("characters(\u{1f600})\n"));
}

#[test]
fn utf16_is_detected() {
    let text = "<?xml version='1.0' encoding='UTF-16'?><a>\u{3042}</a>";
    let documents = [
        [b"\xFF\xFE".to_vec(), utf16le(text)].concat(),
        [b"\xFE\xFF".to_vec(), utf16be(text)].concat(),
        // the declaration identifies the byte order without BOM
        utf16le(text),
        utf16be(text),
    ];
    for document in documents {
        let (log, errors, result) = parse(&document, None);
        assert!(result.is_ok(), "{result:?}");
        assert!(errors.is_empty(), "{errors:?}");
        assert!(log.contains("declaration(1.0, Some(\"UTF-16\"), None)\n"));
        assert!(log.contains("characters(\u{3042})\n"));
    }
}

#[test]
fn declared_encoding_switches_decoder() {
    let mut document = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a>".to_vec();
    document.extend_from_slice(&[0xC0, 0xE9, 0xFF]);
    document.extend_from_slice(b"</a>");
    let (log, errors, result) = parse(&document, None);
    assert!(result.is_ok());
    assert!(errors.is_empty());
    assert!(log.contains("characters(\u{c0}\u{e9}\u{ff})\n"));
}

#[test]
fn declaration_conflicts() {
    // UTF-16 is declared for an 8-bit entity
    let (_, _, result) = parse(b"<?xml version='1.0' encoding='UTF-16'?><a/>", None);
    assert!(matches!(result, Err(XMLError::ParserEncodingMismatch)));

    // a BOM wins over the declaration
    let text = "<?xml version='1.0' encoding='ISO-8859-1'?><a>\u{e9}</a>";
    let document = [b"\xFF\xFE".to_vec(), utf16le(text)].concat();
    let (log, errors, result) = parse(&document, None);
    assert!(result.is_ok());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].level, XMLErrorLevel::Warning);
    assert!(matches!(errors[0].error, XMLError::ParserEncodingMismatch));
    assert!(log.contains("characters(\u{e9})\n"));
}

#[test]
fn unsupported_encodings() {
    let (_, _, result) = parse(b"<?xml version='1.0' encoding='x-no-such-encoding'?><a/>", None);
    assert!(matches!(result, Err(XMLError::ParserUnsupportedEncoding)));

    // UCS-4 is never detected as anything else
    for head in [[0x00, 0x00, 0x00, 0x3C], [0x3C, 0x00, 0x00, 0x00]] {
        let mut document = head.to_vec();
        document.extend_from_slice(&[0; 12]);
        let (log, errors, result) = parse(&document, None);
        assert!(matches!(result, Err(XMLError::ParserUnsupportedEncoding)));
        assert_eq!(errors.len(), 1);
        assert!(!log.contains("startDocument"));
    }
}

#[test]
fn malformed_input() {
    let (log, _, result) = parse(b"<a>ok\xFFbroken</a>", None);
    assert!(matches!(result, Err(XMLError::DecodeError(_))));
    assert!(!log.contains("broken"));

    let (_, _, result) = parse(b"<?xml version='1.0' encoding='US-ASCII'?><a>\xE9</a>", None);
    assert!(matches!(result, Err(XMLError::DecodeError(_))));
}

#[test]
fn external_encoding_overrides_declaration() {
    let document = b"<?xml version='1.0' encoding='UTF-8'?><a>\xE9</a>";
    let (log, errors, result) = parse(document, Some("ISO-8859-1"));
    assert!(result.is_ok(), "{result:?}");
    assert!(errors.is_empty());
    assert!(log.contains("characters(\u{e9})\n"));

    // a matching BOM is skipped
    let document = [b"\xFF\xFE".to_vec(), utf16le("<a>x</a>")].concat();
    let (log, _, result) = parse(&document, Some("UTF-16LE"));
    assert!(result.is_ok(), "{result:?}");
    assert!(log.contains("characters(x)\n"));

    let (_, _, result) = parse(b"<a/>", Some("x-no-such-encoding"));
    assert!(matches!(result, Err(XMLError::ParserUnsupportedEncoding)));
}

#[test]
fn builder_encoding_applies_to_every_document() {
    let mut reader = XMLReaderBuilder::new()
        .set_handler(DebugHandler::new(Diagnostics::default()))
        .set_encoding("ISO-8859-1")
        .build();
    for _ in 0..2 {
        reader.reset();
        reader.push(b"<a>\xFC</a>", true).unwrap();
        assert!(reader.handler().buffer.contains("characters(\u{fc})\n"));
        reader.handler_mut().buffer.clear();
    }
}
