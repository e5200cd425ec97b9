use streamxml::{
    error::{XMLError, XMLErrorLevel},
    sax::{
        error::SAXParseError,
        handler::{DebugHandler, EntityResolver, SAXHandler},
        parser::{XMLReader, XMLReaderBuilder},
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

// errors are compared by their `Debug` form
type Outcome = (String, Vec<(String, XMLErrorLevel, usize)>, Result<(), String>);

fn new_reader() -> XMLReader<DebugHandler<Diagnostics>> {
    XMLReaderBuilder::new()
        .set_handler(DebugHandler::new(Diagnostics::default()))
        .build()
}

fn outcome(reader: &mut XMLReader<DebugHandler<Diagnostics>>, result: Result<(), XMLError>) -> Outcome {
    let handler = reader.handler_mut();
    let errors = std::mem::take(&mut handler.child.errors)
        .into_iter()
        .map(|e| (format!("{:?}", e.error), e.level, e.line))
        .collect();
    (
        std::mem::take(&mut handler.buffer),
        errors,
        result.map_err(|e| format!("{e:?}")),
    )
}

fn one_shot(document: &[u8]) -> Outcome {
    let mut reader = new_reader();
    let result = reader.parse_bytes(document, None, None);
    outcome(&mut reader, result)
}

fn chunked(document: &[u8], size: usize) -> Outcome {
    let mut reader = new_reader();
    let mut result = Ok(());
    for chunk in document.chunks(size) {
        result = reader.push(chunk, false);
        if result.is_err() {
            break;
        }
    }
    if result.is_ok() {
        result = reader.push(&[], true);
    }
    outcome(&mut reader, result)
}

fn assert_chunk_independent(document: &[u8]) {
    let expected = one_shot(document);
    for size in [1, 2, 3, 7, 64] {
        let actual = chunked(document, size);
        assert_eq!(actual.0, expected.0, "events differ with chunks of {size} bytes");
        assert_eq!(actual.1, expected.1, "diagnostics differ with chunks of {size} bytes");
        assert_eq!(actual.2, expected.2, "results differ with chunks of {size} bytes");
    }
}

const RICH_DOCUMENT: &str = "<?xml version='1.0' encoding='UTF-8'?>\r
<!-- prolog -->\r
<!DOCTYPE doc [\r
  <!ELEMENT doc (item*)>\r
  <!ATTLIST item kind (x|y) 'x' note CDATA #IMPLIED>\r
  <!ENTITY greet \"h\u{e9}llo &amp; <b>bye</b>\">\r
  <!-- ]> inside a comment -->\r
  <?subset-pi with '>' in data?>\r
  <!ENTITY % unused 'no>tvisible'>\r
]>\r
<doc xmlns='urn:default' xmlns:p=\"urn:p\">\r
  <item note='a&#x20;b &lt; c'>caf\u{e9} \u{65e5}\u{672c} \u{1f600} &#169;&#x10000;</item>\r
  <p:item kind='y'><![CDATA[<raw> & ]] text]]></p:item>\r
  <?app run now?>\r
  <item>&greet;</item>\r
</doc>\r
<!-- epilog -->\r
";

#[test]
fn rich_document() {
    assert_chunk_independent(RICH_DOCUMENT.as_bytes());
    let (log, errors, result) = one_shot(RICH_DOCUMENT.as_bytes());
    assert!(result.is_ok());
    assert!(errors.is_empty(), "{errors:?}");
    assert!(log.contains("characters(caf\u{e9} \u{65e5}\u{672c} \u{1f600} \u{a9}\u{10000})\n"));
    assert!(log.contains("characters(<raw> & ]] text)\n"));
    assert!(log.contains("startEntity(greet)\n"));
    assert!(!log.contains('\r'));
}

#[test]
fn utf16_documents() {
    let text = "<?xml version='1.0' encoding='UTF-16'?>\n<a b='\u{3042}'>\u{1f600} &#x41;</a>";
    let le = [0xFF, 0xFE]
        .into_iter()
        .chain(text.encode_utf16().flat_map(u16::to_le_bytes))
        .collect::<Vec<_>>();
    let be = [0xFE, 0xFF]
        .into_iter()
        .chain(text.encode_utf16().flat_map(u16::to_be_bytes))
        .collect::<Vec<_>>();

    for document in [le, be] {
        assert_chunk_independent(&document);
        let (log, errors, result) = one_shot(&document);
        assert!(result.is_ok());
        assert!(errors.is_empty(), "{errors:?}");
        assert!(log.contains("characters(\u{1f600} A)\n"));
    }
}

#[test]
fn declared_single_byte_encoding() {
    let mut document = b"<?xml version='1.0' encoding='ISO-8859-1'?><a>caf".to_vec();
    document.push(0xE9);
    document.extend_from_slice(b"</a>");
    assert_chunk_independent(&document);
    let (log, _, result) = one_shot(&document);
    assert!(result.is_ok());
    assert!(log.contains("characters(caf\u{e9})\n"));
}

#[test]
fn recoverable_errors() {
    assert_chunk_independent(b"<a b='1' b='2'>x ]]> y</a>");
    assert_chunk_independent(b"<!DOCTYPE a [<!ATTLIST a b CDATA><!ENTITY e 'v'>]><a>&e;</a>");
    assert_chunk_independent(b"<a>&#0;&#x41;<b/></a>");
}

#[test]
fn unrecoverable_errors() {
    let (_, _, result) = one_shot(b"<a>\n<b>\n</a>\n<c/>");
    assert_eq!(result, Err("ParserMismatchElementType".to_owned()));
    assert_chunk_independent(b"<a>\n<b>\n</a>\n<c/>");
    assert_chunk_independent(b"<a><!-- never closed");
    assert_chunk_independent(b"<a/>trailing");
    assert_chunk_independent(b"<a x='1'");
}

#[test]
fn text_runs_are_reported_whole() {
    let document = b"<a>one&amp;two&#x33;\r\nthree<b/>four</a>";
    for size in [1, 2, 5] {
        let (log, _, result) = chunked(document, size);
        assert!(result.is_ok());
        assert!(log.contains("characters(one&two3\nthree)\n"), "{log}");
        assert!(log.contains("characters(four)\n"), "{log}");
    }
}

#[test]
fn events_are_delivered_before_push_returns() {
    let mut reader = new_reader();
    reader.push(b"<root><child", false).unwrap();
    assert!(reader.handler().buffer.contains("startElement(None, Some(\"root\"), root)"));
    assert!(!reader.handler().buffer.contains("child"));
    reader.push(b"/>", false).unwrap();
    assert!(reader.handler().buffer.contains("endElement(None, Some(\"child\"), child)"));
    reader.push(b"</root>", true).unwrap();
    assert!(reader.handler().buffer.ends_with("endDocument()\n"));
}

#[test]
fn feeding_after_finish() {
    let mut reader = new_reader();
    reader.push(b"<a/>", true).unwrap();
    assert!(reader.push(b"", true).is_ok());

    let mut reader = new_reader();
    assert!(reader.push(b"<a></b>", true).is_err());
    assert!(matches!(
        reader.push(b"<c/>", true),
        Err(XMLError::ParserMismatchElementType)
    ));
}
