use streamxml::{
    error::{XMLError, XMLErrorDomain, XMLErrorLevel},
    sax::{
        error::SAXParseError,
        handler::{DebugHandler, EntityResolver, SAXHandler},
        parser::{ParserOption, XMLReader, XMLReaderBuilder},
    },
};

const XML_NS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

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

struct Parsed {
    log: String,
    errors: Vec<SAXParseError>,
    result: Result<(), XMLError>,
    well_formed: bool,
    ns_well_formed: bool,
}

fn parse_by(mut reader: XMLReader<DebugHandler<Diagnostics>>, document: &str) -> Parsed {
    let result = reader.parse_str(document, None);
    let well_formed = reader.is_well_formed();
    let ns_well_formed = reader.is_namespace_well_formed();
    let handler = reader.handler_mut();
    Parsed {
        log: std::mem::take(&mut handler.buffer),
        errors: std::mem::take(&mut handler.child.errors),
        result,
        well_formed,
        ns_well_formed,
    }
}

fn parse(document: &str) -> Parsed {
    let reader = XMLReaderBuilder::new()
        .set_handler(DebugHandler::new(Diagnostics::default()))
        .build();
    parse_by(reader, document)
}

#[test]
fn default_namespace_and_undeclaring() {
    let parsed = parse(r#"<a xmlns="urn:d"><b x="1"/><c xmlns=""><d/></c></a>"#);
    assert!(parsed.result.is_ok());
    assert!(parsed.errors.is_empty());
    assert_eq!(
        parsed.log,
        format!(
            r#"setDocumentLocator()
startDocument()
startPrefixMapping(None, urn:d)
startElement(Some("urn:d"), Some("a"), a, {{Some("{ns}")}}xmlns='urn:d')
startElement(Some("urn:d"), Some("b"), b, {{None}}x='1')
endElement(Some("urn:d"), Some("b"), b)
startPrefixMapping(None, )
startElement(None, Some("c"), c, {{Some("{ns}")}}xmlns='')
startElement(None, Some("d"), d)
endElement(None, Some("d"), d)
endElement(None, Some("c"), c)
endPrefixMapping(None)
endElement(Some("urn:d"), Some("a"), a)
endPrefixMapping(None)
endDocument()
"#,
            ns = XML_NS_NAMESPACE
        )
    );
}

#[test]
fn prefixes_are_scoped() {
    let parsed = parse(
        r#"<p:a xmlns:p="urn:outer"><p:b xmlns:p="urn:inner" p:x="1"/><p:c p:y="2"/></p:a>"#,
    );
    assert!(parsed.result.is_ok());
    assert!(parsed.ns_well_formed);
    assert!(parsed.log.contains(r#"startElement(Some("urn:inner"), Some("b"), p:b, "#));
    assert!(parsed.log.contains(r#"{Some("urn:inner")}x='1')"#));
    assert!(parsed
        .log
        .contains(r#"startElement(Some("urn:outer"), Some("c"), p:c, {Some("urn:outer")}y='2')"#));
    assert_eq!(parsed.log.matches("endPrefixMapping(Some(\"p\"))").count(), 2);
}

#[test]
fn unbound_prefixes() {
    for document in ["<p:a/>", "<a q:x='1'/>"] {
        let parsed = parse(document);
        assert!(parsed.result.is_ok(), "{document}");
        assert!(parsed.well_formed);
        assert!(!parsed.ns_well_formed);
        assert_eq!(parsed.errors.len(), 1);
        assert!(matches!(parsed.errors[0].error, XMLError::ParserUndefinedNamespace));
        assert_eq!(parsed.errors[0].domain, XMLErrorDomain::Namespace);
        assert_eq!(parsed.errors[0].level, XMLErrorLevel::Error);
    }
    // the element is still reported
    let parsed = parse("<p:a/>");
    assert!(parsed.log.contains(r#"startElement(None, Some("a"), p:a)"#));
}

#[test]
fn reserved_prefixes_and_names() {
    let fatal = [
        r#"<a xmlns:xml="urn:other"/>"#,
        r#"<a xmlns:xmlns="urn:other"/>"#,
        r#"<a xmlns:p="http://www.w3.org/XML/1998/namespace"/>"#,
        r#"<a xmlns="http://www.w3.org/2000/xmlns/"/>"#,
    ];
    for document in fatal {
        let parsed = parse(document);
        assert!(
            matches!(parsed.result, Err(XMLError::ParserUnacceptableNamespaceName)),
            "{document}: {:?}",
            parsed.result
        );
    }

    let parsed = parse(r#"<a xmlns:xml="http://www.w3.org/XML/1998/namespace" xml:lang="en"/>"#);
    assert!(parsed.result.is_ok());
    assert!(parsed.errors.is_empty());
    assert!(parsed
        .log
        .contains(r#"{Some("http://www.w3.org/XML/1998/namespace")}lang='en'"#));
}

#[test]
fn prefix_cannot_be_undeclared() {
    let parsed = parse(r#"<a xmlns:p="urn:x"><b xmlns:p=""/></a>"#);
    assert!(parsed.result.is_ok());
    assert!(!parsed.ns_well_formed);
    assert!(matches!(parsed.errors[0].error, XMLError::ParserUnacceptableNamespaceName));
}

#[test]
fn duplicate_expanded_names() {
    let parsed = parse(r#"<a xmlns:p="urn:x" xmlns:q="urn:x" p:b="1" q:b="2"/>"#);
    assert!(parsed.result.is_ok());
    assert!(parsed.well_formed);
    assert!(!parsed.ns_well_formed);
    assert!(matches!(parsed.errors[0].error, XMLError::ParserDuplicateAttributes));
}

#[test]
fn relative_namespace_name_is_a_warning() {
    let parsed = parse(r#"<a xmlns="relative"/>"#);
    assert!(parsed.result.is_ok());
    assert!(parsed.ns_well_formed);
    assert_eq!(parsed.errors.len(), 1);
    assert_eq!(parsed.errors[0].level, XMLErrorLevel::Warning);
    assert!(matches!(parsed.errors[0].error, XMLError::ParserNamespaceNameNotURI));
}

#[test]
fn redundant_declarations_are_cleaned() {
    let document = r#"<a xmlns:p="urn:x"><b xmlns:p="urn:x" c="1"/></a>"#;

    let parsed = parse(document);
    assert_eq!(parsed.log.matches("startPrefixMapping").count(), 2);

    let reader = XMLReaderBuilder::new()
        .set_handler(DebugHandler::new(Diagnostics::default()))
        .enable_option(ParserOption::CleanNamespaces)
        .build();
    let parsed = parse_by(reader, document);
    assert!(parsed.result.is_ok());
    assert_eq!(parsed.log.matches("startPrefixMapping").count(), 1);
    assert!(parsed
        .log
        .contains("startElement(None, Some(\"b\"), b, {None}c='1')\n"));
}

#[test]
fn namespaces_disabled() {
    let reader = XMLReaderBuilder::new()
        .set_handler(DebugHandler::new(Diagnostics::default()))
        .disable_option(ParserOption::Namespaces)
        .build();
    let parsed = parse_by(reader, r#"<p:a xmlns:p="urn:x" q:b="1"/>"#);
    assert!(parsed.result.is_ok());
    assert!(parsed.errors.is_empty());
    assert!(!parsed.log.contains("PrefixMapping"));
    assert!(parsed
        .log
        .contains("startElement(None, None, p:a, xmlns:p='urn:x', q:b='1')\n"));
}
