use streamxml::{
    error::{XMLError, XMLErrorDomain, XMLErrorLevel},
    sax::{
        error::SAXParseError,
        handler::{DebugHandler, DefaultSAXHandler, EntityResolver, HandlerError, SAXHandler},
        parser::{ParserOption, XMLReaderBuilder},
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

fn parse(document: &str) -> (String, Vec<SAXParseError>, Result<(), XMLError>) {
    let mut reader = XMLReaderBuilder::new()
        .set_handler(DebugHandler::new(Diagnostics::default()))
        .build();
    let result = reader.parse_str(document, None);
    let handler = reader.handler_mut();
    (
        std::mem::take(&mut handler.buffer),
        std::mem::take(&mut handler.child.errors),
        result,
    )
}

#[test]
fn element_and_text_events() {
    let (log, errors, result) = parse(r#"<a x="1"><b>hi&amp;there</b></a>"#);
    assert!(result.is_ok());
    assert!(errors.is_empty());
    assert_eq!(
        log,
        r#"setDocumentLocator()
startDocument()
startElement(None, Some("a"), a, {None}x='1')
startElement(None, Some("b"), b)
characters(hi&there)
endElement(None, Some("b"), b)
endElement(None, Some("a"), a)
endDocument()
"#
    );
}

#[test]
fn prefixed_element_in_scope() {
    let (log, errors, result) = parse(r#"<a xmlns:p="urn:x"><p:b/></a>"#);
    assert!(result.is_ok());
    assert!(errors.is_empty());
    assert_eq!(
        log,
        r#"setDocumentLocator()
startDocument()
startPrefixMapping(Some("p"), urn:x)
startElement(None, Some("a"), a, {Some("http://www.w3.org/2000/xmlns/")}p='urn:x')
startElement(Some("urn:x"), Some("b"), p:b)
endElement(Some("urn:x"), Some("b"), p:b)
endElement(None, Some("a"), a)
endPrefixMapping(Some("p"))
endDocument()
"#
    );
}

#[test]
fn mismatched_end_tag_names_start_line() {
    let (log, errors, result) = parse("<a>\n<b>\n</a>\n<c/>");
    assert!(matches!(result, Err(XMLError::ParserMismatchElementType)));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].level, XMLErrorLevel::FatalError);
    assert!(
        errors[0].message.contains("line 2"),
        "{}",
        errors[0].message
    );
    assert_eq!(
        log,
        r#"setDocumentLocator()
startDocument()
startElement(None, Some("a"), a)
characters(
)
startElement(None, Some("b"), b)
characters(
)
"#
    );
}

#[test]
fn broken_attlist_decl_is_skipped() {
    let (log, errors, result) = parse(
        r#"<!DOCTYPE x [<!ENTITY e "v"><!ATTLIST x a CDATA "v"?><!ENTITY f "w">]><x>&f;</x>"#,
    );
    assert!(matches!(result, Err(XMLError::ParserInvalidAttlistDecl)));
    // `f` is declared after the broken declaration, so the reference is fine
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(matches!(errors[0].error, XMLError::ParserInvalidAttlistDecl));
    assert_eq!(
        log,
        r#"setDocumentLocator()
startDocument()
startDTD(x, None, None)
internalEntityDecl(e, v)
"#
    );
}

#[test]
fn prolog_and_misc_events() {
    let (log, errors, result) = parse(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone='yes'?>\r\n\
         <!-- head -->\n\
         <?pi data  here?>\n\
         <root><![CDATA[<not markup>]]><?empty?></root>\n\
         <!-- tail -->\n",
    );
    assert!(result.is_ok());
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(
        log,
        r#"setDocumentLocator()
startDocument()
declaration(1.0, Some("UTF-8"), Some(true))
comment( head )
processingInstruction(pi, Some("data  here"))
startElement(None, Some("root"), root)
startCDATA()
characters(<not markup>)
endCDATA()
processingInstruction(empty, None)
endElement(None, Some("root"), root)
comment( tail )
endDocument()
"#
    );
}

#[test]
fn text_normalization() {
    let (log, errors, result) = parse("<a b='x\r\ny&#9;z'>1\r\n2\r3&#x41;&#66;&lt;&gt;&apos;&quot;</a>");
    assert!(result.is_ok());
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(
        log,
        "setDocumentLocator()\n\
         startDocument()\n\
         startElement(None, Some(\"a\"), a, {None}b='x y\tz')\n\
         characters(1\n2\n3AB<>'\")\n\
         endElement(None, Some(\"a\"), a)\n\
         endDocument()\n"
    );
}

#[test]
fn declarations_and_default_attributes() {
    let (log, errors, result) = parse(
        r#"<!DOCTYPE doc [
<!ELEMENT doc (head, (p | list)*)>
<!ELEMENT p (#PCDATA | em)*>
<!ELEMENT em EMPTY>
<!ATTLIST doc
    id ID #IMPLIED
    kind (a | b) "a"
    fixed CDATA #FIXED "  f  ">
<!NOTATION png SYSTEM "image/png">
<!ENTITY logo SYSTEM "logo.png" NDATA png>
<!ENTITY % pe "unused">
]>
<doc id=" i1 "/>"#,
    );
    assert!(result.is_ok(), "{result:?}");
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(
        log,
        r#"setDocumentLocator()
startDocument()
startDTD(doc, None, None)
elementDecl(doc, (head,(p|list)*))
elementDecl(p, (#PCDATA|em)*)
elementDecl(em, EMPTY)
attributeDecl(doc, id, ID, #IMPLIED)
attributeDecl(doc, kind, (a|b), "a")
attributeDecl(doc, fixed, CDATA, #FIXED "  f  ")
notationDecl(png, None, Some("image/png"))
unparsedEntityDecl(logo, None, logo.png, png)
internalEntityDecl(%pe, unused)
endDTD()
startElement(None, Some("doc"), doc, {None}id='i1', {None}kind='a', {None}fixed='  f  ')
endElement(None, Some("doc"), doc)
endDocument()
"#
    );
}

#[test]
fn undeclared_notation_is_a_validity_error() {
    let (_, errors, result) = parse(r#"<!DOCTYPE d [<!ENTITY u SYSTEM "u.bin" NDATA bin>]><d/>"#);
    assert!(result.is_ok());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].level, XMLErrorLevel::Error);
    assert_eq!(errors[0].domain, XMLErrorDomain::DTDValid);
    assert!(matches!(errors[0].error, XMLError::ParserUndeclaredNotation));
}

#[test]
fn well_formedness_errors() {
    let cases: &[(&str, fn(&XMLError) -> bool)] = &[
        ("<a b='1' b='2'/>", |e| matches!(e, XMLError::ParserDuplicateAttributes)),
        ("<a>]]></a>", |e| matches!(e, XMLError::ParserUnacceptablePatternInCharData)),
        ("<a><!-- a -- b --></a>", |e| matches!(e, XMLError::ParserInvalidComment)),
        ("<a><?xml version='1.0'?></a>", |e| matches!(e, XMLError::ParserUnacceptablePITarget)),
        ("<a b='<'/>", |e| matches!(e, XMLError::ParserInvalidAttValue)),
        ("<a>&#0;</a>", |e| matches!(e, XMLError::ParserInvalidCharacterReference)),
        ("<a>&undeclared;</a>", |e| matches!(e, XMLError::ParserUndeclaredEntityReference)),
        ("<a>\u{1}</a>", |e| matches!(e, XMLError::ParserInvalidCharacter)),
        ("", |e| matches!(e, XMLError::ParserEmptyDocument)),
        ("<a/><b/>", |e| matches!(e, XMLError::ParserUnexpectedDocumentContent)),
        ("text<a/>", |e| matches!(e, XMLError::ParserUnexpectedDocumentContent)),
        ("<a>", |e| matches!(e, XMLError::ParserUnexpectedEOF)),
        ("<a/><!DOCTYPE a>", |e| matches!(e, XMLError::ParserMultipleDoctypeDecl)),
        ("<?xml version='2.0'?><a/>", |e| matches!(e, XMLError::ParserUnsupportedXMLVersion)),
    ];
    for (document, expected) in cases {
        let (_, errors, result) = parse(document);
        assert!(result.is_err(), "{document}");
        let first = errors
            .iter()
            .find(|e| e.level == XMLErrorLevel::FatalError)
            .unwrap_or_else(|| panic!("no fatal error: {document}"));
        assert!(expected(&first.error), "{document}: {:?}", first.error);
    }
}

#[test]
fn events_stop_after_fatal_error() {
    let (log, _, result) = parse("<a><b>&#xZ;</b><c/></a>");
    assert!(matches!(result, Err(XMLError::ParserInvalidCharacterReference)));
    assert_eq!(
        log,
        r#"setDocumentLocator()
startDocument()
startElement(None, Some("a"), a)
startElement(None, Some("b"), b)
"#
    );
}

#[test]
fn nesting_depth_is_limited() {
    let mut reader = XMLReaderBuilder::new()
        .set_limits(streamxml::sax::parser::ParserLimits {
            max_element_depth: 3,
            ..Default::default()
        })
        .build();
    assert!(reader.parse_str("<a><b><c/></b></a>", None).is_ok());
    assert!(matches!(
        reader.parse_str("<a><b><c><d/></c></b></a>", None),
        Err(XMLError::ParserTooDeepElement)
    ));
    reader.set_config(reader.config() | ParserOption::Huge);
    assert!(reader.parse_str("<a><b><c><d/></c></b></a>", None).is_ok());
}

struct FailingHandler {
    elements: usize,
    failed: bool,
}

impl EntityResolver for FailingHandler {}
impl SAXHandler for FailingHandler {
    fn start_element(
        &mut self,
        _: Option<&str>,
        _: Option<&str>,
        _: &str,
        _: &streamxml::sax::attributes::Attributes,
    ) {
        self.elements += 1;
        if self.elements == 2 {
            self.failed = true;
        }
    }

    fn take_error(&mut self) -> Option<HandlerError> {
        std::mem::take(&mut self.failed).then(|| HandlerError::new("enough"))
    }
}

#[test]
fn handler_failure_terminates_parsing() {
    let mut reader = XMLReaderBuilder::new()
        .set_handler(FailingHandler {
            elements: 0,
            failed: false,
        })
        .build();
    let result = reader.parse_str("<a><b/><c/><d/></a>", None);
    assert!(matches!(result, Err(XMLError::ParserHandlerFailure(_))));
    assert_eq!(reader.handler().elements, 2);
    assert!(!reader.is_well_formed());
}

#[test]
fn stop_and_reset() {
    let mut reader = XMLReaderBuilder::new().build();
    reader.push(b"<a>", false).unwrap();
    reader.stop();
    assert!(matches!(reader.push(b"</a>", true), Err(XMLError::ParserStopped)));
    assert!(matches!(reader.push(b"", true), Err(XMLError::ParserStopped)));

    reader.reset();
    assert!(reader.push(b"<a>", false).is_ok());
    assert!(reader.push(b"</a>", true).is_ok());
    assert!(reader.is_well_formed());
}

#[test]
fn one_shot_from_reader() {
    let document = format!("<r>{}</r>", "<i>text</i>".repeat(2000));
    let mut reader = XMLReaderBuilder::new()
        .set_handler(DebugHandler::new(DefaultSAXHandler))
        .build();
    reader
        .parse_reader(document.as_bytes(), None, None)
        .unwrap();
    let from_reader = std::mem::take(&mut reader.handler_mut().buffer);
    reader.parse_str(&document, None).unwrap();
    assert_eq!(from_reader, reader.handler().buffer);
}

#[derive(Default)]
struct AttributeProbe {
    seen: Vec<String>,
}

impl EntityResolver for AttributeProbe {}
impl SAXHandler for AttributeProbe {
    fn start_element(
        &mut self,
        _: Option<&str>,
        _: Option<&str>,
        qname: &str,
        atts: &streamxml::sax::attributes::Attributes,
    ) {
        if qname != "e" {
            return;
        }
        assert_eq!(atts.len(), 4);
        assert!(atts.contains_qname("p:a"));
        assert!(atts.contains_expanded_name(Some("urn:p"), "a"));
        assert_eq!(atts.get_value_by_qname("plain"), Some("1"));
        assert_eq!(atts.get_value_by_expanded_name(Some("urn:p"), "a"), Some("2"));
        assert_eq!(atts.get_value_by_expanded_name(None, "dflt"), Some("d"));

        let index = atts.get_index_by_qname("p:a").unwrap();
        assert_eq!(atts.get_index_by_expanded_name(Some("urn:p"), "a"), Some(index));
        assert_eq!(atts.get_qname(index), Some("p:a"));
        assert_eq!(atts.get_local_name(index), Some("a"));
        assert_eq!(atts.get_namespace_uri(index), Some("urn:p"));
        assert_eq!(atts.get_value(index), Some("2"));
        assert_eq!(atts[index].prefix(), Some("p"));
        assert_eq!(atts.get_value(atts.len()), None);

        for att in atts {
            self.seen.push(format!(
                "{} declared={} specified={} nsdecl={}",
                att.qname,
                att.is_declared(),
                att.is_specified(),
                att.is_nsdecl()
            ));
        }
    }
}

#[test]
fn attribute_accessors() {
    let document = r#"<!DOCTYPE r [<!ATTLIST e plain CDATA #IMPLIED dflt CDATA "d">]>
<r xmlns:p="urn:p"><e plain="1" p:a="2" xmlns:q="urn:q"/></r>"#;
    let mut reader = XMLReaderBuilder::new()
        .set_handler(AttributeProbe::default())
        .build();
    reader.parse_str(document, None).unwrap();
    assert_eq!(
        reader.handler().seen,
        [
            "plain declared=true specified=true nsdecl=false",
            "p:a declared=false specified=true nsdecl=false",
            "xmlns:q declared=false specified=true nsdecl=true",
            "dflt declared=true specified=false nsdecl=false",
        ]
    );
}
