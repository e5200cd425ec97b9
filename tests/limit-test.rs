use streamxml::{
    error::XMLError,
    sax::{
        error::SAXParseError,
        handler::{DebugHandler, EntityResolver, SAXHandler},
        parser::{ParserLimits, ParserOption, XMLReaderBuilder},
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
    document: &str,
    limits: ParserLimits,
    option: Option<ParserOption>,
) -> (String, Vec<SAXParseError>, Result<(), XMLError>) {
    let mut builder = XMLReaderBuilder::new()
        .set_handler(DebugHandler::new(Diagnostics::default()))
        .set_limits(limits);
    if let Some(option) = option {
        builder = builder.enable_option(option);
    }
    let mut reader = builder.build();
    let result = reader.parse_str(document, None);
    let handler = reader.handler_mut();
    (
        std::mem::take(&mut handler.buffer),
        std::mem::take(&mut handler.child.errors),
        result,
    )
}

#[test]
fn name_length_is_limited() {
    let limits = ParserLimits {
        max_name_length: 8,
        ..Default::default()
    };

    let (_, errors, result) = parse("<abcdefgh attr5678='1'/>", limits, None);
    assert!(result.is_ok(), "{result:?}");
    assert!(errors.is_empty());

    for document in ["<abcdefghi/>", "<a attr56789='1'/>"] {
        let (_, _, result) = parse(document, limits, None);
        assert!(matches!(result, Err(XMLError::ParserTooLongName)), "{document}: {result:?}");

        let (log, _, result) = parse(document, limits, Some(ParserOption::Huge));
        assert!(result.is_ok(), "{document}: {result:?}");
        assert!(log.ends_with("endDocument()\n"));
    }
}

#[test]
fn content_model_depth_is_limited() {
    let limits = ParserLimits {
        max_content_model_depth: 3,
        ..Default::default()
    };

    let (log, errors, result) = parse("<!DOCTYPE r [<!ELEMENT r (((a)))>]><r/>", limits, None);
    assert!(result.is_ok(), "{result:?}");
    assert!(errors.is_empty());
    assert!(log.contains("elementDecl(r, "));

    let document = "<!DOCTYPE r [<!ELEMENT r ((((a))))>]><r/>";
    let (log, errors, result) = parse(document, limits, None);
    assert!(matches!(result, Err(XMLError::ParserTooDeepContentModel)), "{result:?}");
    assert!(matches!(errors[0].error, XMLError::ParserTooDeepContentModel));
    assert!(!log.contains("elementDecl"));

    let (log, _, result) = parse(document, limits, Some(ParserOption::Huge));
    assert!(result.is_ok(), "{result:?}");
    assert!(log.contains("elementDecl(r, "));
}

#[test]
fn text_length_is_limited() {
    let limits = ParserLimits {
        max_text_length: 16,
        ..Default::default()
    };
    let fits = "x".repeat(16);
    let overflows = "x".repeat(17);

    let (log, errors, result) = parse(&format!("<a b='{fits}'>{fits}</a>"), limits, None);
    assert!(result.is_ok(), "{result:?}");
    assert!(errors.is_empty());
    assert!(log.contains(&format!("characters({fits})\n")));

    let documents = [
        format!("<a>{overflows}</a>"),
        format!("<a b='{overflows}'/>"),
        format!("<a><!--{overflows}--></a>"),
        format!("<a><![CDATA[{overflows}]]></a>"),
    ];
    for document in &documents {
        let (_, _, result) = parse(document, limits, None);
        assert!(matches!(result, Err(XMLError::ParserTooLongText)), "{document}: {result:?}");

        let (_, errors, result) = parse(document, limits, Some(ParserOption::Huge));
        assert!(result.is_ok(), "{document}: {result:?}");
        assert!(errors.is_empty());
    }
}

#[test]
fn fourth_edition_names() {
    // U+3400 is a name character since the 5th edition only
    let document = "<\u{3400}/>";
    let (log, errors, result) = parse(document, ParserLimits::default(), None);
    assert!(result.is_ok(), "{result:?}");
    assert!(errors.is_empty());
    assert!(log.contains("startElement(None, Some(\"\u{3400}\"), \u{3400})\n"));

    let (log, _, result) = parse(
        document,
        ParserLimits::default(),
        Some(ParserOption::FourthEditionNames),
    );
    assert!(matches!(result, Err(XMLError::ParserEmptyName)), "{result:?}");
    assert!(!log.contains("startElement"));

    // names that are valid under both editions
    let (_, errors, result) = parse(
        "<\u{e9}l\u{e8}ve \u{3042}='1'/>",
        ParserLimits::default(),
        Some(ParserOption::FourthEditionNames),
    );
    assert!(result.is_ok(), "{result:?}");
    assert!(errors.is_empty());
}
