use std::collections::HashMap;

use streamxml::{
    error::{XMLError, XMLErrorLevel},
    sax::{
        error::SAXParseError,
        handler::{DebugHandler, DefaultSAXHandler, EntityResolver, SAXHandler},
        parser::{ParserLimits, ParserOption, XMLReaderBuilder},
        source::InputSource,
    },
};

/// Serves external entities from memory, keyed by their system identifiers.
#[derive(Default)]
struct Resources {
    files: HashMap<&'static str, &'static [u8]>,
    errors: Vec<SAXParseError>,
}

impl Resources {
    fn with(files: &[(&'static str, &'static [u8])]) -> Self {
        Self {
            files: files.iter().copied().collect(),
            errors: vec![],
        }
    }
}

impl EntityResolver for Resources {
    fn resolve_entity(
        &mut self,
        _name: &str,
        _public_id: Option<&str>,
        _base_uri: Option<&str>,
        system_id: &str,
    ) -> Result<InputSource, XMLError> {
        self.files
            .get(system_id)
            .map(|bytes| InputSource::from_bytes(bytes.to_vec()))
            .ok_or(XMLError::ResolverEntityNotFound)
    }
}

impl SAXHandler for Resources {
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

fn parse_with(
    document: &str,
    resources: Resources,
    options: &[ParserOption],
) -> (String, Vec<SAXParseError>, Result<(), XMLError>) {
    let mut builder = XMLReaderBuilder::new().set_handler(DebugHandler::new(resources));
    for &option in options {
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

fn parse(document: &str) -> (String, Vec<SAXParseError>, Result<(), XMLError>) {
    parse_with(document, Resources::default(), &[])
}

#[test]
fn repeated_internal_entity() {
    let (log, errors, result) = parse(r#"<!DOCTYPE r [<!ENTITY e "x&amp;y">]><r>&e;&e;</r>"#);
    assert!(result.is_ok());
    assert!(errors.is_empty());
    assert!(log.contains(
        "startElement(None, Some(\"r\"), r)
startEntity(e)
characters(x&y)
endEntity()
startEntity(e)
characters(x&y)
endEntity()
endElement(None, Some(\"r\"), r)
"
    ));
}

#[test]
fn entity_with_markup() {
    let (log, errors, result) =
        parse(r#"<!DOCTYPE r [<!ENTITY e "<b id='1'>bold</b> &#38;#60;">]><r>&e;</r>"#);
    assert!(result.is_ok());
    assert!(errors.is_empty(), "{errors:?}");
    assert!(log.contains(
        "startEntity(e)
startElement(None, Some(\"b\"), b, {None}id='1')
characters(bold)
endElement(None, Some(\"b\"), b)
characters( <)
endEntity()
"
    ));
}

#[test]
fn recursive_entities() {
    let doctype = r#"<!DOCTYPE r [<!ENTITY a "x&b;"><!ENTITY b "y&a;">]>"#;
    for body in ["<r>&a;</r>", "<r v='&a;'/>"] {
        let mut reader = XMLReaderBuilder::new().build();
        let result = reader.parse_str(&format!("{doctype}{body}"), None);
        assert!(matches!(result, Err(XMLError::ParserEntityRecursion)), "{body}: {result:?}");
        assert!(!reader.is_well_formed());
    }
}

fn billion_laughs(body: &str) -> String {
    let mut document = String::from("<!DOCTYPE r [\n<!ENTITY lol0 \"lol\">\n");
    for i in 1..10 {
        let refs = format!("&lol{};", i - 1).repeat(10);
        document.push_str(&format!("<!ENTITY lol{i} \"{refs}\">\n"));
    }
    document.push_str("]>\n");
    document.push_str(body);
    document
}

#[test]
fn entity_amplification_is_limited() {
    for body in ["<r>&lol9;</r>", "<r v='&lol9;'/>"] {
        let mut reader = XMLReaderBuilder::new().build();
        let result = reader.parse_str(&billion_laughs(body), None);
        assert!(
            matches!(result, Err(XMLError::ParserEntityAmplification)),
            "{body}: {result:?}"
        );
    }

    // a few levels stay below the threshold
    let mut reader = XMLReaderBuilder::new().build();
    assert!(reader.parse_str(&billion_laughs("<r>&lol3;</r>"), None).is_ok());
}

#[test]
fn entity_depth_is_limited() {
    let document = r#"<!DOCTYPE r [
<!ENTITY e1 "&e2;">
<!ENTITY e2 "&e3;">
<!ENTITY e3 "&e4;">
<!ENTITY e4 "deep">
]><r>&e1;</r>"#;

    let limits = ParserLimits {
        max_entity_depth: 3,
        ..Default::default()
    };
    let mut reader = XMLReaderBuilder::new().set_limits(limits).build();
    assert!(matches!(
        reader.parse_str(document, None),
        Err(XMLError::ParserEntityTooDeep)
    ));

    let limits = ParserLimits {
        max_entity_depth: 4,
        ..Default::default()
    };
    let mut reader = XMLReaderBuilder::new().set_limits(limits).build();
    assert!(reader.parse_str(document, None).is_ok());
}

#[test]
fn undeclared_entities() {
    // no DTD at all
    let (_, errors, result) = parse("<r>&u;</r>");
    assert!(matches!(result, Err(XMLError::ParserUndeclaredEntityReference)));
    assert_eq!(errors[0].level, XMLErrorLevel::FatalError);

    // an unread external subset may declare it
    let (log, errors, result) = parse(r#"<!DOCTYPE r SYSTEM "r.dtd"><r>&u;</r>"#);
    assert!(result.is_ok());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].level, XMLErrorLevel::Warning);
    assert!(matches!(errors[0].error, XMLError::ParserUndeclaredEntityReference));
    assert!(log.contains("skippedEntity(u)\n"));

    // a standalone document must declare it
    let (_, _, result) = parse(
        r#"<?xml version="1.0" standalone="yes"?><!DOCTYPE r SYSTEM "r.dtd"><r>&u;</r>"#,
    );
    assert!(matches!(result, Err(XMLError::ParserUndeclaredEntityReference)));
}

#[test]
fn forbidden_references() {
    let cases: &[(&str, fn(&XMLError) -> bool)] = &[
        (
            r#"<!DOCTYPE r [<!NOTATION n SYSTEM "n"><!ENTITY u SYSTEM "u.bin" NDATA n>]><r>&u;</r>"#,
            |e| matches!(e, XMLError::ParserUnparsedEntityReference),
        ),
        (
            r#"<!DOCTYPE r [<!ENTITY x SYSTEM "x.xml">]><r v="&x;"/>"#,
            |e| matches!(e, XMLError::ParserExternalEntityInAttValue),
        ),
        (
            r#"<!DOCTYPE r [<!ENTITY lt2 "&#60;">]><r v="&lt2;"/>"#,
            |e| matches!(e, XMLError::ParserMarkupInAttValue),
        ),
        (
            r#"<!DOCTYPE r [<!ENTITY half "<a>">]><r>&half;</a></r>"#,
            |e| matches!(e, XMLError::ParserEntityIncorrectNesting),
        ),
        (
            r#"<!DOCTYPE r [<!ENTITY % p "x"><!ENTITY e "%p;">]><r/>"#,
            |e| matches!(e, XMLError::ParserPEReferenceInInternalSubset),
        ),
    ];
    for (document, expected) in cases {
        let (_, _, result) = parse(document);
        match result {
            Err(err) => assert!(expected(&err), "{document}: {err:?}"),
            Ok(()) => panic!("{document} is accepted"),
        }
    }
}

#[test]
fn predefined_entities_may_be_redeclared() {
    let (log, errors, result) =
        parse(r#"<!DOCTYPE r [<!ENTITY lt "&#38;#60;"><!ENTITY e "v"><!ENTITY e "w">]><r>&lt;&e;</r>"#);
    assert!(result.is_ok());
    // only the second declaration of 'e' is reported
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0].error, XMLError::ParserDuplicateEntityDecl));
    assert!(log.contains("characters(<)\nstartEntity(e)\ncharacters(v)\n"));
}

#[test]
fn external_general_entities() {
    let document = r#"<!DOCTYPE r [<!ENTITY ext SYSTEM "ext.xml">]><r>&ext;</r>"#;
    let files: &[(&'static str, &'static [u8])] =
        &[("ext.xml", b"<?xml encoding='UTF-8'?><e>external</e>")];

    // not loaded unless enabled
    let (log, errors, result) = parse_with(document, Resources::with(files), &[]);
    assert!(result.is_ok());
    assert!(errors.is_empty());
    assert!(log.contains("externalEntityDecl(ext, None, ext.xml)\n"));
    assert!(log.contains("skippedEntity(ext)\n"));
    assert!(!log.contains("resolveEntity"));

    let (log, errors, result) = parse_with(
        document,
        Resources::with(files),
        &[ParserOption::ExternalGeneralEntities],
    );
    assert!(result.is_ok());
    assert!(errors.is_empty(), "{errors:?}");
    assert!(log.contains(
        "resolveEntity(ext, None, None, ext.xml)
startEntity(ext)
startElement(None, Some(\"e\"), e)
characters(external)
endElement(None, Some(\"e\"), e)
endEntity()
"
    ));

    // a missing resource is an error, and the reference is skipped
    let (log, errors, result) =
        parse_with(document, Resources::default(), &[ParserOption::ExternalGeneralEntities]);
    assert!(result.is_ok());
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0].error, XMLError::ParserEntityNotFound));
    assert!(log.contains("skippedEntity(ext)\n"));
}

#[test]
fn external_subset_with_conditional_sections() {
    let dtd: &'static [u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<!ENTITY % draft "INCLUDE">
<!ENTITY % final "IGNORE">
<![%draft;[ <!ENTITY status "draft"> ]]>
<![%final;[ <!ENTITY status "final"> <!ELEMENT broken <![ nested ]]> ]]>
<!ENTITY % common SYSTEM "common.ent">
%common;
<!ATTLIST r version CDATA "1">
"#;
    let files: &[(&'static str, &'static [u8])] = &[
        ("r.dtd", dtd),
        ("common.ent", b"<!ENTITY shared \"from common\">"),
    ];
    let document = r#"<!DOCTYPE r SYSTEM "r.dtd"><r>&status;&shared;</r>"#;

    let (log, errors, result) = parse_with(
        document,
        Resources::with(files),
        &[ParserOption::ExternalParameterEntities],
    );
    assert!(result.is_ok(), "{result:?}");
    assert!(errors.is_empty(), "{errors:?}");
    assert!(log.contains("resolveEntity([dtd], None, None, r.dtd)\n"));
    assert!(log.contains("resolveEntity(%common, "));
    assert!(log.contains("internalEntityDecl(status, draft)\n"));
    assert!(!log.contains("internalEntityDecl(status, final)"));
    assert!(log.contains(
        "startElement(None, Some(\"r\"), r, {None}version='1')
startEntity(status)
characters(draft)
endEntity()
startEntity(shared)
characters(from common)
endEntity()
"
    ));
}

#[test]
fn conditional_section_in_internal_subset() {
    let (_, errors, result) = parse("<!DOCTYPE r [<![INCLUDE[<!ENTITY e 'v'>]]>]><r/>");
    assert!(result.is_err());
    assert!(matches!(errors[0].error, XMLError::ParserInvalidConditionalSect));
}

#[test]
fn system_ids_are_resolved_against_the_base_uri() {
    let document =
        r#"<!DOCTYPE r [<!ENTITY e SYSTEM "ents/e.xml"><!NOTATION n SYSTEM "../n">]><r/>"#;
    let base = "http://example.com/docs/doc.xml";

    let mut reader = XMLReaderBuilder::new()
        .set_handler(DebugHandler::new(DefaultSAXHandler))
        .set_base_uri(base)
        .build();
    reader.parse_str(document, None).unwrap();
    let log = &reader.handler().buffer;
    assert!(log.contains("externalEntityDecl(e, None, http://example.com/docs/ents/e.xml)\n"));
    assert!(log.contains("notationDecl(n, None, Some(\"http://example.com/n\"))\n"));

    let mut reader = XMLReaderBuilder::new()
        .set_handler(DebugHandler::new(DefaultSAXHandler))
        .set_parser_config(ParserOption::Namespaces.into())
        .set_base_uri(base)
        .build();
    reader.parse_str(document, None).unwrap();
    let log = &reader.handler().buffer;
    assert!(log.contains("externalEntityDecl(e, None, ents/e.xml)\n"));
    assert!(log.contains("notationDecl(n, None, Some(\"../n\"))\n"));
}
