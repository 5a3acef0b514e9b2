mod common;

use common::fixtures::*;
use common::{TestResult, import_sources};
use xmlquery::{
    FilesystemResolver, FolderResolver, InMemoryResolver, ParamValue, Stylesheet, XmlError,
    XmlQuery,
};

#[test]
fn test_makes_transformations() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let xsl = Stylesheet::new(CREATES_DONE_XSL);
    for input in ["<a/>", "<a></a>"] {
        let result = xsl.transformed(&XmlQuery::new(input)?)?;
        assert_eq!(result.nodes("/done")?.len(), 1);
    }
    Ok(())
}

#[test]
fn test_transforms_to_text() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let xsl = Stylesheet::new(CREATES_HELLO_XSL);
    assert_eq!(xsl.transformed_to_text(&XmlQuery::new("<something/>")?)?, "hello");
    Ok(())
}

#[test]
fn test_text_of_xml_output_is_markup() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let xsl = Stylesheet::new(CREATES_DONE_XSL);
    let text = xsl.transformed_to_text(&XmlQuery::new("<a/>")?)?;
    assert_eq!(text, "<?xml version=\"1.0\" encoding=\"UTF-8\"?><done/>");
    Ok(())
}

#[test]
fn test_decimal_select_in_value_of() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let xsl = Stylesheet::new(
        r#"<xsl:stylesheet xmlns:xsl="http://www.w3.org/1999/XSL/Transform" version="1.0">
            <xsl:template match="/"><r><xsl:value-of select="1.5"/></r></xsl:template>
        </xsl:stylesheet>"#,
    );
    let result = xsl.transformed(&XmlQuery::new("<a/>")?)?;
    assert_eq!(result.values("/r/text()")?, vec!["1.5"]);
    Ok(())
}

#[test]
fn test_transformed_requires_a_single_document_element() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let input = XmlQuery::new("<a/>")?;
    let outputs = [
        r#"<xsl:stylesheet xmlns:xsl="http://www.w3.org/1999/XSL/Transform" version="1.0">
            <xsl:template match="/"><a/><b/></xsl:template>
        </xsl:stylesheet>"#,
        r#"<xsl:stylesheet xmlns:xsl="http://www.w3.org/1999/XSL/Transform" version="1.0">
            <xsl:template match="/">loose<a/></xsl:template>
        </xsl:stylesheet>"#,
        r#"<xsl:stylesheet xmlns:xsl="http://www.w3.org/1999/XSL/Transform" version="1.0">
            <xsl:template match="/"><xsl:comment>only a comment</xsl:comment></xsl:template>
        </xsl:stylesheet>"#,
    ];
    for source in outputs {
        let xsl = Stylesheet::new(source);
        match xsl.transformed(&input) {
            Err(XmlError::InvalidStylesheet { message, stylesheet }) => {
                assert!(message.contains("not a well-formed document"), "{}", message);
                assert_eq!(stylesheet, source);
            }
            other => panic!("expected InvalidStylesheet, got {:?}", other),
        }
    }
    Ok(())
}

#[test]
fn test_transformed_text_output_is_parsed() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let input = XmlQuery::new("<something/>")?;
    let err = Stylesheet::new(CREATES_HELLO_XSL).transformed(&input).unwrap_err();
    assert!(matches!(err, XmlError::InvalidStylesheet { .. }), "{:?}", err);

    let markup = Stylesheet::new(
        r#"<xsl:stylesheet xmlns:xsl="http://www.w3.org/1999/XSL/Transform" version="1.0">
            <xsl:output method="text"/>
            <xsl:template match="/">&lt;n&gt;<xsl:value-of select="name(/*)"/>&lt;/n&gt;</xsl:template>
        </xsl:stylesheet>"#,
    );
    let result = markup.transformed(&input)?;
    assert_eq!(result.values("/n/text()")?, vec!["something"]);
    let reparsed = XmlQuery::new(result.to_string())?;
    assert_eq!(reparsed.values("/n/text()")?, vec!["something"]);
    Ok(())
}

#[test]
fn test_string_param() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let xsl = Stylesheet::new(VALUE_OF_BOOM_XSL).with_param("boom", "Donny");
    assert_eq!(xsl.transformed_to_text(&XmlQuery::new("<ehe/>")?)?, "[Donny]");
    Ok(())
}

#[test]
fn test_number_param() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let xsl = Stylesheet::new(VALUE_OF_FAA_XSL);
    let input = XmlQuery::new("<r0/>")?;
    assert_eq!(xsl.transformed_to_text(&input)?, "+0+");
    assert_eq!(xsl.with_param("faa", 1.0).transformed_to_text(&input)?, "+1+");
    Ok(())
}

#[test]
fn test_last_param_wins() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let base = Stylesheet::new(VALUE_OF_BOOM_XSL);
    let rebound = base.with_param("boom", "first").with_param("boom", "second");
    let input = XmlQuery::new("<ehe/>")?;
    assert_eq!(rebound.transformed_to_text(&input)?, "[second]");
    assert_eq!(base.transformed_to_text(&input)?, "[]");
    Ok(())
}

#[test]
fn test_query_param_is_a_node_set() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let xsl = Stylesheet::new(
        r#"<xsl:stylesheet xmlns:xsl="http://www.w3.org/1999/XSL/Transform" version="1.0">
            <xsl:output method="text"/>
            <xsl:param name="lookup"/>
            <xsl:template match="/">
                <xsl:for-each select="$lookup//entry"><xsl:value-of select="@key"/>;</xsl:for-each>
            </xsl:template>
        </xsl:stylesheet>"#,
    );
    let lookup = XmlQuery::new("<table><entry key='a'/><entry key='b'/></table>")?;
    let text = xsl
        .with_param("lookup", &lookup)
        .transformed_to_text(&XmlQuery::new("<in/>")?)?;
    assert_eq!(text, "a;b;");
    Ok(())
}

#[test]
fn test_imports_through_resolver() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let xsl = Stylesheet::new(FIRST_XSL).with_resolver(import_sources());
    let result = xsl.transformed(&XmlQuery::new("<simple-test/>")?)?;
    assert_has_node!(result, "/result[.=6]");
    Ok(())
}

#[test]
fn test_imports_with_param() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let xsl = Stylesheet::new(FIRST_WITH_PARAM_XSL)
        .with_resolver(import_sources())
        .with_param("faa", 9.0);
    let result = xsl.transformed(&XmlQuery::new("<simple-test/>")?)?;
    assert_has_node!(result, "/result/number[text() = 9]");
    Ok(())
}

#[test]
fn test_unresolved_import_is_invalid_stylesheet() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let xsl = Stylesheet::new(FIRST_XSL);
    match xsl.transformed(&XmlQuery::new("<simple-test/>")?) {
        Err(XmlError::InvalidStylesheet { message, stylesheet }) => {
            assert!(message.contains("second.xsl"), "{}", message);
            assert!(stylesheet.contains("<xsl:with-param name=\"value\" select=\"5.67\""));
        }
        other => panic!("expected InvalidStylesheet, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_with_resolver_does_not_touch_receiver() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let unresolved = Stylesheet::new(FIRST_XSL);
    let resolved = unresolved.with_resolver(import_sources());
    let input = XmlQuery::new("<simple-test/>")?;
    assert!(resolved.transformed(&input).is_ok());
    assert!(unresolved.transformed(&input).is_err());
    Ok(())
}

#[test]
fn test_malformed_stylesheet() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let input = XmlQuery::new("<a/>")?;
    let broken = [
        "<xsl:stylesheet",
        "<not-a-stylesheet/>",
        r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
            <xsl:template match="/"><xsl:value-of select="count("/></xsl:template>
        </xsl:stylesheet>"#,
    ];
    for source in broken {
        let err = Stylesheet::new(source).transformed(&input).unwrap_err();
        assert!(matches!(err, XmlError::InvalidStylesheet { .. }), "{:?}", err);
        assert!(err.to_string().starts_with("invalid xslt: "));
    }
    Ok(())
}

#[test]
fn test_runtime_failure_is_invalid_stylesheet() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let xsl = Stylesheet::new(
        r#"<xsl:stylesheet xmlns:xsl="http://www.w3.org/1999/XSL/Transform" version="1.0">
            <xsl:template match="/"><xsl:message terminate="yes">stop</xsl:message></xsl:template>
        </xsl:stylesheet>"#,
    );
    let err = xsl.transformed(&XmlQuery::new("<a/>")?).unwrap_err();
    assert!(matches!(err, XmlError::InvalidStylesheet { .. }));
    Ok(())
}

#[test]
fn test_undeclared_variable_is_invalid_stylesheet() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let xsl = Stylesheet::new(
        r#"<xsl:stylesheet xmlns:xsl="http://www.w3.org/1999/XSL/Transform" version="1.0">
            <xsl:output method="text"/>
            <xsl:template match="/">[<xsl:value-of select="$missing"/>]</xsl:template>
        </xsl:stylesheet>"#,
    );
    let input = XmlQuery::new("<a/>")?;
    for xsl in [xsl.clone(), xsl.strict(true)] {
        match xsl.transformed_to_text(&input) {
            Err(XmlError::InvalidStylesheet { message, .. }) => {
                assert!(message.contains("$missing"), "{}", message);
                assert!(message.contains("not declared"), "{}", message);
            }
            other => panic!("expected InvalidStylesheet, got {:?}", other),
        }
    }
    Ok(())
}

#[test]
fn test_stripped() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let input = XmlQuery::new("<a>   <b/>  </a>")?;
    assert_eq!(Stylesheet::stripped().transformed_to_text(&input)?, "<a><b/></a>");

    let result = Stylesheet::stripped().transformed(&input)?;
    assert_eq!(result.values("count(/a/node())")?, vec!["1"]);
    assert!(result.to_string().ends_with("<a><b/></a>"));
    Ok(())
}

#[test]
fn test_transformed_keeps_query_namespaces() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let xsl = Stylesheet::new(
        r#"<xsl:stylesheet xmlns:xsl="http://www.w3.org/1999/XSL/Transform" version="1.0">
            <xsl:template match="/"><out xmlns="urn:out"><xsl:value-of select="/*/@v"/></out></xsl:template>
        </xsl:stylesheet>"#,
    );
    let input = XmlQuery::new("<a v='42'/>")?.with_namespace("o", "urn:out");
    let result = xsl.transformed(&input)?;
    assert_eq!(result.values("/o:out/text()")?, vec!["42"]);
    Ok(())
}

#[test]
fn test_transforms_interior_node() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let xsl = Stylesheet::new(
        r#"<xsl:stylesheet xmlns:xsl="http://www.w3.org/1999/XSL/Transform" version="1.0">
            <xsl:output method="text"/>
            <xsl:template match="/"><xsl:value-of select="count(//x)"/>:<xsl:value-of select="name(/*)"/></xsl:template>
        </xsl:stylesheet>"#,
    );
    let xml = XmlQuery::new(NESTED)?;
    let second = &xml.nodes("/root/a")?[1];
    assert_eq!(xsl.transformed_to_text(second)?, "1:a");
    Ok(())
}

#[test]
fn test_stylesheet_from_path_resolves_siblings() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("first.xsl"), FIRST_XSL)?;
    std::fs::write(dir.path().join("second.xsl"), SECOND_XSL)?;

    let xsl = Stylesheet::from_path(dir.path().join("first.xsl"))?;
    let result = xsl.transformed(&XmlQuery::new("<simple-test/>")?)?;
    assert_has_node!(result, "/result[.=6]");
    Ok(())
}

#[test]
fn test_folder_resolver_tries_candidates() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let sources = InMemoryResolver::new().with("Resources/second.xsl", SECOND_XSL);
    let resolver = FolderResolver::new(sources, ["Assets", "Resources"]);
    let xsl = Stylesheet::new(FIRST_XSL).with_resolver(resolver);
    let result = xsl.transformed(&XmlQuery::new("<simple-test/>")?)?;
    assert_has_node!(result, "/result[.=6]");
    Ok(())
}

#[test]
fn test_filesystem_resolver_refuses_escapes() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let outer = tempfile::tempdir()?;
    let inner = outer.path().join("inner");
    std::fs::create_dir(&inner)?;
    std::fs::write(outer.path().join("second.xsl"), SECOND_XSL)?;

    let escaping = FIRST_XSL.replace("href=\"second.xsl\"", "href=\"../second.xsl\"");
    let xsl = Stylesheet::new(escaping).with_resolver(FilesystemResolver::new(&inner));
    let err = xsl.transformed(&XmlQuery::new("<simple-test/>")?).unwrap_err();
    assert!(matches!(err, XmlError::InvalidStylesheet { .. }));
    Ok(())
}

#[test]
fn test_stylesheet_from_bytes() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let xsl = Stylesheet::from_bytes(CREATES_HELLO_XSL.as_bytes())?;
    assert_eq!(xsl.transformed_to_text(&XmlQuery::new("<x/>")?)?, "hello");
    assert_eq!(xsl.to_string(), CREATES_HELLO_XSL);
    assert!(matches!(
        Stylesheet::new(VALUE_OF_BOOM_XSL).with_param("boom", ParamValue::Boolean(true)).params()[0].1,
        ParamValue::Boolean(true)
    ));
    Ok(())
}
