mod common;

use common::TestResult;
use common::fixtures::*;
use xmlquery::{SingleValue, XmlError, XmlQuery};

#[test]
fn test_required_single_value() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let xml = XmlQuery::new("<root>ugly_text</root>")?;
    assert_eq!(SingleValue::new(&xml, "/root/text()").required()?, "ugly_text");
    assert_eq!(SingleValue::new(&xml, "string-length(/root)").required()?, "9");
    Ok(())
}

#[test]
fn test_required_missing_value_names_xpath_and_document() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let xml = XmlQuery::new("<root>\n  <simple>hello</simple>\n</root>")?;
    let err = SingleValue::new(&xml, "root/complex/text()").required().unwrap_err();
    match &err {
        XmlError::ValueNotFound { xpath, document } => {
            assert_eq!(xpath, "root/complex/text()");
            assert!(document.contains("<simple>hello</simple>"));
        }
        other => panic!("expected ValueNotFound, got {:?}", other),
    }
    assert!(err.to_string().starts_with(
        "Cannot retrieve single value with XPath 'root/complex/text()', because it had no results in document"
    ));
    Ok(())
}

#[test]
fn test_default_value() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let xml = XmlQuery::new("<root>ugly_text</root>")?;
    assert_eq!(SingleValue::new(&xml, "/wrong/text()").or("right text")?, "right text");
    assert_eq!(SingleValue::new(&xml, "/root/text()").or("unused")?, "ugly_text");
    Ok(())
}

#[test]
fn test_fallback_function() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let xml = XmlQuery::new("<root/>")?;
    let mut calls = 0;
    let value = SingleValue::new(&xml, "/root/@missing").or_else(|| {
        calls += 1;
        "computed".to_string()
    })?;
    assert_eq!(value, "computed");
    assert_eq!(calls, 1);
    Ok(())
}

#[test]
fn test_multiple_values_always_fail() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let xml = XmlQuery::new(NESTED)?;
    let single = SingleValue::new(&xml, "//x/text()");
    for result in [single.required(), single.or("default"), single.or_else(String::new)] {
        match result {
            Err(XmlError::AmbiguousValue { xpath, count, .. }) => {
                assert_eq!(xpath, "//x/text()");
                assert_eq!(count, 2);
            }
            other => panic!("expected AmbiguousValue, got {:?}", other),
        }
    }
    Ok(())
}

#[test]
fn test_query_errors_pass_through() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let xml = XmlQuery::new(NESTED)?;
    assert!(matches!(
        SingleValue::new(&xml, "//a").or("x"),
        Err(XmlError::InvalidSelection { .. })
    ));
    assert!(matches!(
        SingleValue::new(&xml, "//a[").required(),
        Err(XmlError::InvalidXPath { .. })
    ));
    Ok(())
}

#[test]
fn test_numbers() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let xml = XmlQuery::new("<r><int>42</int><real>-3.5</real><word>x</word></r>")?;
    assert_eq!(SingleValue::new(&xml, "/r/int/text()").parse::<i64>()?, 42);
    assert_eq!(SingleValue::new(&xml, "/r/real/text()").number()?, -3.5);
    assert_eq!(SingleValue::new(&xml, "count(/r/*)").number()?, 3.0);
    assert!(matches!(
        SingleValue::new(&xml, "/r/word/text()").number(),
        Err(XmlError::InvalidOperation { .. })
    ));
    assert!(matches!(
        SingleValue::new(&xml, "/r/none/text()").number(),
        Err(XmlError::ValueNotFound { .. })
    ));
    Ok(())
}
