pub mod fixtures;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Asserts that `xpath` selects at least one element of `query`.
#[macro_export]
macro_rules! assert_has_node {
    ($query:expr, $xpath:expr) => {{
        let found = $query.nodes($xpath)?;
        assert!(
            !found.is_empty(),
            "expected a node at '{}' in:\n{}",
            $xpath,
            $query
        );
    }};
}

/// An in-memory resolver holding the `first.xsl` / `second.xsl` pair.
pub fn import_sources() -> xmlquery::InMemoryResolver {
    xmlquery::InMemoryResolver::new()
        .with("first.xsl", fixtures::FIRST_XSL)
        .with("second.xsl", fixtures::SECOND_XSL)
}
