//! Resolves prefixed names and validates function calls after parsing, so an
//! expression is fully checked before it meets a document.

use crate::XML_NAMESPACE;
use crate::ast::{Expression, LocationPath, NodeTest, Step};
use crate::error::XPathError;
use crate::functions::FunctionRegistry;
use crate::parser::parse_expression;

/// Maps namespace prefixes used in an expression to namespace URIs.
pub trait NamespaceResolver {
    fn resolve_prefix(&self, prefix: &str) -> Option<String>;
}

/// A resolver that knows no prefixes besides the reserved `xml` one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNamespaces;

impl NamespaceResolver for NoNamespaces {
    fn resolve_prefix(&self, _prefix: &str) -> Option<String> {
        None
    }
}

impl<F> NamespaceResolver for F
where
    F: Fn(&str) -> Option<String>,
{
    fn resolve_prefix(&self, prefix: &str) -> Option<String> {
        self(prefix)
    }
}

/// Parses `input`, binds every prefixed name test through `resolver` and
/// checks each function call against `registry`.
pub fn compile(
    input: &str,
    resolver: &dyn NamespaceResolver,
    registry: &FunctionRegistry,
) -> Result<Expression, XPathError> {
    let mut expr = parse_expression(input)?;
    bind_namespaces(&mut expr, resolver);
    validate_functions(&expr, registry)?;
    log::trace!("Compiled XPath '{}'", input);
    Ok(expr)
}

fn lookup(resolver: &dyn NamespaceResolver, prefix: &str) -> Option<String> {
    if prefix == "xml" {
        return Some(XML_NAMESPACE.to_string());
    }
    let resolved = resolver.resolve_prefix(prefix);
    if resolved.is_none() {
        // An unbound prefix selects names in no namespace.
        log::debug!("XPath prefix '{}' is not bound to a namespace", prefix);
    }
    resolved
}

/// Fills in the namespace of every prefixed name test in the expression tree.
pub fn bind_namespaces(expr: &mut Expression, resolver: &dyn NamespaceResolver) {
    match expr {
        Expression::LocationPath(path) => bind_path(path, resolver),
        Expression::FunctionCall { args, .. } => {
            for arg in args {
                bind_namespaces(arg, resolver);
            }
        }
        Expression::Filter { primary, predicates } => {
            bind_namespaces(primary, resolver);
            for predicate in predicates {
                bind_namespaces(predicate, resolver);
            }
        }
        Expression::BinaryOp { left, right, .. } => {
            bind_namespaces(left, resolver);
            bind_namespaces(right, resolver);
        }
        Expression::UnaryOp { expr, .. } => bind_namespaces(expr, resolver),
        Expression::Literal(_) | Expression::Number(_) | Expression::Variable(_) => {}
    }
}

fn bind_path(path: &mut LocationPath, resolver: &dyn NamespaceResolver) {
    if let Some(start) = path.start_point.as_deref_mut() {
        bind_namespaces(start, resolver);
    }
    for step in &mut path.steps {
        bind_step(step, resolver);
    }
}

/// Binds the node test and predicates of a single step.
pub fn bind_step(step: &mut Step, resolver: &dyn NamespaceResolver) {
    match &mut step.node_test {
        NodeTest::Name(name) => {
            name.namespace = name.prefix.as_deref().and_then(|p| lookup(resolver, p));
        }
        NodeTest::NamespaceWildcard { prefix, namespace } => {
            *namespace = lookup(resolver, prefix);
        }
        _ => {}
    }
    for predicate in &mut step.predicates {
        bind_namespaces(predicate, resolver);
    }
}

/// Rejects calls to unknown functions and calls with the wrong number of arguments.
pub fn validate_functions(expr: &Expression, registry: &FunctionRegistry) -> Result<(), XPathError> {
    match expr {
        Expression::FunctionCall { name, args } => {
            registry.check(name, args.len())?;
            args.iter().try_for_each(|a| validate_functions(a, registry))
        }
        Expression::LocationPath(path) => validate_path(path, registry),
        Expression::Filter { primary, predicates } => {
            validate_functions(primary, registry)?;
            predicates
                .iter()
                .try_for_each(|p| validate_functions(p, registry))
        }
        Expression::BinaryOp { left, right, .. } => {
            validate_functions(left, registry)?;
            validate_functions(right, registry)
        }
        Expression::UnaryOp { expr, .. } => validate_functions(expr, registry),
        Expression::Literal(_) | Expression::Number(_) | Expression::Variable(_) => Ok(()),
    }
}

fn validate_path(path: &LocationPath, registry: &FunctionRegistry) -> Result<(), XPathError> {
    if let Some(start) = &path.start_point {
        validate_functions(start, registry)?;
    }
    path.steps
        .iter()
        .flat_map(|s| s.predicates.iter())
        .try_for_each(|p| validate_functions(p, registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NameTest;

    fn urn_foo(prefix: &str) -> Option<String> {
        (prefix == "f").then(|| "urn:foo".to_string())
    }

    #[test]
    fn test_binds_prefixes_in_steps_and_predicates() {
        let expr = compile("/f:a[f:b]/xml:c", &urn_foo, &FunctionRegistry::core()).unwrap();
        let Expression::LocationPath(path) = expr else {
            panic!("Expected LocationPath");
        };
        let NodeTest::Name(a) = &path.steps[0].node_test else {
            panic!("Expected a name test");
        };
        assert_eq!(a.namespace.as_deref(), Some("urn:foo"));
        let Expression::LocationPath(inner) = &path.steps[0].predicates[0] else {
            panic!("Expected LocationPath predicate");
        };
        assert_eq!(
            inner.steps[0].node_test,
            NodeTest::Name(NameTest {
                prefix: Some("f".to_string()),
                local_part: "b".to_string(),
                namespace: Some("urn:foo".to_string()),
            })
        );
        let NodeTest::Name(c) = &path.steps[1].node_test else {
            panic!("Expected a name test");
        };
        assert_eq!(c.namespace.as_deref(), Some(XML_NAMESPACE));
    }

    #[test]
    fn test_unbound_prefix_selects_no_namespace() {
        let expr = compile("g:a", &NoNamespaces, &FunctionRegistry::core()).unwrap();
        let Expression::LocationPath(path) = expr else {
            panic!("Expected LocationPath");
        };
        assert!(matches!(&path.steps[0].node_test, NodeTest::Name(n) if n.namespace.is_none()));
    }

    #[test]
    fn test_rejects_unknown_functions_and_bad_arity() {
        let registry = FunctionRegistry::core();
        assert_eq!(
            compile("//a[hello()]", &NoNamespaces, &registry),
            Err(XPathError::UnknownFunction("hello".to_string()))
        );
        assert!(matches!(
            compile("count()", &NoNamespaces, &registry),
            Err(XPathError::FunctionError { .. })
        ));
        assert!(compile("concat('a', 'b', 'c')", &NoNamespaces, &registry).is_ok());
    }
}
