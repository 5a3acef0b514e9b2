//! The evaluation engine for executing a parsed XPath AST against a generic `DataSourceNode`.

use super::ast::{Axis, BinaryOperator, Expression, LocationPath, NodeTest, NodeTypeTest, Step, UnaryOperator};
use super::functions::{self, FunctionRegistry};
use super::{axes, operators};
use crate::datasource::{DataSourceNode, NodeType};
use crate::error::XPathError;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// Represents the possible result types of an XPath expression evaluation.
#[derive(Debug, Clone)]
pub enum XPathValue<N> {
    NodeSet(Vec<N>),
    String(String),
    Number(f64),
    Boolean(bool),
}

impl<'a, N: DataSourceNode<'a>> XPathValue<N> {
    /// Coerces the XPath value to a boolean as per XPath 1.0 rules.
    pub fn to_bool(&self) -> bool {
        match self {
            XPathValue::NodeSet(nodes) => !nodes.is_empty(),
            XPathValue::String(s) => !s.is_empty(),
            XPathValue::Number(n) => *n != 0.0 && !n.is_nan(),
            XPathValue::Boolean(b) => *b,
        }
    }

    /// Coerces the XPath value to a number as per XPath 1.0 rules.
    pub fn to_number(&self) -> f64 {
        match self {
            XPathValue::Number(n) => *n,
            XPathValue::String(s) => parse_number(s),
            XPathValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            XPathValue::NodeSet(nodes) => {
                parse_number(&nodes.first().map(|n| n.string_value()).unwrap_or_default())
            }
        }
    }

    /// A short name of the value's type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            XPathValue::NodeSet(_) => "node-set",
            XPathValue::String(_) => "string",
            XPathValue::Number(_) => "number",
            XPathValue::Boolean(_) => "boolean",
        }
    }
}

impl<'a, N: DataSourceNode<'a>> fmt::Display for XPathValue<N> {
    /// Coerces the XPath value to a string as per XPath 1.0 rules.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XPathValue::NodeSet(nodes) => write!(
                f,
                "{}",
                nodes.first().map(|n| n.string_value()).unwrap_or_default()
            ),
            XPathValue::String(s) => write!(f, "{}", s),
            XPathValue::Number(n) => write!(f, "{}", format_number(*n)),
            XPathValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// Converts a number to its XPath 1.0 string form: integers without a
/// fractional part, no exponent notation, `NaN` and `Infinity` spelled out.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e17 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Parses a string with the XPath 1.0 `Number` grammar (optional whitespace,
/// optional minus, digits with an optional fraction). Anything else is `NaN`.
pub fn parse_number(s: &str) -> f64 {
    let t = s.trim_matches(|c: char| c == ' ' || c == '\t' || c == '\n' || c == '\r');
    let unsigned = t.strip_prefix('-').unwrap_or(t);
    let mut parts = unsigned.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next();
    let digits_ok = |p: &str| p.chars().all(|c| c.is_ascii_digit());
    let valid = match frac_part {
        None => !int_part.is_empty() && digits_ok(int_part),
        Some(frac) => {
            digits_ok(int_part) && digits_ok(frac) && !(int_part.is_empty() && frac.is_empty())
        }
    };
    if valid {
        t.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

pub type Variables<N> = HashMap<String, XPathValue<N>>;
pub type KeyIndexes<N> = HashMap<String, HashMap<String, Vec<N>>>;

/// A container for all state needed during expression evaluation.
/// `'a` is the lifetime of the underlying tree.
/// `'d` is the lifetime of the evaluation context itself.
pub struct EvaluationContext<'a, 'd, N: DataSourceNode<'a>> {
    pub context_node: N,
    /// The node XSLT's `current()` returns; equal to the context node outside predicates.
    pub current_node: N,
    pub functions: &'d FunctionRegistry,
    pub context_position: usize, // 1-based index
    pub context_size: usize,
    pub variables: &'d Variables<N>,
    /// Read-only access to the pre-computed key indexes.
    pub key_indexes: &'d KeyIndexes<N>,
    /// If true, references to unknown variables are errors.
    pub strict: bool,
    _marker: PhantomData<&'a ()>,
}

impl<'a, 'd, N: DataSourceNode<'a>> EvaluationContext<'a, 'd, N> {
    pub fn new(
        context_node: N,
        functions: &'d FunctionRegistry,
        variables: &'d Variables<N>,
        key_indexes: &'d KeyIndexes<N>,
        strict: bool,
    ) -> Self {
        Self {
            context_node,
            current_node: context_node,
            functions,
            context_position: 1,
            context_size: 1,
            variables,
            key_indexes,
            strict,
            _marker: PhantomData,
        }
    }

    /// Returns a context focused on `node` at `position` of `size`, keeping
    /// everything else (including the XSLT current node).
    pub fn with_focus(&self, node: N, position: usize, size: usize) -> Self {
        Self {
            context_node: node,
            current_node: self.current_node,
            functions: self.functions,
            context_position: position,
            context_size: size,
            variables: self.variables,
            key_indexes: self.key_indexes,
            strict: self.strict,
            _marker: PhantomData,
        }
    }

    /// Returns a context whose current node is also moved to `node`.
    pub fn at(&self, node: N, position: usize, size: usize) -> Self {
        let mut ctx = self.with_focus(node, position, size);
        ctx.current_node = node;
        ctx
    }

    /// The root of the tree containing the context node.
    pub fn root_node(&self) -> N {
        root_of(self.context_node)
    }
}

pub(crate) fn root_of<'a, N: DataSourceNode<'a>>(node: N) -> N {
    let mut current = node;
    while let Some(parent) = current.parent() {
        current = parent;
    }
    current
}

/// Evaluates a compiled expression and returns a concrete `XPathValue`.
pub fn evaluate<'a, N>(
    expr: &Expression,
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> Result<XPathValue<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    match expr {
        Expression::Literal(s) => Ok(XPathValue::String(s.clone())),
        Expression::Number(n) => Ok(XPathValue::Number(*n)),
        Expression::LocationPath(path) => {
            let nodes = evaluate_location_path(path, e_ctx)?;
            Ok(XPathValue::NodeSet(nodes))
        }
        Expression::Variable(name) => match e_ctx.variables.get(name) {
            Some(value) => Ok(value.clone()),
            None if e_ctx.strict => Err(XPathError::UnknownVariable(name.clone())),
            None => Ok(XPathValue::String(String::new())),
        },
        Expression::FunctionCall { name, args } => {
            let mut evaluated_args = Vec::with_capacity(args.len());
            for arg in args {
                evaluated_args.push(evaluate(arg, e_ctx)?);
            }
            functions::evaluate_function(name, evaluated_args, e_ctx)
        }
        Expression::Filter { primary, predicates } => {
            let nodes = expect_node_set(evaluate(primary, e_ctx)?, "a filter expression")?;
            Ok(XPathValue::NodeSet(apply_predicates(nodes, predicates, e_ctx)?))
        }
        Expression::BinaryOp { left, op, right } => match op {
            BinaryOperator::And => Ok(XPathValue::Boolean(
                evaluate(left, e_ctx)?.to_bool() && evaluate(right, e_ctx)?.to_bool(),
            )),
            BinaryOperator::Or => Ok(XPathValue::Boolean(
                evaluate(left, e_ctx)?.to_bool() || evaluate(right, e_ctx)?.to_bool(),
            )),
            _ => {
                let left_val = evaluate(left, e_ctx)?;
                let right_val = evaluate(right, e_ctx)?;
                operators::evaluate(*op, left_val, right_val)
            }
        },
        Expression::UnaryOp { op, expr } => {
            let val = evaluate(expr, e_ctx)?;
            match op {
                UnaryOperator::Minus => Ok(XPathValue::Number(-val.to_number())),
            }
        }
    }
}

fn expect_node_set<'a, N: DataSourceNode<'a>>(
    value: XPathValue<N>,
    what: &str,
) -> Result<Vec<N>, XPathError> {
    match value {
        XPathValue::NodeSet(nodes) => Ok(nodes),
        other => Err(XPathError::TypeError(format!(
            "The start of {} must evaluate to a node-set, got a {}",
            what,
            other.type_name()
        ))),
    }
}

fn evaluate_location_path<'a, N>(
    path: &LocationPath,
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> Result<Vec<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    let mut current_nodes = if let Some(start_expr) = &path.start_point {
        expect_node_set(evaluate(start_expr, e_ctx)?, "a path")?
    } else if path.is_absolute {
        vec![e_ctx.root_node()]
    } else {
        vec![e_ctx.context_node]
    };

    for step in &path.steps {
        current_nodes = evaluate_step(step, &current_nodes, e_ctx)?;
    }
    Ok(current_nodes)
}

/// Evaluates a single step for every context node: axis collection, node
/// test, then predicates with positions counted along the axis. The union
/// is returned in document order without duplicates.
fn evaluate_step<'a, N>(
    step: &Step,
    context_nodes: &[N],
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> Result<Vec<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    let mut result = Vec::new();
    for &node in context_nodes {
        let axis_nodes = axes::collect(step.axis, node);
        let tested = filter_by_node_test(axis_nodes, &step.node_test, step.axis);
        result.extend(apply_predicates(tested, &step.predicates, e_ctx)?);
    }
    if context_nodes.len() > 1 || step.axis.is_reverse() {
        result.sort();
        result.dedup();
    }
    Ok(result)
}

fn principal_type(axis: Axis) -> NodeType {
    match axis {
        Axis::Attribute => NodeType::Attribute,
        _ => NodeType::Element,
    }
}

/// Filters a set of nodes based on a `NodeTest`.
fn filter_by_node_test<'a, N>(nodes: Vec<N>, test: &NodeTest, axis: Axis) -> Vec<N>
where
    N: DataSourceNode<'a> + 'a,
{
    nodes
        .into_iter()
        .filter(|node| node_matches(*node, test, axis))
        .collect()
}

/// Whether `node` passes `test` when reached along `axis`. Shared with
/// XSLT match patterns.
pub fn node_matches<'a, N: DataSourceNode<'a>>(node: N, test: &NodeTest, axis: Axis) -> bool {
    match test {
        NodeTest::Wildcard => node.node_type() == principal_type(axis),
        NodeTest::Name(name_test) => {
            node.node_type() == principal_type(axis)
                && node.name().is_some_and(|q| {
                    q.local_part == name_test.local_part
                        && q.namespace == name_test.namespace.as_deref()
                })
        }
        NodeTest::NamespaceWildcard { namespace, .. } => {
            node.node_type() == principal_type(axis)
                && node
                    .name()
                    .is_some_and(|q| q.namespace == namespace.as_deref())
        }
        NodeTest::NodeType(ntt) => match ntt {
            NodeTypeTest::Text => node.node_type() == NodeType::Text,
            NodeTypeTest::Comment => node.node_type() == NodeType::Comment,
            NodeTypeTest::ProcessingInstruction => {
                node.node_type() == NodeType::ProcessingInstruction
            }
            NodeTypeTest::Node => true,
        },
        NodeTest::ProcessingInstruction(target) => {
            node.node_type() == NodeType::ProcessingInstruction
                && node.name().is_some_and(|q| q.local_part == target)
        }
    }
}

/// Filters a set of nodes by applying a series of predicates.
fn apply_predicates<'a, N>(
    nodes: Vec<N>,
    predicates: &[Expression],
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> Result<Vec<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    let mut final_nodes = nodes;
    for predicate in predicates {
        let context_size = final_nodes.len();
        let mut predicate_results = Vec::with_capacity(context_size);
        for (i, node) in final_nodes.iter().enumerate() {
            let predicate_e_ctx = e_ctx.with_focus(*node, i + 1, context_size);
            let result = evaluate(predicate, &predicate_e_ctx)?;
            let keep = match result {
                XPathValue::Number(n) => n == (i + 1) as f64,
                _ => result.to_bool(),
            };
            if keep {
                predicate_results.push(*node);
            }
        }
        final_nodes = predicate_results;
    }
    Ok(final_nodes)
}
