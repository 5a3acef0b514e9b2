//! Compiles and evaluates XSLT `match` patterns.
//!
//! A pattern is parsed with the XPath grammar and then restricted to what
//! patterns allow: unions of paths that use the child and attribute axes,
//! `//` separators, and an optional `id()` or `key()` call at the start.
//! Matching walks from the candidate node up towards the root, testing steps
//! right to left.

use std::fmt;
use xmlquery_xpath1::ast::NodeTypeTest;
use xmlquery_xpath1::engine::node_matches;
use xmlquery_xpath1::{
    Axis, BinaryOperator, DataSourceNode, EvaluationContext, Expression, FunctionRegistry,
    LocationPath, NamespaceResolver, NodeTest, NodeType, Step, XPathError, XPathValue,
};

/// Where the leftmost step of a path must be anchored.
#[derive(Debug, Clone, PartialEq)]
enum Anchor {
    /// `/...`: the steps start at the document root.
    Root,
    /// The steps may start below any node.
    Relative,
    /// `id(...)` or `key(...)`: the steps start at a node of the call's result.
    Call(Expression),
}

#[derive(Debug, Clone, PartialEq)]
struct PathPattern {
    anchor: Anchor,
    steps: Vec<Step>,
}

/// A compiled match pattern, possibly a union of several paths.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    paths: Vec<PathPattern>,
    source: String,
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

fn invalid(source: &str, message: &str) -> XPathError {
    XPathError::XPathParse(source.to_string(), message.to_string())
}

fn is_descendant_separator(step: &Step) -> bool {
    step.axis == Axis::DescendantOrSelf
        && step.node_test == NodeTest::NodeType(NodeTypeTest::Node)
        && step.predicates.is_empty()
}

fn split_union(expr: Expression, out: &mut Vec<Expression>) {
    match expr {
        Expression::BinaryOp {
            left,
            op: BinaryOperator::Union,
            right,
        } => {
            split_union(*left, out);
            split_union(*right, out);
        }
        other => out.push(other),
    }
}

fn anchor_call(source: &str, expr: Expression) -> Result<Anchor, XPathError> {
    match &expr {
        Expression::FunctionCall { name, args }
            if (name == "id" || name == "key")
                && args
                    .iter()
                    .all(|a| matches!(a, Expression::Literal(_) | Expression::Variable(_))) =>
        {
            Ok(Anchor::Call(expr))
        }
        _ => Err(invalid(
            source,
            "a pattern may only start with id() or key() called with literals",
        )),
    }
}

fn path_pattern(source: &str, expr: Expression) -> Result<PathPattern, XPathError> {
    let pattern = match expr {
        Expression::LocationPath(LocationPath {
            start_point,
            is_absolute,
            steps,
        }) => {
            let anchor = match start_point {
                Some(start) => anchor_call(source, *start)?,
                None if is_absolute => Anchor::Root,
                None => Anchor::Relative,
            };
            PathPattern { anchor, steps }
        }
        call @ Expression::FunctionCall { .. } => PathPattern {
            anchor: anchor_call(source, call)?,
            steps: Vec::new(),
        },
        _ => return Err(invalid(source, "not a valid match pattern")),
    };
    for (i, step) in pattern.steps.iter().enumerate() {
        let allowed = match step.axis {
            Axis::Child | Axis::Attribute => true,
            Axis::DescendantOrSelf => {
                is_descendant_separator(step) && i + 1 < pattern.steps.len()
            }
            _ => false,
        };
        if !allowed {
            return Err(invalid(
                source,
                "patterns may only use the child and attribute axes",
            ));
        }
    }
    Ok(pattern)
}

impl Pattern {
    /// Parses `source` and binds its prefixes through `namespaces`.
    pub fn compile(
        source: &str,
        namespaces: &dyn NamespaceResolver,
        functions: &FunctionRegistry,
    ) -> Result<Self, XPathError> {
        let expr = xmlquery_xpath1::compile(source, namespaces, functions)?;
        let mut alternatives = Vec::new();
        split_union(expr, &mut alternatives);
        let paths = alternatives
            .into_iter()
            .map(|alt| path_pattern(source, alt))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Pattern {
            paths,
            source: source.to_string(),
        })
    }

    /// One pattern per union member; template rules treat each separately.
    pub fn alternatives(&self) -> impl Iterator<Item = Pattern> + '_ {
        self.paths.iter().map(|path| Pattern {
            paths: vec![path.clone()],
            source: self.source.clone(),
        })
    }

    /// The default priority, as defined for a single-path pattern. For a
    /// union the highest member priority is returned.
    pub fn default_priority(&self) -> f64 {
        self.paths
            .iter()
            .map(PathPattern::default_priority)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Whether `node` matches any path of this pattern. `e_ctx` supplies
    /// variables, keys and functions for predicates and the anchor call.
    pub fn matches<'a, N>(
        &self,
        node: N,
        e_ctx: &EvaluationContext<'a, '_, N>,
    ) -> Result<bool, XPathError>
    where
        N: DataSourceNode<'a> + 'a,
    {
        let base = e_ctx.at(node, 1, 1);
        for path in &self.paths {
            if path.matches_steps(node, &path.steps, &base)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl PathPattern {
    fn default_priority(&self) -> f64 {
        let [step] = self.steps.as_slice() else {
            return 0.5;
        };
        if self.anchor != Anchor::Relative || !step.predicates.is_empty() {
            return 0.5;
        }
        match &step.node_test {
            NodeTest::Name(_) | NodeTest::ProcessingInstruction(_) => 0.0,
            NodeTest::NamespaceWildcard { .. } => -0.25,
            NodeTest::Wildcard | NodeTest::NodeType(_) => -0.5,
        }
    }

    /// `node` is the candidate for the last of `steps`; with no steps left it
    /// is the node the path has to start from.
    fn matches_steps<'a, N>(
        &self,
        node: N,
        steps: &[Step],
        e_ctx: &EvaluationContext<'a, '_, N>,
    ) -> Result<bool, XPathError>
    where
        N: DataSourceNode<'a> + 'a,
    {
        let Some((last, rest)) = steps.split_last() else {
            return self.matches_anchor(node, e_ctx);
        };
        if is_descendant_separator(last) {
            let mut current = Some(node);
            while let Some(candidate) = current {
                if self.matches_steps(candidate, rest, e_ctx)? {
                    return Ok(true);
                }
                current = candidate.parent();
            }
            return Ok(false);
        }
        if !step_accepts(node, last) || !passes_predicates(node, last, e_ctx)? {
            return Ok(false);
        }
        match node.parent() {
            Some(parent) => self.matches_steps(parent, rest, e_ctx),
            None => Ok(false),
        }
    }

    fn matches_anchor<'a, N>(
        &self,
        node: N,
        e_ctx: &EvaluationContext<'a, '_, N>,
    ) -> Result<bool, XPathError>
    where
        N: DataSourceNode<'a> + 'a,
    {
        match &self.anchor {
            Anchor::Root => Ok(node.node_type() == NodeType::Root),
            Anchor::Relative => Ok(true),
            Anchor::Call(call) => {
                match xmlquery_xpath1::evaluate(call, &e_ctx.with_focus(node, 1, 1))? {
                    XPathValue::NodeSet(nodes) => Ok(nodes.contains(&node)),
                    _ => Ok(false),
                }
            }
        }
    }
}

fn step_accepts<'a, N: DataSourceNode<'a>>(node: N, step: &Step) -> bool {
    let on_axis = match step.axis {
        Axis::Attribute => node.node_type() == NodeType::Attribute,
        _ => !matches!(node.node_type(), NodeType::Attribute | NodeType::Root),
    };
    on_axis && node_matches(node, &step.node_test, step.axis)
}

/// Predicates count positions among the siblings that pass the node test.
fn passes_predicates<'a, N>(
    node: N,
    step: &Step,
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> Result<bool, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    if step.predicates.is_empty() {
        return Ok(true);
    }
    let mut candidates: Vec<N> = match node.parent() {
        Some(parent) if step.axis == Axis::Attribute => parent.attributes().collect(),
        Some(parent) => parent.children().collect(),
        None => vec![node],
    };
    candidates.retain(|c| step_accepts(*c, step));
    for predicate in &step.predicates {
        let size = candidates.len();
        let mut kept = Vec::with_capacity(size);
        for (i, candidate) in candidates.iter().enumerate() {
            let focus = e_ctx.with_focus(*candidate, i + 1, size);
            let value = xmlquery_xpath1::evaluate(predicate, &focus)?;
            let keep = match value {
                XPathValue::Number(n) => n == (i + 1) as f64,
                other => other.to_bool(),
            };
            if keep {
                kept.push(*candidate);
            }
        }
        if !kept.contains(&node) {
            return Ok(false);
        }
        candidates = kept;
    }
    Ok(true)
}
