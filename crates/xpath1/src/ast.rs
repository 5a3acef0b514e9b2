//! Syntax tree produced by the parser and walked by the engine.

/// Any XPath 1.0 expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(String),
    Number(f64),
    LocationPath(LocationPath),
    Variable(String),
    FunctionCall {
        name: String,
        args: Vec<Expression>,
    },
    /// A primary expression narrowed by predicates, e.g. `(//a)[1]` or `$items[@id]`.
    Filter {
        primary: Box<Expression>,
        predicates: Vec<Expression>,
    },
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    UnaryOp {
        op: UnaryOperator,
        expr: Box<Expression>,
    },
}

impl Expression {
    pub fn is_location_path(&self) -> bool {
        matches!(self, Expression::LocationPath(_))
    }

    /// Calls `f` with the name of every variable the expression reads,
    /// predicates and path starts included.
    pub fn for_each_variable(&self, f: &mut dyn FnMut(&str)) {
        match self {
            Expression::Variable(name) => f(name.as_str()),
            Expression::Literal(_) | Expression::Number(_) => {}
            Expression::LocationPath(path) => path.for_each_variable(f),
            Expression::FunctionCall { args, .. } => {
                for arg in args {
                    arg.for_each_variable(f);
                }
            }
            Expression::Filter {
                primary,
                predicates,
            } => {
                primary.for_each_variable(f);
                for predicate in predicates {
                    predicate.for_each_variable(f);
                }
            }
            Expression::BinaryOp { left, right, .. } => {
                left.for_each_variable(f);
                right.for_each_variable(f);
            }
            Expression::UnaryOp { expr, .. } => expr.for_each_variable(f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Minus,
}

/// Infix operators, loosest binding first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Or,
    And,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Union,
}

/// `/child::foo`, `descendant::bar[1]` or `$var/item`.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
    /// Filter expression the steps continue from (`$var/foo`, `key('k','v')/foo`).
    pub start_point: Option<Box<Expression>>,
    /// Starts at the root of the context node's tree. Ignored when `start_point` is set.
    pub is_absolute: bool,
    pub steps: Vec<Step>,
}

impl LocationPath {
    fn for_each_variable(&self, f: &mut dyn FnMut(&str)) {
        if let Some(start) = &self.start_point {
            start.for_each_variable(f);
        }
        for step in &self.steps {
            for predicate in &step.predicates {
                predicate.for_each_variable(f);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub node_test: NodeTest,
    pub predicates: Vec<Expression>,
}

impl Step {
    pub(crate) fn new(axis: Axis, node_test: NodeTest) -> Self {
        Self {
            axis,
            node_test,
            predicates: vec![],
        }
    }

    /// The `descendant-or-self::node()` step that `//` abbreviates.
    pub(crate) fn descendant_or_self() -> Self {
        Self::new(Axis::DescendantOrSelf, NodeTest::NodeType(NodeTypeTest::Node))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Attribute,
    Parent,
    Ancestor,
    AncestorOrSelf,
    SelfAxis,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
    Namespace,
}

impl Axis {
    /// Reverse axes number their nodes from the context node backwards.
    pub fn is_reverse(&self) -> bool {
        matches!(
            self,
            Axis::Parent
                | Axis::Ancestor
                | Axis::AncestorOrSelf
                | Axis::PrecedingSibling
                | Axis::Preceding
        )
    }
}

/// A qualified name test. `namespace` is filled in when the expression is bound
/// against a namespace resolver; an unprefixed name always tests the null namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTest {
    pub prefix: Option<String>,
    pub local_part: String,
    pub namespace: Option<String>,
}

impl NameTest {
    pub fn new(prefix: Option<&str>, local_part: &str) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            local_part: local_part.to_string(),
            namespace: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    Name(NameTest),
    /// `*`
    Wildcard,
    /// `xhtml:*`
    NamespaceWildcard {
        prefix: String,
        namespace: Option<String>,
    },
    NodeType(NodeTypeTest),
    /// `processing-instruction('target')`.
    ProcessingInstruction(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeTypeTest {
    Text,
    Node,
    Comment,
    ProcessingInstruction,
}
