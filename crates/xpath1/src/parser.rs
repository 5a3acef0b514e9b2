//! XPath 1.0 grammar written with `nom` combinators.

use super::ast::*;
use crate::error::XPathError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0, satisfy},
    combinator::{map, not, opt, peek, recognize, value},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated},
};

/// Parses an XPath 1.0 expression. Names are left unbound; see
/// [`crate::binding::compile`] for resolving prefixes.
pub fn parse_expression(input: &str) -> Result<Expression, XPathError> {
    if input.trim().is_empty() {
        return Err(XPathError::XPathParse(
            input.to_string(),
            "Expression is empty".to_string(),
        ));
    }
    match expression(input.trim()) {
        Ok(("", expr)) => Ok(expr),
        Ok((rem, _)) => Err(XPathError::XPathParse(
            input.to_string(),
            format!("Parser did not consume all input. Remainder: '{}'", rem),
        )),
        Err(e) => Err(XPathError::XPathParse(input.to_string(), e.to_string())),
    }
}

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_name_start_char(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

/// An operator name such as `and` or `div`. It must not run into a following name.
fn keyword<'a>(
    word: &'static str,
) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    terminated(tag(word), not(satisfy(is_name_char)))
}

type Operand = fn(&str) -> IResult<&str, Expression>;
type Operator = fn(&str) -> IResult<&str, BinaryOperator>;

/// One precedence level: operands of the next tighter level joined left to right.
fn left_assoc(input: &str, operand: Operand, operator: Operator) -> IResult<&str, Expression> {
    let (input, first) = operand(input)?;
    let (input, rest) = many0(pair(ws(operator), operand)).parse(input)?;
    let folded = rest.into_iter().fold(first, |left, (op, right)| Expression::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    });
    Ok((input, folded))
}

fn expression(input: &str) -> IResult<&str, Expression> {
    or_expr(input)
}

fn or_expr(input: &str) -> IResult<&str, Expression> {
    left_assoc(input, and_expr, |i| value(BinaryOperator::Or, keyword("or")).parse(i))
}

fn and_expr(input: &str) -> IResult<&str, Expression> {
    left_assoc(input, equality_expr, |i| {
        value(BinaryOperator::And, keyword("and")).parse(i)
    })
}

fn equality_expr(input: &str) -> IResult<&str, Expression> {
    left_assoc(input, relational_expr, |i| {
        alt((
            value(BinaryOperator::NotEquals, tag("!=")),
            value(BinaryOperator::Equals, tag("=")),
        ))
        .parse(i)
    })
}

/// Escaped comparison operators are accepted since expressions are often lifted
/// straight out of XML attribute text.
fn relational_expr(input: &str) -> IResult<&str, Expression> {
    left_assoc(input, additive_expr, |i| {
        alt((
            value(BinaryOperator::LessThanOrEqual, alt((tag("<="), tag("&lt;=")))),
            value(BinaryOperator::GreaterThanOrEqual, alt((tag(">="), tag("&gt;=")))),
            value(BinaryOperator::LessThan, alt((tag("<"), tag("&lt;")))),
            value(BinaryOperator::GreaterThan, alt((tag(">"), tag("&gt;")))),
        ))
        .parse(i)
    })
}

fn additive_expr(input: &str) -> IResult<&str, Expression> {
    left_assoc(input, multiplicative_expr, |i| {
        alt((
            value(BinaryOperator::Plus, char('+')),
            value(BinaryOperator::Minus, char('-')),
        ))
        .parse(i)
    })
}

fn multiplicative_expr(input: &str) -> IResult<&str, Expression> {
    left_assoc(input, unary_expr, |i| {
        alt((
            value(BinaryOperator::Multiply, char('*')),
            value(BinaryOperator::Divide, keyword("div")),
            value(BinaryOperator::Modulo, keyword("mod")),
        ))
        .parse(i)
    })
}

fn unary_expr(input: &str) -> IResult<&str, Expression> {
    match ws(char::<&str, nom::error::Error<&str>>('-')).parse(input) {
        Ok((rest, _)) => {
            let (rest, operand) = unary_expr(rest)?;
            let negated = Expression::UnaryOp {
                op: UnaryOperator::Minus,
                expr: Box::new(operand),
            };
            Ok((rest, negated))
        }
        Err(_) => union_expr(input),
    }
}

fn union_expr(input: &str) -> IResult<&str, Expression> {
    left_assoc(input, path_expr, |i| value(BinaryOperator::Union, char('|')).parse(i))
}

/// A path is either a plain location path or a filter expression optionally
/// followed by further steps (`$var/foo`, `(//a)[1]/b`, `key('k', 'v')//c`).
/// Primary expressions go first so `position()` is not taken for a step name.
fn path_expr(input: &str) -> IResult<&str, Expression> {
    alt((filter_path, map(location_path, Expression::LocationPath))).parse(input)
}

fn filter_path(input: &str) -> IResult<&str, Expression> {
    let (i, start_expr) = filter_expr(input)?;
    let (i, remainder_steps) = many0(pair(ws(path_separator), step)).parse(i)?;

    if remainder_steps.is_empty() {
        return Ok((i, start_expr));
    }

    let mut steps = Vec::with_capacity(remainder_steps.len() * 2);
    push_steps(&mut steps, remainder_steps);
    Ok((
        i,
        Expression::LocationPath(LocationPath {
            start_point: Some(Box::new(start_expr)),
            is_absolute: false,
            steps,
        }),
    ))
}

fn filter_expr(input: &str) -> IResult<&str, Expression> {
    let (i, primary) = primary_expr(input)?;
    let (i, predicates) = many0(predicate).parse(i)?;
    if predicates.is_empty() {
        Ok((i, primary))
    } else {
        Ok((
            i,
            Expression::Filter {
                primary: Box::new(primary),
                predicates,
            },
        ))
    }
}

fn primary_expr(input: &str) -> IResult<&str, Expression> {
    ws(alt((
        variable_reference,
        map(number_literal, Expression::Number),
        map(string_literal, Expression::Literal),
        function_call,
        delimited(ws(char('(')), expression, ws(char(')'))),
    )))
    .parse(input)
}

/// `Digits ('.' Digits?)? | '.' Digits`. No sign, no exponent.
fn number_literal(input: &str) -> IResult<&str, f64> {
    let digits = |s: &str| s.bytes().take_while(u8::is_ascii_digit).count();
    let whole = digits(input);
    let fraction = match input[whole..].strip_prefix('.') {
        Some(after_dot) => 1 + digits(after_dot),
        None => 0,
    };
    let len = whole + fraction;
    if whole == 0 && fraction <= 1 {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        )));
    }
    let (literal, rest) = input.split_at(len);
    match literal.parse::<f64>() {
        Ok(number) => Ok((rest, number)),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Float,
        ))),
    }
}

fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        alt((
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
        )),
        |s: &str| s.to_string(),
    )
    .parse(input)
}

fn variable_reference(input: &str) -> IResult<&str, Expression> {
    map(preceded(char('$'), q_name), Expression::Variable).parse(input)
}

fn nc_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(is_name_start_char),
        take_while(is_name_char),
    ))
    .parse(input)
}

fn qualified_name(input: &str) -> IResult<&str, (Option<&str>, &str)> {
    map(
        pair(nc_name, opt(preceded(char(':'), nc_name))),
        |(first, second)| match second {
            Some(local) => (Some(first), local),
            None => (None, first),
        },
    )
    .parse(input)
}

fn q_name(input: &str) -> IResult<&str, String> {
    map(recognize(qualified_name), |s: &str| s.to_string()).parse(input)
}

const NODE_TYPES: [&str; 4] = ["processing-instruction", "comment", "text", "node"];

fn node_type_test(input: &str) -> IResult<&str, NodeTest> {
    let (rest, name) = alt((tag(NODE_TYPES[0]), tag(NODE_TYPES[1]), tag(NODE_TYPES[2]), tag(NODE_TYPES[3])))
        .parse(input)?;
    let (rest, _) = pair(ws(char('(')), ws(char(')'))).parse(rest)?;
    let test = match name {
        "text" => NodeTypeTest::Text,
        "comment" => NodeTypeTest::Comment,
        "processing-instruction" => NodeTypeTest::ProcessingInstruction,
        _ => NodeTypeTest::Node,
    };
    Ok((rest, NodeTest::NodeType(test)))
}

fn pi_target_test(input: &str) -> IResult<&str, NodeTest> {
    map(
        preceded(
            tag("processing-instruction"),
            delimited(ws(char('(')), string_literal, ws(char(')'))),
        ),
        NodeTest::ProcessingInstruction,
    )
    .parse(input)
}

pub fn node_test(input: &str) -> IResult<&str, NodeTest> {
    alt((
        value(NodeTest::Wildcard, tag("*")),
        node_type_test,
        pi_target_test,
        map(terminated(nc_name, tag(":*")), |prefix: &str| {
            NodeTest::NamespaceWildcard {
                prefix: prefix.to_string(),
                namespace: None,
            }
        }),
        map(qualified_name, |(prefix, local)| {
            NodeTest::Name(NameTest::new(prefix, local))
        }),
    ))
    .parse(input)
}

const AXES: [(&str, Axis); 13] = [
    ("ancestor", Axis::Ancestor),
    ("ancestor-or-self", Axis::AncestorOrSelf),
    ("attribute", Axis::Attribute),
    ("child", Axis::Child),
    ("descendant", Axis::Descendant),
    ("descendant-or-self", Axis::DescendantOrSelf),
    ("following", Axis::Following),
    ("following-sibling", Axis::FollowingSibling),
    ("namespace", Axis::Namespace),
    ("parent", Axis::Parent),
    ("preceding", Axis::Preceding),
    ("preceding-sibling", Axis::PrecedingSibling),
    ("self", Axis::SelfAxis),
];

fn axis(input: &str) -> IResult<&str, Axis> {
    let (rest, name) =
        take_while1::<_, &str, nom::error::Error<&str>>(|c: char| c.is_ascii_lowercase() || c == '-')
            .parse(input)?;
    let Some(&(_, found)) = AXES.iter().find(|(axis_name, _)| *axis_name == name) else {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    };
    let (rest, _) = ws(tag("::")).parse(rest)?;
    Ok((rest, found))
}

fn predicate(input: &str) -> IResult<&str, Expression> {
    delimited(ws(char('[')), expression, ws(char(']'))).parse(input)
}

fn step(input: &str) -> IResult<&str, Step> {
    let any_node = || NodeTest::NodeType(NodeTypeTest::Node);
    let (i, (axis, node_test)) = alt((
        map(tag(".."), |_| (Axis::Parent, any_node())),
        map(tag("."), |_| (Axis::SelfAxis, any_node())),
        map(preceded(ws(char('@')), node_test), |nt| (Axis::Attribute, nt)),
        map(pair(opt(axis), node_test), |(ax, nt)| {
            (ax.unwrap_or(Axis::Child), nt)
        }),
    ))
    .parse(input)?;
    let (i, predicates) = many0(predicate).parse(i)?;
    Ok((
        i,
        Step {
            axis,
            node_test,
            predicates,
        },
    ))
}

fn path_separator(input: &str) -> IResult<&str, &str> {
    alt((tag("//"), tag("/"))).parse(input)
}

fn push_steps(steps: &mut Vec<Step>, remainder: Vec<(&str, Step)>) {
    for (sep, next_step) in remainder {
        if sep == "//" {
            steps.push(Step::descendant_or_self());
        }
        steps.push(next_step);
    }
}

/// A path that starts at the root or at the context node, never at a filter expression.
fn location_path(input: &str) -> IResult<&str, LocationPath> {
    let (rest, lead) = opt(path_separator).parse(input)?;
    let (rest, first) = match lead {
        Some(_) => opt(preceded(multispace0, step)).parse(rest)?,
        None => map(step, Some).parse(rest)?,
    };
    let Some(first) = first else {
        return match lead {
            Some("/") => Ok((
                rest,
                LocationPath {
                    start_point: None,
                    is_absolute: true,
                    steps: Vec::new(),
                },
            )),
            _ => Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Verify,
            ))),
        };
    };

    let mut steps = Vec::new();
    if lead == Some("//") {
        steps.push(Step::descendant_or_self());
    }
    steps.push(first);
    let (rest, more) = many0(pair(ws(path_separator), step)).parse(rest)?;
    push_steps(&mut steps, more);

    Ok((
        rest,
        LocationPath {
            start_point: None,
            is_absolute: lead.is_some(),
            steps,
        },
    ))
}

/// `name(args)`. Node type tests share the syntax but belong to steps.
fn function_call(input: &str) -> IResult<&str, Expression> {
    let (rest, name) = terminated(q_name, peek(ws(char('(')))).parse(input)?;
    if NODE_TYPES.contains(&name.as_str()) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }
    let (rest, args) = delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), expression),
        char(')'),
    )
    .parse(rest)?;
    Ok((rest, Expression::FunctionCall { name, args }))
}
