//! Implements XPath 1.0 comparison, arithmetic and union semantics.

use super::ast::BinaryOperator;
use super::engine::{XPathValue, parse_number};
use crate::datasource::DataSourceNode;
use crate::error::XPathError;

/// Applies a non-logical binary operator. `and`/`or` short-circuit in the
/// engine and never reach this function.
pub fn evaluate<'a, N: DataSourceNode<'a>>(
    op: BinaryOperator,
    left: XPathValue<N>,
    right: XPathValue<N>,
) -> Result<XPathValue<N>, XPathError> {
    match op {
        BinaryOperator::Union => union(left, right),
        BinaryOperator::Equals
        | BinaryOperator::NotEquals
        | BinaryOperator::LessThan
        | BinaryOperator::LessThanOrEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterThanOrEqual => Ok(XPathValue::Boolean(compare(op, &left, &right))),
        BinaryOperator::Plus => Ok(XPathValue::Number(left.to_number() + right.to_number())),
        BinaryOperator::Minus => Ok(XPathValue::Number(left.to_number() - right.to_number())),
        BinaryOperator::Multiply => Ok(XPathValue::Number(left.to_number() * right.to_number())),
        BinaryOperator::Divide => Ok(XPathValue::Number(left.to_number() / right.to_number())),
        // Truncating remainder, same sign as the dividend.
        BinaryOperator::Modulo => Ok(XPathValue::Number(left.to_number() % right.to_number())),
        BinaryOperator::And => Ok(XPathValue::Boolean(left.to_bool() && right.to_bool())),
        BinaryOperator::Or => Ok(XPathValue::Boolean(left.to_bool() || right.to_bool())),
    }
}

fn union<'a, N: DataSourceNode<'a>>(
    left: XPathValue<N>,
    right: XPathValue<N>,
) -> Result<XPathValue<N>, XPathError> {
    match (left, right) {
        (XPathValue::NodeSet(mut l), XPathValue::NodeSet(r)) => {
            l.extend(r);
            l.sort();
            l.dedup();
            Ok(XPathValue::NodeSet(l))
        }
        (l, r) => Err(XPathError::TypeError(format!(
            "Union operator '|' requires two node-sets, got a {} and a {}",
            l.type_name(),
            r.type_name()
        ))),
    }
}

/// An atomic operand: what a node-set member or a scalar compares as.
#[derive(Debug, Clone, Copy)]
enum Atom<'s> {
    Str(&'s str),
    Num(f64),
    Bool(bool),
}

fn compare_atoms(op: BinaryOperator, left: Atom<'_>, right: Atom<'_>) -> bool {
    use BinaryOperator::*;
    match op {
        Equals | NotEquals => {
            let equal = match (left, right) {
                (Atom::Bool(_), _) | (_, Atom::Bool(_)) => as_bool(left) == as_bool(right),
                (Atom::Num(_), _) | (_, Atom::Num(_)) => as_num(left) == as_num(right),
                (Atom::Str(l), Atom::Str(r)) => l == r,
            };
            if op == Equals { equal } else { !equal }
        }
        LessThan => as_num(left) < as_num(right),
        LessThanOrEqual => as_num(left) <= as_num(right),
        GreaterThan => as_num(left) > as_num(right),
        GreaterThanOrEqual => as_num(left) >= as_num(right),
        _ => false,
    }
}

fn as_num(atom: Atom<'_>) -> f64 {
    match atom {
        Atom::Str(s) => parse_number(s),
        Atom::Num(n) => n,
        Atom::Bool(b) => {
            if b {
                1.0
            } else {
                0.0
            }
        }
    }
}

fn as_bool(atom: Atom<'_>) -> bool {
    match atom {
        Atom::Str(s) => !s.is_empty(),
        Atom::Num(n) => n != 0.0 && !n.is_nan(),
        Atom::Bool(b) => b,
    }
}

fn flip(op: BinaryOperator) -> BinaryOperator {
    match op {
        BinaryOperator::LessThan => BinaryOperator::GreaterThan,
        BinaryOperator::LessThanOrEqual => BinaryOperator::GreaterThanOrEqual,
        BinaryOperator::GreaterThan => BinaryOperator::LessThan,
        BinaryOperator::GreaterThanOrEqual => BinaryOperator::LessThanOrEqual,
        other => other,
    }
}

/// XPath 1.0 comparison: a node-set compares true if any of its members does,
/// except against a boolean, where the node-set itself is converted.
fn compare<'a, N: DataSourceNode<'a>>(
    op: BinaryOperator,
    left: &XPathValue<N>,
    right: &XPathValue<N>,
) -> bool {
    match (left, right) {
        (XPathValue::NodeSet(l), XPathValue::NodeSet(r)) => {
            let right_strings: Vec<String> = r.iter().map(|n| n.string_value()).collect();
            l.iter().any(|ln| {
                let ls = ln.string_value();
                right_strings.iter().any(|rs| {
                    // Members compare as strings for equality and as numbers otherwise.
                    compare_atoms(op, Atom::Str(&ls), Atom::Str(rs))
                })
            })
        }
        (XPathValue::NodeSet(nodes), XPathValue::Boolean(b)) => {
            compare_atoms(op, Atom::Bool(!nodes.is_empty()), Atom::Bool(*b))
        }
        (XPathValue::Boolean(_), XPathValue::NodeSet(_)) => compare(flip(op), right, left),
        (XPathValue::NodeSet(nodes), scalar) => {
            let other = scalar_atom(scalar);
            let other_str;
            let other = match other {
                Some(atom) => atom,
                None => {
                    other_str = scalar.to_string();
                    Atom::Str(&other_str)
                }
            };
            nodes.iter().any(|n| {
                let s = n.string_value();
                let member = match other {
                    Atom::Num(_) => Atom::Num(parse_number(&s)),
                    _ => Atom::Str(&s),
                };
                compare_atoms(op, member, other)
            })
        }
        (_, XPathValue::NodeSet(_)) => compare(flip(op), right, left),
        (l, r) => {
            let (ls, rs) = (l.to_string(), r.to_string());
            let la = scalar_atom(l).unwrap_or(Atom::Str(&ls));
            let ra = scalar_atom(r).unwrap_or(Atom::Str(&rs));
            compare_atoms(op, la, ra)
        }
    }
}

fn scalar_atom<'a, 's, N: DataSourceNode<'a>>(value: &XPathValue<N>) -> Option<Atom<'s>> {
    match value {
        XPathValue::Number(n) => Some(Atom::Num(*n)),
        XPathValue::Boolean(b) => Some(Atom::Bool(*b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::tests::{MockNode, create_test_tree};

    fn num<'a>(n: f64) -> XPathValue<MockNode<'a>> {
        XPathValue::Number(n)
    }

    fn string<'a>(s: &str) -> XPathValue<MockNode<'a>> {
        XPathValue::String(s.to_string())
    }

    fn is_true(v: Result<XPathValue<MockNode<'_>>, XPathError>) -> bool {
        v.unwrap().to_bool()
    }

    #[test]
    fn test_arithmetic() {
        let r = evaluate(BinaryOperator::Modulo, num(-5.0), num(2.0)).unwrap();
        assert_eq!(r.to_number(), -1.0);
        let r = evaluate(BinaryOperator::Divide, num(1.0), num(0.0)).unwrap();
        assert_eq!(r.to_number(), f64::INFINITY);
        let r = evaluate(BinaryOperator::Plus, string("2"), string("x")).unwrap();
        assert!(r.to_number().is_nan());
    }

    #[test]
    fn test_scalar_comparisons() {
        assert!(is_true(evaluate(BinaryOperator::Equals, string("1.0"), num(1.0))));
        assert!(!is_true(evaluate(BinaryOperator::Equals, string("1.0"), string("1"))));
        assert!(is_true(evaluate(
            BinaryOperator::Equals,
            string("x"),
            XPathValue::Boolean(true)
        )));
        assert!(is_true(evaluate(BinaryOperator::LessThan, string("2"), string("10"))));
        assert!(!is_true(evaluate(BinaryOperator::Equals, num(f64::NAN), num(f64::NAN))));
    }

    #[test]
    fn test_node_set_comparisons_are_existential() {
        let tree = create_test_tree();
        let paras = XPathValue::NodeSet(vec![tree.node(1), tree.node(8)]);
        assert!(is_true(evaluate(BinaryOperator::Equals, paras.clone(), string("World"))));
        assert!(is_true(evaluate(BinaryOperator::NotEquals, paras.clone(), string("World"))));
        let empty = XPathValue::NodeSet(vec![]);
        assert!(!is_true(evaluate(BinaryOperator::Equals, empty.clone(), string(""))));
        assert!(!is_true(evaluate(BinaryOperator::NotEquals, empty.clone(), string(""))));
        assert!(is_true(evaluate(
            BinaryOperator::Equals,
            empty,
            XPathValue::Boolean(false)
        )));
        let texts = XPathValue::NodeSet(vec![tree.node(4)]);
        assert!(is_true(evaluate(BinaryOperator::Equals, texts, paras)));
    }

    #[test]
    fn test_reversed_relational_operands() {
        let tree = create_test_tree();
        // <m:item> has string value "x", which is NaN as a number.
        let item = XPathValue::NodeSet(vec![tree.node(10)]);
        assert!(!is_true(evaluate(BinaryOperator::LessThan, num(1.0), item.clone())));
        assert!(!is_true(evaluate(BinaryOperator::GreaterThan, num(1.0), item)));
    }

    #[test]
    fn test_union_requires_node_sets() {
        let tree = create_test_tree();
        let a = XPathValue::NodeSet(vec![tree.node(8), tree.node(1)]);
        let b = XPathValue::NodeSet(vec![tree.node(1)]);
        match evaluate(BinaryOperator::Union, a, b).unwrap() {
            XPathValue::NodeSet(nodes) => {
                assert_eq!(nodes.iter().map(|n| n.id).collect::<Vec<_>>(), vec![1, 8])
            }
            other => panic!("Expected NodeSet, got {:?}", other),
        }
        assert!(matches!(
            evaluate(BinaryOperator::Union, num(1.0), num(2.0)),
            Err(XPathError::TypeError(_))
        ));
    }
}
