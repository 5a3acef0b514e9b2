//! Defines the registry and built-in implementations for XPath 1.0 functions,
//! plus the additional functions XSLT 1.0 makes available to expressions.

use super::engine::{EvaluationContext, XPathValue, parse_number, root_of};
use crate::datasource::{DataSourceNode, NodeType};
use crate::error::XPathError;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::Hasher;

/// Accepted argument counts for a function. `max` of `None` means variadic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Arity {
    min: usize,
    max: Option<usize>,
}

/// The set of functions an expression may call, with their arities.
/// Calls are checked against it before evaluation starts.
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<&'static str, Arity>,
    instructions: HashSet<String>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
            instructions: HashSet::new(),
        }
    }

    pub fn register(&mut self, name: &'static str, min: usize, max: Option<usize>) {
        self.functions.insert(name, Arity { min, max });
    }

    /// The XPath 1.0 core function library.
    pub fn core() -> Self {
        let mut registry = Self::new();
        // Node-set
        registry.register("last", 0, Some(0));
        registry.register("position", 0, Some(0));
        registry.register("count", 1, Some(1));
        registry.register("id", 1, Some(1));
        registry.register("local-name", 0, Some(1));
        registry.register("namespace-uri", 0, Some(1));
        registry.register("name", 0, Some(1));
        // String
        registry.register("string", 0, Some(1));
        registry.register("concat", 2, None);
        registry.register("starts-with", 2, Some(2));
        registry.register("contains", 2, Some(2));
        registry.register("substring-before", 2, Some(2));
        registry.register("substring-after", 2, Some(2));
        registry.register("substring", 2, Some(3));
        registry.register("string-length", 0, Some(1));
        registry.register("normalize-space", 0, Some(1));
        registry.register("translate", 3, Some(3));
        // Boolean
        registry.register("boolean", 1, Some(1));
        registry.register("not", 1, Some(1));
        registry.register("true", 0, Some(0));
        registry.register("false", 0, Some(0));
        registry.register("lang", 1, Some(1));
        // Number
        registry.register("number", 0, Some(1));
        registry.register("sum", 1, Some(1));
        registry.register("floor", 1, Some(1));
        registry.register("ceiling", 1, Some(1));
        registry.register("round", 1, Some(1));
        registry
    }

    /// The core library plus the functions XSLT 1.0 adds.
    pub fn xslt() -> Self {
        let mut registry = Self::core();
        registry.register("current", 0, Some(0));
        registry.register("key", 2, Some(2));
        registry.register("generate-id", 0, Some(1));
        registry.register("format-number", 2, Some(3));
        registry.register("system-property", 1, Some(1));
        registry.register("element-available", 1, Some(1));
        registry.register("function-available", 1, Some(1));
        registry.register("unparsed-entity-uri", 1, Some(1));
        registry
    }

    /// Declares the instruction names `element-available()` reports as supported.
    pub fn with_instructions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instructions.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Verifies that `name` exists and accepts `arg_count` arguments.
    pub fn check(&self, name: &str, arg_count: usize) -> Result<(), XPathError> {
        let arity = self
            .functions
            .get(name)
            .ok_or_else(|| XPathError::UnknownFunction(name.to_string()))?;
        let too_few = arg_count < arity.min;
        let too_many = arity.max.is_some_and(|max| arg_count > max);
        if too_few || too_many {
            let expected = match arity.max {
                Some(max) if max == arity.min => format!("{}", max),
                Some(max) => format!("{} to {}", arity.min, max),
                None => format!("at least {}", arity.min),
            };
            return Err(XPathError::FunctionError {
                function: format!("{}()", name),
                message: format!("Expected {} argument(s), got {}", expected, arg_count),
            });
        }
        Ok(())
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::core()
    }
}

/// Dispatches a function call to the correct implementation.
pub fn evaluate_function<'a, 'd, N: DataSourceNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, 'd, N>,
) -> Result<XPathValue<N>, XPathError> {
    e_ctx.functions.check(name, args.len())?;
    match name {
        // Node-set
        "last" => Ok(XPathValue::Number(e_ctx.context_size as f64)),
        "position" => Ok(XPathValue::Number(e_ctx.context_position as f64)),
        "count" => func_count(args),
        "id" => func_id(args, e_ctx),
        "local-name" => func_local_name(args, e_ctx),
        "namespace-uri" => func_namespace_uri(args, e_ctx),
        "name" => func_name(args, e_ctx),

        // String
        "string" => Ok(XPathValue::String(string_or_context(args, e_ctx))),
        "concat" => Ok(XPathValue::String(
            args.iter().map(|v| v.to_string()).collect(),
        )),
        "starts-with" => func_string_pair(args, |s1, s2| {
            XPathValue::Boolean(s1.starts_with(s2))
        }),
        "contains" => func_string_pair(args, |s1, s2| XPathValue::Boolean(s1.contains(s2))),
        "substring-before" => func_string_pair(args, |s1, s2| {
            XPathValue::String(s1.find(s2).map(|i| s1[..i].to_string()).unwrap_or_default())
        }),
        "substring-after" => func_string_pair(args, |s1, s2| {
            XPathValue::String(
                s1.find(s2)
                    .map(|i| s1[i + s2.len()..].to_string())
                    .unwrap_or_default(),
            )
        }),
        "substring" => func_substring(args),
        "string-length" => Ok(XPathValue::Number(
            string_or_context(args, e_ctx).chars().count() as f64,
        )),
        "normalize-space" => Ok(XPathValue::String(
            string_or_context(args, e_ctx)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" "),
        )),
        "translate" => func_translate(args),

        // Boolean
        "boolean" => Ok(XPathValue::Boolean(args[0].to_bool())),
        "not" => Ok(XPathValue::Boolean(!args[0].to_bool())),
        "true" => Ok(XPathValue::Boolean(true)),
        "false" => Ok(XPathValue::Boolean(false)),
        "lang" => func_lang(args, e_ctx),

        // Number
        "number" => Ok(XPathValue::Number(match args.first() {
            Some(v) => v.to_number(),
            None => parse_number(&e_ctx.context_node.string_value()),
        })),
        "sum" => func_sum(args),
        "floor" => Ok(XPathValue::Number(args[0].to_number().floor())),
        "ceiling" => Ok(XPathValue::Number(args[0].to_number().ceil())),
        "round" => Ok(XPathValue::Number(xpath_round(args[0].to_number()))),

        // XSLT additions
        "current" => Ok(XPathValue::NodeSet(vec![e_ctx.current_node])),
        "key" => func_key(args, e_ctx),
        "generate-id" => func_generate_id(args, e_ctx),
        "format-number" => Ok(XPathValue::String(format_decimal(
            args[0].to_number(),
            &args[1].to_string(),
        ))),
        "system-property" => Ok(XPathValue::String(system_property(&args[0].to_string()))),
        "element-available" => {
            let name = args[0].to_string();
            Ok(XPathValue::Boolean(e_ctx.functions.instructions.contains(&name)))
        }
        "function-available" => Ok(XPathValue::Boolean(
            e_ctx.functions.contains(&args[0].to_string()),
        )),
        "unparsed-entity-uri" => Ok(XPathValue::String(String::new())),

        _ => Err(XPathError::UnknownFunction(name.to_string())),
    }
}

fn node_set_arg<'a, N: DataSourceNode<'a>>(
    function: &str,
    value: XPathValue<N>,
) -> Result<Vec<N>, XPathError> {
    match value {
        XPathValue::NodeSet(nodes) => Ok(nodes),
        v => Err(XPathError::TypeError(format!(
            "{}() argument must be a node-set, got a {}",
            function,
            v.type_name()
        ))),
    }
}

/// The single optional node-set argument, defaulting to the context node.
fn first_node_or_context<'a, N: DataSourceNode<'a>>(
    function: &str,
    mut args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> Result<Option<N>, XPathError> {
    if args.is_empty() {
        return Ok(Some(e_ctx.context_node));
    }
    let mut nodes = node_set_arg(function, args.remove(0))?;
    nodes.sort();
    Ok(nodes.first().copied())
}

fn string_or_context<'a, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> String {
    match args.first() {
        Some(v) => v.to_string(),
        None => e_ctx.context_node.string_value(),
    }
}

fn func_string_pair<'a, N, F>(args: Vec<XPathValue<N>>, f: F) -> Result<XPathValue<N>, XPathError>
where
    N: DataSourceNode<'a>,
    F: FnOnce(&str, &str) -> XPathValue<N>,
{
    let s1 = args[0].to_string();
    let s2 = args[1].to_string();
    Ok(f(&s1, &s2))
}

// --- Node-Set Functions ---

fn func_count<'a, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    let nodes = node_set_arg("count", args.remove(0))?;
    Ok(XPathValue::Number(nodes.len() as f64))
}

fn func_id<'a, 'd, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, 'd, N>,
) -> Result<XPathValue<N>, XPathError> {
    let id_string = match args.remove(0) {
        XPathValue::NodeSet(nodes) => nodes
            .iter()
            .map(|n| n.string_value())
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    };
    let ids_to_find: HashSet<_> = id_string.split_whitespace().collect();
    if ids_to_find.is_empty() {
        return Ok(XPathValue::NodeSet(vec![]));
    }

    let mut results = Vec::new();
    let mut stack = vec![root_of(e_ctx.context_node)];
    while let Some(node) = stack.pop() {
        if node.node_type() == NodeType::Element {
            let has_id = node.attributes().any(|attr| {
                attr.name().is_some_and(|q| {
                    q.local_part == "id"
                        && (q.namespace.is_none() || q.namespace == Some(crate::XML_NAMESPACE))
                }) && ids_to_find.contains(attr.string_value().as_str())
            });
            if has_id {
                results.push(node);
            }
        }
        let mut children: Vec<N> = node.children().collect();
        children.reverse();
        stack.extend(children);
    }
    Ok(XPathValue::NodeSet(results))
}

fn func_local_name<'a, 'd, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, 'd, N>,
) -> Result<XPathValue<N>, XPathError> {
    let node = first_node_or_context("local-name", args, e_ctx)?;
    let name = node
        .and_then(|n| n.name().map(|q| q.local_part.to_string()))
        .unwrap_or_default();
    Ok(XPathValue::String(name))
}

fn func_namespace_uri<'a, 'd, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, 'd, N>,
) -> Result<XPathValue<N>, XPathError> {
    let node = first_node_or_context("namespace-uri", args, e_ctx)?;
    let uri = node
        .filter(|n| matches!(n.node_type(), NodeType::Element | NodeType::Attribute))
        .and_then(|n| n.name().and_then(|q| q.namespace.map(str::to_string)))
        .unwrap_or_default();
    Ok(XPathValue::String(uri))
}

fn func_name<'a, 'd, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, 'd, N>,
) -> Result<XPathValue<N>, XPathError> {
    let node = first_node_or_context("name", args, e_ctx)?;
    let name = node
        .and_then(|n| {
            n.name().map(|q| match q.prefix {
                Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, q.local_part),
                _ => q.local_part.to_string(),
            })
        })
        .unwrap_or_default();
    Ok(XPathValue::String(name))
}

// --- String Functions ---

fn func_substring<'a, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    let s = args[0].to_string();
    let first = xpath_round(args[1].to_number());
    let last = match args.get(2) {
        Some(len) => first + xpath_round(len.to_number()),
        None => f64::INFINITY,
    };

    let result = s
        .chars()
        .enumerate()
        .filter_map(|(i, c)| {
            let pos = (i + 1) as f64; // XPath positions are 1-based
            (pos >= first && pos < last).then_some(c)
        })
        .collect::<String>();
    Ok(XPathValue::String(result))
}

fn func_translate<'a, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    let source_str = args[0].to_string();
    let from_str: Vec<char> = args[1].to_string().chars().collect();
    let to_str: Vec<char> = args[2].to_string().chars().collect();
    let result = source_str
        .chars()
        .filter_map(|c| match from_str.iter().position(|&fc| fc == c) {
            Some(pos) => to_str.get(pos).copied(),
            None => Some(c),
        })
        .collect::<String>();
    Ok(XPathValue::String(result))
}

// --- Boolean Functions ---

fn func_lang<'a, 'd, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, 'd, N>,
) -> Result<XPathValue<N>, XPathError> {
    let test_lang = args[0].to_string().to_lowercase();
    let mut current = Some(e_ctx.context_node);
    if current.is_some_and(|n| n.node_type() != NodeType::Element) {
        current = current.and_then(|n| n.parent());
    }

    while let Some(node) = current {
        let declared = node.attributes().find(|attr| {
            attr.name()
                .is_some_and(|q| q.namespace == Some(crate::XML_NAMESPACE) && q.local_part == "lang")
        });
        if let Some(attr) = declared {
            // The nearest xml:lang decides; "en" also matches "en-GB".
            let node_lang = attr.string_value().to_lowercase();
            let matches =
                node_lang == test_lang || node_lang.starts_with(&format!("{}-", test_lang));
            return Ok(XPathValue::Boolean(matches));
        }
        current = node.parent();
    }
    Ok(XPathValue::Boolean(false))
}

// --- Number Functions ---

fn func_sum<'a, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    let nodes = node_set_arg("sum", args.remove(0))?;
    Ok(XPathValue::Number(
        nodes.iter().map(|node| parse_number(&node.string_value())).sum(),
    ))
}

/// Rounds halves towards positive infinity, keeping NaN, infinities and zero.
fn xpath_round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() || n == 0.0 {
        n
    } else {
        (n + 0.5).floor()
    }
}

// --- XSLT Functions ---

fn func_key<'a, 'd, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, 'd, N>,
) -> Result<XPathValue<N>, XPathError> {
    let key_name = args[0].to_string();
    let Some(key_index) = e_ctx.key_indexes.get(&key_name) else {
        return Err(XPathError::FunctionError {
            function: "key()".to_string(),
            message: format!("No key named '{}' is declared", key_name),
        });
    };

    let key_values = match &args[1] {
        XPathValue::NodeSet(nodes) => nodes.iter().map(|n| n.string_value()).collect(),
        other => vec![other.to_string()],
    };

    let mut result_nodes: Vec<N> = key_values
        .iter()
        .filter_map(|value| key_index.get(value))
        .flatten()
        .copied()
        .collect();
    result_nodes.sort();
    result_nodes.dedup();
    Ok(XPathValue::NodeSet(result_nodes))
}

fn func_generate_id<'a, 'd, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, 'd, N>,
) -> Result<XPathValue<N>, XPathError> {
    let node = first_node_or_context("generate-id", args, e_ctx)?;
    Ok(XPathValue::String(match node {
        Some(node) => {
            let mut hasher = DefaultHasher::new();
            node.hash(&mut hasher);
            // The leading letter keeps the id a valid NCName.
            format!("id{}", hasher.finish())
        }
        None => String::new(),
    }))
}

fn system_property(name: &str) -> String {
    let local = name.rsplit(':').next().unwrap_or(name);
    match local {
        "version" => "1.0".to_string(),
        "vendor" => "xmlquery".to_string(),
        _ => String::new(),
    }
}

struct SubPattern<'p> {
    prefix: &'p str,
    suffix: &'p str,
    min_int: usize,
    grouping: Option<usize>,
    min_frac: usize,
    max_frac: usize,
    percent: bool,
}

fn split_sub_pattern(pattern: &str) -> SubPattern<'_> {
    let is_body = |c: char| matches!(c, '#' | '0' | ',' | '.');
    let start = pattern.find(is_body).unwrap_or(pattern.len());
    let end = pattern.rfind(is_body).map(|i| i + 1).unwrap_or(start);
    let (prefix, body, suffix) = (&pattern[..start], &pattern[start..end], &pattern[end..]);
    let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
    SubPattern {
        prefix,
        suffix,
        min_int: int_part.chars().filter(|&c| c == '0').count(),
        grouping: int_part
            .rfind(',')
            .map(|i| int_part[i + 1..].chars().filter(|&c| c == '#' || c == '0').count())
            .filter(|&n| n > 0),
        min_frac: frac_part.chars().filter(|&c| c == '0').count(),
        max_frac: frac_part.chars().filter(|&c| c == '0' || c == '#').count(),
        percent: prefix.contains('%') || suffix.contains('%'),
    }
}

/// Formats a number with a JDK-style decimal pattern, e.g. `#,##0.00` or
/// `0.0%;(0.0%)`. Only the default decimal format symbols are supported.
pub fn format_decimal(number: f64, pattern: &str) -> String {
    let (positive, negative) = match pattern.split_once(';') {
        Some((p, n)) => (p, Some(n)),
        None => (pattern, None),
    };
    let pos = split_sub_pattern(positive);
    if number.is_nan() {
        return "NaN".to_string();
    }
    let is_negative = number < 0.0;
    let (prefix, suffix) = match (is_negative, negative) {
        (false, _) => (pos.prefix.to_string(), pos.suffix.to_string()),
        (true, Some(neg)) => {
            let sp = split_sub_pattern(neg);
            (sp.prefix.to_string(), sp.suffix.to_string())
        }
        (true, None) => (format!("-{}", pos.prefix), pos.suffix.to_string()),
    };
    if number.is_infinite() {
        return format!("{}Infinity{}", prefix, suffix);
    }

    let mut value = number.abs();
    if pos.percent {
        value *= 100.0;
    }
    let rendered = format!("{:.*}", pos.max_frac, value);
    let (int_digits, frac_digits) = rendered.split_once('.').unwrap_or((&rendered, ""));

    let mut frac = frac_digits.to_string();
    while frac.len() > pos.min_frac && frac.ends_with('0') {
        frac.pop();
    }

    let mut int = int_digits.trim_start_matches('0').to_string();
    while int.len() < pos.min_int {
        int.insert(0, '0');
    }
    if let Some(size) = pos.grouping {
        let digits: Vec<char> = int.chars().collect();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / size);
        for (i, c) in digits.iter().enumerate() {
            if i > 0 && (digits.len() - i) % size == 0 {
                grouped.push(',');
            }
            grouped.push(*c);
        }
        int = grouped;
    }
    if int.is_empty() && frac.is_empty() {
        int.push('0');
    }

    if frac.is_empty() {
        format!("{}{}{}", prefix, int, suffix)
    } else {
        format!("{}{}.{}{}", prefix, int, frac, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::tests::{MockNode, MockTree, create_test_tree};
    use crate::engine::{EvaluationContext, KeyIndexes, Variables};
    use std::collections::HashMap;

    // Holds everything an EvaluationContext borrows.
    struct TestSetup<'a> {
        tree: &'a MockTree,
        funcs: FunctionRegistry,
        vars: Variables<MockNode<'a>>,
        keys: KeyIndexes<MockNode<'a>>,
    }

    impl<'a> TestSetup<'a> {
        fn new(tree: &'a MockTree) -> Self {
            TestSetup {
                tree,
                funcs: FunctionRegistry::xslt().with_instructions(["xsl:if"]),
                vars: HashMap::new(),
                keys: HashMap::new(),
            }
        }

        fn with_keys(mut self, keys: KeyIndexes<MockNode<'a>>) -> Self {
            self.keys = keys;
            self
        }

        fn context<'s>(
            &'s self,
            context_node_id: usize,
            pos: usize,
            size: usize,
        ) -> EvaluationContext<'a, 's, MockNode<'a>> {
            let node = self.tree.node(context_node_id);
            EvaluationContext::new(node, &self.funcs, &self.vars, &self.keys, false)
                .with_focus(node, pos, size)
        }
    }

    fn eval_func<'a, 's>(
        name: &str,
        args: Vec<XPathValue<MockNode<'a>>>,
        e_ctx: &EvaluationContext<'a, 's, MockNode<'a>>,
    ) -> XPathValue<MockNode<'a>> {
        evaluate_function(name, args, e_ctx).unwrap()
    }

    fn s<'a>(v: &str) -> XPathValue<MockNode<'a>> {
        XPathValue::String(v.to_string())
    }

    #[test]
    fn test_registry_checks_arity() {
        let registry = FunctionRegistry::core();
        assert!(registry.check("concat", 5).is_ok());
        assert!(matches!(
            registry.check("concat", 1),
            Err(XPathError::FunctionError { .. })
        ));
        assert_eq!(
            registry.check("hello", 0),
            Err(XPathError::UnknownFunction("hello".to_string()))
        );
        // XSLT additions are not part of the core library.
        assert!(registry.check("current", 0).is_err());
        assert!(FunctionRegistry::xslt().check("current", 0).is_ok());
    }

    #[test]
    fn test_func_concat() {
        let tree = create_test_tree();
        let setup = TestSetup::new(&tree);
        let e_ctx = setup.context(0, 1, 1);
        let args = vec![s("Hello"), s(" "), s("World"), XPathValue::Number(42.0)];
        assert_eq!(eval_func("concat", args, &e_ctx).to_string(), "Hello World42");
    }

    #[test]
    fn test_func_substring_family() {
        let tree = create_test_tree();
        let setup = TestSetup::new(&tree);
        let e_ctx = setup.context(0, 1, 1);

        let args = vec![s("12345"), XPathValue::Number(2.0), XPathValue::Number(3.0)];
        assert_eq!(eval_func("substring", args, &e_ctx).to_string(), "234");
        let args = vec![s("12345"), XPathValue::Number(1.5), XPathValue::Number(2.6)];
        assert_eq!(eval_func("substring", args, &e_ctx).to_string(), "234");
        let args = vec![s("12345"), XPathValue::Number(0.0), XPathValue::Number(3.0)];
        assert_eq!(eval_func("substring", args, &e_ctx).to_string(), "12");
        let args = vec![s("1999/04/01"), s("/")];
        assert_eq!(eval_func("substring-before", args, &e_ctx).to_string(), "1999");
        let args = vec![s("1999/04/01"), s("/")];
        assert_eq!(eval_func("substring-after", args, &e_ctx).to_string(), "04/01");
    }

    #[test]
    fn test_func_string_length_uses_context_node() {
        let tree = create_test_tree();
        let setup = TestSetup::new(&tree);
        let e_ctx_para = setup.context(1, 1, 1);
        assert_eq!(eval_func("string-length", vec![], &e_ctx_para).to_number(), 5.0);
        assert_eq!(
            eval_func("string-length", vec![s("four")], &e_ctx_para).to_number(),
            4.0
        );
    }

    #[test]
    fn test_func_normalize_space_and_translate() {
        let tree = create_test_tree();
        let setup = TestSetup::new(&tree);
        let e_ctx = setup.context(0, 1, 1);
        let args = vec![s("  leading \n and   \t trailing  ")];
        assert_eq!(
            eval_func("normalize-space", args, &e_ctx).to_string(),
            "leading and trailing"
        );
        let args = vec![s("--aaa--"), s("abc-"), s("ABC")];
        assert_eq!(eval_func("translate", args, &e_ctx).to_string(), "AAA");
    }

    #[test]
    fn test_func_lang() {
        let tree = create_test_tree();
        let setup = TestSetup::new(&tree);
        let e_ctx_text = setup.context(4, 1, 1);
        let e_ctx_div = setup.context(6, 1, 1);
        assert!(eval_func("lang", vec![s("en")], &e_ctx_text).to_bool());
        assert!(!eval_func("lang", vec![s("en-GB")], &e_ctx_text).to_bool());
        assert!(!eval_func("lang", vec![s("en")], &e_ctx_div).to_bool());
    }

    #[test]
    fn test_func_sum_and_number() {
        let tree = create_test_tree();
        let setup = TestSetup::new(&tree);
        let e_ctx = setup.context(0, 1, 1);
        let args = vec![XPathValue::NodeSet(vec![tree.node(1), tree.node(2)])];
        assert!(eval_func("sum", args, &e_ctx).to_number().is_nan());
        assert_eq!(eval_func("number", vec![s(" 12 ")], &e_ctx).to_number(), 12.0);
        let err = evaluate_function("sum", vec![s("1")], &e_ctx).unwrap_err();
        assert!(matches!(err, XPathError::TypeError(_)));
    }

    #[test]
    fn test_func_round() {
        let tree = create_test_tree();
        let setup = TestSetup::new(&tree);
        let e_ctx = setup.context(0, 1, 1);
        let round = |n: f64| eval_func("round", vec![XPathValue::Number(n)], &e_ctx).to_number();
        assert_eq!(round(2.5), 3.0);
        assert_eq!(round(2.4), 2.0);
        assert_eq!(round(-2.5), -2.0);
        assert_eq!(round(-2.6), -3.0);
    }

    #[test]
    fn test_func_last_and_position() {
        let tree = create_test_tree();
        let setup = TestSetup::new(&tree);
        let e_ctx = setup.context(1, 2, 5);
        assert_eq!(eval_func("last", vec![], &e_ctx).to_number(), 5.0);
        assert_eq!(eval_func("position", vec![], &e_ctx).to_number(), 2.0);
    }

    #[test]
    fn test_name_functions() {
        let tree = create_test_tree();
        let setup = TestSetup::new(&tree);
        let e_ctx_item = setup.context(10, 1, 1);
        assert_eq!(eval_func("local-name", vec![], &e_ctx_item).to_string(), "item");
        assert_eq!(eval_func("name", vec![], &e_ctx_item).to_string(), "m:item");
        assert_eq!(eval_func("namespace-uri", vec![], &e_ctx_item).to_string(), "urn:m");
        let e_ctx_text = setup.context(4, 1, 1);
        assert_eq!(eval_func("local-name", vec![], &e_ctx_text).to_string(), "");
        let args = vec![XPathValue::NodeSet(vec![tree.node(1)])];
        assert_eq!(eval_func("local-name", args, &e_ctx_text).to_string(), "para");
    }

    #[test]
    fn test_func_id() {
        let tree = create_test_tree();
        let setup = TestSetup::new(&tree);
        let e_ctx = setup.context(9, 1, 1);
        match eval_func("id", vec![s("p1 missing")], &e_ctx) {
            XPathValue::NodeSet(nodes) => assert_eq!(nodes, vec![tree.node(1)]),
            other => panic!("Expected NodeSet, got {:?}", other),
        }
    }

    #[test]
    fn test_func_key() {
        let tree = create_test_tree();
        let para_node = tree.node(1);
        let attr_node = tree.node(2);

        let mut key_index = HashMap::new();
        key_index.insert("p1".to_string(), vec![para_node]);
        let mut keys = HashMap::new();
        keys.insert("id-key".to_string(), key_index);

        let setup = TestSetup::new(&tree).with_keys(keys);
        let e_ctx = setup.context(0, 1, 1);

        let result = eval_func("key", vec![s("id-key"), s("p1")], &e_ctx);
        assert!(matches!(result, XPathValue::NodeSet(ref n) if n == &vec![para_node]));

        let result = eval_func("key", vec![s("id-key"), s("nonexistent")], &e_ctx);
        assert!(matches!(result, XPathValue::NodeSet(ref n) if n.is_empty()));

        // A node-set argument looks up each node's string value.
        let args = vec![s("id-key"), XPathValue::NodeSet(vec![attr_node])];
        let result = eval_func("key", args, &e_ctx);
        assert!(matches!(result, XPathValue::NodeSet(ref n) if n == &vec![para_node]));

        assert!(evaluate_function("key", vec![s("nope"), s("p1")], &e_ctx).is_err());
    }

    #[test]
    fn test_current_and_generate_id() {
        let tree = create_test_tree();
        let setup = TestSetup::new(&tree);
        let outer = setup.context(1, 1, 1);
        let inner = outer.with_focus(tree.node(4), 1, 1);
        let current = eval_func("current", vec![], &inner);
        assert!(matches!(current, XPathValue::NodeSet(ref n) if n == &vec![tree.node(1)]));

        let id1 = eval_func("generate-id", vec![], &outer).to_string();
        let id2 = eval_func("generate-id", vec![XPathValue::NodeSet(vec![tree.node(1)])], &inner)
            .to_string();
        assert_eq!(id1, id2);
        assert!(id1.starts_with("id"));
    }

    #[test]
    fn test_availability_functions() {
        let tree = create_test_tree();
        let setup = TestSetup::new(&tree);
        let e_ctx = setup.context(0, 1, 1);
        assert!(eval_func("function-available", vec![s("concat")], &e_ctx).to_bool());
        assert!(!eval_func("function-available", vec![s("document")], &e_ctx).to_bool());
        assert!(eval_func("element-available", vec![s("xsl:if")], &e_ctx).to_bool());
        assert_eq!(
            eval_func("system-property", vec![s("xsl:version")], &e_ctx).to_string(),
            "1.0"
        );
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(1234.5, "#,##0.00"), "1,234.50");
        assert_eq!(format_decimal(0.25, "0%"), "25%");
        assert_eq!(format_decimal(-3.14159, "0.00"), "-3.14");
        assert_eq!(format_decimal(-2.0, "0;(0)"), "(2)");
        assert_eq!(format_decimal(7.0, "000"), "007");
        assert_eq!(format_decimal(0.5, "#.##"), ".5");
        assert_eq!(format_decimal(f64::NAN, "0"), "NaN");
    }
}
