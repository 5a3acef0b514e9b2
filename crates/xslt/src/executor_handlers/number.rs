//! `xsl:number`: counting source nodes and formatting the result.

use crate::ast::{NumberInstruction, NumberLevel};
use crate::executor::{ExecutionError, TemplateExecutor, all_nodes};
use crate::output::OutputBuilder;
use crate::pattern::Pattern;
use xmlquery_xpath1::{DataSourceNode, EvaluationContext, NodeType, XPathError, format_number};

pub(crate) fn handle_number<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    number: &NumberInstruction,
    context_node: N,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    let format =
        executor.evaluate_avt_at(&number.format, context_node, context_position, context_size)?;

    let numbers = match &number.value {
        Some(expr) => {
            let value = executor
                .evaluate(expr, context_node, context_position, context_size)?
                .to_number();
            if value.is_nan() || value.is_infinite() || value < 0.5 {
                builder.add_text(&format_number(value));
                return Ok(());
            }
            vec![(value + 0.5).floor() as u64]
        }
        None => {
            let merged_vars = executor.get_merged_variables();
            let e_ctx = executor.get_eval_context(
                context_node,
                &merged_vars,
                context_position,
                context_size,
            );
            let counter = Counter {
                count: number.count.as_ref(),
                from: number.from.as_ref(),
                target: context_node,
                e_ctx: &e_ctx,
            };
            match number.level {
                NumberLevel::Single => counter.single()?,
                NumberLevel::Multiple => counter.multiple()?,
                NumberLevel::Any => counter.any(executor.root_node)?,
            }
        }
    };

    builder.add_text(&format_numbers(&numbers, &format));
    Ok(())
}

struct Counter<'p, 'c, 'a, 'd, N: DataSourceNode<'a>> {
    count: Option<&'p Pattern>,
    from: Option<&'p Pattern>,
    target: N,
    e_ctx: &'c EvaluationContext<'a, 'd, N>,
}

impl<'a, N: DataSourceNode<'a> + 'a> Counter<'_, '_, 'a, '_, N> {
    /// Without `count`, nodes of the same type and name as the target count.
    fn counts(&self, node: N) -> Result<bool, XPathError> {
        match self.count {
            Some(pattern) => pattern.matches(node, self.e_ctx),
            None => Ok(node.node_type() == self.target.node_type()
                && match (node.name(), self.target.name()) {
                    (Some(a), Some(b)) => {
                        a.local_part == b.local_part && a.namespace == b.namespace
                    }
                    (None, None) => true,
                    _ => false,
                }),
        }
    }

    fn is_from(&self, node: N) -> Result<bool, XPathError> {
        match self.from {
            Some(pattern) => pattern.matches(node, self.e_ctx),
            None => Ok(false),
        }
    }

    /// Ancestor-or-self nodes of the target that count, nearest first,
    /// stopping at the first ancestor matched by `from`.
    fn counted_ancestors(&self, limit: Option<usize>) -> Result<Vec<N>, XPathError> {
        let mut found = Vec::new();
        let mut current = Some(self.target);
        while let Some(node) = current {
            if self.counts(node)? {
                found.push(node);
                if limit.is_some_and(|l| found.len() >= l) {
                    break;
                }
            }
            if self.is_from(node)? {
                break;
            }
            current = node.parent();
        }
        Ok(found)
    }

    fn sibling_position(&self, node: N) -> Result<u64, XPathError> {
        if node.node_type() == NodeType::Attribute {
            return Ok(1);
        }
        let Some(parent) = node.parent() else {
            return Ok(1);
        };
        let mut position = 1;
        for sibling in parent.children().take_while(|s| *s != node) {
            if self.counts(sibling)? {
                position += 1;
            }
        }
        Ok(position)
    }

    fn single(&self) -> Result<Vec<u64>, XPathError> {
        self.counted_ancestors(Some(1))?
            .into_iter()
            .map(|node| self.sibling_position(node))
            .collect()
    }

    fn multiple(&self) -> Result<Vec<u64>, XPathError> {
        let mut numbers = self
            .counted_ancestors(None)?
            .into_iter()
            .map(|node| self.sibling_position(node))
            .collect::<Result<Vec<_>, _>>()?;
        numbers.reverse();
        Ok(numbers)
    }

    /// Counting nodes up to and including the target in document order,
    /// restarting after each node matched by `from`.
    fn any(&self, root: N) -> Result<Vec<u64>, XPathError> {
        let mut total = 0;
        for node in all_nodes(root) {
            if self.is_from(node)? {
                total = 0;
            }
            if self.counts(node)? {
                total += 1;
            }
            if node == self.target {
                break;
            }
        }
        Ok(if total == 0 { Vec::new() } else { vec![total] })
    }
}

/// Formats `numbers` with an `xsl:number` format string such as `1.`,
/// `(a)`, `I` or `01-1`. Alphanumeric runs are format tokens; the text
/// around and between them is copied.
pub(crate) fn format_numbers(numbers: &[u64], format: &str) -> String {
    let mut prefix = String::new();
    let mut tokens: Vec<String> = Vec::new();
    let mut separators: Vec<String> = Vec::new();
    let mut pending = String::new();
    let mut chars = format.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_alphanumeric() {
            let mut token = String::new();
            while let Some(&c) = chars.peek().filter(|c| c.is_alphanumeric()) {
                token.push(c);
                chars.next();
            }
            if tokens.is_empty() {
                prefix = std::mem::take(&mut pending);
            } else {
                separators.push(std::mem::take(&mut pending));
            }
            tokens.push(token);
        } else {
            pending.push(c);
            chars.next();
        }
    }
    let suffix = pending;
    if tokens.is_empty() {
        tokens.push("1".to_string());
    }

    let mut out = prefix;
    for (i, &n) in numbers.iter().enumerate() {
        if i > 0 {
            let separator = separators
                .get(i - 1)
                .or(separators.last())
                .map_or(".", String::as_str);
            out.push_str(separator);
        }
        let token = tokens.get(i).or(tokens.last()).map_or("1", String::as_str);
        out.push_str(&format_one(n, token));
    }
    out.push_str(&suffix);
    out
}

fn format_one(n: u64, token: &str) -> String {
    match token {
        "a" if n > 0 => alphabetic(n, b'a'),
        "A" if n > 0 => alphabetic(n, b'A'),
        "i" if n > 0 => roman(n).to_lowercase(),
        "I" if n > 0 => roman(n),
        t if t.chars().all(|c| c.is_ascii_digit()) => {
            format!("{:0width$}", n, width = t.len())
        }
        _ => n.to_string(),
    }
}

fn alphabetic(mut n: u64, base: u8) -> String {
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push((base + (n % 26) as u8) as char);
        n /= 26;
    }
    letters.iter().rev().collect()
}

fn roman(mut n: u64) -> String {
    const NUMERALS: [(u64, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut out = String::new();
    for (value, numeral) in NUMERALS {
        while n >= value {
            out.push_str(numeral);
            n -= value;
        }
    }
    out
}
