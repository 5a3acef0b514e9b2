use crate::ast::{CaseOrder, PreparsedTemplate, SortDataType, SortKey, SortOrder};
use crate::executor::{ExecutionError, TemplateExecutor};
use crate::output::OutputBuilder;
use std::cmp::Ordering;
use xmlquery_xpath1::{DataSourceNode, Expression, XPathValue};

#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_for_each<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    select: &Expression,
    sort_keys: &[SortKey],
    body: &PreparsedTemplate,
    context_node: N,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    let mut nodes = executor.evaluate_node_set(
        select,
        "xsl:for-each",
        context_node,
        context_position,
        context_size,
    )?;
    sort_node_set(executor, &mut nodes, sort_keys)?;

    // There is no current template rule inside xsl:for-each.
    let previous_rule = executor.current_rule.take();
    let inner_context_size = nodes.len();
    let result = nodes.into_iter().enumerate().try_for_each(|(i, node)| {
        executor.execute_template(body, node, i + 1, inner_context_size, builder)
    });
    executor.current_rule = previous_rule;
    result
}

/// Sorts `nodes` in place by `sort_keys`, each evaluated with the node as
/// context in the unsorted order. The sort is stable, so ties keep document
/// order.
pub(crate) fn sort_node_set<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &TemplateExecutor<'s, 'a, N>,
    nodes: &mut Vec<N>,
    sort_keys: &[SortKey],
) -> Result<(), ExecutionError> {
    if sort_keys.is_empty() || nodes.len() < 2 {
        return Ok(());
    }

    let size = nodes.len();
    let mut keyed = Vec::with_capacity(size);
    for (i, &node) in nodes.iter().enumerate() {
        let values = sort_keys
            .iter()
            .map(|key| executor.evaluate(&key.select, node, i + 1, size))
            .collect::<Result<Vec<XPathValue<N>>, _>>()?;
        keyed.push((node, values));
    }

    keyed.sort_by(|(_, a), (_, b)| {
        for (key, (val_a, val_b)) in sort_keys.iter().zip(a.iter().zip(b)) {
            let ordering = match key.data_type {
                SortDataType::Number => compare_numbers(val_a.to_number(), val_b.to_number()),
                SortDataType::Text => compare_text(
                    &val_a.to_string(),
                    &val_b.to_string(),
                    key.case_order.unwrap_or(CaseOrder::LowerFirst),
                ),
            };
            let ordering = match key.order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });

    *nodes = keyed.into_iter().map(|(node, _)| node).collect();
    Ok(())
}

/// NaN sorts before every number.
fn compare_numbers(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Case-insensitive comparison, with case only deciding between strings
/// that are otherwise equal.
fn compare_text(a: &str, b: &str, case_order: CaseOrder) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| {
        let rank = |c: char| match case_order {
            CaseOrder::LowerFirst => c.is_uppercase(),
            CaseOrder::UpperFirst => c.is_lowercase(),
        };
        a.chars()
            .zip(b.chars())
            .find(|(x, y)| x != y)
            .map_or(Ordering::Equal, |(x, y)| rank(x).cmp(&rank(y)))
    })
}
