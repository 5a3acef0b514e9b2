use super::call_template::evaluate_params;
use super::for_each::sort_node_set;
use crate::ast::{SortKey, WithParam};
use crate::executor::{ExecutionError, TemplateExecutor};
use crate::output::OutputBuilder;
use xmlquery_xpath1::{DataSourceNode, Expression};

#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_apply_templates<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    select: Option<&Expression>,
    mode: Option<&str>,
    sort_keys: &[SortKey],
    params: &[WithParam],
    context_node: N,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    let mut nodes_to_process = match select {
        Some(sel) => executor.evaluate_node_set(
            sel,
            "xsl:apply-templates",
            context_node,
            context_position,
            context_size,
        )?,
        None => context_node.children().collect(),
    };
    sort_node_set(executor, &mut nodes_to_process, sort_keys)?;
    let passed = evaluate_params(executor, params, context_node, context_position, context_size)?;
    executor.apply_templates_to_nodes(&nodes_to_process, mode, passed, builder)
}

/// Applies the best rule of lower import precedence than the current rule,
/// in the current rule's mode, falling back to the built-in rules.
pub(crate) fn handle_apply_imports<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    context_node: N,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    let (precedence, mode) = executor
        .current_rule
        .clone()
        .ok_or(ExecutionError::NoCurrentRule)?;
    match executor.find_matching_template(context_node, mode.as_deref(), Some(precedence))? {
        Some(rule) => executor.instantiate_rule(
            rule,
            Vec::new(),
            context_node,
            context_position,
            context_size,
            builder,
        ),
        None => executor.apply_builtin_template(context_node, mode.as_deref(), builder),
    }
}
