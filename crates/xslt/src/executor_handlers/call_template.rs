use super::variables::evaluate_variable_value;
use crate::ast::WithParam;
use crate::executor::{ExecutionError, TemplateExecutor, Value};
use crate::output::OutputBuilder;
use xmlquery_xpath1::DataSourceNode;

pub(crate) fn handle_call_template<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    name: &str,
    params: &[WithParam],
    context_node: N,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    let stylesheet = executor.stylesheet;
    let template = stylesheet
        .named_templates
        .get(name)
        .and_then(|&index| stylesheet.templates.get(index))
        .ok_or_else(|| ExecutionError::UnknownNamedTemplate(name.to_string()))?;

    let passed = evaluate_params(executor, params, context_node, context_position, context_size)?;
    for (passed_name, _) in &passed {
        if !template.params.iter().any(|p| &p.name == passed_name) {
            log::debug!(
                "Template '{}' does not declare parameter '{}'; ignoring it",
                name,
                passed_name
            );
        }
    }

    // The current template rule carries over into a called template.
    executor.call_template_body(
        template,
        passed,
        context_node,
        context_position,
        context_size,
        builder,
    )
}

/// Evaluates `xsl:with-param` values in the caller's context.
pub(crate) fn evaluate_params<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    params: &[WithParam],
    context_node: N,
    context_position: usize,
    context_size: usize,
) -> Result<Vec<(String, Value<N>)>, ExecutionError> {
    params
        .iter()
        .map(|param| {
            let value = evaluate_variable_value(
                executor,
                &param.value,
                context_node,
                context_position,
                context_size,
            )?;
            Ok((param.name.clone(), value))
        })
        .collect()
}
