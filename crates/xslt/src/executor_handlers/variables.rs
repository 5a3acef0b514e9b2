use crate::ast::VariableValue;
use crate::executor::{ExecutionError, TemplateExecutor, Value};
use crate::output::TreeBuilder;
use std::sync::Arc;
use xmlquery_xpath1::{DataSourceNode, XPathValue};

pub(crate) fn handle_variable<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    name: &str,
    value: &VariableValue,
    context_node: N,
    context_position: usize,
    context_size: usize,
) -> Result<(), ExecutionError> {
    let value = evaluate_variable_value(executor, value, context_node, context_position, context_size)?;
    executor.set_variable_in_current_scope(name.to_string(), value);
    Ok(())
}

/// Computes the value of a variable, parameter or `xsl:with-param`. A body
/// is instantiated into a fresh result tree fragment.
pub(crate) fn evaluate_variable_value<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    value: &VariableValue,
    context_node: N,
    context_position: usize,
    context_size: usize,
) -> Result<Value<N>, ExecutionError> {
    match value {
        VariableValue::Select(expr) => Ok(Value::XPath(executor.evaluate(
            expr,
            context_node,
            context_position,
            context_size,
        )?)),
        VariableValue::Content(body) => {
            let mut fragment = TreeBuilder::new();
            executor.execute_template(body, context_node, context_position, context_size, &mut fragment)?;
            Ok(Value::Fragment(Arc::new(fragment.finish()?)))
        }
        VariableValue::Empty => Ok(Value::XPath(XPathValue::String(String::new()))),
    }
}
