use crate::ast::{PreparsedTemplate, When};
use crate::executor::{ExecutionError, TemplateExecutor};
use crate::output::OutputBuilder;
use xmlquery_xpath1::{DataSourceNode, Expression};

pub(crate) fn handle_if<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    test: &Expression,
    body: &PreparsedTemplate,
    context_node: N,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    if executor
        .evaluate(test, context_node, context_position, context_size)?
        .to_bool()
    {
        executor.execute_template(body, context_node, context_position, context_size, builder)?;
    }
    Ok(())
}

pub(crate) fn handle_choose<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    whens: &[When],
    otherwise: Option<&PreparsedTemplate>,
    context_node: N,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    for when_block in whens {
        if executor
            .evaluate(&when_block.test, context_node, context_position, context_size)?
            .to_bool()
        {
            return executor.execute_template(
                &when_block.body,
                context_node,
                context_position,
                context_size,
                builder,
            );
        }
    }
    if let Some(otherwise_body) = otherwise {
        executor.execute_template(
            otherwise_body,
            context_node,
            context_position,
            context_size,
            builder,
        )?;
    }
    Ok(())
}
