//! Handlers that write result nodes: text, `value-of`, literal result
//! elements, computed elements and attributes, comments, processing
//! instructions and messages.

use crate::ast::{AttributeValueTemplate, PreparsedTemplate, XsltInstruction};
use crate::executor::{ExecutionError, TemplateExecutor};
use crate::output::{OutputBuilder, TextBuilder};
use crate::util::{is_ncname, is_qname, split_qname};
use xmlquery_dom::{Name, Namespace};
use xmlquery_xpath1::{DataSourceNode, Expression, XML_NAMESPACE};

pub(crate) fn handle_text(text: &str, builder: &mut dyn OutputBuilder) {
    builder.add_text(text);
}

pub(crate) fn handle_value_of<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    select: &Expression,
    context_node: N,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    let result = executor.evaluate(select, context_node, context_position, context_size)?;
    builder.add_text(&result.to_string());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_literal_element<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    name: &Name,
    namespaces: &[Namespace],
    attrs: &[(Name, AttributeValueTemplate)],
    use_attribute_sets: &[String],
    body: &PreparsedTemplate,
    context_node: N,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    builder.start_element(name.clone(), namespaces);
    apply_attribute_sets(
        executor,
        use_attribute_sets,
        context_node,
        context_position,
        context_size,
        builder,
        &mut Vec::new(),
    )?;
    for (attr_name, avt) in attrs {
        let value = executor.evaluate_avt_at(avt, context_node, context_position, context_size)?;
        builder.set_attribute(attr_name.clone(), &value);
    }
    executor.execute_template(body, context_node, context_position, context_size, builder)?;
    builder.end_element();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_element<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    name_avt: &AttributeValueTemplate,
    namespace_avt: Option<&AttributeValueTemplate>,
    in_scope: &[Namespace],
    use_attribute_sets: &[String],
    body: &PreparsedTemplate,
    context_node: N,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    let name = resolve_name(
        executor,
        name_avt,
        namespace_avt,
        in_scope,
        true,
        context_node,
        context_position,
        context_size,
    )?;
    builder.start_element(name, &[]);
    apply_attribute_sets(
        executor,
        use_attribute_sets,
        context_node,
        context_position,
        context_size,
        builder,
        &mut Vec::new(),
    )?;
    executor.execute_template(body, context_node, context_position, context_size, builder)?;
    builder.end_element();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_attribute<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    name_avt: &AttributeValueTemplate,
    namespace_avt: Option<&AttributeValueTemplate>,
    in_scope: &[Namespace],
    body: &PreparsedTemplate,
    context_node: N,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    let name = resolve_name(
        executor,
        name_avt,
        namespace_avt,
        in_scope,
        false,
        context_node,
        context_position,
        context_size,
    )?;
    if name.namespace.is_none() && name.local == "xmlns" {
        return Err(ExecutionError::InvalidName(name.local));
    }
    let value = body_text(executor, body, context_node, context_position, context_size)?;
    builder.set_attribute(name, &value);
    Ok(())
}

pub(crate) fn handle_comment<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    body: &PreparsedTemplate,
    context_node: N,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    let text = body_text(executor, body, context_node, context_position, context_size)?;
    builder.add_comment(&text);
    Ok(())
}

pub(crate) fn handle_processing_instruction<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    name_avt: &AttributeValueTemplate,
    body: &PreparsedTemplate,
    context_node: N,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    let target = executor.evaluate_avt_at(name_avt, context_node, context_position, context_size)?;
    if !is_ncname(&target) || target.eq_ignore_ascii_case("xml") {
        return Err(ExecutionError::InvalidName(target));
    }
    let data = body_text(executor, body, context_node, context_position, context_size)?;
    builder.add_processing_instruction(&target, data.trim_start());
    Ok(())
}

pub(crate) fn handle_message<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    body: &PreparsedTemplate,
    terminate: bool,
    context_node: N,
    context_position: usize,
    context_size: usize,
) -> Result<(), ExecutionError> {
    let text = body_text(executor, body, context_node, context_position, context_size)?;
    if terminate {
        log::error!("xsl:message: {}", text);
        return Err(ExecutionError::Terminated(text));
    }
    log::info!("xsl:message: {}", text);
    Ok(())
}

/// Writes the attributes of the named sets, including the sets they use
/// themselves. `active` holds the sets being expanded, to catch cycles.
pub(crate) fn apply_attribute_sets<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    names: &[String],
    context_node: N,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
    active: &mut Vec<String>,
) -> Result<(), ExecutionError> {
    let stylesheet = executor.stylesheet;
    for name in names {
        let set = stylesheet
            .attribute_sets
            .get(name)
            .ok_or_else(|| ExecutionError::UnknownAttributeSet(name.clone()))?;
        if active.contains(name) {
            return Err(ExecutionError::CircularAttributeSet(name.clone()));
        }
        active.push(name.clone());
        apply_attribute_sets(
            executor,
            &set.use_attribute_sets,
            context_node,
            context_position,
            context_size,
            builder,
            active,
        )?;
        for attribute in &set.attributes {
            if let XsltInstruction::Attribute {
                name,
                namespace,
                in_scope,
                body,
            } = attribute
            {
                handle_attribute(
                    executor,
                    name,
                    namespace.as_ref(),
                    in_scope,
                    body,
                    context_node,
                    context_position,
                    context_size,
                    builder,
                )?;
            }
        }
        active.pop();
    }
    Ok(())
}

/// The text a template body produces, ignoring any markup.
fn body_text<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    body: &PreparsedTemplate,
    context_node: N,
    context_position: usize,
    context_size: usize,
) -> Result<String, ExecutionError> {
    let mut text = TextBuilder::new();
    executor.execute_template(body, context_node, context_position, context_size, &mut text)?;
    Ok(text.into_string())
}

/// Evaluates the `name` and `namespace` of `xsl:element` or `xsl:attribute`.
/// Without an explicit namespace, the prefix is resolved against the
/// bindings in scope at the instruction; attributes ignore the default
/// namespace.
#[allow(clippy::too_many_arguments)]
fn resolve_name<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &TemplateExecutor<'s, 'a, N>,
    name_avt: &AttributeValueTemplate,
    namespace_avt: Option<&AttributeValueTemplate>,
    in_scope: &[Namespace],
    is_element: bool,
    context_node: N,
    context_position: usize,
    context_size: usize,
) -> Result<Name, ExecutionError> {
    let lexical = executor.evaluate_avt_at(name_avt, context_node, context_position, context_size)?;
    if !is_qname(&lexical) {
        return Err(ExecutionError::InvalidName(lexical));
    }
    let (prefix, local) = split_qname(&lexical);
    let namespace = match namespace_avt {
        Some(avt) => {
            Some(executor.evaluate_avt_at(avt, context_node, context_position, context_size)?)
        }
        None => match prefix {
            Some("xml") => Some(XML_NAMESPACE.to_string()),
            Some(p) => Some(
                in_scope
                    .iter()
                    .find(|ns| ns.prefix.as_deref() == Some(p))
                    .map(|ns| ns.uri.clone())
                    .ok_or_else(|| ExecutionError::InvalidName(lexical.clone()))?,
            ),
            None if is_element => in_scope
                .iter()
                .find(|ns| ns.prefix.is_none())
                .map(|ns| ns.uri.clone()),
            None => None,
        },
    };
    Ok(Name::qualified(prefix, namespace.as_deref(), local))
}
