//! `xsl:copy` and `xsl:copy-of`.

use super::literals::apply_attribute_sets;
use crate::ast::PreparsedTemplate;
use crate::executor::{ExecutionError, TemplateExecutor, Value};
use crate::output::OutputBuilder;
use xmlquery_dom::{Name, Namespace};
use xmlquery_xpath1::{DataSourceNode, Expression, NodeType, QName, XPathValue};

pub(crate) fn handle_copy<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    use_attribute_sets: &[String],
    body: &PreparsedTemplate,
    context_node: N,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    match context_node.node_type() {
        NodeType::Root => {
            executor.execute_template(body, context_node, context_position, context_size, builder)?;
        }
        NodeType::Element => {
            builder.start_element(node_name(context_node), &namespaces_of(context_node));
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
        }
        _ => copy_leaf(context_node, builder),
    }
    Ok(())
}

pub(crate) fn handle_copy_of<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    select: &Expression,
    context_node: N,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    if let Expression::Variable(name) = select
        && let Some(Value::Fragment(fragment)) = executor.lookup_variable(name)
    {
        let fragment = fragment.clone();
        copy_tree(fragment.root(), builder);
        return Ok(());
    }
    match executor.evaluate(select, context_node, context_position, context_size)? {
        XPathValue::NodeSet(nodes) => {
            for node in nodes {
                copy_tree(node, builder);
            }
        }
        other => builder.add_text(&other.to_string()),
    }
    Ok(())
}

/// Writes a deep copy of `node` through `builder`. Works for source nodes
/// and result tree fragments alike.
pub(crate) fn copy_tree<'x, M: DataSourceNode<'x>>(node: M, builder: &mut dyn OutputBuilder) {
    match node.node_type() {
        NodeType::Root => {
            for child in node.children() {
                copy_tree(child, builder);
            }
        }
        NodeType::Element => {
            builder.start_element(node_name(node), &namespaces_of(node));
            for attr in node.attributes() {
                copy_leaf(attr, builder);
            }
            for child in node.children() {
                copy_tree(child, builder);
            }
            builder.end_element();
        }
        _ => copy_leaf(node, builder),
    }
}

fn copy_leaf<'x, M: DataSourceNode<'x>>(node: M, builder: &mut dyn OutputBuilder) {
    match node.node_type() {
        NodeType::Attribute => builder.set_attribute(node_name(node), &node.string_value()),
        NodeType::Text => builder.add_text(&node.string_value()),
        NodeType::Comment => builder.add_comment(&node.string_value()),
        NodeType::ProcessingInstruction => {
            let target = node.name().map(|q| q.local_part).unwrap_or_default();
            builder.add_processing_instruction(target, &node.string_value());
        }
        NodeType::Root | NodeType::Element => {}
    }
}

fn node_name<'x, M: DataSourceNode<'x>>(node: M) -> Name {
    match node.name() {
        Some(QName {
            prefix,
            namespace,
            local_part,
        }) => Name::qualified(prefix, namespace, local_part),
        None => Name::local(""),
    }
}

fn namespaces_of<'x, M: DataSourceNode<'x>>(node: M) -> Vec<Namespace> {
    node.namespaces_in_scope()
        .into_iter()
        .map(|(prefix, uri)| Namespace::new(prefix, uri))
        .collect()
}
