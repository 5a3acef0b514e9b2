//! Contains pure functions for collecting nodes along each XPath axis.
//!
//! Every collector returns nodes in axis order: document order for forward
//! axes, nearest-first for reverse axes. Positional predicates rely on this.

use crate::ast::Axis;
use crate::datasource::{DataSourceNode, NodeType};

/// Collects the nodes reachable from `node` along `axis`.
pub fn collect<'a, N: DataSourceNode<'a>>(axis: Axis, node: N) -> Vec<N> {
    let mut results = Vec::new();
    match axis {
        Axis::Child => collect_child_nodes(node, &mut results),
        Axis::Attribute => collect_attribute_nodes(node, &mut results),
        Axis::Descendant => collect_descendant_nodes(node, &mut results),
        Axis::DescendantOrSelf => collect_descendant_or_self_nodes(node, &mut results),
        Axis::Parent => collect_parent_nodes(node, &mut results),
        Axis::Ancestor => collect_ancestor_nodes(node, &mut results),
        Axis::AncestorOrSelf => {
            results.push(node);
            collect_ancestor_nodes(node, &mut results);
        }
        Axis::SelfAxis => results.push(node),
        Axis::FollowingSibling => collect_following_sibling_nodes(node, &mut results),
        Axis::PrecedingSibling => collect_preceding_sibling_nodes(node, &mut results),
        Axis::Following => collect_following_nodes(node, &mut results),
        Axis::Preceding => collect_preceding_nodes(node, &mut results),
        // Namespace nodes are not part of the tree model.
        Axis::Namespace => {}
    }
    results
}

fn collect_child_nodes<'a, N: DataSourceNode<'a>>(node: N, results: &mut Vec<N>) {
    results.extend(node.children());
}

fn collect_attribute_nodes<'a, N: DataSourceNode<'a>>(node: N, results: &mut Vec<N>) {
    results.extend(node.attributes());
}

fn collect_descendant_nodes<'a, N: DataSourceNode<'a>>(node: N, results: &mut Vec<N>) {
    for child in node.children() {
        results.push(child);
        collect_descendant_nodes(child, results);
    }
}

fn collect_descendant_or_self_nodes<'a, N: DataSourceNode<'a>>(node: N, results: &mut Vec<N>) {
    results.push(node);
    collect_descendant_nodes(node, results);
}

fn collect_parent_nodes<'a, N: DataSourceNode<'a>>(node: N, results: &mut Vec<N>) {
    if let Some(parent) = node.parent() {
        results.push(parent);
    }
}

fn collect_ancestor_nodes<'a, N: DataSourceNode<'a>>(node: N, results: &mut Vec<N>) {
    let mut current = node.parent();
    while let Some(p) = current {
        results.push(p);
        current = p.parent();
    }
}

fn collect_following_sibling_nodes<'a, N: DataSourceNode<'a>>(node: N, results: &mut Vec<N>) {
    if node.node_type() == NodeType::Attribute {
        return;
    }
    if let Some(parent) = node.parent() {
        results.extend(parent.children().skip_while(|s| *s != node).skip(1));
    }
}

fn collect_preceding_sibling_nodes<'a, N: DataSourceNode<'a>>(node: N, results: &mut Vec<N>) {
    if node.node_type() == NodeType::Attribute {
        return;
    }
    if let Some(parent) = node.parent() {
        let mut siblings: Vec<N> = parent.children().take_while(|s| *s != node).collect();
        siblings.reverse();
        results.extend(siblings);
    }
}

fn collect_following_nodes<'a, N: DataSourceNode<'a>>(node: N, results: &mut Vec<N>) {
    let mut current = node;
    if node.node_type() == NodeType::Attribute {
        // Everything inside the owning element follows its attributes.
        if let Some(owner) = node.parent() {
            collect_descendant_nodes(owner, results);
            current = owner;
        }
    }
    let mut chain = Some(current);
    while let Some(c) = chain {
        let mut siblings = Vec::new();
        collect_following_sibling_nodes(c, &mut siblings);
        for sibling in siblings {
            collect_descendant_or_self_nodes(sibling, results);
        }
        chain = c.parent();
    }
    results.sort();
}

fn collect_preceding_nodes<'a, N: DataSourceNode<'a>>(node: N, results: &mut Vec<N>) {
    let start = if node.node_type() == NodeType::Attribute {
        node.parent().unwrap_or(node)
    } else {
        node
    };
    let mut chain = Some(start);
    while let Some(c) = chain {
        let mut siblings = Vec::new();
        collect_preceding_sibling_nodes(c, &mut siblings);
        for sibling in siblings {
            collect_descendant_or_self_nodes(sibling, results);
        }
        chain = c.parent();
    }
    results.sort();
    results.reverse();
}
