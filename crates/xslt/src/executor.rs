//! Runs a [`CompiledStylesheet`] against any tree implementing
//! [`DataSourceNode`], writing the result through an [`OutputBuilder`].
//!
//! Variables live in frames: each template instantiation opens a frame, and
//! each instruction body opens a scope inside it, so a called template never
//! sees its caller's locals.

use crate::ast::{
    AttributeValueTemplate, AvtPart, CompiledStylesheet, NamedTemplate, PreparsedTemplate,
    TemplateRule, XsltInstruction,
};
use crate::compiler::xslt_functions;
use crate::executor_handlers::{
    apply_templates, call_template, control_flow, copy, for_each, literals, number, variables,
};
use crate::output::OutputBuilder;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;
use xmlquery_dom::{Document, DomError};
use xmlquery_xpath1::engine::{KeyIndexes, Variables};
use xmlquery_xpath1::{
    DataSourceNode, EvaluationContext, Expression, FunctionRegistry, NodeType, XPathError,
    XPathValue,
};

/// Template instantiations nested deeper than this abort the transformation.
pub const MAX_TEMPLATE_DEPTH: usize = 512;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("XPath evaluation failed: {0}")]
    XPath(#[from] XPathError),

    #[error("Call to unknown named template: '{0}'")]
    UnknownNamedTemplate(String),

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Invalid name '{0}' for a result node")]
    InvalidName(String),

    #[error("Unknown attribute set: '{0}'")]
    UnknownAttributeSet(String),

    #[error("Attribute set '{0}' uses itself")]
    CircularAttributeSet(String),

    #[error("Global variable '{0}' depends on itself")]
    CircularVariable(String),

    #[error("Templates nested deeper than {0} levels")]
    RecursionLimit(usize),

    #[error("Transformation terminated by xsl:message: {0}")]
    Terminated(String),

    #[error("xsl:apply-imports used without a current template rule")]
    NoCurrentRule,

    #[error("Result tree error: {0}")]
    Dom(#[from] DomError),
}

/// Options for one run of a stylesheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionConfig {
    /// Unbound variables met at run time are errors instead of empty
    /// strings. Undeclared names are already rejected when compiling, so
    /// this only covers names bound outside the stylesheet.
    pub strict: bool,
}

/// A variable's value. Result tree fragments keep their tree so `xsl:copy-of`
/// can copy it; everywhere else they act as their string value.
#[derive(Debug, Clone)]
pub enum Value<N> {
    XPath(XPathValue<N>),
    Fragment(Arc<Document>),
}

impl<'a, N: DataSourceNode<'a>> Value<N> {
    pub fn to_xpath(&self) -> XPathValue<N> {
        match self {
            Value::XPath(value) => value.clone(),
            Value::Fragment(doc) => XPathValue::String(doc.root().text_content()),
        }
    }
}

type Scope<N> = HashMap<String, Value<N>>;

pub struct TemplateExecutor<'s, 'a, N: DataSourceNode<'a>> {
    pub(crate) stylesheet: &'s CompiledStylesheet,
    pub(crate) root_node: N,
    functions: FunctionRegistry,
    globals: Scope<N>,
    global_values: Variables<N>,
    /// One frame per template instantiation, each a stack of scopes.
    frames: Vec<Vec<Scope<N>>>,
    pub(crate) key_indexes: KeyIndexes<N>,
    strict: bool,
    depth: usize,
    /// Import precedence and mode of the rule being instantiated.
    pub(crate) current_rule: Option<(usize, Option<String>)>,
    _marker: PhantomData<&'a ()>,
}

impl<'s, 'a, N: DataSourceNode<'a> + 'a> TemplateExecutor<'s, 'a, N> {
    pub fn new(stylesheet: &'s CompiledStylesheet, root_node: N, config: ExecutionConfig) -> Self {
        Self {
            stylesheet,
            root_node,
            functions: xslt_functions(),
            globals: HashMap::new(),
            global_values: HashMap::new(),
            frames: vec![vec![HashMap::new()]],
            key_indexes: HashMap::new(),
            strict: config.strict,
            depth: 0,
            current_rule: None,
            _marker: PhantomData,
        }
    }

    /// Builds key indexes and evaluates global variables. `params` override
    /// top-level `xsl:param` defaults; names without a declaration are ignored.
    pub fn initialize(&mut self, params: Variables<N>) -> Result<(), ExecutionError> {
        self.build_key_indexes()?;
        for name in params.keys() {
            if !self
                .stylesheet
                .globals
                .iter()
                .any(|g| g.is_param && &g.name == name)
            {
                log::debug!("Parameter '{}' is not declared by the stylesheet", name);
            }
        }
        let mut in_progress = Vec::new();
        for global in &self.stylesheet.globals {
            self.ensure_global(&global.name, &params, &mut in_progress)?;
        }
        Ok(())
    }

    pub fn execute(&mut self, builder: &mut dyn OutputBuilder) -> Result<(), ExecutionError> {
        let root = self.root_node;
        self.apply_templates_to_nodes(&[root], None, Vec::new(), builder)
    }

    fn build_key_indexes(&mut self) -> Result<(), ExecutionError> {
        if self.stylesheet.keys.is_empty() {
            return Ok(());
        }
        let nodes = all_nodes(self.root_node);
        let mut indexes: KeyIndexes<N> = HashMap::new();
        for key in &self.stylesheet.keys {
            let index = indexes.entry(key.name.clone()).or_default();
            for &node in &nodes {
                let e_ctx = self.get_eval_context(node, &self.global_values, 1, 1);
                if !key.pattern.matches(node, &e_ctx)? {
                    continue;
                }
                match xmlquery_xpath1::evaluate(&key.use_expr, &e_ctx)? {
                    XPathValue::NodeSet(values) => {
                        for value in values {
                            index.entry(value.string_value()).or_default().push(node);
                        }
                    }
                    other => index.entry(other.to_string()).or_default().push(node),
                }
            }
        }
        log::debug!("Built {} key index(es)", indexes.len());
        self.key_indexes = indexes;
        Ok(())
    }

    /// Evaluates a global on first need. References to other globals are
    /// discovered by evaluating strictly and retrying after the missing one
    /// has been computed.
    fn ensure_global(
        &mut self,
        name: &str,
        params: &Variables<N>,
        in_progress: &mut Vec<String>,
    ) -> Result<(), ExecutionError> {
        if self.globals.contains_key(name) {
            return Ok(());
        }
        let stylesheet = self.stylesheet;
        let Some(global) = stylesheet.globals.iter().find(|g| g.name == name) else {
            return Ok(());
        };
        if in_progress.iter().any(|n| n == name) {
            return Err(ExecutionError::CircularVariable(name.to_string()));
        }
        in_progress.push(name.to_string());

        let value = match params.get(name) {
            Some(supplied) if global.is_param => Value::XPath(supplied.clone()),
            _ => {
                let configured = self.strict;
                self.strict = true;
                let result = loop {
                    let root = self.root_node;
                    match variables::evaluate_variable_value(self, &global.value, root, 1, 1) {
                        Err(ExecutionError::XPath(XPathError::UnknownVariable(missing)))
                            if !self.globals.contains_key(&missing)
                                && stylesheet.globals.iter().any(|g| g.name == missing) =>
                        {
                            if let Err(e) = self.ensure_global(&missing, params, in_progress) {
                                break Err(e);
                            }
                        }
                        Err(ExecutionError::XPath(XPathError::UnknownVariable(_))) if !configured => {
                            self.strict = false;
                            break variables::evaluate_variable_value(self, &global.value, root, 1, 1);
                        }
                        other => break other,
                    }
                };
                self.strict = configured;
                result?
            }
        };
        in_progress.pop();
        self.global_values.insert(name.to_string(), value.to_xpath());
        self.globals.insert(name.to_string(), value);
        Ok(())
    }

    // --- Variables ---

    pub(crate) fn push_scope(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push(HashMap::new());
        }
    }

    pub(crate) fn pop_scope(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.pop();
        }
    }

    pub(crate) fn set_variable_in_current_scope(&mut self, name: String, value: Value<N>) {
        if let Some(scope) = self.frames.last_mut().and_then(|f| f.last_mut()) {
            scope.insert(name, value);
        }
    }

    /// Looks a variable up in the current frame, then among the globals.
    pub(crate) fn lookup_variable(&self, name: &str) -> Option<&Value<N>> {
        self.frames
            .last()
            .and_then(|frame| frame.iter().rev().find_map(|scope| scope.get(name)))
            .or_else(|| self.globals.get(name))
    }

    /// Globals overlaid with the locals of the current frame.
    pub(crate) fn get_merged_variables(&self) -> Variables<N> {
        let mut merged = self.global_values.clone();
        if let Some(frame) = self.frames.last() {
            for scope in frame {
                for (name, value) in scope {
                    merged.insert(name.clone(), value.to_xpath());
                }
            }
        }
        merged
    }

    pub(crate) fn get_eval_context<'d>(
        &'d self,
        context_node: N,
        variables: &'d Variables<N>,
        context_position: usize,
        context_size: usize,
    ) -> EvaluationContext<'a, 'd, N> {
        EvaluationContext::new(
            context_node,
            &self.functions,
            variables,
            &self.key_indexes,
            self.strict,
        )
        .with_focus(context_node, context_position, context_size)
    }

    pub(crate) fn evaluate(
        &self,
        expr: &Expression,
        context_node: N,
        context_position: usize,
        context_size: usize,
    ) -> Result<XPathValue<N>, ExecutionError> {
        let merged_vars = self.get_merged_variables();
        let e_ctx = self.get_eval_context(context_node, &merged_vars, context_position, context_size);
        Ok(xmlquery_xpath1::evaluate(expr, &e_ctx)?)
    }

    pub(crate) fn evaluate_node_set(
        &self,
        expr: &Expression,
        instruction: &str,
        context_node: N,
        context_position: usize,
        context_size: usize,
    ) -> Result<Vec<N>, ExecutionError> {
        match self.evaluate(expr, context_node, context_position, context_size)? {
            XPathValue::NodeSet(nodes) => Ok(nodes),
            other => Err(ExecutionError::TypeError(format!(
                "{} must select a node-set, got a {}",
                instruction,
                other.type_name()
            ))),
        }
    }

    pub(crate) fn evaluate_avt(
        &self,
        avt: &AttributeValueTemplate,
        e_ctx: &EvaluationContext<'a, '_, N>,
    ) -> Result<String, ExecutionError> {
        let mut result = String::new();
        for part in &avt.0 {
            match part {
                AvtPart::Static(s) => result.push_str(s),
                AvtPart::Dynamic(expr) => {
                    result.push_str(&xmlquery_xpath1::evaluate(expr, e_ctx)?.to_string())
                }
            }
        }
        Ok(result)
    }

    pub(crate) fn evaluate_avt_at(
        &self,
        avt: &AttributeValueTemplate,
        context_node: N,
        context_position: usize,
        context_size: usize,
    ) -> Result<String, ExecutionError> {
        if let Some(value) = avt.as_static() {
            return Ok(value);
        }
        let merged_vars = self.get_merged_variables();
        let e_ctx = self.get_eval_context(context_node, &merged_vars, context_position, context_size);
        self.evaluate_avt(avt, &e_ctx)
    }

    // --- Templates ---

    pub(crate) fn execute_template(
        &mut self,
        body: &PreparsedTemplate,
        context_node: N,
        context_position: usize,
        context_size: usize,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), ExecutionError> {
        self.push_scope();
        let result = body.0.iter().try_for_each(|instruction| {
            self.execute_instruction(instruction, context_node, context_position, context_size, builder)
        });
        self.pop_scope();
        result
    }

    fn execute_instruction(
        &mut self,
        instruction: &XsltInstruction,
        context_node: N,
        context_position: usize,
        context_size: usize,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), ExecutionError> {
        let (pos, size) = (context_position, context_size);
        match instruction {
            XsltInstruction::Text(text) => {
                literals::handle_text(text, builder);
                Ok(())
            }
            XsltInstruction::ValueOf { select } => {
                literals::handle_value_of(self, select, context_node, pos, size, builder)
            }
            XsltInstruction::LiteralElement {
                name,
                namespaces,
                attrs,
                use_attribute_sets,
                body,
            } => literals::handle_literal_element(
                self,
                name,
                namespaces,
                attrs,
                use_attribute_sets,
                body,
                context_node,
                pos,
                size,
                builder,
            ),
            XsltInstruction::Element {
                name,
                namespace,
                in_scope,
                use_attribute_sets,
                body,
            } => literals::handle_element(
                self,
                name,
                namespace.as_ref(),
                in_scope,
                use_attribute_sets,
                body,
                context_node,
                pos,
                size,
                builder,
            ),
            XsltInstruction::Attribute {
                name,
                namespace,
                in_scope,
                body,
            } => literals::handle_attribute(
                self,
                name,
                namespace.as_ref(),
                in_scope,
                body,
                context_node,
                pos,
                size,
                builder,
            ),
            XsltInstruction::Comment { body } => {
                literals::handle_comment(self, body, context_node, pos, size, builder)
            }
            XsltInstruction::ProcessingInstruction { name, body } => {
                literals::handle_processing_instruction(self, name, body, context_node, pos, size, builder)
            }
            XsltInstruction::Message { body, terminate } => {
                literals::handle_message(self, body, *terminate, context_node, pos, size)
            }
            XsltInstruction::Copy {
                use_attribute_sets,
                body,
            } => copy::handle_copy(self, use_attribute_sets, body, context_node, pos, size, builder),
            XsltInstruction::CopyOf { select } => {
                copy::handle_copy_of(self, select, context_node, pos, size, builder)
            }
            XsltInstruction::If { test, body } => {
                control_flow::handle_if(self, test, body, context_node, pos, size, builder)
            }
            XsltInstruction::Choose { whens, otherwise } => control_flow::handle_choose(
                self,
                whens,
                otherwise.as_ref(),
                context_node,
                pos,
                size,
                builder,
            ),
            XsltInstruction::ForEach {
                select,
                sort_keys,
                body,
            } => for_each::handle_for_each(self, select, sort_keys, body, context_node, pos, size, builder),
            XsltInstruction::ApplyTemplates {
                select,
                mode,
                sort_keys,
                params,
            } => apply_templates::handle_apply_templates(
                self,
                select.as_ref(),
                mode.as_deref(),
                sort_keys,
                params,
                context_node,
                pos,
                size,
                builder,
            ),
            XsltInstruction::ApplyImports => {
                apply_templates::handle_apply_imports(self, context_node, pos, size, builder)
            }
            XsltInstruction::CallTemplate { name, params } => {
                call_template::handle_call_template(self, name, params, context_node, pos, size, builder)
            }
            XsltInstruction::Variable { name, value } => {
                variables::handle_variable(self, name, value, context_node, pos, size)
            }
            XsltInstruction::Number(number) => {
                number::handle_number(self, number, context_node, pos, size, builder)
            }
        }
    }

    /// Instantiates a template body in a fresh frame. `params` were evaluated
    /// by the caller; declared parameters without a supplied value take
    /// their default.
    pub(crate) fn call_template_body(
        &mut self,
        template: &'s NamedTemplate,
        params: Vec<(String, Value<N>)>,
        context_node: N,
        context_position: usize,
        context_size: usize,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), ExecutionError> {
        if self.depth >= MAX_TEMPLATE_DEPTH {
            return Err(ExecutionError::RecursionLimit(MAX_TEMPLATE_DEPTH));
        }
        self.depth += 1;
        self.frames.push(vec![HashMap::new()]);

        let mut supplied = params;
        let result = (|| {
            for param in &template.params {
                let value = match supplied.iter().position(|(name, _)| *name == param.name) {
                    Some(i) => supplied.swap_remove(i).1,
                    None => variables::evaluate_variable_value(
                        self,
                        &param.value,
                        context_node,
                        context_position,
                        context_size,
                    )?,
                };
                self.set_variable_in_current_scope(param.name.clone(), value);
            }
            self.execute_template(&template.body, context_node, context_position, context_size, builder)
        })();

        self.frames.pop();
        self.depth -= 1;
        result
    }

    /// Picks the best rule for `node` in `mode`: highest import precedence,
    /// then highest priority, then the last declared. `below` restricts the
    /// search to rules of lower precedence, for `xsl:apply-imports`.
    pub(crate) fn find_matching_template(
        &self,
        node: N,
        mode: Option<&str>,
        below: Option<usize>,
    ) -> Result<Option<&'s TemplateRule>, ExecutionError> {
        let stylesheet = self.stylesheet;
        let Some(rules) = stylesheet.template_rules.get(&mode.map(str::to_string)) else {
            return Ok(None);
        };
        let e_ctx = self.get_eval_context(node, &self.global_values, 1, 1);
        let mut best: Option<&'s TemplateRule> = None;
        let mut conflict = false;
        for rule in rules {
            if below.is_some_and(|limit| rule.import_precedence >= limit) {
                continue;
            }
            if !rule.pattern.matches(node, &e_ctx)? {
                continue;
            }
            best = match best {
                None => Some(rule),
                Some(current) => {
                    let ordering = (rule.import_precedence, rule.priority)
                        .partial_cmp(&(current.import_precedence, current.priority));
                    match ordering {
                        Some(std::cmp::Ordering::Less) => Some(current),
                        Some(std::cmp::Ordering::Equal) => {
                            conflict = true;
                            if rule.position > current.position { Some(rule) } else { Some(current) }
                        }
                        _ => Some(rule),
                    }
                }
            };
        }
        if conflict {
            log::warn!(
                "Several template rules match {:?} with equal priority; using the last declared",
                node
            );
        }
        Ok(best)
    }

    pub(crate) fn apply_templates_to_nodes(
        &mut self,
        nodes: &[N],
        mode: Option<&str>,
        params: Vec<(String, Value<N>)>,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), ExecutionError> {
        let context_size = nodes.len();
        for (i, &node) in nodes.iter().enumerate() {
            let context_position = i + 1;
            match self.find_matching_template(node, mode, None)? {
                Some(rule) => self.instantiate_rule(
                    rule,
                    params.clone(),
                    node,
                    context_position,
                    context_size,
                    builder,
                )?,
                None => self.apply_builtin_template(node, mode, builder)?,
            }
        }
        Ok(())
    }

    pub(crate) fn instantiate_rule(
        &mut self,
        rule: &'s TemplateRule,
        params: Vec<(String, Value<N>)>,
        context_node: N,
        context_position: usize,
        context_size: usize,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), ExecutionError> {
        let stylesheet = self.stylesheet;
        let template = &stylesheet.templates[rule.template];
        let previous = self
            .current_rule
            .replace((rule.import_precedence, rule.mode.clone()));
        let result = self.call_template_body(
            template,
            params,
            context_node,
            context_position,
            context_size,
            builder,
        );
        self.current_rule = previous;
        result
    }

    /// The rules used when no template matches: recurse into children of
    /// the root and elements, copy text and attribute values, drop the rest.
    pub(crate) fn apply_builtin_template(
        &mut self,
        node: N,
        mode: Option<&str>,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), ExecutionError> {
        match node.node_type() {
            NodeType::Root | NodeType::Element => {
                let children: Vec<N> = node.children().collect();
                self.apply_templates_to_nodes(&children, mode, Vec::new(), builder)
            }
            NodeType::Text | NodeType::Attribute => {
                builder.add_text(&node.string_value());
                Ok(())
            }
            NodeType::Comment | NodeType::ProcessingInstruction => Ok(()),
        }
    }
}

/// Every node of the tree in document order, attributes included.
pub(crate) fn all_nodes<'a, N: DataSourceNode<'a>>(root: N) -> Vec<N> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        out.push(node);
        out.extend(node.attributes());
        let children: Vec<N> = node.children().collect();
        stack.extend(children.into_iter().rev());
    }
    out
}

#[cfg(test)]
mod tests {
    use crate::processor::{ParamValue, XsltProcessor};
    use std::sync::Arc;
    use xmlquery_dom::{Node, parse};
    use xmlquery_traits::{EmptyResolver, InMemoryResolver};

    use super::{ExecutionConfig, ExecutionError};
    use crate::error::XsltError;

    fn stylesheet(body: &str) -> String {
        format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">{}</xsl:stylesheet>"#,
            body
        )
    }

    fn run_with(
        xsl: &str,
        xml: &str,
        params: &[(String, ParamValue)],
    ) -> Result<String, XsltError> {
        let _ = env_logger::builder().is_test(true).try_init();
        let processor = XsltProcessor::compile(xsl, None, &EmptyResolver)?;
        let source = Node::from_document(Arc::new(parse(xml)?));
        let result = processor.transform(&source, params, ExecutionConfig::default())?;
        Ok(result.to_text()?)
    }

    fn run(body: &str, xml: &str) -> String {
        let xsl = stylesheet(&format!(
            r#"<xsl:output method="text"/>{}"#,
            body
        ));
        run_with(&xsl, xml, &[]).unwrap()
    }

    #[test]
    fn test_builtin_rules_copy_text() {
        assert_eq!(run("", "<a>one<b>two</b><!-- c --></a>"), "onetwo");
    }

    #[test]
    fn test_priority_and_position_pick_rule() {
        let body = r#"
            <xsl:template match="item">generic;</xsl:template>
            <xsl:template match="item[@special]">special;</xsl:template>
            <xsl:template match="*">star;</xsl:template>"#;
        assert_eq!(
            run(body, r#"<items><item/><item special="y"/><other/></items>"#),
            "star;"
        );
        let body = format!(
            r#"<xsl:template match="/"><xsl:apply-templates select="items/*"/></xsl:template>{}"#,
            body
        );
        assert_eq!(
            run(&body, r#"<items><item/><item special="y"/><other/></items>"#),
            "generic;special;star;"
        );
    }

    #[test]
    fn test_modes_are_separate() {
        let body = r#"
            <xsl:template match="/">
                <xsl:apply-templates select="r/x"/>
                <xsl:apply-templates select="r/x" mode="loud"/>
            </xsl:template>
            <xsl:template match="x">quiet </xsl:template>
            <xsl:template match="x" mode="loud">LOUD</xsl:template>"#;
        assert_eq!(run(body, "<r><x/></r>"), "quiet LOUD");
    }

    #[test]
    fn test_variables_and_params() {
        let body = r#"
            <xsl:variable name="greeting" select="'Hello'"/>
            <xsl:template match="/">
                <xsl:call-template name="greet">
                    <xsl:with-param name="who" select="/person/@name"/>
                </xsl:call-template>
                <xsl:call-template name="greet"/>
            </xsl:template>
            <xsl:template name="greet">
                <xsl:param name="who" select="'nobody'"/>
                <xsl:value-of select="concat($greeting, ', ', $who, '. ')"/>
            </xsl:template>"#;
        assert_eq!(
            run(body, r#"<person name="Ada"/>"#),
            "Hello, Ada. Hello, nobody. "
        );
    }

    #[test]
    fn test_called_template_cannot_see_caller_locals() {
        let body = r#"
            <xsl:template match="/">
                <xsl:variable name="local" select="'x'"/>
                <xsl:call-template name="peek"/>
            </xsl:template>
            <xsl:template name="peek">[<xsl:value-of select="$local"/>]</xsl:template>"#;
        let xsl = stylesheet(body);
        let err = XsltProcessor::compile(&xsl, None, &EmptyResolver).unwrap_err();
        assert!(matches!(err, XsltError::Compilation(ref m) if m.contains("'$local'")));
    }

    #[test]
    fn test_globals_may_reference_later_globals() {
        let body = r#"
            <xsl:variable name="total" select="$base * 2"/>
            <xsl:variable name="base" select="count(//n)"/>
            <xsl:template match="/"><xsl:value-of select="$total"/></xsl:template>"#;
        assert_eq!(run(body, "<r><n/><n/><n/></r>"), "6");
    }

    #[test]
    fn test_circular_globals_fail() {
        let xsl = stylesheet(
            r#"<xsl:variable name="a" select="$b"/>
               <xsl:variable name="b" select="$a"/>
               <xsl:template match="/"/>"#,
        );
        let err = run_with(&xsl, "<r/>", &[]).unwrap_err();
        assert!(matches!(
            err,
            XsltError::Execution(ExecutionError::CircularVariable(_))
        ));
    }

    #[test]
    fn test_supplied_param_overrides_default() {
        let xsl = stylesheet(
            r#"<xsl:output method="text"/>
               <xsl:param name="faa" select="0"/>
               <xsl:template match="/">+<xsl:value-of select="$faa"/>+</xsl:template>"#,
        );
        let params = [("faa".to_string(), ParamValue::Number(1.0))];
        assert_eq!(run_with(&xsl, "<r/>", &params).unwrap(), "+1+");
        assert_eq!(run_with(&xsl, "<r/>", &[]).unwrap(), "+0+");
    }

    #[test]
    fn test_for_each_with_sort() {
        let body = r#"
            <xsl:template match="/">
                <xsl:for-each select="//p">
                    <xsl:sort select="@age" data-type="number" order="descending"/>
                    <xsl:value-of select="@name"/>
                    <xsl:if test="position() != last()">,</xsl:if>
                </xsl:for-each>
            </xsl:template>"#;
        let xml = r#"<r><p name="a" age="3"/><p name="b" age="10"/><p name="c" age="7"/></r>"#;
        assert_eq!(run(body, xml), "b,c,a");
    }

    #[test]
    fn test_choose() {
        let body = r#"
            <xsl:template match="n">
                <xsl:choose>
                    <xsl:when test=". &lt; 0">neg </xsl:when>
                    <xsl:when test=". = 0">zero </xsl:when>
                    <xsl:otherwise>pos </xsl:otherwise>
                </xsl:choose>
            </xsl:template>"#;
        assert_eq!(run(body, "<r><n>-1</n><n>0</n><n>4</n></r>"), "neg zero pos ");
    }

    #[test]
    fn test_keys() {
        let body = r#"
            <xsl:key name="by-dept" match="emp" use="@dept"/>
            <xsl:template match="/">
                <xsl:value-of select="count(key('by-dept', 'dev'))"/>
                <xsl:text>:</xsl:text>
                <xsl:value-of select="key('by-dept', 'ops')/@name"/>
            </xsl:template>"#;
        let xml = r#"<r><emp dept="dev" name="a"/><emp dept="ops" name="b"/><emp dept="dev" name="c"/></r>"#;
        assert_eq!(run(body, xml), "2:b");
    }

    #[test]
    fn test_literal_elements_and_attribute_value_templates() {
        let xsl = stylesheet(
            r#"<xsl:output omit-xml-declaration="yes"/>
               <xsl:template match="/">
                   <list count="{count(//i)}">
                       <xsl:for-each select="//i">
                           <xsl:element name="entry">
                               <xsl:attribute name="n"><xsl:value-of select="position()"/></xsl:attribute>
                               <xsl:value-of select="."/>
                           </xsl:element>
                       </xsl:for-each>
                   </list>
               </xsl:template>"#,
        );
        let out = run_with(&xsl, "<r><i>x</i><i>y</i></r>", &[]).unwrap();
        assert_eq!(
            out,
            r#"<list count="2"><entry n="1">x</entry><entry n="2">y</entry></list>"#
        );
    }

    #[test]
    fn test_copy_of_fragment_and_identity_copy() {
        let xsl = stylesheet(
            r#"<xsl:output omit-xml-declaration="yes"/>
               <xsl:variable name="frag"><b>bold</b></xsl:variable>
               <xsl:template match="@*|node()">
                   <xsl:copy><xsl:apply-templates select="@*|node()"/></xsl:copy>
               </xsl:template>
               <xsl:template match="slot"><xsl:copy-of select="$frag"/></xsl:template>"#,
        );
        let out = run_with(&xsl, r#"<doc a="1"><slot/><p>t</p></doc>"#, &[]).unwrap();
        assert_eq!(out, r#"<doc a="1"><b>bold</b><p>t</p></doc>"#);
    }

    #[test]
    fn test_fragment_acts_as_string() {
        let body = r#"
            <xsl:variable name="v"><x>ab</x>c</xsl:variable>
            <xsl:template match="/"><xsl:value-of select="string-length($v)"/></xsl:template>"#;
        assert_eq!(run(body, "<r/>"), "3");
    }

    #[test]
    fn test_number_levels() {
        let body = r#"
            <xsl:template match="sec"><xsl:number level="multiple" format="1.1 "/><xsl:apply-templates/></xsl:template>
            <xsl:template match="item"><xsl:number format="(a)"/><xsl:number level="any" format="I "/></xsl:template>"#;
        let xml = "<doc><sec><sec/><sec><item/><item/></sec></sec></doc>";
        assert_eq!(run(body, xml), "1 1.1 1.2 (a)I (b)II ");
    }

    #[test]
    fn test_apply_imports_uses_lower_precedence_rule() {
        let base = stylesheet(
            r#"<xsl:template match="x">base</xsl:template>"#,
        );
        let main = stylesheet(
            r#"<xsl:import href="base.xsl"/>
               <xsl:output method="text"/>
               <xsl:template match="x">[<xsl:apply-imports/>]</xsl:template>"#,
        );
        let resolver = InMemoryResolver::new().with("base.xsl", base);
        let processor = XsltProcessor::compile(&main, Some("main.xsl"), &resolver).unwrap();
        let source = Node::from_document(Arc::new(parse("<x/>").unwrap()));
        let out = processor
            .transform(&source, &[], ExecutionConfig::default())
            .unwrap()
            .to_text()
            .unwrap();
        assert_eq!(out, "[base]");
    }

    #[test]
    fn test_message_terminate() {
        let xsl = stylesheet(
            r#"<xsl:template match="/"><xsl:message terminate="yes">stop here</xsl:message></xsl:template>"#,
        );
        let err = run_with(&xsl, "<r/>", &[]).unwrap_err();
        assert!(matches!(
            err,
            XsltError::Execution(ExecutionError::Terminated(ref text)) if text == "stop here"
        ));
    }

    #[test]
    fn test_infinite_recursion_is_bounded() {
        let xsl = stylesheet(
            r#"<xsl:template match="/"><xsl:call-template name="loop"/></xsl:template>
               <xsl:template name="loop"><xsl:call-template name="loop"/></xsl:template>"#,
        );
        // Debug builds need more than the default test stack to reach the limit.
        let err = std::thread::Builder::new()
            .stack_size(256 * 1024 * 1024)
            .spawn(move || run_with(&xsl, "<r/>", &[]).unwrap_err())
            .unwrap()
            .join()
            .unwrap();
        assert!(matches!(
            err,
            XsltError::Execution(ExecutionError::RecursionLimit(_))
        ));
    }

    #[test]
    fn test_apply_templates_on_non_node_set_is_an_error() {
        let xsl = stylesheet(r#"<xsl:template match="/"><xsl:apply-templates select="1"/></xsl:template>"#);
        let err = run_with(&xsl, "<r/>", &[]).unwrap_err();
        assert!(matches!(err, XsltError::Execution(ExecutionError::TypeError(_))));
    }
}
