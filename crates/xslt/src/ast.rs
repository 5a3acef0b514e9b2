//! The compiled form of a stylesheet: templates as lists of instructions with
//! every XPath expression already parsed and bound.

use crate::pattern::Pattern;
use std::collections::HashMap;
use xmlquery_dom::{Name, Namespace};
use xmlquery_xpath1::Expression;

/// A sequence of instructions; the body of a template or an instruction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparsedTemplate(pub Vec<XsltInstruction>);

impl PreparsedTemplate {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Visits every instruction, nested bodies included.
    pub fn walk(&self, f: &mut dyn FnMut(&XsltInstruction)) {
        for instruction in &self.0 {
            f(instruction);
            instruction.walk_children(f);
        }
    }
}

/// Part of an attribute value template such as `item-{@id}`.
#[derive(Debug, Clone, PartialEq)]
pub enum AvtPart {
    Static(String),
    Dynamic(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeValueTemplate(pub Vec<AvtPart>);

impl AttributeValueTemplate {
    /// The value when the template has no `{...}` parts.
    pub fn as_static(&self) -> Option<String> {
        self.0
            .iter()
            .map(|part| match part {
                AvtPart::Static(s) => Some(s.as_str()),
                AvtPart::Dynamic(_) => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDataType {
    Text,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseOrder {
    UpperFirst,
    LowerFirst,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub select: Expression,
    pub order: SortOrder,
    pub data_type: SortDataType,
    pub case_order: Option<CaseOrder>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct When {
    pub test: Expression,
    pub body: PreparsedTemplate,
}

/// How a variable or parameter gets its value.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableValue {
    Select(Expression),
    /// The body builds a result tree fragment.
    Content(PreparsedTemplate),
    /// Neither `select` nor content: the empty string.
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub value: VariableValue,
}

/// An `xsl:with-param`, identical in shape to a declaration.
pub type WithParam = Param;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberLevel {
    Single,
    Multiple,
    Any,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumberInstruction {
    pub value: Option<Expression>,
    pub level: NumberLevel,
    pub count: Option<Pattern>,
    pub from: Option<Pattern>,
    pub format: AttributeValueTemplate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum XsltInstruction {
    Text(String),
    ValueOf {
        select: Expression,
    },
    /// An element written literally in the stylesheet.
    LiteralElement {
        name: Name,
        namespaces: Vec<Namespace>,
        attrs: Vec<(Name, AttributeValueTemplate)>,
        use_attribute_sets: Vec<String>,
        body: PreparsedTemplate,
    },
    Element {
        name: AttributeValueTemplate,
        namespace: Option<AttributeValueTemplate>,
        /// Bindings in scope at the instruction, for resolving a computed prefix.
        in_scope: Vec<Namespace>,
        use_attribute_sets: Vec<String>,
        body: PreparsedTemplate,
    },
    Attribute {
        name: AttributeValueTemplate,
        namespace: Option<AttributeValueTemplate>,
        in_scope: Vec<Namespace>,
        body: PreparsedTemplate,
    },
    Comment {
        body: PreparsedTemplate,
    },
    ProcessingInstruction {
        name: AttributeValueTemplate,
        body: PreparsedTemplate,
    },
    Copy {
        use_attribute_sets: Vec<String>,
        body: PreparsedTemplate,
    },
    CopyOf {
        select: Expression,
    },
    If {
        test: Expression,
        body: PreparsedTemplate,
    },
    Choose {
        whens: Vec<When>,
        otherwise: Option<PreparsedTemplate>,
    },
    ForEach {
        select: Expression,
        sort_keys: Vec<SortKey>,
        body: PreparsedTemplate,
    },
    ApplyTemplates {
        select: Option<Expression>,
        mode: Option<String>,
        sort_keys: Vec<SortKey>,
        params: Vec<WithParam>,
    },
    ApplyImports,
    CallTemplate {
        name: String,
        params: Vec<WithParam>,
    },
    Variable {
        name: String,
        value: VariableValue,
    },
    Message {
        body: PreparsedTemplate,
        terminate: bool,
    },
    Number(NumberInstruction),
}

impl XsltInstruction {
    fn walk_children(&self, f: &mut dyn FnMut(&XsltInstruction)) {
        fn walk_value(value: &VariableValue, f: &mut dyn FnMut(&XsltInstruction)) {
            if let VariableValue::Content(body) = value {
                body.walk(f);
            }
        }
        match self {
            XsltInstruction::LiteralElement { body, .. }
            | XsltInstruction::Element { body, .. }
            | XsltInstruction::Attribute { body, .. }
            | XsltInstruction::Comment { body }
            | XsltInstruction::ProcessingInstruction { body, .. }
            | XsltInstruction::Copy { body, .. }
            | XsltInstruction::If { body, .. }
            | XsltInstruction::ForEach { body, .. }
            | XsltInstruction::Message { body, .. } => body.walk(f),
            XsltInstruction::Choose { whens, otherwise } => {
                for when in whens {
                    when.body.walk(f);
                }
                if let Some(body) = otherwise {
                    body.walk(f);
                }
            }
            XsltInstruction::ApplyTemplates { params, .. }
            | XsltInstruction::CallTemplate { params, .. } => {
                for param in params {
                    walk_value(&param.value, f);
                }
            }
            XsltInstruction::Variable { value, .. } => walk_value(value, f),
            XsltInstruction::Text(_)
            | XsltInstruction::ValueOf { .. }
            | XsltInstruction::CopyOf { .. }
            | XsltInstruction::ApplyImports
            | XsltInstruction::Number(_) => {}
        }
    }
}

/// A template rule for one alternative of a match pattern.
#[derive(Debug, Clone)]
pub struct TemplateRule {
    pub pattern: Pattern,
    pub priority: f64,
    pub import_precedence: usize,
    /// Declaration order across the whole stylesheet; later wins ties.
    pub position: usize,
    pub mode: Option<String>,
    /// Index into [`CompiledStylesheet::templates`].
    pub template: usize,
}

/// A template body shared by its match rules and its name.
#[derive(Debug, Clone)]
pub struct NamedTemplate {
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub body: PreparsedTemplate,
    pub import_precedence: usize,
}

#[derive(Debug, Clone)]
pub struct GlobalVariable {
    pub name: String,
    pub value: VariableValue,
    pub is_param: bool,
    pub import_precedence: usize,
}

#[derive(Debug, Clone)]
pub struct KeyDefinition {
    pub name: String,
    pub pattern: Pattern,
    pub use_expr: Expression,
}

/// A name test from `xsl:strip-space` or `xsl:preserve-space`.
#[derive(Debug, Clone, PartialEq)]
pub enum SpaceTest {
    Any,
    AnyInNamespace(Option<String>),
    Name {
        namespace: Option<String>,
        local: String,
    },
}

impl SpaceTest {
    /// The default priority used to break ties between strip and preserve rules.
    pub fn priority(&self) -> f64 {
        match self {
            SpaceTest::Any => -0.5,
            SpaceTest::AnyInNamespace(_) => -0.25,
            SpaceTest::Name { .. } => 0.0,
        }
    }

    pub fn matches(&self, namespace: Option<&str>, local: &str) -> bool {
        match self {
            SpaceTest::Any => true,
            SpaceTest::AnyInNamespace(ns) => ns.as_deref() == namespace,
            SpaceTest::Name {
                namespace: ns,
                local: l,
            } => ns.as_deref() == namespace && l == local,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpaceRule {
    pub test: SpaceTest,
    pub strip: bool,
    pub import_precedence: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMethod {
    #[default]
    Xml,
    Html,
    Text,
}

/// The merged `xsl:output` declarations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutputDeclaration {
    pub method: OutputMethod,
    pub omit_xml_declaration: bool,
    pub indent: bool,
    /// Informational only; results are always produced as UTF-8.
    pub encoding: Option<String>,
    pub cdata_section_elements: Vec<(Option<String>, String)>,
}

#[derive(Debug, Clone)]
pub struct AttributeSet {
    pub attributes: Vec<XsltInstruction>,
    pub use_attribute_sets: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CompiledStylesheet {
    pub output: OutputDeclaration,
    /// Every template body, matched or named.
    pub templates: Vec<NamedTemplate>,
    pub template_rules: HashMap<Option<String>, Vec<TemplateRule>>,
    pub named_templates: HashMap<String, usize>,
    pub globals: Vec<GlobalVariable>,
    pub keys: Vec<KeyDefinition>,
    pub space_rules: Vec<SpaceRule>,
    pub attribute_sets: HashMap<String, AttributeSet>,
    /// How many import precedence levels exist; the principal module has the highest.
    pub precedence_levels: usize,
}

impl CompiledStylesheet {
    /// True when any `xsl:strip-space` could apply.
    pub fn strips_whitespace(&self) -> bool {
        self.space_rules.iter().any(|r| r.strip)
    }

    /// Whether whitespace-only text children of an element named
    /// `{namespace}local` are removed from the source tree.
    pub fn should_strip(&self, namespace: Option<&str>, local: &str) -> bool {
        self.space_rules
            .iter()
            .filter(|r| r.test.matches(namespace, local))
            .max_by(|a, b| {
                a.import_precedence
                    .cmp(&b.import_precedence)
                    .then(a.test.priority().total_cmp(&b.test.priority()))
            })
            .is_some_and(|r| r.strip)
    }
}
