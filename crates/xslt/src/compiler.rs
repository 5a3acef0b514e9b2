//! Compiles an XSLT 1.0 stylesheet, with everything it imports and includes,
//! into a [`CompiledStylesheet`].
//!
//! Modules are loaded through a [`UriResolver`]. Imports are compiled before
//! the module that imports them, so import precedence simply counts upwards
//! in the order modules finish; the principal stylesheet ends up highest.

use crate::ast::{
    AttributeValueTemplate, AvtPart, CompiledStylesheet, GlobalVariable, PreparsedTemplate,
    XsltInstruction,
};
use crate::error::XsltError;
use crate::pattern::Pattern;
use crate::scope;
use crate::util::{XslNode, get_attr_required, location_of};
use std::collections::HashMap;
use xmlquery_dom::encoding::decode;
use xmlquery_traits::UriResolver;
use xmlquery_xpath1::{Expression, FunctionRegistry};

pub const XSLT_NAMESPACE: &str = "http://www.w3.org/1999/XSL/Transform";

/// Imports and includes deeper than this are refused.
pub const MAX_IMPORT_DEPTH: usize = 64;

/// The instructions `element-available()` reports.
pub const INSTRUCTIONS: &[&str] = &[
    "xsl:apply-imports",
    "xsl:apply-templates",
    "xsl:attribute",
    "xsl:call-template",
    "xsl:choose",
    "xsl:comment",
    "xsl:copy",
    "xsl:copy-of",
    "xsl:element",
    "xsl:fallback",
    "xsl:for-each",
    "xsl:if",
    "xsl:message",
    "xsl:number",
    "xsl:processing-instruction",
    "xsl:text",
    "xsl:value-of",
    "xsl:variable",
];

/// The function library stylesheet expressions are checked against.
pub fn xslt_functions() -> FunctionRegistry {
    FunctionRegistry::xslt().with_instructions(INSTRUCTIONS.iter().copied())
}

/// Compiles `source`. `base_uri` locates it for relative imports.
pub fn compile(
    source: &str,
    base_uri: Option<&str>,
    resolver: &dyn UriResolver,
) -> Result<CompiledStylesheet, XsltError> {
    CompilerBuilder::new(resolver).compile(source, base_uri)
}

struct Module {
    uri: Option<String>,
    text: String,
}

pub(crate) fn parse_xsl(text: &str) -> Result<roxmltree::Document<'_>, XsltError> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    Ok(roxmltree::Document::parse_with_options(
        text.trim_start_matches('\u{feff}'),
        options,
    )?)
}

pub(crate) fn is_xsl(node: XslNode<'_, '_>, local: &str) -> bool {
    node.is_element()
        && node.tag_name().namespace() == Some(XSLT_NAMESPACE)
        && node.tag_name().name() == local
}

/// True for the `xsl:stylesheet` form; false for a literal result element
/// used as the whole stylesheet.
fn is_full_stylesheet(root: XslNode<'_, '_>) -> Result<bool, XsltError> {
    if is_xsl(root, "stylesheet") || is_xsl(root, "transform") {
        return Ok(true);
    }
    if root.attribute((XSLT_NAMESPACE, "version")).is_some() {
        return Ok(false);
    }
    Err(XsltError::structure(
        "Document is not a stylesheet: expected xsl:stylesheet, xsl:transform or an xsl:version attribute",
        location_of(root),
    ))
}

fn top_level_hrefs(doc: &roxmltree::Document<'_>, local: &str) -> Result<Vec<String>, XsltError> {
    let root = doc.root_element();
    if !is_full_stylesheet(root)? {
        return Ok(Vec::new());
    }
    root.children()
        .filter(|n| is_xsl(*n, local))
        .map(|n| get_attr_required(n, "href").map(str::to_string))
        .collect()
}

/// Holds the state of one compilation. Declaration handlers live in
/// `compiler_handlers`.
pub struct CompilerBuilder<'r> {
    resolver: &'r dyn UriResolver,
    pub(crate) functions: FunctionRegistry,
    pub(crate) stylesheet: CompiledStylesheet,
    /// Import precedence of the module being compiled.
    pub(crate) precedence: usize,
    next_precedence: usize,
    position: usize,
    /// URIs of the modules currently being loaded.
    loading: Vec<String>,
    /// Namespaces kept off literal result elements of the current module.
    pub(crate) excluded_uris: Vec<String>,
}

impl<'r> CompilerBuilder<'r> {
    pub fn new(resolver: &'r dyn UriResolver) -> Self {
        Self {
            resolver,
            functions: xslt_functions(),
            stylesheet: CompiledStylesheet::default(),
            precedence: 0,
            next_precedence: 0,
            position: 0,
            loading: Vec::new(),
            excluded_uris: Vec::new(),
        }
    }

    pub fn compile(
        mut self,
        source: &str,
        base_uri: Option<&str>,
    ) -> Result<CompiledStylesheet, XsltError> {
        let module = Module {
            uri: base_uri.map(str::to_string),
            text: source.to_string(),
        };
        self.load_module(module, 0)?;
        self.finalize()
    }

    pub(crate) fn next_position(&mut self) -> usize {
        self.position += 1;
        self.position
    }

    fn fetch(&self, base: Option<&str>, href: &str) -> Result<Module, XsltError> {
        let uri = self.resolver.resolve_uri(base, href)?;
        let bytes = self.resolver.resolve_entity(&uri)?;
        let text = decode(&bytes)?;
        log::debug!("Loaded stylesheet module '{}' via {}", uri, self.resolver.name());
        Ok(Module {
            uri: Some(uri),
            text,
        })
    }

    fn load_module(&mut self, module: Module, depth: usize) -> Result<(), XsltError> {
        if depth > MAX_IMPORT_DEPTH {
            return Err(XsltError::Import(format!(
                "Stylesheet modules nest deeper than {} levels",
                MAX_IMPORT_DEPTH
            )));
        }

        // Included modules share this module's precedence.
        let mut units = vec![module];
        let mut i = 0;
        while i < units.len() {
            let hrefs = top_level_hrefs(&parse_xsl(&units[i].text)?, "include")?;
            for href in hrefs {
                let next = self.fetch(units[i].uri.as_deref(), &href)?;
                if let Some(uri) = &next.uri {
                    let seen = units.iter().any(|u| u.uri.as_ref() == Some(uri));
                    if seen || self.loading.contains(uri) {
                        return Err(XsltError::CircularImport(uri.clone()));
                    }
                }
                units.push(next);
            }
            i += 1;
        }

        let uris: Vec<String> = units.iter().filter_map(|u| u.uri.clone()).collect();
        self.loading.extend(uris.iter().cloned());
        let docs = units
            .iter()
            .map(|u| parse_xsl(&u.text))
            .collect::<Result<Vec<_>, _>>()?;

        for (unit, doc) in units.iter().zip(&docs) {
            for href in top_level_hrefs(doc, "import")? {
                let next = self.fetch(unit.uri.as_deref(), &href)?;
                if let Some(uri) = &next.uri {
                    if self.loading.contains(uri) {
                        return Err(XsltError::CircularImport(uri.clone()));
                    }
                }
                self.load_module(next, depth + 1)?;
            }
        }
        self.loading.truncate(self.loading.len() - uris.len());

        let precedence = self.next_precedence;
        self.next_precedence += 1;
        for doc in &docs {
            self.precedence = precedence;
            self.compile_module(doc.root_element())?;
        }
        Ok(())
    }

    fn compile_module(&mut self, root: XslNode<'_, '_>) -> Result<(), XsltError> {
        self.excluded_uris = self.excluded_namespaces(root, "exclude-result-prefixes")?;
        if is_full_stylesheet(root)? {
            self.compile_declarations(root)
        } else {
            self.compile_simplified(root)
        }
    }

    /// Picks the winning global per name and checks cross references.
    fn finalize(mut self) -> Result<CompiledStylesheet, XsltError> {
        let mut winners: HashMap<String, GlobalVariable> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for global in std::mem::take(&mut self.stylesheet.globals) {
            match winners.get(&global.name) {
                Some(existing) if existing.import_precedence > global.import_precedence => {}
                Some(_) => {
                    winners.insert(global.name.clone(), global);
                }
                None => {
                    order.push(global.name.clone());
                    winners.insert(global.name.clone(), global);
                }
            }
        }
        self.stylesheet.globals = order
            .into_iter()
            .filter_map(|name| winners.remove(&name))
            .collect();

        let mut missing: Option<String> = None;
        {
            let named = &self.stylesheet.named_templates;
            let mut check = |instruction: &XsltInstruction| {
                if let XsltInstruction::CallTemplate { name, .. } = instruction {
                    if !named.contains_key(name) && missing.is_none() {
                        missing = Some(name.clone());
                    }
                }
            };
            for template in &self.stylesheet.templates {
                template.body.walk(&mut check);
            }
        }
        if let Some(name) = missing {
            return Err(XsltError::Compilation(format!(
                "xsl:call-template refers to unknown template '{}'",
                name
            )));
        }

        scope::check_variable_references(&self.stylesheet)?;

        self.stylesheet.precedence_levels = self.next_precedence;
        log::debug!(
            "Compiled stylesheet: {} templates, {} globals, {} keys",
            self.stylesheet.templates.len(),
            self.stylesheet.globals.len(),
            self.stylesheet.keys.len()
        );
        Ok(self.stylesheet)
    }

    /// Parses an XPath expression with the prefixes in scope at `node`.
    pub(crate) fn parse_xpath(
        &self,
        node: XslNode<'_, '_>,
        source: &str,
    ) -> Result<Expression, XsltError> {
        let resolve = |prefix: &str| node.lookup_namespace_uri(Some(prefix)).map(str::to_string);
        xmlquery_xpath1::compile(source, &resolve, &self.functions).map_err(|e| {
            XsltError::XPathAt {
                expr: source.to_string(),
                message: e.to_string(),
                location: location_of(node),
            }
        })
    }

    pub(crate) fn parse_pattern(
        &self,
        node: XslNode<'_, '_>,
        source: &str,
    ) -> Result<Pattern, XsltError> {
        let resolve = |prefix: &str| node.lookup_namespace_uri(Some(prefix)).map(str::to_string);
        Pattern::compile(source, &resolve, &self.functions).map_err(|e| XsltError::XPathAt {
            expr: source.to_string(),
            message: e.to_string(),
            location: location_of(node),
        })
    }

    pub(crate) fn parse_avt(
        &self,
        node: XslNode<'_, '_>,
        value: &str,
    ) -> Result<AttributeValueTemplate, XsltError> {
        let mut parts = Vec::new();
        let mut current_static = String::new();
        let mut chars = value.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    current_static.push('{');
                }
                '{' => {
                    if !current_static.is_empty() {
                        parts.push(AvtPart::Static(std::mem::take(&mut current_static)));
                    }
                    let mut expr = String::new();
                    let mut quote: Option<char> = None;
                    let mut closed = false;
                    for ec in chars.by_ref() {
                        match (ec, quote) {
                            ('}', None) => {
                                closed = true;
                                break;
                            }
                            ('"' | '\'', None) => quote = Some(ec),
                            (q, Some(open)) if q == open => quote = None,
                            _ => {}
                        }
                        expr.push(ec);
                    }
                    if !closed {
                        return Err(XsltError::structure(
                            format!("Unterminated expression in attribute value template '{}'", value),
                            location_of(node),
                        ));
                    }
                    parts.push(AvtPart::Dynamic(self.parse_xpath(node, &expr)?));
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    current_static.push('}');
                }
                '}' => {
                    return Err(XsltError::structure(
                        format!("Unmatched '}}' in attribute value template '{}'", value),
                        location_of(node),
                    ));
                }
                _ => current_static.push(c),
            }
        }
        if !current_static.is_empty() || parts.is_empty() {
            parts.push(AvtPart::Static(current_static));
        }
        Ok(AttributeValueTemplate(parts))
    }

    /// Resolves a list of prefixes such as `exclude-result-prefixes` to URIs.
    /// On a literal result element the attribute is read in the XSLT namespace.
    pub(crate) fn excluded_namespaces(
        &self,
        node: XslNode<'_, '_>,
        attribute: &str,
    ) -> Result<Vec<String>, XsltError> {
        let value = if node.tag_name().namespace() == Some(XSLT_NAMESPACE) {
            node.attribute(attribute)
        } else {
            node.attribute((XSLT_NAMESPACE, attribute))
        };
        let mut uris = Vec::new();
        for prefix in value.unwrap_or_default().split_whitespace() {
            let uri = if prefix == "#default" {
                node.lookup_namespace_uri(None)
            } else {
                node.lookup_namespace_uri(Some(prefix))
            };
            match uri {
                Some(uri) => uris.push(uri.to_string()),
                None => {
                    return Err(XsltError::structure(
                        format!("Prefix '{}' in {} is not declared", prefix, attribute),
                        location_of(node),
                    ));
                }
            }
        }
        Ok(uris)
    }

    /// Registers a template body and returns its index.
    pub(crate) fn add_template(
        &mut self,
        name: Option<String>,
        params: Vec<crate::ast::Param>,
        body: PreparsedTemplate,
    ) -> usize {
        let index = self.stylesheet.templates.len();
        self.stylesheet.templates.push(crate::ast::NamedTemplate {
            name: name.clone(),
            params,
            body,
            import_precedence: self.precedence,
        });
        if let Some(name) = name {
            let replaces = match self.stylesheet.named_templates.get(&name) {
                Some(&existing) => {
                    let existing_precedence = self.stylesheet.templates[existing].import_precedence;
                    if existing_precedence == self.precedence {
                        log::warn!("Template '{}' is defined more than once; using the last", name);
                    }
                    existing_precedence <= self.precedence
                }
                None => true,
            };
            if replaces {
                self.stylesheet.named_templates.insert(name, index);
            }
        }
        index
    }
}
