//! Compile-time check that every `$name` refers to a variable or parameter
//! in scope where it is read.
//!
//! Globals are visible everywhere, in any order. A local variable is visible
//! to its following siblings and their descendants; template parameters to
//! the whole body and to later parameter defaults.

use crate::ast::{
    AttributeValueTemplate, AvtPart, CompiledStylesheet, Param, PreparsedTemplate, SortKey,
    VariableValue, XsltInstruction,
};
use crate::error::XsltError;
use std::collections::HashSet;
use xmlquery_xpath1::Expression;

struct Scope<'s> {
    globals: HashSet<&'s str>,
    locals: Vec<&'s str>,
}

impl<'s> Scope<'s> {
    fn expression(&self, expr: &Expression) -> Result<(), XsltError> {
        let mut unknown: Option<String> = None;
        expr.for_each_variable(&mut |name| {
            if unknown.is_none()
                && !self.globals.contains(name)
                && !self.locals.iter().any(|local| *local == name)
            {
                unknown = Some(name.to_string());
            }
        });
        match unknown {
            Some(name) => Err(XsltError::Compilation(format!(
                "Variable or parameter '${}' is not declared",
                name
            ))),
            None => Ok(()),
        }
    }

    fn avt(&self, avt: &AttributeValueTemplate) -> Result<(), XsltError> {
        for part in &avt.0 {
            if let AvtPart::Dynamic(expr) = part {
                self.expression(expr)?;
            }
        }
        Ok(())
    }

    fn value(&mut self, value: &'s VariableValue) -> Result<(), XsltError> {
        match value {
            VariableValue::Select(expr) => self.expression(expr),
            VariableValue::Content(body) => self.body(body),
            VariableValue::Empty => Ok(()),
        }
    }

    fn sort_keys(&self, keys: &[SortKey]) -> Result<(), XsltError> {
        keys.iter().try_for_each(|key| self.expression(&key.select))
    }

    fn with_params(&mut self, params: &'s [Param]) -> Result<(), XsltError> {
        params.iter().try_for_each(|param| self.value(&param.value))
    }

    fn body(&mut self, body: &'s PreparsedTemplate) -> Result<(), XsltError> {
        let mark = self.locals.len();
        for instruction in &body.0 {
            self.instruction(instruction)?;
            if let XsltInstruction::Variable { name, .. } = instruction {
                self.locals.push(name);
            }
        }
        self.locals.truncate(mark);
        Ok(())
    }

    fn instruction(&mut self, instruction: &'s XsltInstruction) -> Result<(), XsltError> {
        match instruction {
            XsltInstruction::Text(_) | XsltInstruction::ApplyImports => Ok(()),
            XsltInstruction::ValueOf { select } | XsltInstruction::CopyOf { select } => {
                self.expression(select)
            }
            XsltInstruction::LiteralElement { attrs, body, .. } => {
                for (_, avt) in attrs {
                    self.avt(avt)?;
                }
                self.body(body)
            }
            XsltInstruction::Element {
                name,
                namespace,
                body,
                ..
            }
            | XsltInstruction::Attribute {
                name,
                namespace,
                body,
                ..
            } => {
                self.avt(name)?;
                if let Some(namespace) = namespace {
                    self.avt(namespace)?;
                }
                self.body(body)
            }
            XsltInstruction::ProcessingInstruction { name, body } => {
                self.avt(name)?;
                self.body(body)
            }
            XsltInstruction::Comment { body }
            | XsltInstruction::Copy { body, .. }
            | XsltInstruction::Message { body, .. } => self.body(body),
            XsltInstruction::If { test, body } => {
                self.expression(test)?;
                self.body(body)
            }
            XsltInstruction::Choose { whens, otherwise } => {
                for when in whens {
                    self.expression(&when.test)?;
                    self.body(&when.body)?;
                }
                match otherwise {
                    Some(body) => self.body(body),
                    None => Ok(()),
                }
            }
            XsltInstruction::ForEach {
                select,
                sort_keys,
                body,
            } => {
                self.expression(select)?;
                self.sort_keys(sort_keys)?;
                self.body(body)
            }
            XsltInstruction::ApplyTemplates {
                select,
                sort_keys,
                params,
                ..
            } => {
                if let Some(select) = select {
                    self.expression(select)?;
                }
                self.sort_keys(sort_keys)?;
                self.with_params(params)
            }
            XsltInstruction::CallTemplate { params, .. } => self.with_params(params),
            XsltInstruction::Variable { value, .. } => self.value(value),
            XsltInstruction::Number(number) => {
                if let Some(value) = &number.value {
                    self.expression(value)?;
                }
                self.avt(&number.format)
            }
        }
    }
}

/// Fails on the first variable reference with no declaration in scope.
pub(crate) fn check_variable_references(stylesheet: &CompiledStylesheet) -> Result<(), XsltError> {
    let mut scope = Scope {
        globals: stylesheet.globals.iter().map(|g| g.name.as_str()).collect(),
        locals: Vec::new(),
    };

    for global in &stylesheet.globals {
        scope.value(&global.value)?;
    }
    for key in &stylesheet.keys {
        scope.expression(&key.use_expr)?;
    }
    for set in stylesheet.attribute_sets.values() {
        for attribute in &set.attributes {
            scope.instruction(attribute)?;
        }
    }
    for template in &stylesheet.templates {
        for param in &template.params {
            scope.value(&param.value)?;
            scope.locals.push(&param.name);
        }
        scope.body(&template.body)?;
        scope.locals.clear();
    }
    Ok(())
}
