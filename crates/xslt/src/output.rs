//! Defines the `OutputBuilder` trait, which decouples the XSLT executor from
//! the tree it writes into.

use xmlquery_dom::{Document, DocumentBuilder, DomError, Name, Namespace};

/// The semantic actions of building a result tree. Problems such as an
/// attribute written after child content are recoverable in XSLT, so the
/// methods do not fail; implementations ignore what they cannot represent.
pub trait OutputBuilder {
    fn start_element(&mut self, name: Name, namespaces: &[Namespace]);
    fn end_element(&mut self);

    /// Sets an attribute on the currently open element.
    fn set_attribute(&mut self, name: Name, value: &str);

    fn add_text(&mut self, text: &str);
    fn add_comment(&mut self, text: &str);
    fn add_processing_instruction(&mut self, target: &str, data: &str);
}

/// Builds a result [`Document`].
#[derive(Debug, Default)]
pub struct TreeBuilder {
    inner: DocumentBuilder,
    /// Elements that failed to open, so their end tags are swallowed too.
    rejected: Vec<bool>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> Result<Document, DomError> {
        self.inner.finish()
    }

    fn recover(result: Result<(), DomError>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Ignoring result tree node: {}", e);
                false
            }
        }
    }
}

impl OutputBuilder for TreeBuilder {
    fn start_element(&mut self, name: Name, namespaces: &[Namespace]) {
        let opened = Self::recover(self.inner.start_element(name, namespaces));
        self.rejected.push(!opened);
    }

    fn end_element(&mut self) {
        if self.rejected.pop() == Some(false) {
            Self::recover(self.inner.end_element());
        }
    }

    fn set_attribute(&mut self, name: Name, value: &str) {
        Self::recover(self.inner.attribute(name, value));
    }

    fn add_text(&mut self, text: &str) {
        self.inner.text(text);
    }

    fn add_comment(&mut self, text: &str) {
        // "--" and a trailing "-" are not allowed in comments.
        let mut safe = text.replace("--", "- -");
        if safe.ends_with('-') {
            safe.push(' ');
        }
        self.inner.comment(&safe);
    }

    fn add_processing_instruction(&mut self, target: &str, data: &str) {
        Self::recover(
            self.inner
                .processing_instruction(target, &data.replace("?>", "? >")),
        );
    }
}

/// Collects only top-level character data. Used where XSLT needs a string
/// from a template body: attribute values, comments, processing
/// instructions and messages.
#[derive(Debug, Default)]
pub struct TextBuilder {
    text: String,
    depth: usize,
}

impl TextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl OutputBuilder for TextBuilder {
    fn start_element(&mut self, name: Name, _namespaces: &[Namespace]) {
        log::warn!("Element '{}' is not allowed here and is ignored", name);
        self.depth += 1;
    }

    fn end_element(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn set_attribute(&mut self, _name: Name, _value: &str) {}

    fn add_text(&mut self, text: &str) {
        if self.depth == 0 {
            self.text.push_str(text);
        }
    }

    fn add_comment(&mut self, _text: &str) {}

    fn add_processing_instruction(&mut self, _target: &str, _data: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use xmlquery_dom::{SerializeOptions, serialize};

    #[test]
    fn test_tree_builder_recovers_from_late_attribute() {
        let mut builder = TreeBuilder::new();
        builder.start_element(Name::local("r"), &[]);
        builder.add_text("x");
        builder.set_attribute(Name::local("late"), "1");
        builder.add_comment("a--b-");
        builder.end_element();
        let doc = builder.finish().unwrap();
        let out = serialize(doc.root(), &SerializeOptions::fragment()).unwrap();
        assert_eq!(out, "<r>x<!--a- -b- --></r>");
    }

    #[test]
    fn test_tree_builder_skips_rejected_element() {
        let mut builder = TreeBuilder::new();
        builder.start_element(Name::local("r"), &[]);
        builder.start_element(Name::local(""), &[]);
        builder.add_text("kept");
        builder.end_element();
        builder.end_element();
        let doc = builder.finish().unwrap();
        assert_eq!(doc.root().text_content(), "kept");
    }

    #[test]
    fn test_text_builder_ignores_markup() {
        let mut builder = TextBuilder::new();
        builder.add_text("a");
        builder.start_element(Name::local("b"), &[]);
        builder.add_text("hidden");
        builder.end_element();
        builder.add_comment("c");
        builder.add_text("d");
        assert_eq!(builder.into_string(), "ad");
    }
}
