//! Reading exactly one value out of a query.

use crate::error::XmlError;
use crate::query::XmlQuery;
use std::fmt::Display;
use std::str::FromStr;
use xmlquery_xpath1::parse_number;

/// The single text or attribute value an XPath is expected to select.
///
/// More than one match is always an [`XmlError::AmbiguousValue`]. What
/// happens on no match depends on how the value is read: [`required`]
/// fails with [`XmlError::ValueNotFound`], [`or`] and [`or_else`] fall back.
///
/// [`required`]: SingleValue::required
/// [`or`]: SingleValue::or
/// [`or_else`]: SingleValue::or_else
#[derive(Debug, Clone)]
pub struct SingleValue<'q> {
    query: &'q XmlQuery,
    xpath: String,
}

impl<'q> SingleValue<'q> {
    pub fn new(query: &'q XmlQuery, xpath: impl Into<String>) -> Self {
        Self {
            query,
            xpath: xpath.into(),
        }
    }

    fn lookup(&self) -> Result<Option<String>, XmlError> {
        let mut matches = self.query.values(&self.xpath)?;
        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            count => Err(XmlError::AmbiguousValue {
                xpath: self.xpath.clone(),
                document: self.document(),
                count,
            }),
        }
    }

    fn document(&self) -> String {
        self.query.text().map(str::to_string).unwrap_or_default()
    }

    pub fn required(&self) -> Result<String, XmlError> {
        self.lookup()?.ok_or_else(|| XmlError::ValueNotFound {
            xpath: self.xpath.clone(),
            document: self.document(),
        })
    }

    pub fn or(&self, default: impl Into<String>) -> Result<String, XmlError> {
        Ok(self.lookup()?.unwrap_or_else(|| default.into()))
    }

    /// Calls `fallback` only when nothing matched.
    pub fn or_else<F>(&self, fallback: F) -> Result<String, XmlError>
    where
        F: FnOnce() -> String,
    {
        Ok(self.lookup()?.unwrap_or_else(fallback))
    }

    /// The required value parsed with [`FromStr`].
    pub fn parse<T>(&self) -> Result<T, XmlError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let value = self.required()?;
        value.trim().parse::<T>().map_err(|e| XmlError::InvalidOperation {
            xpath: self.xpath.clone(),
            message: format!("cannot convert '{}' to {}: {}", value, std::any::type_name::<T>(), e),
        })
    }

    /// The required value read as an XPath number: optional minus sign,
    /// digits and a decimal point, surrounding whitespace ignored.
    pub fn number(&self) -> Result<f64, XmlError> {
        let value = self.required()?;
        let number = parse_number(&value);
        if number.is_nan() {
            return Err(XmlError::InvalidOperation {
                xpath: self.xpath.clone(),
                message: format!("'{}' is not a number", value),
            });
        }
        Ok(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_is_lazy() {
        let query = XmlQuery::new("<r><a>1</a></r>").unwrap();
        let value = SingleValue::new(&query, "/r/a/text()")
            .or_else(|| panic!("fallback must not run"))
            .unwrap();
        assert_eq!(value, "1");
    }

    #[test]
    fn test_parse_reports_target_type() {
        let query = XmlQuery::new("<r>abc</r>").unwrap();
        let err = SingleValue::new(&query, "/r/text()").parse::<u32>().unwrap_err();
        match err {
            XmlError::InvalidOperation { message, .. } => assert!(message.contains("u32")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_number_uses_xpath_syntax() {
        let query = XmlQuery::new("<r><n> -5.25 </n><e>1e3</e></r>").unwrap();
        assert_eq!(SingleValue::new(&query, "/r/n/text()").number().unwrap(), -5.25);
        assert!(SingleValue::new(&query, "/r/e/text()").number().is_err());
    }
}
