//! Path templates with `{name}` placeholders.

use std::collections::HashMap;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::{Error, Result};

/// Characters percent-encoded when a value is substituted into a path
/// segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'%');

/// A parsed path template, e.g. `/repos/{owner}/{repo}/contributors`.
///
/// Placeholders are discovered at parse time so descriptor validation can
/// cross-check them against declared parameters before any request is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    template: String,
    placeholders: Vec<String>,
}

impl PathTemplate {
    /// Parses a template, collecting its placeholders.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unbalanced braces or empty
    /// placeholder names.
    pub fn parse(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        let mut placeholders = Vec::new();

        let mut rest = template.as_str();
        while let Some(open) = rest.find('{') {
            let after = rest.get(open + 1..).unwrap_or_default();
            let Some(close) = after.find('}') else {
                return Err(Error::configuration(format!(
                    "unbalanced '{{' in path template `{template}`"
                )));
            };
            let name = after.get(..close).unwrap_or_default();
            if name.is_empty() {
                return Err(Error::configuration(format!(
                    "empty placeholder in path template `{template}`"
                )));
            }
            if name.contains('{') {
                return Err(Error::configuration(format!(
                    "nested '{{' in path template `{template}`"
                )));
            }
            placeholders.push(name.to_string());
            rest = after.get(close + 1..).unwrap_or_default();
        }
        if rest.contains('}') {
            return Err(Error::configuration(format!(
                "unbalanced '}}' in path template `{template}`"
            )));
        }

        Ok(Self {
            template,
            placeholders,
        })
    }

    /// The template string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Placeholder names in order of appearance.
    #[must_use]
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// Substitutes placeholder values, percent-encoding each one.
    ///
    /// # Errors
    ///
    /// Returns an error if a placeholder has no value.
    pub fn render(&self, values: &HashMap<String, String>) -> Result<String> {
        let mut rendered = self.template.clone();
        for name in &self.placeholders {
            let value = values.get(name).ok_or_else(|| {
                Error::invalid_request(format!(
                    "missing value for path placeholder `{{{name}}}`"
                ))
            })?;
            let encoded = utf8_percent_encode(value, SEGMENT).to_string();
            rendered = rendered.replace(&format!("{{{name}}}"), &encoded);
        }
        Ok(rendered)
    }
}

impl std::fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.template)
    }
}

impl AsRef<str> for PathTemplate {
    fn as_ref(&self) -> &str {
        &self.template
    }
}
