//! Compiled per-field line pattern.

use regex_lite::Regex;

/// Characters accepted between a field name and its value: whitespace,
/// hyphen, `>` (so `->` and `=>` arrows work), `=` and `:`.
pub const SEPARATOR_CLASS: &str = r"[-\s>=:]";

/// A case-insensitive matcher for one field name.
///
/// The field name must start the line (leading whitespace allowed) and be
/// followed by at least one separator character.
#[derive(Debug, Clone)]
pub struct FieldPattern {
    field: String,
    regex: Regex,
}

impl FieldPattern {
    /// Compile the pattern for `field`. Regex metacharacters in the name are
    /// matched literally.
    pub fn new(field: &str) -> Self {
        let source = format!(
            r"(?i)^\s*{}{}+",
            regex_lite::escape(field),
            SEPARATOR_CLASS
        );
        // The name is escaped and the rest is a fixed literal.
        let regex = Regex::new(&source).expect("escaped field pattern is always valid");
        Self {
            field: field.to_string(),
            regex,
        }
    }

    /// The field name this pattern was built for.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Return the text following the separator run, if `line` matches.
    pub fn extract<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.regex.find(line).map(|m| &line[m.end()..])
    }
}
