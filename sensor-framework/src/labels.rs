//! Label sets attached verbatim to every sample a collector instance emits.

use std::fmt;

use crate::error::{FrameworkError, Result};

/// An ordered, pre-rendered Prometheus label set such as `{ups="main",host="nas"}`.
///
/// The rendered form is computed once at construction and reused for every
/// sample, so formatting a sample line never re-escapes values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LabelSet {
    pairs: Vec<(String, String)>,
    rendered: String,
}

impl LabelSet {
    /// Create an empty label set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a label, keeping insertion order.
    ///
    /// Adding a key that already exists replaces its value in place.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((key, value)),
        }
        self.rendered = render(&self.pairs);
        self
    }

    /// Parse an operator-supplied label override.
    ///
    /// The format is a `;`-separated list of `key=value` pairs, e.g.
    /// `site=lab;rack=3`. Surrounding double quotes on a value are stripped.
    pub fn parse_override(input: &str) -> Result<Self> {
        let mut set = Self::new();

        for part in input.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(|| FrameworkError::Labels {
                labels: input.to_string(),
                message: format!("expected key=value, got '{}'", part),
            })?;

            let key = key.trim();
            if !is_valid_label_name(key) {
                return Err(FrameworkError::Labels {
                    labels: input.to_string(),
                    message: format!("invalid label name '{}'", key),
                });
            }

            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);

            set = set.with(key, value);
        }

        if set.is_empty() {
            return Err(FrameworkError::Labels {
                labels: input.to_string(),
                message: "no labels given".to_string(),
            });
        }

        Ok(set)
    }

    /// Get the value of a label.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Labels in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether the set contains a label with this name.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of labels in the set.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the set has no labels.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The rendered exposition form, empty for an empty set.
    pub fn as_str(&self) -> &str {
        &self.rendered
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

/// Check a label name against `[a-zA-Z_][a-zA-Z0-9_]*`, rejecting the
/// reserved `__` prefix.
pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };

    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with("__")
}

/// Escape special characters in label values.
pub fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

fn render(pairs: &[(String, String)]) -> String {
    if pairs.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = pairs
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();

    format!("{{{}}}", parts.join(","))
}
