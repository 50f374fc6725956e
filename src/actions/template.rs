//! `{placeholder}` substitution for alert subjects and bodies.
//!
//! The context holds the matched forecast day's fields plus `forecast_date`,
//! `rule_name` and `value` (the value that satisfied the condition).
//! Referencing any other key is a template error.

use crate::error::{AlertError, Result};
use crate::logic::evaluator::MatchResult;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<regex_lite::Regex> = LazyLock::new(|| {
    regex_lite::Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid placeholder pattern")
});

#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    Number(f64),
    Text(String),
}

impl std::fmt::Display for ContextValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // 28.0 renders as "28", 28.456 as "28.46"
            ContextValue::Number(n) => write!(f, "{}", (n * 100.0).round() / 100.0),
            ContextValue::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateContext {
    values: BTreeMap<String, ContextValue>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for a matched rule
    pub fn for_match(rule_name: &str, result: &MatchResult) -> Self {
        let mut ctx = Self::new();
        ctx.insert("rule_name", ContextValue::Text(rule_name.to_string()));

        if let Some(ref day) = result.matched_day {
            ctx.insert(
                "forecast_date",
                ContextValue::Text(day.date.format("%Y-%m-%d").to_string()),
            );
            for (field, value) in &day.fields {
                ctx.insert(field.as_str(), ContextValue::Number(*value));
            }
        }
        for (field, value) in &result.matched_values {
            ctx.insert(field.as_str(), ContextValue::Number(*value));
        }
        if let Some(value) = result.extracted_value {
            ctx.insert("value", ContextValue::Number(value));
        }

        ctx
    }

    pub fn insert(&mut self, key: &str, value: ContextValue) {
        self.values.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    /// `key=value` pairs in key order, without `rule_name`
    pub fn summary_line(&self) -> String {
        self.values
            .iter()
            .filter(|(k, _)| k.as_str() != "rule_name")
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Substitute every `{key}` in `template`.
///
/// Fails listing all unknown keys rather than leaving them in the output.
pub fn render(template: &str, context: &TemplateContext) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut unknown: Vec<String> = Vec::new();
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&template[last..whole.start()]);
        match context.get(key.as_str()) {
            Some(value) => out.push_str(&value.to_string()),
            None => unknown.push(key.as_str().to_string()),
        }
        last = whole.end();
    }
    out.push_str(&template[last..]);

    if !unknown.is_empty() {
        let available: Vec<&str> = context.keys().collect();
        return Err(AlertError::Template(format!(
            "unknown placeholder(s) {} (available: {})",
            unknown
                .iter()
                .map(|k| format!("{{{}}}", k))
                .collect::<Vec<_>>()
                .join(", "),
            available.join(", ")
        )));
    }

    Ok(out)
}
