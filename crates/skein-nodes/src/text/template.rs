//! Template node
//!
//! Renders a text template by substituting `{name}` placeholders with
//! values from the input record. The input type is derived from the
//! template itself, so wiring mistakes surface when the graph compiles.

use async_trait::async_trait;
use serde_json::{json, Value};
use skein_compose::{ComposeError, FieldDef, FlowNode, Result, RunContext, ValueType};

/// Template Node
///
/// Substitutes placeholders of the form `{name}` with input fields and
/// produces the rendered text. Placeholder names are ASCII identifiers
/// (`[A-Za-z_][A-Za-z0-9_]*`); anything else between braces is left as-is.
///
/// # Input
/// `record{<one required field per placeholder>}` - substitution values;
/// a template without placeholders accepts any input and ignores it
///
/// # Output
/// `text` - the rendered template
///
/// String values substitute verbatim; other values substitute as their
/// JSON rendering.
#[derive(Debug, Clone)]
pub struct TemplateNode {
    template: String,
    placeholders: Vec<String>,
}

impl TemplateNode {
    /// Create a template node, extracting placeholders from `template`
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        let placeholders = parse_placeholders(&template);
        Self {
            template,
            placeholders,
        }
    }

    /// The raw template text
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholder names in order of first appearance
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    fn render(&self, input: &Value) -> Result<String> {
        let mut text = self.template.clone();
        for name in &self.placeholders {
            let value = input.get(name).ok_or_else(|| {
                ComposeError::InvalidInput(format!("missing value for placeholder '{}'", name))
            })?;
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            text = text.replace(&format!("{{{}}}", name), &rendered);
        }
        Ok(text)
    }
}

/// Collect distinct placeholder names in order of first appearance
fn parse_placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        rest = &rest[open + 1..];
        let Some(close) = rest.find('}') else {
            break;
        };
        let candidate = &rest[..close];
        if is_identifier(candidate) && !names.iter().any(|n| n == candidate) {
            names.push(candidate.to_string());
        }
        rest = &rest[close + 1..];
    }
    names
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[async_trait]
impl FlowNode for TemplateNode {
    fn input_type(&self) -> ValueType {
        if self.placeholders.is_empty() {
            return ValueType::Any;
        }
        ValueType::record(
            self.placeholders
                .iter()
                .map(|name| FieldDef::required(name, ValueType::Any))
                .collect(),
        )
    }

    fn output_type(&self) -> ValueType {
        ValueType::Text
    }

    async fn invoke(&self, _ctx: &RunContext, input: Value) -> Result<Value> {
        let rendered = self.render(&input)?;
        log::debug!(
            "TemplateNode: rendered {} placeholders into {} chars",
            self.placeholders.len(),
            rendered.len()
        );
        Ok(json!(rendered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_placeholders_in_order() {
        let node = TemplateNode::new("{greeting}, {name}! Bye, {name}.");
        assert_eq!(node.placeholders(), &["greeting".to_string(), "name".to_string()]);
    }

    #[test]
    fn test_ignores_non_identifier_braces() {
        let node = TemplateNode::new("set {1x} and {a b} but keep {real_one}");
        assert_eq!(node.placeholders(), &["real_one".to_string()]);
    }

    #[test]
    fn test_input_type_from_placeholders() {
        let node = TemplateNode::new("{a} {b}");
        let record = node.input_type();
        let schema = record.as_record().unwrap();
        assert!(schema.field("a").is_some());
        assert!(schema.field("b").is_some());
    }

    #[test]
    fn test_no_placeholders_accepts_any() {
        let node = TemplateNode::new("static text");
        assert_eq!(node.input_type(), ValueType::Any);
    }

    #[tokio::test]
    async fn test_renders_fields() {
        let node = TemplateNode::new("Hello, {name}! You are {age}.");
        let ctx = RunContext::new();
        let output = node
            .invoke(&ctx, json!({"name": "Ada", "age": 36}))
            .await
            .unwrap();
        assert_eq!(output, json!("Hello, Ada! You are 36."));
    }

    #[tokio::test]
    async fn test_repeated_placeholder_substitutes_everywhere() {
        let node = TemplateNode::new("{word} and {word}");
        let ctx = RunContext::new();
        let output = node.invoke(&ctx, json!({"word": "again"})).await.unwrap();
        assert_eq!(output, json!("again and again"));
    }

    #[tokio::test]
    async fn test_missing_placeholder_value_errors() {
        let node = TemplateNode::new("Hello, {name}!");
        let ctx = RunContext::new();
        let err = node.invoke(&ctx, json!({})).await.unwrap_err();
        assert!(matches!(err, ComposeError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_static_template_passes_through() {
        let node = TemplateNode::new("no substitutions");
        let ctx = RunContext::new();
        let output = node.invoke(&ctx, json!(null)).await.unwrap();
        assert_eq!(output, json!("no substitutions"));
    }
}
