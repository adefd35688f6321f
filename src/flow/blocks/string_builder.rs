// SPDX-License-Identifier: MIT

//! StringBuilder block: fill `{placeholder}`s in a template
//!
//! Every placeholder becomes an input port. `{{` and `}}` render as literal
//! braces; an unclosed `{` is kept as text.

use super::BlockOutcome;
use crate::bdk::modifier::value_to_text;
use crate::bdk::port::{DataKind, PortSet};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const RESULT: &str = "result";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StringBuilderConfig {
    pub template: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Placeholder(String),
}

fn parse(template: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                text.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                text.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '}' {
                        closed = true;
                        break;
                    }
                    name.push(next);
                }
                let trimmed = name.trim();
                if closed && !trimmed.is_empty() {
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(Segment::Placeholder(trimmed.to_string()));
                } else {
                    text.push('{');
                    text.push_str(&name);
                    if closed {
                        text.push('}');
                    }
                }
            }
            other => text.push(other),
        }
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    segments
}

impl StringBuilderConfig {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Placeholder names in first-seen order, without duplicates
    pub fn placeholders(&self) -> Vec<String> {
        let names: IndexSet<String> = parse(&self.template)
            .into_iter()
            .filter_map(|segment| match segment {
                Segment::Placeholder(name) => Some(name),
                Segment::Text(_) => None,
            })
            .collect();
        names.into_iter().collect()
    }

    pub fn render(&self, values: &IndexMap<String, Value>) -> String {
        parse(&self.template)
            .into_iter()
            .map(|segment| match segment {
                Segment::Text(text) => text,
                Segment::Placeholder(name) => {
                    values.get(&name).map(value_to_text).unwrap_or_default()
                }
            })
            .collect()
    }

    pub(crate) fn declare_ports(&self, inputs: &mut PortSet, outputs: &mut PortSet) {
        for name in self.placeholders() {
            inputs.register(&name, DataKind::String, None);
        }
        outputs.register(RESULT, DataKind::String, None);
    }

    pub(crate) fn execute(&self, inputs: &IndexMap<String, Value>) -> BlockOutcome {
        BlockOutcome::single(RESULT, Value::String(self.render(inputs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_placeholders_in_order_without_duplicates() {
        let config = StringBuilderConfig::new("{greeting}, {name}! Bye {name}.");
        assert_eq!(config.placeholders(), vec!["greeting", "name"]);
    }

    #[test]
    fn test_render_substitutes_values() {
        let config = StringBuilderConfig::new("{greeting}, {name}! You are {age}.");
        let mut values = IndexMap::new();
        values.insert("greeting".to_string(), json!("Hi"));
        values.insert("name".to_string(), json!("Ada"));
        values.insert("age".to_string(), json!(36));

        assert_eq!(config.render(&values), "Hi, Ada! You are 36.");
    }

    #[test]
    fn test_escaped_and_unclosed_braces() {
        let config = StringBuilderConfig::new("{{literal}} {x} {open");
        assert_eq!(config.placeholders(), vec!["x"]);

        let mut values = IndexMap::new();
        values.insert("x".to_string(), json!("v"));
        assert_eq!(config.render(&values), "{literal} v {open");
    }

    #[test]
    fn test_missing_and_null_values_render_empty() {
        let config = StringBuilderConfig::new("[{a}][{b}]");
        let mut values = IndexMap::new();
        values.insert("a".to_string(), Value::Null);
        assert_eq!(config.render(&values), "[][]");
    }

    #[test]
    fn test_declares_one_input_per_placeholder() {
        let config = StringBuilderConfig::new("{first} {last}");
        let mut inputs = PortSet::new();
        let mut outputs = PortSet::new();
        config.declare_ports(&mut inputs, &mut outputs);

        let keys: Vec<&str> = inputs.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["first", "last"]);
        assert_eq!(inputs.get("first"), Some(&json!("")));
        assert!(outputs.contains(RESULT));
    }
}
