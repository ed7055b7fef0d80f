//! Regex field extraction from matched messages.

use std::collections::HashMap;

use regex::Regex;

use crate::mail::EmailMessage;
use crate::rules::schema::{ExtractionSpec, FieldTransform};

/// Outcome of running one rule's extraction spec against a message.
///
/// `confidence` estimates extraction completeness: the share of required
/// fields whose pattern actually matched, scaled to 0..100. Fields satisfied
/// only by their default value do not count.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub fields: HashMap<String, String>,
    pub confidence: u8,
}

pub struct FieldExtractor {
    patterns: Vec<CompiledField>,
}

struct CompiledField {
    name: String,
    regex: Regex,
    transform: Option<FieldTransform>,
    default: Option<String>,
    required: bool,
}

impl FieldExtractor {
    pub fn new(spec: &ExtractionSpec) -> Self {
        let patterns = spec
            .fields
            .iter()
            .filter_map(|field| {
                Regex::new(&field.pattern).ok().map(|regex| CompiledField {
                    name: field.name.clone(),
                    regex,
                    transform: field.transform.clone(),
                    default: field.default.clone(),
                    required: field.required,
                })
            })
            .collect();

        Self { patterns }
    }

    pub fn extract(&self, message: &EmailMessage) -> ExtractionResult {
        let text = format!("{}\n{}\n{}", message.sender, message.subject, message.body);
        let mut fields = HashMap::new();
        let mut required_total = 0usize;
        let mut required_found = 0usize;

        for pattern in &self.patterns {
            if pattern.required {
                required_total += 1;
            }

            if let Some(caps) = pattern.regex.captures(&text) {
                if let Some(matched) = caps.name(&pattern.name) {
                    let mut value = matched.as_str().to_string();

                    if let Some(transform) = &pattern.transform {
                        value = apply_transform(&value, transform);
                    }

                    fields.insert(pattern.name.clone(), value);
                    if pattern.required {
                        required_found += 1;
                    }
                    continue;
                }
            }

            if let Some(default) = &pattern.default {
                fields.insert(pattern.name.clone(), default.clone());
            }
        }

        let confidence = if required_total == 0 {
            100
        } else {
            ((required_found as f64 / required_total as f64) * 100.0).round() as u8
        };

        ExtractionResult { fields, confidence }
    }
}

/// Substitutes `$field` placeholders in a template with extracted values,
/// plus the built-ins `$subject`, `$sender` and `$provider` from the message.
pub fn substitute(template: &str, fields: &HashMap<String, String>, message: &EmailMessage) -> String {
    let mut result = template.to_string();

    result = result.replace("$subject", &message.subject);
    result = result.replace("$sender", &message.sender);
    result = result.replace("$provider", &message.source_provider);

    for (name, value) in fields {
        let placeholder = format!("${}", name);
        result = result.replace(&placeholder, value);
    }

    result
}

fn apply_transform(value: &str, transform: &FieldTransform) -> String {
    match transform {
        FieldTransform::Slugify => slugify(value),
        FieldTransform::Uppercase => value.to_uppercase(),
        FieldTransform::Lowercase => value.to_lowercase(),
        FieldTransform::Trim => value.trim().to_string(),
    }
}

fn slugify(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
