//! Document-backed rule store.
//!
//! Rules live in a single YAML document on disk. The store re-reads the
//! document on every load so rule edits take effect on the next processing
//! cycle without a restart.

use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::RuleError;

use super::schema::{FieldSpec, MatchCriteria, Rule, RuleStatus, SimpleCriteria};

/// Rule access as seen by the daemon. Caching and staleness are the store's
/// concern; every method is safe to call once per cycle.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Loads and validates every rule in the document.
    async fn load_rules(&self) -> Result<Vec<Rule>, RuleError>;

    /// Loads rules and keeps only those with `active` status.
    async fn get_active_rules(&self) -> Result<Vec<Rule>, RuleError>;

    /// Rewrites the document with the named rule's status changed.
    async fn update_rule_status(&self, name: &str, status: RuleStatus) -> Result<(), RuleError>;
}

/// On-disk shape of the rules document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleDocument {
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// Rule store backed by a YAML document on the local filesystem.
pub struct YamlRuleStore {
    path: PathBuf,
}

impl YamlRuleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_document(&self) -> Result<RuleDocument, RuleError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No rules document at {}", self.path.display());
                return Ok(RuleDocument::default());
            }
            Err(source) => {
                return Err(RuleError::ReadDocument {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let document: RuleDocument = serde_yaml::from_str(&raw)?;
        validate_rules(&document.rules)?;
        Ok(document)
    }

    async fn write_document(&self, document: &RuleDocument) -> Result<(), RuleError> {
        let raw = serde_yaml::to_string(document)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| RuleError::WriteDocument {
                    path: self.path.clone(),
                    source,
                })?;
        }
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|source| RuleError::WriteDocument {
                path: self.path.clone(),
                source,
            })
    }
}

#[async_trait]
impl RuleStore for YamlRuleStore {
    async fn load_rules(&self) -> Result<Vec<Rule>, RuleError> {
        let document = self.read_document().await?;
        debug!(
            "Loaded {} rules from {}",
            document.rules.len(),
            self.path.display()
        );
        Ok(document.rules)
    }

    async fn get_active_rules(&self) -> Result<Vec<Rule>, RuleError> {
        let rules = self.load_rules().await?;
        Ok(rules
            .into_iter()
            .filter(|r| r.status == RuleStatus::Active)
            .collect())
    }

    async fn update_rule_status(&self, name: &str, status: RuleStatus) -> Result<(), RuleError> {
        let mut document = self.read_document().await?;
        let rule = document
            .rules
            .iter_mut()
            .find(|r| r.name == name)
            .ok_or_else(|| RuleError::UnknownRule(name.to_string()))?;

        rule.status = status;
        self.write_document(&document).await?;
        info!("Rule '{}' status set to {}", name, status);
        Ok(())
    }
}

/// Checks rule names are unique and every regex in the document compiles.
pub fn validate_rules(rules: &[Rule]) -> Result<(), RuleError> {
    let mut seen = HashSet::new();
    for rule in rules {
        if !seen.insert(rule.name.as_str()) {
            return Err(RuleError::DuplicateName(rule.name.clone()));
        }
        validate_criteria(&rule.name, &rule.match_criteria)?;
        for field in &rule.extraction.fields {
            validate_field(&rule.name, field)?;
        }
    }
    Ok(())
}

fn validate_criteria(rule_name: &str, criteria: &MatchCriteria) -> Result<(), RuleError> {
    match criteria {
        MatchCriteria::Simple(simple) => validate_simple(rule_name, simple),
        MatchCriteria::Compound(compound) => {
            if let Some(all) = &compound.all {
                for c in all {
                    validate_criteria(rule_name, c)?;
                }
            }
            if let Some(any) = &compound.any {
                for c in any {
                    validate_criteria(rule_name, c)?;
                }
            }
            if let Some(not) = &compound.not {
                validate_criteria(rule_name, not)?;
            }
            Ok(())
        }
    }
}

fn validate_simple(rule_name: &str, simple: &SimpleCriteria) -> Result<(), RuleError> {
    if let Some(pattern) = &simple.pattern {
        Regex::new(pattern).map_err(|e| RuleError::InvalidRule {
            name: rule_name.to_string(),
            reason: format!("invalid match pattern '{}': {}", pattern, e),
        })?;
    }
    Ok(())
}

fn validate_field(rule_name: &str, field: &FieldSpec) -> Result<(), RuleError> {
    let regex = Regex::new(&field.pattern).map_err(|e| RuleError::InvalidRule {
        name: rule_name.to_string(),
        reason: format!("invalid field pattern '{}': {}", field.pattern, e),
    })?;

    if !regex
        .capture_names()
        .flatten()
        .any(|name| name == field.name)
    {
        return Err(RuleError::InvalidRule {
            name: rule_name.to_string(),
            reason: format!(
                "field pattern '{}' has no capture group named '{}'",
                field.pattern, field.name
            ),
        });
    }
    Ok(())
}
