use serde::{Deserialize, Serialize};

/// Lifecycle status of a rule. Only `active` rules participate in matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    Active,
    Paused,
    Disabled,
}

impl Default for RuleStatus {
    fn default() -> Self {
        RuleStatus::Active
    }
}

impl std::fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleStatus::Active => write!(f, "active"),
            RuleStatus::Paused => write!(f, "paused"),
            RuleStatus::Disabled => write!(f, "disabled"),
        }
    }
}

impl std::str::FromStr for RuleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(RuleStatus::Active),
            "paused" => Ok(RuleStatus::Paused),
            "disabled" => Ok(RuleStatus::Disabled),
            _ => Err(format!("Unknown rule status: {}", s)),
        }
    }
}

/// A declarative email matching/extraction rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    #[serde(default)]
    pub status: RuleStatus,
    /// Providers this rule applies to. Empty means all providers.
    #[serde(default)]
    pub providers: Vec<String>,
    #[serde(rename = "match")]
    pub match_criteria: MatchCriteria,
    #[serde(default)]
    pub extraction: ExtractionSpec,
    pub reminder: ReminderTemplate,
}

/// Custom deserialization for MatchCriteria to properly handle untagged enum.
/// Both SimpleCriteria and CompoundCriteria have all-optional fields, so the
/// variant is picked by sniffing for the compound keys.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MatchCriteria {
    Simple(SimpleCriteria),
    Compound(CompoundCriteria),
}

impl<'de> serde::Deserialize<'de> for MatchCriteria {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;
        use serde_yaml::Value;

        let value = Value::deserialize(deserializer)?;

        if let Value::Mapping(map) = &value {
            let has = |name: &str| map.contains_key(&Value::String(name.to_string()));
            if has("all") || has("any") || has("not") {
                let compound: CompoundCriteria = serde_yaml::from_value(value)
                    .map_err(|e| D::Error::custom(format!("Invalid compound criteria: {}", e)))?;
                return Ok(MatchCriteria::Compound(compound));
            }
            let simple: SimpleCriteria = serde_yaml::from_value(value)
                .map_err(|e| D::Error::custom(format!("Invalid simple criteria: {}", e)))?;
            return Ok(MatchCriteria::Simple(simple));
        }

        Err(D::Error::custom("MatchCriteria must be a mapping"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompoundCriteria {
    #[serde(default)]
    pub all: Option<Vec<MatchCriteria>>,
    #[serde(default)]
    pub any: Option<Vec<MatchCriteria>>,
    #[serde(default)]
    pub not: Option<Box<MatchCriteria>>,
}

/// Part of the message a simple criterion inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchScope {
    Sender,
    Subject,
    Body,
    /// Sender, subject and body.
    Any,
}

impl Default for MatchScope {
    fn default() -> Self {
        MatchScope::Any
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleCriteria {
    #[serde(default)]
    pub scope: MatchScope,
    #[serde(default)]
    pub contains: Option<String>,
    #[serde(rename = "containsAny", default)]
    pub contains_any: Option<Vec<String>>,
    #[serde(rename = "containsAll", default)]
    pub contains_all: Option<Vec<String>>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(rename = "caseSensitive", default = "default_case_sensitive")]
    pub case_sensitive: bool,
}

fn default_case_sensitive() -> bool {
    true
}

/// Fields to pull out of a matched message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionSpec {
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name; the pattern must carry a named capture group of this name.
    pub name: String,
    pub pattern: String,
    #[serde(default)]
    pub transform: Option<FieldTransform>,
    #[serde(default)]
    pub default: Option<String>,
    /// Required fields drive the confidence score; optional fields do not.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldTransform {
    Slugify,
    Uppercase,
    Lowercase,
    Trim,
}

/// How to turn an extraction into a reminder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderTemplate {
    /// Reminder title; `$field` placeholders are substituted from extraction.
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// Target task list; the configured default is used when unset.
    #[serde(default)]
    pub list: Option<String>,
    /// Days before the extracted date the reminder falls due.
    #[serde(default = "default_days_before")]
    pub days_before_reminder: i64,
    /// Wall-clock time of day, HH:MM; the configured default is used when unset.
    #[serde(default)]
    pub time_of_day: Option<String>,
    /// Which extracted field carries the due date. When unset, the first
    /// parseable field value is used.
    #[serde(default)]
    pub due_date_field: Option<String>,
}

fn default_days_before() -> i64 {
    1
}
