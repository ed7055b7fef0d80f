use regex::Regex;
use std::collections::HashMap;

use crate::mail::EmailMessage;

use super::schema::{CompoundCriteria, MatchCriteria, MatchScope, Rule, RuleStatus, SimpleCriteria};

/// Matches messages against a consistent rule snapshot.
///
/// One matcher is built per processing cycle so a cycle never sees a mix of
/// old and new rule versions.
pub struct RuleMatcher {
    rules: Vec<Rule>,
    /// Pre-compiled regex patterns, indexed by effective pattern string
    compiled_patterns: HashMap<String, Regex>,
}

impl RuleMatcher {
    pub fn new(rules: Vec<Rule>) -> Self {
        let mut compiled_patterns = HashMap::new();
        for rule in &rules {
            Self::collect_patterns(&rule.match_criteria, &mut compiled_patterns);
        }

        Self {
            rules,
            compiled_patterns,
        }
    }

    /// Recursively collects and compiles regex patterns from match criteria.
    fn collect_patterns(criteria: &MatchCriteria, patterns: &mut HashMap<String, Regex>) {
        match criteria {
            MatchCriteria::Simple(simple) => {
                if let Some(pattern) = &simple.pattern {
                    let effective = effective_pattern(pattern, simple.case_sensitive);
                    if !patterns.contains_key(&effective) {
                        if let Ok(regex) = Regex::new(&effective) {
                            patterns.insert(effective, regex);
                        }
                    }
                }
            }
            MatchCriteria::Compound(compound) => {
                if let Some(all) = &compound.all {
                    for c in all {
                        Self::collect_patterns(c, patterns);
                    }
                }
                if let Some(any) = &compound.any {
                    for c in any {
                        Self::collect_patterns(c, patterns);
                    }
                }
                if let Some(not) = &compound.not {
                    Self::collect_patterns(not, patterns);
                }
            }
        }
    }

    /// Returns the names of every active rule matching the message, in rule
    /// document order. Rules pinned to providers only see that provider's
    /// messages.
    pub fn matched_rule_names(&self, message: &EmailMessage) -> Vec<String> {
        self.rules
            .iter()
            .filter(|rule| rule.status == RuleStatus::Active)
            .filter(|rule| {
                rule.providers.is_empty()
                    || rule
                        .providers
                        .iter()
                        .any(|p| p == &message.source_provider)
            })
            .filter(|rule| self.matches(&rule.match_criteria, message))
            .map(|rule| rule.name.clone())
            .collect()
    }

    fn matches(&self, criteria: &MatchCriteria, message: &EmailMessage) -> bool {
        match criteria {
            MatchCriteria::Compound(compound) => self.matches_compound(compound, message),
            MatchCriteria::Simple(simple) => self.matches_simple(simple, message),
        }
    }

    fn matches_compound(&self, compound: &CompoundCriteria, message: &EmailMessage) -> bool {
        // 'all' - every criterion must match
        if let Some(all) = &compound.all {
            return all.iter().all(|c| self.matches(c, message));
        }

        // 'any' - at least one criterion must match
        if let Some(any) = &compound.any {
            return any.iter().any(|c| self.matches(c, message));
        }

        // 'not' - criterion must not match
        if let Some(not) = &compound.not {
            return !self.matches(not, message);
        }

        false
    }

    fn matches_simple(&self, simple: &SimpleCriteria, message: &EmailMessage) -> bool {
        scope_texts(simple.scope, message)
            .iter()
            .any(|text| self.matches_text(simple, text))
    }

    fn matches_text(&self, simple: &SimpleCriteria, text: &str) -> bool {
        if let Some(contains) = &simple.contains {
            return contains_str(text, contains, simple.case_sensitive);
        }

        if let Some(contains_any) = &simple.contains_any {
            return contains_any
                .iter()
                .any(|s| contains_str(text, s, simple.case_sensitive));
        }

        if let Some(contains_all) = &simple.contains_all {
            return contains_all
                .iter()
                .all(|s| contains_str(text, s, simple.case_sensitive));
        }

        if let Some(pattern) = &simple.pattern {
            let effective = effective_pattern(pattern, simple.case_sensitive);
            if let Some(regex) = self.compiled_patterns.get(&effective) {
                return regex.is_match(text);
            }
        }

        false
    }
}

fn scope_texts(scope: MatchScope, message: &EmailMessage) -> Vec<&str> {
    match scope {
        MatchScope::Sender => vec![&message.sender],
        MatchScope::Subject => vec![&message.subject],
        MatchScope::Body => vec![&message.body],
        MatchScope::Any => vec![&message.sender, &message.subject, &message.body],
    }
}

fn contains_str(text: &str, needle: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        text.contains(needle)
    } else {
        text.to_lowercase().contains(&needle.to_lowercase())
    }
}

fn effective_pattern(pattern: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        pattern.to_string()
    } else {
        format!("(?i){}", pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::schema::ReminderTemplate;
    use chrono::Utc;

    fn message(sender: &str, subject: &str, body: &str) -> EmailMessage {
        EmailMessage {
            id: "m1".to_string(),
            sender: sender.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            timestamp: Utc::now(),
            source_provider: "gmail".to_string(),
            matched_rule_names: vec![],
        }
    }

    fn simple(scope: MatchScope, contains: &str) -> MatchCriteria {
        MatchCriteria::Simple(SimpleCriteria {
            scope,
            contains: Some(contains.to_string()),
            contains_any: None,
            contains_all: None,
            pattern: None,
            case_sensitive: true,
        })
    }

    fn rule(name: &str, criteria: MatchCriteria) -> Rule {
        Rule {
            name: name.to_string(),
            status: RuleStatus::Active,
            providers: vec![],
            match_criteria: criteria,
            extraction: Default::default(),
            reminder: ReminderTemplate {
                title: name.to_string(),
                notes: None,
                list: None,
                days_before_reminder: 1,
                time_of_day: None,
                due_date_field: None,
            },
        }
    }

    #[test]
    fn test_simple_contains_match() {
        let matcher = RuleMatcher::new(vec![rule(
            "invoice",
            simple(MatchScope::Subject, "invoice"),
        )]);

        let matched = matcher.matched_rule_names(&message("a@b.c", "Your invoice", ""));
        assert_eq!(matched, vec!["invoice".to_string()]);

        assert!(matcher
            .matched_rule_names(&message("a@b.c", "Receipt", ""))
            .is_empty());
    }

    #[test]
    fn test_scope_restricts_matching() {
        let matcher = RuleMatcher::new(vec![rule("body-only", simple(MatchScope::Body, "pago"))]);

        // Word appears in the subject, not the body.
        assert!(matcher
            .matched_rule_names(&message("a@b.c", "pago pendiente", "sin datos"))
            .is_empty());
        assert_eq!(
            matcher
                .matched_rule_names(&message("a@b.c", "aviso", "pago pendiente"))
                .len(),
            1
        );
    }

    #[test]
    fn test_case_insensitive_contains() {
        let criteria = MatchCriteria::Simple(SimpleCriteria {
            scope: MatchScope::Subject,
            contains: Some("INVOICE".to_string()),
            contains_any: None,
            contains_all: None,
            pattern: None,
            case_sensitive: false,
        });
        let matcher = RuleMatcher::new(vec![rule("ci", criteria)]);
        assert_eq!(
            matcher
                .matched_rule_names(&message("a@b.c", "your invoice #42", ""))
                .len(),
            1
        );
    }

    #[test]
    fn test_pattern_match() {
        let criteria = MatchCriteria::Simple(SimpleCriteria {
            scope: MatchScope::Body,
            contains: None,
            contains_any: None,
            contains_all: None,
            pattern: Some(r"\$\d+\.\d{2}".to_string()),
            case_sensitive: true,
        });
        let matcher = RuleMatcher::new(vec![rule("amount", criteria)]);
        assert_eq!(
            matcher
                .matched_rule_names(&message("a@b.c", "", "Total due: $134.99"))
                .len(),
            1
        );
    }

    #[test]
    fn test_compound_all_and_not() {
        let criteria = MatchCriteria::Compound(CompoundCriteria {
            all: Some(vec![
                simple(MatchScope::Sender, "bank.example"),
                MatchCriteria::Compound(CompoundCriteria {
                    all: None,
                    any: None,
                    not: Some(Box::new(simple(MatchScope::Subject, "promo"))),
                }),
            ]),
            any: None,
            not: None,
        });
        let matcher = RuleMatcher::new(vec![rule("statement", criteria)]);

        assert_eq!(
            matcher
                .matched_rule_names(&message("alerts@bank.example", "statement ready", ""))
                .len(),
            1
        );
        assert!(matcher
            .matched_rule_names(&message("alerts@bank.example", "promo offer", ""))
            .is_empty());
    }

    #[test]
    fn test_paused_rule_does_not_match() {
        let mut paused = rule("paused", simple(MatchScope::Subject, "invoice"));
        paused.status = RuleStatus::Paused;
        let matcher = RuleMatcher::new(vec![paused]);
        assert!(matcher
            .matched_rule_names(&message("a@b.c", "invoice", ""))
            .is_empty());
    }

    #[test]
    fn test_provider_pinned_rule() {
        let mut pinned = rule("outlook-only", simple(MatchScope::Subject, "invoice"));
        pinned.providers = vec!["outlook".to_string()];
        let matcher = RuleMatcher::new(vec![pinned]);

        // Test message comes from gmail.
        assert!(matcher
            .matched_rule_names(&message("a@b.c", "invoice", ""))
            .is_empty());
    }

    #[test]
    fn test_multiple_rules_all_reported() {
        let matcher = RuleMatcher::new(vec![
            rule("first", simple(MatchScope::Subject, "invoice")),
            rule("second", simple(MatchScope::Body, "due")),
        ]);
        let matched = matcher.matched_rule_names(&message("a@b.c", "invoice", "payment due"));
        assert_eq!(matched, vec!["first".to_string(), "second".to_string()]);
    }
}
