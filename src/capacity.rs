use log::debug;
use regex::Regex;
use serde::Deserialize;

use crate::errors::{Error, Result};

pub const DEFAULT_CAPACITY: u32 = 1000;

/// One line of the capacity table as written in the config file.
#[derive(Deserialize, Debug, Clone)]
pub struct CapacityRuleConfig {
    pub label: String,
    pub pattern: String,
    pub capacity: u32,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CapacityConfig {
    #[serde(default = "default_rules")]
    pub rules: Vec<CapacityRuleConfig>,
    #[serde(default = "default_capacity")]
    pub default_capacity: u32,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        CapacityConfig {
            rules: default_rules(),
            default_capacity: DEFAULT_CAPACITY,
        }
    }
}

fn default_capacity() -> u32 {
    DEFAULT_CAPACITY
}

fn default_rules() -> Vec<CapacityRuleConfig> {
    [
        ("motorway", "E4|E18|E20", 2000),
        ("secondary_arterial", "^(27|22)", 1200),
        ("urban", "^(75|73)", 800),
    ]
        .into_iter()
        .map(|(label, pattern, capacity)| CapacityRuleConfig {
            label: label.to_string(),
            pattern: pattern.to_string(),
            capacity,
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct CapacityRule {
    pub label: String,
    pattern: Regex,
    pub capacity: u32,
}

/// Name-based throughput heuristic in vehicles per hour. Rules are tried in
/// order and the first pattern that matches the edge name wins.
#[derive(Debug, Clone)]
pub struct CapacityTable {
    rules: Vec<CapacityRule>,
    default_capacity: u32,
}

impl CapacityTable {
    pub fn from_config(config: &CapacityConfig) -> Result<Self> {
        let mut rules = Vec::with_capacity(config.rules.len());
        for rule in &config.rules {
            let pattern = Regex::new(&rule.pattern)
                .map_err(|err| Error::from(err).context(format!("capacity rule '{}'", rule.label)))?;
            rules.push(CapacityRule {
                label: rule.label.clone(),
                pattern,
                capacity: rule.capacity,
            });
        }
        Ok(CapacityTable {
            rules,
            default_capacity: config.default_capacity,
        })
    }

    /// The rule that applies to `edge_name`, if any.
    pub fn matching_rule(&self, edge_name: &str) -> Option<&CapacityRule> {
        self.rules.iter().find(|rule| rule.pattern.is_match(edge_name))
    }

    pub fn capacity(&self, edge_name: &str) -> u32 {
        match self.matching_rule(edge_name) {
            Some(rule) => {
                debug!(edge = edge_name, rule = rule.label.as_str(), capacity = rule.capacity; "Matched capacity rule");
                rule.capacity
            },
            None => {
                debug!(edge = edge_name, capacity = self.default_capacity; "No capacity rule matched, using default");
                self.default_capacity
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn builtin() -> CapacityTable {
        CapacityTable::from_config(&CapacityConfig::default()).unwrap()
    }

    #[test]
    fn builtin_rules() {
        let table = builtin();
        assert_eq!(table.capacity("E4"), 2000);
        assert_eq!(table.capacity("Motorway E18 north"), 2000);
        assert_eq!(table.capacity("E20"), 2000);
        assert_eq!(table.capacity("275 Ringroad"), 1200);
        assert_eq!(table.capacity("222"), 1200);
        assert_eq!(table.capacity("73 Local"), 800);
        assert_eq!(table.capacity("75"), 800);
        assert_eq!(table.capacity("Unnamed"), 1000);
        assert_eq!(table.capacity(""), 1000);
    }

    #[test]
    fn prefix_rules_only_match_at_start() {
        let table = builtin();
        assert_eq!(table.capacity("Road 27"), 1000);
        assert_eq!(table.capacity("Route 73"), 1000);
    }

    #[test]
    fn motorway_rule_wins_over_prefix() {
        let table = builtin();
        assert_eq!(table.capacity("27 E4 link"), 2000);
        assert_eq!(table.matching_rule("27 E4 link").map(|r| r.label.as_str()), Some("motorway"));
    }

    #[test]
    fn matching_rule_names_the_winning_label() {
        let table = builtin();
        let label = |name: &str| table.matching_rule(name).map(|r| r.label.as_str());
        assert_eq!(label("E18"), Some("motorway"));
        assert_eq!(label("275 Ringroad"), Some("secondary_arterial"));
        assert_eq!(label("73 Local"), Some("urban"));
        assert_eq!(label("Unnamed"), None);
    }

    #[test]
    fn custom_rules_and_default() {
        let config: CapacityConfig = serde_json::from_str(r#"{
            "rules": [
                { "label": "ring", "pattern": "(?i)ring", "capacity": 1500 }
            ],
            "default_capacity": 600
        }"#).unwrap();
        let table = CapacityTable::from_config(&config).unwrap();
        assert_eq!(table.capacity("275 Ringroad"), 1500);
        assert_eq!(table.capacity("E4"), 600);
    }

    #[test]
    fn missing_keys_fall_back_to_builtin() {
        let config: CapacityConfig = serde_json::from_str("{}").unwrap();
        let table = CapacityTable::from_config(&config).unwrap();
        assert_eq!(table.capacity("E18"), 2000);
        assert_eq!(table.capacity("Unnamed"), 1000);
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let config = CapacityConfig {
            rules: vec![CapacityRuleConfig {
                label: "broken".into(),
                pattern: "(".into(),
                capacity: 1,
            }],
            default_capacity: DEFAULT_CAPACITY,
        };
        let err = CapacityTable::from_config(&config).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Config);
        assert!(err.message.contains("broken"));
    }
}
