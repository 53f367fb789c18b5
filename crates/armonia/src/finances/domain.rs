use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::impl_entity;

pub const DEFAULT_CATEGORY: &str = "GENERAL";
pub const DEFAULT_PRIORITY: i32 = 100;
const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 200;

/// A named billing formula. Rules of a category run in ascending `priority`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRule {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub category: String,
    pub formula: String,
    /// Default variables; evaluation input overrides them.
    pub parameters: BTreeMap<String, f64>,
    pub priority: i32,
    pub active: bool,
    pub start_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    pub created_by: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_entity!(InvoiceRule, "invoice rule");

impl InvoiceRule {
    /// Active and inside its validity window at `at`.
    pub fn in_force(&self, at: DateTime<Utc>) -> bool {
        self.active && self.start_date <= at && self.end_date.map_or(true, |end| end > at)
    }
}

/// Upper-cased, trimmed category, or the default one when blank.
pub fn normalize_category(category: Option<&str>) -> String {
    category
        .map(str::trim)
        .filter(|category| !category.is_empty())
        .map_or_else(|| DEFAULT_CATEGORY.to_string(), str::to_uppercase)
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewInvoiceRule {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: Option<String>,
    pub formula: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
    pub priority: Option<i32>,
    pub active: Option<bool>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceRuleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub formula: Option<String>,
    pub parameters: Option<BTreeMap<String, f64>>,
    pub priority: Option<i32>,
    pub active: Option<bool>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceRuleFilter {
    pub active: Option<bool>,
    pub category: Option<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl InvoiceRuleFilter {
    pub fn matches(&self, rule: &InvoiceRule) -> bool {
        self.active.map_or(true, |active| rule.active == active)
            && self.category.as_deref().map_or(true, |category| {
                rule.category == normalize_category(Some(category))
            })
    }

    pub fn window(&self) -> (usize, usize) {
        (
            self.offset.unwrap_or(0),
            self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToggleRequest {
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvaluationRequest {
    #[serde(default)]
    pub data: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplyRequest {
    pub category: String,
    #[serde(default)]
    pub data: BTreeMap<String, f64>,
}

/// Outcome of one rule. Formula failures are reported here rather than as errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleEvaluation {
    pub rule_id: u64,
    pub rule_name: String,
    pub priority: i32,
    pub success: bool,
    pub result: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleApplication {
    pub category: String,
    pub results: Vec<RuleEvaluation>,
    /// Result of the last rule that evaluated successfully.
    pub final_result: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn categories_are_normalized() {
        assert_eq!(normalize_category(None), "GENERAL");
        assert_eq!(normalize_category(Some("  ")), "GENERAL");
        assert_eq!(normalize_category(Some(" admin_fee ")), "ADMIN_FEE");
    }

    #[test]
    fn rules_are_in_force_inside_their_window() {
        let now = Utc::now();
        let mut rule = InvoiceRule {
            id: 1,
            name: "Cuota".to_string(),
            description: String::new(),
            category: DEFAULT_CATEGORY.to_string(),
            formula: "base".to_string(),
            parameters: BTreeMap::new(),
            priority: DEFAULT_PRIORITY,
            active: true,
            start_date: now - Duration::days(1),
            end_date: Some(now + Duration::days(1)),
            created_by: 1,
            updated_by: None,
            created_at: now,
            updated_at: now,
        };
        assert!(rule.in_force(now));
        assert!(!rule.in_force(now + Duration::days(2)));
        assert!(!rule.in_force(now - Duration::days(2)));
        rule.active = false;
        assert!(!rule.in_force(now));
    }
}
