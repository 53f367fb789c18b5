use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use super::domain::{
    normalize_category, InvoiceRule, InvoiceRuleFilter, InvoiceRuleUpdate, NewInvoiceRule,
    RuleApplication, RuleEvaluation, DEFAULT_PRIORITY,
};
use super::formula::Formula;
use crate::error::{require_text, ServiceError};
use crate::notifications::ActivityLogger;
use crate::store::{require, Database, Repository};
use crate::tenancy::{Actor, SchemaName};

fn admin_only(actor: &Actor) -> Result<(), ServiceError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::forbidden(
            "only administrators can manage invoice rules",
        ))
    }
}

fn checked_formula(source: &str) -> Result<String, ServiceError> {
    let source = require_text("formula", source)?;
    Formula::parse(&source).map_err(|err| ServiceError::validation("formula", err.to_string()))?;
    Ok(source)
}

fn check_window(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Result<(), ServiceError> {
    match end {
        Some(end) if end <= start => Err(ServiceError::validation(
            "end_date",
            "must be after start_date",
        )),
        _ => Ok(()),
    }
}

/// Run `rule` over its parameters overlaid by `data`.
fn run(rule: &InvoiceRule, data: &BTreeMap<String, f64>) -> RuleEvaluation {
    let mut evaluation = RuleEvaluation {
        rule_id: rule.id,
        rule_name: rule.name.clone(),
        priority: rule.priority,
        success: false,
        result: None,
        error: None,
    };
    if !rule.active {
        evaluation.error = Some("rule is inactive".to_string());
        return evaluation;
    }
    let mut context = rule.parameters.clone();
    context.extend(data.iter().map(|(name, value)| (name.clone(), *value)));
    match Formula::parse(&rule.formula).and_then(|formula| formula.evaluate(&context)) {
        Ok(value) => {
            evaluation.success = true;
            evaluation.result = Some(value);
        }
        Err(err) => evaluation.error = Some(err.to_string()),
    }
    evaluation
}

pub struct InvoiceRuleService {
    rules: Arc<dyn Repository<InvoiceRule>>,
    activity: Arc<ActivityLogger>,
}

impl InvoiceRuleService {
    pub fn new(database: &Database, activity: Arc<ActivityLogger>) -> Self {
        Self {
            rules: database.invoice_rules.clone(),
            activity,
        }
    }

    /// Rules by ascending priority, then id.
    pub fn list(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        filter: &InvoiceRuleFilter,
    ) -> Result<Vec<InvoiceRule>, ServiceError> {
        admin_only(actor)?;
        let mut rules = self.rules.find(schema, &|rule| filter.matches(rule))?;
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.id.cmp(&b.id)));
        let (offset, limit) = filter.window();
        Ok(rules.into_iter().skip(offset).take(limit).collect())
    }

    pub fn get(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
    ) -> Result<InvoiceRule, ServiceError> {
        admin_only(actor)?;
        require(self.rules.as_ref(), schema, id)
    }

    pub fn create(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        input: NewInvoiceRule,
    ) -> Result<InvoiceRule, ServiceError> {
        admin_only(actor)?;
        let now = Utc::now();
        let start_date = input.start_date.unwrap_or(now);
        check_window(start_date, input.end_date)?;
        let stored = self.rules.insert(
            schema,
            InvoiceRule {
                id: 0,
                name: require_text("name", &input.name)?,
                description: input.description.trim().to_string(),
                category: normalize_category(input.category.as_deref()),
                formula: checked_formula(&input.formula)?,
                parameters: input.parameters,
                priority: input.priority.unwrap_or(DEFAULT_PRIORITY),
                active: input.active.unwrap_or(true),
                start_date,
                end_date: input.end_date,
                created_by: actor.user_id,
                updated_by: None,
                created_at: now,
                updated_at: now,
            },
        )?;
        tracing::info!(%schema, rule_id = stored.id, category = %stored.category, "invoice rule created");
        self.activity.record(
            schema,
            Some(actor.user_id),
            "CREATE_INVOICE_RULE",
            "invoice_rule",
            stored.id,
            json!({ "category": stored.category, "priority": stored.priority }),
        );
        Ok(stored)
    }

    pub fn update(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
        update: InvoiceRuleUpdate,
    ) -> Result<InvoiceRule, ServiceError> {
        admin_only(actor)?;
        let stored = self.rules.modify(schema, id, &mut |rule| {
            if let Some(name) = &update.name {
                rule.name = require_text("name", name)?;
            }
            if let Some(description) = &update.description {
                rule.description = description.trim().to_string();
            }
            if let Some(category) = &update.category {
                rule.category = normalize_category(Some(category));
            }
            if let Some(formula) = &update.formula {
                rule.formula = checked_formula(formula)?;
            }
            if let Some(parameters) = &update.parameters {
                rule.parameters = parameters.clone();
            }
            if let Some(priority) = update.priority {
                rule.priority = priority;
            }
            if let Some(active) = update.active {
                rule.active = active;
            }
            if let Some(start) = update.start_date {
                rule.start_date = start;
            }
            if update.end_date.is_some() {
                rule.end_date = update.end_date;
            }
            check_window(rule.start_date, rule.end_date)?;
            rule.updated_by = Some(actor.user_id);
            rule.updated_at = Utc::now();
            Ok(())
        })?;
        tracing::info!(%schema, rule_id = id, "invoice rule updated");
        self.activity.record(
            schema,
            Some(actor.user_id),
            "UPDATE_INVOICE_RULE",
            "invoice_rule",
            id,
            json!({}),
        );
        Ok(stored)
    }

    pub fn delete(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
    ) -> Result<InvoiceRule, ServiceError> {
        admin_only(actor)?;
        let removed = self.rules.delete(schema, id)?;
        tracing::info!(%schema, rule_id = id, "invoice rule deleted");
        self.activity.record(
            schema,
            Some(actor.user_id),
            "DELETE_INVOICE_RULE",
            "invoice_rule",
            id,
            json!({}),
        );
        Ok(removed)
    }

    /// Set `active`, or flip it when no value is given.
    pub fn toggle_active(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
        active: Option<bool>,
    ) -> Result<InvoiceRule, ServiceError> {
        admin_only(actor)?;
        let stored = self.rules.modify(schema, id, &mut |rule| {
            rule.active = active.unwrap_or(!rule.active);
            rule.updated_by = Some(actor.user_id);
            rule.updated_at = Utc::now();
            Ok(())
        })?;
        tracing::info!(%schema, rule_id = id, active = stored.active, "invoice rule toggled");
        Ok(stored)
    }

    pub fn evaluate(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
        data: &BTreeMap<String, f64>,
    ) -> Result<RuleEvaluation, ServiceError> {
        admin_only(actor)?;
        let rule = require(self.rules.as_ref(), schema, id)?;
        let evaluation = run(&rule, data);
        if let Some(error) = &evaluation.error {
            tracing::warn!(%schema, rule_id = id, error = %error, "invoice rule did not evaluate");
        }
        Ok(evaluation)
    }

    /// Evaluate every rule of `category` in force now, by ascending priority.
    pub fn apply(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        category: &str,
        data: &BTreeMap<String, f64>,
    ) -> Result<RuleApplication, ServiceError> {
        admin_only(actor)?;
        require_text("category", category)?;
        let category = normalize_category(Some(category));
        let now = Utc::now();
        let mut rules = self
            .rules
            .find(schema, &|rule| rule.category == category && rule.in_force(now))?;
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.id.cmp(&b.id)));

        let results: Vec<RuleEvaluation> = rules.iter().map(|rule| run(rule, data)).collect();
        let final_result = results
            .iter()
            .filter(|evaluation| evaluation.success)
            .last()
            .and_then(|evaluation| evaluation.result);
        tracing::info!(%schema, %category, rules = results.len(), "invoice rules applied");
        Ok(RuleApplication {
            category,
            results,
            final_result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn service() -> InvoiceRuleService {
        let database = Database::in_memory();
        let activity = Arc::new(ActivityLogger::new(database.activity.clone()));
        InvoiceRuleService::new(&database, activity)
    }

    fn schema() -> SchemaName {
        SchemaName::parse("tenant_a").expect("valid schema")
    }

    fn rule(name: &str, formula: &str, priority: i32) -> NewInvoiceRule {
        NewInvoiceRule {
            name: name.to_string(),
            description: String::new(),
            category: Some("admin_fee".to_string()),
            formula: formula.to_string(),
            parameters: BTreeMap::from([("rate".to_string(), 2_000.0)]),
            priority: Some(priority),
            active: None,
            start_date: None,
            end_date: None,
        }
    }

    fn data(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect()
    }

    #[test]
    fn invalid_formulas_are_rejected_on_write() {
        let service = service();
        let admin = Actor::admin(1);
        let err = service
            .create(&schema(), &admin, rule("Cuota", "area * (rate", 1))
            .expect_err("unbalanced");
        assert!(matches!(err, ServiceError::Validation(_)));

        let stored = service
            .create(&schema(), &admin, rule("Cuota", "area * rate", 1))
            .expect("created");
        assert_eq!(stored.category, "ADMIN_FEE");
        let err = service
            .update(
                &schema(),
                &admin,
                stored.id,
                InvoiceRuleUpdate {
                    formula: Some("area *".to_string()),
                    ..InvoiceRuleUpdate::default()
                },
            )
            .expect_err("truncated");
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(
            service.get(&schema(), &admin, stored.id).expect("rule").formula,
            "area * rate"
        );
    }

    #[test]
    fn input_overrides_rule_parameters() {
        let service = service();
        let admin = Actor::admin(1);
        let stored = service
            .create(&schema(), &admin, rule("Cuota", "area * rate", 1))
            .expect("created");
        let evaluation = service
            .evaluate(&schema(), &admin, stored.id, &data(&[("area", 50.0)]))
            .expect("evaluated");
        assert_eq!(evaluation.result, Some(100_000.0));

        let evaluation = service
            .evaluate(
                &schema(),
                &admin,
                stored.id,
                &data(&[("area", 50.0), ("rate", 1_000.0)]),
            )
            .expect("evaluated");
        assert_eq!(evaluation.result, Some(50_000.0));

        let evaluation = service
            .evaluate(&schema(), &admin, stored.id, &BTreeMap::new())
            .expect("evaluated");
        assert!(!evaluation.success);
        assert_eq!(evaluation.error.as_deref(), Some("unknown variable 'area'"));
    }

    #[test]
    fn inactive_rules_report_instead_of_evaluating() {
        let service = service();
        let admin = Actor::admin(1);
        let stored = service
            .create(&schema(), &admin, rule("Cuota", "rate", 1))
            .expect("created");
        let toggled = service
            .toggle_active(&schema(), &admin, stored.id, None)
            .expect("toggled");
        assert!(!toggled.active);
        let evaluation = service
            .evaluate(&schema(), &admin, stored.id, &BTreeMap::new())
            .expect("evaluated");
        assert!(!evaluation.success);
        assert_eq!(evaluation.error.as_deref(), Some("rule is inactive"));
    }

    #[test]
    fn apply_keeps_the_last_successful_result() {
        let service = service();
        let admin = Actor::admin(1);
        service
            .create(&schema(), &admin, rule("Base", "area * rate", 10))
            .expect("base");
        service
            .create(&schema(), &admin, rule("Mínimo", "max(area * rate, 150000)", 20))
            .expect("minimum");
        service
            .create(&schema(), &admin, rule("Roto", "area / discount", 30))
            .expect("broken");
        let mut expired = rule("Vencida", "1", 5);
        expired.start_date = Some(Utc::now() - Duration::days(30));
        expired.end_date = Some(Utc::now() - Duration::days(1));
        service
            .create(&schema(), &admin, expired)
            .expect("expired");

        let applied = service
            .apply(&schema(), &admin, "Admin_Fee", &data(&[("area", 60.0)]))
            .expect("applied");
        let names: Vec<_> = applied
            .results
            .iter()
            .map(|result| result.rule_name.as_str())
            .collect();
        assert_eq!(names, vec!["Base", "Mínimo", "Roto"]);
        assert!(!applied.results[2].success);
        assert_eq!(applied.final_result, Some(150_000.0));

        let empty = service
            .apply(&schema(), &admin, "WATER", &BTreeMap::new())
            .expect("applied");
        assert!(empty.results.is_empty());
        assert_eq!(empty.final_result, None);
    }

    #[test]
    fn residents_cannot_manage_rules() {
        let service = service();
        let err = service
            .create(&schema(), &Actor::resident(10), rule("Cuota", "rate", 1))
            .expect_err("resident");
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }
}
