//! # Rules
//!
//! Threshold rules checked against every record a tenant writes.
//!
//! ## Matching
//!
//! - A rule watches one entity kind and one field, addressed by a dotted path into the record's JSON
//! - Numeric thresholds compare as `f64`, numeric strings in the record are parsed first
//! - Text thresholds compare trimmed and case-insensitive, `gt`/`lt` are lexicographic so ISO dates work
//! - A text threshold that parses as a number compares by value against numeric fields
//! - `contains` is a case-insensitive substring test on text fields
//! - Missing, null or mistyped fields never match
//!
//! ## Evaluation
//!
//! - Runs synchronously right after the write, active rules in creation order
//! - Every match stores one [`Alert`]
//! - A failing evaluation is logged and never undoes the write
use std::{cmp::Ordering, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};
use uuid::Uuid;

use crate::{error::AppError, state::AppState, store::Record, utils::normalize};

const FLOAT_TOLERANCE: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleEntity {
    Client,
    Transaction,
    Card,
    Employee,
    KpiEntry,
}

impl RuleEntity {
    pub fn label(self) -> &'static str {
        match self {
            RuleEntity::Client => "client",
            RuleEntity::Transaction => "transaction",
            RuleEntity::Card => "card",
            RuleEntity::Employee => "employee",
            RuleEntity::KpiEntry => "kpi_entry",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Neq,
    Contains,
}

impl Operator {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Gte => ordering != Ordering::Less,
            Operator::Lt => ordering == Ordering::Less,
            Operator::Lte => ordering != Ordering::Greater,
            Operator::Eq => ordering == Ordering::Equal,
            Operator::Neq => ordering != Ordering::Equal,
            Operator::Contains => false,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Contains => "contains",
        };

        f.write_str(symbol)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Threshold {
    Number(f64),
    Text(String),
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threshold::Number(n) => write!(f, "{n}"),
            Threshold::Text(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    #[default]
    Warning,
    Critical,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rule {
    pub id: Uuid,
    pub name: String,
    pub entity: RuleEntity,
    pub field: String,
    pub operator: Operator,
    pub threshold: Threshold,
    pub severity: Severity,
    pub message: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Record for Rule {
    const COLLECTION: &'static str = "rules";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Rule {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("name is required"));
        }

        if self.field.trim().is_empty() || self.field.split('.').any(str::is_empty) {
            return Err(AppError::validation("field must be a dotted path"));
        }

        match (&self.operator, &self.threshold) {
            (Operator::Contains, Threshold::Number(_)) => Err(AppError::validation(
                "contains needs a text threshold",
            )),
            (_, Threshold::Number(n)) if !n.is_finite() => {
                Err(AppError::validation("threshold must be finite"))
            }
            _ => Ok(()),
        }
    }

    /// Returns the record's field value when the rule matches.
    pub fn matches<'a>(&self, record: &'a Value) -> Option<&'a Value> {
        let value = lookup(record, &self.field)?;

        let matched = match &self.threshold {
            Threshold::Number(threshold) => as_number(value)
                .and_then(|number| number_ordering(number, *threshold))
                .is_some_and(|ordering| self.operator.accepts(ordering)),
            Threshold::Text(threshold) => match (self.operator, as_number(value), parse_number(threshold)) {
                // Numeric text compares by value, stored floats render as `15000.0`.
                (operator, Some(number), Some(threshold)) if operator != Operator::Contains => {
                    number_ordering(number, threshold).is_some_and(|ordering| operator.accepts(ordering))
                }
                _ => as_text(value).is_some_and(|text| {
                    let (text, threshold) = (normalize(&text), normalize(threshold));

                    match self.operator {
                        Operator::Contains => text.contains(&threshold),
                        operator => operator.accepts(text.cmp(&threshold)),
                    }
                }),
            },
        };

        matched.then_some(value)
    }

    pub fn alert_message(&self, value: &Value) -> String {
        if let Some(message) = self.message.as_deref().filter(|m| !m.trim().is_empty()) {
            return message.trim().to_string();
        }

        let shown = as_text(value).unwrap_or_else(|| value.to_string());

        format!(
            "{}: {} {} {} (value {})",
            self.name, self.field, self.operator, self.threshold, shown
        )
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RuleInput {
    pub name: String,
    pub entity: RuleEntity,
    pub field: String,
    pub operator: Operator,
    pub threshold: Threshold,
    #[serde(default)]
    pub severity: Severity,
    pub message: Option<String>,
    #[serde(default = "enabled")]
    pub active: bool,
}

fn enabled() -> bool {
    true
}

impl Rule {
    pub fn create(input: RuleInput) -> Result<Self, AppError> {
        Self::build(Uuid::new_v4(), Utc::now(), input)
    }

    /// Replaces the rule's definition, keeping its id and creation order.
    pub fn apply(&mut self, input: RuleInput) -> Result<(), AppError> {
        *self = Self::build(self.id, self.created_at, input)?;

        Ok(())
    }

    fn build(id: Uuid, created_at: DateTime<Utc>, input: RuleInput) -> Result<Self, AppError> {
        let rule = Self {
            id,
            name: input.name.trim().to_string(),
            entity: input.entity,
            field: input.field.trim().to_string(),
            operator: input.operator,
            threshold: input.threshold,
            severity: input.severity,
            message: input.message.filter(|m| !m.trim().is_empty()),
            active: input.active,
            created_at,
        };

        rule.validate()?;

        Ok(rule)
    }

    /// Dry run against an arbitrary record, nothing is stored.
    pub fn test(&self, record: &Value) -> RuleTestResult {
        let value = self.matches(record).cloned();

        RuleTestResult {
            matched: value.is_some(),
            value,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RuleTest {
    pub record: Value,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RuleTestResult {
    pub matched: bool,
    pub value: Option<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub rule_name: String,
    pub entity: RuleEntity,
    pub record_id: Uuid,
    pub severity: Severity,
    pub message: String,
    pub value: Value,
    pub created_at: DateTime<Utc>,
    pub acknowledged: bool,
}

impl Record for Alert {
    const COLLECTION: &'static str = "alerts";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertFilter {
    pub acknowledged: Option<bool>,
    pub severity: Option<Severity>,
}

impl AlertFilter {
    pub fn matches(&self, alert: &Alert) -> bool {
        self.acknowledged.is_none_or(|ack| ack == alert.acknowledged)
            && self.severity.is_none_or(|severity| severity == alert.severity)
    }
}

/// Newest first, ties broken by id.
pub fn sort_alerts(alerts: &mut [Alert]) {
    alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

/// Resolves a dotted path such as `address.city` or `items.0.score`.
pub fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(record, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
        .filter(|value| !value.is_null())
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn number_ordering(value: f64, threshold: f64) -> Option<Ordering> {
    if (value - threshold).abs() < FLOAT_TOLERANCE {
        Some(Ordering::Equal)
    } else {
        value.partial_cmp(&threshold)
    }
}

/// Checks written records against a tenant's rules and stores the resulting alerts.
pub struct RulesService<'a> {
    state: &'a AppState,
    tenant_id: Uuid,
}

impl<'a> RulesService<'a> {
    pub fn new(state: &'a AppState, tenant_id: Uuid) -> Self {
        Self { state, tenant_id }
    }

    pub async fn evaluate<T: Serialize>(
        &self,
        entity: RuleEntity,
        record_id: Uuid,
        record: &T,
    ) -> Result<Vec<Alert>, AppError> {
        let mut rules: Vec<Rule> = self
            .state
            .tenant_repo::<Rule>(self.tenant_id)
            .list()
            .await?
            .into_iter()
            .filter(|rule| rule.active && rule.entity == entity)
            .collect();

        if rules.is_empty() {
            return Ok(Vec::new());
        }

        rules.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let record = serde_json::to_value(record).map_err(AppError::internal)?;
        let alerts_repo = self.state.tenant_repo::<Alert>(self.tenant_id);
        let mut alerts = Vec::new();

        for rule in &rules {
            let Some(value) = rule.matches(&record) else {
                #[cfg(feature = "verbose")]
                info!("Rule {} did not match {} {record_id}", rule.name, entity.label());

                continue;
            };

            let alert = Alert {
                id: Uuid::new_v4(),
                rule_id: rule.id,
                rule_name: rule.name.clone(),
                entity,
                record_id,
                severity: rule.severity,
                message: rule.alert_message(value),
                value: value.clone(),
                created_at: Utc::now(),
                acknowledged: false,
            };

            alerts_repo.put(&alert).await?;

            info!(
                tenant = %self.tenant_id,
                rule = %rule.id,
                record = %record_id,
                "Alert raised: {}",
                alert.message
            );

            alerts.push(alert);
        }

        Ok(alerts)
    }

    /// Runs [`RulesService::evaluate`] after a write, logging failures instead of returning them.
    pub async fn evaluate_after_write<T: Serialize>(
        &self,
        entity: RuleEntity,
        record_id: Uuid,
        record: &T,
    ) -> Vec<Alert> {
        self.evaluate(entity, record_id, record)
            .await
            .unwrap_or_else(|e| {
                error!(
                    tenant = %self.tenant_id,
                    entity = entity.label(),
                    "Rule evaluation failed: {e}"
                );
                Vec::new()
            })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn rule(field: &str, operator: Operator, threshold: Threshold) -> Rule {
        Rule {
            id: Uuid::new_v4(),
            name: "Despesa alta".into(),
            entity: RuleEntity::Transaction,
            field: field.into(),
            operator,
            threshold,
            severity: Severity::Warning,
            message: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_numeric_operators() {
        let record = json!({ "amount": 15000.0 });
        let cases = [
            (Operator::Gt, 10000.0, true),
            (Operator::Gt, 15000.0, false),
            (Operator::Gte, 15000.0, true),
            (Operator::Lt, 20000.0, true),
            (Operator::Lte, 14999.99, false),
            (Operator::Eq, 15000.0, true),
            (Operator::Neq, 15000.0, false),
            (Operator::Neq, 1.0, true),
        ];

        for (operator, threshold, expected) in cases {
            let r = rule("amount", operator, Threshold::Number(threshold));
            assert_eq!(
                r.matches(&record).is_some(),
                expected,
                "amount {operator} {threshold}"
            );
        }
    }

    #[test]
    fn test_numeric_string_field_is_parsed() {
        let r = rule("value", Operator::Gt, Threshold::Number(100.0));

        assert!(r.matches(&json!({ "value": " 250.5 " })).is_some());
        assert!(r.matches(&json!({ "value": "n/a" })).is_none());
        assert!(r.matches(&json!({ "value": true })).is_none());
    }

    #[test]
    fn test_float_equality_tolerance() {
        let r = rule("total", Operator::Eq, Threshold::Number(0.3));

        assert!(r.matches(&json!({ "total": 0.1 + 0.2 })).is_some());
    }

    #[test]
    fn test_text_operators() {
        let record = json!({ "status": " Churned ", "category": "Aluguel Loja Centro" });

        let eq = rule("status", Operator::Eq, Threshold::Text("churned".into()));
        assert!(eq.matches(&record).is_some());

        let neq = rule("status", Operator::Neq, Threshold::Text("churned".into()));
        assert!(neq.matches(&record).is_none());

        let contains = rule("category", Operator::Contains, Threshold::Text("LOJA".into()));
        assert!(contains.matches(&record).is_some());
    }

    #[test]
    fn test_text_ordering_compares_iso_dates() {
        let r = rule("date", Operator::Lt, Threshold::Text("2024-06-01".into()));

        assert!(r.matches(&json!({ "date": "2024-05-31" })).is_some());
        assert!(r.matches(&json!({ "date": "2024-06-01" })).is_none());
    }

    #[test]
    fn test_booleans_compare_as_text() {
        let r = rule("paid", Operator::Eq, Threshold::Text("false".into()));

        assert!(r.matches(&json!({ "paid": false })).is_some());
        assert!(r.matches(&json!({ "paid": true })).is_none());
    }

    #[test]
    fn test_numeric_text_threshold_compares_by_value() {
        let eq = rule("amount", Operator::Eq, Threshold::Text("15000".into()));
        assert!(eq.matches(&json!({ "amount": 15000.0 })).is_some());
        assert!(eq.matches(&json!({ "amount": 15000 })).is_some());
        assert!(eq.matches(&json!({ "amount": "15000.00" })).is_some());

        let neq = rule("amount", Operator::Neq, Threshold::Text("15000".into()));
        assert!(neq.matches(&json!({ "amount": 15000.0 })).is_none());

        let gt = rule("amount", Operator::Gt, Threshold::Text("9000".into()));
        assert!(gt.matches(&json!({ "amount": 15000.0 })).is_some());
    }

    #[test]
    fn test_missing_and_null_fields_never_match() {
        let r = rule("amount", Operator::Neq, Threshold::Number(0.0));

        assert!(r.matches(&json!({})).is_none());
        assert!(r.matches(&json!({ "amount": null })).is_none());
    }

    #[test]
    fn test_nested_lookup() {
        let record = json!({ "address": { "city": "Curitiba" }, "items": [{ "score": 1 }] });

        assert_eq!(lookup(&record, "address.city"), Some(&json!("Curitiba")));
        assert_eq!(lookup(&record, "items.0.score"), Some(&json!(1)));
        assert_eq!(lookup(&record, "items.3.score"), None);
        assert_eq!(lookup(&record, "address.city.name"), None);
    }

    #[test]
    fn test_alert_message() {
        let r = rule("amount", Operator::Gt, Threshold::Number(10000.0));
        assert_eq!(
            r.alert_message(&json!(15000)),
            "Despesa alta: amount gt 10000 (value 15000)"
        );

        let custom = Rule {
            message: Some(" Verificar despesa ".into()),
            ..r
        };
        assert_eq!(custom.alert_message(&json!(15000)), "Verificar despesa");
    }

    #[test]
    fn test_validation() {
        assert!(rule("amount", Operator::Gt, Threshold::Number(1.0)).validate().is_ok());
        assert!(rule("", Operator::Gt, Threshold::Number(1.0)).validate().is_err());
        assert!(rule("a..b", Operator::Gt, Threshold::Number(1.0)).validate().is_err());
        assert!(
            rule("amount", Operator::Contains, Threshold::Number(1.0))
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_threshold_deserializes_untagged() {
        let number: Threshold = serde_json::from_value(json!(10)).unwrap();
        let text: Threshold = serde_json::from_value(json!("churned")).unwrap();

        assert_eq!(number, Threshold::Number(10.0));
        assert_eq!(text, Threshold::Text("churned".into()));
    }

    #[test]
    fn test_rule_input_defaults() {
        let input: RuleInput = serde_json::from_value(json!({
            "name": " Cliente perdido ",
            "entity": "client",
            "field": "status",
            "operator": "eq",
            "threshold": "churned",
        }))
        .unwrap();

        let created = Rule::create(input).unwrap();

        assert_eq!(created.name, "Cliente perdido");
        assert_eq!(created.severity, Severity::Warning);
        assert!(created.active);
        assert_eq!(
            created.test(&json!({ "status": "Churned" })),
            RuleTestResult {
                matched: true,
                value: Some(json!("Churned")),
            }
        );
    }

    #[test]
    fn test_apply_keeps_identity() {
        let mut r = rule("amount", Operator::Gt, Threshold::Number(1.0));
        let (id, created_at) = (r.id, r.created_at);

        let input: RuleInput = serde_json::from_value(json!({
            "name": "Receita baixa",
            "entity": "transaction",
            "field": "amount",
            "operator": "lt",
            "threshold": 50,
            "severity": "critical",
            "active": false,
        }))
        .unwrap();
        r.apply(input).unwrap();

        assert_eq!((r.id, r.created_at), (id, created_at));
        assert_eq!(r.operator, Operator::Lt);
        assert!(!r.active);
        assert!(!r.test(&json!({ "amount": 80 })).matched);
    }
}
