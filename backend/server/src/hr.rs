use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    store::Record,
    utils::{money, normalize, optional_text, require_non_negative, require_text},
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Employee {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub position: String,
    pub department: String,
    pub salary: f64,
    pub hired_at: NaiveDate,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Record for Employee {
    const COLLECTION: &'static str = "employees";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmployeeInput {
    pub name: String,
    pub email: Option<String>,
    pub position: String,
    pub department: String,
    pub salary: f64,
    pub hired_at: NaiveDate,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Employee {
    pub fn create(input: EmployeeInput) -> Result<Self, AppError> {
        let mut employee = Self {
            id: Uuid::new_v4(),
            name: String::new(),
            email: None,
            position: String::new(),
            department: String::new(),
            salary: 0.0,
            hired_at: input.hired_at,
            active: true,
            created_at: Utc::now(),
        };

        employee.apply(input)?;

        Ok(employee)
    }

    pub fn apply(&mut self, input: EmployeeInput) -> Result<(), AppError> {
        self.name = require_text("name", &input.name)?;
        self.position = require_text("position", &input.position)?;
        self.department = require_text("department", &input.department)?;
        self.salary = money(require_non_negative("salary", input.salary)?);
        self.email = optional_text(input.email).map(|e| e.to_lowercase());
        self.hired_at = input.hired_at;
        self.active = input.active;

        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EmployeeFilter {
    pub department: Option<String>,
    pub active: Option<bool>,
}

impl EmployeeFilter {
    pub fn matches(&self, employee: &Employee) -> bool {
        self.active.is_none_or(|active| active == employee.active)
            && self
                .department
                .as_deref()
                .is_none_or(|department| normalize(department) == normalize(&employee.department))
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RosterSummary {
    pub headcount: usize,
    pub payroll: f64,
    pub by_department: BTreeMap<String, usize>,
}

/// Only active employees count towards headcount and payroll.
pub fn summarize<'a>(employees: impl IntoIterator<Item = &'a Employee>) -> RosterSummary {
    let mut summary = RosterSummary {
        headcount: 0,
        payroll: 0.0,
        by_department: BTreeMap::new(),
    };

    for employee in employees.into_iter().filter(|e| e.active) {
        summary.headcount += 1;
        summary.payroll += employee.salary;
        *summary
            .by_department
            .entry(employee.department.clone())
            .or_default() += 1;
    }

    summary.payroll = money(summary.payroll);
    summary
}
