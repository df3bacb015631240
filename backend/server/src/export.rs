use std::str::FromStr;

use csv::WriterBuilder;
use serde::Serialize;

use crate::{
    clients::Client, error::AppError, hr::Employee, ledger::Transaction, rules::Alert,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportResource {
    Clients,
    Transactions,
    Employees,
    Alerts,
}

impl ExportResource {
    pub fn file_name(self) -> &'static str {
        match self {
            ExportResource::Clients => "clients.csv",
            ExportResource::Transactions => "transactions.csv",
            ExportResource::Employees => "employees.csv",
            ExportResource::Alerts => "alerts.csv",
        }
    }
}

impl FromStr for ExportResource {
    type Err = AppError;

    /// Accepts the resource name with or without a `.csv` suffix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_end_matches(".csv") {
            "clients" => Ok(ExportResource::Clients),
            "transactions" => Ok(ExportResource::Transactions),
            "employees" => Ok(ExportResource::Employees),
            "alerts" => Ok(ExportResource::Alerts),
            _ => Err(AppError::NotFound),
        }
    }
}

/// A flat CSV row. The header is written even when there are no rows.
trait CsvRow: Serialize {
    const HEADERS: &'static [&'static str];
}

#[derive(Serialize)]
struct ClientRow<'a> {
    id: String,
    name: &'a str,
    company: &'a str,
    email: &'a str,
    phone: &'a str,
    segment: &'a str,
    status: &'static str,
    monthly_value: f64,
    created_at: String,
}

impl CsvRow for ClientRow<'_> {
    const HEADERS: &'static [&'static str] = &[
        "id",
        "name",
        "company",
        "email",
        "phone",
        "segment",
        "status",
        "monthly_value",
        "created_at",
    ];
}

impl<'a> From<&'a Client> for ClientRow<'a> {
    fn from(client: &'a Client) -> Self {
        Self {
            id: client.id.to_string(),
            name: &client.name,
            company: client.company.as_deref().unwrap_or_default(),
            email: client.email.as_deref().unwrap_or_default(),
            phone: client.phone.as_deref().unwrap_or_default(),
            segment: client.segment.as_deref().unwrap_or_default(),
            status: client.status.label(),
            monthly_value: client.monthly_value,
            created_at: client.created_at.format("%Y-%m-%d").to_string(),
        }
    }
}

#[derive(Serialize)]
struct TransactionRow<'a> {
    id: String,
    date: String,
    kind: &'static str,
    category: &'a str,
    description: &'a str,
    amount: f64,
    paid: bool,
    due_date: String,
}

impl CsvRow for TransactionRow<'_> {
    const HEADERS: &'static [&'static str] = &[
        "id",
        "date",
        "kind",
        "category",
        "description",
        "amount",
        "paid",
        "due_date",
    ];
}

impl<'a> From<&'a Transaction> for TransactionRow<'a> {
    fn from(transaction: &'a Transaction) -> Self {
        Self {
            id: transaction.id.to_string(),
            date: transaction.date.to_string(),
            kind: transaction.kind.label(),
            category: &transaction.category,
            description: transaction.description.as_deref().unwrap_or_default(),
            amount: transaction.amount,
            paid: transaction.paid,
            due_date: transaction
                .due_date
                .map(|d| d.to_string())
                .unwrap_or_default(),
        }
    }
}

#[derive(Serialize)]
struct EmployeeRow<'a> {
    id: String,
    name: &'a str,
    email: &'a str,
    position: &'a str,
    department: &'a str,
    salary: f64,
    hired_at: String,
    active: bool,
}

impl CsvRow for EmployeeRow<'_> {
    const HEADERS: &'static [&'static str] = &[
        "id",
        "name",
        "email",
        "position",
        "department",
        "salary",
        "hired_at",
        "active",
    ];
}

impl<'a> From<&'a Employee> for EmployeeRow<'a> {
    fn from(employee: &'a Employee) -> Self {
        Self {
            id: employee.id.to_string(),
            name: &employee.name,
            email: employee.email.as_deref().unwrap_or_default(),
            position: &employee.position,
            department: &employee.department,
            salary: employee.salary,
            hired_at: employee.hired_at.to_string(),
            active: employee.active,
        }
    }
}

#[derive(Serialize)]
struct AlertRow<'a> {
    id: String,
    created_at: String,
    rule: &'a str,
    entity: &'static str,
    record_id: String,
    severity: &'static str,
    message: &'a str,
    acknowledged: bool,
}

impl CsvRow for AlertRow<'_> {
    const HEADERS: &'static [&'static str] = &[
        "id",
        "created_at",
        "rule",
        "entity",
        "record_id",
        "severity",
        "message",
        "acknowledged",
    ];
}

impl<'a> From<&'a Alert> for AlertRow<'a> {
    fn from(alert: &'a Alert) -> Self {
        Self {
            id: alert.id.to_string(),
            created_at: alert.created_at.to_rfc3339(),
            rule: &alert.rule_name,
            entity: alert.entity.label(),
            record_id: alert.record_id.to_string(),
            severity: alert.severity.label(),
            message: &alert.message,
            acknowledged: alert.acknowledged,
        }
    }
}

fn write_rows<'a, R, T>(records: &'a [T]) -> Result<Vec<u8>, AppError>
where
    R: CsvRow + From<&'a T>,
{
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(R::HEADERS).map_err(AppError::internal)?;

    for record in records {
        writer.serialize(R::from(record)).map_err(AppError::internal)?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::InternalError(e.to_string().into()))
}

pub fn clients_csv(clients: &[Client]) -> Result<Vec<u8>, AppError> {
    write_rows::<ClientRow, _>(clients)
}

pub fn transactions_csv(transactions: &[Transaction]) -> Result<Vec<u8>, AppError> {
    write_rows::<TransactionRow, _>(transactions)
}

pub fn employees_csv(employees: &[Employee]) -> Result<Vec<u8>, AppError> {
    write_rows::<EmployeeRow, _>(employees)
}

pub fn alerts_csv(alerts: &[Alert]) -> Result<Vec<u8>, AppError> {
    write_rows::<AlertRow, _>(alerts)
}
