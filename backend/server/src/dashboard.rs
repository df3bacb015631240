//! # Dashboard
//!
//! Monthly numbers for the landing page of the React client. Everything is computed from a
//! [`TenantSnapshot`] on request, nothing is cached.
use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    audits,
    clients::ClientStatus,
    hr,
    kpis::{self, KpiStatus},
    ledger::{Transaction, TransactionKind},
    rules::Severity,
    snapshot::TenantSnapshot,
    utils::{Month, money, round_to},
};

pub const DEFAULT_CASHFLOW_MONTHS: u32 = 6;
pub const MAX_CASHFLOW_MONTHS: u32 = 24;

#[derive(Debug, Serialize, PartialEq)]
pub struct Finance {
    pub revenue: f64,
    pub expenses: f64,
    pub profit: f64,
    pub margin: f64,
    pub receivables: f64,
    pub payables: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ClientsOverview {
    pub by_status: BTreeMap<&'static str, usize>,
    pub total: usize,
    pub monthly_recurring: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct StageTotals {
    pub stage: String,
    pub cards: usize,
    pub value: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct FlowPipeline {
    pub flow_id: Uuid,
    pub name: String,
    pub stages: Vec<StageTotals>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Team {
    pub headcount: usize,
    pub payroll: f64,
}

#[derive(Debug, Default, Serialize, PartialEq)]
pub struct KpiCounts {
    pub on_track: usize,
    pub off_track: usize,
    pub no_data: usize,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Maturity {
    pub average: f64,
    pub areas: usize,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct GoalsOverview {
    pub count: usize,
    pub average_progress: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct AlertsOverview {
    pub open: usize,
    pub critical: usize,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Dashboard {
    pub month: String,
    pub finance: Finance,
    pub clients: ClientsOverview,
    pub pipeline: Vec<FlowPipeline>,
    pub team: Team,
    pub kpis: KpiCounts,
    pub maturity: Maturity,
    pub goals: GoalsOverview,
    pub alerts: AlertsOverview,
}

fn paid_in(transactions: &[Transaction], month: &Month, kind: TransactionKind) -> f64 {
    transactions
        .iter()
        .filter(|t| t.kind == kind && t.paid && month.contains(t.date))
        .map(|t| t.amount)
        .sum()
}

fn unpaid(transactions: &[Transaction], kind: TransactionKind) -> f64 {
    money(
        transactions
            .iter()
            .filter(|t| t.kind == kind && !t.paid)
            .map(|t| t.amount)
            .sum(),
    )
}

pub fn finance(transactions: &[Transaction], month: &Month) -> Finance {
    let revenue = money(paid_in(transactions, month, TransactionKind::Income));
    let expenses = money(paid_in(transactions, month, TransactionKind::Expense));
    let profit = money(revenue - expenses);

    Finance {
        revenue,
        expenses,
        profit,
        margin: if revenue > 0.0 {
            round_to(profit / revenue * 100.0, 1)
        } else {
            0.0
        },
        receivables: unpaid(transactions, TransactionKind::Income),
        payables: unpaid(transactions, TransactionKind::Expense),
    }
}

pub fn build(data: &TenantSnapshot, month: Month) -> Dashboard {
    let mut by_status: BTreeMap<&'static str, usize> = ClientStatus::ALL
        .iter()
        .map(|status| (status.label(), 0))
        .collect();
    for client in &data.clients {
        *by_status.entry(client.status.label()).or_default() += 1;
    }

    let monthly_recurring = money(
        data.clients
            .iter()
            .filter(|c| c.status == ClientStatus::Active)
            .map(|c| c.monthly_value)
            .sum(),
    );

    let mut flows: Vec<_> = data.flows.iter().collect();
    flows.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let pipeline = flows
        .into_iter()
        .map(|flow| FlowPipeline {
            flow_id: flow.id,
            name: flow.name.clone(),
            stages: flow
                .stages
                .iter()
                .map(|stage| {
                    let cards: Vec<_> = data
                        .cards
                        .iter()
                        .filter(|c| c.flow_id == flow.id && &c.stage == stage)
                        .collect();

                    StageTotals {
                        stage: stage.clone(),
                        cards: cards.len(),
                        value: money(cards.iter().map(|c| c.value).sum()),
                    }
                })
                .collect(),
        })
        .collect();

    let roster = hr::summarize(&data.employees);

    let mut kpi_counts = KpiCounts::default();
    for kpi in &data.kpis {
        match kpi.status(kpis::latest(kpi.id, &data.kpi_entries)) {
            KpiStatus::OnTrack => kpi_counts.on_track += 1,
            KpiStatus::OffTrack => kpi_counts.off_track += 1,
            KpiStatus::NoData => kpi_counts.no_data += 1,
        }
    }

    let maturity = audits::overview(&data.audits);

    let average_progress = if data.goals.is_empty() {
        0.0
    } else {
        round_to(
            data.goals.iter().map(|g| g.progress).sum::<f64>() / data.goals.len() as f64,
            1,
        )
    };

    let open_alerts: Vec<_> = data.alerts.iter().filter(|a| !a.acknowledged).collect();

    Dashboard {
        month: month.label(),
        finance: finance(&data.transactions, &month),
        clients: ClientsOverview {
            by_status,
            total: data.clients.len(),
            monthly_recurring,
        },
        pipeline,
        team: Team {
            headcount: roster.headcount,
            payroll: roster.payroll,
        },
        kpis: kpi_counts,
        maturity: Maturity {
            average: maturity.average,
            areas: maturity.areas.len(),
        },
        goals: GoalsOverview {
            count: data.goals.len(),
            average_progress,
        },
        alerts: AlertsOverview {
            open: open_alerts.len(),
            critical: open_alerts
                .iter()
                .filter(|a| a.severity == Severity::Critical)
                .count(),
        },
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct CashflowPoint {
    pub month: String,
    pub revenue: f64,
    pub expenses: f64,
    pub net: f64,
}

pub fn clamp_months(requested: Option<u32>) -> u32 {
    requested
        .unwrap_or(DEFAULT_CASHFLOW_MONTHS)
        .clamp(1, MAX_CASHFLOW_MONTHS)
}

/// Paid totals per month, oldest first, ending at `current`.
pub fn cashflow(transactions: &[Transaction], current: Month, months: u32) -> Vec<CashflowPoint> {
    (0..months)
        .rev()
        .map(|offset| {
            let month = current.previous(offset);
            let revenue = money(paid_in(transactions, &month, TransactionKind::Income));
            let expenses = money(paid_in(transactions, &month, TransactionKind::Expense));

            CashflowPoint {
                month: month.label(),
                revenue,
                expenses,
                net: money(revenue - expenses),
            }
        })
        .collect()
}
