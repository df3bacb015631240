use uuid::Uuid;

use crate::{
    audits::Audit,
    clients::Client,
    flows::{Card, Flow},
    goals::Goal,
    hr::Employee,
    kpis::{Kpi, KpiEntry},
    ledger::Transaction,
    rules::Alert,
    state::AppState,
    store::StoreError,
};

/// Every collection of one tenant, loaded for aggregation.
#[derive(Debug, Default)]
pub struct TenantSnapshot {
    pub clients: Vec<Client>,
    pub transactions: Vec<Transaction>,
    pub employees: Vec<Employee>,
    pub flows: Vec<Flow>,
    pub cards: Vec<Card>,
    pub kpis: Vec<Kpi>,
    pub kpi_entries: Vec<KpiEntry>,
    pub audits: Vec<Audit>,
    pub goals: Vec<Goal>,
    pub alerts: Vec<Alert>,
}

impl TenantSnapshot {
    pub async fn load(state: &AppState, tenant_id: Uuid) -> Result<Self, StoreError> {
        let client_repo = state.tenant_repo::<Client>(tenant_id);
        let transaction_repo = state.tenant_repo::<Transaction>(tenant_id);
        let employee_repo = state.tenant_repo::<Employee>(tenant_id);
        let flow_repo = state.tenant_repo::<Flow>(tenant_id);
        let card_repo = state.tenant_repo::<Card>(tenant_id);
        let kpi_repo = state.tenant_repo::<Kpi>(tenant_id);
        let entry_repo = state.tenant_repo::<KpiEntry>(tenant_id);
        let audit_repo = state.tenant_repo::<Audit>(tenant_id);
        let goal_repo = state.tenant_repo::<Goal>(tenant_id);
        let alert_repo = state.tenant_repo::<Alert>(tenant_id);

        let (clients, transactions, employees, flows, cards) = tokio::try_join!(
            client_repo.list(),
            transaction_repo.list(),
            employee_repo.list(),
            flow_repo.list(),
            card_repo.list(),
        )?;

        let (kpis, kpi_entries, audits, goals, alerts) = tokio::try_join!(
            kpi_repo.list(),
            entry_repo.list(),
            audit_repo.list(),
            goal_repo.list(),
            alert_repo.list(),
        )?;

        Ok(Self {
            clients,
            transactions,
            employees,
            flows,
            cards,
            kpis,
            kpi_entries,
            audits,
            goals,
            alerts,
        })
    }
}
