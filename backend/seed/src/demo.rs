//! Sample records, deterministic so two seeded tenants look alike.
use chrono::{Datelike, Days, Months, NaiveDate};
use serde_json::{Value, json};

const FIRST_NAMES: [&str; 8] = [
    "Ana", "Bruno", "Carla", "Diego", "Elisa", "Fábio", "Gabriela", "Heitor",
];
const LAST_NAMES: [&str; 6] = ["Silva", "Souza", "Oliveira", "Costa", "Pereira", "Lima"];
const SEGMENTS: [&str; 4] = ["Varejo", "Serviços", "Indústria", "Alimentação"];
const STATUSES: [&str; 4] = ["lead", "prospect", "active", "active"];

pub const SALES_STAGES: [&str; 4] = ["Prospecção", "Proposta", "Negociação", "Fechado"];

pub fn person(index: usize) -> String {
    format!(
        "{} {}",
        FIRST_NAMES[index % FIRST_NAMES.len()],
        LAST_NAMES[(index / FIRST_NAMES.len() + index) % LAST_NAMES.len()]
    )
}

pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = date.with_day(1).unwrap_or(date);
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.checked_sub_days(Days::new(1)))
        .unwrap_or(date);

    (first, last)
}

pub fn clients(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            let name = person(i);

            json!({
                "name": name,
                "email": format!("{}{i}@exemplo.com.br", name.split(' ').next().unwrap_or("cliente").to_lowercase()),
                "company": format!("{} {}", LAST_NAMES[i % LAST_NAMES.len()], SEGMENTS[i % SEGMENTS.len()]),
                "segment": SEGMENTS[i % SEGMENTS.len()],
                "status": STATUSES[i % STATUSES.len()],
                "monthly_value": 300.0 + (i % 7) as f64 * 150.0,
            })
        })
        .collect()
}

pub fn sales_flow() -> Value {
    json!({ "name": "Vendas", "stages": SALES_STAGES })
}

pub fn cards(client_ids: &[String]) -> Vec<Value> {
    client_ids
        .iter()
        .take(8)
        .enumerate()
        .map(|(i, client_id)| {
            json!({
                "title": format!("Proposta #{}", i + 1),
                "stage": SALES_STAGES[i % SALES_STAGES.len()],
                "client_id": client_id,
                "value": 1500.0 + i as f64 * 500.0,
            })
        })
        .collect()
}

/// One month of income and expenses up to `today`, a few left unpaid.
pub fn transactions(today: NaiveDate) -> Vec<Value> {
    let (first, _) = month_bounds(today);
    let mut entries = Vec::new();

    for day in 0..today.day0() + 1 {
        let date = first + Days::new(u64::from(day));

        if day % 2 == 0 {
            entries.push(json!({
                "kind": "income",
                "category": "Vendas",
                "description": format!("Vendas do dia {}", date.format("%d/%m")),
                "amount": 800.0 + f64::from(day % 5) * 220.0,
                "date": date,
                "paid": day % 6 != 0,
            }));
        }

        if day % 7 == 3 {
            entries.push(json!({
                "kind": "expense",
                "category": "Fornecedores",
                "amount": 1200.0 + f64::from(day) * 40.0,
                "date": date,
                "paid": true,
            }));
        }
    }

    entries.push(json!({
        "kind": "expense",
        "category": "Aluguel",
        "description": "Aluguel da loja",
        "amount": 3500.0,
        "date": first,
        "paid": true,
    }));

    entries
}

pub fn employees(hired_at: NaiveDate) -> Vec<Value> {
    [
        ("Vendedor", "Comercial", 2800.0),
        ("Vendedor", "Comercial", 2600.0),
        ("Analista financeiro", "Financeiro", 4200.0),
        ("Gerente de operações", "Operações", 6500.0),
        ("Assistente", "Operações", 2100.0),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (position, department, salary))| {
        json!({
            "name": person(i + 3),
            "position": position,
            "department": department,
            "salary": salary,
            "hired_at": hired_at,
        })
    })
    .collect()
}

pub fn kpi() -> Value {
    json!({
        "name": "Ticket médio",
        "unit": "R$",
        "target": 250.0,
        "direction": "higher_is_better",
    })
}

pub fn kpi_entries(today: NaiveDate) -> Vec<Value> {
    (0..4u64)
        .rev()
        .map(|weeks_ago| {
            json!({
                "value": 210.0 + (4 - weeks_ago) as f64 * 15.0,
                "date": today - Days::new(weeks_ago * 7),
            })
        })
        .collect()
}

pub fn audit(date: NaiveDate) -> Value {
    json!({
        "area": "Financeiro",
        "date": date,
        "items": [
            { "question": "Fluxo de caixa é projetado mensalmente?", "score": 3 },
            { "question": "Contas a pagar têm aprovação?", "score": 4 },
            { "question": "Existe conciliação bancária semanal?", "score": 2 },
        ],
    })
}

pub fn revenue_goal(today: NaiveDate) -> Value {
    let (first, last) = month_bounds(today);

    json!({
        "title": "Crescer o faturamento",
        "period_start": first,
        "period_end": last,
        "key_results": [
            {
                "title": "Faturar R$ 30.000 no mês",
                "metric": { "kind": "revenue" },
                "target_value": 30000.0,
            },
            {
                "title": "Fechar 15 clientes ativos",
                "metric": { "kind": "active_clients" },
                "target_value": 15.0,
            },
        ],
    })
}

pub fn large_expense_rule() -> Value {
    json!({
        "name": "Despesa alta",
        "entity": "transaction",
        "field": "amount",
        "operator": "gt",
        "threshold": 3000,
        "severity": "critical",
    })
}
