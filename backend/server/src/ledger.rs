use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    store::Record,
    utils::{money, normalize, optional_text, require_number, require_text},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn label(self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub kind: TransactionKind,
    pub category: String,
    pub description: Option<String>,
    pub amount: f64,
    pub date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub paid: bool,
    pub client_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Record for Transaction {
    const COLLECTION: &'static str = "transactions";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct TransactionInput {
    pub kind: TransactionKind,
    pub category: String,
    pub description: Option<String>,
    pub amount: f64,
    pub date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    #[serde(default = "default_paid")]
    pub paid: bool,
    pub client_id: Option<Uuid>,
}

fn default_paid() -> bool {
    true
}

impl Transaction {
    pub fn create(input: TransactionInput) -> Result<Self, AppError> {
        let mut transaction = Self {
            id: Uuid::new_v4(),
            kind: input.kind,
            category: String::new(),
            description: None,
            amount: 0.0,
            date: input.date,
            due_date: None,
            paid: true,
            client_id: None,
            created_at: Utc::now(),
        };

        transaction.apply(input)?;

        Ok(transaction)
    }

    pub fn apply(&mut self, input: TransactionInput) -> Result<(), AppError> {
        if require_number("amount", input.amount)? <= 0.0 {
            return Err(AppError::validation("amount must be greater than zero"));
        }

        self.kind = input.kind;
        self.category = require_text("category", &input.category)?;
        self.description = optional_text(input.description);
        self.amount = money(input.amount);
        self.date = input.date;
        self.due_date = input.due_date;
        self.paid = input.paid;
        self.client_id = input.client_id;

        Ok(())
    }

}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub kind: Option<TransactionKind>,
    pub category: Option<String>,
}

impl TransactionFilter {
    pub fn matches(&self, transaction: &Transaction) -> bool {
        self.from.is_none_or(|from| transaction.date >= from)
            && self.to.is_none_or(|to| transaction.date <= to)
            && self.kind.is_none_or(|kind| kind == transaction.kind)
            && self
                .category
                .as_deref()
                .is_none_or(|category| normalize(category) == normalize(&transaction.category))
    }
}

/// Newest first, ties broken by creation time.
pub fn sort_newest_first(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
}

#[derive(Debug, Serialize, PartialEq)]
pub struct CategoryTotal {
    pub kind: TransactionKind,
    pub category: String,
    pub total: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct LedgerSummary {
    pub income: f64,
    pub expense: f64,
    pub balance: f64,
    pub receivables: f64,
    pub payables: f64,
    pub by_category: Vec<CategoryTotal>,
}

pub fn summarize<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> LedgerSummary {
    let mut income = 0.0;
    let mut expense = 0.0;
    let mut receivables = 0.0;
    let mut payables = 0.0;
    let mut categories: BTreeMap<(TransactionKind, String), f64> = BTreeMap::new();

    for transaction in transactions {
        match (transaction.kind, transaction.paid) {
            (TransactionKind::Income, paid) => {
                income += transaction.amount;
                if !paid {
                    receivables += transaction.amount;
                }
            }
            (TransactionKind::Expense, paid) => {
                expense += transaction.amount;
                if !paid {
                    payables += transaction.amount;
                }
            }
        }

        *categories
            .entry((transaction.kind, transaction.category.clone()))
            .or_default() += transaction.amount;
    }

    LedgerSummary {
        income: money(income),
        expense: money(expense),
        balance: money(income - expense),
        receivables: money(receivables),
        payables: money(payables),
        by_category: categories
            .into_iter()
            .map(|((kind, category), total)| CategoryTotal {
                kind,
                category,
                total: money(total),
            })
            .collect(),
    }
}
