use std::cmp::Ordering;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::{Collection, LoadStatus, Lifecycle, Origin, Ticket};
use crate::api::ApiClient;
use crate::error::ClientError;
use crate::models::{CategoryDto, CreateTxnReq, Money, TransactionDto, TxnKind, TxnQuery};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Date,
    Amount,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn flip(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Client-side projection settings. Never touches the stored list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxnFilter {
    pub search: String,
    pub kind: Option<TxnKind>,
    pub sort: SortKey,
    pub order: SortOrder,
}

impl TxnFilter {
    fn matches(&self, txn: &TransactionDto) -> bool {
        if self.kind.is_some_and(|kind| kind != txn.r#type) {
            return false;
        }
        let needle = self.search.trim().to_lowercase();
        needle.is_empty()
            || txn
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle))
    }

    fn compare(&self, a: &TransactionDto, b: &TransactionDto) -> Ordering {
        let ord = match self.sort {
            SortKey::Date => a.date.cmp(&b.date),
            SortKey::Amount => a.amount.cmp(&b.amount),
        };
        match self.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    }
}

/// Result of one load: both collections or nothing.
#[derive(Debug, Clone)]
pub struct TxnPage {
    pub transactions: Vec<TransactionDto>,
    pub categories: Vec<CategoryDto>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxnTotals {
    pub income: Money,
    pub expenses: Money,
}

impl TxnTotals {
    pub fn net(&self) -> Money {
        self.income - self.expenses
    }
}

#[derive(Debug, Default)]
pub struct TransactionsView {
    lifecycle: Lifecycle,
    transactions: Collection<TransactionDto>,
    categories: Collection<CategoryDto>,
    placeholder: Option<TxnPage>,
    pub filter: TxnFilter,
    pub query: TxnQuery,
}

impl TransactionsView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn status(&self) -> &LoadStatus {
        self.lifecycle.status()
    }

    pub fn mount(&mut self) -> Ticket {
        self.transactions.mark_load();
        self.lifecycle.mount()
    }

    pub fn unmount(&mut self) {
        self.lifecycle.unmount();
    }

    pub fn begin_load(&mut self) -> Ticket {
        self.transactions.mark_load();
        self.lifecycle.begin_load()
    }

    pub fn ticket(&self) -> Ticket {
        self.lifecycle.ticket()
    }

    /// Fetches transactions and categories in parallel.
    pub async fn fetch(api: &ApiClient, query: &TxnQuery) -> Result<TxnPage, ClientError> {
        let (transactions, categories) =
            tokio::try_join!(api.list_transactions(query), api.list_categories())?;
        Ok(TxnPage {
            transactions,
            categories,
        })
    }

    /// Applies a load result. Returns false when the result was stale.
    pub fn finish_load(&mut self, ticket: Ticket, result: Result<TxnPage, ClientError>) -> bool {
        if !self.lifecycle.admit(ticket, "transactions load") {
            return false;
        }
        match result {
            Ok(page) => {
                debug!(count = page.transactions.len(), "transactions loaded");
                self.transactions.replace(page.transactions);
                self.categories.replace(page.categories);
                self.placeholder = None;
                self.lifecycle.settle(LoadStatus::Ready);
            }
            Err(err) => {
                self.transactions.clear();
                self.categories.clear();
                self.placeholder = if err.is_network() {
                    warn!("backend unreachable, showing demo transactions: {err}");
                    Some(demo_page())
                } else {
                    None
                };
                self.lifecycle.settle(LoadStatus::Failed(err.to_string()));
            }
        }
        true
    }

    pub async fn load(&mut self, api: &ApiClient) -> bool {
        let ticket = self.begin_load();
        let result = Self::fetch(api, &self.query).await;
        self.finish_load(ticket, result)
    }

    pub fn origin(&self) -> Origin {
        if self.placeholder.is_some() {
            Origin::Placeholder
        } else {
            Origin::Server
        }
    }

    /// The server list. While placeholder data is on display it only holds
    /// rows created since.
    pub fn transactions(&self) -> &[TransactionDto] {
        self.transactions.items()
    }

    fn shown(&self) -> (&[TransactionDto], &[CategoryDto]) {
        match &self.placeholder {
            Some(page) => (&page.transactions, &page.categories),
            None => (self.transactions.items(), self.categories.items()),
        }
    }

    pub fn categories(&self) -> &[CategoryDto] {
        self.shown().1
    }

    pub fn category_name(&self, id: Option<&str>) -> Option<&str> {
        let id = id?;
        self.categories()
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.as_str())
    }

    /// Filtered and sorted projection of what is on display.
    pub fn visible(&self) -> Vec<&TransactionDto> {
        let mut rows: Vec<&TransactionDto> = self
            .shown()
            .0
            .iter()
            .filter(|txn| self.filter.matches(txn))
            .collect();
        rows.sort_by(|a, b| self.filter.compare(a, b));
        rows
    }

    /// Totals over everything on display, regardless of the filter.
    pub fn totals(&self) -> TxnTotals {
        let mut totals = TxnTotals::default();
        for txn in self.shown().0 {
            match txn.r#type {
                TxnKind::Income => totals.income += txn.amount,
                TxnKind::Expense => totals.expenses += txn.amount,
                TxnKind::Transfer => {}
            }
        }
        totals
    }

    /// Appends the server-returned transaction once creation succeeded.
    ///
    /// While placeholder data is on display the row goes into the hidden
    /// server list; it shows up once a load reaches the backend again.
    pub fn apply_created(
        &mut self,
        ticket: Ticket,
        result: Result<TransactionDto, ClientError>,
    ) -> Result<bool, ClientError> {
        let txn = result?;
        if !self.lifecycle.admit_mutation(ticket, "transaction create") {
            return Ok(false);
        }
        self.transactions.confirm_created(txn);
        Ok(true)
    }

    pub fn apply_updated(
        &mut self,
        ticket: Ticket,
        result: Result<TransactionDto, ClientError>,
    ) -> Result<bool, ClientError> {
        let txn = result?;
        if !self.lifecycle.admit_mutation(ticket, "transaction update") {
            return Ok(false);
        }
        Ok(self.transactions.confirm_updated(txn))
    }

    pub fn apply_deleted(
        &mut self,
        ticket: Ticket,
        id: &str,
        result: Result<(), ClientError>,
    ) -> Result<bool, ClientError> {
        result?;
        if !self.lifecycle.admit_mutation(ticket, "transaction delete") {
            return Ok(false);
        }
        Ok(self.transactions.confirm_removed(id).is_some())
    }

    pub async fn create(&mut self, api: &ApiClient, req: &CreateTxnReq) -> Result<bool, ClientError> {
        let ticket = self.ticket();
        let result = api.create_transaction(req).await;
        self.apply_created(ticket, result)
    }

    pub async fn delete(&mut self, api: &ApiClient, id: &str) -> Result<bool, ClientError> {
        let ticket = self.ticket();
        let result = api.delete_transaction(id).await;
        self.apply_deleted(ticket, id, result)
    }
}

fn demo_txn(id: &str, amount: i64, description: &str, kind: TxnKind, category: &str, day: u32) -> TransactionDto {
    let date = NaiveDate::from_ymd_opt(2025, 1, day)
        .unwrap_or_default()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default();
    TransactionDto {
        id: format!("demo-{id}"),
        amount: Money(Decimal::from(amount)),
        description: Some(description.to_string()),
        r#type: kind,
        category_id: Some(category.to_string()),
        account_id: None,
        date,
        created_at: None,
        updated_at: None,
    }
}

fn demo_category(id: &str, name: &str, kind: TxnKind) -> CategoryDto {
    CategoryDto {
        id: id.to_string(),
        name: name.to_string(),
        r#type: Some(kind),
        icon: None,
        color: None,
    }
}

fn demo_page() -> TxnPage {
    TxnPage {
        transactions: vec![
            demo_txn("1", 50, "Grocery Shopping", TxnKind::Expense, "food", 13),
            demo_txn("2", 2500, "Monthly Salary", TxnKind::Income, "salary", 12),
            demo_txn("3", 25, "Coffee Shop", TxnKind::Expense, "food", 12),
            demo_txn("4", 120, "Gas Station", TxnKind::Expense, "transport", 11),
            demo_txn("5", 500, "Freelance Project", TxnKind::Income, "freelance", 10),
        ],
        categories: vec![
            demo_category("food", "Food & Dining", TxnKind::Expense),
            demo_category("transport", "Transportation", TxnKind::Expense),
            demo_category("salary", "Salary", TxnKind::Income),
            demo_category("freelance", "Freelance", TxnKind::Income),
        ],
    }
}
