use rust_decimal::Decimal;
use tracing::debug;

use super::{Collection, LoadStatus, Lifecycle, Ticket};
use crate::api::ApiClient;
use crate::error::ClientError;
use crate::models::{BudgetDto, CategoryDto, CreateBudgetReq, Money};

const WARNING_PERCENT: Decimal = Decimal::from_parts(80, 0, 0, false, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetStatus {
    OnTrack,
    Warning,
    Exceeded,
}

impl BudgetStatus {
    pub fn from_percent(percent: Decimal) -> Self {
        if percent >= Decimal::ONE_HUNDRED {
            Self::Exceeded
        } else if percent >= WARNING_PERCENT {
            Self::Warning
        } else {
            Self::OnTrack
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::OnTrack => "On track",
            Self::Warning => "Warning",
            Self::Exceeded => "Over budget",
        }
    }
}

/// Per-budget figures derived from amount and spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetUsage {
    pub percent: Decimal,
    pub remaining: Money,
    pub status: BudgetStatus,
}

impl BudgetUsage {
    pub fn of(budget: &BudgetDto) -> Self {
        let percent = budget.spent.percent_of(budget.amount);
        Self {
            percent,
            remaining: budget.amount - budget.spent,
            status: BudgetStatus::from_percent(percent),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BudgetTotals {
    pub budgeted: Money,
    pub spent: Money,
}

impl BudgetTotals {
    pub fn remaining(&self) -> Money {
        self.budgeted - self.spent
    }

    pub fn utilization(&self) -> Decimal {
        self.spent.percent_of(self.budgeted)
    }
}

#[derive(Debug, Clone)]
pub struct BudgetPage {
    pub budgets: Vec<BudgetDto>,
    pub categories: Vec<CategoryDto>,
}

#[derive(Debug, Default)]
pub struct BudgetsView {
    lifecycle: Lifecycle,
    budgets: Collection<BudgetDto>,
    categories: Collection<CategoryDto>,
}

impl BudgetsView {
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
        self.budgets.mark_load();
        self.lifecycle.mount()
    }

    pub fn unmount(&mut self) {
        self.lifecycle.unmount();
    }

    pub fn begin_load(&mut self) -> Ticket {
        self.budgets.mark_load();
        self.lifecycle.begin_load()
    }

    pub fn ticket(&self) -> Ticket {
        self.lifecycle.ticket()
    }

    pub async fn fetch(api: &ApiClient) -> Result<BudgetPage, ClientError> {
        let (budgets, categories) = tokio::try_join!(api.list_budgets(), api.list_categories())?;
        Ok(BudgetPage {
            budgets,
            categories,
        })
    }

    pub fn finish_load(&mut self, ticket: Ticket, result: Result<BudgetPage, ClientError>) -> bool {
        if !self.lifecycle.admit(ticket, "budgets load") {
            return false;
        }
        match result {
            Ok(page) => {
                debug!(count = page.budgets.len(), "budgets loaded");
                self.budgets.replace(page.budgets);
                self.categories.replace(page.categories);
                self.lifecycle.settle(LoadStatus::Ready);
            }
            Err(err) => {
                self.budgets.clear();
                self.categories.clear();
                self.lifecycle.settle(LoadStatus::Failed(err.to_string()));
            }
        }
        true
    }

    pub async fn load(&mut self, api: &ApiClient) -> bool {
        let ticket = self.begin_load();
        let result = Self::fetch(api).await;
        self.finish_load(ticket, result)
    }

    pub fn budgets(&self) -> &[BudgetDto] {
        self.budgets.items()
    }

    pub fn categories(&self) -> &[CategoryDto] {
        self.categories.items()
    }

    pub fn category_name(&self, id: Option<&str>) -> Option<&str> {
        self.categories.get(id?).map(|c| c.name.as_str())
    }

    pub fn totals(&self) -> BudgetTotals {
        BudgetTotals {
            budgeted: self.budgets.iter().map(|b| b.amount).sum(),
            spent: self.budgets.iter().map(|b| b.spent).sum(),
        }
    }

    pub fn apply_created(
        &mut self,
        ticket: Ticket,
        result: Result<BudgetDto, ClientError>,
    ) -> Result<bool, ClientError> {
        let budget = result?;
        if !self.lifecycle.admit_mutation(ticket, "budget create") {
            return Ok(false);
        }
        self.budgets.confirm_created(budget);
        Ok(true)
    }

    pub fn apply_deleted(
        &mut self,
        ticket: Ticket,
        id: &str,
        result: Result<(), ClientError>,
    ) -> Result<bool, ClientError> {
        result?;
        if !self.lifecycle.admit_mutation(ticket, "budget delete") {
            return Ok(false);
        }
        Ok(self.budgets.confirm_removed(id).is_some())
    }

    pub async fn create(&mut self, api: &ApiClient, req: &CreateBudgetReq) -> Result<bool, ClientError> {
        let ticket = self.ticket();
        let result = api.create_budget(req).await;
        self.apply_created(ticket, result)
    }

    pub async fn delete(&mut self, api: &ApiClient, id: &str) -> Result<bool, ClientError> {
        let ticket = self.ticket();
        let result = api.delete_budget(id).await;
        self.apply_deleted(ticket, id, result)
    }
}
