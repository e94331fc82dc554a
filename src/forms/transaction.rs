use chrono::{NaiveDate, NaiveTime};

use super::{non_blank, SubmitGuard};
use crate::api::ApiClient;
use crate::error::{ClientError, FieldErrors};
use crate::models::{CategoryDto, CreateTxnReq, TransactionDto, TxnKind};
use crate::util;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddTransactionForm {
    pub amount: String,
    pub description: String,
    pub category_id: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    kind: TxnKind,
}

impl AddTransactionForm {
    pub fn new(today: NaiveDate) -> Self {
        Self::with_kind(TxnKind::Expense, today)
    }

    pub fn with_kind(kind: TxnKind, today: NaiveDate) -> Self {
        Self {
            amount: String::new(),
            description: String::new(),
            category_id: String::new(),
            date: util::iso(&today),
            kind,
        }
    }

    pub fn kind(&self) -> TxnKind {
        self.kind
    }

    /// Switching between income and expense clears the chosen category.
    pub fn set_kind(&mut self, kind: TxnKind) {
        if kind != self.kind {
            self.kind = kind;
            self.category_id.clear();
        }
    }

    /// Categories offered for the current kind.
    pub fn categories_for<'a>(&self, all: &'a [CategoryDto]) -> Vec<&'a CategoryDto> {
        all.iter()
            .filter(|c| c.r#type.map_or(true, |kind| kind == self.kind))
            .collect()
    }

    pub fn validate(&self) -> Result<CreateTxnReq, ClientError> {
        let mut errors = FieldErrors::new();

        let amount = match non_blank(&self.amount).map(util::parse_money) {
            None => {
                errors.add("amount", "Amount is required");
                None
            }
            Some(Some(amount)) if amount.is_positive() && util::within_limit(&amount) => Some(amount),
            Some(Some(amount)) if amount.is_positive() => {
                errors.add("amount", "Amount is too large");
                None
            }
            Some(_) => {
                errors.add("amount", "Please enter a valid amount");
                None
            }
        };
        let description = non_blank(&self.description);
        if description.is_none() {
            errors.add("description", "Description is required");
        }
        let category_id = non_blank(&self.category_id);
        if category_id.is_none() {
            errors.add("category_id", "Category is required");
        }
        let date = match non_blank(&self.date) {
            None => {
                errors.add("date", "Date is required");
                None
            }
            Some(raw) => {
                let parsed = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok();
                if parsed.is_none() {
                    errors.add("date", "Date must be YYYY-MM-DD");
                }
                parsed
            }
        };

        match (amount, description, category_id, date) {
            (Some(amount), Some(description), Some(category_id), Some(date)) if errors.is_empty() => {
                Ok(CreateTxnReq {
                    amount,
                    description: description.to_string(),
                    r#type: self.kind,
                    category_id: Some(category_id.to_string()),
                    account_id: None,
                    date: date.and_time(NaiveTime::MIN),
                })
            }
            _ => Err(errors.into()),
        }
    }

    /// Validates, then creates the transaction. Nothing is sent when
    /// validation fails or another submission holds `guard`.
    pub async fn submit(&self, api: &ApiClient, guard: &SubmitGuard) -> Result<TransactionDto, ClientError> {
        let req = self.validate()?;
        let _permit = guard.acquire()?;
        api.create_transaction(&req).await
    }
}
