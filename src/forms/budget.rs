use super::{non_blank, SubmitGuard};
use crate::api::ApiClient;
use crate::error::{ClientError, FieldErrors};
use crate::models::{BudgetDto, BudgetPeriod, CreateBudgetReq};
use crate::util;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateBudgetForm {
    pub name: String,
    pub amount: String,
    pub period: BudgetPeriod,
    /// Empty for a budget spanning all categories.
    pub category_id: String,
}

impl CreateBudgetForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn cycle_period(&mut self) {
        let idx = BudgetPeriod::ALL
            .iter()
            .position(|p| *p == self.period)
            .unwrap_or(0);
        self.period = BudgetPeriod::ALL[(idx + 1) % BudgetPeriod::ALL.len()];
    }

    pub fn validate(&self) -> Result<CreateBudgetReq, ClientError> {
        let mut errors = FieldErrors::new();

        let name = non_blank(&self.name);
        if name.is_none() {
            errors.add("name", "Budget name is required");
        }
        let amount = non_blank(&self.amount)
            .and_then(util::parse_money)
            .filter(|amount| amount.is_positive());
        let amount = match amount {
            None => {
                errors.add("amount", "Amount must be positive");
                None
            }
            Some(amount) if !util::within_limit(&amount) => {
                errors.add("amount", "Amount is too large");
                None
            }
            some => some,
        };

        match (name, amount) {
            (Some(name), Some(amount)) => Ok(CreateBudgetReq {
                name: name.to_string(),
                amount,
                period: self.period,
                category_id: non_blank(&self.category_id).map(str::to_string),
            }),
            _ => Err(errors.into()),
        }
    }

    /// Validates, then creates the budget. At most one call is in flight per guard.
    pub async fn submit(&self, api: &ApiClient, guard: &SubmitGuard) -> Result<BudgetDto, ClientError> {
        let req = self.validate()?;
        let _permit = guard.acquire()?;
        api.create_budget(&req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Money;
    use rust_decimal::Decimal;

    #[test]
    fn blank_category_is_omitted() {
        let form = CreateBudgetForm {
            name: " Groceries ".into(),
            amount: "400".into(),
            ..CreateBudgetForm::default()
        };
        let req = form.validate().unwrap();
        assert_eq!(req.name, "Groceries");
        assert_eq!(req.amount, Money(Decimal::from(400)));
        assert_eq!(req.period, BudgetPeriod::Monthly);
        assert!(req.category_id.is_none());
    }

    #[test]
    fn reports_each_bad_field() {
        let form = CreateBudgetForm {
            amount: "0".into(),
            ..CreateBudgetForm::default()
        };
        let Err(ClientError::Validation(errors)) = form.validate() else {
            panic!("invalid budget accepted");
        };
        assert_eq!(errors.get("name"), Some("Budget name is required"));
        assert_eq!(errors.get("amount"), Some("Amount must be positive"));
    }

    #[test]
    fn oversized_amount_rejected() {
        let form = CreateBudgetForm {
            name: "Everything".into(),
            amount: "2000000000000".into(),
            ..CreateBudgetForm::default()
        };
        let Err(ClientError::Validation(errors)) = form.validate() else {
            panic!("oversized budget accepted");
        };
        assert_eq!(errors.get("amount"), Some("Amount is too large"));
    }

    #[test]
    fn period_cycles() {
        let mut form = CreateBudgetForm::new();
        form.cycle_period();
        assert_eq!(form.period, BudgetPeriod::Yearly);
        form.cycle_period();
        assert_eq!(form.period, BudgetPeriod::Weekly);
    }
}
