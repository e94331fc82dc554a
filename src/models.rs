//! Wire types exchanged with the finance API.
//!
//! Server records end in `Dto`, request bodies in `Req`. Identifiers are
//! opaque server-assigned strings and are never synthesised client-side.

use std::collections::BTreeMap;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::util;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub Decimal);

impl Money {
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// `self / whole * 100`, or zero when `whole` is not positive.
    /// Saturates at the `Decimal` bounds.
    pub fn percent_of(&self, whole: Money) -> Decimal {
        if whole.0 <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.0
            .checked_div(whole.0)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .map_or_else(
                || if self.0.is_sign_negative() { Decimal::MIN } else { Decimal::MAX },
                |pct| pct.round_dp(2),
            )
    }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

// Totals saturate at the `Decimal` bounds instead of panicking. Form input is
// capped at `util::MAX_AMOUNT`, far below them.
impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        *self = *self + rhs;
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

/// A record carrying a server-assigned identifier.
pub trait Resource {
    fn id(&self) -> &str;
}

// ============= Auth =============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default, alias = "full_name")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginReq<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterReq<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

// ============= Categories =============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDto {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub r#type: Option<TxnKind>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl Resource for CategoryDto {
    fn id(&self) -> &str {
        &self.id
    }
}

// ============= Transactions =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxnKind {
    Income,
    #[default]
    Expense,
    Transfer,
}

impl TxnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Income => "Income",
            Self::Expense => "Expense",
            Self::Transfer => "Transfer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDto {
    pub id: String,
    pub amount: Money,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub r#type: TxnKind,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(with = "util::flex_datetime")]
    pub date: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Resource for TransactionDto {
    fn id(&self) -> &str {
        &self.id
    }
}

impl TransactionDto {
    /// Amount with the sign implied by its kind (expenses negative).
    pub fn signed_amount(&self) -> Money {
        match self.r#type {
            TxnKind::Expense => Money(-self.amount.0),
            _ => self.amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateTxnReq {
    pub amount: Money,
    pub description: String,
    #[serde(rename = "type")]
    pub r#type: TxnKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(with = "util::flex_datetime")]
    pub date: NaiveDateTime,
}

/// Partial update; unset fields are left alone by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateTxnReq {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub r#type: Option<TxnKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "util::flex_datetime::serialize_opt"
    )]
    pub date: Option<NaiveDateTime>,
}

/// Server-side filters for `GET /transactions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TxnQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub r#type: Option<TxnKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

// ============= Budgets =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Weekly,
    #[default]
    Monthly,
    Yearly,
}

impl BudgetPeriod {
    pub const ALL: [BudgetPeriod; 3] = [Self::Weekly, Self::Monthly, Self::Yearly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetDto {
    pub id: String,
    pub name: String,
    pub amount: Money,
    #[serde(default)]
    pub spent: Money,
    #[serde(default)]
    pub period: BudgetPeriod,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Resource for BudgetDto {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateBudgetReq {
    pub name: String,
    pub amount: Money,
    pub period: BudgetPeriod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

// ============= Goals =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    #[default]
    Active,
    Completed,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalDto {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub target_amount: Money,
    #[serde(default)]
    pub current_amount: Money,
    #[serde(with = "util::flex_date")]
    pub target_date: NaiveDate,
    #[serde(default = "default_goal_category")]
    pub category: String,
    #[serde(default)]
    pub status: GoalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Resource for GoalDto {
    fn id(&self) -> &str {
        &self.id
    }
}

pub(crate) fn default_goal_category() -> String {
    "savings".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateGoalReq {
    pub title: String,
    pub description: String,
    pub target_amount: Money,
    #[serde(with = "util::flex_date")]
    pub target_date: NaiveDate,
    pub category: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateGoalReq {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_amount: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<GoalStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ============= Analytics =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnalyticsPeriod {
    #[default]
    Month,
    Quarter,
    Year,
}

impl AnalyticsPeriod {
    pub const ALL: [AnalyticsPeriod; 3] = [Self::Month, Self::Quarter, Self::Year];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Month => "month",
            Self::Quarter => "quarter",
            Self::Year => "year",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Month => Self::Quarter,
            Self::Quarter => Self::Year,
            Self::Year => Self::Month,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub income: Money,
    pub expenses: Money,
    pub savings: Money,
    #[serde(default)]
    pub savings_rate: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalSummary {
    pub income: Money,
    pub expenses: Money,
    pub net_worth: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentTxn {
    pub id: String,
    pub amount: Money,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub r#type: TxnKind,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySlice {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    pub amount: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardDto {
    pub monthly_summary: MonthlySummary,
    #[serde(default)]
    pub total_summary: TotalSummary,
    #[serde(default)]
    pub recent_transactions: Vec<RecentTxn>,
    #[serde(default)]
    pub category_breakdown: Vec<CategorySlice>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    #[serde(default)]
    pub income: Money,
    #[serde(default)]
    pub expenses: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendsDto {
    /// Keyed by `YYYY-MM`, so iteration is chronological.
    pub monthly_trends: BTreeMap<String, TrendPoint>,
    pub period_months: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_accepts_full_name() {
        let user: User = serde_json::from_value(json!({
            "id": "u1",
            "email": "user@example.com",
            "full_name": "Ada Lovelace",
            "username": "ada",
            "is_active": true
        }))
        .unwrap();

        assert_eq!(user.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(user.display_name(), "Ada Lovelace");
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let user = User {
            id: "u1".into(),
            email: "user@example.com".into(),
            name: Some("  ".into()),
            username: None,
            created_at: None,
        };
        assert_eq!(user.display_name(), "user@example.com");
    }

    #[test]
    fn transaction_from_backend_json() {
        let txn: TransactionDto = serde_json::from_value(json!({
            "id": "t1",
            "amount": 50.25,
            "description": "Grocery Shopping",
            "type": "expense",
            "category_id": "food",
            "account_id": null,
            "date": "2025-01-13T10:00:00",
            "created_at": "2025-01-13T10:00:00Z",
            "updated_at": "2025-01-13T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(txn.amount, Money(Decimal::new(5025, 2)));
        assert_eq!(txn.signed_amount(), Money(Decimal::new(-5025, 2)));
        assert_eq!(txn.date.date(), NaiveDate::from_ymd_opt(2025, 1, 13).unwrap());
    }

    #[test]
    fn create_request_omits_missing_category() {
        let req = CreateBudgetReq {
            name: "Groceries".into(),
            amount: Money(Decimal::new(400, 0)),
            period: BudgetPeriod::Monthly,
            category_id: None,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value, json!({ "name": "Groceries", "amount": 400.0, "period": "monthly" }));
    }

    #[test]
    fn percent_of_guards_zero() {
        let spent = Money(Decimal::new(50, 0));
        assert_eq!(spent.percent_of(Money::zero()), Decimal::ZERO);
        assert_eq!(spent.percent_of(Money(Decimal::new(200, 0))), Decimal::new(25, 0));
    }

    #[test]
    fn arithmetic_saturates() {
        let huge = Money(Decimal::MAX);
        assert_eq!(huge + huge, huge);
        assert_eq!(Money(Decimal::MIN) - huge, Money(Decimal::MIN));
        assert_eq!(huge.checked_add(huge), None);
        assert_eq!(huge.percent_of(Money(Decimal::new(1, 2))), Decimal::MAX);
    }
}
