use chrono::NaiveDate;

use super::{non_blank, SubmitGuard};
use crate::api::ApiClient;
use crate::error::{ClientError, FieldErrors};
use crate::models::{default_goal_category, CreateGoalReq, GoalDto};
use crate::util;

/// Goal categories offered by the form, as `(value, label)`.
pub const GOAL_CATEGORIES: [(&str, &str); 10] = [
    ("savings", "Savings"),
    ("travel", "Travel"),
    ("house", "House Down Payment"),
    ("car", "Car Purchase"),
    ("education", "Education"),
    ("health", "Health/Medical"),
    ("retirement", "Retirement"),
    ("debt", "Debt Payoff"),
    ("emergency", "Emergency Fund"),
    ("other", "Other"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateGoalForm {
    pub title: String,
    pub description: String,
    pub target_amount: String,
    /// `YYYY-MM-DD`, must lie after today.
    pub target_date: String,
    pub category: String,
}

impl Default for CreateGoalForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            target_amount: String::new(),
            target_date: String::new(),
            category: default_goal_category(),
        }
    }
}

impl CreateGoalForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn cycle_category(&mut self) {
        let idx = GOAL_CATEGORIES
            .iter()
            .position(|(value, _)| *value == self.category)
            .map_or(0, |i| (i + 1) % GOAL_CATEGORIES.len());
        self.category = GOAL_CATEGORIES[idx].0.to_string();
    }

    pub fn validate(&self, today: NaiveDate) -> Result<CreateGoalReq, ClientError> {
        let mut errors = FieldErrors::new();

        let title = non_blank(&self.title);
        if title.is_none() {
            errors.add("title", "Goal title is required");
        }
        let target_amount = non_blank(&self.target_amount)
            .and_then(util::parse_money)
            .filter(|amount| amount.is_positive());
        let target_amount = match target_amount {
            None => {
                errors.add("target_amount", "Target amount must be positive");
                None
            }
            Some(amount) if !util::within_limit(&amount) => {
                errors.add("target_amount", "Target amount is too large");
                None
            }
            some => some,
        };
        let target_date = match non_blank(&self.target_date) {
            None => {
                errors.add("target_date", "Target date is required");
                None
            }
            Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                Ok(date) if date > today => Some(date),
                Ok(_) => {
                    errors.add("target_date", "Target date must be in the future");
                    None
                }
                Err(_) => {
                    errors.add("target_date", "Target date must be YYYY-MM-DD");
                    None
                }
            },
        };

        match (title, target_amount, target_date) {
            (Some(title), Some(target_amount), Some(target_date)) => Ok(CreateGoalReq {
                title: title.to_string(),
                description: self.description.trim().to_string(),
                target_amount,
                target_date,
                category: non_blank(&self.category)
                    .map_or_else(default_goal_category, str::to_string),
            }),
            _ => Err(errors.into()),
        }
    }

    pub async fn submit(
        &self,
        api: &ApiClient,
        guard: &SubmitGuard,
        today: NaiveDate,
    ) -> Result<GoalDto, ClientError> {
        let req = self.validate(today)?;
        let _permit = guard.acquire()?;
        api.create_goal(&req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 13).unwrap()
    }

    fn filled() -> CreateGoalForm {
        CreateGoalForm {
            title: "Vacation".into(),
            target_amount: "5000".into(),
            target_date: "2025-08-15".into(),
            ..CreateGoalForm::default()
        }
    }

    #[test]
    fn defaults_to_savings() {
        let req = filled().validate(today()).unwrap();
        assert_eq!(req.category, "savings");
        assert_eq!(req.target_date, NaiveDate::from_ymd_opt(2025, 8, 15).unwrap());
    }

    #[test]
    fn target_date_must_be_after_today() {
        let mut form = filled();
        form.target_date = "2025-01-13".into();
        let Err(ClientError::Validation(errors)) = form.validate(today()) else {
            panic!("past date accepted");
        };
        assert_eq!(errors.get("target_date"), Some("Target date must be in the future"));
    }

    #[test]
    fn oversized_target_rejected() {
        let mut form = filled();
        form.target_amount = "1000000000000.01".into();
        let Err(ClientError::Validation(errors)) = form.validate(today()) else {
            panic!("oversized target accepted");
        };
        assert_eq!(errors.get("target_amount"), Some("Target amount is too large"));
    }

    #[test]
    fn missing_date_is_required() {
        let mut form = filled();
        form.target_date.clear();
        let Err(ClientError::Validation(errors)) = form.validate(today()) else {
            panic!("missing date accepted");
        };
        assert_eq!(errors.get("target_date"), Some("Target date is required"));
    }

    #[test]
    fn category_cycle_wraps() {
        let mut form = CreateGoalForm::new();
        form.category = "other".into();
        form.cycle_category();
        assert_eq!(form.category, "savings");
        form.cycle_category();
        assert_eq!(form.category, "travel");
    }
}
