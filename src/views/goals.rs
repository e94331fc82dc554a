use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use super::{Collection, LoadStatus, Lifecycle, Ticket};
use crate::api::ApiClient;
use crate::error::{ClientError, FieldErrors};
use crate::models::{CreateGoalReq, GoalDto, GoalStatus, Money, UpdateGoalReq};
use crate::util;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalProgress {
    pub percent: Decimal,
    pub remaining: Money,
    /// Negative once the target date has passed.
    pub days_remaining: i64,
    pub reached: bool,
}

impl GoalProgress {
    pub fn of(goal: &GoalDto, today: NaiveDate) -> Self {
        let percent = goal.current_amount.percent_of(goal.target_amount);
        let remaining = goal.target_amount - goal.current_amount;
        Self {
            percent,
            remaining: remaining.max(Money::zero()),
            days_remaining: (goal.target_date - today).num_days(),
            reached: percent >= Decimal::ONE_HUNDRED,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GoalTotals {
    pub target: Money,
    pub saved: Money,
}

impl GoalTotals {
    pub fn progress(&self) -> Decimal {
        self.saved.percent_of(self.target)
    }
}

/// Builds the update for "add progress": the saved amount never drops and
/// never passes the target through this call, and reaching the target
/// completes the goal.
pub fn add_progress(goal: &GoalDto, input: &str) -> Result<UpdateGoalReq, ClientError> {
    let mut errors = FieldErrors::new();
    let amount = match util::parse_money(input) {
        Some(amount) if !amount.is_positive() => {
            errors.add("amount", "Amount must be greater than 0");
            return Err(errors.into());
        }
        Some(amount) if util::within_limit(&amount) => amount,
        Some(_) => {
            errors.add("amount", "Amount is too large");
            return Err(errors.into());
        }
        None => {
            errors.add("amount", "Please enter a valid amount");
            return Err(errors.into());
        }
    };
    let Some(sum) = goal.current_amount.checked_add(amount) else {
        errors.add("amount", "Amount is too large");
        return Err(errors.into());
    };

    let saved = sum.min(goal.target_amount).max(goal.current_amount);
    let status = (saved >= goal.target_amount).then_some(GoalStatus::Completed);
    Ok(UpdateGoalReq {
        current_amount: Some(saved),
        status,
        ..UpdateGoalReq::default()
    })
}

#[derive(Debug, Default)]
pub struct GoalsView {
    lifecycle: Lifecycle,
    goals: Collection<GoalDto>,
}

impl GoalsView {
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
        self.goals.mark_load();
        self.lifecycle.mount()
    }

    pub fn unmount(&mut self) {
        self.lifecycle.unmount();
    }

    pub fn begin_load(&mut self) -> Ticket {
        self.goals.mark_load();
        self.lifecycle.begin_load()
    }

    pub fn ticket(&self) -> Ticket {
        self.lifecycle.ticket()
    }

    pub async fn fetch(api: &ApiClient) -> Result<Vec<GoalDto>, ClientError> {
        api.list_goals().await
    }

    pub fn finish_load(&mut self, ticket: Ticket, result: Result<Vec<GoalDto>, ClientError>) -> bool {
        if !self.lifecycle.admit(ticket, "goals load") {
            return false;
        }
        match result {
            Ok(goals) => {
                debug!(count = goals.len(), "goals loaded");
                self.goals.replace(goals);
                self.lifecycle.settle(LoadStatus::Ready);
            }
            Err(err) => {
                self.goals.clear();
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

    pub fn goals(&self) -> &[GoalDto] {
        self.goals.items()
    }

    pub fn get(&self, id: &str) -> Option<&GoalDto> {
        self.goals.get(id)
    }

    pub fn active(&self) -> impl Iterator<Item = &GoalDto> {
        self.goals.iter().filter(|g| g.status == GoalStatus::Active)
    }

    pub fn completed(&self) -> impl Iterator<Item = &GoalDto> {
        self.goals.iter().filter(|g| g.status == GoalStatus::Completed)
    }

    pub fn totals(&self) -> GoalTotals {
        GoalTotals {
            target: self.goals.iter().map(|g| g.target_amount).sum(),
            saved: self.goals.iter().map(|g| g.current_amount).sum(),
        }
    }

    pub fn apply_created(
        &mut self,
        ticket: Ticket,
        result: Result<GoalDto, ClientError>,
    ) -> Result<bool, ClientError> {
        let goal = result?;
        if !self.lifecycle.admit_mutation(ticket, "goal create") {
            return Ok(false);
        }
        self.goals.confirm_created(goal);
        Ok(true)
    }

    pub fn apply_updated(
        &mut self,
        ticket: Ticket,
        result: Result<GoalDto, ClientError>,
    ) -> Result<bool, ClientError> {
        let goal = result?;
        if !self.lifecycle.admit_mutation(ticket, "goal update") {
            return Ok(false);
        }
        Ok(self.goals.confirm_updated(goal))
    }

    pub fn apply_deleted(
        &mut self,
        ticket: Ticket,
        id: &str,
        result: Result<(), ClientError>,
    ) -> Result<bool, ClientError> {
        result?;
        if !self.lifecycle.admit_mutation(ticket, "goal delete") {
            return Ok(false);
        }
        Ok(self.goals.confirm_removed(id).is_some())
    }

    pub async fn create(&mut self, api: &ApiClient, req: &CreateGoalReq) -> Result<bool, ClientError> {
        let ticket = self.ticket();
        let result = api.create_goal(req).await;
        self.apply_created(ticket, result)
    }

    /// Adds `input` to the goal's saved amount through the backend.
    pub async fn add_progress(&mut self, api: &ApiClient, id: &str, input: &str) -> Result<bool, ClientError> {
        let goal = self
            .goals
            .get(id)
            .ok_or_else(|| ClientError::NotFound(format!("goal {id}")))?;
        let req = add_progress(goal, input)?;
        let ticket = self.ticket();
        let result = api.update_goal(id, &req).await;
        self.apply_updated(ticket, result)
    }

    pub async fn delete(&mut self, api: &ApiClient, id: &str) -> Result<bool, ClientError> {
        let ticket = self.ticket();
        let result = api.delete_goal(id).await;
        self.apply_deleted(ticket, id, result)
    }
}
