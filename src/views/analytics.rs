use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::{LoadStatus, Lifecycle, Origin, Ticket};
use crate::api::ApiClient;
use crate::error::ClientError;
use crate::models::{
    AnalyticsPeriod, CategorySlice, DashboardDto, MonthlySummary, Money, TotalSummary, TrendsDto,
};

pub const TREND_MONTHS: u32 = 6;

#[derive(Debug, Clone)]
pub struct Analytics {
    pub dashboard: DashboardDto,
    pub trends: TrendsDto,
}

/// Summary figures for the selected period plus monthly trends.
#[derive(Debug, Default)]
pub struct DashboardView {
    lifecycle: Lifecycle,
    period: AnalyticsPeriod,
    data: Option<Analytics>,
    origin: Origin,
}

impl DashboardView {
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
        self.lifecycle.mount()
    }

    pub fn unmount(&mut self) {
        self.lifecycle.unmount();
    }

    pub fn begin_load(&mut self) -> Ticket {
        self.lifecycle.begin_load()
    }

    pub fn period(&self) -> AnalyticsPeriod {
        self.period
    }

    /// Changes the period. A change invalidates the current data and
    /// returns the ticket for the reload it requires.
    pub fn set_period(&mut self, period: AnalyticsPeriod) -> Option<Ticket> {
        if period == self.period {
            return None;
        }
        self.period = period;
        Some(self.lifecycle.begin_load())
    }

    pub async fn fetch(api: &ApiClient, period: AnalyticsPeriod) -> Result<Analytics, ClientError> {
        let (dashboard, trends) = tokio::try_join!(api.dashboard(period), api.trends(TREND_MONTHS))?;
        Ok(Analytics { dashboard, trends })
    }

    pub fn finish_load(&mut self, ticket: Ticket, result: Result<Analytics, ClientError>) -> bool {
        if !self.lifecycle.admit(ticket, "dashboard load") {
            return false;
        }
        match result {
            Ok(data) => {
                debug!(period = self.period.as_str(), "dashboard loaded");
                self.data = Some(data);
                self.origin = Origin::Server;
                self.lifecycle.settle(LoadStatus::Ready);
            }
            Err(err) => {
                if err.is_network() {
                    warn!("backend unreachable, showing demo dashboard: {err}");
                    self.data = Some(demo_analytics());
                    self.origin = Origin::Placeholder;
                } else {
                    self.data = None;
                    self.origin = Origin::Server;
                }
                self.lifecycle.settle(LoadStatus::Failed(err.to_string()));
            }
        }
        true
    }

    pub async fn load(&mut self, api: &ApiClient) -> bool {
        let ticket = self.begin_load();
        let result = Self::fetch(api, self.period).await;
        self.finish_load(ticket, result)
    }

    pub fn data(&self) -> Option<&Analytics> {
        self.data.as_ref()
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Share of each category in the period's spending, in percent.
    pub fn category_shares(&self) -> Vec<(&CategorySlice, Decimal)> {
        let Some(data) = &self.data else {
            return Vec::new();
        };
        let slices = &data.dashboard.category_breakdown;
        let total: Money = slices.iter().map(|s| s.amount).sum();
        slices.iter().map(|s| (s, s.amount.percent_of(total))).collect()
    }
}

fn demo_analytics() -> Analytics {
    let money = |n: i64| Money(Decimal::from(n));
    let slice = |name: &str, amount: i64| CategorySlice {
        name: name.to_string(),
        icon: None,
        color: None,
        amount: money(amount),
    };
    Analytics {
        dashboard: DashboardDto {
            monthly_summary: MonthlySummary {
                income: money(3000),
                expenses: money(195),
                savings: money(2805),
                savings_rate: Decimal::new(935, 1),
            },
            total_summary: TotalSummary {
                income: money(3000),
                expenses: money(195),
                net_worth: money(2805),
            },
            recent_transactions: Vec::new(),
            category_breakdown: vec![slice("Food & Dining", 75), slice("Transportation", 120)],
        },
        trends: TrendsDto {
            monthly_trends: Default::default(),
            period_months: TREND_MONTHS,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_change_reloads() {
        let mut view = DashboardView::new();
        let first = view.mount();
        assert!(view.set_period(AnalyticsPeriod::Month).is_none());

        let second = view.set_period(AnalyticsPeriod::Quarter).unwrap();
        assert!(!view.finish_load(first, Ok(demo_analytics())));
        assert!(view.finish_load(second, Ok(demo_analytics())));
        assert_eq!(view.status(), &LoadStatus::Ready);
    }

    #[test]
    fn unauthorized_shows_no_placeholder() {
        let mut view = DashboardView::new();
        let ticket = view.mount();
        view.finish_load(ticket, Err(ClientError::Unauthorized));
        assert!(view.data().is_none());
        assert_eq!(view.origin(), Origin::Server);
    }

    #[test]
    fn category_shares_sum_to_whole() {
        let mut view = DashboardView::new();
        let ticket = view.mount();
        view.finish_load(ticket, Ok(demo_analytics()));

        let shares = view.category_shares();
        assert_eq!(shares.len(), 2);
        let total: Decimal = shares.iter().map(|(_, pct)| *pct).sum();
        assert_eq!(total, Decimal::ONE_HUNDRED);
    }
}
