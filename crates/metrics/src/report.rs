use crate::period::YearMonth;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row of the monthly series.
///
/// Rows are derived on every request and never persisted. All amounts are raw
/// decimals; formatting belongs to whoever renders them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyMetric {
    pub month: YearMonth,
    /// Customers whose signup date falls within the month.
    pub new_customers: usize,
    /// Customers active as of the last day of the month.
    pub active_customers: usize,
    /// Sum of plan values over the active customers.
    pub mrr: Decimal,
    /// Mean plan value over the active customers, zero when there are none.
    pub avg_ticket: Decimal,
    pub churned_customers: usize,
    pub churned_mrr: Decimal,
}

impl MonthlyMetric {
    /// A zeroed row for `month`.
    pub fn empty(month: YearMonth) -> Self {
        Self {
            month,
            new_customers: 0,
            active_customers: 0,
            mrr: Decimal::ZERO,
            avg_ticket: Decimal::ZERO,
            churned_customers: 0,
            churned_mrr: Decimal::ZERO,
        }
    }
}

/// Observed lifetime value of a single customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerLtv {
    pub customer_id: Uuid,
    pub name: String,
    /// Calendar months from signup to cancellation (or today), at least 1.
    pub months_active: u32,
    pub ltv: Decimal,
    pub cancelled: bool,
}

/// Lifetime value aggregates over a customer set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LtvSummary {
    pub customer_count: usize,
    pub active_count: usize,
    pub churned_count: usize,
    pub total_ltv: Decimal,
    pub average_ltv: Decimal,
    pub average_ltv_active: Decimal,
    pub average_ltv_churned: Decimal,
    pub average_months_active: Decimal,
}

impl LtvSummary {
    /// Creates a zeroed-out summary, which is also the result for an empty ledger.
    pub fn new() -> Self {
        Self {
            customer_count: 0,
            active_count: 0,
            churned_count: 0,
            total_ltv: Decimal::ZERO,
            average_ltv: Decimal::ZERO,
            average_ltv_active: Decimal::ZERO,
            average_ltv_churned: Decimal::ZERO,
            average_months_active: Decimal::ZERO,
        }
    }
}

impl Default for LtvSummary {
    fn default() -> Self {
        Self::new()
    }
}

/// Headline KPIs shown above the charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_customers: usize,
    /// Customers whose status field says `Active`.
    pub active_customers: usize,
    pub avg_monthly_mrr: Decimal,
    pub avg_monthly_new_customers: Decimal,
    /// Total churned customers over total new customers across the series, in percent.
    pub overall_churn_rate_pct: Decimal,
    /// The most recent month of the series.
    pub latest: Option<MonthlyMetric>,
    /// Churned customers of the latest month over that month's new customers
    /// (at least 1), in percent.
    pub latest_churn_rate_pct: Decimal,
}
