use crate::period::{YearMonth, months_between};
use crate::report::{CustomerLtv, DashboardSummary, LtvSummary, MonthlyMetric};
use chrono::{Local, NaiveDate};
use core_types::{CustomerRecord, CustomerStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Decides which cancellations count as churn.
///
/// With `min_tenure_months == 0` every cancellation counts. Otherwise a
/// cancellation only counts when at least that many calendar months separate
/// signup and cancellation; shorter-lived accounts still leave the active set
/// but do not show up in the churn columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChurnPolicy {
    pub min_tenure_months: u32,
}

impl ChurnPolicy {
    pub fn with_min_tenure(months: u32) -> Self {
        Self {
            min_tenure_months: months,
        }
    }

    fn counts(&self, customer: &CustomerRecord, cancel_date: NaiveDate) -> bool {
        let min_tenure = i32::try_from(self.min_tenure_months).unwrap_or(i32::MAX);
        months_between(customer.signup_date, cancel_date) >= min_tenure
    }
}

/// A stateless calculator for deriving business metrics from a customer ledger.
///
/// Every call recomputes from the snapshot it is given; nothing is cached
/// between calls. Records are assumed to satisfy the `CustomerRecord`
/// preconditions (in particular `cancel_date >= signup_date`). Money sums
/// saturate at `Decimal::MAX` instead of overflowing.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsEngine {
    churn_policy: ChurnPolicy,
}

impl MetricsEngine {
    pub fn new(churn_policy: ChurnPolicy) -> Self {
        Self { churn_policy }
    }

    pub fn churn_policy(&self) -> ChurnPolicy {
        self.churn_policy
    }

    /// Computes the monthly series up to the current month.
    pub fn compute_monthly_series(&self, customers: &[CustomerRecord]) -> Vec<MonthlyMetric> {
        self.compute_monthly_series_as_of(customers, today())
    }

    /// Computes one row per calendar month, oldest first.
    ///
    /// The window runs from the earliest signup month through the later of
    /// `today` and the latest signup or cancellation. An empty ledger yields a
    /// single zeroed row for the month of `today`.
    pub fn compute_monthly_series_as_of(
        &self,
        customers: &[CustomerRecord],
        today: NaiveDate,
    ) -> Vec<MonthlyMetric> {
        let (start, end) = analysis_window(customers, today);

        let series: Vec<MonthlyMetric> = start
            .through(end)
            .map(|month| self.calculate_month(month, customers))
            .collect();

        tracing::debug!(
            customers = customers.len(),
            months = series.len(),
            start = %start,
            end = %end,
            "Computed monthly series."
        );
        series
    }

    /// Computes all metrics for a single month.
    fn calculate_month(&self, month: YearMonth, customers: &[CustomerRecord]) -> MonthlyMetric {
        let month_end = month.last_day();
        let mut row = MonthlyMetric::empty(month);

        for customer in customers {
            if month.contains(customer.signup_date) {
                row.new_customers += 1;
            }

            if customer.is_active_at(month_end) {
                row.active_customers += 1;
                row.mrr = row.mrr.saturating_add(customer.plan_value);
            }

            if let Some(cancel_date) = customer.cancel_date {
                if month.contains(cancel_date) && self.churn_policy.counts(customer, cancel_date) {
                    row.churned_customers += 1;
                    row.churned_mrr = row.churned_mrr.saturating_add(customer.plan_value);
                }
            }
        }

        if row.active_customers > 0 {
            row.avg_ticket = row.mrr / Decimal::from(row.active_customers);
        }

        row
    }

    /// Computes the lifetime value of every customer as of the current date.
    pub fn compute_customer_ltvs(&self, customers: &[CustomerRecord]) -> Vec<CustomerLtv> {
        self.compute_customer_ltvs_as_of(customers, today())
    }

    /// `ltv = plan_value × months_active`, where still-active customers are
    /// measured up to `today`.
    pub fn compute_customer_ltvs_as_of(
        &self,
        customers: &[CustomerRecord],
        today: NaiveDate,
    ) -> Vec<CustomerLtv> {
        customers
            .iter()
            .map(|customer| {
                let until = customer.cancel_date.unwrap_or(today);
                let months_active = months_between(customer.signup_date, until).max(1) as u32;
                CustomerLtv {
                    customer_id: customer.id,
                    name: customer.name.clone(),
                    months_active,
                    ltv: customer.plan_value.saturating_mul(Decimal::from(months_active)),
                    cancelled: customer.is_cancelled(),
                }
            })
            .collect()
    }

    /// Aggregates lifetime values as of the current date.
    pub fn compute_ltv_summary(&self, customers: &[CustomerRecord]) -> LtvSummary {
        self.compute_ltv_summary_as_of(customers, today())
    }

    pub fn compute_ltv_summary_as_of(
        &self,
        customers: &[CustomerRecord],
        today: NaiveDate,
    ) -> LtvSummary {
        let ltvs = self.compute_customer_ltvs_as_of(customers, today);
        let mut summary = LtvSummary::new();

        if ltvs.is_empty() {
            return summary;
        }

        let mut active_total = Decimal::ZERO;
        let mut churned_total = Decimal::ZERO;
        let mut months_total = Decimal::ZERO;

        for entry in &ltvs {
            summary.total_ltv = summary.total_ltv.saturating_add(entry.ltv);
            months_total = months_total.saturating_add(Decimal::from(entry.months_active));
            if entry.cancelled {
                summary.churned_count += 1;
                churned_total = churned_total.saturating_add(entry.ltv);
            } else {
                summary.active_count += 1;
                active_total = active_total.saturating_add(entry.ltv);
            }
        }

        summary.customer_count = ltvs.len();
        summary.average_ltv = mean(summary.total_ltv, summary.customer_count);
        summary.average_ltv_active = mean(active_total, summary.active_count);
        summary.average_ltv_churned = mean(churned_total, summary.churned_count);
        summary.average_months_active = mean(months_total, summary.customer_count);

        summary
    }

    /// Computes the headline KPIs as of the current date.
    pub fn compute_summary(&self, customers: &[CustomerRecord]) -> DashboardSummary {
        self.compute_summary_as_of(customers, today())
    }

    pub fn compute_summary_as_of(
        &self,
        customers: &[CustomerRecord],
        today: NaiveDate,
    ) -> DashboardSummary {
        let series = self.compute_monthly_series_as_of(customers, today);
        let months = series.len();

        let total_mrr = series
            .iter()
            .fold(Decimal::ZERO, |total, row| total.saturating_add(row.mrr));
        let total_new: usize = series.iter().map(|row| row.new_customers).sum();
        let total_churned: usize = series.iter().map(|row| row.churned_customers).sum();

        let active_customers = customers
            .iter()
            .filter(|c| c.status == CustomerStatus::Active)
            .count();

        let latest = series.last().cloned();
        let (latest_churned, latest_new) = latest
            .as_ref()
            .map_or((0, 0), |row| (row.churned_customers, row.new_customers));

        DashboardSummary {
            total_customers: customers.len(),
            active_customers,
            avg_monthly_mrr: mean(total_mrr, months),
            avg_monthly_new_customers: mean(Decimal::from(total_new), months),
            overall_churn_rate_pct: percentage(total_churned, total_new),
            latest,
            latest_churn_rate_pct: percentage(latest_churned, latest_new.max(1)),
        }
    }
}

/// The first and last month of the series.
fn analysis_window(customers: &[CustomerRecord], today: NaiveDate) -> (YearMonth, YearMonth) {
    let first_signup = customers.iter().map(|c| c.signup_date).min();
    let last_event = customers
        .iter()
        .flat_map(|c| std::iter::once(c.signup_date).chain(c.cancel_date))
        .max();

    let start = first_signup.unwrap_or(today);
    let end = last_event.map_or(today, |last| last.max(today));

    (YearMonth::from_date(start), YearMonth::from_date(end))
}

fn mean(total: Decimal, count: usize) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        total / Decimal::from(count)
    }
}

fn percentage(part: usize, whole: usize) -> Decimal {
    if whole == 0 {
        Decimal::ZERO
    } else {
        Decimal::from(part) / Decimal::from(whole) * Decimal::ONE_HUNDRED
    }
}

/// The calendar date used whenever no reference date is given.
///
/// Everything that defaults "today" goes through here so the CLI, the API and
/// the engine agree on the current month.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::NewCustomer;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn customer(
        name: &str,
        signup: NaiveDate,
        plan: Decimal,
        cancel: Option<NaiveDate>,
    ) -> CustomerRecord {
        CustomerRecord::new(NewCustomer {
            name: name.to_string(),
            signup_date: signup,
            plan_value: plan,
            status: None,
            cancel_date: cancel,
        })
        .unwrap()
    }

    /// The four-customer ledger used throughout the dashboard docs.
    fn sample_ledger() -> Vec<CustomerRecord> {
        vec![
            customer("A", date(2025, 1, 1), dec!(100), None),
            customer("B", date(2025, 1, 15), dec!(200), None),
            customer("C", date(2025, 2, 1), dec!(150), Some(date(2025, 2, 20))),
            customer("D", date(2025, 2, 10), dec!(300), None),
        ]
    }

    #[test]
    fn sample_ledger_produces_expected_rows() {
        let engine = MetricsEngine::default();
        let series = engine.compute_monthly_series_as_of(&sample_ledger(), date(2025, 2, 25));

        assert_eq!(series.len(), 2);

        let jan = &series[0];
        assert_eq!(jan.month.to_string(), "2025-01");
        assert_eq!(jan.new_customers, 2);
        assert_eq!(jan.mrr, dec!(300));
        assert_eq!(jan.avg_ticket, dec!(150));
        assert_eq!(jan.churned_customers, 0);
        assert_eq!(jan.churned_mrr, dec!(0));

        let feb = &series[1];
        assert_eq!(feb.month.to_string(), "2025-02");
        assert_eq!(feb.new_customers, 2);
        assert_eq!(feb.active_customers, 3);
        assert_eq!(feb.mrr, dec!(600));
        assert_eq!(feb.avg_ticket, dec!(200));
        assert_eq!(feb.churned_customers, 1);
        assert_eq!(feb.churned_mrr, dec!(150));
    }

    #[test]
    fn series_is_complete_and_strictly_ascending() {
        let ledger = vec![
            customer("old", date(2023, 11, 20), dec!(50), Some(date(2024, 1, 3))),
            customer("new", date(2024, 6, 2), dec!(80), None),
        ];
        let series = MetricsEngine::default().compute_monthly_series_as_of(&ledger, date(2024, 8, 9));

        let months: Vec<String> = series.iter().map(|row| row.month.to_string()).collect();
        assert_eq!(
            months,
            vec![
                "2023-11", "2023-12", "2024-01", "2024-02", "2024-03", "2024-04", "2024-05",
                "2024-06", "2024-07", "2024-08"
            ]
        );
        assert!(series.windows(2).all(|pair| pair[0].month < pair[1].month));

        // Quiet months still appear, zeroed.
        let march = &series[4];
        assert_eq!(march.new_customers, 0);
        assert_eq!(march.active_customers, 0);
        assert_eq!(march.mrr, dec!(0));
    }

    #[test]
    fn window_extends_to_a_future_cancellation() {
        let ledger = vec![customer("A", date(2025, 1, 10), dec!(10), Some(date(2025, 5, 2)))];
        let series = MetricsEngine::default().compute_monthly_series_as_of(&ledger, date(2025, 3, 1));

        assert_eq!(series.first().unwrap().month.to_string(), "2025-01");
        assert_eq!(series.last().unwrap().month.to_string(), "2025-05");
        assert_eq!(series.last().unwrap().churned_customers, 1);
    }

    #[test]
    fn mrr_equals_avg_ticket_times_active_count() {
        let ledger = vec![
            customer("A", date(2024, 1, 5), dec!(99.90), None),
            customer("B", date(2024, 1, 6), dec!(100), Some(date(2024, 3, 31))),
            customer("C", date(2024, 2, 7), dec!(49.95), None),
            customer("D", date(2024, 2, 29), dec!(10), Some(date(2024, 5, 1))),
        ];
        let series = MetricsEngine::default().compute_monthly_series_as_of(&ledger, date(2024, 6, 1));

        for row in &series {
            if row.active_customers > 0 {
                let rebuilt = row.avg_ticket * Decimal::from(row.active_customers);
                assert!((rebuilt - row.mrr).abs() < dec!(0.000001), "month {}", row.month);
            }
            assert!(row.mrr >= Decimal::ZERO);
            assert!(row.avg_ticket >= Decimal::ZERO);
            assert!(row.churned_mrr >= Decimal::ZERO);
        }
    }

    #[test]
    fn cancellation_on_last_day_counts_as_churn_in_that_month() {
        let ledger = vec![
            customer("stays", date(2024, 1, 10), dec!(100), None),
            customer("leaves", date(2024, 1, 10), dec!(40), Some(date(2024, 2, 29))),
        ];
        let series = MetricsEngine::default().compute_monthly_series_as_of(&ledger, date(2024, 3, 15));

        let feb = &series[1];
        assert_eq!(feb.month.to_string(), "2024-02");
        assert_eq!(feb.churned_customers, 1);
        assert_eq!(feb.churned_mrr, dec!(40));
        assert_eq!(feb.active_customers, 1);
        assert_eq!(feb.mrr, dec!(100));

        let mar = &series[2];
        assert_eq!(mar.churned_customers, 0);
    }

    #[test]
    fn cancellation_on_first_day_leaves_month_and_counts_there() {
        let ledger = vec![customer("A", date(2025, 1, 20), dec!(70), Some(date(2025, 2, 1)))];
        let series = MetricsEngine::default().compute_monthly_series_as_of(&ledger, date(2025, 2, 5));

        assert_eq!(series[0].active_customers, 1);
        assert_eq!(series[1].active_customers, 0);
        assert_eq!(series[1].churned_customers, 1);
    }

    #[test]
    fn empty_ledger_yields_single_zero_row_for_current_month() {
        let series = MetricsEngine::default().compute_monthly_series_as_of(&[], date(2025, 6, 17));

        assert_eq!(series, vec![MonthlyMetric::empty(YearMonth::new(2025, 6).unwrap())]);
    }

    #[test]
    fn empty_ledger_uses_the_real_clock_by_default() {
        let series = MetricsEngine::default().compute_monthly_series(&[]);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].month, YearMonth::from_date(today()));
    }

    #[test]
    fn avg_ticket_is_zero_when_nobody_is_active() {
        // Signs up and cancels in January; February has no active customers.
        let ledger = vec![
            customer("A", date(2025, 1, 3), dec!(120), Some(date(2025, 1, 20))),
            customer("B", date(2025, 3, 3), dec!(80), None),
        ];
        let series = MetricsEngine::default().compute_monthly_series_as_of(&ledger, date(2025, 3, 10));

        assert_eq!(series[0].active_customers, 0);
        assert_eq!(series[0].avg_ticket, Decimal::ZERO);
        assert_eq!(series[1].active_customers, 0);
        assert_eq!(series[1].mrr, Decimal::ZERO);
        assert_eq!(series[1].avg_ticket, Decimal::ZERO);
        assert_eq!(series[2].avg_ticket, dec!(80));
    }

    #[test]
    fn repeated_calls_return_identical_series() {
        let engine = MetricsEngine::default();
        let ledger = sample_ledger();
        let snapshot = ledger.clone();

        let first = engine.compute_monthly_series_as_of(&ledger, date(2025, 4, 1));
        let second = engine.compute_monthly_series_as_of(&ledger, date(2025, 4, 1));

        assert_eq!(first, second);
        assert_eq!(ledger, snapshot);
    }

    #[test]
    fn tenure_policy_filters_short_lived_cancellations() {
        let ledger = vec![
            // One month boundary crossed: below the two-month tenure.
            customer("short", date(2025, 1, 10), dec!(30), Some(date(2025, 2, 5))),
            // Two boundaries crossed: counts.
            customer("long", date(2025, 1, 10), dec!(60), Some(date(2025, 3, 3))),
        ];

        let lenient = MetricsEngine::default().compute_monthly_series_as_of(&ledger, date(2025, 3, 31));
        assert_eq!(lenient[1].churned_customers, 1);
        assert_eq!(lenient[2].churned_customers, 1);

        let strict = MetricsEngine::new(ChurnPolicy::with_min_tenure(2))
            .compute_monthly_series_as_of(&ledger, date(2025, 3, 31));
        assert_eq!(strict[1].churned_customers, 0);
        assert_eq!(strict[1].churned_mrr, Decimal::ZERO);
        assert_eq!(strict[2].churned_customers, 1);
        assert_eq!(strict[2].churned_mrr, dec!(60));

        // The policy never changes who is active.
        assert_eq!(strict[1].active_customers, lenient[1].active_customers);
        assert_eq!(strict[1].mrr, lenient[1].mrr);
    }

    #[test]
    fn ltv_of_cancelled_customer_counts_calendar_months() {
        let ledger = vec![customer("A", date(2025, 1, 1), dec!(100), Some(date(2025, 4, 1)))];
        let engine = MetricsEngine::default();

        let ltvs = engine.compute_customer_ltvs_as_of(&ledger, date(2025, 9, 1));
        assert_eq!(ltvs[0].months_active, 3);
        assert_eq!(ltvs[0].ltv, dec!(300));
        assert!(ltvs[0].cancelled);
    }

    #[test]
    fn ltv_months_active_is_at_least_one() {
        let ledger = vec![
            customer("same month", date(2025, 5, 2), dec!(45), Some(date(2025, 5, 28))),
            customer("signed today", date(2025, 5, 30), dec!(10), None),
        ];
        let ltvs = MetricsEngine::default().compute_customer_ltvs_as_of(&ledger, date(2025, 5, 30));

        assert_eq!(ltvs[0].months_active, 1);
        assert_eq!(ltvs[0].ltv, dec!(45));
        assert_eq!(ltvs[1].months_active, 1);
    }

    #[test]
    fn ltv_summary_splits_active_and_churned() {
        let ledger = vec![
            customer("A", date(2025, 1, 1), dec!(100), Some(date(2025, 4, 1))), // 3 months, 300
            customer("B", date(2025, 1, 1), dec!(50), None),                    // 6 months, 300
            customer("C", date(2025, 3, 15), dec!(200), None),                  // 4 months, 800
        ];
        let summary = MetricsEngine::default().compute_ltv_summary_as_of(&ledger, date(2025, 7, 2));

        assert_eq!(summary.customer_count, 3);
        assert_eq!(summary.active_count, 2);
        assert_eq!(summary.churned_count, 1);
        assert_eq!(summary.total_ltv, dec!(1400));
        assert_eq!(summary.average_ltv_active, dec!(550));
        assert_eq!(summary.average_ltv_churned, dec!(300));
        assert!((summary.average_ltv - dec!(466.6666666)).abs() < dec!(0.0001));
        assert!((summary.average_months_active - dec!(4.3333333)).abs() < dec!(0.0001));
    }

    #[test]
    fn ltv_summary_of_empty_ledger_is_zero() {
        let summary = MetricsEngine::default().compute_ltv_summary_as_of(&[], date(2025, 1, 1));
        assert_eq!(summary, LtvSummary::new());
        assert_eq!(summary.customer_count, 0);
        assert_eq!(summary.average_ltv, Decimal::ZERO);
    }

    #[test]
    fn summary_reports_headline_kpis() {
        let summary = MetricsEngine::default().compute_summary_as_of(&sample_ledger(), date(2025, 2, 25));

        assert_eq!(summary.total_customers, 4);
        assert_eq!(summary.active_customers, 3);
        assert_eq!(summary.avg_monthly_mrr, dec!(450));
        assert_eq!(summary.avg_monthly_new_customers, dec!(2));
        assert_eq!(summary.overall_churn_rate_pct, dec!(25));

        // February: one churned out of two new customers.
        let latest = summary.latest.unwrap();
        assert_eq!(latest.month.to_string(), "2025-02");
        assert_eq!(summary.latest_churn_rate_pct, dec!(50));
    }

    #[test]
    fn latest_churn_rate_without_new_customers_divides_by_one() {
        let ledger = vec![
            customer("A", date(2025, 1, 5), dec!(10), Some(date(2025, 3, 2))),
            customer("B", date(2025, 1, 6), dec!(10), Some(date(2025, 3, 9))),
        ];
        let summary = MetricsEngine::default().compute_summary_as_of(&ledger, date(2025, 3, 20));

        assert_eq!(summary.latest.as_ref().unwrap().new_customers, 0);
        assert_eq!(summary.latest_churn_rate_pct, dec!(200));
    }

    /// Bypasses `CustomerRecord::new` to reach amounts no store would accept.
    fn unchecked(name: &str, plan: Decimal, cancel: Option<NaiveDate>) -> CustomerRecord {
        CustomerRecord {
            id: uuid::Uuid::nil(),
            name: name.to_string(),
            signup_date: date(2024, 1, 1),
            plan_value: plan,
            status: if cancel.is_some() { CustomerStatus::Cancelled } else { CustomerStatus::Active },
            cancel_date: cancel,
        }
    }

    #[test]
    fn extreme_plan_values_saturate_instead_of_panicking() {
        let ledger = vec![
            unchecked("X", Decimal::MAX, None),
            unchecked("Y", Decimal::MAX, Some(date(2024, 6, 10))),
        ];
        let engine = MetricsEngine::default();
        let today = date(2024, 12, 1);

        let series = engine.compute_monthly_series_as_of(&ledger, today);
        assert_eq!(series[0].mrr, Decimal::MAX);
        assert_eq!(series[5].churned_mrr, Decimal::MAX);
        assert_eq!(series[11].mrr, Decimal::MAX);

        let summary = engine.compute_ltv_summary_as_of(&ledger, today);
        assert_eq!(summary.total_ltv, Decimal::MAX);
        assert_eq!(summary.average_ltv_active, Decimal::MAX);

        let dashboard = engine.compute_summary_as_of(&ledger, today);
        assert!(dashboard.avg_monthly_mrr > Decimal::ZERO);
    }

    #[test]
    fn huge_tenure_requirement_disables_churn_instead_of_wrapping() {
        let ledger = vec![customer("A", date(2020, 1, 10), dec!(30), Some(date(2025, 2, 5)))];
        let series = MetricsEngine::new(ChurnPolicy::with_min_tenure(u32::MAX))
            .compute_monthly_series_as_of(&ledger, date(2025, 2, 28));

        assert_eq!(series.last().unwrap().churned_customers, 0);
        assert_eq!(series.last().unwrap().active_customers, 0);
    }

    #[test]
    fn summary_of_empty_ledger_has_no_division_errors() {
        let summary = MetricsEngine::default().compute_summary_as_of(&[], date(2025, 1, 9));
        assert_eq!(summary.total_customers, 0);
        assert_eq!(summary.overall_churn_rate_pct, Decimal::ZERO);
        assert_eq!(summary.latest_churn_rate_pct, Decimal::ZERO);
        assert_eq!(summary.latest.unwrap().mrr, Decimal::ZERO);
    }
}
