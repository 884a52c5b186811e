use crate::{AppState, error::AppError};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::NaiveDate;
use core_types::{CustomerRecord, CustomerStatus, NewCustomer};
use metrics::{CustomerLtv, DashboardSummary, LtvSummary, MonthlyMetric, parse_date, parse_money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Optional reference date for the metric endpoints, `?as_of=YYYY-MM-DD`.
#[derive(Debug, Default, Deserialize)]
pub struct AsOf {
    pub as_of: Option<NaiveDate>,
}

impl AsOf {
    fn date(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(metrics::today)
    }
}

/// A money amount sent either as a JSON number or as text such as `"1.234,50"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(serde_json::Number),
    Text(String),
}

impl AmountInput {
    fn parse(&self) -> Option<Decimal> {
        match self {
            AmountInput::Number(n) => parse_money(&n.to_string()),
            AmountInput::Text(text) => parse_money(text),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CustomerInput {
    pub name: String,
    pub signup_date: String,
    pub plan_value: AmountInput,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub cancel_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusInput {
    pub status: String,
    #[serde(default)]
    pub cancel_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LtvResponse {
    pub summary: LtvSummary,
    pub customers: Vec<CustomerLtv>,
}

fn required_date(field: &str, value: &str) -> Result<NaiveDate, AppError> {
    parse_date(value).ok_or_else(|| AppError::Validation(format!("{field} is not a valid date: '{value}'")))
}

/// Blank or missing cancellation dates mean "not cancelled".
fn optional_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => required_date(field, text).map(Some),
    }
}

/// # GET /api/customers
pub async fn list_customers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CustomerRecord>>, AppError> {
    let customers = state.repo.try_load().await?;
    Ok(Json(customers))
}

/// # POST /api/customers
pub async fn create_customer(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CustomerInput>,
) -> Result<(StatusCode, Json<CustomerRecord>), AppError> {
    let signup_date = required_date("signup_date", &input.signup_date)?;
    let plan_value = input
        .plan_value
        .parse()
        .ok_or_else(|| AppError::Validation("plan_value is not a valid amount".to_string()))?;
    let status = input
        .status
        .as_deref()
        .map(CustomerStatus::from_str)
        .transpose()?;
    let cancel_date = optional_date("cancel_date", input.cancel_date.as_deref())?;

    let customer = CustomerRecord::new(NewCustomer {
        name: input.name,
        signup_date,
        plan_value,
        status,
        cancel_date,
    })?;
    state.repo.insert(&customer).await?;

    Ok((StatusCode::CREATED, Json(customer)))
}

/// # DELETE /api/customers/:id
pub async fn delete_customer(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, AppError> {
    state.repo.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// # PUT /api/customers/:id/status
pub async fn update_customer_status(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
    Json(input): Json<StatusInput>,
) -> Result<Json<CustomerRecord>, AppError> {
    let status = CustomerStatus::from_str(&input.status)?;
    let cancel_date = optional_date("cancel_date", input.cancel_date.as_deref())?;

    let updated = state.repo.update_status(id, status, cancel_date).await?;
    Ok(Json(updated))
}

/// # GET /api/metrics/monthly
pub async fn get_monthly_metrics(
    State(state): State<Arc<AppState>>,
    Query(as_of): Query<AsOf>,
) -> Json<Vec<MonthlyMetric>> {
    let customers = state.repo.load().await;
    Json(state.engine.compute_monthly_series_as_of(&customers, as_of.date()))
}

/// # GET /api/metrics/ltv
pub async fn get_ltv(
    State(state): State<Arc<AppState>>,
    Query(as_of): Query<AsOf>,
) -> Json<LtvResponse> {
    let customers = state.repo.load().await;
    let today = as_of.date();
    Json(LtvResponse {
        summary: state.engine.compute_ltv_summary_as_of(&customers, today),
        customers: state.engine.compute_customer_ltvs_as_of(&customers, today),
    })
}

/// # GET /api/metrics/summary
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Query(as_of): Query<AsOf>,
) -> Json<DashboardSummary> {
    let customers = state.repo.load().await;
    Json(state.engine.compute_summary_as_of(&customers, as_of.date()))
}

/// # GET /api/export/metrics.csv
pub async fn export_metrics_csv(
    State(state): State<Arc<AppState>>,
    Query(as_of): Query<AsOf>,
) -> Result<impl IntoResponse, AppError> {
    let customers = state.repo.load().await;
    let series = state.engine.compute_monthly_series_as_of(&customers, as_of.date());

    let mut body = Vec::new();
    database::write_monthly_metrics(&mut body, &series)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"metrics.csv\""),
        ],
        body,
    ))
}
