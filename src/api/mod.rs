use axum::{
    Router,
    extract::{Json, Query},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{Local, NaiveDate};
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::str::FromStr;
use tokio::net::TcpListener;

use crate::core::{
    ContributionRule, GoalInput, GoalResult, GoalSolveFor, InputError, IrregularDeposit, LedgerRow,
    Loan, LoanInput, LoanMethod, LoanPreset, SeriesPoint, SimulationInput, SimulationResult,
    pct_to_rate, plan_goal, run_loan, simulate,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliMode {
    Lump,
    Dca,
    StepUp,
    Irregular,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliGoalSolveFor {
    Payment,
    Years,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliLoanMethod {
    Annuity,
    EqualPrincipal,
    InterestOnly,
}

impl From<CliLoanMethod> for LoanMethod {
    fn from(value: CliLoanMethod) -> Self {
        match value {
            CliLoanMethod::Annuity => LoanMethod::Annuity,
            CliLoanMethod::EqualPrincipal => LoanMethod::EqualPrincipal,
            CliLoanMethod::InterestOnly => LoanMethod::InterestOnly,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliLoanPreset {
    Personal,
    Mortgage,
    Auto,
    Policy,
}

impl From<CliLoanPreset> for LoanPreset {
    fn from(value: CliLoanPreset) -> Self {
        match value {
            CliLoanPreset::Personal => LoanPreset::Personal,
            CliLoanPreset::Mortgage => LoanPreset::Mortgage,
            CliLoanPreset::Auto => LoanPreset::Auto,
            CliLoanPreset::Policy => LoanPreset::Policy,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiMode {
    #[serde(alias = "lumpSum", alias = "lump_sum")]
    Lump,
    #[serde(alias = "recurring")]
    Dca,
    #[serde(alias = "stepUp", alias = "step_up", alias = "step")]
    StepUp,
    #[serde(alias = "cashflows")]
    Irregular,
}

impl From<ApiMode> for CliMode {
    fn from(value: ApiMode) -> Self {
        match value {
            ApiMode::Lump => CliMode::Lump,
            ApiMode::Dca => CliMode::Dca,
            ApiMode::StepUp => CliMode::StepUp,
            ApiMode::Irregular => CliMode::Irregular,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiGoalSolveFor {
    #[serde(alias = "monthly", alias = "amount")]
    Payment,
    Years,
}

impl From<ApiGoalSolveFor> for CliGoalSolveFor {
    fn from(value: ApiGoalSolveFor) -> Self {
        match value {
            ApiGoalSolveFor::Payment => CliGoalSolveFor::Payment,
            ApiGoalSolveFor::Years => CliGoalSolveFor::Years,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ApiLoanMethod {
    Annuity,
    #[serde(alias = "equal-principal", alias = "equalPrincipal")]
    EqualPrincipal,
    #[serde(alias = "interest-only", alias = "interestOnly")]
    InterestOnly,
}

impl From<ApiLoanMethod> for CliLoanMethod {
    fn from(value: ApiLoanMethod) -> Self {
        match value {
            ApiLoanMethod::Annuity => CliLoanMethod::Annuity,
            ApiLoanMethod::EqualPrincipal => CliLoanMethod::EqualPrincipal,
            ApiLoanMethod::InterestOnly => CliLoanMethod::InterestOnly,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ApiLoanPreset {
    Personal,
    Mortgage,
    Auto,
    Policy,
}

impl From<ApiLoanPreset> for CliLoanPreset {
    fn from(value: ApiLoanPreset) -> Self {
        match value {
            ApiLoanPreset::Personal => CliLoanPreset::Personal,
            ApiLoanPreset::Mortgage => CliLoanPreset::Mortgage,
            ApiLoanPreset::Auto => CliLoanPreset::Auto,
            ApiLoanPreset::Policy => CliLoanPreset::Policy,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawCashflow {
    pub date: String,
    pub amount: f64,
    pub note: String,
}

impl FromStr for RawCashflow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let date = parts.next().unwrap_or_default().to_string();
        let amount = parts
            .next()
            .ok_or_else(|| format!("expected DATE:AMOUNT[:NOTE], got {s:?}"))?
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid cash-flow amount in {s:?}: {e}"))?;
        let note = parts.next().unwrap_or_default().to_string();
        Ok(Self { date, amount, note })
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct SimulateArgs {
    #[arg(long, value_enum, default_value_t = CliMode::Lump)]
    pub mode: CliMode,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Initial principal invested before the first period"
    )]
    pub principal: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Monthly contribution for dca, starting contribution for step-up"
    )]
    pub amount: f64,
    #[arg(long, default_value_t = 8.0, help = "Expected annual return in percent")]
    pub annual_return: f64,
    #[arg(long, default_value_t = 10.0)]
    pub years: f64,
    #[arg(long, default_value_t = 12, help = "Compounding periods per year")]
    pub compound_freq: u32,
    #[arg(
        long,
        default_value_t = 2.0,
        help = "Expected annual inflation in percent"
    )]
    pub inflation: f64,
    #[arg(long, default_value_t = 0.0, help = "Front-load fee in percent")]
    pub fee_pct: f64,
    #[arg(long, default_value_t = 0.0, help = "Redemption fee in percent")]
    pub redeem_pct: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Annual management fee in percent"
    )]
    pub mgmt_pct: f64,
    #[arg(long, default_value_t = 0.0, help = "Tax on positive gains in percent")]
    pub tax_pct: f64,
    #[arg(long, help = "First period date as YYYY-MM-DD; defaults to today")]
    pub start_date: Option<String>,
    #[arg(
        long,
        default_value_t = 5.0,
        help = "Step-up increase per cycle in percent"
    )]
    pub step_pct: f64,
    #[arg(long, default_value_t = 12, help = "Periods between step-up increases")]
    pub step_freq: u32,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Ceiling on the monthly step-up contribution; 0 disables it"
    )]
    pub step_cap: f64,
    #[arg(long = "cashflow", value_name = "DATE:AMOUNT[:NOTE]")]
    pub cashflows: Vec<RawCashflow>,
    #[arg(long, help = "Valuation date for irregular deposits; defaults to today")]
    pub end_date: Option<String>,
    #[arg(
        long,
        help = "Observed value at the end date; defaults to the simulated balance"
    )]
    pub ending_value: Option<f64>,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct GoalArgs {
    #[arg(long, default_value_t = 10_000_000.0, help = "Amount to reach")]
    pub target: f64,
    #[arg(long, value_enum, default_value_t = CliGoalSolveFor::Payment)]
    pub solve_for: CliGoalSolveFor,
    #[arg(
        long,
        default_value_t = 15.0,
        help = "Horizon in years when solving for the payment"
    )]
    pub years: f64,
    #[arg(
        long,
        default_value_t = 10_000.0,
        help = "Monthly payment when solving for the years"
    )]
    pub monthly: f64,
    #[arg(long, default_value_t = 8.0, help = "Expected annual return in percent")]
    pub annual_return: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Annual management fee in percent"
    )]
    pub mgmt_pct: f64,
    #[arg(long, default_value_t = 12)]
    pub compound_freq: u32,
    #[arg(long, default_value_t = 0.0, help = "Front-load fee in percent")]
    pub fee_pct: f64,
    #[arg(long, default_value_t = 0.0, help = "Redemption fee in percent")]
    pub redeem_pct: f64,
    #[arg(
        long,
        default_value_t = 2.0,
        help = "Expected annual inflation in percent"
    )]
    pub inflation: f64,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct LoanArgs {
    #[arg(long, value_enum)]
    pub preset: Option<CliLoanPreset>,
    #[arg(long, help = "Amount borrowed")]
    pub amount: f64,
    #[arg(long, help = "Nominal annual rate in percent")]
    pub apr: Option<f64>,
    #[arg(long)]
    pub years: Option<f64>,
    #[arg(long, help = "Payments per year")]
    pub periods_per_year: Option<u32>,
    #[arg(long, value_enum)]
    pub method: Option<CliLoanMethod>,
    #[arg(long, help = "First payment date as YYYY-MM-DD; defaults to today")]
    pub start: Option<String>,
    #[arg(long, default_value_t = 0.0, help = "Fixed upfront fee")]
    pub fee_fixed: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Upfront fee in percent of the amount"
    )]
    pub fee_pct: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    mode: Option<ApiMode>,
    principal: Option<f64>,
    amount: Option<f64>,
    // The web form keeps one input per tab and posts them all at once; the
    // active mode picks which one applies.
    lump_amount: Option<f64>,
    dca_initial: Option<f64>,
    dca_amount: Option<f64>,
    step_initial: Option<f64>,
    step_base: Option<f64>,
    annual_return: Option<f64>,
    years: Option<f64>,
    compound_freq: Option<u32>,
    inflation: Option<f64>,
    fee_pct: Option<f64>,
    redeem_pct: Option<f64>,
    mgmt_pct: Option<f64>,
    tax_pct: Option<f64>,
    start_date: Option<String>,
    step_pct: Option<f64>,
    step_freq: Option<u32>,
    step_cap: Option<f64>,
    cashflows: Option<Vec<RawCashflow>>,
    end_date: Option<String>,
    ending_value: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct GoalPayload {
    goal_target: Option<f64>,
    goal_solve_for: Option<ApiGoalSolveFor>,
    goal_years: Option<f64>,
    goal_monthly: Option<f64>,
    annual_return: Option<f64>,
    mgmt_pct: Option<f64>,
    compound_freq: Option<u32>,
    fee_pct: Option<f64>,
    redeem_pct: Option<f64>,
    inflation: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LoanPayload {
    preset: Option<ApiLoanPreset>,
    loan_amount: Option<f64>,
    #[serde(alias = "loanAPR")]
    loan_apr: Option<f64>,
    loan_years: Option<f64>,
    #[serde(alias = "loanPY")]
    loan_py: Option<u32>,
    loan_method: Option<ApiLoanMethod>,
    loan_start: Option<String>,
    loan_fee_fixed: Option<f64>,
    loan_fee_pct: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateResponse {
    pub mode: &'static str,
    pub result: SimulationResult,
    pub ledger: Vec<LedgerRow>,
    pub series: Vec<SeriesPoint>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn parse_date(
    field: &'static str,
    raw: Option<&str>,
    fallback: NaiveDate,
) -> Result<NaiveDate, InputError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(fallback),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
            InputError::InvalidDate {
                field,
                value: value.to_string(),
            }
        }),
    }
}

fn parse_deposits(rows: &[RawCashflow]) -> Vec<IrregularDeposit> {
    rows.iter()
        .filter_map(|row| {
            let deposit = IrregularDeposit::from_raw(&row.date, row.amount, &row.note);
            if deposit.is_none() {
                log::warn!("dropping cash flow with unparseable date {:?}", row.date);
            }
            deposit
        })
        .collect()
}

pub fn build_simulation_input(
    args: &SimulateArgs,
    today: NaiveDate,
) -> Result<SimulationInput, InputError> {
    let start_date = parse_date("startDate", args.start_date.as_deref(), today)?;
    let rule = match args.mode {
        CliMode::Lump => ContributionRule::LumpSum,
        CliMode::Dca => ContributionRule::Recurring {
            amount: args.amount,
        },
        CliMode::StepUp => ContributionRule::StepUp {
            amount: args.amount,
            step_rate: pct_to_rate(args.step_pct),
            step_every: args.step_freq,
            cap: args.step_cap,
        },
        CliMode::Irregular => ContributionRule::Irregular {
            deposits: parse_deposits(&args.cashflows),
            end_date: parse_date("endDate", args.end_date.as_deref(), today)?,
            ending_value: args.ending_value,
        },
    };

    Ok(SimulationInput {
        principal: args.principal,
        rule,
        annual_return: pct_to_rate(args.annual_return),
        management_fee: pct_to_rate(args.mgmt_pct),
        periods_per_year: args.compound_freq,
        front_fee: pct_to_rate(args.fee_pct),
        back_fee: pct_to_rate(args.redeem_pct),
        tax_rate: pct_to_rate(args.tax_pct),
        inflation: pct_to_rate(args.inflation),
        years: args.years,
        start_date,
    })
}

pub fn build_goal_input(args: &GoalArgs) -> GoalInput {
    let solve_for = match args.solve_for {
        CliGoalSolveFor::Payment => GoalSolveFor::Payment { years: args.years },
        CliGoalSolveFor::Years => GoalSolveFor::Years {
            payment: args.monthly,
        },
    };
    GoalInput {
        target: args.target,
        solve_for,
        annual_return: pct_to_rate(args.annual_return),
        management_fee: pct_to_rate(args.mgmt_pct),
        periods_per_year: args.compound_freq,
        front_fee: pct_to_rate(args.fee_pct),
        back_fee: pct_to_rate(args.redeem_pct),
        inflation: pct_to_rate(args.inflation),
    }
}

pub fn build_loan_input(args: &LoanArgs, today: NaiveDate) -> Result<LoanInput, InputError> {
    let (preset_method, preset_apr, preset_years, preset_py) = args
        .preset
        .map(LoanPreset::from)
        .unwrap_or(LoanPreset::Mortgage)
        .terms();

    Ok(LoanInput {
        principal: args.amount,
        annual_rate: pct_to_rate(args.apr.unwrap_or(preset_apr)),
        term_years: args.years.unwrap_or(preset_years),
        periods_per_year: args.periods_per_year.unwrap_or(preset_py),
        method: args.method.map(LoanMethod::from).unwrap_or(preset_method),
        start_date: parse_date("loanStart", args.start.as_deref(), today)?,
        fee_fixed: args.fee_fixed,
        fee_rate: pct_to_rate(args.fee_pct),
    })
}

pub fn run_simulation(
    args: &SimulateArgs,
    today: NaiveDate,
) -> Result<SimulateResponse, InputError> {
    let input = build_simulation_input(args, today)?;
    let simulation = simulate(&input)?;
    Ok(SimulateResponse {
        mode: input.rule.label(),
        result: simulation.result,
        ledger: simulation.ledger,
        series: simulation.series,
    })
}

pub fn run_goal(args: &GoalArgs) -> Result<GoalResult, InputError> {
    plan_goal(&build_goal_input(args))
}

pub fn run_loan_schedule(args: &LoanArgs, today: NaiveDate) -> Result<Loan, InputError> {
    run_loan(&build_loan_input(args, today)?)
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/goal", get(goal_get_handler).post(goal_post_handler))
        .route("/api/loan", get(loan_get_handler).post(loan_post_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    log::info!("invest HTTP API listening on http://{addr}");
    log::info!("local access: http://127.0.0.1:{port}/api/simulate");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload)
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload)
}

fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let args = simulate_args_from_payload(payload);
    match run_simulation(&args, today()) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(err) => rejected("/api/simulate", err),
    }
}

async fn goal_get_handler(Query(payload): Query<GoalPayload>) -> Response {
    goal_handler_impl(payload)
}

async fn goal_post_handler(Json(payload): Json<GoalPayload>) -> Response {
    goal_handler_impl(payload)
}

fn goal_handler_impl(payload: GoalPayload) -> Response {
    match run_goal(&goal_args_from_payload(payload)) {
        Ok(result) => json_response(StatusCode::OK, result),
        Err(err) => rejected("/api/goal", err),
    }
}

async fn loan_get_handler(Query(payload): Query<LoanPayload>) -> Response {
    loan_handler_impl(payload)
}

async fn loan_post_handler(Json(payload): Json<LoanPayload>) -> Response {
    loan_handler_impl(payload)
}

fn loan_handler_impl(payload: LoanPayload) -> Response {
    match run_loan_schedule(&loan_args_from_payload(payload), today()) {
        Ok(loan) => json_response(StatusCode::OK, loan),
        Err(err) => rejected("/api/loan", err),
    }
}

fn rejected(route: &str, err: InputError) -> Response {
    log::warn!("{route} rejected: {err}");
    error_response(StatusCode::BAD_REQUEST, &err.to_string())
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn simulate_args_from_payload(payload: SimulatePayload) -> SimulateArgs {
    let mut args = default_simulate_args();

    if let Some(v) = payload.mode {
        args.mode = v.into();
    }
    let (tab_principal, tab_amount) = match args.mode {
        CliMode::Lump => (payload.lump_amount, None),
        CliMode::Dca => (payload.dca_initial, payload.dca_amount),
        CliMode::StepUp => (payload.step_initial, payload.step_base),
        CliMode::Irregular => (None, None),
    };
    if let Some(v) = tab_principal.or(payload.principal) {
        args.principal = v;
    }
    if let Some(v) = tab_amount.or(payload.amount) {
        args.amount = v;
    }
    if let Some(v) = payload.annual_return {
        args.annual_return = v;
    }
    if let Some(v) = payload.years {
        args.years = v;
    }
    if let Some(v) = payload.compound_freq {
        args.compound_freq = v;
    }
    if let Some(v) = payload.inflation {
        args.inflation = v;
    }
    if let Some(v) = payload.fee_pct {
        args.fee_pct = v;
    }
    if let Some(v) = payload.redeem_pct {
        args.redeem_pct = v;
    }
    if let Some(v) = payload.mgmt_pct {
        args.mgmt_pct = v;
    }
    if let Some(v) = payload.tax_pct {
        args.tax_pct = v;
    }
    if payload.start_date.is_some() {
        args.start_date = payload.start_date;
    }
    if let Some(v) = payload.step_pct {
        args.step_pct = v;
    }
    if let Some(v) = payload.step_freq {
        args.step_freq = v;
    }
    if let Some(v) = payload.step_cap {
        args.step_cap = v;
    }
    if let Some(v) = payload.cashflows {
        args.cashflows = v;
    }
    if payload.end_date.is_some() {
        args.end_date = payload.end_date;
    }
    if payload.ending_value.is_some() {
        args.ending_value = payload.ending_value;
    }

    args
}

fn goal_args_from_payload(payload: GoalPayload) -> GoalArgs {
    let mut args = default_goal_args();

    if let Some(v) = payload.goal_target {
        args.target = v;
    }
    if let Some(v) = payload.goal_solve_for {
        args.solve_for = v.into();
    }
    if let Some(v) = payload.goal_years {
        args.years = v;
    }
    if let Some(v) = payload.goal_monthly {
        args.monthly = v;
    }
    if let Some(v) = payload.annual_return {
        args.annual_return = v;
    }
    if let Some(v) = payload.mgmt_pct {
        args.mgmt_pct = v;
    }
    if let Some(v) = payload.compound_freq {
        args.compound_freq = v;
    }
    if let Some(v) = payload.fee_pct {
        args.fee_pct = v;
    }
    if let Some(v) = payload.redeem_pct {
        args.redeem_pct = v;
    }
    if let Some(v) = payload.inflation {
        args.inflation = v;
    }

    args
}

fn loan_args_from_payload(payload: LoanPayload) -> LoanArgs {
    LoanArgs {
        preset: payload.preset.map(Into::into),
        amount: payload.loan_amount.unwrap_or(0.0),
        apr: payload.loan_apr,
        years: payload.loan_years,
        periods_per_year: payload.loan_py,
        method: payload.loan_method.map(Into::into),
        start: payload.loan_start,
        fee_fixed: payload.loan_fee_fixed.unwrap_or(0.0),
        fee_pct: payload.loan_fee_pct.unwrap_or(0.0),
    }
}

fn default_simulate_args() -> SimulateArgs {
    SimulateArgs {
        mode: CliMode::Lump,
        principal: 0.0,
        amount: 0.0,
        annual_return: 8.0,
        years: 10.0,
        compound_freq: 12,
        inflation: 2.0,
        fee_pct: 0.0,
        redeem_pct: 0.0,
        mgmt_pct: 0.0,
        tax_pct: 0.0,
        start_date: None,
        step_pct: 5.0,
        step_freq: 12,
        step_cap: 0.0,
        cashflows: Vec::new(),
        end_date: None,
        ending_value: None,
    }
}

fn default_goal_args() -> GoalArgs {
    GoalArgs {
        target: 10_000_000.0,
        solve_for: CliGoalSolveFor::Payment,
        years: 15.0,
        monthly: 10_000.0,
        annual_return: 8.0,
        mgmt_pct: 0.0,
        compound_freq: 12,
        fee_pct: 0.0,
        redeem_pct: 0.0,
        inflation: 2.0,
    }
}

#[cfg(test)]
fn simulate_args_from_json(json: &str) -> Result<SimulateArgs, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    Ok(simulate_args_from_payload(payload))
}
