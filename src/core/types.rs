use chrono::NaiveDate;
use serde::Serialize;

use super::error::InputError;

pub const MAX_HORIZON_YEARS: f64 = 100.0;
pub const MAX_PERIODS_PER_YEAR: u32 = 365;

#[derive(Debug, Clone, PartialEq)]
pub enum ContributionRule {
    LumpSum,
    Recurring {
        amount: f64,
    },
    StepUp {
        amount: f64,
        step_rate: f64,
        step_every: u32,
        cap: f64,
    },
    Irregular {
        deposits: Vec<IrregularDeposit>,
        end_date: NaiveDate,
        ending_value: Option<f64>,
    },
}

impl ContributionRule {
    pub fn label(&self) -> &'static str {
        match self {
            ContributionRule::LumpSum => "lump",
            ContributionRule::Recurring { .. } => "dca",
            ContributionRule::StepUp { .. } => "step-up",
            ContributionRule::Irregular { .. } => "irregular",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrregularDeposit {
    pub date: NaiveDate,
    pub amount: f64,
    pub note: String,
}

impl IrregularDeposit {
    pub fn from_raw(date: &str, amount: f64, note: &str) -> Option<Self> {
        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
        Some(Self {
            date,
            amount: if amount.is_finite() { amount } else { 0.0 },
            note: note.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct SimulationInput {
    pub principal: f64,
    pub rule: ContributionRule,
    pub annual_return: f64,
    pub management_fee: f64,
    pub periods_per_year: u32,
    pub front_fee: f64,
    pub back_fee: f64,
    pub tax_rate: f64,
    pub inflation: f64,
    pub years: f64,
    pub start_date: NaiveDate,
}

impl SimulationInput {
    pub fn validate(&self) -> Result<(), InputError> {
        if !self.principal.is_finite() || self.principal < 0.0 {
            return Err(InputError::invalid("principal", "must be >= 0"));
        }
        if self.periods_per_year == 0 || self.periods_per_year > MAX_PERIODS_PER_YEAR {
            return Err(InputError::invalid(
                "periods_per_year",
                format!("must be between 1 and {MAX_PERIODS_PER_YEAR}"),
            ));
        }
        if !self.years.is_finite() || !(0.0..=MAX_HORIZON_YEARS).contains(&self.years) {
            return Err(InputError::invalid(
                "years",
                format!("must be between 0 and {MAX_HORIZON_YEARS}"),
            ));
        }
        validate_rate("front_fee", self.front_fee)?;
        validate_rate("back_fee", self.back_fee)?;
        validate_rate("tax_rate", self.tax_rate)?;
        for (field, value) in [
            ("annual_return", self.annual_return),
            ("management_fee", self.management_fee),
            ("inflation", self.inflation),
        ] {
            if !value.is_finite() {
                return Err(InputError::invalid(field, "must be finite"));
            }
        }

        match &self.rule {
            ContributionRule::LumpSum => {}
            ContributionRule::Recurring { amount } => validate_amount("amount", *amount)?,
            ContributionRule::StepUp {
                amount,
                step_rate,
                step_every,
                cap,
            } => {
                validate_amount("amount", *amount)?;
                if *step_every == 0 {
                    return Err(InputError::invalid("step_every", "must be > 0"));
                }
                if !step_rate.is_finite() || *step_rate <= -1.0 {
                    return Err(InputError::invalid("step_rate", "must be > -100%"));
                }
                validate_amount("cap", *cap)?;
            }
            ContributionRule::Irregular { ending_value, .. } => {
                if ending_value.is_some_and(|value| !value.is_finite()) {
                    return Err(InputError::invalid("ending_value", "must be finite"));
                }
            }
        }
        Ok(())
    }

    pub fn period_count(&self) -> u32 {
        (self.years * self.periods_per_year as f64).floor().max(0.0) as u32
    }
}

fn validate_fee(field: &'static str, value: f64) -> Result<(), InputError> {
    if !value.is_finite() || !(0.0..1.0).contains(&value) {
        return Err(InputError::invalid(field, "must be in [0%, 100%)"));
    }
    Ok(())
}

fn validate_rate(field: &'static str, value: f64) -> Result<(), InputError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(InputError::invalid(field, "must be in [0%, 100%]"));
    }
    Ok(())
}

fn validate_amount(field: &'static str, value: f64) -> Result<(), InputError> {
    if !value.is_finite() || value < 0.0 {
        return Err(InputError::invalid(field, "must be >= 0"));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PeriodKey {
    Index(u32),
    Date(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRow {
    pub key: PeriodKey,
    pub date: NaiveDate,
    pub contribution: f64,
    pub gain: f64,
    pub fee: f64,
    pub tax: f64,
    pub balance: f64,
}

impl LedgerRow {
    pub fn after_tax_gain(&self) -> f64 {
        self.gain - self.tax
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub label: String,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub final_value: f64,
    pub final_real: f64,
    pub total_contributed: f64,
    pub total_gain: f64,
    pub cagr: f64,
    pub periods: u32,
    pub periods_per_year: Option<u32>,
    pub years: f64,
    pub xirr: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Simulation {
    pub ledger: Vec<LedgerRow>,
    pub series: Vec<SeriesPoint>,
    pub result: SimulationResult,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CashFlow {
    pub t: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatedCashFlow {
    pub date: NaiveDate,
    pub amount: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanMethod {
    Annuity,
    EqualPrincipal,
    InterestOnly,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LoanPreset {
    Personal,
    Mortgage,
    Auto,
    Policy,
}

impl LoanPreset {
    pub fn terms(self) -> (LoanMethod, f64, f64, u32) {
        match self {
            LoanPreset::Personal => (LoanMethod::Annuity, 8.0, 5.0, 12),
            LoanPreset::Mortgage => (LoanMethod::Annuity, 2.0, 20.0, 12),
            LoanPreset::Auto => (LoanMethod::Annuity, 3.0, 5.0, 12),
            LoanPreset::Policy => (LoanMethod::InterestOnly, 4.0, 3.0, 12),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoanInput {
    pub principal: f64,
    pub annual_rate: f64,
    pub term_years: f64,
    pub periods_per_year: u32,
    pub method: LoanMethod,
    pub start_date: NaiveDate,
    pub fee_fixed: f64,
    pub fee_rate: f64,
}

impl LoanInput {
    pub fn validate(&self) -> Result<(), InputError> {
        validate_amount("principal", self.principal)?;
        validate_amount("fee_fixed", self.fee_fixed)?;
        validate_rate("fee_rate", self.fee_rate)?;
        if !self.annual_rate.is_finite() {
            return Err(InputError::invalid("annual_rate", "must be finite"));
        }
        if self.periods_per_year == 0 || self.periods_per_year > MAX_PERIODS_PER_YEAR {
            return Err(InputError::invalid(
                "periods_per_year",
                format!("must be between 1 and {MAX_PERIODS_PER_YEAR}"),
            ));
        }
        if !self.term_years.is_finite() || !(0.0..=MAX_HORIZON_YEARS).contains(&self.term_years) {
            return Err(InputError::invalid(
                "term_years",
                format!("must be between 0 and {MAX_HORIZON_YEARS}"),
            ));
        }
        Ok(())
    }

    pub fn period_count(&self) -> u32 {
        (self.term_years * self.periods_per_year as f64).round().max(0.0) as u32
    }

    pub fn upfront_fee(&self) -> f64 {
        self.fee_fixed + self.principal * self.fee_rate
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanScheduleRow {
    pub period: u32,
    pub date: NaiveDate,
    pub principal: f64,
    pub interest: f64,
    pub payment: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanResult {
    pub payment: f64,
    pub total_interest: f64,
    pub total_payment: f64,
    pub upfront_fee: f64,
    pub total_cost: f64,
    pub effective_apr: f64,
    pub periods: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Loan {
    pub schedule: Vec<LoanScheduleRow>,
    pub result: LoanResult,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GoalSolveFor {
    Payment { years: f64 },
    Years { payment: f64 },
}

#[derive(Debug, Clone)]
pub struct GoalInput {
    pub target: f64,
    pub solve_for: GoalSolveFor,
    pub annual_return: f64,
    pub management_fee: f64,
    pub periods_per_year: u32,
    pub front_fee: f64,
    pub back_fee: f64,
    pub inflation: f64,
}

impl GoalInput {
    pub fn validate(&self) -> Result<(), InputError> {
        if !self.target.is_finite() {
            return Err(InputError::invalid("target", "must be finite"));
        }
        if self.periods_per_year == 0 || self.periods_per_year > MAX_PERIODS_PER_YEAR {
            return Err(InputError::invalid(
                "periods_per_year",
                format!("must be between 1 and {MAX_PERIODS_PER_YEAR}"),
            ));
        }
        // Both fees divide the target or the payment when grossing up.
        validate_fee("front_fee", self.front_fee)?;
        validate_fee("back_fee", self.back_fee)?;
        match self.solve_for {
            GoalSolveFor::Payment { years } => {
                if !years.is_finite() || years > MAX_HORIZON_YEARS {
                    return Err(InputError::invalid(
                        "years",
                        format!("must be <= {MAX_HORIZON_YEARS}"),
                    ));
                }
            }
            GoalSolveFor::Years { payment } => {
                if !payment.is_finite() {
                    return Err(InputError::invalid("payment", "must be finite"));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalResult {
    pub payment: f64,
    pub years: f64,
    pub periods: u32,
    pub total_contributed: f64,
    pub final_real: f64,
    pub total_gain: f64,
    pub cagr: f64,
    pub reachable: bool,
}
