use chrono::NaiveDate;

use super::calendar::{PeriodCalendar, day_label, days_between, month_label};
use super::error::InputError;
use super::rates::{apply_tax, cagr, daily_rate, effective_rate, inflate_to_real};
use super::solver::xirr;
use super::types::{
    ContributionRule, DatedCashFlow, IrregularDeposit, LedgerRow, PeriodKey, SeriesPoint,
    Simulation, SimulationInput, SimulationResult,
};

const MONTHS_PER_YEAR: f64 = 12.0;
const DAYS_PER_YEAR: f64 = 365.0;

pub fn simulate(input: &SimulationInput) -> Result<Simulation, InputError> {
    input.validate()?;

    let simulation = match &input.rule {
        ContributionRule::Irregular {
            deposits,
            end_date,
            ending_value,
        } => simulate_irregular(input, deposits, *end_date, *ending_value),
        _ => simulate_periodic(input),
    };
    log::debug!(
        "simulated {} run: {} ledger rows, final value {}",
        input.rule.label(),
        simulation.ledger.len(),
        simulation.result.final_value
    );
    Ok(simulation)
}

#[derive(Debug, Clone, Copy)]
enum ContributionSchedule {
    None,
    Constant {
        per_period: f64,
    },
    StepUp {
        current: f64,
        step_rate: f64,
        step_every: u32,
        cap: f64,
        scale: f64,
    },
}

impl ContributionSchedule {
    fn from_rule(rule: &ContributionRule, periods_per_year: u32) -> Self {
        let scale = monthly_scale(periods_per_year);
        match *rule {
            ContributionRule::Recurring { amount } => ContributionSchedule::Constant {
                per_period: amount * scale,
            },
            ContributionRule::StepUp {
                amount,
                step_rate,
                step_every,
                cap,
            } => ContributionSchedule::StepUp {
                current: amount,
                step_rate,
                step_every: step_every.max(1),
                cap,
                scale,
            },
            ContributionRule::LumpSum | ContributionRule::Irregular { .. } => {
                ContributionSchedule::None
            }
        }
    }

    fn gross_for_period(&self) -> f64 {
        match *self {
            ContributionSchedule::None => 0.0,
            ContributionSchedule::Constant { per_period } => per_period,
            ContributionSchedule::StepUp {
                current,
                cap,
                scale,
                ..
            } => {
                let capped = if cap > 0.0 { current.min(cap) } else { current };
                capped * scale
            }
        }
    }

    // Escalates after `period` has contributed; the new amount is paid from
    // the next period on.
    fn end_period(&mut self, period: u32) {
        if let ContributionSchedule::StepUp {
            current,
            step_rate,
            step_every,
            ..
        } = self
        {
            if period % *step_every == 0 {
                *current *= 1.0 + *step_rate;
            }
        }
    }
}

fn monthly_scale(periods_per_year: u32) -> f64 {
    if periods_per_year == 12 {
        1.0
    } else {
        MONTHS_PER_YEAR / periods_per_year as f64
    }
}

fn simulate_periodic(input: &SimulationInput) -> Simulation {
    let m = input.periods_per_year;
    let periods = input.period_count();
    let rate = effective_rate(input.annual_return, input.management_fee, m);
    let calendar = PeriodCalendar::new(input.start_date, m);
    let mut schedule = ContributionSchedule::from_rule(&input.rule, m);

    let mut balance = input.principal * (1.0 - input.front_fee);
    let mut total_contributed = input.principal;

    let mut ledger = Vec::with_capacity(periods as usize + 1);
    let mut series = Vec::with_capacity((periods / m) as usize);
    ledger.push(LedgerRow {
        key: PeriodKey::Index(0),
        date: input.start_date,
        contribution: balance,
        gain: 0.0,
        fee: input.principal * input.front_fee,
        tax: 0.0,
        balance,
    });

    for period in 1..=periods {
        let gross = schedule.gross_for_period();
        let fee = gross * input.front_fee;
        let contribution = gross - fee;
        balance += contribution;
        total_contributed += gross;

        let gain = balance * rate;
        let taxed = apply_tax(gain, input.tax_rate);
        balance += taxed.after_tax_gain;
        schedule.end_period(period);

        let date = calendar.date(period - 1);
        ledger.push(LedgerRow {
            key: PeriodKey::Index(period),
            date,
            contribution,
            gain,
            fee,
            tax: taxed.tax,
            balance,
        });
        if period % m == 0 {
            series.push(SeriesPoint {
                label: month_label(date),
                balance,
            });
        }
    }

    let final_value = balance * (1.0 - input.back_fee);
    Simulation {
        ledger,
        series,
        result: SimulationResult {
            final_value,
            final_real: inflate_to_real(final_value, input.inflation, input.years),
            total_contributed,
            total_gain: final_value - total_contributed,
            cagr: cagr(final_value, total_contributed, input.years),
            periods,
            periods_per_year: Some(m),
            years: input.years,
            xirr: None,
        },
    }
}

// Entry/exit fees and tax are not applied to dated deposits.
fn simulate_irregular(
    input: &SimulationInput,
    deposits: &[IrregularDeposit],
    end_date: NaiveDate,
    ending_value: Option<f64>,
) -> Simulation {
    let mut deposits = deposits.to_vec();
    deposits.sort_by_key(|d| d.date);

    let rate = daily_rate(input.annual_return, input.management_fee);
    let mut balance = 0.0;
    let mut total_contributed = 0.0;
    let mut ledger = Vec::with_capacity(deposits.len() + 1);
    let mut series = Vec::with_capacity(2);
    let mut cursor = deposits.first().map(|d| d.date).unwrap_or(end_date);

    for (idx, deposit) in deposits.iter().enumerate() {
        let gain = accrue_daily(&mut balance, rate, cursor, deposit.date);
        cursor = deposit.date;
        balance += deposit.amount;
        if deposit.amount > 0.0 {
            total_contributed += deposit.amount;
        }
        ledger.push(LedgerRow {
            key: PeriodKey::Date(deposit.date),
            date: deposit.date,
            contribution: deposit.amount,
            gain,
            fee: 0.0,
            tax: 0.0,
            balance,
        });
        if idx == 0 {
            series.push(SeriesPoint {
                label: day_label(deposit.date),
                balance,
            });
        }
    }

    let gain = accrue_daily(&mut balance, rate, cursor, end_date);
    if !deposits.is_empty() {
        ledger.push(LedgerRow {
            key: PeriodKey::Date(end_date),
            date: end_date,
            contribution: 0.0,
            gain,
            fee: 0.0,
            tax: 0.0,
            balance,
        });
    }
    series.push(SeriesPoint {
        label: day_label(end_date),
        balance,
    });

    let final_value = ending_value.unwrap_or(balance);
    let mut flows: Vec<DatedCashFlow> = deposits
        .iter()
        .map(|d| DatedCashFlow {
            date: d.date,
            amount: -d.amount,
        })
        .collect();
    flows.push(DatedCashFlow {
        date: end_date,
        amount: final_value,
    });
    let money_weighted = xirr(&flows);

    let years = match deposits.first() {
        Some(first) => days_between(first.date, end_date) as f64 / DAYS_PER_YEAR,
        None => 0.0,
    };

    Simulation {
        ledger,
        series,
        result: SimulationResult {
            final_value,
            final_real: inflate_to_real(final_value, input.inflation, years),
            total_contributed,
            total_gain: final_value - total_contributed,
            cagr: money_weighted,
            periods: deposits.len() as u32,
            periods_per_year: None,
            years,
            xirr: Some(money_weighted),
        },
    }
}

fn accrue_daily(balance: &mut f64, daily: f64, from: NaiveDate, to: NaiveDate) -> f64 {
    let start = *balance;
    for _ in 0..days_between(from, to).max(0) {
        *balance *= 1.0 + daily;
    }
    *balance - start
}
