use chrono::NaiveDate;

use super::error::InputError;
use super::rates::{cagr, effective_rate, inflate_to_real};
use super::types::{CashFlow, DatedCashFlow, GoalInput, GoalResult, GoalSolveFor};

const XIRR_DAYS_PER_YEAR: f64 = 365.0;
const GOAL_YEARS_MAX: f64 = 100.0;
const GOAL_ITERATIONS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootSearch {
    pub low: f64,
    pub high: f64,
    pub iterations: u32,
    pub tolerance: Option<f64>,
}

impl RootSearch {
    pub const XIRR: RootSearch = RootSearch {
        low: -0.9999,
        high: 10.0,
        iterations: 100,
        tolerance: Some(1e-6),
    };

    pub const LOAN: RootSearch = RootSearch {
        low: -0.9999,
        high: 10.0,
        iterations: 200,
        tolerance: Some(1e-7),
    };
}

pub fn npv(flows: &[CashFlow], rate: f64) -> f64 {
    flows
        .iter()
        .map(|cf| cf.amount / (1.0 + rate).powf(cf.t))
        .sum()
}

pub fn solve_rate(flows: &[CashFlow], search: RootSearch) -> f64 {
    if flows.len() < 2 {
        return f64::NAN;
    }
    let has_outflow = flows.iter().any(|cf| cf.amount < 0.0);
    let has_inflow = flows.iter().any(|cf| cf.amount > 0.0);
    if !has_outflow || !has_inflow {
        return f64::NAN;
    }

    let Some((mut lo, at_lo)) = finite_floor(flows, search.low, search.high) else {
        return f64::NAN;
    };
    let mut hi = search.high;
    let at_hi = npv(flows, hi);
    if at_hi.is_nan() {
        return f64::NAN;
    }
    if at_lo == 0.0 {
        return lo;
    }
    if at_hi == 0.0 {
        return hi;
    }
    if (at_lo > 0.0) == (at_hi > 0.0) {
        return f64::NAN;
    }

    for _ in 0..search.iterations {
        let mid = (lo + hi) * 0.5;
        let value = npv(flows, mid);
        if value.is_nan() {
            return f64::NAN;
        }
        if value == 0.0 || search.tolerance.is_some_and(|tol| value.abs() < tol) {
            return mid;
        }
        // The sign at `lo` never changes while bisecting.
        if (value > 0.0) == (at_lo > 0.0) {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    (lo + hi) * 0.5
}

// Near -100% the discount factor `(1 + low)^t` underflows for flows a
// century out and the npv becomes inf - inf. Move the floor away from -1 a
// decade at a time until it evaluates.
fn finite_floor(flows: &[CashFlow], low: f64, high: f64) -> Option<(f64, f64)> {
    let mut lo = low;
    loop {
        let value = npv(flows, lo);
        if value.is_finite() {
            return Some((lo, value));
        }
        let gap = (1.0 + lo) * 10.0;
        if gap <= 0.0 || gap - 1.0 >= high {
            return None;
        }
        lo = gap - 1.0;
    }
}

pub fn xirr(flows: &[DatedCashFlow]) -> f64 {
    let Some(first) = flows.first() else {
        return f64::NAN;
    };
    let timed = timed_flows(first.date, flows);
    solve_rate(&timed, RootSearch::XIRR)
}

fn timed_flows(origin: NaiveDate, flows: &[DatedCashFlow]) -> Vec<CashFlow> {
    flows
        .iter()
        .map(|cf| CashFlow {
            t: (cf.date - origin).num_days() as f64 / XIRR_DAYS_PER_YEAR,
            amount: cf.amount,
        })
        .collect()
}

pub fn future_value_of_payments(payment: f64, period_rate: f64, periods: u32) -> f64 {
    let n = periods as f64;
    if period_rate == 0.0 {
        return payment * n;
    }
    payment * ((1.0 + period_rate).powf(n) - 1.0) / period_rate
}

pub fn solve_payment_for_target(
    target: f64,
    annual_rate: f64,
    years: f64,
    periods_per_year: u32,
) -> f64 {
    let period_rate = effective_rate(annual_rate, 0.0, periods_per_year);
    payment_for_target(target, period_rate, goal_periods(years, periods_per_year))
}

fn payment_for_target(target: f64, period_rate: f64, periods: u32) -> f64 {
    if target <= 0.0 || periods == 0 {
        return 0.0;
    }
    let n = periods as f64;
    if period_rate == 0.0 {
        return target / n;
    }
    target * period_rate / ((1.0 + period_rate).powf(n) - 1.0)
}

pub fn solve_years_for_target(
    target: f64,
    annual_rate: f64,
    payment: f64,
    periods_per_year: u32,
) -> f64 {
    let period_rate = effective_rate(annual_rate, 0.0, periods_per_year);
    years_for_target(target, period_rate, payment, periods_per_year)
}

fn years_for_target(target: f64, period_rate: f64, payment: f64, periods_per_year: u32) -> f64 {
    let mut lo = 0.0;
    let mut hi = GOAL_YEARS_MAX;
    for _ in 0..GOAL_ITERATIONS {
        let mid = (lo + hi) * 0.5;
        let fv = future_value_of_payments(payment, period_rate, goal_periods(mid, periods_per_year));
        if fv >= target {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    (lo + hi) * 0.5
}

fn goal_periods(years: f64, periods_per_year: u32) -> u32 {
    (years * periods_per_year as f64).round().max(0.0) as u32
}

pub fn plan_goal(input: &GoalInput) -> Result<GoalResult, InputError> {
    input.validate()?;

    let m = input.periods_per_year;
    let period_rate = effective_rate(input.annual_return, input.management_fee, m);
    let gross_target = input.target / (1.0 - input.back_fee);

    let (payment, years, reachable) = match input.solve_for {
        GoalSolveFor::Payment { years } => {
            let net = payment_for_target(gross_target, period_rate, goal_periods(years, m));
            (net / (1.0 - input.front_fee), years.max(0.0), true)
        }
        GoalSolveFor::Years { payment } => {
            let net = payment * (1.0 - input.front_fee);
            let years = years_for_target(gross_target, period_rate, net, m);
            let best = future_value_of_payments(net, period_rate, goal_periods(GOAL_YEARS_MAX, m));
            (payment, years, best >= gross_target)
        }
    };

    let periods = goal_periods(years, m);
    let total_contributed = payment * years * m as f64;
    log::debug!(
        "goal solved: target={} payment={payment} years={years} reachable={reachable}",
        input.target
    );

    Ok(GoalResult {
        payment,
        years,
        periods,
        total_contributed,
        final_real: inflate_to_real(input.target, input.inflation, years),
        total_gain: input.target - total_contributed,
        cagr: cagr(input.target, total_contributed, years),
        reachable,
    })
}
