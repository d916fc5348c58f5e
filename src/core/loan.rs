use super::calendar::PeriodCalendar;
use super::error::InputError;
use super::rates::annualize;
use super::solver::{RootSearch, solve_rate};
use super::types::{CashFlow, Loan, LoanInput, LoanMethod, LoanResult, LoanScheduleRow};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmortizationStep {
    pub period: u32,
    pub principal: f64,
    pub interest: f64,
    pub payment: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Amortization {
    pub steps: Vec<AmortizationStep>,
    pub payment: f64,
    pub total_interest: f64,
}

pub fn annuity_payment(principal: f64, periodic_rate: f64, periods: u32) -> f64 {
    if periods == 0 {
        return 0.0;
    }
    let n = periods as f64;
    if periodic_rate == 0.0 {
        return principal / n;
    }
    let growth = (1.0 + periodic_rate).powf(n);
    principal * periodic_rate * growth / (growth - 1.0)
}

pub fn amortize(
    principal: f64,
    periodic_rate: f64,
    periods: u32,
    method: LoanMethod,
) -> Amortization {
    let mut steps = Vec::with_capacity(periods as usize);
    let mut balance = principal;

    match method {
        LoanMethod::Annuity => {
            let level = annuity_payment(principal, periodic_rate, periods);
            for period in 1..=periods {
                let interest = balance * periodic_rate;
                // Last period settles the residual so the balance closes at 0.
                let (principal_part, payment) = if period == periods {
                    (balance, balance + interest)
                } else {
                    (level - interest, level)
                };
                balance = (balance - principal_part).max(0.0);
                steps.push(AmortizationStep {
                    period,
                    principal: principal_part,
                    interest,
                    payment,
                    balance,
                });
            }
        }
        LoanMethod::EqualPrincipal => {
            let base = if periods == 0 { 0.0 } else { principal / periods as f64 };
            for period in 1..=periods {
                let interest = balance * periodic_rate;
                let principal_part = if period == periods { balance } else { base };
                balance = (balance - principal_part).max(0.0);
                steps.push(AmortizationStep {
                    period,
                    principal: principal_part,
                    interest,
                    payment: principal_part + interest,
                    balance,
                });
            }
        }
        LoanMethod::InterestOnly => {
            let interest = principal * periodic_rate;
            for period in 1..=periods {
                let last = period == periods;
                let principal_part = if last { principal } else { 0.0 };
                steps.push(AmortizationStep {
                    period,
                    principal: principal_part,
                    interest,
                    payment: interest + principal_part,
                    balance: if last { 0.0 } else { principal },
                });
            }
        }
    }

    let total_interest = steps.iter().map(|s| s.interest).sum();
    let payment = steps.first().map(|s| s.payment).unwrap_or(0.0);
    Amortization {
        steps,
        payment,
        total_interest,
    }
}

pub fn effective_apr(net_received: f64, steps: &[AmortizationStep], periods_per_year: u32) -> f64 {
    let mut flows = Vec::with_capacity(steps.len() + 1);
    flows.push(CashFlow {
        t: 0.0,
        amount: net_received,
    });
    flows.extend(steps.iter().map(|s| CashFlow {
        t: s.period as f64,
        amount: -s.payment,
    }));
    annualize(solve_rate(&flows, RootSearch::LOAN), periods_per_year)
}

pub fn run_loan(input: &LoanInput) -> Result<Loan, InputError> {
    input.validate()?;

    let periods = input.period_count();
    let periodic_rate = input.annual_rate / input.periods_per_year as f64;
    let amortization = amortize(input.principal, periodic_rate, periods, input.method);

    let upfront_fee = input.upfront_fee();
    let total_payment: f64 = amortization.steps.iter().map(|s| s.payment).sum();
    let apr = effective_apr(
        input.principal - upfront_fee,
        &amortization.steps,
        input.periods_per_year,
    );

    let calendar = PeriodCalendar::new(input.start_date, input.periods_per_year);
    let schedule = amortization
        .steps
        .iter()
        .map(|s| LoanScheduleRow {
            period: s.period,
            date: calendar.date(s.period - 1),
            principal: s.principal,
            interest: s.interest,
            payment: s.payment,
            balance: s.balance,
        })
        .collect();

    log::debug!(
        "amortized {:?} loan over {periods} periods, payment {}",
        input.method,
        amortization.payment
    );

    Ok(Loan {
        schedule,
        result: LoanResult {
            payment: amortization.payment,
            total_interest: amortization.total_interest,
            total_payment,
            upfront_fee,
            total_cost: total_payment + upfront_fee,
            effective_apr: apr,
            periods,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn mortgage(method: LoanMethod) -> LoanInput {
        LoanInput {
            principal: 1_000_000.0,
            annual_rate: 0.02,
            term_years: 20.0,
            periods_per_year: 12,
            method,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date"),
            fee_fixed: 0.0,
            fee_rate: 0.0,
        }
    }

    #[test]
    fn annuity_mortgage_matches_standard_payment() {
        let loan = run_loan(&mortgage(LoanMethod::Annuity)).expect("valid loan");
        assert_eq!(loan.result.periods, 240);
        assert_eq!(loan.schedule.len(), 240);
        assert_approx_tol(loan.result.payment, 5_058.83, 0.05);
        assert_eq!(loan.schedule[239].balance, 0.0);
        assert_approx_tol(loan.schedule[239].payment, loan.result.payment, 1e-4);
        assert_approx_tol(
            loan.result.total_interest,
            loan.result.total_payment - 1_000_000.0,
            1e-4,
        );
    }

    #[test]
    fn apr_without_fees_equals_effective_nominal_rate() {
        let loan = run_loan(&mortgage(LoanMethod::Annuity)).expect("valid loan");
        let expected = (1.0 + 0.02 / 12.0_f64).powi(12) - 1.0;
        assert_approx_tol(loan.result.effective_apr, expected, 1e-6);
    }

    #[test]
    fn upfront_fees_raise_apr_and_total_cost() {
        let mut input = mortgage(LoanMethod::Annuity);
        input.fee_fixed = 5_000.0;
        input.fee_rate = 0.01;
        let loan = run_loan(&input).expect("valid loan");
        let plain = run_loan(&mortgage(LoanMethod::Annuity)).expect("valid loan");

        assert_approx_tol(loan.result.upfront_fee, 15_000.0, 1e-9);
        assert_approx_tol(loan.result.total_cost, plain.result.total_payment + 15_000.0, 1e-6);
        assert!(loan.result.effective_apr > plain.result.effective_apr);
    }

    #[test]
    fn equal_principal_payments_decline() {
        let loan = run_loan(&mortgage(LoanMethod::EqualPrincipal)).expect("valid loan");
        let rows = &loan.schedule;
        assert_approx_tol(rows[0].principal, 1_000_000.0 / 240.0, 1e-9);
        assert_approx_tol(rows[0].payment, 1_000_000.0 / 240.0 + 1_000_000.0 * 0.02 / 12.0, 1e-9);
        assert!(rows.windows(2).all(|w| w[1].payment < w[0].payment));
        assert_eq!(rows[239].balance, 0.0);
        assert_approx_tol(loan.result.payment, rows[0].payment, 1e-12);
    }

    #[test]
    fn interest_only_pays_balloon_at_maturity() {
        let mut input = mortgage(LoanMethod::InterestOnly);
        input.principal = 100_000.0;
        input.annual_rate = 0.04;
        input.term_years = 3.0;
        let loan = run_loan(&input).expect("valid loan");
        let rows = &loan.schedule;

        assert_eq!(rows.len(), 36);
        assert!(rows[..35].iter().all(|r| r.balance == 100_000.0 && r.principal == 0.0));
        assert_approx_tol(rows[0].payment, 100_000.0 * 0.04 / 12.0, 1e-9);
        assert_approx_tol(rows[35].payment, 100_000.0 + 100_000.0 * 0.04 / 12.0, 1e-9);
        assert_eq!(rows[35].balance, 0.0);
        assert_approx_tol(loan.result.total_interest, 12_000.0, 1e-6);
    }

    #[test]
    fn zero_rate_annuity_is_straight_line() {
        let steps = amortize(1_200.0, 0.0, 12, LoanMethod::Annuity);
        assert_approx_tol(steps.payment, 100.0, 1e-12);
        assert_eq!(steps.total_interest, 0.0);
        assert_eq!(steps.steps[11].balance, 0.0);
    }

    #[test]
    fn zero_term_loan_has_empty_schedule() {
        let mut input = mortgage(LoanMethod::Annuity);
        input.term_years = 0.0;
        let loan = run_loan(&input).expect("valid loan");
        assert!(loan.schedule.is_empty());
        assert_eq!(loan.result.payment, 0.0);
        assert!(loan.result.effective_apr.is_nan());
    }

    #[test]
    fn schedule_rows_are_dated_per_period() {
        let loan = run_loan(&mortgage(LoanMethod::Annuity)).expect("valid loan");
        assert_eq!(loan.schedule[0].date, NaiveDate::from_ymd_opt(2025, 1, 1).expect("date"));
        assert_eq!(loan.schedule[12].date, NaiveDate::from_ymd_opt(2026, 1, 1).expect("date"));
    }

    #[test]
    fn full_upfront_fee_is_accepted() {
        let mut input = mortgage(LoanMethod::Annuity);
        input.fee_rate = 1.0;
        let loan = run_loan(&input).expect("full fee is a valid input");
        assert_approx_tol(loan.result.upfront_fee, 1_000_000.0, 1e-9);
        assert!(loan.result.effective_apr.is_nan());
    }

    #[test]
    fn run_loan_rejects_zero_frequency() {
        let mut input = mortgage(LoanMethod::Annuity);
        input.periods_per_year = 0;
        assert!(run_loan(&input).is_err());
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(32))]

        #[test]
        fn prop_amortizing_balances_are_monotone_and_close_at_zero(
            principal in 1_000u32..5_000_000,
            rate_bp in 0u32..2_000,
            periods in 1u32..480,
            equal_principal in proptest::bool::ANY
        ) {
            let method = if equal_principal {
                LoanMethod::EqualPrincipal
            } else {
                LoanMethod::Annuity
            };
            let plan = amortize(principal as f64, rate_bp as f64 / 120_000.0, periods, method);
            prop_assert_eq!(plan.steps.len() as u32, periods);
            let mut previous = principal as f64;
            for step in &plan.steps {
                prop_assert!(step.balance <= previous + 1e-9);
                prop_assert!(step.balance >= 0.0);
                prop_assert!((previous - step.principal - step.balance).abs() <= 1e-6 * previous.max(1.0));
                previous = step.balance;
            }
            prop_assert_eq!(plan.steps[plan.steps.len() - 1].balance, 0.0);
        }

        #[test]
        fn prop_amortization_is_deterministic(
            principal in 0u32..2_000_000,
            apr_bp in 0u32..2_500,
            years in 0u32..40,
            periods_per_year in proptest::sample::select(vec![1u32, 2, 4, 12, 26, 52]),
            method in proptest::sample::select(vec![
                LoanMethod::Annuity,
                LoanMethod::EqualPrincipal,
                LoanMethod::InterestOnly,
            ]),
            fee_bp in 0u32..500
        ) {
            let mut input = mortgage(method);
            input.principal = principal as f64;
            input.annual_rate = apr_bp as f64 / 10_000.0;
            input.term_years = years as f64;
            input.periods_per_year = periods_per_year;
            input.fee_rate = fee_bp as f64 / 10_000.0;

            let first = run_loan(&input).expect("valid loan");
            let second = run_loan(&input).expect("valid loan");
            prop_assert_eq!(&first.schedule, &second.schedule);
            prop_assert_eq!(first.result.payment, second.result.payment);
            prop_assert_eq!(first.result.total_cost, second.result.total_cost);
            prop_assert!(
                first.result.effective_apr == second.result.effective_apr
                    || (first.result.effective_apr.is_nan() && second.result.effective_apr.is_nan())
            );
        }
    }
}
