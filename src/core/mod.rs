mod calendar;
mod engine;
mod error;
mod loan;
mod rates;
mod solver;
mod types;

pub use calendar::PeriodCalendar;
pub use engine::simulate;
pub use error::InputError;
pub use loan::{Amortization, AmortizationStep, amortize, annuity_payment, effective_apr, run_loan};
pub use rates::{
    TaxedGain, annualize, apply_tax, cagr, daily_rate, effective_rate, inflate_to_real, pct_to_rate,
};
pub use solver::{
    RootSearch, future_value_of_payments, npv, plan_goal, solve_payment_for_target, solve_rate,
    solve_years_for_target, xirr,
};
pub use types::{
    CashFlow, ContributionRule, DatedCashFlow, GoalInput, GoalResult, GoalSolveFor,
    IrregularDeposit, LedgerRow, Loan, LoanInput, LoanMethod, LoanPreset, LoanResult,
    LoanScheduleRow, MAX_HORIZON_YEARS, MAX_PERIODS_PER_YEAR, PeriodKey, SeriesPoint, Simulation,
    SimulationInput, SimulationResult,
};
