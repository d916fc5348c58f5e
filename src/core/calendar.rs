use chrono::{Days, Months, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Months(u32),
    Days(u64),
}

#[derive(Debug, Clone, Copy)]
pub struct PeriodCalendar {
    start: NaiveDate,
    step: Step,
}

impl PeriodCalendar {
    pub fn new(start: NaiveDate, periods_per_year: u32) -> Self {
        let periods_per_year = periods_per_year.max(1);
        let step = if 12 % periods_per_year == 0 {
            Step::Months(12 / periods_per_year)
        } else {
            Step::Days((365.0 / periods_per_year as f64).round().max(1.0) as u64)
        };
        Self { start, step }
    }

    // Offsets are taken from the anchor so month-end clamping never drifts.
    pub fn date(&self, index: u32) -> NaiveDate {
        let shifted = match self.step {
            Step::Months(months) => self
                .start
                .checked_add_months(Months::new(months.saturating_mul(index))),
            Step::Days(days) => self
                .start
                .checked_add_days(Days::new(days.saturating_mul(index as u64))),
        };
        shifted.unwrap_or(NaiveDate::MAX)
    }
}

pub fn month_label(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

pub fn day_label(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}
