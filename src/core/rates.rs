const DAYS_PER_YEAR: f64 = 365.0;

// Missing or non-numeric form values arrive as NaN and count as zero.
pub fn pct_to_rate(pct: f64) -> f64 {
    if pct.is_finite() { pct / 100.0 } else { 0.0 }
}

pub fn effective_rate(annual_return: f64, management_fee: f64, periods_per_year: u32) -> f64 {
    let net_annual = annual_return - management_fee;
    (1.0 + net_annual).powf(1.0 / periods_per_year as f64) - 1.0
}

pub fn daily_rate(annual_return: f64, management_fee: f64) -> f64 {
    let net_annual = annual_return - management_fee;
    (1.0 + net_annual).powf(1.0 / DAYS_PER_YEAR) - 1.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaxedGain {
    pub after_tax_gain: f64,
    pub tax: f64,
}

pub fn apply_tax(gain: f64, tax_rate: f64) -> TaxedGain {
    let tax = gain.max(0.0) * tax_rate;
    TaxedGain {
        after_tax_gain: gain - tax,
        tax,
    }
}

pub fn inflate_to_real(nominal: f64, inflation: f64, years: f64) -> f64 {
    nominal / (1.0 + inflation).powf(years)
}

pub fn cagr(final_value: f64, total_contributed: f64, years: f64) -> f64 {
    (final_value / total_contributed.max(1.0)).powf(1.0 / years) - 1.0
}

pub fn annualize(period_rate: f64, periods_per_year: u32) -> f64 {
    (1.0 + period_rate).powf(periods_per_year as f64) - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    #[test]
    fn pct_to_rate_divides_by_hundred() {
        assert_approx_tol(pct_to_rate(8.0), 0.08, 1e-15);
        assert_approx_tol(pct_to_rate(-2.5), -0.025, 1e-15);
        assert_eq!(pct_to_rate(f64::NAN), 0.0);
    }

    #[test]
    fn effective_rate_is_geometric_not_divided() {
        let monthly = effective_rate(0.08, 0.0, 12);
        assert_approx_tol(monthly, 0.006_434, 1e-6);
        assert!(monthly < 0.08 / 12.0);
        assert_approx_tol((1.0 + monthly).powi(12), 1.08, 1e-12);
    }

    #[test]
    fn effective_rate_nets_out_management_fee() {
        assert_approx_tol(effective_rate(0.07, 0.01, 1), 0.06, 1e-12);
    }

    #[test]
    fn effective_rate_below_total_loss_is_nan() {
        assert!(effective_rate(-1.2, 0.0, 12).is_nan());
        assert!(daily_rate(-0.5, 0.6).is_nan());
    }

    #[test]
    fn apply_tax_only_taxes_positive_gains() {
        let taxed = apply_tax(100.0, 0.2);
        assert_approx_tol(taxed.tax, 20.0, 1e-12);
        assert_approx_tol(taxed.after_tax_gain, 80.0, 1e-12);

        let loss = apply_tax(-50.0, 0.2);
        assert_eq!(loss.tax, 0.0);
        assert_eq!(loss.after_tax_gain, -50.0);
    }

    #[test]
    fn cagr_floors_contributed_base_at_one() {
        let degenerate = cagr(100.0, 0.0, 1.0);
        assert!(degenerate.is_finite());
        assert_approx_tol(degenerate, 99.0, 1e-12);
        assert_approx_tol(cagr(121.0, 100.0, 2.0), 0.1, 1e-12);
    }

    #[test]
    fn inflate_to_real_deflates_by_compound_inflation() {
        assert_approx_tol(inflate_to_real(110.25, 0.05, 2.0), 100.0, 1e-9);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_annualize_inverts_effective_rate(
            annual_bp in -9_000i32..30_000,
            periods_per_year in 1u32..366
        ) {
            let annual = annual_bp as f64 / 10_000.0;
            let period = effective_rate(annual, 0.0, periods_per_year);
            prop_assert!((annualize(period, periods_per_year) - annual).abs() < 1e-9);
        }

        #[test]
        fn prop_tax_split_conserves_gain(gain in -1.0e7f64..1.0e7, tax_bp in 0u32..10_000) {
            let taxed = apply_tax(gain, tax_bp as f64 / 10_000.0);
            prop_assert!(taxed.tax >= 0.0);
            prop_assert!((taxed.after_tax_gain + taxed.tax - gain).abs() <= 1e-6);
        }
    }
}
