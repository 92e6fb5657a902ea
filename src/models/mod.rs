pub mod bs;
pub mod greeks;
pub mod merton;
pub mod types;

/// Numerical helpers shared by the pricers
pub mod utils {
    use std::f64::consts::{FRAC_1_SQRT_2, PI};

    /// Standard normal cumulative distribution function.
    ///
    /// Uses `erfc` rather than `1 + erf` so that the lower tail keeps full
    /// relative precision.
    pub fn norm_cdf(x: f64) -> f64 {
        0.5 * libm::erfc(-x * FRAC_1_SQRT_2)
    }

    /// Standard normal probability density function.
    pub fn norm_pdf(x: f64) -> f64 {
        (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_norm_cdf_reference_values() {
            assert!((norm_cdf(0.0) - 0.5).abs() < 1e-16);
            assert!((norm_cdf(1.959963984540054) - 0.975).abs() < 1e-12);
            assert!((norm_cdf(-1.0) + norm_cdf(1.0) - 1.0).abs() < 1e-15);
            // Lower tail must not collapse to zero
            assert!(norm_cdf(-30.0) > 0.0);
        }

        #[test]
        fn test_norm_pdf_peak() {
            assert!((norm_pdf(0.0) - 0.3989422804014327).abs() < 1e-15);
        }
    }
}
