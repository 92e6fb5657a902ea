// Closed-form Black-Scholes pricing, analytic Greeks and implied volatility.
// The raw kernels (`bs_price`, `bs_greeks`) skip validation so the Merton
// series can call them with drift-adjusted rates and per-term volatilities;
// the contract-level functions validate first.

use crate::error::{ensure_finite, ensure_non_negative, MertonError, MertonResult};
use crate::models::types::{ContractSpec, Greeks, OptionType, PriceResult};
use crate::models::utils::{norm_cdf, norm_pdf};
use roots::{find_root_brent, SimpleConvergency};

/// d1 and d2 for strictly positive `sigma` and `t`.
fn d1_d2(s: f64, k: f64, r: f64, q: f64, sigma: f64, t: f64) -> (f64, f64) {
    let vol_sqrt_t = sigma * t.sqrt();
    let d1 = ((s / k).ln() + (r - q + 0.5 * sigma * sigma) * t) / vol_sqrt_t;
    (d1, d1 - vol_sqrt_t)
}

/// Price of a European option under Black-Scholes assumptions.
///
/// `t <= 0` returns intrinsic value; `sigma <= 0` returns the discounted
/// payoff at the forward price.
pub fn bs_price(option_type: OptionType, s: f64, k: f64, r: f64, q: f64, sigma: f64, t: f64) -> f64 {
    if t <= 0.0 {
        return (option_type.sign() * (s - k)).max(0.0);
    }
    let df_q = (-q * t).exp();
    let df_r = (-r * t).exp();
    if sigma <= 0.0 {
        return (option_type.sign() * (s * df_q - k * df_r)).max(0.0);
    }
    let (d1, d2) = d1_d2(s, k, r, q, sigma, t);
    // The put leg uses N(-d) directly; algebraically identical to parity but
    // keeps precision for far out-of-the-money puts.
    match option_type {
        OptionType::Call => s * df_q * norm_cdf(d1) - k * df_r * norm_cdf(d2),
        OptionType::Put => k * df_r * norm_cdf(-d2) - s * df_q * norm_cdf(-d1),
    }
}

/// Analytic Black-Scholes Greeks with the same boundary conventions as
/// [`bs_price`].
pub fn bs_greeks(option_type: OptionType, s: f64, k: f64, r: f64, q: f64, sigma: f64, t: f64) -> Greeks {
    let sign = option_type.sign();
    if t <= 0.0 {
        let in_the_money = sign * (s - k) > 0.0;
        let delta = if in_the_money { sign } else { 0.0 };
        return Greeks::new(delta, 0.0, 0.0, 0.0, 0.0);
    }

    let df_q = (-q * t).exp();
    let df_r = (-r * t).exp();

    if sigma <= 0.0 {
        // Deterministic forward payoff: V = max(sign·(S·e^(-qT) - K·e^(-rT)), 0)
        let in_the_money = sign * (s * df_q - k * df_r) > 0.0;
        if !in_the_money {
            return Greeks::default();
        }
        return Greeks::new(
            sign * df_q,
            0.0,
            0.0,
            sign * (q * s * df_q - r * k * df_r),
            sign * k * t * df_r,
        );
    }

    let sqrt_t = t.sqrt();
    let (d1, d2) = d1_d2(s, k, r, q, sigma, t);
    let pdf_d1 = norm_pdf(d1);
    let nd1 = norm_cdf(sign * d1);
    let nd2 = norm_cdf(sign * d2);

    let delta = sign * df_q * nd1;
    let gamma = df_q * pdf_d1 / (s * sigma * sqrt_t);
    let vega = s * df_q * pdf_d1 * sqrt_t;
    let theta = -s * df_q * pdf_d1 * sigma / (2.0 * sqrt_t) - sign * r * k * df_r * nd2
        + sign * q * s * df_q * nd1;
    let rho = sign * k * t * df_r * nd2;

    Greeks::new(delta, gamma, vega, theta, rho)
}

fn validate_sigma(sigma: f64) -> MertonResult<()> {
    ensure_non_negative("sigma", sigma)
}

/// Black-Scholes price of a validated contract.
pub fn price(contract: &ContractSpec, sigma: f64) -> MertonResult<f64> {
    contract.validate()?;
    validate_sigma(sigma)?;
    Ok(bs_price(
        contract.option_type,
        contract.spot,
        contract.strike,
        contract.rate,
        contract.dividend_yield,
        sigma,
        contract.maturity,
    ))
}

/// Black-Scholes Greeks of a validated contract.
pub fn greeks(contract: &ContractSpec, sigma: f64) -> MertonResult<Greeks> {
    contract.validate()?;
    validate_sigma(sigma)?;
    Ok(bs_greeks(
        contract.option_type,
        contract.spot,
        contract.strike,
        contract.rate,
        contract.dividend_yield,
        sigma,
        contract.maturity,
    ))
}

/// Price and Greeks in one call.
pub fn price_with_greeks(contract: &ContractSpec, sigma: f64) -> MertonResult<PriceResult> {
    Ok(PriceResult {
        price: price(contract, sigma)?,
        greeks: greeks(contract, sigma)?,
        terms_used: 1,
        low_confidence: false,
    })
}

const IV_LOWER: f64 = 1e-8;
const IV_INITIAL_UPPER: f64 = 5.0;
const IV_MAX_UPPER: f64 = 80.0;

/// Black-Scholes implied volatility of `market_price`, solved with Brent's
/// method.
///
/// Fails with a validation error when the contract has expired or the price
/// lies outside the no-arbitrage band (discounted forward intrinsic, upper
/// bound S·e^(-qT) for calls and K·e^(-rT) for puts).
pub fn implied_volatility(contract: &ContractSpec, market_price: f64) -> MertonResult<f64> {
    contract.validate()?;
    ensure_finite("market_price", market_price)?;
    if contract.maturity <= 0.0 {
        return Err(MertonError::validation(
            "implied volatility is undefined for an expired contract",
        ));
    }

    let t = contract.maturity;
    let lower_bound = (contract.option_type.sign() * contract.parity_value()).max(0.0);
    let upper_bound = match contract.option_type {
        OptionType::Call => contract.spot * (-contract.dividend_yield * t).exp(),
        OptionType::Put => contract.strike * (-contract.rate * t).exp(),
    };
    if market_price <= lower_bound || market_price >= upper_bound {
        return Err(MertonError::validation(format!(
            "price {} outside the no-arbitrage band ({}, {}) for {} K={} T={}",
            market_price, lower_bound, upper_bound, contract.option_type, contract.strike, t
        )));
    }

    let objective = |sigma: f64| {
        bs_price(
            contract.option_type,
            contract.spot,
            contract.strike,
            contract.rate,
            contract.dividend_yield,
            sigma,
            t,
        ) - market_price
    };

    let mut upper = IV_INITIAL_UPPER;
    while objective(upper) < 0.0 {
        upper *= 2.0;
        if upper > IV_MAX_UPPER {
            return Err(MertonError::validation(format!(
                "no implied volatility below {} reproduces price {}",
                IV_MAX_UPPER, market_price
            )));
        }
    }

    let mut convergency = SimpleConvergency {
        eps: 1e-12f64,
        max_iter: 200,
    };
    find_root_brent(IV_LOWER, upper, &objective, &mut convergency).map_err(|e| {
        MertonError::validation(format!(
            "implied volatility search failed for price {}: {:?}",
            market_price, e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_price() {
        // Hull, Options Futures and Other Derivatives, Example 15.6
        let c = bs_price(OptionType::Call, 42.0, 40.0, 0.1, 0.0, 0.2, 0.5);
        let p = bs_price(OptionType::Put, 42.0, 40.0, 0.1, 0.0, 0.2, 0.5);
        assert!((c - 4.759422).abs() < 1e-5);
        assert!((p - 0.808599).abs() < 1e-5);
    }

    #[test]
    fn test_zero_vol_is_discounted_forward_payoff() {
        let c = bs_price(OptionType::Call, 100.0, 90.0, 0.05, 0.0, 0.0, 1.0);
        assert!((c - (100.0 - 90.0 * (-0.05f64).exp())).abs() < 1e-12);
        let p = bs_price(OptionType::Put, 100.0, 90.0, 0.05, 0.0, 0.0, 1.0);
        assert_eq!(p, 0.0);
    }

    #[test]
    fn test_expired_greeks() {
        let g = bs_greeks(OptionType::Put, 90.0, 100.0, 0.05, 0.0, 0.2, 0.0);
        assert_eq!(g.delta, -1.0);
        assert_eq!(g.gamma, 0.0);
        assert_eq!(g.theta, 0.0);
        let g = bs_greeks(OptionType::Call, 90.0, 100.0, 0.05, 0.0, 0.2, 0.0);
        assert_eq!(g.delta, 0.0);
    }
}
