
use approx::{assert_abs_diff_eq, assert_relative_eq};
use merton_lib::{
    implied_volatility, price_black_scholes, ContractSpec, MertonError, OptionType,
};
use test_utils::central_diff;

fn atm_call() -> ContractSpec {
    ContractSpec::call(100.0, 100.0, 0.03, 0.0, 0.5).unwrap()
}

#[test]
fn test_reference_price() {
    let result = price_black_scholes(&atm_call(), 0.2).unwrap();
    assert_abs_diff_eq!(result.price, 6.371027942167466, epsilon = 1e-10);
    assert_eq!(result.terms_used, 1);
    assert!(!result.low_confidence);
}

#[test]
fn test_textbook_values() {
    // S=42, K=40, r=10%, σ=20%, six months
    let call = ContractSpec::call(42.0, 40.0, 0.1, 0.0, 0.5).unwrap();
    let put = call.with_option_type(OptionType::Put);
    assert_abs_diff_eq!(
        price_black_scholes(&call, 0.2).unwrap().price,
        4.759422392871535,
        epsilon = 1e-10
    );
    assert_abs_diff_eq!(
        price_black_scholes(&put, 0.2).unwrap().price,
        0.8085993729000975,
        epsilon = 1e-10
    );
}

#[test]
fn test_put_call_parity() {
    for &(s, k, r, q, t, sigma) in &[
        (100.0, 100.0, 0.03, 0.0, 0.5, 0.2),
        (80.0, 120.0, 0.05, 0.02, 2.0, 0.35),
        (150.0, 90.0, -0.01, 0.03, 0.1, 0.6),
    ] {
        let call = ContractSpec::call(s, k, r, q, t).unwrap();
        let put = call.with_option_type(OptionType::Put);
        let c = price_black_scholes(&call, sigma).unwrap().price;
        let p = price_black_scholes(&put, sigma).unwrap().price;
        let forward_gap = s * (-q * t).exp() - k * (-r * t).exp();
        assert_abs_diff_eq!(c - p, forward_gap, epsilon = 1e-10);
    }
}

#[test]
fn test_monotonicity_and_positive_vega() {
    let mut last = f64::NEG_INFINITY;
    for i in 0..40 {
        let s = 60.0 + 2.0 * i as f64;
        let r = price_black_scholes(&ContractSpec::call(s, 100.0, 0.03, 0.0, 1.0).unwrap(), 0.25).unwrap();
        assert!(r.price >= last);
        assert!(r.greeks.vega >= 0.0);
        last = r.price;
    }

    let mut last = f64::INFINITY;
    for i in 0..40 {
        let k = 60.0 + 2.0 * i as f64;
        let r = price_black_scholes(&ContractSpec::call(100.0, k, 0.03, 0.0, 1.0).unwrap(), 0.25).unwrap();
        assert!(r.price <= last);
        last = r.price;
    }
}

#[test]
fn test_short_maturity_converges_to_intrinsic() {
    let itm_call = ContractSpec::call(110.0, 100.0, 0.03, 0.0, 1e-8).unwrap();
    let otm_put = itm_call.with_option_type(OptionType::Put);
    assert_abs_diff_eq!(price_black_scholes(&itm_call, 0.2).unwrap().price, 10.0, epsilon = 1e-4);
    assert_abs_diff_eq!(price_black_scholes(&otm_put, 0.2).unwrap().price, 0.0, epsilon = 1e-6);
}

#[test]
fn test_expired_contract_boundary() {
    let call = ContractSpec::call(90.0, 100.0, 0.03, 0.0, 0.0).unwrap();
    let put = call.with_option_type(OptionType::Put);

    let c = price_black_scholes(&call, 0.2).unwrap();
    assert_eq!(c.price, 0.0);
    assert_eq!(c.greeks.delta, 0.0);

    let p = price_black_scholes(&put, 0.2).unwrap();
    assert_eq!(p.price, 10.0);
    assert_eq!(p.greeks.delta, -1.0);
    assert_eq!(p.greeks.gamma, 0.0);
    assert_eq!(p.greeks.vega, 0.0);
    assert_eq!(p.greeks.theta, 0.0);
    assert_eq!(p.greeks.rho, 0.0);
}

#[test]
fn test_zero_vol_prices_discounted_forward_payoff() {
    let call = ContractSpec::call(100.0, 95.0, 0.05, 0.0, 1.0).unwrap();
    let expected = 100.0 - 95.0 * (-0.05f64).exp();
    assert_abs_diff_eq!(price_black_scholes(&call, 0.0).unwrap().price, expected, epsilon = 1e-12);
}

#[test]
fn test_greeks_match_finite_differences() {
    let base = ContractSpec::new(105.0, 100.0, 0.04, 0.01, 0.75, OptionType::Put).unwrap();
    let sigma = 0.3;
    let g = price_black_scholes(&base, sigma).unwrap().greeks;
    let px = |c: &ContractSpec, v: f64| price_black_scholes(c, v).unwrap().price;

    let delta = central_diff(|s| px(&base.with_spot(s), sigma), base.spot, 1e-3);
    let gamma = central_diff(
        |s| central_diff(|s2| px(&base.with_spot(s2), sigma), s, 1e-3),
        base.spot,
        1e-2,
    );
    let vega = central_diff(|v| px(&base, v), sigma, 1e-5);
    let theta = -central_diff(|t| px(&base.with_maturity(t), sigma), base.maturity, 1e-5);
    let rho = central_diff(
        |r| {
            let mut c = base;
            c.rate = r;
            px(&c, sigma)
        },
        base.rate,
        1e-5,
    );

    assert_relative_eq!(g.delta, delta, max_relative = 1e-6);
    assert_relative_eq!(g.gamma, gamma, max_relative = 1e-4);
    assert_relative_eq!(g.vega, vega, max_relative = 1e-6);
    assert_relative_eq!(g.theta, theta, max_relative = 1e-5);
    assert_relative_eq!(g.rho, rho, max_relative = 1e-6);
}

#[test]
fn test_invalid_inputs_rejected() {
    assert!(matches!(
        ContractSpec::call(0.0, 100.0, 0.03, 0.0, 0.5),
        Err(MertonError::Validation(_))
    ));
    assert!(matches!(
        ContractSpec::call(100.0, -5.0, 0.03, 0.0, 0.5),
        Err(MertonError::Validation(_))
    ));
    assert!(ContractSpec::call(100.0, 100.0, f64::NAN, 0.0, 0.5).is_err());

    let mut bad = atm_call();
    bad.spot = -1.0;
    assert!(matches!(price_black_scholes(&bad, 0.2), Err(MertonError::Validation(_))));
    assert!(matches!(price_black_scholes(&atm_call(), -0.2), Err(MertonError::Validation(_))));
    assert!(price_black_scholes(&atm_call(), f64::INFINITY).is_err());
}

#[test]
fn test_implied_volatility_round_trip() {
    for &(k, ot, vol) in &[
        (80.0, OptionType::Put, 0.35),
        (100.0, OptionType::Call, 0.2),
        (130.0, OptionType::Call, 0.55),
    ] {
        let contract = ContractSpec::new(100.0, k, 0.02, 0.01, 0.8, ot).unwrap();
        let price = price_black_scholes(&contract, vol).unwrap().price;
        let iv = implied_volatility(&contract, price).unwrap();
        assert_abs_diff_eq!(iv, vol, epsilon = 1e-8);
    }
}

#[test]
fn test_implied_volatility_rejects_arbitrage_prices() {
    let call = atm_call();
    assert!(implied_volatility(&call, 0.0).is_err());
    assert!(implied_volatility(&call, 150.0).is_err());
    let expired = call.with_maturity(0.0);
    assert!(implied_volatility(&expired, 1.0).is_err());
}
