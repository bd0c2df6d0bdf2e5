/// Property-based tests using proptest
/// Tests invariants of the coverage formula that should hold for all inputs
use coverage_api::core::estimator::{estimate, LAKH};
use coverage_api::core::models::ApplicantProfile;
use proptest::prelude::*;
use serde_json::{json, Value};

fn profile(annual_income: f64, age: u32, dependents: u32) -> ApplicantProfile {
    ApplicantProfile {
        name: "Test".to_string(),
        age,
        city: "Kochi".to_string(),
        annual_income,
        dependents,
    }
}

fn weather_strategy() -> impl Strategy<Value = Option<Value>> {
    proptest::option::of((-30.0f64..55.0).prop_map(|t| json!({ "main": { "temp": t } })))
}

fn crypto_strategy() -> impl Strategy<Value = Option<Value>> {
    proptest::option::of(
        (1_000u32..120_000u32).prop_map(|p| json!({ "bpi": { "USD": { "rate": format!("{}.00", p) } } })),
    )
}

// Property: coverage is always a whole number of lakhs
proptest! {
    #[test]
    fn coverage_is_multiple_of_lakh(
        income in 1u64..50_000_000u64,
        age in 1u32..100u32,
        dependents in 0u32..20u32,
        weather in weather_strategy(),
        crypto in crypto_strategy()
    ) {
        let est = estimate(
            &profile(income as f64, age, dependents),
            weather.as_ref(),
            crypto.as_ref(),
        ).unwrap();
        prop_assert_eq!(est.coverage % LAKH, 0);
        prop_assert!(est.coverage >= 0);
        prop_assert!(est.monthly_premium >= 0);
    }

    #[test]
    fn more_dependents_never_lowers_coverage(
        income in 1u64..50_000_000u64,
        age in 1u32..100u32,
        dependents in 0u32..20u32,
        weather in weather_strategy(),
        crypto in crypto_strategy()
    ) {
        let fewer = estimate(
            &profile(income as f64, age, dependents),
            weather.as_ref(),
            crypto.as_ref(),
        ).unwrap();
        let more = estimate(
            &profile(income as f64, age, dependents + 1),
            weather.as_ref(),
            crypto.as_ref(),
        ).unwrap();
        prop_assert!(more.coverage >= fewer.coverage);
    }

    #[test]
    fn missing_enrichment_matches_neutral_enrichment(
        income in 1u64..50_000_000u64,
        age in 1u32..100u32,
        dependents in 0u32..20u32
    ) {
        let p = profile(income as f64, age, dependents);
        let bare = estimate(&p, None, None).unwrap();
        let neutral = estimate(
            &p,
            Some(&json!({ "main": { "temp": 22.0 } })),
            Some(&json!({ "bpi": { "USD": { "rate": "50,000.00" } } })),
        ).unwrap();
        prop_assert_eq!(bare.coverage, neutral.coverage);
        prop_assert_eq!(bare.monthly_premium, neutral.monthly_premium);
    }
}
