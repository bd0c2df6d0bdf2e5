//! Coverage estimation.
//!
//! A pure function from the applicant profile and the (optional) enrichment
//! payloads to a recommended sum assured and monthly premium. Every adjustment
//! multiplies the running base, so the steps must be applied in order.

use crate::errors::AppError;
use crate::models::ApplicantProfile;
use serde_json::Value;

/// Rounding granularity for coverage amounts (one lakh).
pub const LAKH: i64 = 100_000;

const INCOME_YEARS: f64 = 12.0;
const DEPENDENT_INCOME_YEARS: f64 = 2.0;
const PREMIUM_RATE: f64 = 0.009;

const SENIOR_AGE: u32 = 45;
const SENIOR_MULTIPLIER: f64 = 1.2;
const MIDDLE_AGE: u32 = 35;
const MIDDLE_MULTIPLIER: f64 = 1.1;

const HOT_TEMPERATURE_C: f64 = 40.0;
const COLD_TEMPERATURE_C: f64 = 5.0;
const EXTREME_WEATHER_MULTIPLIER: f64 = 1.05;

const BULL_MARKET_USD: f64 = 50_000.0;
const BULL_MARKET_MULTIPLIER: f64 = 1.02;

/// An adjustment that fired while computing the estimate.
#[derive(Debug, Clone, PartialEq)]
pub enum Adjustment {
    Age { age: u32, multiplier: f64 },
    Dependents { dependents: u32, amount: f64 },
    ExtremeWeather { temperature: f64 },
    BullMarket { btc_usd: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    /// Multiple of [`LAKH`].
    pub coverage: i64,
    pub monthly_premium: i64,
    pub reasoning: String,
    pub adjustments: Vec<Adjustment>,
}

/// Computes the recommended coverage for `profile`.
///
/// `weather` and `crypto` are the raw provider payloads; `None` means the lookup
/// was unavailable and the corresponding adjustment is skipped.
pub fn estimate(
    profile: &ApplicantProfile,
    weather: Option<&Value>,
    crypto: Option<&Value>,
) -> Result<Estimate, AppError> {
    let income = profile.annual_income;
    let mut adjustments = Vec::new();

    let mut base = income * INCOME_YEARS;

    let age_multiplier = if profile.age > SENIOR_AGE {
        Some(SENIOR_MULTIPLIER)
    } else if profile.age > MIDDLE_AGE {
        Some(MIDDLE_MULTIPLIER)
    } else {
        None
    };
    if let Some(multiplier) = age_multiplier {
        base *= multiplier;
        adjustments.push(Adjustment::Age {
            age: profile.age,
            multiplier,
        });
    }

    let dependents_amount = f64::from(profile.dependents) * income * DEPENDENT_INCOME_YEARS;
    base += dependents_amount;
    if profile.dependents > 0 {
        adjustments.push(Adjustment::Dependents {
            dependents: profile.dependents,
            amount: dependents_amount,
        });
    }

    if let Some(temperature) = weather.and_then(weather_temperature) {
        if temperature > HOT_TEMPERATURE_C || temperature < COLD_TEMPERATURE_C {
            base *= EXTREME_WEATHER_MULTIPLIER;
            tracing::debug!("Weather adjustment applied: {}°C", temperature);
            adjustments.push(Adjustment::ExtremeWeather { temperature });
        }
    }

    if let Some(btc_usd) = crypto.and_then(btc_usd_rate) {
        if btc_usd > BULL_MARKET_USD {
            base *= BULL_MARKET_MULTIPLIER;
            tracing::debug!("Crypto adjustment applied, BTC price: {}", btc_usd);
            adjustments.push(Adjustment::BullMarket { btc_usd });
        }
    }

    let coverage = round_to_lakh(base)?;
    let monthly_premium = to_whole(round_half_up(coverage as f64 * PREMIUM_RATE))?;

    let reasoning = format!(
        "Based on your profile (Age: {}, Income: ₹{}, Dependents: {}) and current market conditions in {}, we recommend ₹{} coverage.",
        profile.age,
        group_thousands(profile.annual_income.trunc() as i64),
        profile.dependents,
        profile.city,
        group_thousands(coverage),
    );

    Ok(Estimate {
        coverage,
        monthly_premium,
        reasoning,
        adjustments,
    })
}

/// Reads `main.temp` (Celsius) from an OpenWeatherMap payload.
pub fn weather_temperature(payload: &Value) -> Option<f64> {
    payload.pointer("/main/temp").and_then(Value::as_f64)
}

/// Reads the USD rate from a CoinDesk `currentprice` payload.
///
/// The rate is a comma-grouped string such as `"64,231.5600"`.
pub fn btc_usd_rate(payload: &Value) -> Option<f64> {
    match payload.pointer("/bpi/USD/rate")? {
        Value::String(rate) => rate.replace(',', "").trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Half-up rounding for non-negative amounts (`floor(x + 0.5)`).
fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

fn round_to_lakh(base: f64) -> Result<i64, AppError> {
    let lakhs = to_whole(round_half_up(base / LAKH as f64))?;
    lakhs
        .checked_mul(LAKH)
        .ok_or_else(|| AppError::InternalError(format!("coverage out of range: {}", base)))
}

fn to_whole(x: f64) -> Result<i64, AppError> {
    if !x.is_finite() || x < 0.0 || x >= i64::MAX as f64 {
        return Err(AppError::InternalError(format!(
            "coverage out of range: {}",
            x
        )));
    }
    Ok(x as i64)
}

/// Formats `n` with en-US thousands separators.
pub fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        grouped.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile(annual_income: f64, age: u32, dependents: u32) -> ApplicantProfile {
        ApplicantProfile {
            name: "Asha".to_string(),
            age,
            city: "Pune".to_string(),
            annual_income,
            dependents,
        }
    }

    fn weather(temp: f64) -> Value {
        json!({ "main": { "temp": temp }, "name": "Pune" })
    }

    fn crypto(rate: &str) -> Value {
        json!({ "bpi": { "USD": { "rate": rate } }, "time": { "updated": "now" } })
    }

    #[test]
    fn test_reference_example() {
        let est = estimate(&profile(600_000.0, 30, 2), None, None).unwrap();
        assert_eq!(est.coverage, 9_600_000);
        assert_eq!(est.monthly_premium, 86_400);
    }

    #[test]
    fn test_age_brackets() {
        let cover = |age| {
            estimate(&profile(1_000_000.0, age, 0), None, None)
                .unwrap()
                .coverage
        };
        assert_eq!(cover(35), 12_000_000);
        assert_eq!(cover(36), 13_200_000);
        assert_eq!(cover(45), 13_200_000);
        assert_eq!(cover(46), 14_400_000);
    }

    #[test]
    fn test_dependents_added_after_age_multiplier() {
        // 1,000,000 * 12 * 1.2 + 2 * 1,000,000 * 2
        let est = estimate(&profile(1_000_000.0, 50, 2), None, None).unwrap();
        assert_eq!(est.coverage, 18_400_000);
    }

    #[test]
    fn test_weather_threshold() {
        let p = profile(1_000_000.0, 30, 0);
        let hot = estimate(&p, Some(&weather(41.0)), None).unwrap();
        let warm = estimate(&p, Some(&weather(40.0)), None).unwrap();
        let cold = estimate(&p, Some(&weather(4.9)), None).unwrap();
        let mild = estimate(&p, Some(&weather(5.0)), None).unwrap();
        assert_eq!(hot.coverage, 12_600_000);
        assert_eq!(warm.coverage, 12_000_000);
        assert_eq!(cold.coverage, 12_600_000);
        assert_eq!(mild.coverage, 12_000_000);
        assert!(hot
            .adjustments
            .contains(&Adjustment::ExtremeWeather { temperature: 41.0 }));
    }

    #[test]
    fn test_crypto_threshold() {
        let p = profile(1_000_000.0, 30, 0);
        let flat = estimate(&p, None, Some(&crypto("50,000.00"))).unwrap();
        let bull = estimate(&p, None, Some(&crypto("50,000.01"))).unwrap();
        assert_eq!(flat.coverage, 12_000_000);
        assert_eq!(bull.coverage, 12_200_000);
    }

    #[test]
    fn test_adjustments_compound() {
        // 1,000,000 * 12 * 1.05 * 1.02 = 12,852,000 -> 12,900,000
        let est = estimate(
            &profile(1_000_000.0, 30, 0),
            Some(&weather(45.0)),
            Some(&crypto("64,231.5600")),
        )
        .unwrap();
        assert_eq!(est.coverage, 12_900_000);
        assert_eq!(est.monthly_premium, 116_100);
    }

    #[test]
    fn test_rounds_half_up_to_lakh() {
        // 12,500 * 12 = 150,000 -> 1.5 lakh rounds up
        let est = estimate(&profile(12_500.0, 30, 0), None, None).unwrap();
        assert_eq!(est.coverage, 200_000);
        // 12,000 * 12 = 144,000 -> 1.44 lakh rounds down
        let est = estimate(&profile(12_000.0, 30, 0), None, None).unwrap();
        assert_eq!(est.coverage, 100_000);
    }

    #[test]
    fn test_malformed_payloads_are_ignored() {
        let p = profile(1_000_000.0, 30, 0);
        let est = estimate(
            &p,
            Some(&json!({ "main": { "temp": "hot" } })),
            Some(&json!({ "bpi": { "USD": { "rate": "n/a" } } })),
        )
        .unwrap();
        assert_eq!(est.coverage, 12_000_000);
        assert!(est.adjustments.is_empty());
    }

    #[test]
    fn test_reasoning_text() {
        let est = estimate(&profile(600_000.0, 30, 2), None, None).unwrap();
        assert_eq!(
            est.reasoning,
            "Based on your profile (Age: 30, Income: ₹600,000, Dependents: 2) and current market conditions in Pune, we recommend ₹9,600,000 coverage."
        );
    }

    #[test]
    fn test_out_of_range_income_is_an_error() {
        let result = estimate(&profile(f64::MAX, 30, 0), None, None);
        assert!(matches!(result, Err(AppError::InternalError(_))));
    }

    #[test]
    fn test_btc_usd_rate_strips_every_comma() {
        assert_eq!(btc_usd_rate(&crypto("1,050,000.25")), Some(1_050_000.25));
        assert_eq!(btc_usd_rate(&json!({})), None);
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_000), "1,000");
        assert_eq!(group_thousands(9_600_000), "9,600,000");
        assert_eq!(group_thousands(-12_345), "-12,345");
    }
}
