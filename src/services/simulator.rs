//! Simulated payment gateway.
//!
//! Every outcome draws from a [`RandomSource`], so tests can pin approvals and
//! declines. Latency is capped by config and a zero cap skips the delay.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use rand::{Rng, RngCore, SeedableRng, rngs::StdRng};
use serde::Serialize;
use serde_json::{Value, json};
use utoipa::ToSchema;

use crate::{
    config::AppConfig,
    dto::payments::CardData,
    models::{MethodKind, PaymentMethod},
};

pub const EWALLET_SUCCESS_RATE: f64 = 0.95;
pub const CARD_SUCCESS_RATE: f64 = 0.90;

pub const EWALLET_FAILURES: [&str; 4] = [
    "Insufficient e-wallet balance",
    "E-wallet account is inactive",
    "Transaction rejected by the system",
    "Daily transaction limit exceeded",
];

pub const CARD_FAILURES: [&str; 5] = [
    "Card declined by the issuing bank",
    "Invalid CVV",
    "Card has expired",
    "Insufficient card limit",
    "Suspicious transaction",
];

pub const UNSUPPORTED_METHOD: &str = "Unsupported payment method";

const VIRTUAL_ACCOUNT_RANGE: u64 = 9_999_999_999;
const VIRTUAL_ACCOUNT_TTL_HOURS: i64 = 24;

pub trait RandomSource: Send + Sync {
    /// Uniform draw from `[0, 1)`.
    fn unit(&self) -> f64;
    /// Uniform draw from `[0, upper)`; zero when `upper` is zero.
    fn below(&self, upper: u64) -> u64;
    /// `bytes` random bytes, lower-case hex encoded.
    fn hex(&self, bytes: usize) -> String;
}

pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn unit(&self) -> f64 {
        rand::thread_rng().r#gen::<f64>()
    }

    fn below(&self, upper: u64) -> u64 {
        if upper == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..upper)
    }

    fn hex(&self, bytes: usize) -> String {
        let mut buf = vec![0u8; bytes];
        rand::thread_rng().fill_bytes(&mut buf);
        hex::encode(buf)
    }
}

pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut rng)
    }
}

impl RandomSource for SeededRandom {
    fn unit(&self) -> f64 {
        self.with_rng(|rng| rng.r#gen::<f64>())
    }

    fn below(&self, upper: u64) -> u64 {
        if upper == 0 {
            return 0;
        }
        self.with_rng(|rng| rng.gen_range(0..upper))
    }

    fn hex(&self, bytes: usize) -> String {
        let mut buf = vec![0u8; bytes];
        self.with_rng(|rng| rng.fill_bytes(&mut buf));
        hex::encode(buf)
    }
}

/// Always returns the same draws. Pins approvals (`unit` near 0) or
/// declines (`unit` near 1) in tests and demos.
pub struct FixedRandom {
    pub unit: f64,
    pub below: u64,
}

impl FixedRandom {
    pub fn approving() -> Self {
        Self { unit: 0.0, below: 0 }
    }

    pub fn declining() -> Self {
        Self {
            unit: 0.999,
            below: 0,
        }
    }
}

impl RandomSource for FixedRandom {
    fn unit(&self) -> f64 {
        self.unit
    }

    fn below(&self, upper: u64) -> u64 {
        if upper == 0 { 0 } else { self.below % upper }
    }

    fn hex(&self, bytes: usize) -> String {
        "ab".repeat(bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub enum CardBrand {
    Visa,
    Mastercard,
    AmericanExpress,
    Jcb,
    Unknown,
}

impl CardBrand {
    pub fn label(&self) -> &'static str {
        match self {
            CardBrand::Visa => "Visa",
            CardBrand::Mastercard => "Mastercard",
            CardBrand::AmericanExpress => "American Express",
            CardBrand::Jcb => "JCB",
            CardBrand::Unknown => "Unknown",
        }
    }
}

pub fn detect_brand(number: &str) -> CardBrand {
    let digits: String = number.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.starts_with('4') {
        CardBrand::Visa
    } else if ["51", "52", "53", "54", "55"].iter().any(|p| digits.starts_with(p)) {
        CardBrand::Mastercard
    } else if digits.starts_with("34") || digits.starts_with("37") {
        CardBrand::AmericanExpress
    } else if digits.starts_with("35") {
        CardBrand::Jcb
    } else {
        CardBrand::Unknown
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimulationOutcome {
    Approved { external_id: String, details: Value },
    Declined { reason: String },
    /// Input was rejected before any charge was attempted.
    Invalid { reason: String },
}

pub struct PaymentSimulator {
    random: Arc<dyn RandomSource>,
    max_latency: Duration,
}

impl PaymentSimulator {
    pub fn new(random: Arc<dyn RandomSource>, max_latency: Duration) -> Self {
        Self {
            random,
            max_latency,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let random: Arc<dyn RandomSource> = match config.payment_random_seed {
            Some(seed) => Arc::new(SeededRandom::new(seed)),
            None => Arc::new(ThreadRandom),
        };
        Self::new(random, Duration::from_millis(config.payment_max_latency_ms))
    }

    /// Checks the method and its data without drawing randomness.
    pub fn validate(&self, method: &str, card: Option<&CardData>) -> Result<PaymentMethod, String> {
        let method = PaymentMethod::parse(method).ok_or_else(|| UNSUPPORTED_METHOD.to_string())?;
        if method.kind() == MethodKind::Card {
            let card = card.ok_or_else(|| "Card data is incomplete".to_string())?;
            if let Some(field) = card.missing_field() {
                return Err(format!("Card {field} is required"));
            }
        }
        Ok(method)
    }

    pub async fn simulate(
        &self,
        method: &str,
        amount: i64,
        card: Option<&CardData>,
    ) -> SimulationOutcome {
        let method = match self.validate(method, card) {
            Ok(method) => method,
            Err(reason) => return SimulationOutcome::Invalid { reason },
        };

        self.wait(method.kind()).await;

        match method.kind() {
            MethodKind::Ewallet => self.ewallet(method, amount),
            MethodKind::BankTransfer => self.bank_transfer(method, amount),
            MethodKind::Card => match card {
                Some(card) => self.credit_card(card, amount),
                None => SimulationOutcome::Invalid {
                    reason: "Card data is incomplete".into(),
                },
            },
            MethodKind::Cash => self.cash(amount),
        }
    }

    async fn wait(&self, kind: MethodKind) {
        if self.max_latency.is_zero() {
            return;
        }
        let (low_ms, high_ms) = match kind {
            MethodKind::Ewallet => (1_000, 3_000),
            MethodKind::Card => (2_000, 5_000),
            MethodKind::BankTransfer | MethodKind::Cash => return,
        };
        let drawn = Duration::from_millis(low_ms + self.random.below(high_ms - low_ms + 1));
        tokio::time::sleep(drawn.min(self.max_latency)).await;
    }

    fn ewallet(&self, method: PaymentMethod, amount: i64) -> SimulationOutcome {
        if self.random.unit() < EWALLET_SUCCESS_RATE {
            SimulationOutcome::Approved {
                external_id: format!(
                    "{}_{}",
                    method.as_str().to_uppercase(),
                    self.random.hex(8)
                ),
                details: json!({
                    "method": method.as_str(),
                    "amount": amount,
                    "processed_at": Utc::now().to_rfc3339(),
                }),
            }
        } else {
            SimulationOutcome::Declined {
                reason: self.pick(&EWALLET_FAILURES),
            }
        }
    }

    fn bank_transfer(&self, method: PaymentMethod, amount: i64) -> SimulationOutcome {
        let bank = method.as_str().to_uppercase();
        let virtual_account = format!("{bank}{:010}", self.random.below(VIRTUAL_ACCOUNT_RANGE));
        let expires_at = Utc::now() + chrono::Duration::hours(VIRTUAL_ACCOUNT_TTL_HOURS);
        SimulationOutcome::Approved {
            external_id: format!("VA_{virtual_account}"),
            details: json!({
                "method": method.as_str(),
                "virtual_account": virtual_account,
                "amount": amount,
                "bank_name": bank,
                "expires_at": expires_at.to_rfc3339(),
                "instructions": format!(
                    "Transfer {} to virtual account {virtual_account}",
                    format_rupiah(amount)
                ),
            }),
        }
    }

    fn credit_card(&self, card: &CardData, amount: i64) -> SimulationOutcome {
        if self.random.unit() < CARD_SUCCESS_RATE {
            let number = card.number.as_deref().unwrap_or_default();
            let digits: Vec<char> = number.chars().filter(|c| !c.is_whitespace()).collect();
            let last4: String = digits[digits.len().saturating_sub(4)..].iter().collect();
            SimulationOutcome::Approved {
                external_id: format!("CC_{}", self.random.hex(8)),
                details: json!({
                    "method": PaymentMethod::CreditCard.as_str(),
                    "amount": amount,
                    "card_last4": last4,
                    "card_type": detect_brand(number).label(),
                    "processed_at": Utc::now().to_rfc3339(),
                }),
            }
        } else {
            SimulationOutcome::Declined {
                reason: self.pick(&CARD_FAILURES),
            }
        }
    }

    fn cash(&self, amount: i64) -> SimulationOutcome {
        SimulationOutcome::Approved {
            external_id: format!("CASH_{}", self.random.hex(6)),
            details: json!({
                "method": PaymentMethod::Cash.as_str(),
                "amount": amount,
                "note": "Payment is made in person at the location when the service is done",
            }),
        }
    }

    fn pick(&self, reasons: &[&str]) -> String {
        let index = self.random.below(reasons.len() as u64) as usize;
        reasons[index].to_string()
    }
}

/// `17500` -> `Rp 17,500`.
pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        format!("-Rp {grouped}")
    } else {
        format!("Rp {grouped}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PanickingRandom;

    impl RandomSource for PanickingRandom {
        fn unit(&self) -> f64 {
            panic!("randomness drawn")
        }
        fn below(&self, _upper: u64) -> u64 {
            panic!("randomness drawn")
        }
        fn hex(&self, _bytes: usize) -> String {
            panic!("randomness drawn")
        }
    }

    fn simulator(random: impl RandomSource + 'static) -> PaymentSimulator {
        PaymentSimulator::new(Arc::new(random), Duration::ZERO)
    }

    fn card(cvv: Option<&str>) -> CardData {
        CardData {
            number: Some("4111 1111 1111 1111".into()),
            expiry: Some("12/30".into()),
            cvv: cvv.map(Into::into),
            name: Some("Budi".into()),
        }
    }

    #[test]
    fn detects_card_brands() {
        assert_eq!(detect_brand("4111111111111111"), CardBrand::Visa);
        assert_eq!(detect_brand("5500000000000004"), CardBrand::Mastercard);
        assert_eq!(detect_brand("341111111111111"), CardBrand::AmericanExpress);
        assert_eq!(detect_brand("3530111333300000"), CardBrand::Jcb);
        assert_eq!(detect_brand("6011000000000004"), CardBrand::Unknown);
    }

    #[tokio::test]
    async fn card_missing_cvv_fails_before_drawing_randomness() {
        let sim = simulator(PanickingRandom);
        let outcome = sim.simulate("credit_card", 17_500, Some(&card(None))).await;
        assert_eq!(
            outcome,
            SimulationOutcome::Invalid {
                reason: "Card cvv is required".into()
            }
        );

        let blank = sim.simulate("credit_card", 17_500, Some(&card(Some("  ")))).await;
        assert!(matches!(blank, SimulationOutcome::Invalid { .. }));
    }

    #[tokio::test]
    async fn unknown_method_is_rejected_without_reference() {
        let sim = simulator(PanickingRandom);
        let outcome = sim.simulate("paypal", 17_500, None).await;
        assert_eq!(
            outcome,
            SimulationOutcome::Invalid {
                reason: UNSUPPORTED_METHOD.into()
            }
        );
    }

    #[tokio::test]
    async fn approved_card_reports_last4_and_brand() {
        let sim = simulator(FixedRandom::approving());
        match sim.simulate("credit_card", 17_500, Some(&card(Some("123")))).await {
            SimulationOutcome::Approved {
                external_id,
                details,
            } => {
                assert_eq!(external_id, "CC_abababababababab");
                assert_eq!(details["card_last4"], "1111");
                assert_eq!(details["card_type"], "Visa");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn declined_card_uses_listed_reason() {
        let sim = simulator(FixedRandom {
            unit: 0.95,
            below: 2,
        });
        let outcome = sim.simulate("credit_card", 17_500, Some(&card(Some("123")))).await;
        assert_eq!(
            outcome,
            SimulationOutcome::Declined {
                reason: CARD_FAILURES[2].into()
            }
        );
    }

    #[tokio::test]
    async fn ewallet_outcomes_follow_random_source() {
        let approved = simulator(FixedRandom::approving())
            .simulate("gopay", 20_000, None)
            .await;
        match approved {
            SimulationOutcome::Approved { external_id, .. } => {
                assert_eq!(external_id, "GOPAY_abababababababab")
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        let declined = simulator(FixedRandom {
            unit: 0.96,
            below: 3,
        })
        .simulate("ovo", 20_000, None)
        .await;
        assert_eq!(
            declined,
            SimulationOutcome::Declined {
                reason: EWALLET_FAILURES[3].into()
            }
        );
    }

    #[tokio::test]
    async fn bank_transfer_builds_virtual_account() {
        let sim = simulator(FixedRandom {
            unit: 0.999,
            below: 42,
        });
        match sim.simulate("bca", 21_500, None).await {
            SimulationOutcome::Approved {
                external_id,
                details,
            } => {
                assert_eq!(external_id, "VA_BCA0000000042");
                assert_eq!(details["virtual_account"], "BCA0000000042");
                assert_eq!(details["bank_name"], "BCA");
                assert_eq!(
                    details["instructions"],
                    "Transfer Rp 21,500 to virtual account BCA0000000042"
                );
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn cash_always_approves() {
        let sim = simulator(FixedRandom::declining());
        assert!(matches!(
            sim.simulate("cash", 17_500, None).await,
            SimulationOutcome::Approved { .. }
        ));
    }

    #[test]
    fn seeded_source_is_reproducible() {
        let a = SeededRandom::new(7);
        let b = SeededRandom::new(7);
        assert_eq!(a.hex(4), b.hex(4));
        assert_eq!(a.below(1_000), b.below(1_000));
    }

    #[test]
    fn formats_rupiah() {
        assert_eq!(format_rupiah(0), "Rp 0");
        assert_eq!(format_rupiah(17_500), "Rp 17,500");
        assert_eq!(format_rupiah(1_234_567), "Rp 1,234,567");
        assert_eq!(format_rupiah(-2_500), "-Rp 2,500");
    }
}
