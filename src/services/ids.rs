//! Human-readable identifiers: a prefix, a timestamp, and 32 random bits.
//!
//! Uniqueness comes from the database constraint; callers regenerate on conflict.

use chrono::{DateTime, Utc};

pub const TRANSACTION_PREFIX: &str = "TXN";
pub const BOOKING_PREFIX: &str = "BK";

pub fn transaction_id() -> String {
    transaction_id_at(Utc::now(), rand::random())
}

pub fn booking_code() -> String {
    booking_code_at(Utc::now(), rand::random())
}

pub fn transaction_id_at(now: DateTime<Utc>, suffix: u32) -> String {
    format!(
        "{TRANSACTION_PREFIX}{}{}",
        now.format("%Y%m%d%H%M%S"),
        hex::encode_upper(suffix.to_be_bytes())
    )
}

pub fn booking_code_at(now: DateTime<Utc>, suffix: u32) -> String {
    format!(
        "{BOOKING_PREFIX}{}{}",
        now.format("%Y%m%d"),
        hex::encode_upper(suffix.to_be_bytes())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_transaction_id() {
        let now = Utc.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(transaction_id_at(now, 0xDEADBEEF), "TXN20250309140507DEADBEEF");
    }

    #[test]
    fn formats_booking_code_with_zero_padded_suffix() {
        let now = Utc.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(booking_code_at(now, 0x1A), "BK202503090000001A");
    }

    #[test]
    fn generated_ids_carry_prefix_and_suffix_length() {
        let txn = transaction_id();
        assert!(txn.starts_with("TXN"));
        assert_eq!(txn.len(), 3 + 14 + 8);

        let code = booking_code();
        assert!(code.starts_with("BK"));
        assert_eq!(code.len(), 2 + 8 + 8);
    }
}
