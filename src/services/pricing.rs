//! Base service prices by vehicle type and service.
//!
//! The admin fee is applied by the booking service, not here.

use crate::models::ServiceType;

/// Flat surcharge added to every booking's base price.
pub const ADMIN_FEE: i64 = 2_500;

/// Price used when the vehicle type is not one we price.
pub const FALLBACK_PRICE: i64 = 25_000;

const MOBIL_PRICES: &[(&str, i64)] = &[
    ("tambal_ban", 25_000),
    ("ganti_ban", 100_000),
    ("balancing", 50_000),
    ("spooring", 75_000),
    ("default", 30_000),
];

const MOTOR_PRICES: &[(&str, i64)] = &[
    ("tambal_ban", 15_000),
    ("ganti_ban", 50_000),
    ("balancing", 25_000),
    ("spooring", 35_000),
    ("default", 20_000),
];

/// Lower-case the description and replace spaces with underscores.
/// Empty or missing descriptions map to `default`.
pub fn service_key(description: Option<&str>) -> String {
    match description {
        Some(desc) if !desc.is_empty() => desc.to_lowercase().replace(' ', "_"),
        _ => "default".to_string(),
    }
}

pub fn base_price(vehicle: &str, description: Option<&str>) -> i64 {
    let table = match ServiceType::parse(vehicle) {
        Some(ServiceType::Mobil) => MOBIL_PRICES,
        Some(ServiceType::Motor) => MOTOR_PRICES,
        None => return FALLBACK_PRICE,
    };

    let key = service_key(description);
    lookup(table, &key)
        .or_else(|| lookup(table, "default"))
        .unwrap_or(FALLBACK_PRICE)
}

/// Base price plus the admin fee.
pub fn total_price(vehicle: &str, description: Option<&str>) -> i64 {
    base_price(vehicle, description) + ADMIN_FEE
}

fn lookup(table: &[(&str, i64)], key: &str) -> Option<i64> {
    table
        .iter()
        .find(|(service, _)| *service == key)
        .map(|(_, price)| *price)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_description_into_lookup_key() {
        assert_eq!(service_key(Some("Tambal Ban")), "tambal_ban");
        assert_eq!(service_key(Some("")), "default");
        assert_eq!(service_key(None), "default");
    }

    #[test]
    fn matches_price_table() {
        assert_eq!(base_price("mobil", Some("tambal ban")), 25_000);
        assert_eq!(base_price("mobil", Some("Ganti Ban")), 100_000);
        assert_eq!(base_price("mobil", Some("balancing")), 50_000);
        assert_eq!(base_price("mobil", Some("spooring")), 75_000);
        assert_eq!(base_price("motor", Some("tambal_ban")), 15_000);
        assert_eq!(base_price("motor", Some("ganti ban")), 50_000);
        assert_eq!(base_price("motor", Some("BALANCING")), 25_000);
        assert_eq!(base_price("motor", Some("spooring")), 35_000);
    }

    #[test]
    fn unknown_service_falls_back_to_vehicle_default() {
        assert_eq!(base_price("mobil", Some("cuci mobil")), 30_000);
        assert_eq!(base_price("motor", None), 20_000);
    }

    #[test]
    fn unknown_vehicle_uses_global_fallback() {
        assert_eq!(base_price("truk", Some("tambal ban")), 25_000);
    }

    #[test]
    fn total_includes_admin_fee() {
        assert_eq!(total_price("motor", Some("tambal ban")), 17_500);
        assert_eq!(total_price("mobil", None), 32_500);
    }
}
