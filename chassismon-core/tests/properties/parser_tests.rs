//! Property-based tests for scalar field conversions
//!
//! Every conversion the scalar schemas use must accept the canonical text of
//! any value it can produce and give that value back.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use chrono::{NaiveDate, TimeZone};
use chrono_tz::Tz;
use chassismon_core::parser::{
    FieldError, MacAddress, NetMask, format_timestamp, parse_address, parse_flag,
    parse_signed, parse_timestamp, parse_unsigned,
};
use proptest::prelude::*;

// ========== Strategies ==========

/// Zones without daylight saving, so every local minute exists exactly once
fn arb_fixed_zone() -> impl Strategy<Value = Tz> {
    prop_oneof![
        Just(Tz::UTC),
        Just(chrono_tz::Asia::Tokyo),
        Just(chrono_tz::Asia::Kolkata),
    ]
}

/// Strategy for wall-clock minutes between 2000 and 2037
fn arb_wall_clock() -> impl Strategy<Value = (i32, u32, u32, u32, u32)> {
    (2000i32..2038, 1u32..=12, 1u32..=28, 0u32..24, 0u32..60)
}

/// Strategy for contiguous IPv4 masks
fn arb_prefix() -> impl Strategy<Value = u32> {
    0u32..=32
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn flag_roundtrip(value in any::<bool>()) {
        let text = if value { "1" } else { "0" };
        prop_assert_eq!(parse_flag(text), Ok(value));
    }

    #[test]
    fn flag_rejects_anything_else(text in "[a-zA-Z2-9 ]{1,6}") {
        prop_assert_eq!(parse_flag(&text), Err(FieldError::Flag(text.clone())));
    }

    #[test]
    fn unsigned_roundtrip(value in any::<u32>()) {
        prop_assert_eq!(parse_unsigned(&value.to_string()), Ok(value));
    }

    #[test]
    fn signed_roundtrip(value in any::<i64>()) {
        prop_assert_eq!(parse_signed(&value.to_string()), Ok(value));
    }

    #[test]
    fn ipv4_roundtrip(value in any::<Ipv4Addr>()) {
        prop_assert_eq!(parse_address(&value.to_string()), Ok(IpAddr::V4(value)));
    }

    #[test]
    fn ipv6_roundtrip(value in any::<Ipv6Addr>()) {
        prop_assert_eq!(parse_address(&value.to_string()), Ok(IpAddr::V6(value)));
    }

    #[test]
    fn mac_roundtrip(octets in any::<[u8; 6]>()) {
        let mac = MacAddress::new(octets);
        let parsed: MacAddress = mac.to_string().parse().unwrap();
        prop_assert_eq!(parsed, mac);
        let dashed: MacAddress = mac.to_string().replace(':', "-").to_uppercase().parse().unwrap();
        prop_assert_eq!(dashed.octets(), octets);
    }

    #[test]
    fn netmask_prefix_roundtrip(prefix in arb_prefix()) {
        let bits = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
        let addr = IpAddr::V4(Ipv4Addr::from(bits));
        let mask = NetMask::from(parse_address(&addr.to_string()).unwrap());
        prop_assert_eq!(mask.prefix_len(), Some(prefix));
        prop_assert_eq!(mask.to_string(), addr.to_string());
    }

    #[test]
    fn timestamp_roundtrip(
        tz in arb_fixed_zone(),
        (year, month, day, hour, minute) in arb_wall_clock(),
    ) {
        let naive = NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap();
        let value = tz.from_local_datetime(&naive).single().unwrap();
        let text = format_timestamp(&value);
        prop_assert_eq!(parse_timestamp(&text, tz), Ok(value));
    }

    #[test]
    fn timestamp_zone_shifts_instant(
        (year, month, day, hour, minute) in arb_wall_clock(),
    ) {
        let naive = NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap();
        let text = format_timestamp(&Tz::UTC.from_utc_datetime(&naive));
        let utc = parse_timestamp(&text, Tz::UTC).unwrap();
        let tokyo = parse_timestamp(&text, chrono_tz::Asia::Tokyo).unwrap();
        prop_assert_eq!((utc.timestamp() - tokyo.timestamp()) / 3600, 9);
    }
}
