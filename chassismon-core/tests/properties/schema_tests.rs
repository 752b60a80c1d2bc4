//! Property-based tests for command schemas
//!
//! Structural rules every schema shares: single-valued keys may not repeat,
//! short table rows report their expected and actual widths, and section
//! rows need a header in front of them.

use std::net::Ipv4Addr;

use chassismon_core::parser::{FieldError, ParseContext, ParseError};
use chassismon_core::schema::{nic_config, power_budget, sensor_info, sys_info};
use proptest::prelude::*;

// ========== Strategies ==========

/// Single-valued `getniccfg` keys with a valid value generator each
fn arb_nic_line() -> impl Strategy<Value = (String, String)> {
    let flag = || any::<bool>().prop_map(|b| if b { "1" } else { "0" }.to_string());
    prop_oneof![
        flag().prop_map(|v| ("DHCP Enabled".to_string(), v)),
        flag().prop_map(|v| ("IPv4 Enabled".to_string(), v)),
        any::<u32>().prop_map(|v| ("VLAN ID".to_string(), v.to_string())),
        any::<Ipv4Addr>().prop_map(|v| ("IP Address".to_string(), v.to_string())),
        any::<Ipv4Addr>().prop_map(|v| ("Gateway".to_string(), v.to_string())),
        "[A-Za-z0-9 ]{1,20}".prop_map(|v| ("LOM Model Name".to_string(), v.trim().to_string())),
    ]
}

/// Single-valued `getsysinfo` keys
fn arb_sys_info_key() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("Current IP Address"),
        Just("Current IP Gateway"),
        Just("Current DNS Server 1"),
        Just("Current DNS Server 2"),
    ]
}

/// A whitespace-free table cell
fn arb_cell() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_-]{1,10}"
}

/// `(row type, arity)` for each `getsensorinfo` row shape
fn arb_sensor_row_type() -> impl Strategy<Value = (&'static str, usize)> {
    prop_oneof![
        Just(("FanSpeed", sensor_info::SENSOR_ARITY)),
        Just(("Temp", sensor_info::SENSOR_ARITY)),
        Just(("PWR", sensor_info::POWER_ARITY)),
        Just(("Cable", sensor_info::CABLE_ARITY)),
    ]
}

fn ctx() -> ParseContext {
    ParseContext::default()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// A single-valued key appearing twice fails even with identical values
    #[test]
    fn nic_duplicate_key_always_fails(
        (key, first) in arb_nic_line(),
        second_same in any::<bool>(),
        (_, other) in arb_nic_line(),
    ) {
        // The repeat check runs before conversion, so even a value that
        // belongs to another key is reported as a duplicate
        let second = if second_same { first.clone() } else { other };
        let input = format!("{key} = {first}\n{key} = {second}\n");
        let err = nic_config::parse(input.as_bytes(), &ctx()).unwrap_err();
        prop_assert_eq!(err, ParseError::DuplicateKey { line: 2, key });
    }

    #[test]
    fn sys_info_duplicate_key_always_fails(
        key in arb_sys_info_key(),
        a in any::<Ipv4Addr>(),
        b in any::<Ipv4Addr>(),
    ) {
        let input = format!("{key} = {a}\n{key} = {b}\n");
        let err = sys_info::parse(input.as_bytes(), &ctx()).unwrap_err();
        prop_assert!(matches!(err, ParseError::DuplicateKey { line: 2, .. }), "{:?}", err);
    }

    /// Valid single lines land in the record unchanged
    #[test]
    fn nic_single_line_parses((key, value) in arb_nic_line()) {
        let input = format!("{key} = {value}\n");
        let nic = nic_config::parse(input.as_bytes(), &ctx()).unwrap();
        match key.as_str() {
            "DHCP Enabled" => prop_assert_eq!(nic.dhcp_enabled, value == "1"),
            "IPv4 Enabled" => prop_assert_eq!(nic.ipv4_enabled, value == "1"),
            "VLAN ID" => prop_assert_eq!(nic.vlan_id.to_string(), value),
            "IP Address" => prop_assert_eq!(nic.ip_address.map(|a| a.to_string()), Some(value)),
            "Gateway" => prop_assert_eq!(nic.gateway.map(|a| a.to_string()), Some(value)),
            _ => prop_assert_eq!(nic.lom_model_name, value),
        }
    }

    /// Rows narrower or wider than their type's arity name both counts
    #[test]
    fn sensor_row_arity_mismatch_names_counts(
        (row_type, arity) in arb_sensor_row_type(),
        cells in prop::collection::vec(arb_cell(), 1..12),
    ) {
        prop_assume!(cells.len() != arity);
        let input = format!("{row_type} {}\n", cells.join(" "));
        let err = sensor_info::parse(input.as_bytes(), &ctx()).unwrap_err();
        match err {
            ParseError::Extract { line, key, source, .. } => {
                prop_assert_eq!(line, 1);
                prop_assert_eq!(key, row_type);
                prop_assert_eq!(source, FieldError::Arity { expected: arity, actual: cells.len() });
            }
            other => prop_assert!(false, "unexpected error {:?}", other),
        }
    }

    /// Allocation rows shorter than seven fields are rejected with both counts
    #[test]
    fn short_allocation_row_names_counts(
        cells in prop::collection::vec(arb_cell(), 1..power_budget::SERVER_ARITY),
    ) {
        let input = format!(
            "[Server Module Power Allocation Table]\n{}\n",
            cells.join(" ")
        );
        let err = power_budget::parse(input.as_bytes(), &ctx()).unwrap_err();
        prop_assert_eq!(
            err,
            ParseError::TooFewFields {
                line: 2,
                expected: power_budget::SERVER_ARITY,
                actual: cells.len(),
            }
        );
    }

    /// Any data row ahead of the first header is outside every block
    #[test]
    fn row_before_header_is_unknown_block(
        cells in prop::collection::vec(arb_cell(), 1..10),
    ) {
        let row = cells.join(" ");
        prop_assume!(!row.starts_with('<'));
        let input = format!("{row}\n[Server Module Power Allocation Table]\n");
        let err = power_budget::parse(input.as_bytes(), &ctx()).unwrap_err();
        prop_assert_eq!(err, ParseError::UnknownBlock { line: 1, text: row });
    }

    /// Headers only match exactly; a near miss leaves the parser outside any block
    #[test]
    fn header_match_is_exact(suffix in "[ a-z]{1,4}") {
        let header = format!("[Server Module Power Allocation Table]{suffix}");
        prop_assume!(header.trim() != "[Server Module Power Allocation Table]");
        let input = format!("{header}\n1 SLOT-01 ON 300 W 1 PowerEdgeM610\n");
        let err = power_budget::parse(input.as_bytes(), &ctx()).unwrap_err();
        let is_unknown_block = matches!(err, ParseError::UnknownBlock { line: 1, .. });
        prop_assert!(is_unknown_block);
    }

    /// Well-formed tables keep every row, in order
    #[test]
    fn sensor_rows_counted_per_type(
        fans in 0usize..12,
        temps in 0usize..3,
        supplies in 0usize..8,
        cables in 0usize..4,
    ) {
        let mut input = String::from("<senType> <Num> <sensorName> <status> <reading> <units> <LC> <UC>\n");
        for n in 1..=fans {
            input.push_str(&format!("FanSpeed {n} Fan-{n} OK {} rpm 1000 14500\n", 4000 + n));
        }
        for n in 1..=temps {
            input.push_str(&format!("Temp {n} Ambient_Temp OK 2{n} Celsius N/A 40\n"));
        }
        for n in 1..=supplies {
            input.push_str(&format!("PWR {n} PS-{n} Online OK\n"));
        }
        for n in 1..=cables {
            input.push_str(&format!("Cable {n} IO-Cable OK\n"));
        }
        let info = sensor_info::parse(input.as_bytes(), &ctx()).unwrap();
        prop_assert_eq!(info.fans.len(), fans);
        prop_assert_eq!(info.ambient_temp.len(), temps);
        prop_assert_eq!(info.power_supplies.len(), supplies);
        prop_assert_eq!(info.cables.len(), cables);
        for (i, fan) in info.fans.iter().enumerate() {
            prop_assert_eq!(fan.number as usize, i + 1);
            prop_assert_eq!(fan.reading, 4001 + i as i64);
        }
    }
}
