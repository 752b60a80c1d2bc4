//! `racadm getniccfg -m server-N`: management NIC of one blade

use std::io::BufRead;
use std::net::IpAddr;
use std::sync::LazyLock;

use serde::Serialize;

use crate::parser::{Extract, Extractor, NetMask, ParseConfig, ParseContext, ParseResult, Tokenizer};

/// Command that prints the NIC configuration of the blade in `slot`
#[must_use]
pub fn command(slot: u32) -> String {
    format!("racadm getniccfg -m server-{slot}")
}

/// Parsed `getniccfg` output
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NicConfig {
    /// e.g. `Embedded LOM`
    pub lom_model_name: String,
    /// e.g. `Gigabit Ethernet`
    pub lom_fabric_type: String,
    /// IPv4 stack enabled
    pub ipv4_enabled: bool,
    /// Address assigned by DHCP
    pub dhcp_enabled: bool,
    /// Management address of the blade
    pub ip_address: Option<IpAddr>,
    /// IPv4 subnet mask
    pub subnet_mask: Option<NetMask>,
    /// IPv4 default gateway
    pub gateway: Option<IpAddr>,
    /// IPv6 stack enabled
    pub ipv6_enabled: bool,
    /// IPv6 SLAAC enabled
    pub autoconfiguration_enabled: bool,
    /// IPv6 default gateway
    pub ipv6_gateway: Option<IpAddr>,
    /// VLAN tagging enabled
    pub vlan_enable: bool,
    /// VLAN tag
    pub vlan_id: u32,
    /// 802.1p priority
    pub vlan_priority: u32,
}

type Field = Extractor<NicConfig>;

fn text(field: fn(&mut NicConfig) -> &mut String) -> Field {
    Extractor::once(Extract::Text(field))
}

fn flag(field: fn(&mut NicConfig) -> &mut bool) -> Field {
    Extractor::once(Extract::Flag(field))
}

fn unsigned(field: fn(&mut NicConfig) -> &mut u32) -> Field {
    Extractor::once(Extract::Unsigned(field))
}

fn address(field: fn(&mut NicConfig) -> &mut Option<IpAddr>) -> Field {
    Extractor::once(Extract::Address(field))
}

fn mask(field: fn(&mut NicConfig) -> &mut Option<NetMask>) -> Field {
    Extractor::once(Extract::Mask(field))
}

// `Link local Address` is printed empty on most blades and is not extracted.
static CONFIG: LazyLock<ParseConfig<NicConfig>> = LazyLock::new(|| {
    ParseConfig::new(
        Tokenizer::KeyValue { separator: '=' },
        [
            ("LOM Model Name", text(|r| &mut r.lom_model_name)),
            ("LOM Fabric Type", text(|r| &mut r.lom_fabric_type)),
            ("IPv4 Enabled", flag(|r| &mut r.ipv4_enabled)),
            ("DHCP Enabled", flag(|r| &mut r.dhcp_enabled)),
            ("IP Address", address(|r| &mut r.ip_address)),
            ("Subnet Mask", mask(|r| &mut r.subnet_mask)),
            ("Gateway", address(|r| &mut r.gateway)),
            ("IPv6 Enabled", flag(|r| &mut r.ipv6_enabled)),
            ("Autoconfiguration Enabled", flag(|r| &mut r.autoconfiguration_enabled)),
            ("IPv6 Gateway", address(|r| &mut r.ipv6_gateway)),
            ("VLAN Enable", flag(|r| &mut r.vlan_enable)),
            ("VLAN ID", unsigned(|r| &mut r.vlan_id)),
            ("VLAN priority", unsigned(|r| &mut r.vlan_priority)),
        ],
    )
});

/// Schema for [`command`]
#[must_use]
pub fn config() -> &'static ParseConfig<NicConfig> {
    &CONFIG
}

/// Parses `getniccfg` output
///
/// # Errors
///
/// Returns the first parse failure; see [`ParseConfig::parse`].
pub fn parse<R: BufRead>(reader: R, ctx: &ParseContext) -> ParseResult<NicConfig> {
    CONFIG.parse(reader, ctx)
}
