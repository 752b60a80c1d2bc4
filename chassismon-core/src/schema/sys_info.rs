//! `racadm getsysinfo`: chassis controller identity and network settings

use std::io::BufRead;
use std::net::IpAddr;
use std::sync::LazyLock;

use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;

use crate::parser::{
    Extract, Extractor, MacAddress, NetMask, ParseConfig, ParseContext, ParseResult, Tokenizer,
};

/// Command that prints the system information listing
pub const COMMAND: &str = "racadm getsysinfo";

/// Parsed `getsysinfo` output
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SysInfo {
    /// `CMC Date/Time`
    pub cmc_date_time: Option<DateTime<Tz>>,
    /// `Primary CMC Location`
    pub primary_cmc_location: String,
    /// `Primary CMC Version`
    pub primary_cmc_version: String,
    /// `Standby CMC Version`
    pub standby_cmc_version: String,
    /// `Last Firmware Update`
    pub last_firmware_update: Option<DateTime<Tz>>,
    /// `Hardware Version`
    pub hardware_version: String,

    /// `NIC Enabled`
    pub nic_enabled: bool,
    /// `MAC Address`
    pub mac_address: Option<MacAddress>,
    /// `Register DNS CMC Name`
    pub register_dns_cmc_name: bool,
    /// `DNS CMC Name`
    pub dns_cmc_name: String,
    /// `Current DNS Domain`
    pub current_dns_domain: String,
    /// `VLAN ID`
    pub vlan_id: u32,
    /// `VLAN Priority`
    pub vlan_priority: u32,
    /// `VLAN Enabled`
    pub vlan_enabled: bool,

    /// `IPv4 Enabled`
    pub ipv4_enabled: bool,
    /// `Current IP Address`
    pub current_ip_address: Option<IpAddr>,
    /// `Current IP Gateway`
    pub current_ip_gateway: Option<IpAddr>,
    /// `Current IP Netmask`
    pub current_ip_netmask: Option<NetMask>,
    /// `DHCP Enabled`
    pub dhcp_enabled: bool,
    /// `Current DNS Server 1`
    pub current_dns_server_1: Option<IpAddr>,
    /// `Current DNS Server 2`
    pub current_dns_server_2: Option<IpAddr>,
    /// `DNS Servers from DHCP`
    pub dns_servers_from_dhcp: bool,

    /// `IPv6 Enabled`
    pub ipv6_enabled: bool,
    /// `Autoconfiguration Enabled`
    pub autoconfiguration_enabled: bool,
    /// `Link Local Address`
    pub link_local_address: Option<IpAddr>,
    /// `Current IPv6 Address 1`
    pub current_ipv6_address_1: Option<IpAddr>,
    /// `Current IPv6 Gateway`
    pub current_ipv6_gateway: Option<IpAddr>,
    /// `Current IPv6 DNS Server 1`
    pub current_ipv6_dns_server_1: Option<IpAddr>,
    /// `Current IPv6 DNS Server 2`
    pub current_ipv6_dns_server_2: Option<IpAddr>,
    /// `DNS Servers from DHCPv6`
    pub dns_servers_from_dhcpv6: bool,

    /// `System Model`
    pub system_model: String,
    /// `System AssetTag`
    pub system_asset_tag: String,
    /// `Service Tag`
    pub service_tag: String,
    /// `Chassis Name`
    pub chassis_name: String,
    /// `Chassis Location`
    pub chassis_location: String,
    /// `Chassis Midplane Version`
    pub chassis_midplane_version: String,
    /// `Power Status`
    pub power_status: String,
    /// `System ID`
    pub system_id: String,
}

type Field = Extractor<SysInfo>;

fn text(field: fn(&mut SysInfo) -> &mut String) -> Field {
    Extractor::once(Extract::Text(field))
}

fn flag(field: fn(&mut SysInfo) -> &mut bool) -> Field {
    Extractor::once(Extract::Flag(field))
}

fn unsigned(field: fn(&mut SysInfo) -> &mut u32) -> Field {
    Extractor::once(Extract::Unsigned(field))
}

fn timestamp(field: fn(&mut SysInfo) -> &mut Option<DateTime<Tz>>) -> Field {
    Extractor::once(Extract::Timestamp(field))
}

fn address(field: fn(&mut SysInfo) -> &mut Option<IpAddr>) -> Field {
    Extractor::once(Extract::Address(field))
}

static CONFIG: LazyLock<ParseConfig<SysInfo>> = LazyLock::new(|| {
    ParseConfig::new(
        Tokenizer::KeyValue { separator: '=' },
        [
            ("CMC Date/Time", timestamp(|r| &mut r.cmc_date_time)),
            ("Primary CMC Location", text(|r| &mut r.primary_cmc_location)),
            ("Primary CMC Version", text(|r| &mut r.primary_cmc_version)),
            ("Standby CMC Version", text(|r| &mut r.standby_cmc_version)),
            ("Last Firmware Update", timestamp(|r| &mut r.last_firmware_update)),
            ("Hardware Version", text(|r| &mut r.hardware_version)),
            ("NIC Enabled", flag(|r| &mut r.nic_enabled)),
            (
                "MAC Address",
                Extractor::once(Extract::Hardware(|r: &mut SysInfo| &mut r.mac_address)),
            ),
            ("Register DNS CMC Name", flag(|r| &mut r.register_dns_cmc_name)),
            ("DNS CMC Name", text(|r| &mut r.dns_cmc_name)),
            ("Current DNS Domain", text(|r| &mut r.current_dns_domain)),
            ("VLAN ID", unsigned(|r| &mut r.vlan_id)),
            ("VLAN Priority", unsigned(|r| &mut r.vlan_priority)),
            ("VLAN Enabled", flag(|r| &mut r.vlan_enabled)),
            ("IPv4 Enabled", flag(|r| &mut r.ipv4_enabled)),
            ("Current IP Address", address(|r| &mut r.current_ip_address)),
            ("Current IP Gateway", address(|r| &mut r.current_ip_gateway)),
            (
                "Current IP Netmask",
                Extractor::once(Extract::Mask(|r: &mut SysInfo| &mut r.current_ip_netmask)),
            ),
            ("DHCP Enabled", flag(|r| &mut r.dhcp_enabled)),
            ("Current DNS Server 1", address(|r| &mut r.current_dns_server_1)),
            ("Current DNS Server 2", address(|r| &mut r.current_dns_server_2)),
            ("DNS Servers from DHCP", flag(|r| &mut r.dns_servers_from_dhcp)),
            ("IPv6 Enabled", flag(|r| &mut r.ipv6_enabled)),
            ("Autoconfiguration Enabled", flag(|r| &mut r.autoconfiguration_enabled)),
            ("Link Local Address", address(|r| &mut r.link_local_address)),
            ("Current IPv6 Address 1", address(|r| &mut r.current_ipv6_address_1)),
            ("Current IPv6 Gateway", address(|r| &mut r.current_ipv6_gateway)),
            ("Current IPv6 DNS Server 1", address(|r| &mut r.current_ipv6_dns_server_1)),
            ("Current IPv6 DNS Server 2", address(|r| &mut r.current_ipv6_dns_server_2)),
            ("DNS Servers from DHCPv6", flag(|r| &mut r.dns_servers_from_dhcpv6)),
            ("System Model", text(|r| &mut r.system_model)),
            ("System AssetTag", text(|r| &mut r.system_asset_tag)),
            ("Service Tag", text(|r| &mut r.service_tag)),
            ("Chassis Name", text(|r| &mut r.chassis_name)),
            ("Chassis Location", text(|r| &mut r.chassis_location)),
            ("Chassis Midplane Version", text(|r| &mut r.chassis_midplane_version)),
            ("Power Status", text(|r| &mut r.power_status)),
            ("System ID", text(|r| &mut r.system_id)),
        ],
    )
});

/// Schema for [`COMMAND`]
#[must_use]
pub fn config() -> &'static ParseConfig<SysInfo> {
    &CONFIG
}

/// Parses `getsysinfo` output
///
/// # Errors
///
/// Returns the first parse failure; see [`ParseConfig::parse`].
pub fn parse<R: BufRead>(reader: R, ctx: &ParseContext) -> ParseResult<SysInfo> {
    CONFIG.parse(reader, ctx)
}
