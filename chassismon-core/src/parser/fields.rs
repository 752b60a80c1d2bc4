//! Scalar conversions shared by every schema

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde::{Serialize, Serializer};

use super::FieldError;

/// Layout of chassis timestamps, e.g. `Tue Jan 04 2000 08:51`
pub const TIMESTAMP_FORMAT: &str = "%a %b %d %Y %H:%M";

/// Parses a `0` / `1` flag
///
/// # Errors
///
/// Returns [`FieldError::Flag`] for anything else.
pub fn parse_flag(value: &str) -> Result<bool, FieldError> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(FieldError::Flag(other.to_string())),
    }
}

/// Parses an unsigned decimal integer
///
/// # Errors
///
/// Returns [`FieldError::Integer`] when the text is not a `u32`.
pub fn parse_unsigned(value: &str) -> Result<u32, FieldError> {
    value.parse().map_err(|e: std::num::ParseIntError| FieldError::Integer {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Parses a signed decimal integer
///
/// # Errors
///
/// Returns [`FieldError::Integer`] when the text is not an `i64`.
pub fn parse_signed(value: &str) -> Result<i64, FieldError> {
    value.parse().map_err(|e: std::num::ParseIntError| FieldError::Integer {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Parses a decimal number such as a sensor reading
///
/// # Errors
///
/// Returns [`FieldError::Decimal`] when the text is not a finite number.
pub fn parse_decimal(value: &str) -> Result<f64, FieldError> {
    let decimal = |reason: String| FieldError::Decimal {
        value: value.to_string(),
        reason,
    };
    let parsed: f64 = value.parse().map_err(|e: std::num::ParseFloatError| decimal(e.to_string()))?;
    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(decimal("not a finite number".to_string()))
    }
}

/// Parses a chassis timestamp as wall-clock time in `timezone`.
///
/// Times that fall twice (DST fall-back) resolve to the earlier instant.
///
/// # Errors
///
/// Returns [`FieldError::Timestamp`] if the text does not match
/// [`TIMESTAMP_FORMAT`] or names a local time that does not exist.
pub fn parse_timestamp(value: &str, timezone: Tz) -> Result<DateTime<Tz>, FieldError> {
    let naive = NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|e| {
        FieldError::Timestamp {
            value: value.to_string(),
            reason: e.to_string(),
        }
    })?;
    timezone
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| FieldError::Timestamp {
            value: value.to_string(),
            reason: format!("local time does not exist in {timezone}"),
        })
}

/// Formats a timestamp the way the chassis prints it
#[must_use]
pub fn format_timestamp(value: &DateTime<Tz>) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a dotted IPv4 or colon IPv6 address
///
/// # Errors
///
/// Returns [`FieldError::Address`] for anything else, including empty text.
pub fn parse_address(value: &str) -> Result<IpAddr, FieldError> {
    value
        .parse()
        .map_err(|_| FieldError::Address(value.to_string()))
}

/// A 48-bit IEEE 802 MAC address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Wraps raw octets
    #[must_use]
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Raw octets
    #[must_use]
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = FieldError;

    /// Accepts `00:11:22:33:44:55` and `00-11-22-33-44-55`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FieldError::Hardware(s.to_string());
        let separator = if s.contains('-') { '-' } else { ':' };

        let mut octets = [0u8; 6];
        let mut groups = s.split(separator);
        for octet in &mut octets {
            let group = groups.next().ok_or_else(invalid)?;
            if group.len() != 2 {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(group, 16).map_err(|_| invalid())?;
        }
        if groups.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A network mask printed in address notation (`255.255.255.0`).
///
/// The address parser is reused and its bytes reinterpreted as the mask, so
/// IPv6-style masks are accepted too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetMask(IpAddr);

impl NetMask {
    /// Mask bytes in network order
    #[must_use]
    pub fn octets(&self) -> Vec<u8> {
        match self.0 {
            IpAddr::V4(v4) => v4.octets().to_vec(),
            IpAddr::V6(v6) => v6.octets().to_vec(),
        }
    }

    /// CIDR prefix length, or `None` if the set bits are not contiguous
    #[must_use]
    pub fn prefix_len(&self) -> Option<u32> {
        let bits = match self.0 {
            IpAddr::V4(v4) => u128::from(u32::from(v4)) << 96,
            IpAddr::V6(v6) => u128::from(v6),
        };
        let ones = bits.leading_ones();
        let width = if self.0.is_ipv4() { 32 } else { 128 };
        (bits.checked_shl(ones).unwrap_or(0) == 0).then_some(ones.min(width))
    }
}

impl From<IpAddr> for NetMask {
    fn from(addr: IpAddr) -> Self {
        Self(addr)
    }
}

impl fmt::Display for NetMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Serialize for NetMask {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
