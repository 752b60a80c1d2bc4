//! `racadm getsensorinfo`: fans, ambient temperature, power supplies, cables
//!
//! The output is a series of whitespace-aligned tables. Every data row starts
//! with its sensor type, which also decides how many columns it must have:
//!
//! ```text
//! <senType>  <Num>  <sensorName>   <status>  <reading>  <units>   <LC>  <UC>
//! FanSpeed   1      Fan-1          OK        4920       rpm       1000  14500
//! Temp       1      Ambient_Temp   OK        20         Celsius   N/A   40
//! PWR        1      PS-1           Online    OK
//! Cable      1      IO-Cable       OK
//! ```

use std::io::BufRead;
use std::sync::LazyLock;

use serde::Serialize;

use crate::parser::{
    Extract, Extractor, FieldError, ParseConfig, ParseContext, ParseResult, Tokenizer,
    parse_signed, parse_unsigned,
};

/// Command that prints the sensor tables
pub const COMMAND: &str = "racadm getsensorinfo";

/// Columns after the type on `FanSpeed` and `Temp` rows
pub const SENSOR_ARITY: usize = 7;
/// Columns after the type on `PWR` rows
pub const POWER_ARITY: usize = 4;
/// Columns after the type on `Cable` rows
pub const CABLE_ARITY: usize = 3;

/// Parsed `getsensorinfo` output, rows in output order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SensorInfo {
    /// `FanSpeed` rows
    pub fans: Vec<Sensor>,
    /// `Temp` rows
    pub ambient_temp: Vec<Sensor>,
    /// `PWR` rows
    pub power_supplies: Vec<PowerSupplyInfo>,
    /// `Cable` rows
    pub cables: Vec<CableInfo>,
}

/// A numeric sensor reading
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sensor {
    /// Sensor number within its type
    pub number: u32,
    /// Sensor name, e.g. `Fan-1`
    pub name: String,
    /// Status text, e.g. `OK`
    pub status: String,
    /// Reading in [`Sensor::units`]
    pub reading: i64,
    /// Unit of the reading, e.g. `rpm` or `Celsius`
    pub units: String,
}

/// A power supply row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PowerSupplyInfo {
    /// Supply number
    pub number: u32,
    /// Supply name, e.g. `PS-1`
    pub name: String,
    /// e.g. `Online`
    pub status: String,
    /// e.g. `OK`
    pub health: String,
}

/// A cable presence row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CableInfo {
    /// Cable number
    pub number: u32,
    /// Cable name, e.g. `IO-Cable`
    pub name: String,
    /// e.g. `OK`
    pub status: String,
}

fn check_arity(values: &[String], expected: usize) -> Result<(), FieldError> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(FieldError::Arity {
            expected,
            actual: values.len(),
        })
    }
}

fn sensor(values: &[String]) -> Result<Sensor, FieldError> {
    check_arity(values, SENSOR_ARITY)?;
    Ok(Sensor {
        number: parse_unsigned(&values[0])?,
        name: values[1].clone(),
        status: values[2].clone(),
        reading: parse_signed(&values[3])?,
        units: values[4].clone(),
    })
}

fn push_fan(out: &mut SensorInfo, values: &[String]) -> Result<(), FieldError> {
    out.fans.push(sensor(values)?);
    Ok(())
}

fn push_temp(out: &mut SensorInfo, values: &[String]) -> Result<(), FieldError> {
    out.ambient_temp.push(sensor(values)?);
    Ok(())
}

fn push_power(out: &mut SensorInfo, values: &[String]) -> Result<(), FieldError> {
    check_arity(values, POWER_ARITY)?;
    out.power_supplies.push(PowerSupplyInfo {
        number: parse_unsigned(&values[0])?,
        name: values[1].clone(),
        status: values[2].clone(),
        health: values[3].clone(),
    });
    Ok(())
}

fn push_cable(out: &mut SensorInfo, values: &[String]) -> Result<(), FieldError> {
    check_arity(values, CABLE_ARITY)?;
    out.cables.push(CableInfo {
        number: parse_unsigned(&values[0])?,
        name: values[1].clone(),
        status: values[2].clone(),
    });
    Ok(())
}

static CONFIG: LazyLock<ParseConfig<SensorInfo>> = LazyLock::new(|| {
    ParseConfig::new(
        Tokenizer::Columns,
        [
            ("FanSpeed", Extractor::repeated(Extract::Rows(push_fan))),
            ("Temp", Extractor::repeated(Extract::Rows(push_temp))),
            ("PWR", Extractor::repeated(Extract::Rows(push_power))),
            ("Cable", Extractor::repeated(Extract::Rows(push_cable))),
        ],
    )
});

/// Schema for [`COMMAND`]
#[must_use]
pub fn config() -> &'static ParseConfig<SensorInfo> {
    &CONFIG
}

/// Parses `getsensorinfo` output
///
/// # Errors
///
/// Returns the first parse failure, e.g. a row with the wrong column count.
pub fn parse<R: BufRead>(reader: R, ctx: &ParseContext) -> ParseResult<SensorInfo> {
    CONFIG.parse(reader, ctx)
}
