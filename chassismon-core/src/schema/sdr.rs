//! `ipmitool sdr get "<sensor>"`: one sensor data record from a blade BMC

use std::io::BufRead;
use std::sync::LazyLock;

use serde::Serialize;

use crate::parser::{
    Extract, Extractor, FieldError, ParseConfig, ParseContext, ParseResult, Tokenizer, parse_decimal,
};

/// Sensor holding the blade's inlet temperature
pub const AMBIENT_SENSOR: &str = "Ambient Temp";

/// Readings the BMC prints instead of a number
const NO_READING: &[&str] = &["No Reading", "Disabled", "Not Available"];

/// A sensor data record as printed by `sdr get`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensorRecord {
    /// `Sensor ID`, e.g. `Ambient Temp (0xe)`
    pub id: String,
    /// `None` when the sensor has no current reading
    pub reading: Option<f64>,
    /// e.g. `degrees C`
    pub units: String,
    /// e.g. `ok`
    pub status: String,
}

/// Splits `22 (+/- 0) degrees C` into the number and the unit text
fn push_reading(out: &mut SensorRecord, values: &[String]) -> Result<(), FieldError> {
    let [text] = values else {
        return Err(FieldError::ValueCount {
            actual: values.len(),
        });
    };
    if NO_READING.contains(&text.as_str()) {
        return Ok(());
    }
    let (number, rest) = text
        .split_once(char::is_whitespace)
        .unwrap_or((text.as_str(), ""));
    out.reading = Some(parse_decimal(number)?);
    let rest = rest.trim();
    out.units = match rest.strip_prefix('(').and_then(|r| r.split_once(')')) {
        Some((_, units)) => units.trim().to_string(),
        None => rest.to_string(),
    };
    Ok(())
}

static CONFIG: LazyLock<ParseConfig<SensorRecord>> = LazyLock::new(|| {
    ParseConfig::new(
        Tokenizer::KeyValue { separator: ':' },
        [
            ("Sensor ID", Extractor::once(Extract::Text(|r: &mut SensorRecord| &mut r.id))),
            ("Sensor Reading", Extractor::once(Extract::Rows(push_reading))),
            ("Status", Extractor::once(Extract::Text(|r: &mut SensorRecord| &mut r.status))),
        ],
    )
});

/// Command arguments that read `sensor`
#[must_use]
pub fn command_args(sensor: &str) -> [&str; 3] {
    ["sdr", "get", sensor]
}

/// Parses `sdr get` output
///
/// # Errors
///
/// Returns the first parse failure; a missing reading is not an error here.
pub fn parse<R: BufRead>(reader: R, ctx: &ParseContext) -> ParseResult<SensorRecord> {
    CONFIG.parse(reader, ctx)
}
