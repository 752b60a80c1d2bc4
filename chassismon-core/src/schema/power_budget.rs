//! `racadm getpbinfo`: per-slot server power allocation
//!
//! Only the `[Server Module Power Allocation Table]` section is extracted. The
//! budget summary and the chassis supply table are recognised so their rows
//! are skipped rather than rejected.

use std::io::BufRead;
use std::sync::LazyLock;

use serde::Serialize;

use crate::parser::{
    Extract, Extractor, FieldError, ParseConfig, ParseContext, ParseResult, Section, SectionRows,
    Tokenizer, parse_unsigned,
};

/// Command that prints the power budget tables
pub const COMMAND: &str = "racadm getpbinfo";

/// Columns on a server allocation row
pub const SERVER_ARITY: usize = 7;

/// Power state of a running blade
pub const POWER_STATE_ON: &str = "ON";

const SERVER_KEY: &str = "servers";

const SECTIONS: &[Section] = &[
    Section {
        header: "[Power Budget Status]",
        rows: None,
    },
    Section {
        header: "[Chassis Power Supply Status Table]",
        rows: None,
    },
    Section {
        header: "[Server Module Power Allocation Table]",
        rows: Some(SectionRows {
            key: SERVER_KEY,
            min_fields: SERVER_ARITY,
        }),
    },
];

/// Parsed `getpbinfo` output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PowerBudgetInfo {
    /// Allocation rows in slot order as printed
    pub servers: Vec<ServerPower>,
}

/// One blade slot in the allocation table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerPower {
    /// Chassis slot, 1-based
    pub slot_number: u32,
    /// Name the chassis reports for the blade, e.g. `SLOT-01`
    pub server_name: String,
    /// `ON` or `OFF`
    pub power_state: String,
    /// Amount and unit, e.g. `300 W`
    pub allocation: String,
    /// Power priority, 1 is highest
    pub priority: u32,
    /// Model, e.g. `PowerEdgeM610`
    pub blade_type: String,
}

impl ServerPower {
    /// Whether the blade is powered on
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.power_state == POWER_STATE_ON
    }
}

fn push_server(out: &mut PowerBudgetInfo, values: &[String]) -> Result<(), FieldError> {
    let [slot, name, state, amount, unit, priority, blade_type] = values else {
        return Err(FieldError::Arity {
            expected: SERVER_ARITY,
            actual: values.len(),
        });
    };
    out.servers.push(ServerPower {
        slot_number: parse_unsigned(slot)?,
        server_name: name.clone(),
        power_state: state.clone(),
        allocation: format!("{amount} {unit}"),
        priority: parse_unsigned(priority)?,
        blade_type: blade_type.clone(),
    });
    Ok(())
}

static CONFIG: LazyLock<ParseConfig<PowerBudgetInfo>> = LazyLock::new(|| {
    ParseConfig::new(
        Tokenizer::Sections(SECTIONS),
        [(SERVER_KEY, Extractor::repeated(Extract::Rows(push_server)))],
    )
});

/// Schema for [`COMMAND`]
#[must_use]
pub fn config() -> &'static ParseConfig<PowerBudgetInfo> {
    &CONFIG
}

/// Parses `getpbinfo` output
///
/// # Errors
///
/// Returns the first parse failure, including rows that appear before any
/// known section header.
pub fn parse<R: BufRead>(reader: R, ctx: &ParseContext) -> ParseResult<PowerBudgetInfo> {
    CONFIG.parse(reader, ctx)
}
