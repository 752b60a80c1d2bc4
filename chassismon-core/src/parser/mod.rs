//! Schema-driven parser for line-oriented command output
//!
//! Chassis management commands print loosely structured text: `key = value`
//! listings, whitespace-separated tables, and tables split into bracketed
//! sections. A [`ParseConfig`] describes one command's output as a
//! [`Tokenizer`] (how a line becomes a key and its values) plus a table of
//! [`Extractor`]s (how those values land in a typed record).
//!
//! Parsing is all-or-nothing: the first tokenizer or extractor failure aborts
//! the parse and no partial record is returned.

mod fields;

use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use std::net::IpAddr;

use chrono::DateTime;
use chrono_tz::Tz;

pub use fields::{
    MacAddress, NetMask, TIMESTAMP_FORMAT, format_timestamp, parse_address, parse_decimal,
    parse_flag, parse_signed, parse_timestamp, parse_unsigned,
};

/// Marker that starts a column-description row, e.g. `<Slot#> <Server Name>`
pub const FRAMING_MARKER: char = '<';

/// Errors raised while converting a single key's values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    /// A scalar key carried more or fewer than one value
    #[error("got {actual} values, expected exactly one")]
    ValueCount {
        /// Number of values received
        actual: usize,
    },
    /// A tabular row had the wrong number of positional fields
    #[error("unexpected number of values {actual}, wanted {expected}")]
    Arity {
        /// Fixed arity of the row shape
        expected: usize,
        /// Number of fields on the line
        actual: usize,
    },
    /// Booleans are encoded as literal `0` or `1`
    #[error("unexpected bool value {0:?}")]
    Flag(String),
    /// Integer conversion failed
    #[error("failed to parse integer {value:?}: {reason}")]
    Integer {
        /// Offending text
        value: String,
        /// Underlying parse failure
        reason: String,
    },
    /// Decimal conversion failed
    #[error("failed to parse number {value:?}: {reason}")]
    Decimal {
        /// Offending text
        value: String,
        /// Underlying parse failure
        reason: String,
    },
    /// Timestamp conversion failed
    #[error("failed to parse time {value:?}: {reason}")]
    Timestamp {
        /// Offending text
        value: String,
        /// Underlying parse failure
        reason: String,
    },
    /// Not a network address
    #[error("invalid IP {0:?}")]
    Address(String),
    /// Not a hardware (MAC) address
    #[error("invalid hardware address {0:?}")]
    Hardware(String),
    /// Value present but semantically unusable
    #[error("{0}")]
    Invalid(String),
}

/// Errors that abort a whole parse
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The line did not split into enough whitespace-separated fields
    #[error("line {line}: expected at least {expected} fields, got {actual}")]
    TooFewFields {
        /// 1-based line number
        line: usize,
        /// Minimum field count for the active row shape
        expected: usize,
        /// Fields found on the line
        actual: usize,
    },
    /// A data row appeared outside any recognised section
    #[error("line {line}: row {text:?} is not inside a known block")]
    UnknownBlock {
        /// 1-based line number
        line: usize,
        /// Trimmed line text
        text: String,
    },
    /// A key that may appear once appeared again
    #[error("line {line}: key {key:?} occurred at least twice")]
    DuplicateKey {
        /// 1-based line number of the second occurrence
        line: usize,
        /// Repeated key
        key: String,
    },
    /// An extractor rejected the values for its key
    #[error("line {line}: failed to extract value(s) {values:?} for key {key:?}: {source}")]
    Extract {
        /// 1-based line number
        line: usize,
        /// Key being extracted
        key: String,
        /// Values handed to the extractor
        values: Vec<String>,
        /// Conversion failure
        #[source]
        source: FieldError,
    },
    /// The output stream could not be read
    #[error("failed to read output: {0}")]
    Read(String),
}

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Ambient values a parse depends on.
///
/// The chassis prints wall-clock times without an offset, so the zone it runs
/// in has to be supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseContext {
    timezone: Tz,
}

impl ParseContext {
    /// Creates a context that interprets timestamps in `timezone`
    #[must_use]
    pub const fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    /// Zone used for timestamp fields
    #[must_use]
    pub const fn timezone(&self) -> Tz {
        self.timezone
    }
}

impl Default for ParseContext {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

/// Outcome of tokenizing one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Nothing to extract on this line
    Skip,
    /// A key with its ordered values
    Entry {
        /// Extractor lookup key
        key: String,
        /// Values in line order
        values: Vec<String>,
    },
}

/// Row shape of a section whose rows are extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionRows {
    /// Key every row in the section is dispatched under
    pub key: &'static str,
    /// Rows with fewer whitespace-separated fields are rejected
    pub min_fields: usize,
}

/// A bracketed block of tabular output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    /// Exact header line that opens the section
    pub header: &'static str,
    /// `None` when the section's rows are skipped
    pub rows: Option<SectionRows>,
}

/// How a line is split into a key and values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tokenizer {
    /// `key <sep> value`, split on the first separator; lines without it are skipped
    KeyValue {
        /// Separator character, `=` or `:`
        separator: char,
    },
    /// First whitespace field is the key, the rest are positional values
    Columns,
    /// Rows are dispatched by the most recent section header
    Sections(&'static [Section]),
}

impl Tokenizer {
    fn splitter(&self) -> LineSplitter<'_> {
        LineSplitter {
            tokenizer: self,
            block: None,
        }
    }
}

/// Per-parse tokenizer state
struct LineSplitter<'a> {
    tokenizer: &'a Tokenizer,
    block: Option<&'a Section>,
}

impl LineSplitter<'_> {
    /// Splits a trimmed, non-empty line; framing rows are skipped for every tokenizer
    fn split(&mut self, text: &str, line: usize) -> ParseResult<Token> {
        if text.starts_with(FRAMING_MARKER) {
            return Ok(Token::Skip);
        }
        match *self.tokenizer {
            Tokenizer::KeyValue { separator } => Ok(text
                .split_once(separator)
                .map_or(Token::Skip, |(key, value)| Token::Entry {
                    key: key.trim().to_string(),
                    values: vec![value.trim().to_string()],
                })),
            Tokenizer::Columns => {
                let mut fields = text.split_whitespace().map(str::to_string);
                let key = fields.next().unwrap_or_default();
                let values: Vec<String> = fields.collect();
                if values.is_empty() {
                    return Err(ParseError::TooFewFields {
                        line,
                        expected: 2,
                        actual: 1,
                    });
                }
                Ok(Token::Entry { key, values })
            }
            Tokenizer::Sections(sections) => {
                if let Some(section) = sections.iter().find(|s| s.header == text) {
                    self.block = Some(section);
                    return Ok(Token::Skip);
                }
                let Some(section) = self.block else {
                    return Err(ParseError::UnknownBlock {
                        line,
                        text: text.to_string(),
                    });
                };
                let Some(rows) = section.rows else {
                    return Ok(Token::Skip);
                };
                let values: Vec<String> = text.split_whitespace().map(str::to_string).collect();
                if values.len() < rows.min_fields {
                    return Err(ParseError::TooFewFields {
                        line,
                        expected: rows.min_fields,
                        actual: values.len(),
                    });
                }
                Ok(Token::Entry {
                    key: rows.key.to_string(),
                    values,
                })
            }
        }
    }
}

/// Conversion applied to a key's values, with the record field it targets.
///
/// Scalar kinds take exactly one value. `Rows` receives every value on the
/// line and usually appends one row-record to a collection.
pub enum Extract<T> {
    /// Copy the value verbatim
    Text(fn(&mut T) -> &mut String),
    /// `0` / `1`
    Flag(fn(&mut T) -> &mut bool),
    /// Unsigned decimal integer
    Unsigned(fn(&mut T) -> &mut u32),
    /// Chassis wall-clock time in the context's zone
    Timestamp(fn(&mut T) -> &mut Option<DateTime<Tz>>),
    /// MAC address
    Hardware(fn(&mut T) -> &mut Option<MacAddress>),
    /// IPv4 or IPv6 address
    Address(fn(&mut T) -> &mut Option<IpAddr>),
    /// Address-formatted netmask
    Mask(fn(&mut T) -> &mut Option<NetMask>),
    /// Custom conversion over all positional values
    Rows(fn(&mut T, &[String]) -> Result<(), FieldError>),
}

impl<T> Extract<T> {
    fn apply(&self, record: &mut T, values: &[String], ctx: &ParseContext) -> Result<(), FieldError> {
        match *self {
            Self::Text(field) => *field(record) = single(values)?.to_string(),
            Self::Flag(field) => *field(record) = parse_flag(single(values)?)?,
            Self::Unsigned(field) => *field(record) = parse_unsigned(single(values)?)?,
            Self::Timestamp(field) => {
                *field(record) = Some(parse_timestamp(single(values)?, ctx.timezone())?);
            }
            Self::Hardware(field) => *field(record) = Some(single(values)?.parse()?),
            Self::Address(field) => *field(record) = Some(parse_address(single(values)?)?),
            Self::Mask(field) => {
                *field(record) = Some(NetMask::from(parse_address(single(values)?)?));
            }
            Self::Rows(push) => push(record, values)?,
        }
        Ok(())
    }
}

fn single(values: &[String]) -> Result<&str, FieldError> {
    match values {
        [value] => Ok(value),
        _ => Err(FieldError::ValueCount {
            actual: values.len(),
        }),
    }
}

/// An [`Extract`] plus whether its key may repeat across lines
pub struct Extractor<T> {
    extract: Extract<T>,
    repeatable: bool,
}

impl<T> Extractor<T> {
    /// Key must appear at most once
    #[must_use]
    pub const fn once(extract: Extract<T>) -> Self {
        Self {
            extract,
            repeatable: false,
        }
    }

    /// Key may appear on any number of lines
    #[must_use]
    pub const fn repeated(extract: Extract<T>) -> Self {
        Self {
            extract,
            repeatable: true,
        }
    }

    /// Whether the key may repeat
    #[must_use]
    pub const fn is_repeatable(&self) -> bool {
        self.repeatable
    }
}

/// Describes how one command's output maps onto record type `T`
pub struct ParseConfig<T> {
    tokenizer: Tokenizer,
    extractors: HashMap<&'static str, Extractor<T>>,
}

impl<T: Default> ParseConfig<T> {
    /// Builds a config from a tokenizer and a key → extractor table
    pub fn new(
        tokenizer: Tokenizer,
        extractors: impl IntoIterator<Item = (&'static str, Extractor<T>)>,
    ) -> Self {
        Self {
            tokenizer,
            extractors: extractors.into_iter().collect(),
        }
    }

    /// The tokenizer this config splits lines with
    #[must_use]
    pub const fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Parses `reader` into a fresh record.
    ///
    /// Lines are trimmed and blank lines skipped. Keys with no extractor are
    /// ignored so new vendor output does not break parsing.
    ///
    /// # Errors
    ///
    /// Returns the first [`ParseError`] met; nothing is returned for a
    /// partially parsed stream.
    pub fn parse<R: BufRead>(&self, mut reader: R, ctx: &ParseContext) -> ParseResult<T> {
        let mut record = T::default();
        let mut splitter = self.tokenizer.splitter();
        let mut seen: HashSet<String> = HashSet::new();
        let mut buf = Vec::new();
        let mut line = 0;

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| ParseError::Read(e.to_string()))?;
            if read == 0 {
                break;
            }
            line += 1;

            let raw = String::from_utf8_lossy(&buf);
            let text = raw.trim();
            if text.is_empty() {
                continue;
            }

            let (key, values) = match splitter.split(text, line)? {
                Token::Skip => continue,
                Token::Entry { key, values } => (key, values),
            };
            let Some(extractor) = self.extractors.get(key.as_str()) else {
                continue;
            };
            if !extractor.repeatable && !seen.insert(key.clone()) {
                return Err(ParseError::DuplicateKey { line, key });
            }
            if let Err(source) = extractor.extract.apply(&mut record, &values, ctx) {
                return Err(ParseError::Extract {
                    line,
                    key,
                    values,
                    source,
                });
            }
        }

        Ok(record)
    }
}

/// Parses `reader` with `config`; shorthand for [`ParseConfig::parse`]
///
/// # Errors
///
/// See [`ParseConfig::parse`].
pub fn parse_output<T: Default, R: BufRead>(
    config: &ParseConfig<T>,
    reader: R,
    ctx: &ParseContext,
) -> ParseResult<T> {
    config.parse(reader, ctx)
}
