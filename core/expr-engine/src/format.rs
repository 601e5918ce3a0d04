//! FILENAME: core/expr-engine/src/format.rs
//! PURPOSE: Converts values into display strings for field elements.
//! CONTEXT: The band engine depends on the `Formatter` trait only. This file
//! provides `FormatSpec` (the per-element format description carried in a
//! report definition) and `StandardFormatter`, which supports the number
//! formats below with locale-aware separators.
//!
//! LOCALES: "en" (1,234.5), "de" (1.234,5), "fr" (1 234,5 with a no-break
//! space). Region suffixes ("de-AT", "fr_CH") map to their language.
//! Anything else falls back to "en".

use crate::value::Value;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest accepted number of decimal places.
const MAX_DECIMAL_PLACES: u8 = 20;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    #[error("cannot format a {found} value as {spec}")]
    UnsupportedValue { spec: String, found: &'static str },

    #[error("invalid format: {0}")]
    InvalidPattern(String),
}

/// Position of currency symbol relative to the number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CurrencyPosition {
    #[default]
    Before, // $100
    After, // 100$
}

/// How a value is displayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormatSpec {
    /// Numbers without trailing zeros, other values as text.
    #[default]
    General,
    Number {
        #[serde(default)]
        decimal_places: u8,
        #[serde(default)]
        use_thousands_separator: bool,
    },
    Currency {
        #[serde(default = "default_currency_places")]
        decimal_places: u8,
        symbol: String,
        #[serde(default)]
        symbol_position: CurrencyPosition,
    },
    Percentage {
        #[serde(default)]
        decimal_places: u8,
    },
    Scientific {
        #[serde(default = "default_currency_places")]
        decimal_places: u8,
    },
    /// The value's plain text.
    Text,
    Boolean {
        #[serde(default = "default_true_text")]
        true_text: String,
        #[serde(default = "default_false_text")]
        false_text: String,
    },
}

fn default_currency_places() -> u8 {
    2
}

fn default_true_text() -> String {
    "Yes".to_string()
}

fn default_false_text() -> String {
    "No".to_string()
}

impl FormatSpec {
    pub fn number(decimal_places: u8) -> FormatSpec {
        FormatSpec::Number {
            decimal_places,
            use_thousands_separator: false,
        }
    }

    pub fn number_with_separators(decimal_places: u8) -> FormatSpec {
        FormatSpec::Number {
            decimal_places,
            use_thousands_separator: true,
        }
    }

    pub fn currency(symbol: &str, decimal_places: u8) -> FormatSpec {
        FormatSpec::Currency {
            decimal_places,
            symbol: symbol.to_string(),
            symbol_position: CurrencyPosition::Before,
        }
    }

    pub fn percentage(decimal_places: u8) -> FormatSpec {
        FormatSpec::Percentage { decimal_places }
    }

    fn name(&self) -> &'static str {
        match self {
            FormatSpec::General => "general",
            FormatSpec::Number { .. } => "number",
            FormatSpec::Currency { .. } => "currency",
            FormatSpec::Percentage { .. } => "percentage",
            FormatSpec::Scientific { .. } => "scientific",
            FormatSpec::Text => "text",
            FormatSpec::Boolean { .. } => "boolean",
        }
    }

    fn decimal_places(&self) -> Option<u8> {
        match self {
            FormatSpec::Number { decimal_places, .. }
            | FormatSpec::Currency { decimal_places, .. }
            | FormatSpec::Percentage { decimal_places }
            | FormatSpec::Scientific { decimal_places } => Some(*decimal_places),
            _ => None,
        }
    }
}

/// The formatting collaborator.
pub trait Formatter {
    fn format(
        &self,
        value: &Value,
        spec: Option<&FormatSpec>,
        locale: &str,
    ) -> Result<String, FormatError>;
}

/// Separators for a locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocaleSymbols {
    pub decimal: char,
    pub group: char,
}

impl LocaleSymbols {
    pub fn for_locale(locale: &str) -> LocaleSymbols {
        let language = locale
            .split(|c| c == '-' || c == '_')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        match language.as_str() {
            "de" => LocaleSymbols {
                decimal: ',',
                group: '.',
            },
            "fr" => LocaleSymbols {
                decimal: ',',
                group: '\u{a0}',
            },
            _ => LocaleSymbols {
                decimal: '.',
                group: ',',
            },
        }
    }
}

/// Reference formatter for `FormatSpec`.
#[derive(Debug, Clone, Default)]
pub struct StandardFormatter {
    /// Text shown for Empty values, whatever the format.
    empty_text: String,
}

impl StandardFormatter {
    pub fn new() -> Self {
        StandardFormatter::default()
    }

    pub fn with_empty_text(mut self, text: impl Into<String>) -> Self {
        self.empty_text = text.into();
        self
    }
}

impl Formatter for StandardFormatter {
    fn format(
        &self,
        value: &Value,
        spec: Option<&FormatSpec>,
        locale: &str,
    ) -> Result<String, FormatError> {
        if value.is_empty() {
            return Ok(self.empty_text.clone());
        }

        let general = FormatSpec::General;
        let spec = spec.unwrap_or(&general);
        if let Some(places) = spec.decimal_places() {
            if places > MAX_DECIMAL_PLACES {
                return Err(FormatError::InvalidPattern(format!(
                    "decimal places must be at most {}, got {}",
                    MAX_DECIMAL_PLACES, places
                )));
            }
        }

        let symbols = LocaleSymbols::for_locale(locale);

        match spec {
            FormatSpec::General => Ok(match value {
                Value::Number(n) => localize(&format_general(*n), symbols),
                other => other.as_text(),
            }),
            FormatSpec::Text => Ok(value.as_text()),
            FormatSpec::Boolean {
                true_text,
                false_text,
            } => match value {
                Value::Boolean(_) | Value::Number(_) => Ok(if value.is_truthy() {
                    true_text.clone()
                } else {
                    false_text.clone()
                }),
                other => Err(unsupported(spec, other)),
            },
            numeric => {
                let Value::Number(n) = value else {
                    return Err(unsupported(numeric, value));
                };
                Ok(localize(&format_number(*n, numeric), symbols))
            }
        }
    }
}

fn unsupported(spec: &FormatSpec, value: &Value) -> FormatError {
    FormatError::UnsupportedValue {
        spec: spec.name().to_string(),
        found: value.type_name(),
    }
}

/// Formats with en separators ('.' decimal, ',' group).
fn format_number(value: f64, spec: &FormatSpec) -> String {
    match spec {
        FormatSpec::Number {
            decimal_places,
            use_thousands_separator,
        } => format_decimal(value, *decimal_places, *use_thousands_separator),
        FormatSpec::Currency {
            decimal_places,
            symbol,
            symbol_position,
        } => format_currency(value, *decimal_places, symbol, *symbol_position),
        FormatSpec::Percentage { decimal_places } => format_percentage(value, *decimal_places),
        FormatSpec::Scientific { decimal_places } => format_scientific(value, *decimal_places),
        _ => format_general(value),
    }
}

/// Format a number in general format (auto-detect best representation).
fn format_general(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }

    let abs_value = value.abs();

    // Use scientific notation for very large or very small numbers
    if abs_value >= 1e10 || abs_value < 1e-4 {
        return format!("{:.5e}", value)
            .replace('e', "E");
    }

    if value.fract() == 0.0 {
        return format!("{:.0}", value);
    }

    // Up to 10 decimals, trailing zeros trimmed
    format!("{:.10}", value)
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

fn format_decimal(value: f64, decimal_places: u8, use_thousands_separator: bool) -> String {
    let rounded = format!("{:.prec$}", value, prec = decimal_places as usize);

    if use_thousands_separator {
        add_thousands_separator(&rounded)
    } else {
        rounded
    }
}

fn add_thousands_separator(s: &str) -> String {
    let (integer_part, decimal_part) = match s.split_once('.') {
        Some((int, dec)) => (int, Some(dec)),
        None => (s, None),
    };

    let negative = integer_part.starts_with('-');
    let digits: Vec<char> = integer_part.chars().filter(|c| c.is_ascii_digit()).collect();

    let mut result = String::new();
    if negative {
        result.push('-');
    }
    let len = digits.len();
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }

    if let Some(decimal) = decimal_part {
        result.push('.');
        result.push_str(decimal);
    }

    result
}

fn format_currency(
    value: f64,
    decimal_places: u8,
    symbol: &str,
    position: CurrencyPosition,
) -> String {
    let formatted = add_thousands_separator(&format!(
        "{:.prec$}",
        value.abs(),
        prec = decimal_places as usize
    ));

    let with_symbol = match position {
        CurrencyPosition::Before => format!("{}{}", symbol, formatted),
        CurrencyPosition::After => format!("{} {}", formatted, symbol),
    };

    // Accounting style for negatives
    if value < 0.0 {
        format!("({})", with_symbol)
    } else {
        with_symbol
    }
}

fn format_percentage(value: f64, decimal_places: u8) -> String {
    format!("{:.prec$}%", value * 100.0, prec = decimal_places as usize)
}

fn format_scientific(value: f64, decimal_places: u8) -> String {
    format!("{:.prec$e}", value, prec = decimal_places as usize).replace('e', "E")
}

/// Swaps en separators for the locale's.
fn localize(formatted: &str, symbols: LocaleSymbols) -> String {
    formatted
        .chars()
        .map(|c| match c {
            '.' => symbols.decimal,
            ',' => symbols.group,
            other => other,
        })
        .collect()
}
