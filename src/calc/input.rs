// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Raw numeric input as submitted by calculator forms.

use super::CalcError;
use serde::Deserialize;

/// A numeric form field. Accepts either a JSON number or a string, since
/// browser form values arrive as text. Any other JSON value is kept so it
/// can be reported against its field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl NumericInput {
    /// True for blank text fields.
    pub fn is_blank(&self) -> bool {
        matches!(self, NumericInput::Text(s) if s.trim().is_empty())
    }

    /// Parse the field as a number.
    pub fn parse(&self, field: &'static str) -> Result<f64, CalcError> {
        match self {
            NumericInput::Number(n) => Ok(*n),
            NumericInput::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(CalcError::Missing(field));
                }
                trimmed
                    .parse::<f64>()
                    .map_err(|_| CalcError::NotNumeric(field))
            }
            NumericInput::Other(_) => Err(CalcError::NotNumeric(field)),
        }
    }
}

impl From<f64> for NumericInput {
    fn from(value: f64) -> Self {
        NumericInput::Number(value)
    }
}

impl From<&str> for NumericInput {
    fn from(value: &str) -> Self {
        NumericInput::Text(value.to_string())
    }
}

/// Parse a required field.
pub fn required(field: &'static str, input: Option<&NumericInput>) -> Result<f64, CalcError> {
    input.ok_or(CalcError::Missing(field))?.parse(field)
}

/// Parse an optional field; absent or blank yields `default`.
pub fn optional(
    field: &'static str,
    input: Option<&NumericInput>,
    default: f64,
) -> Result<f64, CalcError> {
    match input {
        None => Ok(default),
        Some(value) if value.is_blank() => Ok(default),
        Some(value) => value.parse(field),
    }
}

/// Parse a list of gear ratios, skipping blank slots.
pub fn gear_list(inputs: &[NumericInput]) -> Result<Vec<f64>, CalcError> {
    inputs
        .iter()
        .filter(|input| !input.is_blank())
        .map(|input| input.parse("gear_ratio"))
        .collect()
}
