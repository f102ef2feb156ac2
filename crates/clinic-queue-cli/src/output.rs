// Output formatting for CLI

use anyhow::Result;
use serde::Serialize;

use clinic_queue_core::{Token, ViewState};

#[derive(Clone, Copy)]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Self {
        match s {
            "json" => OutputFormat::Json,
            "yaml" => OutputFormat::Yaml,
            _ => OutputFormat::Text,
        }
    }

    pub fn print_value<T: Serialize>(&self, value: &T) -> Result<()> {
        match self {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(value)?);
            }
            OutputFormat::Yaml => {
                print!("{}", serde_yaml::to_string(value)?);
            }
            OutputFormat::Text => {
                // Text format is handled by each command
            }
        }
        Ok(())
    }

    pub fn is_text(&self) -> bool {
        matches!(self, OutputFormat::Text)
    }
}

/// Machine-readable queue view
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueReport<'a> {
    pub current_token: Option<&'a Token>,
    pub waiting_tokens: &'a [Token],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_wait_time: Option<f64>,
}

impl<'a> QueueReport<'a> {
    pub fn from_state(state: &'a ViewState) -> Self {
        Self {
            current_token: state.current_token(),
            waiting_tokens: state.waiting_tokens(),
            average_wait_time: state.average_wait_time,
        }
    }
}

/// Print a simple key-value pair for text output
pub fn print_field(label: &str, value: &str) {
    println!("{:<14} {}", format!("{}:", label), value);
}

/// Print a table header
pub fn print_table_header(columns: &[(&str, usize)]) {
    let header: String = columns
        .iter()
        .map(|(name, width)| format!("{:<width$}", name, width = width))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{}", header);
}

/// Print a table row
pub fn print_table_row(values: &[(&str, usize)]) {
    let row: String = values
        .iter()
        .map(|(val, width)| format!("{:<width$}", truncate(val, *width), width = width))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{}", row);
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let kept: String = value.chars().take(width.saturating_sub(3)).collect();
    format!("{kept}...")
}

pub fn token_label(token: &Token) -> String {
    let vip = if token.is_vip { " (VIP)" } else { "" };
    format!("#{} {}{}", token.token_number, token.patient_name, vip)
}

const TOKEN_COLUMNS: [(&str, usize); 6] = [
    ("NUMBER", 7),
    ("PATIENT", 24),
    ("PHONE", 14),
    ("STATUS", 8),
    ("VIP", 3),
    ("CREATED", 16),
];

pub fn print_token_table(tokens: &[Token]) {
    print_table_header(&TOKEN_COLUMNS);
    for token in tokens {
        let number = token.token_number.to_string();
        let status = token.status.to_string();
        let vip = if token.is_vip { "yes" } else { "" };
        let created = token
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        print_table_row(&[
            (&number, TOKEN_COLUMNS[0].1),
            (&token.patient_name, TOKEN_COLUMNS[1].1),
            (&token.phone_number, TOKEN_COLUMNS[2].1),
            (&status, TOKEN_COLUMNS[3].1),
            (vip, TOKEN_COLUMNS[4].1),
            (&created, TOKEN_COLUMNS[5].1),
        ]);
    }
}

/// Text rendering of a queue view
pub fn print_queue(state: &ViewState) {
    match state.current_token() {
        Some(token) => print_field("Now serving", &token_label(token)),
        None => print_field("Now serving", "-"),
    }
    if let Some(minutes) = state.average_wait_time {
        print_field("Avg wait", &format!("{minutes:.0} min"));
    }

    let waiting = state.waiting_tokens();
    if waiting.is_empty() {
        println!("No patients waiting");
        return;
    }
    println!("Waiting ({}):", waiting.len());
    print_token_table(waiting);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Zoë Ångström-Long", 8), "Zoë Å...");
    }

    #[test]
    fn test_token_label_marks_vip() {
        let token: Token = serde_json::from_value(serde_json::json!({
            "_id": "a1", "tokenNumber": 7, "patientName": "Ann", "isVIP": true
        }))
        .unwrap();
        assert_eq!(token_label(&token), "#7 Ann (VIP)");
    }
}
