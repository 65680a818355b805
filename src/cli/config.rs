//! Config CLI command.

use crate::config::InstructConfig;
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use std::io::{self, Write};

/// Masks a secret for display, keeping at most the last four characters.
#[must_use]
pub fn mask_secret(secret: &SecretString) -> String {
    let raw = secret.expose_secret();
    let len = raw.chars().count();
    if len <= 8 {
        return "*".repeat(len.max(4));
    }
    let tail: String = raw.chars().skip(len - 4).collect();
    format!("****{tail}")
}

/// Writes the effective configuration.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_config<W: Write>(writer: &mut W, config: &InstructConfig) -> io::Result<()> {
    let llm = &config.llm;
    writeln!(writer, "Current Configuration")?;
    writeln!(writer, "=====================")?;
    writeln!(writer)?;
    writeln!(writer, "Instruction History: {}", config.data_path.display())?;
    writeln!(writer)?;
    writeln!(writer, "LLM Configuration:")?;
    writeln!(
        writer,
        "  API Key: {}",
        llm.api_key.as_ref().map_or_else(|| "(not set)".to_string(), mask_secret)
    )?;
    writeln!(writer, "  Model: {}", llm.model)?;
    writeln!(writer, "  Base URL: {}", llm.base_url)?;
    writeln!(writer, "  Temperature: {}", llm.temperature)?;
    writeln!(writer, "  Max Tokens: {}", llm.max_tokens)?;
    writeln!(writer, "  Top P: {}", llm.top_p)?;
    writeln!(writer, "  Frequency Penalty: {}", llm.frequency_penalty)?;
    writeln!(writer, "  Presence Penalty: {}", llm.presence_penalty)?;
    writeln!(writer, "  Timeout: {} ms", llm.timeout_ms)?;
    writeln!(writer, "  Connect Timeout: {} ms", llm.connect_timeout_ms)?;
    writeln!(writer, "  Max Concurrency: {}", llm.max_concurrency)?;
    writeln!(writer)?;
    writeln!(writer, "Logging:")?;
    writeln!(writer, "  Level: {}", config.logging.level)?;
    writeln!(writer, "  Format: {:?}", config.logging.format)?;
    writeln!(
        writer,
        "  File: {}",
        config
            .logging
            .file
            .as_ref()
            .map_or_else(|| "(stderr)".to_string(), |p| p.display().to_string())
    )
}

/// Executes the config command.
///
/// # Errors
///
/// Returns an error if output fails.
pub fn cmd_config(config: &InstructConfig, show: bool) -> Result<()> {
    let mut out = io::stdout().lock();
    let written = if show {
        write_config(&mut out, config)
    } else {
        writeln!(out, "Use --show to display configuration")
    };
    written.map_err(|e| Error::operation("write_stdout", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_secret() {
        assert_eq!(
            mask_secret(&SecretString::from("sk-abcdefghij1234".to_string())),
            "****1234"
        );
        assert_eq!(mask_secret(&SecretString::from("short".to_string())), "*****");
        assert_eq!(mask_secret(&SecretString::from("".to_string())), "****");
    }

    #[test]
    fn test_write_config_masks_api_key() {
        let mut config = InstructConfig::new();
        config.llm.api_key = Some(SecretString::from("sk-live-secret-9876".to_string()));

        let mut out = Vec::new();
        write_config(&mut out, &config).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("API Key: ****9876"));
        assert!(!text.contains("sk-live-secret"));
        assert!(text.contains("Model: gpt-3.5-turbo"));
    }

    #[test]
    fn test_write_config_without_key() {
        let mut config = InstructConfig::new();
        config.llm.api_key = None;
        let mut out = Vec::new();
        write_config(&mut out, &config).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("API Key: (not set)"));
    }
}
