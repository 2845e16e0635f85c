//! Coloured diagnostics on stderr.

use std::io::{IsTerminal, Write};

use anyhow::Result;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::analysis::AnalysisReport;
use crate::config::ConfigWarning;

fn stderr_stream() -> StandardStream {
    let choice = if std::io::stderr().is_terminal() {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stderr(choice)
}

fn write_label(out: &mut dyn WriteColor, label: &str, color: Color) -> Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    write!(out, "{label}")?;
    out.reset()?;
    Ok(())
}

/// Writes the report's security warnings, one block per warning kind.
pub fn write_security_warnings(out: &mut dyn WriteColor, report: &AnalysisReport) -> Result<()> {
    for warning in &report.security_warnings {
        write_label(out, "warning:", Color::Yellow)?;
        writeln!(out, " {}", warning.message)?;
        for finding in &warning.findings {
            writeln!(out, "  - {} (matched {})", finding.file, finding.matched_pattern)?;
        }
    }
    Ok(())
}

/// Writes skipped configuration patterns.
pub fn write_config_warnings(out: &mut dyn WriteColor, warnings: &[ConfigWarning]) -> Result<()> {
    for warning in warnings {
        write_label(out, "warning:", Color::Yellow)?;
        writeln!(out, " {warning}")?;
    }
    Ok(())
}

/// Prints the report's security warnings to stderr.
pub fn print_security_warnings(report: &AnalysisReport) -> Result<()> {
    let mut stderr = stderr_stream();
    write_security_warnings(&mut stderr, report)?;
    stderr.flush()?;
    Ok(())
}

/// Prints skipped configuration patterns to stderr.
pub fn print_config_warnings(warnings: &[ConfigWarning]) -> Result<()> {
    if warnings.is_empty() {
        return Ok(());
    }
    let mut stderr = stderr_stream();
    write_config_warnings(&mut stderr, warnings)?;
    stderr.flush()?;
    Ok(())
}

/// Prints a one-line notice with a coloured label to stderr.
pub fn print_notice(label: &str, color: Color, message: &str) -> Result<()> {
    let mut stderr = stderr_stream();
    write_label(&mut stderr, label, color)?;
    writeln!(stderr, " {message}")?;
    stderr.flush()?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisReport, FindingGroup, ReasonKind, SensitiveFinding, Summary};
    use termcolor::NoColor;

    #[test]
    fn security_warnings_list_each_finding() {
        let findings = vec![FindingGroup {
            file: ".env".to_string(),
            findings: vec![SensitiveFinding {
                file: ".env".to_string(),
                reason_kind: ReasonKind::FilenamePattern,
                matched_pattern: ".env".to_string(),
            }],
        }];
        let report = AnalysisReport::assemble(Summary::default(), &findings);

        let mut out = NoColor::new(Vec::new());
        write_security_warnings(&mut out, &report).unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert_eq!(
            text,
            "warning: Found 1 potentially sensitive file\n  - .env (matched .env)\n"
        );
    }

    #[test]
    fn config_warnings_are_prefixed() {
        let warnings = vec![ConfigWarning {
            pattern: "[a".to_string(),
            message: "unclosed character class".to_string(),
        }];
        let mut out = NoColor::new(Vec::new());
        write_config_warnings(&mut out, &warnings).unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert_eq!(
            text,
            "warning: skipping pattern '[a': unclosed character class\n"
        );
    }
}
