//! Human-facing report rendering.

use std::io::Write;

use colored::Colorize;

use super::{Report, Warning};
use crate::core::{Result, TestId};

const MIN_NAME_WIDTH: usize = 40;

fn name_width(report: &Report) -> usize {
    report
        .kept
        .iter()
        .map(|k| &k.test)
        .chain(&report.redundant_baseline)
        .chain(&report.redundant_non_baseline)
        .map(|t| t.qualified_name().len())
        .max()
        .unwrap_or(0)
        .max(MIN_NAME_WIDTH)
}

/// Render the report as aligned text tables.
pub fn render_text<W: Write>(report: &Report, writer: &mut W) -> Result<()> {
    let width = name_width(report);
    let rule = "=".repeat(width + 20);

    writeln!(writer, "{rule}")?;
    writeln!(writer, "{}", "RESULTS".bold())?;
    writeln!(writer, "{rule}")?;

    let s = &report.summary;
    writeln!(
        writer,
        "\n{} tests discovered ({} baseline, {} non-baseline), {} ran, {} failed",
        s.discovered, s.baseline, s.non_baseline, s.succeeded, s.failed
    )?;
    writeln!(
        writer,
        "Target: {} functions at {:.0}%+ (with all tests)",
        s.targets, report.threshold
    )?;

    let (kept_baseline, kept_other) = report.kept_counts();
    writeln!(
        writer,
        "\nTests that must be kept ({} total: {kept_baseline} baseline, {kept_other} non-baseline):",
        report.kept.len()
    )?;
    writeln!(writer, "  {:<width$} {:>6}   TYPE", "TEST", "FILLS")?;
    writeln!(writer, "  {} {}   --------", "-".repeat(width), "-".repeat(6))?;
    for kept in &report.kept {
        let kind = if kept.baseline {
            "baseline".cyan()
        } else {
            "unit".normal()
        };
        writeln!(
            writer,
            "  {:<width$} {:>6}   {kind}",
            kept.test.qualified_name(),
            kept.filled
        )?;
    }

    write_test_list(
        writer,
        &format!(
            "Baseline tests that could be trimmed ({}):",
            report.redundant_baseline.len()
        ),
        &report.redundant_baseline,
        width,
    )?;
    write_test_list(
        writer,
        &format!(
            "Redundant non-baseline tests ({}):",
            report.redundant_non_baseline.len()
        ),
        &report.redundant_non_baseline,
        width,
    )?;

    if !report.run_failures.is_empty() {
        writeln!(
            writer,
            "\nTests that failed to run ({}):",
            report.run_failures.len()
        )?;
        for failure in &report.run_failures {
            writeln!(
                writer,
                "  {} {}",
                failure.test.qualified_name().red(),
                failure.reason.dimmed()
            )?;
        }
    }

    let unreachable: Vec<&Warning> = report
        .warnings
        .iter()
        .filter(|w| matches!(w, Warning::UnreachableTarget { .. }))
        .collect();
    if !unreachable.is_empty() {
        writeln!(writer, "\n{}", "Unreachable targets:".yellow())?;
        for warning in unreachable {
            writeln!(writer, "  {warning}")?;
        }
    }

    writeln!(writer)?;
    if report.validation_passed() {
        writeln!(
            writer,
            "{} All reachable target functions maintain {:.0}%+ coverage",
            "VALIDATION PASSED:".green().bold(),
            report.threshold
        )?;
    } else {
        let shortfalls: Vec<&Warning> = report.shortfalls().collect();
        writeln!(
            writer,
            "{} {} target functions below {:.0}% with the kept tests",
            "VALIDATION WARNING:".yellow().bold(),
            shortfalls.len(),
            report.threshold
        )?;
        for warning in shortfalls {
            writeln!(writer, "  {warning}")?;
        }
    }

    Ok(())
}

fn write_test_list<W: Write>(
    writer: &mut W,
    title: &str,
    tests: &[TestId],
    width: usize,
) -> Result<()> {
    writeln!(writer, "\n{title}")?;
    writeln!(writer, "  {:<width$}", "TEST")?;
    writeln!(writer, "  {}", "-".repeat(width))?;
    for test in tests {
        writeln!(writer, "  {}", test.qualified_name())?;
    }
    Ok(())
}

/// Render the report as Markdown.
pub fn render_markdown<W: Write>(report: &Report, writer: &mut W) -> Result<()> {
    writeln!(writer, "# Test Redundancy Report\n")?;
    writeln!(writer, "**Package**: `{}`\n", report.package)?;
    writeln!(writer, "**Threshold**: {:.1}%\n", report.threshold)?;
    writeln!(
        writer,
        "**Targets**: {} functions\n",
        report.summary.targets
    )?;

    writeln!(writer, "## Kept Tests\n")?;
    if report.kept.is_empty() {
        writeln!(writer, "_No items_\n")?;
    } else {
        writeln!(writer, "| Test | Fills | Improved | Type |")?;
        writeln!(writer, "|---|---|---|---|")?;
        for kept in &report.kept {
            writeln!(
                writer,
                "| `{}` | {} | {} | {} |",
                kept.test.qualified_name(),
                kept.filled,
                kept.improved,
                if kept.baseline { "baseline" } else { "unit" }
            )?;
        }
        writeln!(writer)?;
    }

    for (title, tests) in [
        ("Redundant Baseline Tests", &report.redundant_baseline),
        ("Redundant Non-Baseline Tests", &report.redundant_non_baseline),
    ] {
        writeln!(writer, "## {title}\n")?;
        if tests.is_empty() {
            writeln!(writer, "_No items_\n")?;
        } else {
            for test in tests {
                writeln!(writer, "- `{}`", test.qualified_name())?;
            }
            writeln!(writer)?;
        }
    }

    if !report.run_failures.is_empty() {
        writeln!(writer, "## Run Failures\n")?;
        for failure in &report.run_failures {
            writeln!(
                writer,
                "- `{}`: {}",
                failure.test.qualified_name(),
                failure.reason
            )?;
        }
        writeln!(writer)?;
    }

    if !report.warnings.is_empty() {
        writeln!(writer, "## Warnings\n")?;
        for warning in &report.warnings {
            writeln!(writer, "- {warning}")?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RunSummary;
    use crate::runner::RunFailure;
    use crate::selector::{BaselinePolicy, KeptTest};

    fn report() -> Report {
        let mut report = Report::new("./...", 80.0, BaselinePolicy::Prefer);
        report.summary = RunSummary {
            discovered: 3,
            baseline: 1,
            non_baseline: 2,
            parallel_safe: 0,
            succeeded: 2,
            failed: 1,
            targets: 4,
        };
        report.kept.push(KeptTest {
            test: TestId::new("example.com/m/calc", "TestAdd"),
            baseline: true,
            improved: 4,
            filled: 4,
        });
        report
            .redundant_non_baseline
            .push(TestId::new("example.com/m/calc", "TestAddAgain"));
        report.run_failures.push(RunFailure {
            test: TestId::new("example.com/m/calc", "TestBroken"),
            reason: "exit status 1".to_string(),
        });
        report
    }

    #[test]
    fn test_render_text() {
        let mut out = Vec::new();
        render_text(&report(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Tests that must be kept (1 total: 1 baseline, 0 non-baseline):"));
        assert!(text.contains("example.com/m/calc:TestAdd "));
        assert!(text.contains("Redundant non-baseline tests (1):"));
        assert!(text.contains("  example.com/m/calc:TestAddAgain\n"));
        assert!(text.contains("Baseline tests that could be trimmed (0):"));
        assert!(text.contains("Tests that failed to run (1):"));
        assert!(text.contains("VALIDATION PASSED:"));
    }

    #[test]
    fn test_render_markdown() {
        let mut out = Vec::new();
        render_markdown(&report(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("# Test Redundancy Report"));
        assert!(text.contains("| `example.com/m/calc:TestAdd` | 4 | 4 | baseline |"));
        assert!(text.contains("- `example.com/m/calc:TestAddAgain`"));
        assert!(text.contains("## Redundant Baseline Tests\n\n_No items_"));
        assert!(text.contains("- `example.com/m/calc:TestBroken`: exit status 1"));
    }
}
