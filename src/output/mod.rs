//! Output formatters.

use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;

use crate::core::Result;
use crate::coverage::render_function_report;
use crate::report::{render_markdown, render_text, Report};

/// Output format enum.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Text,
    Json,
    Markdown,
}

impl Format {
    /// Write a selection report.
    pub fn write_report<W: Write>(&self, report: &Report, writer: &mut W) -> Result<()> {
        match self {
            Format::Json => format_json(report, writer),
            Format::Markdown => render_markdown(report, writer),
            Format::Text => render_text(report, writer),
        }
    }

    /// Write per-function coverage, sorted by function.
    pub fn write_function_coverage<W: Write>(
        &self,
        functions: &BTreeMap<String, f64>,
        total: Option<f64>,
        writer: &mut W,
    ) -> Result<()> {
        match self {
            Format::Json => {
                #[derive(Serialize)]
                struct FunctionCoverage<'a> {
                    functions: &'a BTreeMap<String, f64>,
                    total: Option<f64>,
                }
                format_json(&FunctionCoverage { functions, total }, writer)
            }
            Format::Markdown => {
                writeln!(writer, "| Function | Coverage |")?;
                writeln!(writer, "|---|---|")?;
                for (function, percent) in functions {
                    writeln!(writer, "| `{function}` | {percent:.1}% |")?;
                }
                if let Some(total) = total {
                    writeln!(writer, "| **total** | {total:.1}% |")?;
                }
                Ok(())
            }
            Format::Text => {
                writer.write_all(render_function_report(functions, total).as_bytes())?;
                Ok(())
            }
        }
    }
}

fn format_json<T: Serialize, W: Write>(value: &T, writer: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, value)?;
    writeln!(writer)?;
    Ok(())
}
