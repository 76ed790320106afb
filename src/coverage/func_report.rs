//! Per-function coverage reports (`<file>:<line>:\t<func>\t<pct>%`).

use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Parse a per-function report into `function -> percent`.
///
/// The key is everything before the percentage, with fields joined by a
/// single space (`file.go:12: Name`). The `total:` trailer and lines that
/// do not end in a percentage are ignored.
pub fn parse_function_report(text: &str) -> BTreeMap<String, f64> {
    let mut functions = BTreeMap::new();

    for line in text.lines() {
        if line.is_empty() || line.starts_with("total:") {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            continue;
        }
        let Some((last, name_fields)) = fields.split_last() else {
            continue;
        };
        let Some(percent) = last
            .strip_suffix('%')
            .and_then(|p| p.parse::<f64>().ok())
        else {
            continue;
        };
        functions.insert(name_fields.join(" "), percent);
    }

    functions
}

/// Render `function -> percent` pairs in the report format, with a
/// `total:` trailer when `total` is known.
///
/// Keys of the form `file:Name` are split so the file becomes the first
/// column.
pub fn render_function_report(functions: &BTreeMap<String, f64>, total: Option<f64>) -> String {
    let rows: Vec<(String, String, String)> = functions
        .iter()
        .map(|(key, percent)| {
            let (location, name) = match key.rsplit_once(": ") {
                Some((loc, name)) => (format!("{loc}:"), name.to_string()),
                None => match key.rsplit_once(':') {
                    Some((file, name)) if !name.is_empty() => (format!("{file}:"), name.to_string()),
                    _ => (String::new(), key.clone()),
                },
            };
            (location, name, format!("{percent:.1}%"))
        })
        .collect();

    let loc_width = rows.iter().map(|r| r.0.len()).max().unwrap_or(0).max(6);
    let name_width = rows.iter().map(|r| r.1.len()).max().unwrap_or(0);

    let mut out = String::new();
    for (location, name, percent) in &rows {
        let _ = writeln!(out, "{location:<loc_width$}\t{name:<name_width$}\t{percent}");
    }
    if let Some(total) = total {
        let _ = writeln!(
            out,
            "{:<loc_width$}\t{:<name_width$}\t{total:.1}%",
            "total:", "(statements)"
        );
    }
    out
}
