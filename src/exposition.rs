//! Prometheus text exposition format (version 0.0.4) for metric families.

use std::fmt::Write;

use crate::collector::MetricFamily;

/// Content type of the exposition format served on the metrics endpoint.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Append one family to the output: HELP and TYPE comments followed by one
/// line per sample. A family with no samples still gets its comments, so a
/// suppressed query is visible as a present-but-empty family.
pub fn write_family(out: &mut String, family: &MetricFamily) {
    writeln!(out, "# HELP {} {}", family.name, family.help).ok();
    writeln!(out, "# TYPE {} gauge", family.name).ok();

    for sample in &family.samples {
        writeln!(
            out,
            "{}{} {}",
            family.name,
            format_labels(&sample.labels),
            format_value(sample.value)
        )
        .ok();
    }
}

/// Render a full snapshot, mainly for tests; the HTTP layer streams
/// families through [`write_family`] as they arrive.
pub fn render(families: &[MetricFamily]) -> String {
    let mut out = String::new();
    for family in families {
        write_family(&mut out, family);
    }
    out
}

fn format_labels(labels: &[(&'static str, String)]) -> String {
    if labels.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();

    format!("{{{}}}", parts.join(","))
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Format a floating point value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}
