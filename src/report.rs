//! HTML report generation
//!
//! Renders a finding set into a single self-contained document: inline CSS,
//! no external assets, viewable straight from disk. Rendering is a pure
//! function of its inputs and byte-deterministic for a fixed input.
//!
//! Every finding-sourced value is escaped before embedding. Scan targets
//! control those values (URL, description, evidence), so the report treats
//! them as untrusted markup.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::ScanError;
use crate::findings::{Finding, Risk};

/// Report header fields supplied by the session.
#[derive(Debug, Clone)]
pub struct ReportMeta {
    /// Report title
    pub title: String,
    /// Target URL the scan was scoped to
    pub target: String,
    /// Generation timestamp, fixed by the caller
    pub generated_at: DateTime<Utc>,
}

impl ReportMeta {
    pub fn new(target: &str) -> Self {
        Self {
            title: "Security Scan Report".to_string(),
            target: target.to_string(),
            generated_at: Utc::now(),
        }
    }
}

/// Render a finding set to an HTML document.
pub fn render(findings: &[Finding], meta: &ReportMeta) -> String {
    let mut html = String::new();

    html.push_str(&header(&meta.title));
    html.push_str("<body>\n<div class=\"container\">\n");
    html.push_str(&report_header(meta));
    html.push_str(&summary_section(findings));
    html.push_str(&detail_section(findings));
    html.push_str(&footer(meta));
    html.push_str("</div>\n</body>\n</html>\n");

    html
}

/// Render and write to `path`, overwriting any previous report.
pub fn write_report(findings: &[Finding], meta: &ReportMeta, path: &Path) -> Result<(), ScanError> {
    let html = render(findings, meta);
    std::fs::write(path, html)?;
    Ok(())
}

fn header(title: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{}</title>
    <style>
        :root {{
            --bg-primary: #0d1117;
            --bg-secondary: #161b22;
            --text-primary: #c9d1d9;
            --text-secondary: #8b949e;
            --border-color: #30363d;
            --high: #f85149;
            --medium: #d29922;
            --low: #3fb950;
            --info: #58a6ff;
        }}

        * {{ box-sizing: border-box; }}

        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: var(--bg-primary);
            color: var(--text-primary);
            line-height: 1.6;
            margin: 0;
        }}

        .container {{
            max-width: 1200px;
            margin: 0 auto;
            padding: 2rem;
        }}

        h1 {{ color: #58a6ff; }}
        h2 {{ border-bottom: 1px solid var(--border-color); padding-bottom: 0.5rem; }}

        .header {{
            text-align: center;
            padding: 2rem 0;
            border-bottom: 2px solid var(--border-color);
            margin-bottom: 2rem;
        }}
        .header .meta {{ color: var(--text-secondary); }}

        table {{
            width: 100%;
            border-collapse: collapse;
            margin: 1rem 0;
        }}

        th, td {{
            padding: 0.75rem 1rem;
            text-align: left;
            border-bottom: 1px solid var(--border-color);
            vertical-align: top;
        }}

        th {{
            background: var(--bg-secondary);
            color: var(--text-secondary);
            text-transform: uppercase;
            font-size: 0.75rem;
        }}

        .risk-high {{ color: var(--high); font-weight: 600; }}
        .risk-medium {{ color: var(--medium); font-weight: 600; }}
        .risk-low {{ color: var(--low); font-weight: 600; }}
        .risk-informational {{ color: var(--info); font-weight: 600; }}

        .footer {{
            text-align: center;
            padding: 2rem;
            margin-top: 3rem;
            border-top: 1px solid var(--border-color);
            color: var(--text-secondary);
        }}
    </style>
</head>
"#,
        html_escape(title)
    )
}

fn report_header(meta: &ReportMeta) -> String {
    format!(
        r#"<div class="header">
    <h1>{}</h1>
    <div class="meta">
        <p><strong>Target:</strong> {}</p>
        <p><strong>Generated:</strong> {}</p>
    </div>
</div>
"#,
        html_escape(&meta.title),
        html_escape(&meta.target),
        meta.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

fn risk_class(risk: Risk) -> &'static str {
    match risk {
        Risk::High => "risk-high",
        Risk::Medium => "risk-medium",
        Risk::Low => "risk-low",
        Risk::Informational => "risk-informational",
    }
}

/// Finding counts grouped by risk level, rows ordered by descending risk
/// ordinal. Emitting every level keeps the output deterministic and the
/// zero rows visible.
fn summary_section(findings: &[Finding]) -> String {
    let mut html = String::from(
        r#"<h2>Summary</h2>
<table>
    <thead><tr><th>Risk Level</th><th>Count</th></tr></thead>
    <tbody>
"#,
    );

    for risk in Risk::ALL.iter().rev() {
        let count = findings.iter().filter(|f| f.risk == *risk).count();
        html.push_str(&format!(
            "        <tr><td class=\"{}\">{}</td><td>{}</td></tr>\n",
            risk_class(*risk),
            risk.name(),
            count
        ));
    }

    html.push_str("    </tbody>\n</table>\n");
    html
}

fn detail_section(findings: &[Finding]) -> String {
    let mut html = String::from(
        r#"<h2>Detailed Findings</h2>
<table>
    <thead>
        <tr>
            <th>Alert</th>
            <th>Risk</th>
            <th>URL</th>
            <th>Description</th>
            <th>Solution</th>
        </tr>
    </thead>
    <tbody>
"#,
    );

    for finding in findings {
        html.push_str(&format!(
            r#"        <tr>
            <td>{}</td>
            <td class="{}">{}</td>
            <td>{}</td>
            <td>{}</td>
            <td>{}</td>
        </tr>
"#,
            html_escape(&finding.name),
            risk_class(finding.risk),
            finding.risk.name(),
            html_escape(&finding.url),
            html_escape(&finding.description),
            html_escape(&finding.solution),
        ));
    }

    html.push_str("    </tbody>\n</table>\n");
    html
}

fn footer(meta: &ReportMeta) -> String {
    format!(
        r#"<div class="footer">
    <p>Generated by zapwright v{}</p>
    <p>{}</p>
</div>
"#,
        env!("CARGO_PKG_VERSION"),
        meta.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::test_finding;
    use chrono::TimeZone;

    fn fixed_meta() -> ReportMeta {
        ReportMeta {
            title: "Security Scan Report".into(),
            target: "http://target.test/".into(),
            generated_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    fn sample_set() -> Vec<Finding> {
        vec![
            test_finding("SQL Injection", Risk::High, "Use parameterized queries"),
            test_finding("Cookie Without Secure Flag", Risk::Low, "Set the Secure flag"),
            test_finding("X-Frame-Options Missing", Risk::Medium, "Add the header"),
            test_finding("Server Banner", Risk::Low, "Suppress version info"),
        ]
    }

    #[test]
    fn html_escape_neutralizes_markup() {
        assert_eq!(html_escape("<script>"), "&lt;script&gt;");
        assert_eq!(html_escape("a & b"), "a &amp; b");
        assert_eq!(html_escape(r#"x="y""#), "x=&quot;y&quot;");
    }

    #[test]
    fn render_is_deterministic() {
        let set = sample_set();
        let meta = fixed_meta();
        assert_eq!(render(&set, &meta), render(&set, &meta));
    }

    #[test]
    fn report_contains_detail_columns() {
        let html = render(&sample_set(), &fixed_meta());
        assert!(html.contains("SQL Injection"));
        assert!(html.contains("Use parameterized queries"));
        assert!(html.contains("http://target.test/"));
        assert!(html.contains("<th>Solution</th>"));
    }

    #[test]
    fn finding_fields_are_escaped_in_output() {
        let mut hostile = test_finding("XSS", Risk::High, "fix");
        hostile.description = "<img src=x onerror=alert(1)>".into();
        let html = render(&[hostile], &fixed_meta());
        assert!(!html.contains("<img src=x"));
        assert!(html.contains("&lt;img src=x onerror=alert(1)&gt;"));
    }

    #[test]
    fn summary_counts_round_trip_from_rendered_output() {
        let set = sample_set();
        let html = render(&set, &fixed_meta());

        // Re-parse the summary rows and compare against counts computed
        // directly from the input set.
        for risk in Risk::ALL {
            let expected = set.iter().filter(|f| f.risk == risk).count();
            let row = format!(
                "<tr><td class=\"{}\">{}</td><td>{}</td></tr>",
                risk_class(risk),
                risk.name(),
                expected
            );
            assert!(html.contains(&row), "missing summary row for {}", risk.name());
        }
    }

    #[test]
    fn empty_set_renders_zero_counts() {
        let html = render(&[], &fixed_meta());
        assert!(html.contains("<td class=\"risk-high\">High</td><td>0</td>"));
    }

    #[test]
    fn write_report_overwrites_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.html");

        write_report(&sample_set(), &fixed_meta(), &path).unwrap();
        let first = std::fs::read_to_string(&path).unwrap();

        write_report(&[], &fixed_meta(), &path).unwrap();
        let second = std::fs::read_to_string(&path).unwrap();

        assert_ne!(first, second);
        assert!(!second.contains("SQL Injection"));
    }

    #[test]
    fn report_is_self_contained() {
        let html = render(&sample_set(), &fixed_meta());
        assert!(html.contains("<style>"));
        assert!(!html.contains("href=\"http"));
        assert!(!html.contains("src=\"http"));
    }
}
