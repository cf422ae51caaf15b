//! HTML report renderer

use crate::{report_file_name, report_stem_name, report_timestamp};
use handlebars::Handlebars;
use serde::Serialize;
use serde_json::json;
use zt_core::{
    ControlResult, ControlStatus, RenderError, ReportArtifact, ReportInput, ReportRenderer,
    ScannedResource, ViolatingResource,
};

const REPORT_TEMPLATE_NAME: &str = "report";

/// One rendered table: columns plus rows of cells in column order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    /// Header cells
    pub columns: Vec<String>,
    /// Body rows
    pub rows: Vec<TableRow>,
}

/// One body row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    /// CSS class from the remark
    pub class: &'static str,
    /// Cells in column order
    pub cells: Vec<String>,
}

impl Table {
    /// Columns are the union of row keys in first-seen order, `last` at the end
    fn from_rows(rows: Vec<(Vec<(String, String)>, &'static str)>, last: &str) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for (fields, _) in &rows {
            for (key, _) in fields {
                if key != last && !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        if !rows.is_empty() {
            columns.push(last.to_string());
        }

        let rows = rows
            .into_iter()
            .map(|(fields, class)| TableRow {
                class,
                cells: columns
                    .iter()
                    .map(|c| {
                        fields
                            .iter()
                            .find(|(k, _)| k == c)
                            .map(|(_, v)| v.clone())
                            .unwrap_or_default()
                    })
                    .collect(),
            })
            .collect();

        Self { columns, rows }
    }

    /// Table of scanned resources
    pub fn scanned(resources: &[ScannedResource]) -> Self {
        Self::from_rows(
            resources
                .iter()
                .map(|r| {
                    let mut fields = vec![
                        ("resourceType".to_string(), r.resource_type.clone()),
                        ("name".to_string(), r.name.clone()),
                    ];
                    fields.extend(r.attributes.iter().map(|(k, v)| (k.to_string(), v.to_string())));
                    let remark = r.remark.to_string();
                    let class = row_class(&remark);
                    fields.push(("remark".to_string(), remark));
                    (fields, class)
                })
                .collect(),
            "remark",
        )
    }

    /// Table of violating resources
    pub fn violating(resources: &[ViolatingResource]) -> Self {
        Self::from_rows(
            resources
                .iter()
                .map(|r| {
                    let mut fields = vec![
                        ("resourceType".to_string(), r.resource_type.clone()),
                        ("name".to_string(), r.name.clone()),
                    ];
                    if let Some(id) = &r.id {
                        fields.push(("id".to_string(), id.clone()));
                    }
                    if let Some(rg) = &r.resource_group {
                        fields.push(("resourceGroup".to_string(), rg.clone()));
                    }
                    fields.extend(r.attributes.iter().map(|(k, v)| (k.to_string(), v.to_string())));
                    fields.push(("reason".to_string(), r.reason.clone()));
                    (fields, "fail")
                })
                .collect(),
            "reason",
        )
    }
}

/// Rows whose remark reads as a failure are highlighted
fn row_class(remark: &str) -> &'static str {
    let remark = remark.to_lowercase();
    if remark.contains("not comply") || remark.contains("fail") {
        "fail"
    } else {
        "pass"
    }
}

fn status_class(status: ControlStatus) -> &'static str {
    match status {
        ControlStatus::Pass => "pass",
        ControlStatus::Fail | ControlStatus::Error => "fail",
    }
}

/// Renders the assessment as a standalone HTML page
pub struct HtmlReportRenderer {
    handlebars: Handlebars<'static>,
}

impl HtmlReportRenderer {
    /// Renderer with the built-in template
    pub fn new() -> Result<Self, RenderError> {
        let mut hb = Handlebars::new();
        hb.set_strict_mode(true);
        hb.register_template_string(REPORT_TEMPLATE_NAME, REPORT_TEMPLATE)
            .map_err(|e| RenderError::Template(e.to_string()))?;
        Ok(Self { handlebars: hb })
    }

    fn control_data(&self, result: &ControlResult) -> serde_json::Value {
        json!({
            "policy": result.policy,
            "description": result.description,
            "status": result.status.to_string(),
            "status_class": status_class(result.status),
            "reason": result.reason,
            "error": result.error.clone().unwrap_or_default(),
            "scanned": Table::scanned(&result.scanned_resources),
            "violating": Table::violating(&result.violating_resources),
        })
    }

    fn build_template_data(&self, input: &ReportInput) -> serde_json::Value {
        let report_name = format!(
            "{}-{}",
            report_stem_name(&input.subscription_name),
            report_timestamp(input.generated_at)
        );
        json!({
            "report_name": report_name,
            "subscription_name": input.subscription_name,
            "subscription_id": input.subscription_id,
            "generated_at": input.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            "duration_secs": format!("{:.2}", input.scan_duration.as_secs_f64()),
            "total": input.summary.total,
            "passed": input.summary.passed,
            "failed": input.summary.failed,
            "controls": input.results.iter().map(|r| self.control_data(r)).collect::<Vec<_>>(),
        })
    }
}

impl ReportRenderer for HtmlReportRenderer {
    fn render(&self, input: &ReportInput) -> Result<ReportArtifact, RenderError> {
        let data = self.build_template_data(input);
        let content = self
            .handlebars
            .render(REPORT_TEMPLATE_NAME, &data)
            .map_err(|e| RenderError::Template(e.to_string()))?;

        Ok(ReportArtifact {
            file_name: report_file_name(&input.subscription_name, input.generated_at),
            content,
        })
    }
}

const REPORT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <title>ZT Assessment Report - {{report_name}}</title>
  <script src="https://cdn.jsdelivr.net/npm/chart.js"></script>
  <style>
    body { font-family: 'Segoe UI', Arial, sans-serif; margin: 2em; background: #f8fafc; color: #222; }
    h1 { color: #2d6ca2; text-align: center; }
    h2 { color: #1a4d80; }
    h3 { margin-top: 2em; }
    .pass { color: #1b883a; font-weight: bold; }
    .fail { color: #c0392b; font-weight: bold; }
    table { border-collapse: collapse; width: 100%; margin: 1em 0; background: #fff; }
    th, td { border: 1px solid #d0d7de; padding: 8px 12px; text-align: left; }
    th { background: #eaf1fb; }
    tr.pass { background: #eafbe7; }
    tr.fail { background: #fdeaea; }
    .violating-table th { background: #ffd6d6; }
    .violating-table td { background: #ffebeb; color: #c0392b; }
    details { margin-bottom: 1em; }
    summary { cursor: pointer; font-weight: bold; }
    .summary-section { background: #f4f8fb; border-radius: 8px; padding: 1em 2em; margin: 0 auto 2em auto; max-width: 600px; }
    .chart-container { width: 350px; margin: 0 auto; }
  </style>
</head>
<body>
  <h1>ZT Assessment Report</h1>
  <div class="summary-section">
    <p><strong>Report Name:</strong> {{report_name}}.html</p>
    <p><strong>Subscription:</strong> {{subscription_name}}</p>
    <p><strong>Subscription ID:</strong> {{subscription_id}}</p>
    <p><strong>Timestamp:</strong> {{generated_at}}</p>
    <p><strong>Scan Duration:</strong> {{duration_secs}} seconds</p>
    <p><strong>Controls Scanned:</strong> {{total}}</p>
    <p><strong>Passed:</strong> <span class="pass">{{passed}}</span>
       <strong>Failed:</strong> <span class="fail">{{failed}}</span></p>
    <div class="chart-container"><canvas id="summaryChart"></canvas></div>
  </div>
  <h2>Assessment Summary</h2>
{{#each controls}}
  <section>
    <h3>{{policy}}</h3>
    <p><strong>Status:</strong> <span class="{{status_class}}">{{status}}</span></p>
    <p><strong>Reason:</strong> {{reason}}</p>
    {{#if error}}<p><strong>Error:</strong> {{error}}</p>{{/if}}
    <details>
      <summary>Scanned Resources</summary>
      {{#if scanned.rows}}
      <table>
        <thead><tr>{{#each scanned.columns}}<th>{{this}}</th>{{/each}}</tr></thead>
        <tbody>
        {{#each scanned.rows}}<tr class="{{class}}">{{#each cells}}<td>{{this}}</td>{{/each}}</tr>
        {{/each}}
        </tbody>
      </table>
      {{else}}<p>No resources found.</p>{{/if}}
    </details>
    <details>
      <summary>Violating Resources</summary>
      {{#if violating.rows}}
      <table class="violating-table">
        <thead><tr>{{#each violating.columns}}<th>{{this}}</th>{{/each}}</tr></thead>
        <tbody>
        {{#each violating.rows}}<tr class="{{class}}">{{#each cells}}<td>{{this}}</td>{{/each}}</tr>
        {{/each}}
        </tbody>
      </table>
      {{else}}<p>No resources found.</p>{{/if}}
    </details>
  </section>
{{/each}}
  <script>
    new Chart(document.getElementById('summaryChart').getContext('2d'), {
      type: 'pie',
      data: {
        labels: ['Passed', 'Failed'],
        datasets: [{ data: [{{passed}}, {{failed}}], backgroundColor: ['#1b883a', '#c0392b'], borderWidth: 1 }]
      },
      options: { responsive: true, plugins: { legend: { position: 'bottom' } } }
    });
  </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;
    use zt_core::{summarize, Attributes, ControlId, Remark};

    fn input() -> ReportInput {
        let failing = ControlResult {
            control: ControlId::DiskSecurity,
            policy: "Disk Security".into(),
            description: String::new(),
            status: ControlStatus::Fail,
            reason: "2 violation(s) found".into(),
            scanned_resources: vec![
                ScannedResource {
                    resource_type: "Microsoft.Compute/disks".into(),
                    name: "d1".into(),
                    attributes: Attributes::new().with("encryptionType", "None"),
                    remark: Remark::not_comply(),
                },
                ScannedResource {
                    resource_type: "Microsoft.Compute/disks".into(),
                    name: "d2".into(),
                    attributes: Attributes::new().with("publicNetworkAccess", "Disabled"),
                    remark: Remark::Comply,
                },
            ],
            violating_resources: vec![ViolatingResource::new(
                "Microsoft.Compute/disks",
                "d1",
                "Public network access is not disabled",
            )
            .with_resource_group(Some("rg"))],
            error: None,
        };
        let errored = ControlResult::errored(ControlId::SqlAuditing, "SQL auditing", "", "<boom>");
        let results = vec![failing, errored];

        ReportInput {
            summary: summarize(&results),
            results,
            subscription_id: "0000".into(),
            subscription_name: "Contoso Prod".into(),
            scan_duration: Duration::from_millis(1234),
            generated_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        }
    }

    #[test]
    fn test_columns_are_attribute_union() {
        let table = Table::scanned(&input().results[0].scanned_resources);
        assert_eq!(
            table.columns,
            ["resourceType", "name", "encryptionType", "publicNetworkAccess", "remark"]
        );
        assert_eq!(table.rows[0].class, "fail");
        assert_eq!(table.rows[1].class, "pass");
        assert_eq!(table.rows[1].cells[2], "");
        assert_eq!(table.rows[1].cells[3], "Disabled");
        assert_eq!(table.rows[1].cells[4], "Comply with Zero Trust");
    }

    #[test]
    fn test_render() {
        let renderer = HtmlReportRenderer::new().unwrap();
        let artifact = renderer.render(&input()).unwrap();

        assert_eq!(artifact.file_name, "Contoso_Prod-2024-01-02T03-04-05-000Z.html");
        let html = &artifact.content;
        assert!(html.contains("<h3>Disk Security</h3>"));
        assert!(html.contains("Public network access is not disabled"));
        assert!(html.contains("<strong>Scan Duration:</strong> 1.23 seconds"));
        assert!(html.contains("<strong>Controls Scanned:</strong> 2"));
        assert!(html.contains("No resources found."));
        // Content is escaped
        assert!(html.contains("&lt;boom&gt;"));
        assert!(!html.contains("<boom>"));
    }
}
