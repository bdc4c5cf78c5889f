use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};

use crate::models::*;
use crate::planner::aggregate_hosts;

/// Subnet table row with every derived address spelled out
#[derive(Debug, Clone, Serialize)]
pub struct SubnetRow {
    pub vlan_id: u16,
    pub department_name: String,
    pub cidr_block: String,
    pub subnet_mask: String,
    pub network_address: String,
    pub broadcast_address: String,
    pub usable_hosts: u64,
    pub required_host_count: u64,
}

impl From<&SubnetAssignment> for SubnetRow {
    fn from(s: &SubnetAssignment) -> Self {
        Self {
            vlan_id: s.vlan_id,
            department_name: s.department_name.clone(),
            cidr_block: s.cidr_block.to_string(),
            subnet_mask: s.subnet_mask().to_string(),
            network_address: s.network_address().to_string(),
            broadcast_address: s.broadcast_address().to_string(),
            usable_hosts: s.usable_hosts(),
            required_host_count: s.required_host_count,
        }
    }
}

/// Everything a rendered report shows
#[derive(Debug, Clone, Serialize)]
pub struct ReportDocument {
    pub request_id: i64,
    pub request_name: String,
    pub site: Option<String>,
    pub departments: Vec<DepartmentHostSummary>,
    pub bill_of_materials: Vec<BillOfMaterialsLine>,
    pub subnets: Vec<SubnetRow>,
    pub topology_dot: String,
    pub total_estimated_cost: f64,
    pub generated_at: DateTime<Utc>,
}

impl ReportDocument {
    pub fn new(request: &Request, design: &Design) -> Self {
        Self {
            request_id: request.id,
            request_name: request.name.clone(),
            site: request.site.clone(),
            departments: aggregate_hosts(&request.departments),
            bill_of_materials: design.bill_of_materials.clone(),
            subnets: design.subnet_assignments.iter().map(SubnetRow::from).collect(),
            topology_dot: design.topology.to_dot(),
            total_estimated_cost: design.total_estimated_cost,
            generated_at: Utc::now(),
        }
    }
}

/// Turns a report document into a stored artifact and returns its reference.
///
/// Implementations may block; callers run them on the blocking pool.
pub trait ReportRenderer: Send + Sync {
    fn render(&self, doc: &ReportDocument) -> Result<String>;
}

const REPORT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{{ request_name }} network design</title>
<style>
body { font-family: sans-serif; margin: 2em; }
table { border-collapse: collapse; margin-bottom: 2em; }
th, td { border: 1px solid #ccc; padding: 4px 8px; text-align: left; }
td.num { text-align: right; }
pre { background: #f4f4f4; padding: 1em; }
</style>
</head>
<body>
<h1>{{ request_name }}</h1>
{% if site %}<p>Site: {{ site }}</p>{% endif %}
<p>Generated {{ generated_at }}</p>

<h2>Departments</h2>
<table>
<tr><th>Department</th><th>Wired</th><th>Wireless</th><th>Total</th></tr>
{% for d in departments %}<tr><td>{{ d.department_name }}</td><td class="num">{{ d.wired_hosts }}</td><td class="num">{{ d.wireless_hosts }}</td><td class="num">{{ d.total_hosts }}</td></tr>
{% endfor %}</table>

<h2>Bill of materials</h2>
<table>
<tr><th>Type</th><th>Model</th><th>Device</th><th>Qty</th><th>Unit price</th><th>Total</th></tr>
{% for line in bill_of_materials %}<tr><td>{{ line.device_type }}</td><td>{{ line.model }}</td><td>{{ line.device_id }}</td><td class="num">{{ line.quantity }}</td><td class="num">{{ line.unit_price | round(precision=2) }}</td><td class="num">{{ line.total_cost | round(precision=2) }}</td></tr>
{% endfor %}<tr><th colspan="5">Estimated total</th><th class="num">{{ total_estimated_cost | round(precision=2) }}</th></tr>
</table>

<h2>Addressing</h2>
<table>
<tr><th>VLAN</th><th>Name</th><th>Block</th><th>Mask</th><th>Network</th><th>Broadcast</th><th>Usable</th><th>Required</th></tr>
{% for s in subnets %}<tr><td class="num">{{ s.vlan_id }}</td><td>{{ s.department_name }}</td><td>{{ s.cidr_block }}</td><td>{{ s.subnet_mask }}</td><td>{{ s.network_address }}</td><td>{{ s.broadcast_address }}</td><td class="num">{{ s.usable_hosts }}</td><td class="num">{{ s.required_host_count }}</td></tr>
{% endfor %}</table>

<h2>Topology</h2>
<pre>{{ topology_dot }}</pre>
</body>
</html>
"#;

/// Location of a request's rendered report inside `dir`
pub fn report_path(dir: impl AsRef<Path>, request_id: i64) -> PathBuf {
    dir.as_ref().join(format!("request-{}.html", request_id))
}

/// Writes `request-<id>.html` into the reports directory and returns the file name
pub struct HtmlReportRenderer {
    dir: PathBuf,
    tera: Tera,
}

impl HtmlReportRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template("report.html", REPORT_TEMPLATE)
            .map_err(|e| anyhow::anyhow!("Invalid report template: {}", e))?;
        Ok(Self {
            dir: dir.into(),
            tera,
        })
    }
}

impl ReportRenderer for HtmlReportRenderer {
    fn render(&self, doc: &ReportDocument) -> Result<String> {
        let context = Context::from_serialize(doc)
            .map_err(|e| anyhow::anyhow!("Failed to build report context: {}", e))?;
        let html = self
            .tera
            .render("report.html", &context)
            .map_err(|e| anyhow::anyhow!("Failed to render report: {}", e))?;

        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create reports directory {}", self.dir.display()))?;
        let path = report_path(&self.dir, doc.request_id);
        std::fs::write(&path, html).with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(format!("request-{}.html", doc.request_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::fixtures::{catalog, department};
    use crate::planner::synthesize;

    fn document() -> ReportDocument {
        let departments = vec![department("Library", &[(5, 0)]), department("Lab & Co", &[(0, 40)])];
        let plan = synthesize(&departments, &catalog()).unwrap();
        ReportDocument {
            request_id: 3,
            request_name: "North Campus".to_string(),
            site: Some("Main St".to_string()),
            departments: plan.host_summaries,
            bill_of_materials: plan.bill_of_materials,
            subnets: plan.subnet_assignments.iter().map(SubnetRow::from).collect(),
            topology_dot: plan.topology.to_dot(),
            total_estimated_cost: plan.total_estimated_cost,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_html_report_written_with_reference() {
        let dir = std::env::temp_dir().join(format!("campus-reports-{}", uuid::Uuid::new_v4()));
        let renderer = HtmlReportRenderer::new(&dir).unwrap();

        let reference = renderer.render(&document()).unwrap();
        assert_eq!(reference, "request-3.html");

        let html = std::fs::read_to_string(report_path(&dir, 3)).unwrap();
        assert!(html.contains("10.10.1.0/27"));
        assert!(html.contains("255.255.255.192"));
        assert!(html.contains("Lab &amp; Co"));
        assert!(html.contains("11700"));
    }
}
