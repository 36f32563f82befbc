//! Status page markup.

use crate::notify::escape_html;
use crate::status::StatusReport;

const STYLE: &str = "\
body{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;\
background:#16213e;color:#e4e4e4;margin:0;padding:20px}\
.container{max-width:800px;margin:0 auto}\
h1{text-align:center;color:#00d4ff}\
.card{background:rgba(255,255,255,.05);border-radius:16px;padding:24px;margin-bottom:20px}\
.dot{display:inline-block;width:14px;height:14px;border-radius:50%;margin-right:10px}\
.dot.initializing{background:#ffaa00}.dot.running{background:#00d4ff}\
.dot.success{background:#00ff88}.dot.error{background:#ff4444}\
.stats{display:grid;grid-template-columns:repeat(auto-fit,minmax(160px,1fr));gap:16px}\
.stat{text-align:center}.value{font-size:1.6rem;font-weight:700;color:#00d4ff}\
.label{color:#888;font-size:.8rem;text-transform:uppercase}\
table{width:100%}td{padding:4px 0}td:first-child{color:#888}\
code{word-break:break-all}.footer{text-align:center;color:#666;font-size:.8rem}";

/// Render the page. Refreshes itself every 30 seconds.
pub fn render(report: &StatusReport) -> String {
    let status = report.status.as_str();
    let mut html = String::with_capacity(4096);

    html.push_str(
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"UTF-8\">\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\
         <meta http-equiv=\"refresh\" content=\"30\">\
         <title>Instance Auto-Register</title><style>",
    );
    html.push_str(STYLE);
    html.push_str("</style></head><body><div class=\"container\"><h1>Instance Auto-Register</h1>");

    html.push_str(&format!(
        "<div class=\"card\"><div><span class=\"dot {status}\"></span><strong>{}</strong></div>",
        report.headline()
    ));

    let (interval, target) = match &report.config_summary {
        Some(summary) => (
            format!("{}s", summary.retry_interval_secs),
            format!(
                "{} · {} OCPU / {} GB · {}",
                escape_html(&summary.shape),
                summary.ocpus,
                summary.memory_gb,
                escape_html(&summary.region)
            ),
        ),
        None => ("N/A".to_string(), "N/A".to_string()),
    };

    html.push_str("<div class=\"stats\">");
    for (value, label) in [
        (report.attempt.to_string(), "Attempts"),
        (report.uptime.clone(), "Uptime"),
        (interval, "Retry Interval"),
    ] {
        html.push_str(&format!(
            "<div class=\"stat\"><div class=\"value\">{value}</div><div class=\"label\">{label}</div></div>"
        ));
    }
    html.push_str("</div>");

    let last_attempt = report
        .last_attempt_time
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "Never".to_string());
    let last_result = report.last_result.as_deref().unwrap_or("-");

    html.push_str("<table>");
    push_row(&mut html, "Target", &target);
    push_row(&mut html, "Last Attempt", &escape_html(&last_attempt));
    push_row(&mut html, "Last Result", &escape_html(last_result));
    if let Some(error) = &report.error_message {
        push_row(&mut html, "Error", &escape_html(error));
    }
    html.push_str("</table></div>");

    if let Some(instance) = &report.instance_info {
        html.push_str("<div class=\"card\"><h2>Instance</h2><table>");
        push_row(&mut html, "Name", &escape_html(&instance.name));
        push_row(&mut html, "Shape", &escape_html(&instance.shape));
        push_row(&mut html, "Region", &escape_html(&instance.region));
        push_row(
            &mut html,
            "Availability Domain",
            &escape_html(&instance.availability_domain),
        );
        push_row(&mut html, "Public IP", &escape_html(&instance.public_ip));
        push_row(&mut html, "State", &escape_html(&instance.lifecycle_state));
        push_row(
            &mut html,
            "Instance ID",
            &format!("<code>{}</code>", escape_html(&instance.id)),
        );
        html.push_str("</table></div>");
    }

    html.push_str(
        "<div class=\"footer\">Auto-refresh every 30 seconds</div></div></body></html>",
    );
    html
}

/// `value` must already be escaped.
fn push_row(html: &mut String, label: &str, value: &str) {
    html.push_str(&format!("<tr><td>{label}</td><td>{value}</td></tr>"));
}
