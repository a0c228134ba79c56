//! Plain-text report rendering over a set of tasks

use crate::store::Task;
use chrono::Utc;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};

/// Render one table per task plus a trailing summary line.
///
/// Links are sorted so the same store state always renders the same
/// document.
pub fn render_report(tasks: &[Task]) -> String {
    let mut out = String::new();
    out.push_str("Link check report\n\n");

    for task in tasks {
        out.push_str(&format!(
            "Task #{} - {}\n",
            task.id,
            task.created_at.format("%Y-%m-%d %H:%M:%S")
        ));

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Link", "Status"]);

        let mut links: Vec<_> = task.links.iter().collect();
        links.sort_by(|a, b| a.0.cmp(b.0));
        for (link, status) in links {
            table.add_row(vec![link.as_str(), status.display_label()]);
        }

        out.push_str(&table.to_string());
        out.push_str("\n\n");
    }

    out.push_str(&format!(
        "Total tasks: {} | Generated: {}\n",
        tasks.len(),
        Utc::now().format("%Y-%m-%d %H:%M:%S")
    ));
    out
}
