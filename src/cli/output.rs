//! Output formatting for the end-of-run sweep summary.

use comfy_table::{presets, Cell, CellAlignment, ContentArrangement, Table};

use crate::services::{PointStatus, SweepSummary};

/// Render one row per sweep point plus a totals line.
pub fn render_summary(summary: &SweepSummary) -> String {
    if summary.points.is_empty() {
        return "No sweep points run.".to_string();
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            [
                "MEMBERS",
                "UPDATES",
                "FANOUT",
                "ITER",
                "STATUS",
                "REPORTED",
                "MEAN (S)",
                "ARTIFACT",
            ]
            .map(|h| Cell::new(h).set_alignment(CellAlignment::Left)),
        );

    for point in &summary.points {
        let exp = point.experiment;
        table.add_row(vec![
            Cell::new(exp.members()).set_alignment(CellAlignment::Right),
            Cell::new(exp.members_in_update()).set_alignment(CellAlignment::Right),
            Cell::new(exp.fanout()).set_alignment(CellAlignment::Right),
            Cell::new(exp.iteration()).set_alignment(CellAlignment::Right),
            Cell::new(point.status.as_str()),
            Cell::new(format!("{}/{}", point.reported, exp.members()))
                .set_alignment(CellAlignment::Right),
            Cell::new(
                point
                    .mean_convergence_secs
                    .map_or_else(|| "-".to_string(), |s| format!("{s:.3}")),
            )
            .set_alignment(CellAlignment::Right),
            Cell::new(
                point
                    .artifact
                    .as_deref()
                    .map_or_else(|| "-".to_string(), |p| p.display().to_string()),
            ),
        ]);
    }

    let totals = format!(
        "{} points in {}s: {} collected, {} timed out, {} spawn failed, {} collect failed, {} skipped",
        summary.points.len(),
        summary.elapsed.as_secs(),
        summary.count(PointStatus::Collected),
        summary.count(PointStatus::TimedOut),
        summary.count(PointStatus::SpawnFailed),
        summary.count(PointStatus::CollectFailed),
        summary.count(PointStatus::Skipped),
    );
    format!("{table}\n{totals}")
}
