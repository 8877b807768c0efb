use crate::explorer::explorer::{ExplorationReport, Termination};
use crate::explorer::nav_graph::ScreenNode;
use crate::explorer::state::Incident;

// ============================================================================
// Console reporter: formatted terminal output
// ============================================================================

/// Format an exploration report for terminal output.
///
/// Produces output like:
/// ```text
/// === Exploration: com.example.shop ===
///
/// Screens discovered:   4
/// Elements found:       23
/// Elements interacted:  11
/// Crashes:              1
///
/// [.MainActivity|Products] (root)
///     clickables: cartIV ✓, menuIV ✓, backIV
///     text fields: searchET ✓
///     → cartIV → .CartActivity|My Cart
///
/// [CRITICAL] Crash on .MainActivity|Products: crash dialog dismissed
///
/// === Completed in 42.1s ===
/// ```
pub fn format_console_report(report: &ExplorationReport) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== Exploration: {} ===\n\n", report.app_package));
    out.push_str(&format!("Screens discovered:   {}\n", report.screens_discovered));
    out.push_str(&format!("Elements found:       {}\n", report.total_elements));
    out.push_str(&format!("Elements interacted:  {}\n", report.elements_interacted));
    out.push_str(&format!("Crashes:              {}\n", report.crash_count));
    if report.stuck_escapes > 0 {
        out.push_str(&format!("Stuck escapes:        {}\n", report.stuck_escapes));
    }

    for (signature, node) in &report.graph.screens {
        let is_root = report.graph.root.as_ref() == Some(signature);
        out.push('\n');
        out.push_str(&format_screen(node, is_root, report));
    }

    let critical = report.critical_incidents();
    if !critical.is_empty() {
        out.push('\n');
        for incident in critical {
            out.push_str(&format!("[CRITICAL] {}\n", format_incident(incident)));
        }
    }

    let noise = report.noise_incidents().len();
    if noise > 0 {
        out.push_str(&format!("\n{} automation incident(s) logged\n", noise));
    }

    let secs = report.elapsed_ms as f64 / 1000.0;
    out.push_str(&format!(
        "\n=== {} in {:.1}s ===\n",
        termination_label(report.termination),
        secs
    ));

    out
}

fn format_screen(node: &ScreenNode, is_root: bool, report: &ExplorationReport) -> String {
    let mut out = format!("[{}]{}\n", node.id, if is_root { " (root)" } else { "" });

    let touched = |id: &str| {
        report
            .interactions
            .iter()
            .any(|i| i.screen == node.id && i.element_id == id)
    };
    let mark = |id: &str| {
        if touched(id) {
            format!("{} \u{2713}", id)
        } else {
            id.to_string()
        }
    };

    let clickables: Vec<String> = node.clickables().map(|e| mark(&e.id)).collect();
    if !clickables.is_empty() {
        out.push_str(&format!("    clickables: {}\n", clickables.join(", ")));
    }

    let fields: Vec<String> = node.text_fields().map(|e| mark(&e.id)).collect();
    if !fields.is_empty() {
        out.push_str(&format!("    text fields: {}\n", fields.join(", ")));
    }

    for edge in &node.outgoing_edges {
        out.push_str(&format!(
            "    \u{2192} {} \u{2192} {}\n",
            edge.element_tapped, edge.to_screen
        ));
    }

    out
}

fn format_incident(incident: &Incident) -> String {
    match &incident.screen {
        Some(screen) => format!("{:?} on {}: {}", incident.kind, screen, incident.detail),
        None => format!("{:?}: {}", incident.kind, incident.detail),
    }
}

fn termination_label(termination: Termination) -> &'static str {
    match termination {
        Termination::Completed => "Completed",
        Termination::TimedOut => "Timed out",
        Termination::CrashCeiling => "Stopped at crash ceiling",
        Termination::AppUnrecoverable => "App unrecoverable",
    }
}
