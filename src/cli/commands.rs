use std::path::Path;

use tracing::{info, warn};

use crate::cli::config::{AppConfig, ExploreArgs, build_explorer_config, build_session_config};
use crate::driver::session::AppiumSession;
use crate::explorer::explorer::{ExplorationReport, Explorer};
use crate::explorer::nav_graph::NavigationGraph;
use crate::explorer::test_generator::{GeneratedSuite, generate_suite};
use crate::report::console::format_console_report;
use crate::trace::logger::TraceLogger;

// ============================================================================
// explore subcommand
// ============================================================================

/// Crawl the app and return whether the run finished without critical incidents.
pub fn cmd_explore(args: &ExploreArgs, config: &AppConfig) -> Result<bool, Box<dyn std::error::Error>> {
    let session_config = build_session_config(args, config);
    let explorer_config = build_explorer_config(args, config);

    if explorer_config.app_package.is_empty() {
        return Err("no app package given (use --package or appium.app_package in the config file)".into());
    }

    info!(
        package = %explorer_config.app_package,
        server = %session_config.server_url,
        max_depth = explorer_config.max_depth,
        timeout_secs = explorer_config.timeout_secs,
        "starting exploration"
    );

    let tracer = match args.trace.as_deref().or(config.explore.trace.as_deref()) {
        Some(path) => TraceLogger::new(path),
        None => TraceLogger::disabled(),
    };

    let mut session = AppiumSession::launch(&session_config)?;
    let report = Explorer::new(&mut session, explorer_config)
        .with_tracer(tracer)
        .explore();
    if let Err(e) = session.quit() {
        warn!("failed to close session cleanly: {}", e);
    }

    println!("{}", format_console_report(&report));

    if let Some(output) = args.output.as_deref().or(config.explore.output.as_deref()) {
        write_report(&report, output)?;
        println!("Report written to {}", output);
    }

    Ok(report.critical_incidents().is_empty())
}

/// Serialize the full report (graph included) to `path`.
pub fn write_report(report: &ExplorationReport, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, report.to_json()?)?;
    Ok(())
}

/// Read a navigation graph from either a saved report or a bare graph file.
pub fn load_graph(path: &str) -> Result<NavigationGraph, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    if let Ok(report) = ExplorationReport::from_json(&content) {
        return Ok(report.graph);
    }
    let graph = NavigationGraph::from_json(&content)
        .map_err(|e| format!("{} is neither an exploration report nor a graph: {}", path, e))?;
    Ok(graph)
}

// ============================================================================
// generate subcommand
// ============================================================================

pub fn cmd_generate(graph_path: &str, output_dir: &str) -> Result<(), Box<dyn std::error::Error>> {
    let graph = load_graph(graph_path)?;
    let suite = generate_suite(&graph);
    let written = write_suite(&suite, output_dir)?;

    println!(
        "Generated {} features ({} scenarios) and {} screen objects in {}/",
        suite.features.len(),
        suite.scenario_count(),
        suite.screen_objects.len(),
        output_dir
    );
    info!(files = written, "suite written");
    Ok(())
}

/// Write features to `output_dir` and screen objects to `output_dir/screens`.
/// Returns the number of files written.
pub fn write_suite(suite: &GeneratedSuite, output_dir: &str) -> Result<usize, Box<dyn std::error::Error>> {
    let root = Path::new(output_dir);
    let screens = root.join("screens");
    std::fs::create_dir_all(&screens)?;

    let mut written = 0;
    for feature in &suite.features {
        let stem = feature.file_name.trim_end_matches(".feature");
        let path = root.join(format!("{}.feature", sanitize_filename(stem)));
        std::fs::write(&path, feature.render())?;
        info!(path = %path.display(), "wrote feature");
        written += 1;
    }

    for object in &suite.screen_objects {
        let path = screens.join(object.file_name());
        std::fs::write(&path, object.to_yaml()?)?;
        info!(path = %path.display(), "wrote screen object");
        written += 1;
    }

    Ok(written)
}

// ============================================================================
// Helpers
// ============================================================================

/// Sanitize a string for use as a filename.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .to_lowercase()
}
