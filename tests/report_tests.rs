use app_explorer::report::console::format_console_report;

mod common;

use common::fixtures::{config, crashing_app, login_app, run, shop_app};

#[test]
fn console_report_lists_screens_and_edges() {
    let mut driver = shop_app();
    let output = format_console_report(&run(&mut driver, config()));

    assert!(output.starts_with("=== Exploration: com.example.shop ===\n"));
    assert!(output.contains("Screens discovered:   2\n"));
    assert!(output.contains("[.MainActivity|Products] (root)\n"));
    assert!(output.contains("[.CartActivity|Cart]\n"));
    assert!(output.contains("clickables: cartIV \u{2713}, backIV\n"));
    assert!(output.contains("\u{2192} cartIV \u{2192} .CartActivity|Cart\n"));
    assert!(output.contains("=== Completed in "));
    assert!(!output.contains("[CRITICAL]"));
}

#[test]
fn console_report_marks_filled_fields() {
    let mut driver = login_app();
    let output = format_console_report(&run(&mut driver, config()));

    assert!(output.contains("text fields: et_email \u{2713}, et_password \u{2713}\n"));
}

#[test]
fn console_report_flags_crashes() {
    let mut driver = crashing_app(4);
    let output = format_console_report(&run(&mut driver, config()));

    assert!(output.contains("Crashes:              3\n"));
    assert!(output.contains("[CRITICAL] Crash on .MainActivity|Unstable"));
    assert!(output.contains("[CRITICAL] CrashCeiling"));
    assert!(output.contains("=== Stopped at crash ceiling in "));
}
