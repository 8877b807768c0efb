pub mod console;

pub use console::format_console_report;
