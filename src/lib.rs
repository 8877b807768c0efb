pub mod cli;
pub mod driver;
pub mod explorer;
pub mod guard;
pub mod report;
pub mod screen;
pub mod trace;
