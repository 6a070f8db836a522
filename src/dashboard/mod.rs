pub mod aggregate;
pub mod commands;
pub mod report;
