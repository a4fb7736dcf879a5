pub mod cli;
pub mod crawler;
pub mod driver;
pub mod report;
pub mod state;
pub mod trace;
