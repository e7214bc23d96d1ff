pub mod cli;
pub mod compute;
pub mod config;
pub mod coverage;
pub mod db;
pub mod detect;
pub mod diff;
pub mod error;
pub mod filter;
pub mod model;
pub mod parsers;
pub mod report;
