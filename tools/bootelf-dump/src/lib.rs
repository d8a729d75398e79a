//! Host-side inspection tool for the `bootelf` loader.

pub mod cli;
pub mod commands;
pub mod diag;
pub mod error;
pub mod output;
pub mod report;
