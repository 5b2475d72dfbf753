//! I/O helpers for the pacemaker.

pub mod config;
pub mod operator;
pub mod performance_log;
