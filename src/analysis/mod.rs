// src/analysis/mod.rs

pub mod attempts;
pub mod ball_filter;
pub mod ledger;
pub mod streaks;
