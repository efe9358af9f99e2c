pub mod config;
pub mod metrics;
pub mod web;
pub mod wol;
