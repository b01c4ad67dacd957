//! Client-side coordination core for the patient records dashboard.

pub mod application;
pub mod cache;
pub mod config;
pub mod infra;
