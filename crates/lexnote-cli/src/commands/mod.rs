//! Command handlers

pub mod config;
pub mod doc;
pub mod status;
pub mod transfer;
pub mod word;
