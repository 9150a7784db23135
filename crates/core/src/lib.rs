//! Satchel Core: LMS platform adapters, normalization, reconciliation, and sync orchestration.

pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod models;
pub mod normalize;
pub mod notify;
pub mod platforms;
pub mod reconcile;
pub mod sync;
