//! Crawler module for harvesting the remote catalog
//!
//! This module contains the core crawling logic, including:
//! - The sequential crawl loop over the work-item universe
//! - Backfills over explicit id lists
//! - Writing immutable, numbered batch artifacts

mod batch;
mod coordinator;

pub use batch::{artifact_name, list_artifacts, BatchWriter};
pub use coordinator::Crawler;
