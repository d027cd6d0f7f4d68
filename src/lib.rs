//! Pressroom: a self-hosted web content management server.
//!
//! Resources (pages, files, images) live per site in WORK and LIVE version
//! slots with locking, publish windows and entity-tag concurrency control.
//! Rendered output is fronted by a tag-addressable response cache, and site
//! traffic is dispatched through a chain of content-type-specific handlers.

pub mod application;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod infra;
pub mod search;
pub mod util;
