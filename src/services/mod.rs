//! Service layer for business logic
//!
//! This module provides the write path, the redirect resolver and the
//! analytics queries on top of storage, cache and the click pipeline.

mod analytics_service;
pub mod code_generator;
mod link_service;
pub mod policy;
mod redirect;

pub use analytics_service::AnalyticsService;
pub use code_generator::CodeGenerator;
pub use link_service::{CreateLinkRequest, LinkService};
pub use policy::{AllowAll, PerLinkRateLimit, PolicyDecision, RedirectPolicy};
pub use redirect::{RedirectService, Resolution};
