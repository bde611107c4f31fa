//! Provider-facing descriptors (data), kinds (the closed set of known providers), and scope
//! conventions (behavior).
//!
//! `descriptor` exposes validated, immutable metadata ([`ProviderDescriptor`]) covering the
//! authorization/token endpoints, optional discovery and device-code endpoints, supported
//! grants, and extra authorization parameters. `kind` resolves a descriptor for a known
//! provider from its credentials (tenant id, instance URL). `convention` formats and checks
//! scope strings the way each provider expects them.

pub mod convention;
pub mod descriptor;
pub mod kind;

pub use convention::*;
pub use descriptor::*;
pub use kind::*;
