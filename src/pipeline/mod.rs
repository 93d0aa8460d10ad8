//! Extraction-and-routing pipeline.
//!
//! Every message fetched from a mail source flows through:
//! 1. `extractor::extract()`: regex extraction of identifier and category
//! 2. `VendorRegistry::resolver_for()`: category → vendor
//! 3. `PartResolver::resolve()`: vendor lookup
//! 4. `Orchestrator`: auto-reply or escalation for manual handling

pub mod extractor;
pub mod registry;
pub mod router;
pub mod types;

pub use extractor::extract;
pub use registry::VendorRegistry;
pub use router::Orchestrator;
pub use types::{
    BatchReport, EscalationReason, NOT_AVAILABLE, PartRequest, ProcessedMessage, RawMessage,
    ReplyStatus, RoutingOutcome,
};
