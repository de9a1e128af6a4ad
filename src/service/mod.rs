/// Service layer
///
/// Ownership checks and plan rules sit here so that handlers stay a
/// `validate → call → respond` sequence. Every lookup walks up the
/// User → Project → Snapshot → Task chain to the owning project.

pub mod billing;
pub mod projects;
pub mod snapshots;
pub mod tasks;

pub use billing::{EventOutcome, PriceCatalog};
pub use snapshots::ExportDocument;
pub use tasks::TaskDraft;
