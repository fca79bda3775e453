pub mod publisher;

pub use publisher::{
    PublishError, PublishMetadata, PublishOutcome, PublishPhase, PublishStatus, Publisher,
    SourceReport, ValidationSummary,
};
