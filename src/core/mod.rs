//! Core data model for the learn-and-validate pipeline.

pub mod bundle;
pub mod draft;
pub mod event;
pub mod outcome;
pub mod record;
pub mod run;

pub use bundle::{ResearchBundle, Source};
pub use draft::{Draft, Procedure, ProcedureStep, StructureReport, check_structure, parse_procedure};
pub use event::{Event, EventKind};
pub use outcome::{CommandResult, FailureKind, TimeoutScope, ValidationOutcome};
pub use record::SkillRecord;
pub use run::{Attempt, PipelineRun, RunStatus};
