pub mod derivation;
pub mod diagnostic; // On-disk dump of prompts and replies (SEPSIS_DUMP_DIR)
pub mod extraction;
pub mod normalize;
pub mod orchestrator;
pub mod types;
pub mod validation;

pub use orchestrator::{score_candidate, PipelineError, ScoringPipeline, MIN_INPUT_LENGTH};
pub use types::{CaseInput, IssueStage, RecordIssue, ScoreReport};
