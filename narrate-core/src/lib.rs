pub mod builder;
pub mod chunker;
pub mod pipeline;
pub mod settings;
pub mod synthesis;

// Public library API - embedders driving the pipeline directly should only
// need these.
pub use builder::{build_pipeline, build_pipeline_with_backend};
pub use chunker::{Segment, SplitMode};
pub use pipeline::{
    FailurePolicy, Pipeline, PipelineConfig, PipelineError, PipelineObserver, PipelineReport,
    RunControl, RunOutcome,
};
pub use settings::{Settings, SettingsManager};
pub use synthesis::{ErrorKind, SynthesisClient, SynthesisError, Voice};
