pub mod gate;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod playlist;
pub mod prompt;
pub mod record;
pub mod storage;
pub mod transcript;

pub use gate::{AutoApprove, Gate, PromptGate};
pub use model::build_generator;
pub use pipeline::{Pipeline, PipelineOptions, VideoOutcome};
pub use playlist::{PlaylistClient, Video};
pub use prompt::build_prompt;
pub use storage::RecordStore;
pub use transcript::{TranscriptService, TranscriptSource, extract_video_id};
