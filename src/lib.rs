pub mod config;
pub mod error;
pub mod io;
pub mod llm;
pub mod models;
pub mod server;
pub mod stages;

pub use config::ServerConfig;
pub use error::{AnalysisError, CleanupWarning, NormalizationError};
pub use io::StagingDir;
pub use llm::{
    AnalysisBackend, FileHandle, GeminiClient, GeminiConfig, MAX_CONTEXT_MESSAGES,
    build_instruction, normalize,
};
pub use models::{AnalysisInstance, AnalysisRequest, AnalysisResult, SourceFormat};
pub use server::{AppState, build_router, serve};
pub use stages::{
    PipelineSettings, ScopedArtifacts, ingest, run_analysis, with_scoped_artifacts,
};
