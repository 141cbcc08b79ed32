pub mod analyzer;
pub mod models;
pub mod prompt;
pub mod providers;

pub use analyzer::{AnalysisOutcome, AnalysisRequest, NarrativeService, TextGenerator};
pub use providers::gemini::GeminiProvider;
pub use providers::openai::OpenAiProvider;
