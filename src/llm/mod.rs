pub mod gemini;
pub mod media;
pub mod request;
pub mod schema;
pub mod types;

pub use gemini::{AnalysisError, Analyzer, GeminiAnalyzer};
pub use media::{load_image, EncodedImage, IntakeError};
pub use request::AnalysisRequest;
pub use types::AnalysisResult;
