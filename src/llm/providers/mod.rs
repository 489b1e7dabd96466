//! Provider implementations for hosted generative models.

mod gemini;

pub use gemini::GeminiProvider;
