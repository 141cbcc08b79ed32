pub mod gemini;
pub mod openai;
