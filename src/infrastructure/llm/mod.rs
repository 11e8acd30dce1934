mod groq;

pub use groq::GroqLlm;
