pub mod client;
pub mod error;
pub mod types;

pub use client::{ChatSender, ImageGenerator, OpenAiClient, complete_text, generate_image_url};
pub use error::OpenAiError;
pub use types::{ChatMessage, ChatRequest, ImageRequest};
