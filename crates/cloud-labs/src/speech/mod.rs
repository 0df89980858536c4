//! Document OCR to speech
//!
//! Extracts the printed text of a stored document image and starts an
//! asynchronous synthesis task that writes the audio back to the bucket.

pub mod handler;

pub use handler::{
    document_key, output_prefix, preview, truncate_chars, DocumentSpeechHandler, HandlerResponse,
    SpeechEvent,
};
