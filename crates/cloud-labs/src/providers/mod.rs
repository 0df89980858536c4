//! Provider abstractions for the managed services the handlers call
//!
//! Each handler depends on these traits rather than on a concrete client,
//! so tests can substitute mocks and the AWS clients stay swappable.

pub mod generator;
pub mod item_table;
pub mod object_store;
pub mod retriever;
pub mod speech;
pub mod text_extractor;

pub mod aws;

pub use generator::Generator;
pub use item_table::{AttributeValue, Item, ItemTable};
pub use object_store::ObjectStore;
pub use retriever::Retriever;
pub use speech::{SpeechSynthesizer, SynthesisRequest, SynthesisTask};
pub use text_extractor::TextExtractor;
