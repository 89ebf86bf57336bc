//! Turning entities and text streams into speech units.

pub mod assembler;
pub mod chunker;
pub mod extractor;
pub mod unit;

pub use assembler::{Assembled, DELIMITERS, StreamAssembler, assemble, assemble_stream};
pub use chunker::{Chunker, split_sentences};
pub use extractor::{ContentExtractor, extract_text};
pub use unit::{SpeechUnit, Voice};
