pub mod document;
pub mod memory;
pub mod store;

pub use document::{Document, FieldValue, SYSTEM_FIELDS};
pub use memory::MemoryStore;
pub use store::{Comment, DocTypeMeta, DocumentStore, ListWindow, StoreError};
