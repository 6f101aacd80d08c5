pub mod client;
pub mod note;

pub use client::{ApiClient, ApiError};
pub use note::{CreateNoteRequest, Note, NoteTag, NotesPage, UpdateNoteRequest};
