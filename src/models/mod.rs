//! Domain types shared by the pipeline, the stores and the handlers.

pub mod entry;
pub mod token;
pub mod user;
pub mod validator;

pub use entry::{Entry, EntryFilter, EntryPatch, NewEntry};
pub use token::{Token, TokenHash, TokenScope};
pub use user::{Identity, NewUser, Permissions, User};
pub use validator::Validator;
