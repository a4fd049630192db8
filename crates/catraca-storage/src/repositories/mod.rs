pub mod access;
pub mod class;
pub mod tag;

pub use access::{AccessRepository, SqliteAccessRepository};
pub use class::{ClassRepository, SqliteClassRepository};
pub use tag::{SqliteTagRepository, TagRepository};
