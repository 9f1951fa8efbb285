//! Application services layer.

pub mod authoring;
pub mod blog;
pub mod comments;
pub mod error;
pub mod mail;
pub mod pagination;
pub mod repos;
pub mod share;

#[cfg(test)]
pub(crate) mod testing;
