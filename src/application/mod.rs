//! Entities, the write pipeline, and the ports it is wired through.

pub mod comments;
pub mod extensions;
pub mod pipeline;
pub mod posts;
pub mod repos;
pub mod spam;
pub mod tags;
