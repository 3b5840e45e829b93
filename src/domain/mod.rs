//! Pure domain types and rules: no IO, no clocks beyond what callers pass
//! in.

pub mod comments;
pub mod naming;
pub mod posts;
pub mod warnings;
