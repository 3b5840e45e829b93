use serde::Serialize;
use time::OffsetDateTime;

/// One stored comment. Identity is the `(post_name, number)` pair; numbers
/// increase per post starting at 1 and are never reused while the post
/// lives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRecord {
    pub post_name: String,
    pub number: i64,
    pub comment: String,
    pub author: String,
    pub time: OffsetDateTime,
}
