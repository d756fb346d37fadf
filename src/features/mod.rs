//! Rules for the features layered around sharding.

pub mod encrypt;
pub mod readwrite;
pub mod shadow;
pub mod single;

pub use encrypt::{EncryptColumn, EncryptRule, Encryptor};
pub use readwrite::{LoadBalancer, ReadwriteGroup, ReadwriteSplittingRule};
pub use shadow::ShadowRule;
pub use single::SingleTableRule;

use crate::statement::{CommentSegment, StatementContext};

/// Comments of `statement` whose text contains `marker`, ignoring ASCII case
/// and whitespace.
pub(crate) fn comments_with_marker<'a>(
    statement: &'a StatementContext,
    marker: &str,
) -> Vec<&'a CommentSegment> {
    let marker = squeeze(marker);
    if marker.is_empty() {
        return Vec::new();
    }
    statement
        .comments
        .iter()
        .filter(|c| squeeze(&c.text).contains(&marker))
        .collect()
}

fn squeeze(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
