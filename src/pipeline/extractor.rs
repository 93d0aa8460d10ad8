//! Pulls a model/serial identifier and a product category out of free text.
//!
//! Two independent case-insensitive searches over the whole body; the
//! leftmost match of each wins. Misses yield [`NOT_AVAILABLE`].

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::pipeline::types::{NOT_AVAILABLE, PartRequest};

/// Label, optional `:`/whitespace/`-` separators, then one non-whitespace run.
static IDENTIFIER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(Model|Serial|S/N|Service Tag)[:\s-]*(\S+)")
        .expect("identifier pattern is valid")
});

static CATEGORY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(battery|charger|keyboard|DIMM|RAM|hard drive|charging cable)")
        .expect("category pattern is valid")
});

/// Extract a [`PartRequest`] from a message body. Never fails.
pub fn extract(body: &str) -> PartRequest {
    let identifier = IDENTIFIER_PATTERN
        .captures(body)
        .and_then(|c| c.get(2))
        .map_or(NOT_AVAILABLE, |m| m.as_str());

    let category = CATEGORY_PATTERN
        .find(body)
        .map_or(NOT_AVAILABLE, |m| m.as_str());

    debug!(identifier, category, "Extracted part request");
    PartRequest::new(identifier, category)
}
