//! Header transformation rules applied to outgoing provider requests.

use serde::Deserialize;

/// A single header transformation rule, applied in declaration order when a
/// provider (or model) request is built.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum HeaderRule {
    /// Forward an inbound header from the client request to the upstream
    /// provider request, optionally renaming it.
    Forward(HeaderForward),
    /// Insert a static header value, overwriting anything forwarded or set
    /// by the provider client itself.
    Insert(HeaderInsert),
    /// Remove a header by exact name.
    Remove(HeaderRemove),
    /// Rename a header, keeping the original name if `rename_duplicate` is
    /// set alongside it.
    RenameDuplicate(HeaderRenameDuplicate),
}

/// Forwards the named inbound header to the upstream request.
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderForward {
    /// Name of the header on the inbound request.
    pub name: String,
    /// Name to use on the outgoing request; defaults to `name`.
    #[serde(default)]
    pub rename: Option<String>,
    /// Used when the header is absent on the inbound request.
    #[serde(default)]
    pub default: Option<String>,
}

/// Inserts a header with a static value.
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderInsert {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}

/// Removes a header by name before the request is sent upstream.
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderRemove {
    /// Header name to remove.
    pub name: String,
}

/// Renames a header, optionally keeping the original alongside the rename.
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderRenameDuplicate {
    /// Original header name.
    pub name: String,
    /// New header name to add the value under.
    pub rename: String,
    /// Keep the original header in addition to the renamed one.
    #[serde(default)]
    pub duplicate: bool,
}
