//! Errors reported by documents and workspaces.

use crate::markers::MarkerId;
use crate::pos::Pos;
use crate::workspace::DocId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Errors reported by documents and workspaces.
///
/// A call that returns an error leaves the document unchanged.
pub enum DocError {
    #[error("line {line} is outside the document (lines {first}..{end})")]
    /// A line number outside `first..first + line_count` was requested.
    LineOutOfRange {
        /// The requested line.
        line: usize,
        /// First valid line number.
        first: usize,
        /// One past the last valid line number.
        end: usize,
    },

    #[error("change {from}..{to} touches a read-only range")]
    /// The change intersects a read-only marker.
    ReadOnlyRange {
        /// Start of the rejected change.
        from: Pos,
        /// End of the rejected change.
        to: Pos,
    },

    #[error("inserting collapsed marker partially overlapping an existing one")]
    /// A collapsed marker would partially overlap another collapsed marker.
    CollapsedOverlap,

    #[error("document is already attached to a host")]
    /// The document is already attached to an editor host.
    AlreadyAttached,

    #[error("unknown document {0:?}")]
    /// A workspace document id does not exist.
    UnknownDocument(DocId),

    #[error("unknown or cleared marker {0:?}")]
    /// A marker id does not exist (or was cleared).
    UnknownMarker(MarkerId),

    #[error("invalid configuration: {0}")]
    /// Configuration could not be parsed.
    Config(String),

    #[error("serialization error: {0}")]
    /// A snapshot could not be (de)serialized.
    Serialization(String),
}
