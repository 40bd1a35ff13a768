use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde::Serialize;

use crate::error::QueryError;
use crate::frame::Frame;
use crate::query::RefId;

/// Outcome of one query: frames, or an error when no frame could be produced.
///
/// A result carrying frames never carries an error. Failures for some resources or
/// metrics are logged and dropped once at least one frame exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub frames: Vec<Frame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<QueryError>,
}

impl QueryResult {
    pub fn from_frames(frames: Vec<Frame>) -> Self {
        Self { frames, error: None }
    }

    pub fn from_error(error: QueryError) -> Self {
        Self {
            frames: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Merge a result for the same query from another batch group.
    ///
    /// Frames concatenate in call order. Errors survive only while there are no
    /// frames, and the first error wins.
    pub fn merge(&mut self, other: QueryResult) {
        self.frames.extend(other.frames);
        if self.error.is_none() {
            self.error = other.error;
        }
        if !self.frames.is_empty() {
            self.error = None;
        }
    }
}

/// Insert `result` under `ref_id`, merging with any result already there.
pub fn merge_into(results: &mut HashMap<RefId, QueryResult>, ref_id: RefId, result: QueryResult) {
    match results.entry(ref_id) {
        Entry::Occupied(mut entry) => entry.get_mut().merge(result),
        Entry::Vacant(entry) => {
            entry.insert(result);
        }
    }
}
