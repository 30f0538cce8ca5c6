//! Absolute path change cursor.
//!
//! The wire protocol only changes the current folder one step at a time
//! (root, up, or down into a named child). An absolute path request is
//! therefore decomposed into a reset-to-root step followed by one descend
//! step per segment. The cursor holds the explicit position between steps;
//! each protocol confirmation advances it until the target is reached.

use btpm_common::{PmError, PmResult};

/// One step of a decomposed absolute path change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    /// Reset the current folder to the store root.
    Root,
    /// Descend into the named child folder.
    Down(String),
}

/// Cursor through the segments of an absolute path change.
///
/// `next_step` yields `Root` first, then one `Down` per segment, then `None`
/// once the target has been reached.
#[derive(Debug)]
pub struct PathCursor {
    target: String,
    /// Byte offset of the first segment not yet requested.
    offset: usize,
    root_issued: bool,
}

impl PathCursor {
    /// Build a cursor for `target`.
    ///
    /// An empty string or `/` selects the root. A leading `/` is accepted
    /// and ignored; empty interior segments are rejected.
    pub fn new(target: &str) -> PmResult<Self> {
        let trimmed = target.strip_prefix('/').unwrap_or(target);
        if !trimmed.is_empty() && trimmed.split('/').any(|segment| segment.is_empty()) {
            return Err(PmError::InvalidParameter(format!(
                "malformed path {target:?}"
            )));
        }
        Ok(Self {
            target: trimmed.to_string(),
            offset: 0,
            root_issued: false,
        })
    }

    /// The next step to request, or `None` once the target is reached.
    pub fn next_step(&mut self) -> Option<PathStep> {
        if !self.root_issued {
            self.root_issued = true;
            return Some(PathStep::Root);
        }
        if self.offset >= self.target.len() {
            return None;
        }
        let rest = &self.target[self.offset..];
        let segment = rest.split('/').next().unwrap_or(rest);
        self.offset += segment.len();
        if self.offset < self.target.len() {
            // Skip the separator.
            self.offset += 1;
        }
        Some(PathStep::Down(segment.to_string()))
    }

    /// The full target path this cursor walks toward.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The path prefix covered by the steps handed out so far.
    ///
    /// When a step's confirmation arrives, this is the folder the remote
    /// side is now in.
    pub fn applied(&self) -> &str {
        self.target[..self.offset].trim_end_matches('/')
    }

    /// True once every step has been handed out.
    pub fn is_complete(&self) -> bool {
        self.root_issued && self.offset >= self.target.len()
    }
}

/// Apply a single relative path step to `current`, returning the new path.
///
/// Used for single-step path changes that bypass the cursor. `Up` on the
/// root stays on the root.
pub fn apply_step(current: &str, step: &SingleStep) -> String {
    match step {
        SingleStep::Root => String::new(),
        SingleStep::Up => match current.rfind('/') {
            Some(idx) => current[..idx].to_string(),
            None => String::new(),
        },
        SingleStep::Down(name) => {
            if current.is_empty() {
                name.clone()
            } else {
                format!("{current}/{name}")
            }
        }
    }
}

/// A single-step path change request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SingleStep {
    Root,
    Up,
    Down(String),
}
