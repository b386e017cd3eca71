//! Scoped ownership of a destination that is being written
//!
//! Until `commit` is called the destination counts as partial. Dropping or
//! aborting the guard removes it, so a failed operation never leaves a
//! present but corrupt output behind. When removal itself fails the caller
//! is told the output is partial and must clean it up.

use tracing::{debug, error};

use crate::ports::MediaSink;

pub struct OutputGuard<'a> {
    sink: &'a dyn MediaSink,
    dest_ref: String,
    armed: bool,
}

impl<'a> OutputGuard<'a> {
    pub fn new(sink: &'a dyn MediaSink, dest_ref: impl Into<String>) -> Self {
        Self {
            sink,
            dest_ref: dest_ref.into(),
            armed: true,
        }
    }

    pub fn dest_ref(&self) -> &str {
        &self.dest_ref
    }

    /// Keep the output
    pub fn commit(mut self) {
        self.armed = false;
        debug!("Committed output {}", self.dest_ref);
    }

    /// Remove the output; returns `true` when it could not be removed
    pub fn abort(mut self) -> bool {
        self.armed = false;
        !self.remove()
    }

    fn remove(&self) -> bool {
        match self.sink.discard(&self.dest_ref) {
            Ok(()) => {
                debug!("Removed partial output {}", self.dest_ref);
                true
            }
            Err(e) => {
                error!("Failed to remove partial output {}: {}", self.dest_ref, e);
                false
            }
        }
    }
}

impl Drop for OutputGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.remove();
        }
    }
}
