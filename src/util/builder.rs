//! Shared lifecycle state for single-use builders.

use anyhow::Result;

use crate::Error;

/// Lifecycle of a builder. A builder starts out `Empty`, becomes `Accumulating` after the first setter call and is
/// `Built` once a resource was created from it. A built builder rejects every further call.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BuilderState {
    #[default]
    Empty,
    Accumulating,
    Built,
}

impl BuilderState {
    /// Record a setter call. Fails with [`Error::BuilderFinalized`] if the builder was already used.
    pub(crate) fn touch(&mut self, what: &'static str) -> Result<()> {
        self.ensure_open(what)?;
        *self = BuilderState::Accumulating;
        Ok(())
    }

    pub(crate) fn ensure_open(&self, what: &'static str) -> Result<()> {
        match self {
            BuilderState::Built => Err(Error::BuilderFinalized(what).into()),
            _ => Ok(()),
        }
    }

    pub(crate) fn finish(&mut self) {
        *self = BuilderState::Built;
    }
}
