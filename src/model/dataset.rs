use crate::error::{AggrError, Result};
use serde::{Deserialize, Serialize};

/// The dataset a run's aggregations are part of.
///
/// Created once per run and written once at its end.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dataset {
    id: String,
    title: String,
}

impl Dataset {
    /// # Errors
    /// [`AggrError::Config`] if the id is blank.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(AggrError::config("dataset.id", "dataset id must not be blank"));
        }
        let title = title.into();
        let title = if title.trim().is_empty() { id.clone() } else { title };
        Ok(Self { id, title })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}
