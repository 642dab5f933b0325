//! Intake - アップロードの検証と投入
//!
//! Checks the filename, stores the upload under a fresh input key and
//! submits the job. Nothing here enters the job lifecycle on failure.

use std::sync::Arc;

use tracing::{debug, warn};

use super::service::ConversionService;
use crate::domain::{InputError, JobId};
use crate::ports::{KeyGenerator, ObjectStore};

pub const DEFAULT_INPUT_EXTENSION: &str = "pptx";

/// `(base_name, extension)` of a client-supplied filename. Directory parts
/// are dropped.
fn split_filename(filename: &str) -> Option<(&str, &str)> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let (base, ext) = name.rsplit_once('.')?;
    if base.is_empty() {
        return None;
    }
    Some((base, ext))
}

pub struct Intake {
    store: Arc<dyn ObjectStore>,
    keys: Arc<dyn KeyGenerator>,
    service: Arc<ConversionService>,
    extension: String,
}

impl Intake {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        keys: Arc<dyn KeyGenerator>,
        service: Arc<ConversionService>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            store,
            keys,
            service,
            extension: extension.into().trim_start_matches('.').to_lowercase(),
        }
    }

    /// Accepted extension, lower-cased and without the dot.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Validate, upload and submit one file.
    pub async fn accept(&self, bytes: Vec<u8>, filename: Option<&str>) -> Result<JobId, InputError> {
        let filename = filename
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .ok_or(InputError::MissingFilename)?;

        let base_name = match split_filename(filename) {
            Some((base, ext)) if ext.eq_ignore_ascii_case(&self.extension) => base,
            _ => {
                debug!(filename, "rejected upload with unsupported extension");
                return Err(InputError::UnsupportedExtension {
                    filename: filename.to_string(),
                    expected: format!(".{}", self.extension),
                });
            }
        };

        let input_key = self.keys.new_input_key(Some(base_name), &self.extension);
        self.store
            .put(&input_key, bytes)
            .await
            .map_err(|err| {
                warn!(key = %input_key, error = %err, "failed to store upload");
                InputError::Upload(err)
            })?;

        match self
            .service
            .submit(input_key.clone(), Some(base_name.to_string()))
            .await
        {
            Ok(job_id) => Ok(job_id),
            Err(err) => {
                // no job refers to the upload; the sweeper would get it otherwise
                if let Err(cleanup) = self.store.delete(&input_key).await {
                    warn!(key = %input_key, error = %cleanup, "failed to remove orphaned upload");
                }
                Err(err.into())
            }
        }
    }
}
