//! Embedding extraction via an external program.
//!
//! The program is invoked as `<command> [args...] <image path>` and must print
//! a JSON array of descriptors (`[[f32, ...], ...]`, one per detected face) on
//! stdout and exit 0. An empty array means no face was found.

use std::path::Path;
use std::process::Command;

use facematch_core::{Descriptor, EmbeddingExtractor, ExtractionError};

pub struct CommandExtractor {
    program: String,
    args: Vec<String>,
}

impl CommandExtractor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl EmbeddingExtractor for CommandExtractor {
    fn extract(&self, image: &Path) -> Result<Vec<Descriptor>, ExtractionError> {
        // Reject unreadable images before paying for model startup.
        let (width, height) =
            image::image_dimensions(image).map_err(|e| ExtractionError::UnreadableImage {
                path: image.display().to_string(),
                reason: e.to_string(),
            })?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(image)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::Failed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let descriptors: Vec<Descriptor> = serde_json::from_slice(&output.stdout)
            .map_err(|e| ExtractionError::MalformedOutput(e.to_string()))?;

        tracing::debug!(
            image = %image.display(),
            width,
            height,
            faces = descriptors.len(),
            "descriptors extracted"
        );
        Ok(descriptors)
    }
}
