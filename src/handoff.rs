//! Extracted-data channel for external UIs.
//!
//! The last successful prescription is published as canonical JSON at a
//! known rendezvous path, so a form-filling frontend can pick it up
//! without coupling to the pipeline process. Write-then-rename keeps
//! readers from ever seeing a half-written document.

use std::path::{Path, PathBuf};

use crate::extraction::Prescription;

pub struct HandoffWriter {
    path: PathBuf,
}

impl HandoffWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Publish `prescription` atomically at the rendezvous path.
    pub fn publish(&self, prescription: &Prescription) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(prescription).map_err(std::io::Error::other)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &self.path)?;
        tracing::info!(path = %self.path.display(), "prescription published for handoff");
        Ok(())
    }

    /// Read back the last published prescription, if any.
    pub fn read_last(&self) -> std::io::Result<Option<Prescription>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let body = std::fs::read_to_string(&self.path)?;
        let prescription = serde_json::from_str(&body).map_err(std::io::Error::other)?;
        Ok(Some(prescription))
    }
}
