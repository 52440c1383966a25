// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline inputs — byte sources and classified input documents.

use std::path::PathBuf;

use async_trait::async_trait;
use docmerger_core::Kind;
use docmerger_core::error::{DocMergerError, Result};
use docmerger_document::classify;
use uuid::Uuid;

/// Supplies the bytes of one input for the duration of a run.
#[async_trait]
pub trait ByteSource: Send + Sync {
    async fn read_bytes(&self) -> Result<Vec<u8>>;
}

/// Bytes already held in memory (e.g. an upload body).
#[derive(Debug, Clone)]
pub struct InMemorySource {
    bytes: Vec<u8>,
}

impl InMemorySource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

#[async_trait]
impl ByteSource for InMemorySource {
    async fn read_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }
}

/// A file on disk, read when the pipeline asks for it.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ByteSource for FileSource {
    async fn read_bytes(&self) -> Result<Vec<u8>> {
        tokio::fs::read(&self.path).await.map_err(|err| {
            DocMergerError::InputUnreadable(format!("{}: {err}", self.path.display()))
        })
    }
}

/// What the caller hands the pipeline for each input.
pub struct InputDescriptor {
    pub original_name: Option<String>,
    pub declared_media_type: Option<String>,
    pub source: Box<dyn ByteSource>,
}

impl InputDescriptor {
    pub fn new(original_name: Option<String>, source: impl ByteSource + 'static) -> Self {
        Self {
            original_name,
            declared_media_type: None,
            source: Box::new(source),
        }
    }

    pub fn in_memory(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(Some(name.into()), InMemorySource::new(bytes))
    }

    /// A file input named after the last path component.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Self::new(name, FileSource::new(path))
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.declared_media_type = Some(media_type.into());
        self
    }
}

/// An input after classification. Lives for one run only.
pub struct InputDocument {
    pub id: Uuid,
    pub original_name: Option<String>,
    pub declared_media_type: Option<String>,
    pub kind: Kind,
    label: String,
    source: Box<dyn ByteSource>,
}

impl InputDocument {
    /// Classify `descriptor`; `position` (0-based) names unnamed inputs.
    pub fn classify(position: usize, descriptor: InputDescriptor) -> Self {
        let kind = classify(
            descriptor.original_name.as_deref(),
            descriptor.declared_media_type.as_deref(),
        );
        let label = descriptor
            .original_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("input-{}", position + 1));
        Self {
            id: Uuid::new_v4(),
            original_name: descriptor.original_name,
            declared_media_type: descriptor.declared_media_type,
            kind,
            label,
            source: descriptor.source,
        }
    }

    /// Name used in diagnostics, headers and page titles.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Read the bytes; an empty read counts as unreadable.
    pub async fn read(&self) -> Result<Vec<u8>> {
        let bytes = self.source.read_bytes().await?;
        if bytes.is_empty() {
            return Err(DocMergerError::InputUnreadable(format!(
                "{} is empty",
                self.label
            )));
        }
        Ok(bytes)
    }
}
