// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docmerger-pipeline — Runs a batch of inputs through classification,
// conversion and merge (PDF) or compose (DOCX), with a diagnostic fallback
// so that every run returns a loadable document.

pub mod orchestrator;
pub mod source;
pub mod strategy;

pub use orchestrator::Pipeline;
pub use source::{ByteSource, FileSource, InMemorySource, InputDescriptor, InputDocument};
pub use strategy::{PagedConversion, PagedStrategy};
