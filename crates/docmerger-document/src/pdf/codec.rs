// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Paged-binary codec — the only place that touches PDF object internals.
//
// The merger and the pipeline work through `PagedCodec`; `LopdfCodec` is the
// production implementation on top of `lopdf`.

use std::collections::HashMap;

use docmerger_core::error::{DocMergerError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, instrument, warn};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Guard against malformed, cyclic /Parent chains.
const MAX_TREE_DEPTH: usize = 64;

/// Structural operations on paged documents.
pub trait PagedCodec: Send + Sync {
    /// In-memory document representation.
    type Handle;

    /// Parse bytes strictly.
    fn load(&self, bytes: &[u8]) -> Result<Self::Handle>;

    /// Second, more tolerant load attempt. `scan_budget` bounds how far past
    /// the start of the buffer the header may be found.
    fn load_relaxed(&self, bytes: &[u8], scan_budget: usize) -> Result<Self::Handle>;

    /// An empty document with a valid page tree.
    fn new_document(&self) -> Result<Self::Handle>;

    fn page_count(&self, handle: &Self::Handle) -> usize;

    /// Append the given 1-indexed pages of `source` to `target`, in order.
    /// Either every listed page is appended or none is.
    fn copy_pages(
        &self,
        source: &Self::Handle,
        target: &mut Self::Handle,
        pages: &[u32],
    ) -> Result<()>;

    fn save(&self, handle: &mut Self::Handle) -> Result<Vec<u8>>;

    /// Text content of every page, in page order.
    fn extract_text(&self, handle: &Self::Handle) -> Result<String>;

    /// Re-load `bytes` and report the page count. This is structural
    /// verification: success means the bytes parse back into a document.
    fn verify(&self, bytes: &[u8]) -> Result<usize> {
        let handle = self
            .load(bytes)
            .map_err(|err| DocMergerError::StructuralVerificationFailed(err.to_string()))?;
        Ok(self.page_count(&handle))
    }
}

/// `PagedCodec` backed by `lopdf::Document`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfCodec;

impl PagedCodec for LopdfCodec {
    type Handle = Document;

    #[instrument(skip_all, fields(bytes_len = bytes.len()))]
    fn load(&self, bytes: &[u8]) -> Result<Document> {
        let document = Document::load_mem(bytes)
            .map_err(|err| DocMergerError::PdfError(format!("failed to load PDF: {err}")))?;
        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");
        Ok(document)
    }

    #[instrument(skip_all, fields(bytes_len = bytes.len(), scan_budget))]
    fn load_relaxed(&self, bytes: &[u8], scan_budget: usize) -> Result<Document> {
        let trimmed = trim_to_pdf_body(bytes, scan_budget).ok_or_else(|| {
            DocMergerError::PdfError(format!(
                "no %PDF- header within the first {scan_budget} bytes"
            ))
        })?;
        debug!(
            leading_junk = trimmed.as_ptr() as usize - bytes.as_ptr() as usize,
            kept = trimmed.len(),
            "retrying load on trimmed buffer"
        );
        Document::load_mem(trimmed)
            .map_err(|err| DocMergerError::PdfError(format!("relaxed load failed: {err}")))
    }

    fn new_document(&self) -> Result<Document> {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Kids", Object::Array(Vec::new()));
        pages.set("Count", Object::Integer(0));
        document.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = document.add_object(Object::Dictionary(catalog));
        document.trailer.set("Root", Object::Reference(catalog_id));

        Ok(document)
    }

    fn page_count(&self, handle: &Document) -> usize {
        handle.get_pages().len()
    }

    fn copy_pages(&self, source: &Document, target: &mut Document, pages: &[u32]) -> Result<()> {
        let source_pages = source.get_pages();
        let mut cloner = PageCloner::new(source, target);
        let mut cloned = Vec::with_capacity(pages.len());

        for &page_number in pages {
            let page_id = *source_pages.get(&page_number).ok_or_else(|| {
                DocMergerError::PageCopyFailed {
                    page: page_number,
                    reason: format!("not in page tree ({} pages)", source_pages.len()),
                }
            })?;
            let new_id = cloner
                .clone_page(page_id)
                .map_err(|err| DocMergerError::PageCopyFailed {
                    page: page_number,
                    reason: err.to_string(),
                })?;
            cloned.push(new_id);
        }

        // Nothing is attached until every page cloned; objects left behind
        // by a failed attempt are unreachable and pruned on save.
        attach_pages(target, &cloned)
    }

    fn save(&self, handle: &mut Document) -> Result<Vec<u8>> {
        let pruned = handle.prune_objects();
        if !pruned.is_empty() {
            debug!(pruned = pruned.len(), "Dropped unreachable objects");
        }

        let mut output = Vec::new();
        handle
            .save_to(&mut output)
            .map_err(|err| DocMergerError::PdfError(format!("failed to serialise PDF: {err}")))?;
        Ok(output)
    }

    fn extract_text(&self, handle: &Document) -> Result<String> {
        let page_numbers: Vec<u32> = handle.get_pages().keys().copied().collect();
        handle
            .extract_text(&page_numbers)
            .map_err(|err| DocMergerError::Extraction(format!("PDF text extraction failed: {err}")))
    }
}

/// Slice `bytes` from the first `%PDF-` (searched within `scan_budget`
/// bytes) through the last `%%EOF` marker.
fn trim_to_pdf_body(bytes: &[u8], scan_budget: usize) -> Option<&[u8]> {
    const HEADER: &[u8] = b"%PDF-";
    const TRAILER: &[u8] = b"%%EOF";

    let window = &bytes[..bytes.len().min(scan_budget.saturating_add(HEADER.len()))];
    let start = window.windows(HEADER.len()).position(|w| w == HEADER)?;
    let body = &bytes[start..];

    let end = body
        .windows(TRAILER.len())
        .rposition(|w| w == TRAILER)
        .map(|pos| pos + TRAILER.len())
        .unwrap_or(body.len());
    Some(&body[..end])
}

/// Deep-clones page object graphs from one document into another.
///
/// The memo table maps source ids to target ids so shared objects (fonts,
/// images) are cloned once per copy and reference cycles terminate.
struct PageCloner<'a> {
    source: &'a Document,
    target: &'a mut Document,
    memo: HashMap<ObjectId, ObjectId>,
}

impl<'a> PageCloner<'a> {
    fn new(source: &'a Document, target: &'a mut Document) -> Self {
        Self {
            source,
            target,
            memo: HashMap::new(),
        }
    }

    fn clone_page(&mut self, page_id: ObjectId) -> Result<ObjectId> {
        let source = self.source;
        let page = source
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|err| {
                DocMergerError::PdfError(format!("cannot read page object {page_id:?}: {err}"))
            })?;

        let new_id = self.target.new_object_id();
        self.memo.insert(page_id, new_id);

        let mut dict = self.clone_dictionary(page)?;
        for key in INHERITABLE {
            if dict.has(key) {
                continue;
            }
            if let Some(value) = inherited_attribute(source, page, key) {
                let cloned = self.clone_object(value)?;
                dict.set(key.to_vec(), cloned);
            }
        }

        self.target.objects.insert(new_id, Object::Dictionary(dict));
        Ok(new_id)
    }

    /// Clone a dictionary, dropping `/Parent` (the caller re-links it).
    fn clone_dictionary(&mut self, dict: &Dictionary) -> Result<Dictionary> {
        let mut new_dict = Dictionary::new();
        for (key, value) in dict.iter() {
            if key == b"Parent" {
                continue;
            }
            let cloned_value = self.clone_object(value)?;
            new_dict.set(key.clone(), cloned_value);
        }
        Ok(new_dict)
    }

    fn clone_object(&mut self, object: &Object) -> Result<Object> {
        match object {
            Object::Dictionary(dict) => Ok(Object::Dictionary(self.clone_dictionary(dict)?)),
            Object::Array(items) => {
                let mut new_items = Vec::with_capacity(items.len());
                for item in items {
                    new_items.push(self.clone_object(item)?);
                }
                Ok(Object::Array(new_items))
            }
            Object::Reference(ref_id) => self.clone_reference(*ref_id),
            Object::Stream(stream) => {
                let dict = self.clone_dictionary(&stream.dict)?;
                Ok(Object::Stream(lopdf::Stream::new(dict, stream.content.clone())))
            }
            other => Ok(other.clone()),
        }
    }

    fn clone_reference(&mut self, ref_id: ObjectId) -> Result<Object> {
        if let Some(existing) = self.memo.get(&ref_id) {
            return Ok(Object::Reference(*existing));
        }

        let source = self.source;
        match source.get_object(ref_id) {
            Ok(referenced) => {
                let new_id = self.target.new_object_id();
                self.memo.insert(ref_id, new_id);
                let cloned = self.clone_object(referenced)?;
                self.target.objects.insert(new_id, cloned);
                Ok(Object::Reference(new_id))
            }
            Err(err) => {
                warn!(?ref_id, %err, "Cannot resolve reference, using Null");
                Ok(Object::Null)
            }
        }
    }
}

/// Walk up the page tree from `page` looking for an inheritable `key`.
fn inherited_attribute<'d>(
    source: &'d Document,
    page: &'d Dictionary,
    key: &[u8],
) -> Option<&'d Object> {
    let mut current = page;
    for _ in 0..MAX_TREE_DEPTH {
        let parent_id = current.get(b"Parent").ok()?.as_reference().ok()?;
        let parent = source.get_object(parent_id).ok()?.as_dict().ok()?;
        if let Ok(value) = parent.get(key) {
            return Some(value);
        }
        current = parent;
    }
    None
}

/// Append already-cloned page objects to the target's root /Pages node.
fn attach_pages(target: &mut Document, page_ids: &[ObjectId]) -> Result<()> {
    let pages_id = target
        .catalog()
        .map_err(|err| DocMergerError::PdfError(format!("no catalog: {err}")))?
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|err| DocMergerError::PdfError(format!("no /Pages reference: {err}")))?;

    let pages_dict = target
        .get_object_mut(pages_id)
        .and_then(Object::as_dict_mut)
        .map_err(|err| DocMergerError::PdfError(format!("/Pages is not a dictionary: {err}")))?;

    match pages_dict.get_mut(b"Kids") {
        Ok(Object::Array(kids)) => {
            kids.extend(page_ids.iter().map(|id| Object::Reference(*id)));
        }
        _ => {
            return Err(DocMergerError::PdfError(
                "/Pages has no /Kids array".to_string(),
            ));
        }
    }
    let count = pages_dict
        .get(b"Count")
        .and_then(Object::as_i64)
        .unwrap_or(0);
    pages_dict.set("Count", Object::Integer(count + page_ids.len() as i64));

    for page_id in page_ids {
        if let Ok(Object::Dictionary(page_dict)) = target.get_object_mut(*page_id) {
            page_dict.set("Parent", Object::Reference(pages_id));
        }
    }

    Ok(())
}
