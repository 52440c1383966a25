// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline orchestrator — the only public surface of a merge run.
//
// Init -> Classified -> Extracted/Converted -> Merged -> Verified -> Done,
// with Fallback reachable from every stage. Fallback emits a diagnostic
// document of the *target* kind, so every run ends with output bytes and a
// status. The single error returned to callers is OutputConstructionFailed.
//
// Blocking work (extraction, rendering, merging, composing, verification)
// runs on tokio's blocking pool. Input order is preserved end to end.

use std::sync::Arc;

use docmerger_core::error::{DocMergerError, Result};
use docmerger_core::messages::Message;
use docmerger_core::{
    Diagnostic, DiagnosticKind, ExtractedText, Kind, MergeConfig, MergeStats, PipelineOutcome,
    Stage, Status, TargetKind,
};
use docmerger_document::extract::{Extraction, Extractor, GenericTextExtractor, empty_placeholder};
use docmerger_document::pdf::diagnostic::{diagnostic_pdf, minimal_pdf};
use docmerger_document::{
    ContainerTextExtractor, FlowComposer, ImagePageConverter, PagedConverter, StructuralMerger,
};
use tracing::{debug, error, info, instrument, warn};

use crate::source::{InputDescriptor, InputDocument};
use crate::strategy::PagedConversion;

/// Runs inputs through classification, conversion and merge or compose.
pub struct Pipeline {
    config: Arc<MergeConfig>,
    generic: Arc<dyn GenericTextExtractor>,
    converter: Arc<dyn PagedConverter>,
}

impl Pipeline {
    pub fn new(config: MergeConfig) -> Self {
        let converter = Arc::new(ImagePageConverter::new(config.paper_size));
        Self {
            config: Arc::new(config),
            generic: Arc::new(ContainerTextExtractor),
            converter,
        }
    }

    /// Replace the generic text extractor used for kinds without a
    /// dedicated reader.
    pub fn with_text_extractor(mut self, generic: Arc<dyn GenericTextExtractor>) -> Self {
        self.generic = generic;
        self
    }

    /// Replace the any-to-paged converter.
    pub fn with_converter(mut self, converter: Arc<dyn PagedConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Merge or compose `inputs`, in order, into one document of `target`.
    ///
    /// Never returns empty or unloadable bytes. Returns `Err` only when not
    /// even a diagnostic document could be built.
    #[instrument(skip_all, fields(inputs = inputs.len(), target = ?target))]
    pub async fn run(
        &self,
        inputs: Vec<InputDescriptor>,
        target: TargetKind,
    ) -> Result<PipelineOutcome> {
        let mut run = RunState::new(target);
        info!("Pipeline run started");

        if inputs.is_empty() {
            return self.fallback(run, Message::NoFilesProvided, None).await;
        }

        let documents: Vec<InputDocument> = inputs
            .into_iter()
            .enumerate()
            .map(|(position, descriptor)| InputDocument::classify(position, descriptor))
            .collect();
        for document in &documents {
            debug!(id = %document.id, source = document.label(), kind = %document.kind, "Input classified");
            if document.kind == Kind::Unknown {
                run.note(
                    DiagnosticKind::ClassificationAmbiguous,
                    document.label(),
                    "no extension or media type matched; using generic extraction",
                );
            }
        }
        run.advance(Stage::Classified);

        let mut loaded = Vec::with_capacity(documents.len());
        for document in documents {
            match document.read().await {
                Ok(bytes) => loaded.push(LoadedInput {
                    label: document.label().to_string(),
                    kind: document.kind,
                    bytes,
                }),
                Err(err) => {
                    warn!(source = document.label(), %err, "Skipping unreadable input");
                    run.note(DiagnosticKind::InputUnreadable, document.label(), err.to_string());
                }
            }
        }

        if loaded.is_empty() {
            return self.fallback(run, Message::NoValidFiles, None).await;
        }

        match target {
            TargetKind::Paged => self.run_paged(run, loaded).await,
            TargetKind::FlowDocument => self.run_flow(run, loaded).await,
        }
    }

    async fn run_paged(&self, mut run: RunState, loaded: Vec<LoadedInput>) -> Result<PipelineOutcome> {
        let conversion = Arc::new(PagedConversion::new(
            &self.config,
            Arc::clone(&self.generic),
            Arc::clone(&self.converter),
        ));

        // Conversions run one at a time so page order follows input order.
        let mut documents = Vec::with_capacity(loaded.len());
        for input in loaded {
            let label = input.label.clone();
            let conversion = Arc::clone(&conversion);
            let converted = blocking("conversion", move || {
                conversion.convert(&input.label, input.bytes, input.kind)
            })
            .await;
            match converted {
                Ok(outcome) => {
                    run.diagnostics.extend(outcome.diagnostics);
                    documents.extend(outcome.document);
                }
                Err(err) => run.note(DiagnosticKind::ConversionFailed, &label, err.to_string()),
            }
        }
        run.advance(Stage::Converted);

        if documents.is_empty() {
            return self.fallback(run, Message::NothingProcessable, None).await;
        }

        let config = (*self.config).clone();
        let merged = blocking("merge", move || {
            StructuralMerger::with_config(config).merge(&documents)
        })
        .await;
        let result = match merged {
            Ok(result) => result,
            Err(err) => {
                run.note(DiagnosticKind::StructuralVerificationFailed, "merge", err.to_string());
                return self
                    .fallback(run, Message::ProcessingError, Some(err.to_string()))
                    .await;
            }
        };
        run.advance(Stage::Merged);

        run.merge = Some(result.stats());
        run.diagnostics.extend(result.diagnostics);
        if !result.substituted {
            run.advance(Stage::Verified);
        }
        Ok(run.finish(result.output_bytes, result.substituted))
    }

    async fn run_flow(&self, mut run: RunState, loaded: Vec<LoadedInput>) -> Result<PipelineOutcome> {
        let mut sources = Vec::with_capacity(loaded.len());
        for (label, extraction) in self.extract_all(loaded).await {
            match extraction {
                Extraction::Extracted(text) => sources.push(text),
                Extraction::Empty => sources.push(ExtractedText::new(
                    &label,
                    empty_placeholder(&label, TargetKind::FlowDocument),
                )),
                Extraction::Failed(reason) => {
                    run.note(DiagnosticKind::ConversionFailed, &label, reason);
                }
            }
        }
        run.advance(Stage::Extracted);

        if sources.is_empty() {
            return self.fallback(run, Message::NoContentExtracted, None).await;
        }

        let config = Arc::clone(&self.config);
        let composed = blocking("compose", move || FlowComposer::new(&config).compose(&sources)).await;
        let flow = match composed {
            Ok(flow) => flow?,
            Err(err) => {
                return self
                    .fallback(run, Message::ProcessingError, Some(err.to_string()))
                    .await;
            }
        };
        run.advance(Stage::Merged);

        match &flow.failure {
            Some(reason) => run.note(DiagnosticKind::StructuralVerificationFailed, "compose", reason.as_str()),
            None => run.advance(Stage::Verified),
        }
        Ok(run.finish(flow.bytes, flow.substituted))
    }

    /// Extraction outcomes in input order. With `parallel_extraction` every
    /// input is extracted concurrently and the results are awaited in order.
    async fn extract_all(&self, loaded: Vec<LoadedInput>) -> Vec<(String, Extraction)> {
        let extractor = Arc::new(Extractor::with_generic(Arc::clone(&self.generic), &self.config));

        let mut results = Vec::with_capacity(loaded.len());
        if self.config.parallel_extraction {
            let handles: Vec<_> = loaded
                .into_iter()
                .map(|input| {
                    let extractor = Arc::clone(&extractor);
                    let label = input.label.clone();
                    let handle = tokio::task::spawn_blocking(move || {
                        extractor.attempt(&input.label, &input.bytes, input.kind)
                    });
                    (label, handle)
                })
                .collect();
            for (label, handle) in handles {
                let extraction = handle.await.unwrap_or_else(|err| {
                    error!(source = %label, %err, "Extraction task failed");
                    Extraction::Failed(format!("extraction task failed: {err}"))
                });
                results.push((label, extraction));
            }
        } else {
            for input in loaded {
                let label = input.label.clone();
                let extractor = Arc::clone(&extractor);
                let extraction = blocking("extraction", move || {
                    extractor.attempt(&input.label, &input.bytes, input.kind)
                })
                .await
                .unwrap_or_else(|err| Extraction::Failed(err.to_string()));
                results.push((label, extraction));
            }
        }
        results
    }

    /// Replace the whole output with a diagnostic document of the target kind.
    async fn fallback(
        &self,
        run: RunState,
        message: Message,
        detail: Option<String>,
    ) -> Result<PipelineOutcome> {
        warn!(stage = ?run.stage, ?message, "Falling back to a diagnostic document");
        let text = message.text(self.config.locale);
        let config = Arc::clone(&self.config);

        let bytes = match run.target {
            TargetKind::Paged => {
                let body = match &detail {
                    Some(detail) => format!("{text}\n\n{detail}"),
                    None => text.to_string(),
                };
                match blocking("diagnostic", move || diagnostic_pdf(&body, &config).bytes).await {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        error!(%err, "Styled diagnostic page failed, using minimal PDF");
                        minimal_pdf(text)
                    }
                }
            }
            TargetKind::FlowDocument => blocking("diagnostic", move || {
                FlowComposer::new(&config).diagnostic(message, detail.as_deref())
            })
            .await
            .map_err(|err| DocMergerError::OutputConstructionFailed(err.to_string()))??,
        };

        Ok(run.finish(bytes, true))
    }
}

/// An input whose bytes were read; the `InputDocument` itself is gone.
struct LoadedInput {
    label: String,
    kind: Kind,
    bytes: Vec<u8>,
}

/// Mutable bookkeeping of one run.
struct RunState {
    target: TargetKind,
    stage: Stage,
    diagnostics: Vec<Diagnostic>,
    merge: Option<MergeStats>,
}

impl RunState {
    fn new(target: TargetKind) -> Self {
        Self {
            target,
            stage: Stage::Init,
            diagnostics: Vec::new(),
            merge: None,
        }
    }

    fn advance(&mut self, stage: Stage) {
        debug!(from = ?self.stage, to = ?stage, "Stage transition");
        self.stage = stage;
    }

    fn note(&mut self, kind: DiagnosticKind, source: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(kind, source, message));
    }

    fn finish(mut self, output_bytes: Vec<u8>, substituted: bool) -> PipelineOutcome {
        let status = if substituted {
            self.advance(Stage::Fallback);
            Status::Fallback
        } else if self.diagnostics.iter().any(Diagnostic::loses_content) {
            Status::PartialSuccess
        } else {
            Status::Success
        };

        info!(
            ?status,
            bytes_len = output_bytes.len(),
            diagnostics = self.diagnostics.len(),
            "Pipeline run done"
        );
        PipelineOutcome {
            status,
            target: self.target,
            output_bytes,
            diagnostics: self.diagnostics,
            merge: self.merge,
            last_stage: self.stage,
        }
    }
}

/// Run `task` on the blocking pool; a panic becomes a `Task` error.
async fn blocking<T, F>(stage: &'static str, task: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task).await.map_err(|err| {
        error!(stage, %err, "Blocking task failed");
        DocMergerError::Task(format!("{stage}: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmerger_document::flow::FlowParagraph;
    use docmerger_document::{
        DocxCodec, FlowCodec, FlowDocument, LopdfCodec, PagedCodec, PaginatedRenderer,
    };
    use std::io::Read;

    fn two_page_pdf() -> Vec<u8> {
        let config = MergeConfig::default();
        let renderer = PaginatedRenderer::new(config.clone());
        let pages = [
            renderer.render("first page", "p1"),
            renderer.render("second page", "p2"),
        ];
        StructuralMerger::with_config(config).merge(&pages).output_bytes
    }

    fn docx(lines: &[&str]) -> Vec<u8> {
        let document =
            FlowDocument::from_paragraphs(lines.iter().map(|l| FlowParagraph::new(*l)).collect());
        DocxCodec::default().encode(&document).unwrap()
    }

    fn flow_text(bytes: &[u8]) -> String {
        Extractor::new(&MergeConfig::default())
            .extract("out.docx", bytes, Kind::FlowText)
            .text
    }

    fn document_xml(bytes: &[u8]) -> String {
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        xml
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(MergeConfig::default())
    }

    #[tokio::test]
    async fn pdf_and_docx_merge_into_one_pdf() {
        let inputs = vec![
            InputDescriptor::in_memory("a.pdf", two_page_pdf()),
            InputDescriptor::in_memory("b.docx", docx(&["Hello", "", "World"])),
        ];
        let outcome = pipeline().run(inputs, TargetKind::Paged).await.unwrap();

        assert_eq!(outcome.status, Status::Success, "{:?}", outcome.diagnostics);
        assert_eq!(outcome.last_stage, Stage::Verified);
        assert!(LopdfCodec.verify(&outcome.output_bytes).unwrap() >= 3);
        let merge = outcome.merge.unwrap();
        assert_eq!(merge.total_pages_merged, 3);
        assert_eq!(merge.failed_page_count, 0);
    }

    #[tokio::test]
    async fn docx_holding_plain_text_is_rendered() {
        let inputs = vec![
            InputDescriptor::in_memory("a.pdf", two_page_pdf()),
            InputDescriptor::in_memory("b.docx", b"Hello\n\nWorld".to_vec()),
        ];
        let outcome = pipeline().run(inputs, TargetKind::Paged).await.unwrap();

        assert_eq!(outcome.status, Status::Success, "{:?}", outcome.diagnostics);
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(LopdfCodec.verify(&outcome.output_bytes).unwrap(), 3);
        assert_eq!(outcome.merge.unwrap().total_pages_merged, 3);
    }

    #[tokio::test]
    async fn no_inputs_for_flow_target() {
        let outcome = pipeline().run(Vec::new(), TargetKind::FlowDocument).await.unwrap();

        assert_eq!(outcome.status, Status::Fallback);
        assert_eq!(outcome.last_stage, Stage::Fallback);
        assert_eq!(DocxCodec::default().verify(&outcome.output_bytes).unwrap(), 1);
        assert_eq!(flow_text(&outcome.output_bytes), "No files were provided for merging");
    }

    #[tokio::test]
    async fn no_inputs_for_paged_target() {
        let outcome = pipeline().run(Vec::new(), TargetKind::Paged).await.unwrap();
        assert_eq!(outcome.status, Status::Fallback);
        assert_eq!(LopdfCodec.verify(&outcome.output_bytes).unwrap(), 1);
    }

    #[tokio::test]
    async fn corrupt_pdf_yields_diagnostic_page() {
        let inputs = vec![InputDescriptor::in_memory("corrupt.pdf", b"garbage bytes".to_vec())];
        let outcome = pipeline().run(inputs, TargetKind::Paged).await.unwrap();

        assert_eq!(outcome.status, Status::Fallback);
        assert_eq!(LopdfCodec.verify(&outcome.output_bytes).unwrap(), 1);
        let merge = outcome.merge.unwrap();
        assert_eq!(merge.total_pages_merged, 0);
        assert_eq!(merge.skipped_documents, 1);
    }

    #[tokio::test]
    async fn one_corrupt_input_is_partial_success() {
        let inputs = vec![
            InputDescriptor::in_memory("a.pdf", two_page_pdf()),
            InputDescriptor::in_memory("corrupt.pdf", b"garbage bytes".to_vec()),
        ];
        let outcome = pipeline().run(inputs, TargetKind::Paged).await.unwrap();

        assert_eq!(outcome.status, Status::PartialSuccess);
        assert_eq!(LopdfCodec.verify(&outcome.output_bytes).unwrap(), 2);
        assert!(
            outcome
                .diagnostics
                .iter()
                .any(|d| d.source == "corrupt.pdf" && d.kind == DiagnosticKind::ConversionFailed)
        );
    }

    #[tokio::test]
    async fn every_input_corrupt_for_flow_target() {
        let inputs = vec![
            InputDescriptor::in_memory("corrupt.pdf", b"garbage bytes".to_vec()),
            InputDescriptor::in_memory("bad.docx", b"\x00\x01\x02".to_vec()),
        ];
        let outcome = pipeline().run(inputs, TargetKind::FlowDocument).await.unwrap();

        assert_eq!(outcome.status, Status::Fallback);
        assert_eq!(outcome.diagnostics.len(), 2);
        assert!(DocxCodec::default().verify(&outcome.output_bytes).unwrap() >= 1);
        assert_eq!(
            flow_text(&outcome.output_bytes),
            "No content could be extracted from the provided files"
        );
    }

    #[tokio::test]
    async fn empty_files_are_unreadable() {
        let inputs = vec![InputDescriptor::in_memory("blank.txt", Vec::new())];
        let outcome = pipeline().run(inputs, TargetKind::Paged).await.unwrap();

        assert_eq!(outcome.status, Status::Fallback);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::InputUnreadable);
        assert_eq!(LopdfCodec.verify(&outcome.output_bytes).unwrap(), 1);
    }

    #[tokio::test]
    async fn rtl_text_sets_flow_base_direction() {
        let inputs = vec![InputDescriptor::in_memory(
            "he.txt",
            "שלום עולם\nHello".as_bytes().to_vec(),
        )];
        let outcome = pipeline().run(inputs, TargetKind::FlowDocument).await.unwrap();

        assert_eq!(outcome.status, Status::Success);
        let xml = document_xml(&outcome.output_bytes);
        assert!(xml.contains("<w:bidi/></w:sectPr>"));
        assert!(xml.contains(r#"<w:bidi w:val="0"/>"#));
    }

    #[tokio::test]
    async fn ltr_text_sets_no_direction_flags() {
        let inputs = vec![InputDescriptor::in_memory("en.txt", b"Hello\nWorld".to_vec())];
        let outcome = pipeline().run(inputs, TargetKind::FlowDocument).await.unwrap();
        assert!(!document_xml(&outcome.output_bytes).contains("w:bidi"));
    }

    #[tokio::test]
    async fn flow_sections_follow_input_order() {
        for parallel in [true, false] {
            let config = MergeConfig {
                parallel_extraction: parallel,
                ..MergeConfig::default()
            };
            let inputs = vec![
                InputDescriptor::in_memory("a.txt", b"alpha".to_vec()),
                InputDescriptor::in_memory("b.docx", docx(&["bravo"])),
                InputDescriptor::in_memory("c.pdf", two_page_pdf()),
            ];
            let outcome = Pipeline::new(config)
                .run(inputs, TargetKind::FlowDocument)
                .await
                .unwrap();

            let text = flow_text(&outcome.output_bytes);
            let a = text.find("=== a.txt ===").unwrap();
            let b = text.find("=== b.docx ===").unwrap();
            let c = text.find("=== c.pdf ===").unwrap();
            assert!(a < b && b < c, "{text}");
            assert!(text.contains("alpha") && text.contains("bravo"));
        }
    }

    #[tokio::test]
    async fn unknown_kind_is_rendered_without_losing_status() {
        let inputs = vec![InputDescriptor::in_memory("notes.xyz", b"plain words".to_vec())];
        let outcome = pipeline().run(inputs, TargetKind::Paged).await.unwrap();

        assert_eq!(outcome.status, Status::Success);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::ClassificationAmbiguous);
        assert_eq!(LopdfCodec.verify(&outcome.output_bytes).unwrap(), 1);
    }

    #[tokio::test]
    async fn file_inputs_are_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, two_page_pdf()).unwrap();

        let outcome = pipeline()
            .run(vec![InputDescriptor::file(&path)], TargetKind::Paged)
            .await
            .unwrap();
        assert_eq!(outcome.status, Status::Success);
        assert_eq!(LopdfCodec.verify(&outcome.output_bytes).unwrap(), 2);
    }

    struct PanickingExtractor;

    impl GenericTextExtractor for PanickingExtractor {
        fn extract_text(&self, _bytes: &[u8], _kind: Kind) -> Result<String> {
            panic!("extractor bug");
        }
    }

    #[tokio::test]
    async fn panicking_extraction_is_absorbed() {
        let pipeline = pipeline().with_text_extractor(Arc::new(PanickingExtractor));
        let inputs = vec![InputDescriptor::in_memory("a.txt", b"alpha".to_vec())];

        let outcome = pipeline.run(inputs, TargetKind::FlowDocument).await.unwrap();
        assert_eq!(outcome.status, Status::Fallback);
        assert!(DocxCodec::default().verify(&outcome.output_bytes).unwrap() >= 1);

        let inputs = vec![InputDescriptor::in_memory("a.txt", b"alpha".to_vec())];
        let outcome = pipeline.run(inputs, TargetKind::Paged).await.unwrap();
        assert_eq!(outcome.status, Status::Fallback);
        assert_eq!(LopdfCodec.verify(&outcome.output_bytes).unwrap(), 1);
    }
}
