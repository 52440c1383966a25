// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Localised text for diagnostic documents.
//
// Failures are explained inside the document body, so every message the
// pipeline can substitute lives here in each supported language.

use serde::{Deserialize, Serialize};

/// Language of diagnostic documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    English,
    Hebrew,
}

/// Every explanation a diagnostic document can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    NoFilesProvided,
    NoValidFiles,
    NothingProcessable,
    NoPagesMerged,
    MergeVerificationFailed,
    NoContentExtracted,
    ProcessingError,
    /// Composer fallback when the flow document cannot be built.
    DocumentCreationFailed,
    /// Heading of the diagnostic paged document.
    SystemMessageTitle,
    /// Footer prefix followed by the creation date.
    CreatedOn,
}

impl Message {
    pub fn text(&self, locale: Locale) -> &'static str {
        match locale {
            Locale::English => self.english(),
            Locale::Hebrew => self.hebrew(),
        }
    }

    fn english(&self) -> &'static str {
        match self {
            Self::NoFilesProvided => "No files were provided for merging",
            Self::NoValidFiles => "No valid files were found for merging",
            Self::NothingProcessable => "No valid files could be processed",
            Self::NoPagesMerged => {
                "None of the pages from the supplied files could be merged. Check that the PDF files are valid."
            }
            Self::MergeVerificationFailed => {
                "An error occurred during merging. A replacement file was created."
            }
            Self::NoContentExtracted => "No content could be extracted from the provided files",
            Self::ProcessingError => "Error occurred during file processing",
            Self::DocumentCreationFailed => "Error occurred while creating document",
            Self::SystemMessageTitle => "System Message",
            Self::CreatedOn => "Created:",
        }
    }

    fn hebrew(&self) -> &'static str {
        match self {
            Self::NoFilesProvided => "לא סופקו קבצים למיזוג",
            Self::NoValidFiles => "לא נמצאו קבצים תקינים למיזוג",
            Self::NothingProcessable => "לא ניתן היה לעבד אף אחד מהקבצים",
            Self::NoPagesMerged => {
                "לא ניתן היה למזג אף עמוד מהקבצים שסופקו. בדוק את תקינות קבצי ה-PDF."
            }
            Self::MergeVerificationFailed => "אירעה שגיאה בתהליך המיזוג. נוצר קובץ תחליפי.",
            Self::NoContentExtracted => "לא ניתן היה לחלץ תוכן מהקבצים שסופקו",
            Self::ProcessingError => "אירעה שגיאה בעת עיבוד הקבצים",
            Self::DocumentCreationFailed => "אירעה שגיאה ביצירת המסמך",
            Self::SystemMessageTitle => "הודעת מערכת",
            Self::CreatedOn => "נוצר בתאריך:",
        }
    }
}
