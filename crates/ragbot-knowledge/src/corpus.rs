//! Corpus store — the pre-embedded passages, loaded once at startup.
//!
//! Source format is a CSV file with a header row containing at least a
//! `text` column and an `embedding` column. The embedding cell holds a
//! serialized list of numbers (`[0.01, -0.2, ...]`) and is parsed as JSON,
//! never evaluated. Extra columns are ignored.

use std::io;
use std::path::Path;

use ragbot_core::error::{RagBotError, Result};

const TEXT_COLUMN: &str = "text";
const EMBEDDING_COLUMN: &str = "embedding";

/// One passage and its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusEntry {
    pub text: String,
    pub embedding: Vec<f32>,
}

impl CorpusEntry {
    pub fn new(text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            text: text.into(),
            embedding,
        }
    }
}

/// Immutable, validated collection of passages sharing one dimensionality.
#[derive(Debug, Clone)]
pub struct Corpus {
    entries: Vec<CorpusEntry>,
    dimensions: usize,
}

impl Corpus {
    /// Load and validate a corpus CSV.
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            RagBotError::CorpusLoad(format!("cannot open {}: {e}", path.display()))
        })?;
        let corpus = Self::from_reader(io::BufReader::new(file))?;
        tracing::info!(
            "📚 Corpus loaded: {} passages × {} dims from {}",
            corpus.len(),
            corpus.dimensions(),
            path.display()
        );
        Ok(corpus)
    }

    /// Parse a corpus from any CSV source.
    pub fn from_reader<R: io::Read>(source: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(source);

        let headers = reader
            .headers()
            .map_err(|e| RagBotError::CorpusLoad(format!("unreadable header row: {e}")))?
            .clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| RagBotError::CorpusLoad(format!("missing '{name}' column")))
        };
        let text_col = column(TEXT_COLUMN)?;
        let embedding_col = column(EMBEDDING_COLUMN)?;

        let mut entries = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let row = idx + 1;
            let record =
                record.map_err(|e| RagBotError::CorpusLoad(format!("row {row}: {e}")))?;
            let text = record.get(text_col).ok_or_else(|| {
                RagBotError::CorpusLoad(format!("row {row}: missing '{TEXT_COLUMN}' cell"))
            })?;
            let raw = record.get(embedding_col).ok_or_else(|| {
                RagBotError::CorpusLoad(format!("row {row}: missing '{EMBEDDING_COLUMN}' cell"))
            })?;
            let embedding = parse_embedding(raw)
                .map_err(|e| RagBotError::CorpusLoad(format!("row {row}: {e}")))?;
            entries.push(CorpusEntry::new(text, embedding));
        }

        Self::from_entries(entries)
    }

    /// Validate already-parsed entries.
    pub fn from_entries(entries: Vec<CorpusEntry>) -> Result<Self> {
        let first = entries
            .first()
            .ok_or_else(|| RagBotError::CorpusLoad("corpus contains no passages".into()))?;
        let dimensions = first.embedding.len();
        if dimensions == 0 {
            return Err(RagBotError::CorpusLoad("row 1: empty embedding".into()));
        }

        for (idx, entry) in entries.iter().enumerate() {
            if entry.embedding.len() != dimensions {
                return Err(RagBotError::CorpusIntegrity(format!(
                    "row {} has {} dimensions, expected {}",
                    idx + 1,
                    entry.embedding.len(),
                    dimensions
                )));
            }
            if entry.embedding.iter().any(|v| !v.is_finite()) {
                return Err(RagBotError::CorpusIntegrity(format!(
                    "row {} has a non-finite embedding component",
                    idx + 1
                )));
            }
        }

        Ok(Self {
            entries,
            dimensions,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Length of every embedding in the corpus.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn entries(&self) -> &[CorpusEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&CorpusEntry> {
        self.entries.get(index)
    }
}

/// Parse a serialized vector like `[0.1, -2e-3]`.
fn parse_embedding(raw: &str) -> std::result::Result<Vec<f32>, String> {
    let values: Vec<f64> = serde_json::from_str(raw.trim())
        .map_err(|e| format!("embedding is not a numeric list: {e}"))?;
    if values.is_empty() {
        return Err("empty embedding".into());
    }
    Ok(values.into_iter().map(|v| v as f32).collect())
}
