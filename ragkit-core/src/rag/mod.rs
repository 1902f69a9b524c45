//! RAG (Retrieval-Augmented Generation) pipeline.

pub mod answer;
pub mod context;
pub mod ingest;
pub mod pipeline;
pub mod retriever;

pub use answer::{AnswerResult, Confidence, FormattedAnswer};
pub use context::AssembledContext;
pub use ingest::{Document, IngestReport, Ingestor, load_documents};
pub use pipeline::RagPipeline;
pub use retriever::{RetrievedPassage, Retriever};
