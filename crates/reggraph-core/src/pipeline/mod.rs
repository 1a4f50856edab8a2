//! # Pipeline
//!
//! Sequential, typed phases that build a graph from a regulatory document:
//!
//! 1. `ingestion`  - text into paragraphs, appendices, traversal plan
//! 2. `appendix`   - appendix index into sections, groups, fields
//! 3. `extraction` - extractor responses into candidate batches
//! 4. resolution   - pending citations into `REFERENCES` edges
//! 5. `validation` - counts and warnings
//!
//! Each phase reads the outputs of earlier phases from `PipelineContext`
//! and writes its own typed result there. Phases run in this order, once.

pub mod appendix;
pub mod docx;
pub mod extraction;
pub mod ingestion;
pub mod validation;

use crate::GraphError;
use crate::graph::GraphStore;
use crate::resolver::{ReferenceResolver, ResolverOutput};
use appendix::AppendixOutput;
use extraction::{ExtractionReport, Extractor};
use ingestion::IngestionOutput;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use validation::ValidationReport;

/// The phases in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Ingestion,
    Appendix,
    Extraction,
    Resolution,
    Validation,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Ingestion,
        Phase::Appendix,
        Phase::Extraction,
        Phase::Resolution,
        Phase::Validation,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ingestion => "ingestion",
            Self::Appendix => "appendix",
            Self::Extraction => "extraction",
            Self::Resolution => "reference_resolver",
            Self::Validation => "validation",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the caller hands the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineInput {
    /// Plain-text source document. `None` runs on the built-in document.
    pub input_path: Option<PathBuf>,
}

/// Typed results accumulated phase by phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineContext {
    pub input_path: String,
    pub ingestion: Option<IngestionOutput>,
    pub appendix: Option<AppendixOutput>,
    pub extraction: Option<ExtractionReport>,
    pub resolver: Option<ResolverOutput>,
    pub validation: Option<ValidationReport>,
}

/// Runs the five phases against one store.
pub struct Pipeline<'a, E: Extractor + ?Sized> {
    extractor: &'a E,
    resolver: ReferenceResolver,
}

impl<'a, E: Extractor + ?Sized> Pipeline<'a, E> {
    #[must_use]
    pub fn new(extractor: &'a E, resolver: ReferenceResolver) -> Self {
        Self {
            extractor,
            resolver,
        }
    }

    /// Run every phase in order. The first phase error aborts the run; the
    /// store keeps whatever earlier phases wrote.
    pub fn run<G: GraphStore>(
        &self,
        graph: &mut G,
        input: &PipelineInput,
    ) -> Result<PipelineContext, GraphError> {
        let mut ctx = PipelineContext {
            input_path: input
                .input_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            ..PipelineContext::default()
        };

        for phase in Phase::ALL {
            let _span = tracing::info_span!("phase", name = phase.name()).entered();
            self.run_phase(phase, graph, input, &mut ctx)?;
        }
        Ok(ctx)
    }

    fn run_phase<G: GraphStore>(
        &self,
        phase: Phase,
        graph: &mut G,
        input: &PipelineInput,
        ctx: &mut PipelineContext,
    ) -> Result<(), GraphError> {
        match phase {
            Phase::Ingestion => {
                ctx.ingestion = Some(ingestion::ingest_path(input.input_path.as_deref())?);
            }
            Phase::Appendix => {
                let appendices = ctx
                    .ingestion
                    .as_ref()
                    .map(|i| i.appendices.as_slice())
                    .unwrap_or_default();
                ctx.appendix = Some(appendix::build_structure(graph, appendices)?);
            }
            Phase::Extraction => {
                let fallback;
                let ingested = match &ctx.ingestion {
                    Some(i) => i,
                    None => {
                        fallback = IngestionOutput::default();
                        &fallback
                    }
                };
                ctx.extraction = Some(extraction::run_extraction(graph, ingested, self.extractor)?);
            }
            Phase::Resolution => {
                ctx.resolver = Some(self.resolver.resolve(graph));
            }
            Phase::Validation => {
                let state = graph.snapshot();
                let ingest = ctx.extraction.as_ref().map(|e| &e.ingest);
                ctx.validation = Some(validation::validate_state(&state, ingest));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use extraction::ScriptedExtractor;

    #[test]
    fn phase_names_are_stable() {
        let names: Vec<_> = Phase::ALL.iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec![
                "ingestion",
                "appendix",
                "extraction",
                "reference_resolver",
                "validation"
            ]
        );
    }

    #[test]
    fn default_run_fills_every_phase() {
        let extractor = ScriptedExtractor::new();
        let pipeline = Pipeline::new(&extractor, ReferenceResolver::default());
        let mut graph = Graph::new();

        let ctx = pipeline
            .run(&mut graph, &PipelineInput::default())
            .expect("pipeline");

        assert!(ctx.ingestion.is_some());
        assert_eq!(ctx.appendix.as_ref().map(|a| a.section_ids.len()), Some(1));
        assert_eq!(ctx.extraction.as_ref().map(|e| e.llm_calls.len()), Some(1));
        let validation = ctx.validation.expect("validation");
        assert_eq!(validation.node_count, graph.node_count());
        assert_eq!(validation.edge_count, graph.edge_count());
    }
}
