//! # Session Module
//!
//! Session management combining a `Graph` with the reports that describe it.
//!
//! A session is the handle the CLI and the HTTP service hold. It owns one
//! store, the resolver configuration, and the accumulated extraction,
//! resolver and validation reports, so that an artifact can be produced at
//! any point.

use crate::export::{Artifact, ArtifactMeta};
use crate::graph::{Graph, GraphStore};
use crate::ingestor::{CandidateBatch, IngestReport, Ingestor};
use crate::pipeline::extraction::{ExtractionReport, Extractor};
use crate::pipeline::validation::{ValidationReport, validate_state};
use crate::pipeline::{Pipeline, PipelineContext, PipelineInput};
use crate::resolver::{ReferenceResolver, ResolverConfig, ResolverOutput};
use crate::{GraphError, UnresolvedReason};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Point-in-time counters of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub node_count: usize,
    pub edge_count: usize,
    pub pending_ref_count: usize,
    pub fz_question_count: usize,
    pub placeholder_count: usize,
    pub malformed_count: usize,
    /// Pending references per reason; never-resolved entries are `unresolved`.
    pub pending_by_reason: BTreeMap<String, usize>,
}

/// A Session combines a Graph with its run reports.
#[derive(Debug, Default)]
pub struct Session {
    graph: Graph,
    resolver: ReferenceResolver,
    input_path: String,
    extraction: ExtractionReport,
    resolution: ResolverOutput,
    validation: ValidationReport,
}

impl Session {
    /// Create a new empty session with the default resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty session with a custom resolver configuration.
    #[must_use]
    pub fn with_config(config: ResolverConfig) -> Self {
        Self {
            resolver: ReferenceResolver::new(config),
            ..Self::default()
        }
    }

    /// Reopen a session from a persisted artifact, keeping its reports.
    pub fn from_artifact(artifact: Artifact, config: ResolverConfig) -> Result<Self, GraphError> {
        let graph = Graph::from_state(artifact.state)?;
        Ok(Self {
            graph,
            resolver: ReferenceResolver::new(config),
            input_path: artifact.meta.input_path,
            extraction: artifact.meta.extraction_report,
            resolution: artifact.meta.resolver_report,
            validation: artifact.meta.validation_report,
        })
    }

    /// The underlying store.
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The active resolver configuration.
    #[must_use]
    pub fn resolver_config(&self) -> &ResolverConfig {
        self.resolver.config()
    }

    /// Last resolver output.
    #[must_use]
    pub fn resolution(&self) -> &ResolverOutput {
        &self.resolution
    }

    /// Last validation report.
    #[must_use]
    pub fn validation(&self) -> &ValidationReport {
        &self.validation
    }

    /// Run the full pipeline into this session's store.
    pub fn run_pipeline<E: Extractor + ?Sized>(
        &mut self,
        input: &PipelineInput,
        extractor: &E,
    ) -> Result<PipelineContext, GraphError> {
        let pipeline = Pipeline::new(extractor, self.resolver.clone());
        let ctx = pipeline.run(&mut self.graph, input)?;

        self.input_path = ctx.input_path.clone();
        if let Some(extraction) = &ctx.extraction {
            self.extraction = extraction.clone();
        }
        if let Some(resolution) = &ctx.resolver {
            self.resolution = resolution.clone();
        }
        if let Some(validation) = &ctx.validation {
            self.validation = validation.clone();
        }
        Ok(ctx)
    }

    /// Apply one candidate batch.
    pub fn submit_batch(&mut self, batch: &CandidateBatch) -> Result<IngestReport, GraphError> {
        let report = Ingestor::apply(&mut self.graph, batch)?;
        self.extraction.record_batch(batch, report.clone());
        Ok(report)
    }

    /// Run a resolver pass over the current pending references.
    pub fn resolve(&mut self) -> &ResolverOutput {
        self.resolution = self.resolver.resolve(&mut self.graph);
        &self.resolution
    }

    /// Recompute the validation report.
    pub fn validate(&mut self) -> &ValidationReport {
        self.validation = validate_state(&self.graph.snapshot(), Some(&self.extraction.ingest));
        &self.validation
    }

    /// Current counters.
    #[must_use]
    pub fn metrics(&self) -> SessionMetrics {
        let mut pending_by_reason = BTreeMap::new();
        for reference in self.graph.pending_references() {
            let key = reference
                .reason
                .map_or("unresolved", UnresolvedReason::as_str);
            *pending_by_reason.entry(key.to_string()).or_insert(0) += 1;
        }

        SessionMetrics {
            node_count: self.graph.node_count(),
            edge_count: self.graph.edge_count(),
            pending_ref_count: self.graph.pending_references().len(),
            fz_question_count: self.graph.fz_questions().len(),
            placeholder_count: self.extraction.ingest.placeholders.len(),
            malformed_count: self.extraction.ingest.malformed.len(),
            pending_by_reason,
        }
    }

    /// Snapshot the store and reports as an artifact.
    #[must_use]
    pub fn artifact(&self) -> Artifact {
        Artifact::new(
            self.graph.snapshot(),
            ArtifactMeta {
                input_path: self.input_path.clone(),
                validation_report: self.validation.clone(),
                extraction_report: self.extraction.clone(),
                resolver_report: self.resolution.clone(),
            },
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestor::{NodeCandidate, ReferenceCandidate};
    use crate::pipeline::extraction::ScriptedExtractor;
    use crate::types::props;

    fn batch() -> CandidateBatch {
        CandidateBatch {
            nodes: vec![
                NodeCandidate {
                    node_type: "document".into(),
                    natural_key: "decision".into(),
                    properties: props([("name", "Решение о выпуске"), ("legal_ref", "706-П")]),
                },
                NodeCandidate {
                    node_type: "registration_action".into(),
                    natural_key: "action:submit".into(),
                    properties: props([("name", "Подача документов"), ("legal_ref", "706-П")]),
                },
            ],
            references: vec![ReferenceCandidate {
                source_natural_key: "action:submit".into(),
                ref_text: "решение о выпуске".into(),
                context: props([("legal_ref", "706-П, гл. 2")]),
            }],
            ..CandidateBatch::default()
        }
    }

    #[test]
    fn submit_then_resolve() {
        let mut session = Session::new();
        let report = session.submit_batch(&batch()).expect("submit");
        assert_eq!(report.nodes_upserted, 2);
        assert_eq!(session.metrics().pending_by_reason.get("unresolved"), Some(&1));

        let output = session.resolve();
        assert_eq!(output.summary.resolved_count, 1);
        assert_eq!(session.metrics().pending_ref_count, 0);
        assert_eq!(session.metrics().edge_count, 1);
    }

    #[test]
    fn repeated_submission_is_idempotent() {
        let mut session = Session::new();
        session.submit_batch(&batch()).expect("first");
        session.submit_batch(&batch()).expect("second");
        assert_eq!(session.metrics().node_count, 2);
        // Citations are not deduplicated.
        assert_eq!(session.metrics().pending_ref_count, 2);
    }

    #[test]
    fn validate_tracks_store() {
        let mut session = Session::new();
        session.submit_batch(&batch()).expect("submit");
        let report = session.validate().clone();
        assert_eq!(report.node_count, 2);
        assert_eq!(report.pending_ref_count, 1);
    }

    #[test]
    fn artifact_round_trips_through_session() {
        let mut session = Session::new();
        session
            .run_pipeline(&PipelineInput::default(), &ScriptedExtractor::new())
            .expect("pipeline");

        let artifact = session.artifact();
        let reopened =
            Session::from_artifact(artifact.clone(), ResolverConfig::default()).expect("reopen");
        assert_eq!(reopened.artifact(), artifact);
        assert_eq!(reopened.metrics(), session.metrics());
    }

    #[test]
    fn custom_config_is_kept() {
        let config = ResolverConfig {
            min_token_len: 5,
            ..ResolverConfig::default()
        };
        let session = Session::with_config(config.clone());
        assert_eq!(session.resolver_config(), &config);
    }
}
