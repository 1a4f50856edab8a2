//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api;
use crate::config::AppConfig;
use reggraph_core::{
    Artifact, GraphError, PipelineInput, ScriptedExtractor, Session, SessionMetrics,
    artifact_hash, resolver::ResolverSummary,
};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a regulation text (100 MB).
const MAX_INPUT_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum size of a recorded extractor response file (100 MB).
const MAX_RESPONSES_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum size of an artifact (500 MB).
///
/// Artifacts carry the whole graph plus every report, so they are allowed
/// to be larger than the inputs.
const MAX_ARTIFACT_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), GraphError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| GraphError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(GraphError::InvalidInput(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Canonicalize an input path and require it to be a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, GraphError> {
    let canonical = path.canonicalize().map_err(|e| {
        GraphError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(GraphError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Canonicalize the parent of an output path, which must already exist.
fn validate_output_path(path: &Path) -> Result<PathBuf, GraphError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let canonical_parent = parent.canonicalize().map_err(|e| {
        GraphError::Io(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(GraphError::Io(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| GraphError::Io("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

/// Read an artifact after path and size checks.
pub fn load_artifact(path: &Path) -> Result<Artifact, GraphError> {
    let path = validate_file_path(path)?;
    validate_file_size(&path, MAX_ARTIFACT_FILE_SIZE)?;
    Artifact::read_from(&path)
}

/// Reopen a session from an artifact with the configured resolver.
pub fn load_session(config: &AppConfig, path: &Path) -> Result<Session, GraphError> {
    let artifact = load_artifact(path)?;
    Session::from_artifact(artifact, config.resolver.clone())
}

// =============================================================================
// REPORTING
// =============================================================================

fn print_summary(
    heading: &str,
    artifact: &Path,
    metrics: &SessionMetrics,
    resolver: &ResolverSummary,
    warnings: &[String],
    json_mode: bool,
) {
    if json_mode {
        let output = serde_json::json!({
            "artifact": artifact.to_string_lossy(),
            "metrics": metrics,
            "resolver": resolver,
            "warnings": warnings,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return;
    }

    println!("{}", heading);
    println!("{}", "=".repeat(heading.chars().count()));
    println!("Artifact: {}", artifact.display());
    println!();
    println!("Nodes:              {}", metrics.node_count);
    println!("Edges:              {}", metrics.edge_count);
    println!("Pending references: {}", metrics.pending_ref_count);
    for (reason, count) in &metrics.pending_by_reason {
        println!("  {:<18}{}", reason, count);
    }
    println!("FZ questions:       {}", metrics.fz_question_count);
    println!("Placeholders:       {}", metrics.placeholder_count);
    println!("Malformed:          {}", metrics.malformed_count);
    println!(
        "Resolver:           {} in, {} resolved, {} unresolved",
        resolver.input_count, resolver.resolved_count, resolver.unresolved_count
    );
    if !warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in warnings {
            println!("  - {}", warning);
        }
    }
}

// =============================================================================
// RUN COMMAND
// =============================================================================

/// Run the pipeline and write the artifact.
pub fn cmd_run(
    config: &AppConfig,
    input_path: Option<&Path>,
    responses: Option<&Path>,
    output_path: &Path,
    json_mode: bool,
) -> Result<(), GraphError> {
    // A missing input falls back to the built-in document inside the pipeline.
    if let Some(path) = input_path.filter(|p| p.exists()) {
        validate_file_size(path, MAX_INPUT_FILE_SIZE)?;
    }

    let extractor = match responses {
        Some(path) => {
            let path = validate_file_path(path)?;
            validate_file_size(&path, MAX_RESPONSES_FILE_SIZE)?;
            ScriptedExtractor::from_path(&path)?
        }
        None => ScriptedExtractor::new(),
    };
    tracing::info!(responses = extractor.len(), "extractor ready");

    let mut session = Session::with_config(config.resolver.clone());
    let input = PipelineInput {
        input_path: input_path.map(Path::to_path_buf),
    };
    session.run_pipeline(&input, &extractor)?;
    session.artifact().write_to(output_path)?;

    print_summary(
        "Pipeline Complete",
        output_path,
        &session.metrics(),
        &session.resolution().summary,
        &session.validation().warnings,
        json_mode,
    );
    Ok(())
}

// =============================================================================
// RESOLVE COMMAND
// =============================================================================

/// Re-run the resolver over a saved artifact.
pub fn cmd_resolve(
    config: &AppConfig,
    artifact_path: &Path,
    output_path: &Path,
    json_mode: bool,
) -> Result<(), GraphError> {
    let mut session = load_session(config, artifact_path)?;
    let output = validate_output_path(output_path)?;

    session.resolve();
    session.validate();
    session.artifact().write_to(&output)?;

    print_summary(
        "Resolver Pass Complete",
        &output,
        &session.metrics(),
        &session.resolution().summary,
        &session.validation().warnings,
        json_mode,
    );
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show artifact status.
pub fn cmd_status(
    config: &AppConfig,
    artifact_path: &Path,
    json_mode: bool,
) -> Result<(), GraphError> {
    let session = load_session(config, artifact_path)?;

    print_summary(
        "reggraph Artifact Status",
        artifact_path,
        &session.metrics(),
        &session.resolution().summary,
        &session.validation().warnings,
        json_mode,
    );
    Ok(())
}

// =============================================================================
// HASH COMMAND
// =============================================================================

/// Compute the BLAKE3 hash of an artifact.
pub fn cmd_hash(artifact_path: &Path, json_mode: bool) -> Result<(), GraphError> {
    let artifact = load_artifact(artifact_path)?;
    let hash = artifact_hash(&artifact)?;

    if json_mode {
        let output = serde_json::json!({
            "artifact": artifact_path.to_string_lossy(),
            "algorithm": "blake3",
            "hash": hash,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
    } else {
        println!("BLAKE3: {}", hash);
    }
    Ok(())
}

// =============================================================================
// SERVE COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_serve(
    config: &AppConfig,
    host: &str,
    port: u16,
    artifact: Option<&Path>,
) -> Result<(), GraphError> {
    let session = match artifact {
        Some(path) => load_session(config, path)?,
        None => Session::with_config(config.resolver.clone()),
    };

    println!("reggraph HTTP service starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    match artifact {
        Some(path) => println!("  Artifact: {}", path.display()),
        None => println!("  Artifact: (empty store)"),
    }
    println!();
    println!("Endpoints:");
    println!("  GET  /health   - Health check");
    println!("  GET  /status   - Store counts");
    println!("  POST /batch    - Submit a candidate batch");
    println!("  POST /resolve  - Run the reference resolver");
    println!("  GET  /artifact - Current artifact");
    println!("  GET  /hash     - BLAKE3 hash of the artifact");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, session).await
}

// =============================================================================
// TESTS
// =============================================================================
