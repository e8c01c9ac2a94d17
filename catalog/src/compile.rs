//! Compilation of source-form models into the precompiled artifact form.
//!
//! A source artifact is a YAML [`SchemaModel`] (`<name>.yaml`). Compiling it
//! validates the model and writes it as gzip-compressed JSON
//! (`<name>.lmc`), which [`ResourceDirectory`](crate::ResourceDirectory)
//! prefers when both forms exist.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use rayon::prelude::*;
use store_ladder_core::{SchemaModel, validate_model};
use tracing::{debug, info};

use crate::error::{CatalogError, Result};

/// Extension of precompiled model artifacts.
pub const COMPILED_EXTENSION: &str = "lmc";
/// Extension of source-form model artifacts.
pub const SOURCE_EXTENSION: &str = "yaml";

/// Reads a source-form model.
pub fn read_source(path: &Path) -> Result<SchemaModel> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_yaml::from_reader(reader)?)
}

/// Reads a precompiled model.
pub fn read_compiled(path: &Path) -> Result<SchemaModel> {
    let decoder = GzDecoder::new(BufReader::new(File::open(path)?));
    serde_json::from_reader(decoder).map_err(|e| {
        if e.is_io() {
            CatalogError::CompressionError(format!("{}: {e}", path.display()))
        } else {
            CatalogError::JsonError(e)
        }
    })
}

/// Writes `model` as a precompiled artifact at `path`.
pub fn write_compiled(model: &SchemaModel, path: &Path) -> Result<()> {
    let mut encoder = GzEncoder::new(BufWriter::new(File::create(path)?), Compression::default());
    serde_json::to_writer(&mut encoder, model)?;
    let mut writer = encoder
        .finish()
        .map_err(|e| CatalogError::CompressionError(e.to_string()))?;
    writer.flush()?;
    Ok(())
}

/// Compiles one source artifact into `output_dir` and returns the written path.
///
/// # Errors
///
/// Returns [`CatalogError::InvalidModel`] if the model fails validation; no
/// artifact is written in that case.
pub fn compile_model(input: &Path, output_dir: &Path) -> Result<PathBuf> {
    let model = read_source(input)?;
    let errors = validate_model(&model);
    if !errors.is_empty() {
        return Err(CatalogError::InvalidModel {
            name: input.display().to_string(),
            errors,
        });
    }

    let stem = input.file_stem().ok_or_else(|| {
        CatalogError::InvalidConfig(format!("{} has no file name", input.display()))
    })?;
    let output = output_dir.join(format!(
        "{}.{COMPILED_EXTENSION}",
        stem.to_string_lossy()
    ));
    std::fs::create_dir_all(output_dir)?;
    write_compiled(&model, &output)?;
    debug!(input = %input.display(), output = %output.display(), "compiled model");
    Ok(output)
}

/// Compiles every input in parallel.
///
/// Results are returned in input order, one per input.
pub fn compile_all(inputs: &[PathBuf], output_dir: &Path) -> Vec<(PathBuf, Result<PathBuf>)> {
    let results: Vec<(PathBuf, Result<PathBuf>)> = inputs
        .par_iter()
        .map(|input| (input.clone(), compile_model(input, output_dir)))
        .collect();

    let compiled = results.iter().filter(|(_, r)| r.is_ok()).count();
    info!(compiled, total = inputs.len(), "compilation finished");
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use store_ladder_core::{AttributeDescription, AttributeType, EntityDescription};
    use tempfile::TempDir;

    fn model() -> SchemaModel {
        SchemaModel::new("Notes").with_entity(
            EntityDescription::new("Note")
                .with_attribute(AttributeDescription::required("title", AttributeType::Text)),
        )
    }

    #[test]
    fn test_compile_writes_readable_artifact() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("Notes.yaml");
        std::fs::write(&input, serde_yaml::to_string(&model()).unwrap()).unwrap();

        let output = compile_model(&input, &dir.path().join("out")).unwrap();

        assert_eq!(output, dir.path().join("out/Notes.lmc"));
        assert_eq!(read_compiled(&output).unwrap(), model());
    }

    #[test]
    fn test_compile_keeps_dotted_stems_apart() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        for name in ["Notes.v2.yaml", "Notes.v3.yaml"] {
            let input = dir.path().join(name);
            std::fs::write(&input, serde_yaml::to_string(&model()).unwrap()).unwrap();
            compile_model(&input, &out).unwrap();
        }

        assert!(out.join("Notes.v2.lmc").is_file());
        assert!(out.join("Notes.v3.lmc").is_file());
        assert!(!out.join("Notes.lmc").exists());
    }

    #[test]
    fn test_compile_rejects_invalid_model() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("Bad.yaml");
        let bad = SchemaModel::new("Bad").with_entity(EntityDescription::new("ladder_x"));
        std::fs::write(&input, serde_yaml::to_string(&bad).unwrap()).unwrap();

        let err = compile_model(&input, dir.path()).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidModel { .. }));
        assert!(!dir.path().join("Bad.lmc").exists());
    }

    #[test]
    fn test_corrupt_artifact_is_compression_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Notes.lmc");
        std::fs::write(&path, b"not gzip").unwrap();
        assert!(matches!(
            read_compiled(&path),
            Err(CatalogError::CompressionError(_))
        ));
    }

    #[test]
    fn test_compile_all_keeps_input_order() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("Notes.yaml");
        std::fs::write(&good, serde_yaml::to_string(&model()).unwrap()).unwrap();
        let missing = dir.path().join("Missing.yaml");

        let results = compile_all(&[good.clone(), missing.clone()], &dir.path().join("out"));

        assert_eq!(results[0].0, good);
        assert!(results[0].1.is_ok());
        assert_eq!(results[1].0, missing);
        assert!(results[1].1.is_err());
    }
}
