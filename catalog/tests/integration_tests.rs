//! Integration tests: resource directories driving the version catalog and resolver.

use std::fs;
use std::path::Path;

use store_ladder_catalog::{
    LadderConfig, MappingArtifact, ResourceDirectory, compile_model, read_compiled,
};
use store_ladder_core::{
    AttributeDescription, AttributeType, EntityDescription, EntityMapping, SchemaModel,
    ValueExpression,
};
use store_ladder_engine::{
    MappingOrigin, MigrationError, SchemaSource, StepBuilder, TransformationResolver,
    VersionCatalog,
};
use tempfile::TempDir;

fn v1() -> SchemaModel {
    SchemaModel::new("Notes").with_entity(
        EntityDescription::new("Note")
            .with_attribute(AttributeDescription::required("title", AttributeType::Text)),
    )
}

fn v2() -> SchemaModel {
    SchemaModel::new("Notes_2").with_entity(
        EntityDescription::new("Note")
            .with_attribute(AttributeDescription::required("title", AttributeType::Text))
            .with_attribute(AttributeDescription::optional("body", AttributeType::Text)),
    )
}

/// Version 3 changes `title` to an integer, which only an explicit mapping can handle.
fn v3() -> SchemaModel {
    SchemaModel::new("Notes_3").with_entity(
        EntityDescription::new("Note")
            .with_attribute(AttributeDescription::required("title", AttributeType::Integer))
            .with_attribute(AttributeDescription::optional("body", AttributeType::Text)),
    )
}

fn write_yaml(dir: &Path, name: &str, model: &SchemaModel) {
    fs::write(
        dir.join(format!("{name}.yaml")),
        serde_yaml::to_string(model).unwrap(),
    )
    .unwrap();
}

fn populate(dir: &Path) {
    write_yaml(dir, "Notes", &v1());
    write_yaml(dir, "Notes_2", &v2());
    write_yaml(dir, "Notes_3", &v3());
}

fn write_v2_to_v3_mapping(dir: &Path) {
    let artifact = MappingArtifact {
        source: "Notes_2".into(),
        destination: "Notes_3".into(),
        entity_mappings: vec![
            EntityMapping::transform("Note", "Note")
                .with_attribute("title", ValueExpression::Source("title".into()))
                .with_attribute("body", ValueExpression::Source("body".into()))
                .with_policy("TitleLength"),
        ],
    };
    fs::write(
        dir.join("Notes_2_to_Notes_3.mapping.yaml"),
        serde_yaml::to_string(&artifact).unwrap(),
    )
    .unwrap();
}

#[test]
fn test_catalog_detects_versions_from_directory() {
    let dir = TempDir::new().unwrap();
    populate(dir.path());
    let resources = ResourceDirectory::new(dir.path());

    assert_eq!(resources.latest_version("Notes").unwrap(), 3);
    let catalog = VersionCatalog::load(&resources, "Notes", None).unwrap();
    assert_eq!(catalog.latest_version().name(), "Notes_3");
}

#[test]
fn test_catalog_rejects_claimed_version_without_artifact() {
    let dir = TempDir::new().unwrap();
    populate(dir.path());
    let resources = ResourceDirectory::new(dir.path());

    let err = VersionCatalog::load(&resources, "Notes", Some(4)).unwrap_err();
    assert!(matches!(
        err,
        MigrationError::MissingSchemaArtifact { number: 4, .. }
    ));
}

#[test]
fn test_explicit_mapping_file_resolves_and_is_qualified() {
    let dir = TempDir::new().unwrap();
    populate(dir.path());
    write_v2_to_v3_mapping(dir.path());
    let resources = ResourceDirectory::new(dir.path());

    let catalog = VersionCatalog::load(&resources, "Notes", None).unwrap();
    let resolver = TransformationResolver::new(resources).with_namespace("Notes App");
    let steps = StepBuilder::new(&catalog, &resolver)
        .build_steps(catalog.first_version(), catalog.latest_version())
        .unwrap();

    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].origin(), MappingOrigin::Inferred);
    assert_eq!(steps[1].origin(), MappingOrigin::Explicit);
    assert_eq!(
        steps[1].mapping().entity_mappings[0].policy.as_deref(),
        Some("Notes_App.TitleLength")
    );
}

#[test]
fn test_missing_mapping_fails_chain() {
    let dir = TempDir::new().unwrap();
    populate(dir.path());
    let resources = ResourceDirectory::new(dir.path());

    let catalog = VersionCatalog::load(&resources, "Notes", None).unwrap();
    let resolver = TransformationResolver::new(resources);
    let err = StepBuilder::new(&catalog, &resolver)
        .build_steps(catalog.first_version(), catalog.latest_version())
        .unwrap_err();

    assert!(matches!(err, MigrationError::NoMappingFound { from: 2, to: 3, .. }));
}

#[test]
fn test_compiled_artifacts_load_like_sources() {
    let dir = TempDir::new().unwrap();
    populate(dir.path());
    let compiled = TempDir::new().unwrap();
    for name in ["Notes", "Notes_2", "Notes_3"] {
        compile_model(&dir.path().join(format!("{name}.yaml")), compiled.path()).unwrap();
    }

    let resources = ResourceDirectory::new(compiled.path());
    let catalog = VersionCatalog::load(&resources, "Notes", None).unwrap();
    assert_eq!(catalog.versions().len(), 3);
    assert_eq!(
        read_compiled(&compiled.path().join("Notes_2.lmc")).unwrap(),
        v2()
    );
}

#[test]
fn test_config_points_at_resources() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("models")).unwrap();
    populate(&dir.path().join("models"));

    let config_path = dir.path().join("ladder.yml");
    let mut config = LadderConfig::new("Notes", "models", "Notes.sqlite");
    config.latest_version = Some(2);
    config.save(&config_path).unwrap();

    let config = LadderConfig::load(&config_path).unwrap();
    let resources = ResourceDirectory::new(&config.model_directory);
    let catalog =
        VersionCatalog::load(&resources, &config.model_name, config.latest_version).unwrap();

    assert_eq!(catalog.latest_version().number(), 2);
    assert_eq!(config.store_handle().path(), dir.path().join("Notes.sqlite"));
}
