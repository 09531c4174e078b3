//! Compile-time registry of dataset definitions.
//!
//! Each entry is a `(name, toml_content)` pair embedded via `include_str!`.
//! Adding a dataset requires creating a TOML file in `datasets/` and adding
//! a corresponding entry here. Definitions can also be read from an
//! arbitrary `.toml` path at runtime.

use std::path::Path;

use deforest_map_property_models::DatasetDefinition;

use crate::LoaderError;

/// Number of registered datasets. Enforced by a test.
#[cfg(test)]
const EXPECTED_DATASET_COUNT: usize = 2;

/// Embedded TOML dataset definitions.
const DATASET_TOMLS: &[(&str, &str)] = &[
    ("feijo", include_str!("../datasets/feijo.toml")),
    ("sicar", include_str!("../datasets/sicar.toml")),
];

/// Returns all registered dataset definitions.
///
/// # Panics
///
/// Panics if any embedded TOML file fails to parse. Since these are
/// compile-time constants, parse failures indicate a development error
/// and are caught by the registry tests.
#[must_use]
pub fn all_definitions() -> Vec<DatasetDefinition> {
    DATASET_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse dataset definition '{name}': {e}"))
        })
        .collect()
}

/// Looks up an embedded definition by id.
#[must_use]
pub fn find(id: &str) -> Option<DatasetDefinition> {
    all_definitions().into_iter().find(|d| d.id == id)
}

/// Reads a definition from a TOML file on disk.
///
/// # Errors
///
/// Returns [`LoaderError`] if the file cannot be read or does not match
/// the definition schema.
pub fn read_definition(path: &Path) -> Result<DatasetDefinition, LoaderError> {
    let text = std::fs::read_to_string(path).map_err(|e| LoaderError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(toml::de::from_str(&text)?)
}

/// Resolves a dataset argument: a path ending in `.toml` is read from
/// disk, anything else is looked up by id.
///
/// # Errors
///
/// Returns [`LoaderError::UnknownDataset`] for an unregistered id, or the
/// [`read_definition`] error for a path.
pub fn resolve(id_or_path: &str) -> Result<DatasetDefinition, LoaderError> {
    let path = Path::new(id_or_path);
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
    {
        return read_definition(path);
    }

    find(id_or_path).ok_or_else(|| LoaderError::UnknownDataset {
        id: id_or_path.to_string(),
    })
}
