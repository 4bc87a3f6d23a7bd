use anyhow::{Context, Result};
use growth::prelude::{BranchParams, Point3};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Branch run config: the start polyline plus flattened `BranchParams`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchesConfig {
    pub start: Vec<Point3<f64>>,
    #[serde(flatten)]
    pub params: BranchParams,
}

impl Default for BranchesConfig {
    fn default() -> Self {
        Self {
            start: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(15.0, 5.0, 0.0),
                Point3::new(30.0, 0.0, 0.0),
            ],
            params: BranchParams::default(),
        }
    }
}

/// Read a JSON config, or the defaults when no path is given.
pub fn load<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let raw = fs::read(path).with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("parsing config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use growth::prelude::TerraceParams;
    use tempfile::tempdir;

    #[test]
    fn missing_path_gives_defaults() {
        let cfg: BranchesConfig = load(None).unwrap();
        assert_eq!(cfg.start.len(), 3);
        assert_eq!(cfg.params, BranchParams::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("branches.json");
        fs::write(
            &path,
            r#"{ "start": [[0, 0, 0], [10, 0, 0]], "iterations": 4, "seed": 7 }"#,
        )
        .unwrap();
        let cfg: BranchesConfig = load(Some(&path)).unwrap();
        assert_eq!(cfg.start.len(), 2);
        assert_eq!(cfg.params.iterations, 4);
        assert_eq!(cfg.params.seed, 7);
        assert_eq!(cfg.params.z_dist, BranchParams::default().z_dist);
    }

    #[test]
    fn unreadable_or_malformed_config_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(load::<TerraceParams>(Some(&missing)).is_err());
        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{ not json").unwrap();
        let err = load::<TerraceParams>(Some(&bad)).unwrap_err();
        assert!(format!("{err:#}").contains("parsing config"));
    }
}
