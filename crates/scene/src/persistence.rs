//! Scene files.
//!
//! Scenes are stored as a single JSON document. Every field of [`Scene`] is written, and
//! `f32` values are printed with the shortest representation that parses back to the same
//! bits.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::{Scene, SceneValidationError};

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("read scene file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("write scene file '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse scene file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("serialize scene for '{}': {source}", path.display())]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("scene file '{}' is invalid: {source}", path.display())]
    Invalid {
        path: PathBuf,
        source: SceneValidationError,
    },
}

/// Reads and validates a scene. Nothing is returned unless the whole file is valid.
pub fn load_scene(path: &Path) -> Result<Scene, SceneError> {
    log::info!("[scene] loading scene from '{}'", path.display());
    let file = File::open(path).map_err(|source| SceneError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let scene: Scene =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| SceneError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    scene.validate().map_err(|source| SceneError::Invalid {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(scene)
}

pub fn save_scene(scene: &Scene, path: &Path) -> Result<(), SceneError> {
    log::info!("[scene] saving scene to '{}'", path.display());
    let file = File::create(path).map_err(|source| SceneError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, scene).map_err(|source| SceneError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    writer
        .write_all(b"\n")
        .and_then(|()| writer.flush())
        .map_err(|source| SceneError::Write {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Circle, Line, Material, MaterialKind, default_scene};

    fn two_material_scene() -> Scene {
        Scene {
            view_x: 0.512_345_7,
            view_y: 0.383_333_34,
            view_width: 0.833_333_3,
            view_height: 0.625,
            materials: vec![
                Material {
                    color: [0.75, 0.75, 0.75],
                    emissivity: [6.0, 6.0, 6.0],
                    kind: MaterialKind::Diffuse,
                },
                Material {
                    color: [0.1, 0.2, 0.3],
                    emissivity: [0.0; 3],
                    kind: MaterialKind::Dielectric,
                },
            ],
            circles: vec![Circle {
                center: [0.8, 0.5],
                radius: 0.03,
                material_id: 0,
            }],
            lines: vec![Line {
                a: [0.35, 0.05],
                b: [0.1, 1.0 / 3.0],
                material_id: 1,
            }],
            arcs: Vec::new(),
        }
    }

    #[test]
    fn save_then_load_reproduces_every_field() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("scene.json");
        let scene = two_material_scene();

        save_scene(&scene, &path).expect("save scene");
        let loaded = load_scene(&path).expect("load scene");

        assert_eq!(loaded, scene);
        assert_eq!(loaded.view_x.to_bits(), scene.view_x.to_bits());
        assert_eq!(loaded.lines[0].b[1].to_bits(), scene.lines[0].b[1].to_bits());
    }

    #[test]
    fn default_scene_round_trips() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("default.json");
        let scene = default_scene(320, 240);

        save_scene(&scene, &path).expect("save scene");
        assert_eq!(load_scene(&path).expect("load scene"), scene);
    }

    #[test]
    fn load_missing_file_reports_read_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("missing.json");
        let error = load_scene(&path).expect_err("missing file must fail");
        assert!(matches!(error, SceneError::Read { .. }));
    }

    #[test]
    fn load_corrupt_file_reports_parse_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("corrupt.json");
        std::fs::write(&path, "{ \"view_x\": 0.5, \"materials\": [").expect("write corrupt file");
        let error = load_scene(&path).expect_err("corrupt file must fail");
        assert!(matches!(error, SceneError::Parse { .. }));
    }

    #[test]
    fn load_rejects_scene_that_fails_validation() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("invalid.json");
        let mut scene = two_material_scene();
        scene.circles[0].material_id = 9;
        save_scene(&scene, &path).expect("save scene");

        let error = load_scene(&path).expect_err("invalid scene must fail");
        assert!(matches!(
            error,
            SceneError::Invalid {
                source: SceneValidationError::MaterialOutOfRange { material_id: 9, .. },
                ..
            }
        ));
    }
}
