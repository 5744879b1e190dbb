//! Wavefront OBJ scene import.
//!
//! The [`SceneImporter`] is an explicit context object: create one, keep it wherever scenes are loaded and pass it
//! by reference. There is no global importer state.
//!
//! # Example
//! ```
//! # use deimos::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! let obj = "o tri\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
//! let importer = SceneImporter::new();
//! let scene = importer.import_reader(&mut std::io::Cursor::new(obj))?;
//! assert_eq!(scene.meshes[0].indices, vec![0, 1, 2]);
//! # Ok(())
//! # }
//! ```

use std::fmt::Debug;
use std::io::BufRead;
use std::path::Path;

use anyhow::Result;

use crate::{Error, Vertex};

/// A named triangle mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

/// All meshes of an imported file, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub meshes: Vec<Mesh>,
}

impl Scene {
    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|mesh| mesh.vertices.len()).sum()
    }
}

/// Loads scenes from OBJ files. Faces are triangulated and every vertex gets a single index.
#[derive(Debug, Clone)]
pub struct SceneImporter {
    options: tobj::LoadOptions,
}

impl Default for SceneImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneImporter {
    pub fn new() -> Self {
        info!("[Scene Importer] Initializing OBJ importer");
        Self {
            options: tobj::GPU_LOAD_OPTIONS,
        }
    }

    /// Import a scene from a file. Materials are not loaded, only their indices are kept.
    pub fn import<P: AsRef<Path> + Debug>(&self, path: P) -> Result<Scene> {
        info!("[Scene Load] Loading scene from file: {path:?}");
        let (models, _) = tobj::load_obj(path.as_ref(), &self.options).map_err(Error::from)?;
        Ok(self.convert(models))
    }

    /// Import a scene from an in-memory OBJ source. Material libraries referenced by the source are ignored.
    pub fn import_reader<R: BufRead>(&self, reader: &mut R) -> Result<Scene> {
        let (models, _) = tobj::load_obj_buf(reader, &self.options, |_| Err(tobj::LoadError::OpenFileFailed)).map_err(Error::from)?;
        Ok(self.convert(models))
    }

    fn convert(&self, models: Vec<tobj::Model>) -> Scene {
        let meshes = models
            .into_iter()
            .map(|model| {
                let mesh = model.mesh;
                let material_index = mesh.material_id.unwrap_or(0) as u32;
                let vertices = mesh
                    .positions
                    .chunks_exact(3)
                    .enumerate()
                    .map(|(i, position)| Vertex {
                        position: [position[0], position[1], position[2]],
                        normal: mesh
                            .normals
                            .get(3 * i..3 * i + 3)
                            .map_or([0.0; 3], |n| [n[0], n[1], n[2]]),
                        tex_coord: mesh
                            .texcoords
                            .get(2 * i..2 * i + 2)
                            .map_or([0.0; 2], |t| [t[0], t[1]]),
                        material_index,
                    })
                    .collect::<Vec<_>>();
                debug!(
                    "[Scene Load] Mesh {} with {} vertices and {} indices",
                    model.name,
                    vertices.len(),
                    mesh.indices.len()
                );
                Mesh {
                    name: model.name,
                    vertices,
                    indices: mesh.indices,
                }
            })
            .collect::<Vec<_>>();
        info!("[Scene Load] Scene loaded successfully with {} mesh(es)", meshes.len());
        Scene {
            meshes,
        }
    }
}
