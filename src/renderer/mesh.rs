use std::io::BufRead;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use nalgebra_glm as glm;

use super::vertex::MeshVertex;
use crate::error::VisError;

/// Triangle mesh in CPU memory, ready for upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    }
}

impl MeshData {
    pub fn load_obj(path: &Path) -> Result<Self, VisError> {
        let (models, _materials) = tobj::load_obj(path, &load_options())
            .map_err(|e| VisError::new("mesh-load").with_arg("path", path.display()).push_std(e))?;
        let mesh = Self::from_models(&models);
        debug!(
            "mesh {}: {} vertices, {} triangles",
            path.display(),
            mesh.vertices.len(),
            mesh.indices.len() / 3
        );
        Ok(mesh)
    }

    /// Parses OBJ text; material libraries are ignored.
    pub fn parse_obj(reader: &mut impl BufRead) -> Result<Self, VisError> {
        let (models, _materials) =
            tobj::load_obj_buf(reader, &load_options(), |_| Err(tobj::LoadError::OpenFileFailed))?;
        Ok(Self::from_models(&models))
    }

    /// Merges all objects of a file into one mesh. Objects without normals
    /// get smooth normals from their faces.
    pub fn from_models(models: &[tobj::Model]) -> Self {
        let mut out = Self::default();
        for m in models {
            let base = out.vertices.len() as u32;
            let count = m.mesh.positions.len() / 3;
            let has_normals = m.mesh.normals.len() == m.mesh.positions.len();
            out.vertices.extend((0..count).map(|i| MeshVertex {
                position: [
                    m.mesh.positions[i * 3],
                    m.mesh.positions[i * 3 + 1],
                    m.mesh.positions[i * 3 + 2],
                ],
                normal: if has_normals {
                    [
                        m.mesh.normals[i * 3],
                        m.mesh.normals[i * 3 + 1],
                        m.mesh.normals[i * 3 + 2],
                    ]
                } else {
                    [0.0; 3]
                },
            }));
            let indices: Vec<u32> = m
                .mesh
                .indices
                .iter()
                .copied()
                .filter(|&i| (i as usize) < count)
                .map(|i| base + i)
                .collect();
            if !has_normals {
                generate_normals(&mut out.vertices[base as usize..], &m.mesh.indices);
            }
            out.indices.extend(indices);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Area-weighted vertex normals. `indices` are relative to `vertices`.
pub fn generate_normals(vertices: &mut [MeshVertex], indices: &[u32]) {
    let mut sums = vec![glm::Vec3::zeros(); vertices.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if a >= vertices.len() || b >= vertices.len() || c >= vertices.len() {
            continue;
        }
        let pa = glm::Vec3::from(vertices[a].position);
        let pb = glm::Vec3::from(vertices[b].position);
        let pc = glm::Vec3::from(vertices[c].position);
        let face = glm::cross(&(pb - pa), &(pc - pa));
        sums[a] += face;
        sums[b] += face;
        sums[c] += face;
    }
    for (v, n) in vertices.iter_mut().zip(sums) {
        let len = glm::length(&n);
        v.normal = if len > f32::EPSILON {
            (n / len).into()
        } else {
            [0.0, 1.0, 0.0]
        };
    }
}

/// Finds mesh files named in a model. Tries the path as given when absolute,
/// then relative to each search directory in order.
#[derive(Debug, Clone, Default)]
pub struct MeshResolver {
    search_dirs: Vec<PathBuf>,
}

impl MeshResolver {
    /// Search order: model directory, working directory, then `extra`.
    pub fn new(model_dir: &Path, extra: &[PathBuf]) -> Self {
        let mut search_dirs = vec![model_dir.to_path_buf()];
        if let Ok(cwd) = std::env::current_dir() {
            search_dirs.push(cwd);
        }
        search_dirs.extend(extra.iter().cloned());
        Self { search_dirs }
    }

    pub fn with_dirs(search_dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs }
    }

    pub fn resolve(&self, src: &str) -> Option<PathBuf> {
        let src_path = Path::new(src);
        if src_path.is_absolute() {
            return src_path.is_file().then(|| src_path.to_path_buf());
        }
        let found = self
            .search_dirs
            .iter()
            .map(|dir| dir.join(src_path))
            .find(|p| p.is_file());
        if found.is_none() {
            warn!("mesh '{src}' not found in {:?}", self.search_dirs);
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const QUAD: &str = "v 0 0 0\nv 1 0 0\nv 1 0 1\nv 0 0 1\nf 1 3 2\nf 1 4 3\n";

    #[test]
    fn parses_obj_and_generates_normals() {
        let mesh = MeshData::parse_obj(&mut Cursor::new(QUAD)).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
        for v in &mesh.vertices {
            assert_eq!(v.normal, [0.0, 1.0, 0.0]);
        }
    }

    #[test]
    fn explicit_normals_are_kept() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 -1\nf 1//1 2//1 3//1\n";
        let mesh = MeshData::parse_obj(&mut Cursor::new(src)).unwrap();
        assert!(mesh.vertices.iter().all(|v| v.normal == [0.0, 0.0, -1.0]));
    }

    #[test]
    fn resolver_tries_directories_in_order() {
        let dir = std::env::temp_dir().join(format!("rbvis-mesh-{}", std::process::id()));
        let second = dir.join("second");
        std::fs::create_dir_all(&second).unwrap();
        std::fs::write(second.join("box.obj"), QUAD).unwrap();

        let resolver = MeshResolver::with_dirs(vec![dir.join("first"), second.clone()]);
        assert_eq!(resolver.resolve("box.obj"), Some(second.join("box.obj")));
        assert_eq!(resolver.resolve("missing.obj"), None);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
