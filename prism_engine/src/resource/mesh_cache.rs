/// Binary mesh cache written next to a source model (`<model>.dump`)
///
/// Layout, little endian, no header:
///
/// ```text
/// u64           vertex count
/// Vertex[count] 32 bytes each (position, normal, uv as f32)
/// u64           index count
/// u32[count]    indices
/// ```
///
/// Reads check that the file length matches the declared counts exactly.

use std::fs;
use std::path::{Path, PathBuf};
use crate::engine_bail;
use crate::engine_debug;
use crate::engine_err;
use crate::engine_warn;
use crate::error::{Error, Result};
use crate::resource::{Mesh, Vertex};

const COUNT_BYTES: usize = std::mem::size_of::<u64>();
const VERTEX_BYTES: usize = std::mem::size_of::<Vertex>();
const INDEX_BYTES: usize = std::mem::size_of::<u32>();

/// `model.obj` -> `model.obj.dump`
pub fn cache_path(model_path: &Path) -> PathBuf {
    let mut path = model_path.as_os_str().to_owned();
    path.push(".dump");
    PathBuf::from(path)
}

pub fn write_mesh_cache(path: &Path, vertices: &[Vertex], indices: &[u32]) -> Result<()> {
    let mut bytes = Vec::with_capacity(
        2 * COUNT_BYTES + vertices.len() * VERTEX_BYTES + indices.len() * INDEX_BYTES,
    );
    bytes.extend_from_slice(&(vertices.len() as u64).to_le_bytes());
    for vertex in vertices {
        for value in vertex.position.iter().chain(&vertex.normal).chain(&vertex.uv) {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    bytes.extend_from_slice(&(indices.len() as u64).to_le_bytes());
    for index in indices {
        bytes.extend_from_slice(&index.to_le_bytes());
    }

    if let Err(e) = fs::write(path, &bytes) {
        engine_bail!("prism::MeshCache" => Error::InvalidResource,
            "[MeshCache] cannot write '{}': {}", path.display(), e);
    }
    engine_debug!("prism::MeshCache", "wrote '{}' ({} vertices, {} indices)",
        path.display(), vertices.len(), indices.len());
    Ok(())
}

pub fn read_mesh_cache(path: &Path) -> Result<(Vec<Vertex>, Vec<u32>)> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => engine_bail!("prism::MeshCache" => Error::InvalidResource,
            "[MeshCache] cannot read '{}': {}", path.display(), e),
    };
    decode(&bytes).map_err(|reason| {
        engine_err!("prism::MeshCache" => Error::InvalidResource,
            "[MeshCache] '{}' is corrupt: {}", path.display(), reason)
    })
}

/// Load a mesh from its cache, or parse the model and write the cache
///
/// A corrupt cache is logged and rebuilt.
pub fn load_or_build<F>(model_path: &Path, name: &str, parse: F) -> Result<Mesh>
where
    F: FnOnce(&Path) -> Result<(Vec<Vertex>, Vec<u32>)>,
{
    let cache = cache_path(model_path);
    if cache.exists() {
        match read_mesh_cache(&cache) {
            Ok((vertices, indices)) => return Ok(Mesh::from_vertices(name, &vertices, indices)),
            Err(e) => engine_warn!("prism::MeshCache", "rebuilding '{}': {}", cache.display(), e),
        }
    }

    let (vertices, indices) = parse(model_path)?;
    write_mesh_cache(&cache, &vertices, &indices)?;
    Ok(Mesh::from_vertices(name, &vertices, indices))
}

fn read_count(bytes: &[u8], at: usize) -> std::result::Result<usize, String> {
    let Some(slice) = bytes.get(at..at + COUNT_BYTES) else {
        return Err(format!("truncated count at byte {}", at));
    };
    let mut raw = [0u8; COUNT_BYTES];
    raw.copy_from_slice(slice);
    usize::try_from(u64::from_le_bytes(raw)).map_err(|_| "count does not fit in memory".to_string())
}

fn decode(bytes: &[u8]) -> std::result::Result<(Vec<Vertex>, Vec<u32>), String> {
    let vertex_count = read_count(bytes, 0)?;
    let vertex_end = vertex_count
        .checked_mul(VERTEX_BYTES)
        .and_then(|n| n.checked_add(COUNT_BYTES))
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| format!("{} vertices declared, file has {} bytes", vertex_count, bytes.len()))?;

    let index_count = read_count(bytes, vertex_end)?;
    let index_start = vertex_end + COUNT_BYTES;
    let expected = index_count
        .checked_mul(INDEX_BYTES)
        .and_then(|n| n.checked_add(index_start))
        .ok_or_else(|| format!("{} indices declared", index_count))?;
    if expected != bytes.len() {
        return Err(format!("expected {} bytes for {} vertices and {} indices, found {}",
            expected, vertex_count, index_count, bytes.len()));
    }

    let floats: Vec<f32> = bytes[COUNT_BYTES..vertex_end]
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    let vertices = floats
        .chunks_exact(8)
        .map(|f| Vertex {
            position: [f[0], f[1], f[2]],
            normal: [f[3], f[4], f[5]],
            uv: [f[6], f[7]],
        })
        .collect();
    let indices = bytes[index_start..]
        .chunks_exact(INDEX_BYTES)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok((vertices, indices))
}

#[cfg(test)]
#[path = "mesh_cache_tests.rs"]
mod tests;
