//! Resource module
//!
//! CPU-side data the renderer consumes (meshes, textures, camera), materials
//! and their instances, draw submissions and the on-disk mesh cache.

pub mod camera;
pub mod material;
pub mod mesh;
pub mod mesh_cache;
pub mod model;
pub mod texture;
pub mod window_event;

pub use camera::PerspectiveCamera;
pub use material::{Material, MaterialHandle, MaterialInstance};
pub use mesh::{Mesh, MeshId, Vertex};
pub use model::{MeshRenderer, ModelInstance};
pub use texture::{Texture2D, TextureCubemap};
pub use window_event::WindowResizeEvent;
