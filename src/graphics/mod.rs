pub mod geometry;
pub mod mesh;
pub mod scene;
pub mod texture;
