pub mod entity;
pub mod outliner;
pub mod schema;
