pub mod class;
pub mod document;
pub mod enrollment;
pub mod profile;
