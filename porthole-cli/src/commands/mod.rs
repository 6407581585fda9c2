pub mod local;
pub mod version;
