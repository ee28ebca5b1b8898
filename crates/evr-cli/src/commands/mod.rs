pub mod build;
pub mod extract;
