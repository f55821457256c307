pub mod colors;
pub mod size;
