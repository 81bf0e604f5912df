pub mod actions;
pub mod blockdev;
pub mod disk;
pub mod error;
pub mod image;
pub mod pt;
pub mod pure;
