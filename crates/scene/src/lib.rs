//! Camera and view math for the cell grid viewer.

pub mod camera;

pub use camera::FlyCamera;
