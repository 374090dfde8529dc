//! Thin wrappers around the engine's network, image and container primitives.

pub mod container;
pub mod image;
pub mod network;

pub use container::{Container, ContainerSpec};
pub use image::Image;
pub use network::Network;
