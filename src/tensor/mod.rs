//! Structure-tensor field construction
//!
//! Three phases, each a full pass that returns a freshly allocated field:
//! - `gradient`: centred finite differences along x, y and z
//! - `structure`: per-voxel outer product of the gradient
//! - `aggregate`: Gaussian-weighted windowed sum of the tensor field

pub mod gradient;
pub mod structure;
pub mod aggregate;

pub use gradient::{estimate_gradient, estimate_gradient_with_progress, Axis, GradientField};
pub use structure::{build_structure_tensor, SymMat3, TensorField};
pub use aggregate::{aggregate, aggregate_with_progress};
