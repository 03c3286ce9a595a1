//! Scalar types storable in a distributed [`Vector`](crate::data::vector::Vector).

use std::fmt::{Debug, Display};

use bytemuck::Pod;
use num_traits::Float;
use rand::distributions::uniform::SampleUniform;

/// Real floating-point entry type. The magnitude type of every norm is the
/// scalar itself.
pub trait Scalar:
    Float + Pod + SampleUniform + Default + Debug + Display + Send + Sync + 'static
{
}

impl Scalar for f64 {}

impl Scalar for f32 {}
