#[macro_use]
mod macros;
pub mod matrix;

pub use crate::matrix::{IntoMatrix, Matrix};
