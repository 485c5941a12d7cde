//! This crate provides types related to representation of VarDCT frames, such as
//! [varblock transform types][TransformType], [LF images][LfCoeff],
//! [dequantization matrices][DequantMatrixSet] and [HF coefficients][HfCoeff].
//!
//! Actual decoding (dequantization and rendering) of such frames is not done in this crate.
mod dct_select;
mod dequant;
mod error;
mod hf_coeff;
mod hf_metadata;
mod hf_pass;
mod lf;

pub use dct_select::TransformType;
pub use dequant::*;
pub use error::{Error, Result};
pub use hf_coeff::*;
pub use hf_metadata::*;
pub use hf_pass::*;
pub use lf::*;
