//! This crate provides a JPEG XL bitstream reader and container format parser.
//!
//! # Bitstream reader
//!
//! [`Bitstream`] reads all the raw bits needed to decode JPEG XL codestream. It provides methods
//! to read data types that appear on the JPEG XL specification.
//!
//! # Container parser
//!
//! [`ContainerParser`] tries to parse the bytes fed into it, and emits various parser events
//! including codestream data and auxiliary box data.

mod bitstream;
mod bundle;
pub mod container;
mod error;
#[macro_use]
mod macros;
mod reader;
mod source;

pub use bitstream::{Bitstream, Bookmark, Lz77Mode, U, U32Specifier};
pub use bundle::{Bundle, BundleDefault, Name};
pub use container::{BitstreamKind, ContainerParser, ParseEvent};
pub use error::{BitstreamResult, Error, Result};
pub use macros::{unpack_signed, unpack_signed_u64};
pub use reader::ContainerDetectingReader;
pub use source::Source;
