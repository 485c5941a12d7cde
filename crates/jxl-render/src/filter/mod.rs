mod ycbcr;

pub use ycbcr::apply_jpeg_upsampling;
