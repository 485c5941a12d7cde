mod toc;
pub use toc::{Toc, TocGroup, TocGroupKind};

mod hf_global;
mod lf_global;
mod lf_group;
mod pass_group;
pub use hf_global::*;
pub use lf_global::*;
pub use lf_group::*;
pub use pass_group::*;

mod noise;
mod patch;
mod spline;
pub use noise::*;
pub use patch::*;
pub use spline::*;
