//! Image pyramids and coarse-to-fine template matching.
//!
//! `vt-pyr` uses a fixed 2x2 mean downsample (box filter).
//!
//! Drop-odd policy:
//! - Output size is `(src.width() / 2, src.height() / 2)`.
//! - If source width or height is odd, the last column/row is dropped.
//!
//! [`Matcher`] searches the top level exhaustively with zero-normalized
//! cross-correlation and refines candidates level by level.

mod downsample;
mod matcher;
mod pyramid;

pub use downsample::{downsample2x2_mean_f32, downsample2x2_mean_u8, downsample2x2_mean_u8_to_f32};
pub use matcher::{Match, MatchConfig, MatchError, Matcher, Template, zncc_at};
pub use pyramid::PyramidF32;
