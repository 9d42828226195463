//! Edge primitives: 1D derivative filters and peak detection, the caliper
//! measurement model, and a single-scale 2D edge detector.
//!
//! Coordinates follow pixel-center convention: sample `signal[i]` is located at
//! position `x = i`.
//!
//! Caliper scoring is pluggable through [`caliper::EdgeScorer`];
//! [`caliper::WeightedEdgeScorer`] is the default.

pub mod caliper;
pub mod conv1d;
pub mod edge1d;
pub mod edge2d;
pub mod kernels1d;
pub mod pair;

pub use caliper::{
    Caliper, CaliperConfig, CaliperEdge, CaliperMeasurement, CaliperPolarity, EdgeCandidate,
    EdgeScorer, ScoringContext, WeightedEdgeScorer, sample_profile,
};
pub use conv1d::{convolve_f32, convolve_separable};
pub use edge1d::{Edge1DConfig, Edge1DDetector, EdgePeak, EdgePolarity, SubpixRefine};
pub use edge2d::{Edge2DConfig, Edge2DDetector, Edgel, GradientOperator, Subpix2D, sobel_magnitude};
pub use kernels1d::{DoGKernel1D, box_kernel, gaussian_kernel};
pub use pair::{EdgePair, EdgePairConfig, PairCandidate, best_edge_pair};
