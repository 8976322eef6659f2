//! Data transformations: feature standardization and min-max normalization.
//!
//! # Example
//!
//! ```
//! use cellcast::transform::normalize;
//!
//! let scores = normalize(&[10.0, 20.0, 30.0]);
//! assert_eq!(scores, vec![0.0, 0.5, 1.0]);
//! ```

pub mod scale;

pub use scale::{normalize, StandardScaler};
