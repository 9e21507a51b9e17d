//! Cluster-validity criteria bank (§4.6) and the rank/derivative transforms
//! that the meta-criterion (§4.7) consumes.

pub mod bank;
pub mod transforms;

pub use bank::{criterion_names, evaluate_criterion, Criterion};
pub use transforms::{rank_transform, second_derivative};
