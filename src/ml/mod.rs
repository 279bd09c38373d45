//! Softmax classifier engine and the pieces around it.
//!
//! [`softmax`] holds the model itself; [`dataset`] validates incoming tables,
//! [`metrics`] evaluates predictions, and [`store`] keeps the active model for
//! callers that train and predict from separate entry points.

pub mod dataset;
pub mod metrics;
pub mod softmax;
pub mod store;
