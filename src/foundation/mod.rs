pub(crate) mod core;
pub(crate) mod error;
pub(crate) mod fetch;
pub(crate) mod homography;
pub(crate) mod math;
pub(crate) mod pipe;
pub(crate) mod tools;
