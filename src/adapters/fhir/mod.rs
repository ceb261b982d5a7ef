//! Bundle decoding and filter expression evaluation
//!
//! Both are trait seams so that routing can run against a full clinical
//! data library; the JSON decoder and path evaluator here cover the
//! expressions receivers are configured with.

pub mod decoder;
pub mod evaluator;

pub use decoder::{BundleDecoder, JsonBundleDecoder};
pub use evaluator::{ExpressionEvaluator, PathExpressionEvaluator};
