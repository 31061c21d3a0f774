pub mod pattern;

pub use pattern::{eval_like, like_pattern};
