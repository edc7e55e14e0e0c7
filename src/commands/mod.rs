pub mod build_ground_truth;
pub mod evaluate;
pub mod summarize;
