pub mod output;
pub mod sample_delivery;
