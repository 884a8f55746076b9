pub mod fields;
pub mod proposal;
