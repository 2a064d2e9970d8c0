pub mod display;
pub mod orders;
