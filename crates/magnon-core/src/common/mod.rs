pub mod constants;
pub mod tolerance;
