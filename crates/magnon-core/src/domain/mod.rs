mod errors;

pub use errors::{SpinwaveError, SpinwaveResult, Warning};
