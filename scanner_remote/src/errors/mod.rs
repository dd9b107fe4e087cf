mod scanner_error;
pub use scanner_error::*;
