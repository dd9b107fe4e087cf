mod transport;
pub use transport::*;

mod connection;
pub use connection::*;

mod driver;
pub use driver::*;
