mod driver;
mod executor;
mod postgres;

pub use driver::*;
pub use executor::*;
pub use postgres::*;
