//! Customer data structures, file loading and categorical encoding

mod data;
pub mod loader;
pub mod encoder;
pub mod generator;

pub use data::{Column, CustomerTable};
pub use loader::{load_customers, load_customers_from_reader, load_encoded, write_customers};
pub use encoder::{CategoryMap, Encoder};
pub use generator::{generate_customers, GeneratorParams};
