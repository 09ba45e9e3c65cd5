pub mod dimension;
pub mod errors;
pub mod model;
pub mod records;

pub use dimension::*;
pub use errors::*;
pub use model::*;
pub use records::*;
