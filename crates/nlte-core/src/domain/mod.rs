pub mod errors;

pub use errors::{NlteError, NlteErrorCategory, NlteResult};
