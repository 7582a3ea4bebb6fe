pub mod error;
pub mod json_io;
pub mod npy_io;

pub use error::{IoError, IoResult};
pub use json_io::{load_json, save_json};
pub use npy_io::{read_indices, write_indices};
