pub mod data_window;
pub mod virtualizer;

pub use data_window::DataWindow;
pub use virtualizer::{IngestProgress, Virtualizer};
