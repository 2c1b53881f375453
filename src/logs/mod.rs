// Logs module - dated log file, child output capture and tail reading

mod capture;
mod reader;
mod writer;

pub use capture::{capture_output, SharedLog};
pub use reader::read_last_lines;
pub use writer::{log_file_path, LogSource, LogWriter};
