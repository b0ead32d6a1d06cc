pub mod file;

pub use file::Transcript;
