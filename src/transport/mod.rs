/// Filesystem discovery and path helpers.
pub mod fs;
