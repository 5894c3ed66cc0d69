//! Resource providers for xdjango stylesheets.
//!
//! - [`FilesystemResourceProvider`]: loads stylesheets from a transforms directory
//! - [`InMemoryResourceProvider`]: re-exported from xdjango-traits

mod filesystem;

pub use filesystem::FilesystemResourceProvider;

pub use xdjango_traits::InMemoryResourceProvider;
