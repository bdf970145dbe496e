pub mod extract;
pub mod google;

pub use google::{GoogleNewsSource, SourceConfig};

pub mod prelude {
    pub use super::google::{GoogleNewsSource, SourceConfig};
    pub use np_core::{Article, Error, NewsSource, Result};
}
