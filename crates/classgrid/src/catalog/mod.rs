//! Course catalog collaborators: search and sections-by-course.

mod banner;
mod cache;
mod http;

pub use banner::{BannerClient, BannerConfig, BannerImport, BannerSection};
pub use cache::{CatalogStats, CourseCatalog, DEFAULT_SEARCH_LIMIT};
pub use http::HttpCatalogClient;

use async_trait::async_trait;

use crate::error::LookupError;
use crate::types::{CourseResult, Section};

/// Remote reads the selection workflow depends on.
///
/// Implementations must tolerate being called rapidly; the caller discards
/// superseded responses itself.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Courses whose id or title match `query`. Empty when nothing matches.
    async fn search_courses(&self, query: &str) -> Result<Vec<CourseResult>, LookupError>;

    /// Every section offered for `course_id`, meetings included.
    async fn sections_for_course(&self, course_id: &str) -> Result<Vec<Section>, LookupError>;

    /// Size of the data behind this client, when it is held locally.
    fn stats(&self) -> Option<CatalogStats> {
        None
    }
}
