use std::sync::Arc;

use crate::application::files::FileService;
use crate::application::pages::PageService;
use crate::application::previews::PreviewService;
use crate::application::search::SearchService;
use crate::dispatch::SiteDispatcher;

use super::auth::UserDirectory;

/// Shared state of the HTTP surface.
#[derive(Clone)]
pub struct HttpState {
    /// The site this node serves.
    pub site: String,
    pub pages: Arc<PageService>,
    pub files: Arc<FileService>,
    pub search: Arc<SearchService>,
    pub previews: Arc<PreviewService>,
    pub dispatcher: Arc<SiteDispatcher>,
    pub directory: Arc<UserDirectory>,
}
