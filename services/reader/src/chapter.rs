//! services/reader/src/chapter.rs
//!
//! Loads everything the chapter reading view needs: the novel, the chapter,
//! and the neighbouring chapters for previous/next navigation.

use novel_reader_core::domain::{adjacent_chapters, Chapter, Novel, UserProfile};
use novel_reader_core::ports::{AuthService, LibraryRepository, PortResult};
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Where unauthenticated readers are sent.
pub const AUTH_PATH: &str = "/auth";

pub fn chapter_path(novel_id: Uuid, chapter_id: Uuid) -> String {
    format!("/novel/{}/chapter/{}", novel_id, chapter_id)
}

/// A fully loaded chapter, ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterPage {
    pub novel: Novel,
    pub chapter: Chapter,
    pub prev_chapter: Option<Uuid>,
    pub next_chapter: Option<Uuid>,
    /// The viewer uploaded this novel.
    pub is_author: bool,
}

impl ChapterPage {
    pub fn paragraphs(&self) -> Vec<&str> {
        self.chapter.paragraphs()
    }

    pub fn prev_path(&self) -> Option<String> {
        self.prev_chapter
            .map(|id| chapter_path(self.novel.novel_id, id))
    }

    pub fn next_path(&self) -> Option<String> {
        self.next_chapter
            .map(|id| chapter_path(self.novel.novel_id, id))
    }
}

/// The outcome of loading a chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterView {
    /// No active session; nothing was fetched.
    RedirectToAuth { location: &'static str },
    /// The novel or chapter could not be loaded, whatever the reason.
    NotFound,
    Loaded(Box<ChapterPage>),
}

/// Clones share the same set of pending view increments.
#[derive(Clone)]
pub struct ChapterLoader {
    auth: Arc<dyn AuthService>,
    library: Arc<dyn LibraryRepository>,
    background: TaskTracker,
}

impl ChapterLoader {
    pub fn new(auth: Arc<dyn AuthService>, library: Arc<dyn LibraryRepository>) -> Self {
        Self {
            auth,
            library,
            background: TaskTracker::new(),
        }
    }

    pub async fn load(
        &self,
        novel_id: Uuid,
        chapter_id: Uuid,
        viewer: Option<&UserProfile>,
    ) -> ChapterView {
        match self.auth.current_session().await {
            Ok(Some(_)) => {}
            Ok(None) => {
                return ChapterView::RedirectToAuth {
                    location: AUTH_PATH,
                }
            }
            Err(e) => {
                error!("Error fetching chapter: {}", e);
                return ChapterView::NotFound;
            }
        }

        match self.fetch(novel_id, chapter_id, viewer).await {
            Ok(page) => {
                self.spawn_view_increment(chapter_id);
                ChapterView::Loaded(Box::new(page))
            }
            Err(e) => {
                error!("Error fetching chapter: {}", e);
                ChapterView::NotFound
            }
        }
    }

    async fn fetch(
        &self,
        novel_id: Uuid,
        chapter_id: Uuid,
        viewer: Option<&UserProfile>,
    ) -> PortResult<ChapterPage> {
        let novel = self.library.get_novel(novel_id).await?;
        let chapter = self.library.get_chapter(chapter_id).await?;
        let siblings = self.library.list_chapter_refs(novel_id).await?;
        let neighbours = adjacent_chapters(&siblings, chapter_id);

        let is_author = viewer.is_some_and(|p| p.user_id == novel.upload_by);
        Ok(ChapterPage {
            novel,
            chapter,
            prev_chapter: neighbours.prev,
            next_chapter: neighbours.next,
            is_author,
        })
    }

    /// Waits for every view increment spawned so far. Call before shutting the
    /// runtime down; loads issued afterwards still count their views.
    pub async fn wait(&self) {
        self.background.close();
        debug!("Waiting on {} pending view increments", self.background.len());
        self.background.wait().await;
        self.background.reopen();
    }

    /// Bumps the view counter in the background; the page never waits on it.
    fn spawn_view_increment(&self, chapter_id: Uuid) {
        let library = self.library.clone();
        self.background.spawn(async move {
            if let Err(e) = library.increment_chapter_views(chapter_id).await {
                warn!("Failed to increment views for chapter {}: {}", chapter_id, e);
            }
        });
    }
}
