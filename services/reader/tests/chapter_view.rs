use async_trait::async_trait;
use novel_reader_core::domain::{Chapter, ChapterRef, Identity, Novel, UserProfile};
use novel_reader_core::ports::{LibraryRepository, PortResult};
use reader_lib::adapters::fake::FakeBackend;
use reader_lib::chapter::{chapter_path, ChapterLoader, ChapterPage, ChapterView, AUTH_PATH};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

struct Library {
    backend: Arc<FakeBackend>,
    loader: ChapterLoader,
    novel: Novel,
    /// Chapter ids in chapter-number order.
    chapters: Vec<Uuid>,
}

async fn library() -> Library {
    let backend = Arc::new(FakeBackend::default());
    let novel = Novel {
        novel_id: Uuid::new_v4(),
        title: "The Lantern Road".to_string(),
        author: "M. Ash".to_string(),
        upload_by: Uuid::new_v4(),
        cover_url: None,
    };
    backend.put_novel(novel.clone()).await;

    let chapters: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    // Inserted out of order; the listing sorts by chapter number.
    for number in [3, 1, 2] {
        backend
            .put_chapter(Chapter {
                chapter_id: chapters[number - 1],
                novel_id: novel.novel_id,
                chapter_number: number as i32,
                title: format!("Part {}", number),
                content: format!("Line one of {}.\nLine two of {}.", number, number),
                views: 0,
            })
            .await;
    }

    // A chapter of another novel must not show up in navigation.
    backend
        .put_chapter(Chapter {
            chapter_id: Uuid::new_v4(),
            novel_id: Uuid::new_v4(),
            chapter_number: 2,
            title: "Elsewhere".to_string(),
            content: String::new(),
            views: 0,
        })
        .await;

    let loader = ChapterLoader::new(backend.clone(), backend.clone());
    Library {
        backend,
        loader,
        novel,
        chapters,
    }
}

async fn sign_in(backend: &FakeBackend) -> Identity {
    let identity = Identity {
        id: Uuid::new_v4(),
        email: Some("reader@example.com".to_string()),
    };
    backend.restore_session(identity.clone()).await;
    identity
}

/// Delegates to the fake, but takes its time recording a view.
struct SlowViews {
    backend: Arc<FakeBackend>,
    delay: Duration,
}

#[async_trait]
impl LibraryRepository for SlowViews {
    async fn get_novel(&self, novel_id: Uuid) -> PortResult<Novel> {
        self.backend.get_novel(novel_id).await
    }

    async fn get_chapter(&self, chapter_id: Uuid) -> PortResult<Chapter> {
        self.backend.get_chapter(chapter_id).await
    }

    async fn list_chapter_refs(&self, novel_id: Uuid) -> PortResult<Vec<ChapterRef>> {
        self.backend.list_chapter_refs(novel_id).await
    }

    async fn increment_chapter_views(&self, chapter_id: Uuid) -> PortResult<()> {
        tokio::time::sleep(self.delay).await;
        self.backend.increment_chapter_views(chapter_id).await
    }
}

fn loaded(view: ChapterView) -> ChapterPage {
    match view {
        ChapterView::Loaded(page) => *page,
        other => panic!("expected a loaded chapter, got {:?}", other),
    }
}

async fn wait_for_increments(backend: &FakeBackend, expected: u64) {
    for _ in 0..100 {
        if backend.view_increments.load(Ordering::Relaxed) >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("view increment never arrived");
}

#[tokio::test]
async fn anonymous_reader_is_redirected_before_fetching() {
    let lib = library().await;

    let view = lib.loader.load(lib.novel.novel_id, lib.chapters[1], None).await;

    assert_eq!(view, ChapterView::RedirectToAuth { location: AUTH_PATH });
    assert_eq!(lib.backend.library_reads.load(Ordering::Relaxed), 0);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(lib.backend.view_increments.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn middle_chapter_links_both_ways() {
    let lib = library().await;
    sign_in(&lib.backend).await;

    let page = loaded(lib.loader.load(lib.novel.novel_id, lib.chapters[1], None).await);

    assert_eq!(page.chapter.chapter_number, 2);
    assert_eq!(page.prev_chapter, Some(lib.chapters[0]));
    assert_eq!(page.next_chapter, Some(lib.chapters[2]));
    assert_eq!(
        page.prev_path(),
        Some(format!("/novel/{}/chapter/{}", lib.novel.novel_id, lib.chapters[0]))
    );
    assert_eq!(page.next_path(), Some(chapter_path(lib.novel.novel_id, lib.chapters[2])));
    assert_eq!(page.paragraphs(), vec!["Line one of 2.", "Line two of 2."]);
}

#[tokio::test]
async fn first_and_last_chapters_stop_at_the_edges() {
    let lib = library().await;
    sign_in(&lib.backend).await;

    let first = loaded(lib.loader.load(lib.novel.novel_id, lib.chapters[0], None).await);
    assert_eq!(first.prev_chapter, None);
    assert_eq!(first.next_chapter, Some(lib.chapters[1]));

    let last = loaded(lib.loader.load(lib.novel.novel_id, lib.chapters[2], None).await);
    assert_eq!(last.prev_chapter, Some(lib.chapters[1]));
    assert_eq!(last.next_chapter, None);
    assert_eq!(last.next_path(), None);
}

#[tokio::test]
async fn loading_a_chapter_counts_a_view() {
    let lib = library().await;
    sign_in(&lib.backend).await;

    loaded(lib.loader.load(lib.novel.novel_id, lib.chapters[0], None).await);

    wait_for_increments(&lib.backend, 1).await;
    let chapter = lib.backend.chapter(lib.chapters[0]).await.unwrap();
    assert_eq!(chapter.views, 1);
}

#[tokio::test]
async fn missing_chapter_renders_not_found_without_a_view() {
    let lib = library().await;
    sign_in(&lib.backend).await;

    let view = lib.loader.load(lib.novel.novel_id, Uuid::new_v4(), None).await;

    assert_eq!(view, ChapterView::NotFound);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(lib.backend.view_increments.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn missing_novel_and_network_errors_look_the_same() {
    let lib = library().await;
    sign_in(&lib.backend).await;

    let missing_novel = lib.loader.load(Uuid::new_v4(), lib.chapters[0], None).await;
    assert_eq!(missing_novel, ChapterView::NotFound);

    lib.backend.fail_library.store(true, Ordering::Relaxed);
    let network = lib.loader.load(lib.novel.novel_id, lib.chapters[0], None).await;
    assert_eq!(network, ChapterView::NotFound);
}

#[tokio::test]
async fn uploader_is_recognised_as_author() {
    let lib = library().await;
    sign_in(&lib.backend).await;

    let author = UserProfile {
        user_id: lib.novel.upload_by,
        username: Some("m_ash".to_string()),
        ..UserProfile::default()
    };
    let page = loaded(
        lib.loader
            .load(lib.novel.novel_id, lib.chapters[0], Some(&author))
            .await,
    );
    assert!(page.is_author);

    let stranger = UserProfile {
        user_id: Uuid::new_v4(),
        ..UserProfile::default()
    };
    let page = loaded(
        lib.loader
            .load(lib.novel.novel_id, lib.chapters[0], Some(&stranger))
            .await,
    );
    assert!(!page.is_author);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pending_view_increment_lands_before_shutdown() {
    let lib = library().await;
    sign_in(&lib.backend).await;
    let slow = Arc::new(SlowViews {
        backend: lib.backend.clone(),
        delay: Duration::from_millis(30),
    });
    let loader = ChapterLoader::new(lib.backend.clone(), slow);

    let page = loaded(loader.load(lib.novel.novel_id, lib.chapters[0], None).await);
    assert_eq!(page.chapter.views, 0);
    // Rendering does not wait for the counter.
    assert_eq!(lib.backend.view_increments.load(Ordering::Relaxed), 0);

    loader.wait().await;
    assert_eq!(lib.backend.view_increments.load(Ordering::Relaxed), 1);
    assert_eq!(lib.backend.chapter(lib.chapters[0]).await.unwrap().views, 1);

    // The loader keeps counting after a wait.
    loaded(loader.load(lib.novel.novel_id, lib.chapters[1], None).await);
    loader.wait().await;
    assert_eq!(lib.backend.view_increments.load(Ordering::Relaxed), 2);
}
