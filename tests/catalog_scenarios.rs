use std::collections::HashSet;
use std::time::{Duration, Instant};

use book_catalog::db::{KeyValueStore, SqliteStore};
use book_catalog::editor::{EditorCommand, EditorController, EditorEvent};
use book_catalog::models::AssetKind;
use book_catalog::record_store::{DEFAULT_STORAGE_KEY, RecordStore};
use book_catalog::viewer::{CarouselView, Direction, ViewerCommand, ViewerController};

const INTERVAL: Duration = Duration::from_millis(8000);

fn sqlite_records(path: &std::path::Path) -> RecordStore<SqliteStore> {
    RecordStore::new(SqliteStore::open(path).unwrap(), DEFAULT_STORAGE_KEY)
}

fn create(editor: &mut EditorController<SqliteStore>, title: &str) -> book_catalog::models::BookId {
    editor.dispatch(EditorCommand::BeginCreate).unwrap();
    editor.form.title = title.to_string();
    match editor.dispatch(EditorCommand::Save).unwrap() {
        EditorEvent::Saved { id, created } => {
            assert!(created);
            id
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn create_navigate_delete_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");
    let mut editor = EditorController::new(sqlite_records(&path));

    let id_a = create(&mut editor, "X");
    let now = Instant::now();
    let mut viewer = ViewerController::new(sqlite_records(&path), INTERVAL, false);
    assert_eq!(viewer.position(), 0);
    assert_eq!(viewer.books()[0].title_text(), "X");

    let id_b = create(&mut editor, "B");
    viewer.dispatch(ViewerCommand::Reload, now);
    viewer.dispatch(ViewerCommand::Advance(Direction::Next), now);
    viewer.dispatch(ViewerCommand::OpenDetail(id_b.clone()), now);
    assert_eq!(viewer.position(), 1);

    editor.dispatch(EditorCommand::RequestDelete(id_a)).unwrap();
    let event = editor.dispatch(EditorCommand::ConfirmDelete).unwrap();
    assert!(matches!(event, EditorEvent::Deleted { removed: 1, .. }));

    viewer.dispatch(ViewerCommand::Reload, now);
    assert_eq!(viewer.books().len(), 1);
    assert_eq!(viewer.books()[0].id, id_b);
    assert_eq!(viewer.position(), 0);
    assert_eq!(viewer.detail().map(|detail| detail.id.clone()), Some(id_b));
}

#[test]
fn ids_stay_unique_and_count_follows_creates_minus_deletes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");
    let mut editor = EditorController::new(sqlite_records(&path));

    let ids: Vec<_> = (0..5).map(|n| create(&mut editor, &format!("Buch {n}"))).collect();
    let unique: HashSet<_> = ids.iter().cloned().collect();
    assert_eq!(unique.len(), 5);

    for id in &ids[..2] {
        editor.dispatch(EditorCommand::RequestDelete(id.clone())).unwrap();
        editor.dispatch(EditorCommand::ConfirmDelete).unwrap();
    }

    let reopened = EditorController::new(sqlite_records(&path));
    assert_eq!(reopened.books().len(), 3);
}

#[test]
fn edited_record_keeps_cover_and_attachments_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");
    let mut editor = EditorController::new(sqlite_records(&path));

    editor.dispatch(EditorCommand::BeginCreate).unwrap();
    editor.form.title = "Mit Cover".into();
    editor
        .stage_bytes(AssetKind::Cover, "cover.png", Some("image/png"), &[0x89, 0x50, 0x4e, 0x47])
        .unwrap();
    editor
        .stage_bytes(AssetKind::Documents, "leseprobe.pdf", None, b"%PDF-1.4")
        .unwrap();
    let id = match editor.dispatch(EditorCommand::Save).unwrap() {
        EditorEvent::Saved { id, .. } => id,
        other => panic!("unexpected event {other:?}"),
    };
    let cover = editor.books()[0].cover.clone();
    assert!(cover.as_deref().is_some_and(|uri| uri.starts_with("data:image/png;base64,")));

    let mut editor = EditorController::new(sqlite_records(&path));
    editor.dispatch(EditorCommand::BeginEdit(id)).unwrap();
    editor.form.title = "Neuer Titel".into();
    editor.dispatch(EditorCommand::Save).unwrap();

    let book = &editor.books()[0];
    assert_eq!(book.title_text(), "Neuer Titel");
    assert_eq!(book.cover, cover);
    assert_eq!(book.documents.len(), 1);
    assert_eq!(book.documents[0].media_type, "application/pdf");
}

#[test]
fn invalid_stored_content_shows_the_empty_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");
    let kv = SqliteStore::open(&path).unwrap();
    kv.set(DEFAULT_STORAGE_KEY, "{ not json").unwrap();

    let mut viewer = ViewerController::new(RecordStore::new(kv, DEFAULT_STORAGE_KEY), INTERVAL, true);
    assert!(viewer.books().is_empty());
    viewer.dispatch(ViewerCommand::Advance(Direction::Next), Instant::now());
    assert!(matches!(viewer.carousel(), CarouselView::Empty));
}
