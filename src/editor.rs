//! Authoring side of the catalog: draft form, staged uploads, and the
//! create/update/delete lifecycle against the record store.

use std::collections::BTreeMap;

use crate::assets::{AssetLoaded, StageTicket};
use crate::data_uri::attachment_from_bytes;
use crate::db::KeyValueStore;
use crate::error::CatalogResult;
use crate::models::{AssetKind, Attachment, BookId, BookRecord, LooseValue, non_empty};
use crate::record_store::RecordStore;
use crate::video_links::{join_video_urls, parse_video_urls};

const EXCERPT_CHARS: usize = 100;

/// Text fields of the editor form, exactly as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookForm {
    pub title: String,
    pub category: String,
    pub description: String,
    pub full_description: String,
    pub author: String,
    pub price: String,
    pub isbn: String,
    pub pages: String,
    pub publisher: String,
    pub year: String,
    pub link: String,
    /// Comma-separated external video links.
    pub video_urls: String,
}

impl BookForm {
    fn from_record(book: &BookRecord) -> Self {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        let loose = |value: &Option<LooseValue>| {
            value.as_ref().map(ToString::to_string).unwrap_or_default()
        };
        Self {
            title: text(&book.title),
            category: text(&book.category),
            description: text(&book.description),
            full_description: text(&book.full_description),
            author: text(&book.author),
            price: text(&book.price),
            isbn: text(&book.isbn),
            pages: loose(&book.pages),
            publisher: text(&book.publisher),
            year: loose(&book.year),
            link: text(&book.link),
            video_urls: join_video_urls(&book.video_urls),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagedAssets {
    pub cover: Option<String>,
    pub documents: Vec<Attachment>,
    pub videos: Vec<Attachment>,
    pub images: Vec<Attachment>,
}

impl StagedAssets {
    pub fn list(&self, kind: AssetKind) -> &[Attachment] {
        match kind {
            AssetKind::Cover => &[],
            AssetKind::Documents => &self.documents,
            AssetKind::Videos => &self.videos,
            AssetKind::Images => &self.images,
        }
    }

    fn list_mut(&mut self, kind: AssetKind) -> Option<&mut Vec<Attachment>> {
        match kind {
            AssetKind::Cover => None,
            AssetKind::Documents => Some(&mut self.documents),
            AssetKind::Videos => Some(&mut self.videos),
            AssetKind::Images => Some(&mut self.images),
        }
    }

    fn put(&mut self, kind: AssetKind, attachment: Attachment) {
        match self.list_mut(kind) {
            Some(list) => list.push(attachment),
            None => self.cover = Some(attachment.data),
        }
    }

    /// Removes the entry at `index`; returns false for the cover slot or an
    /// out-of-range index.
    pub fn remove(&mut self, kind: AssetKind, index: usize) -> bool {
        match self.list_mut(kind) {
            Some(list) if index < list.len() => {
                list.remove(index);
                true
            }
            _ => false,
        }
    }
}

/// A card in the editor's record list.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminCard {
    pub id: BookId,
    pub title: String,
    pub category: String,
    pub excerpt: String,
    pub cover: String,
}

impl AdminCard {
    fn from_record(book: &BookRecord) -> Self {
        let excerpt = match non_empty(&book.description) {
            Some(description) => {
                let head: String = description.chars().take(EXCERPT_CHARS).collect();
                format!("{head}...")
            }
            None => String::new(),
        };
        Self {
            id: book.id.clone(),
            title: book.title_text().to_string(),
            category: book.category_or_default().to_string(),
            excerpt,
            cover: book.cover_or_placeholder().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorCommand {
    BeginCreate,
    BeginEdit(BookId),
    CloseForm,
    RemoveStaged { kind: AssetKind, index: usize },
    Save,
    RequestDelete(BookId),
    ConfirmDelete,
    CancelDelete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    Nothing,
    Saved { id: BookId, created: bool },
    Deleted { id: BookId, removed: usize },
}

pub struct EditorController<S> {
    store: RecordStore<S>,
    books: Vec<BookRecord>,
    draft_id: Option<BookId>,
    pub form: BookForm,
    staged: StagedAssets,
    session: u64,
    next_seq: u64,
    // Reads are applied in submission order; a finished read waits in
    // `ready` until every earlier one has finished too.
    pending: BTreeMap<u64, AssetKind>,
    ready: BTreeMap<u64, Option<Attachment>>,
    pending_delete: Option<BookId>,
}

impl<S: KeyValueStore> EditorController<S> {
    pub fn new(store: RecordStore<S>) -> Self {
        let books = store.load();
        log::info!("editor loaded {} records", books.len());
        Self {
            store,
            books,
            draft_id: None,
            form: BookForm::default(),
            staged: StagedAssets::default(),
            session: 0,
            next_seq: 0,
            pending: BTreeMap::new(),
            ready: BTreeMap::new(),
            pending_delete: None,
        }
    }

    pub fn books(&self) -> &[BookRecord] {
        &self.books
    }

    pub fn admin_cards(&self) -> Vec<AdminCard> {
        self.books.iter().map(AdminCard::from_record).collect()
    }

    pub fn draft_id(&self) -> Option<&BookId> {
        self.draft_id.as_ref()
    }

    pub fn staged(&self) -> &StagedAssets {
        &self.staged
    }

    /// Cover shown in the form: the staged one, else the stored one.
    pub fn cover_preview(&self) -> Option<&str> {
        if let Some(cover) = self.staged.cover.as_deref() {
            return Some(cover);
        }
        let id = self.draft_id.as_ref()?;
        let book = self.books.iter().find(|book| &book.id == id)?;
        non_empty(&book.cover)
    }

    pub fn pending_reads(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_delete(&self) -> Option<&BookId> {
        self.pending_delete.as_ref()
    }

    pub fn dispatch(&mut self, command: EditorCommand) -> CatalogResult<EditorEvent> {
        match command {
            EditorCommand::BeginCreate => self.begin_create(),
            EditorCommand::BeginEdit(id) => {
                self.begin_edit(&id);
            }
            EditorCommand::CloseForm => self.reset_draft(),
            EditorCommand::RemoveStaged { kind, index } => {
                self.remove_staged(kind, index);
            }
            EditorCommand::Save => {
                let (id, created) = self.save()?;
                return Ok(EditorEvent::Saved { id, created });
            }
            EditorCommand::RequestDelete(id) => self.request_delete(id),
            EditorCommand::ConfirmDelete => {
                if let Some((id, removed)) = self.confirm_delete()? {
                    return Ok(EditorEvent::Deleted { id, removed });
                }
            }
            EditorCommand::CancelDelete => self.cancel_delete(),
        }
        Ok(EditorEvent::Nothing)
    }

    pub fn begin_create(&mut self) {
        self.reset_draft();
    }

    /// Loads `id` into the draft. Unknown ids fall back to a fresh draft;
    /// the return value tells which happened.
    pub fn begin_edit(&mut self, id: &BookId) -> bool {
        self.reset_draft();
        let Some(book) = self.books.iter().find(|book| &book.id == id) else {
            log::debug!("record {id} not found, starting a new draft instead");
            return false;
        };

        self.form = BookForm::from_record(book);
        self.staged.documents = book.documents.clone();
        self.staged.videos = book.videos.clone();
        self.staged.images = book.images.clone();
        self.draft_id = Some(book.id.clone());
        true
    }

    fn reset_draft(&mut self) {
        self.draft_id = None;
        self.form = BookForm::default();
        self.staged = StagedAssets::default();
        self.session += 1;
        self.pending.clear();
        self.ready.clear();
    }

    /// Registers an upcoming read for `kind` and returns its ticket.
    pub fn reserve(&mut self, kind: AssetKind) -> StageTicket {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert(seq, kind);
        StageTicket {
            session: self.session,
            seq,
            kind,
        }
    }

    /// Applies a finished read. Results from an earlier draft are dropped.
    /// A failed read is returned to the caller and skipped in the ordering.
    pub fn complete(&mut self, loaded: AssetLoaded) -> CatalogResult<()> {
        let AssetLoaded { ticket, result } = loaded;
        if ticket.session != self.session || !self.pending.contains_key(&ticket.seq) {
            log::debug!("dropping stale asset read #{}", ticket.seq);
            return Ok(());
        }

        let outcome = match result {
            Ok(attachment) => {
                self.ready.insert(ticket.seq, Some(attachment));
                Ok(())
            }
            Err(err) => {
                self.ready.insert(ticket.seq, None);
                Err(err)
            }
        };
        self.flush_ready();
        outcome
    }

    fn flush_ready(&mut self) {
        while let Some((&seq, &kind)) = self.pending.first_key_value() {
            let Some(result) = self.ready.remove(&seq) else {
                break;
            };
            self.pending.remove(&seq);
            if let Some(attachment) = result {
                self.staged.put(kind, attachment);
            }
        }
    }

    /// Reserves a slot and hands its ticket to `submit`. A failed submission
    /// releases the slot so later reads are not held behind it.
    pub fn stage_via<F>(&mut self, kind: AssetKind, submit: F) -> CatalogResult<()>
    where
        F: FnOnce(StageTicket) -> CatalogResult<()>,
    {
        let ticket = self.reserve(kind);
        match submit(ticket) {
            Ok(()) => Ok(()),
            Err(err) => self.complete(AssetLoaded {
                ticket,
                result: Err(err),
            }),
        }
    }

    /// Stages content that is already in memory (e.g. a dropped file).
    pub fn stage_bytes(
        &mut self,
        kind: AssetKind,
        name: &str,
        media_type: Option<&str>,
        bytes: &[u8],
    ) -> CatalogResult<()> {
        let ticket = self.reserve(kind);
        let attachment = attachment_from_bytes(name, media_type, bytes);
        self.complete(AssetLoaded {
            ticket,
            result: Ok(attachment),
        })
    }

    pub fn remove_staged(&mut self, kind: AssetKind, index: usize) -> bool {
        self.staged.remove(kind, index)
    }

    /// Commits the draft. Returns the record id and whether it was created.
    pub fn save(&mut self) -> CatalogResult<(BookId, bool)> {
        let mut books = self.books.clone();
        let created = self.draft_id.is_none();
        let id = match &self.draft_id {
            Some(id) => id.clone(),
            None => BookId::generate(&books),
        };
        let mut record = self.build_record(id.clone());

        if created {
            books.push(record);
        } else if let Some(index) = books.iter().position(|book| book.id == id) {
            if record.cover.is_none() {
                record.cover = books[index].cover.clone();
            }
            books[index] = record;
        } else {
            log::warn!("record {id} vanished before it could be updated");
        }

        self.store.save(&books)?;
        log::info!(
            "{} record {id}; catalog now has {} records",
            if created { "created" } else { "updated" },
            books.len()
        );
        self.books = books;
        self.reset_draft();
        Ok((id, created))
    }

    /// Staged assets plus every read that already finished, in submission
    /// order. Reads still in flight are left out.
    fn settled_assets(&self) -> StagedAssets {
        let mut settled = self.staged.clone();
        for (seq, result) in &self.ready {
            if let (Some(kind), Some(attachment)) = (self.pending.get(seq), result) {
                settled.put(*kind, attachment.clone());
            }
        }
        settled
    }

    fn build_record(&self, id: BookId) -> BookRecord {
        let form = &self.form;
        let assets = self.settled_assets();
        BookRecord {
            id,
            title: Some(form.title.clone()),
            category: Some(form.category.clone()),
            description: Some(form.description.clone()),
            full_description: Some(form.full_description.clone()),
            author: Some(form.author.clone()),
            price: Some(form.price.clone()),
            isbn: Some(form.isbn.clone()),
            pages: Some(LooseValue::Text(form.pages.clone())),
            publisher: Some(form.publisher.clone()),
            year: Some(LooseValue::Text(form.year.clone())),
            link: Some(form.link.clone()),
            cover: assets.cover,
            documents: assets.documents,
            videos: assets.videos,
            video_urls: parse_video_urls(&form.video_urls),
            images: assets.images,
            absent_keys: Vec::new(),
        }
    }

    pub fn request_delete(&mut self, id: BookId) {
        self.pending_delete = Some(id);
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// Removes every record matching the pending id and persists.
    pub fn confirm_delete(&mut self) -> CatalogResult<Option<(BookId, usize)>> {
        let Some(id) = self.pending_delete.take() else {
            return Ok(None);
        };

        let remaining: Vec<BookRecord> = self
            .books
            .iter()
            .filter(|book| book.id != id)
            .cloned()
            .collect();
        let removed = self.books.len() - remaining.len();
        self.store.save(&remaining)?;
        self.books = remaining;
        log::info!("deleted {removed} record(s) with id {id}");
        Ok(Some((id, removed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_uri;
    use crate::db::MemoryStore;
    use crate::error::CatalogError;
    use crate::record_store::DEFAULT_STORAGE_KEY;

    fn editor() -> EditorController<MemoryStore> {
        EditorController::new(RecordStore::new(MemoryStore::new(), DEFAULT_STORAGE_KEY))
    }

    fn create(editor: &mut EditorController<MemoryStore>, title: &str) -> BookId {
        editor.begin_create();
        editor.form.title = title.to_string();
        editor.save().unwrap().0
    }

    fn attachment(name: &str) -> Attachment {
        attachment_from_bytes(name, None, name.as_bytes())
    }

    #[test]
    fn create_assigns_unique_ids() {
        let mut editor = editor();
        let a = create(&mut editor, "A");
        let b = create(&mut editor, "B");
        assert_ne!(a, b);
        assert_eq!(editor.books().len(), 2);
        assert_eq!(editor.books()[0].title_text(), "A");
        assert_eq!(editor.books()[1].title_text(), "B");
    }

    #[test]
    fn update_replaces_in_place_and_keeps_cover() {
        let mut editor = editor();
        editor.begin_create();
        editor.form.title = "A".into();
        editor
            .stage_bytes(AssetKind::Cover, "a.png", Some("image/png"), &[1, 2, 3])
            .unwrap();
        let a = editor.save().unwrap().0;
        create(&mut editor, "B");
        let cover_before = editor.books()[0].cover.clone();
        assert!(cover_before.is_some());

        assert!(editor.begin_edit(&a));
        assert_eq!(editor.cover_preview(), cover_before.as_deref());
        editor.form.title = "A2".into();
        let (id, created) = editor.save().unwrap();

        assert_eq!(id, a);
        assert!(!created);
        assert_eq!(editor.books()[0].title_text(), "A2");
        assert_eq!(editor.books()[0].cover, cover_before);
        assert_eq!(editor.books()[1].title_text(), "B");
    }

    #[test]
    fn staged_cover_replaces_stored_cover() {
        let mut editor = editor();
        editor.begin_create();
        editor
            .stage_bytes(AssetKind::Cover, "old.png", Some("image/png"), b"old")
            .unwrap();
        let id = editor.save().unwrap().0;

        editor.begin_edit(&id);
        editor
            .stage_bytes(AssetKind::Cover, "new.png", Some("image/png"), b"new")
            .unwrap();
        editor.save().unwrap();

        let cover = editor.books()[0].cover.as_deref().unwrap();
        assert_eq!(data_uri::decode(cover).unwrap().bytes, b"new");
    }

    #[test]
    fn begin_edit_of_unknown_id_starts_fresh() {
        let mut editor = editor();
        create(&mut editor, "A");
        editor.form.title = "leftover".into();
        assert!(!editor.begin_edit(&BookId::from("missing")));
        assert_eq!(editor.draft_id(), None);
        assert_eq!(editor.form, BookForm::default());

        editor.form.title = "C".into();
        let (_, created) = editor.save().unwrap();
        assert!(created);
        assert_eq!(editor.books().len(), 2);
    }

    #[test]
    fn edit_prefills_form_from_record() {
        let mut editor = editor();
        editor.begin_create();
        editor.form.title = "Titel".into();
        editor.form.pages = "250".into();
        editor.form.video_urls = "https://a.example, https://b.example".into();
        let id = editor.save().unwrap().0;

        editor.begin_edit(&id);
        assert_eq!(editor.form.title, "Titel");
        assert_eq!(editor.form.pages, "250");
        assert_eq!(editor.form.video_urls, "https://a.example, https://b.example");
        assert_eq!(
            editor.books()[0].video_urls,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn remove_staged_keeps_relative_order() {
        let mut editor = editor();
        editor.begin_create();
        for name in ["a.pdf", "b.pdf", "c.pdf"] {
            editor
                .stage_bytes(AssetKind::Documents, name, None, name.as_bytes())
                .unwrap();
        }

        assert!(editor.remove_staged(AssetKind::Documents, 1));
        let names: Vec<&str> = editor
            .staged()
            .documents
            .iter()
            .map(|doc| doc.name.as_str())
            .collect();
        assert_eq!(names, ["a.pdf", "c.pdf"]);

        assert!(!editor.remove_staged(AssetKind::Documents, 5));
        assert!(!editor.remove_staged(AssetKind::Cover, 0));
        assert_eq!(editor.staged().documents.len(), 2);
    }

    #[test]
    fn out_of_order_reads_are_applied_in_submission_order() {
        let mut editor = editor();
        editor.begin_create();
        let first = editor.reserve(AssetKind::Images);
        let second = editor.reserve(AssetKind::Images);
        let third = editor.reserve(AssetKind::Images);

        editor
            .complete(AssetLoaded {
                ticket: third,
                result: Ok(attachment("3.png")),
            })
            .unwrap();
        editor
            .complete(AssetLoaded {
                ticket: second,
                result: Ok(attachment("2.png")),
            })
            .unwrap();
        assert!(editor.staged().images.is_empty());
        assert_eq!(editor.pending_reads(), 3);

        editor
            .complete(AssetLoaded {
                ticket: first,
                result: Ok(attachment("1.png")),
            })
            .unwrap();
        let names: Vec<&str> = editor.staged().images.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["1.png", "2.png", "3.png"]);
        assert_eq!(editor.pending_reads(), 0);
    }

    #[test]
    fn failed_read_does_not_block_later_ones() {
        let mut editor = editor();
        editor.begin_create();
        let first = editor.reserve(AssetKind::Documents);
        let second = editor.reserve(AssetKind::Documents);

        editor
            .complete(AssetLoaded {
                ticket: second,
                result: Ok(attachment("b.pdf")),
            })
            .unwrap();
        let err = editor.complete(AssetLoaded {
            ticket: first,
            result: Err(CatalogError::InvalidDataUri("boom".into())),
        });
        assert!(err.is_err());
        assert_eq!(editor.staged().documents.len(), 1);
        assert_eq!(editor.pending_reads(), 0);
    }

    #[test]
    fn save_keeps_finished_reads_waiting_behind_a_pending_one() {
        let mut editor = editor();
        editor.begin_create();
        editor.form.title = "A".into();
        let slow = editor.reserve(AssetKind::Documents);
        editor
            .stage_bytes(AssetKind::Documents, "b.pdf", None, b"%PDF-1.4")
            .unwrap();
        editor
            .stage_bytes(AssetKind::Cover, "c.png", Some("image/png"), &[1, 2])
            .unwrap();
        assert!(editor.staged().documents.is_empty());

        let (id, _) = editor.save().unwrap();
        let book = &editor.books()[0];
        assert_eq!(book.id, id);
        let names: Vec<_> = book.documents.iter().map(|doc| doc.name.as_str()).collect();
        assert_eq!(names, ["b.pdf"]);
        assert!(book.cover.as_deref().is_some_and(|cover| cover.starts_with("data:image/png")));

        // The slow read belongs to the saved draft and no longer applies.
        editor
            .complete(AssetLoaded {
                ticket: slow,
                result: Ok(attachment("a.pdf")),
            })
            .unwrap();
        assert!(editor.staged().documents.is_empty());
        assert_eq!(editor.books()[0].documents.len(), 1);
    }

    #[test]
    fn failed_submission_releases_its_slot() {
        let mut editor = editor();
        editor.begin_create();
        let err = editor.stage_via(AssetKind::Images, |_ticket| {
            Err(CatalogError::Storage("worker gone".into()))
        });
        assert!(matches!(err, Err(CatalogError::Storage(_))));
        assert_eq!(editor.pending_reads(), 0);

        editor
            .stage_bytes(AssetKind::Images, "1.png", Some("image/png"), &[1])
            .unwrap();
        assert_eq!(editor.staged().images.len(), 1);
        assert_eq!(editor.pending_reads(), 0);
    }

    #[test]
    fn submitted_reads_stay_pending_until_completed() {
        let mut editor = editor();
        editor.begin_create();
        let mut submitted = None;
        editor
            .stage_via(AssetKind::Videos, |ticket| {
                submitted = Some(ticket);
                Ok(())
            })
            .unwrap();
        assert_eq!(editor.pending_reads(), 1);

        let ticket = submitted.unwrap();
        editor
            .complete(AssetLoaded {
                ticket,
                result: Ok(attachment("clip.mp4")),
            })
            .unwrap();
        assert_eq!(editor.staged().videos.len(), 1);
    }

    #[test]
    fn reads_from_a_closed_draft_are_dropped() {
        let mut editor = editor();
        editor.begin_create();
        let ticket = editor.reserve(AssetKind::Videos);
        editor.dispatch(EditorCommand::CloseForm).unwrap();

        editor
            .complete(AssetLoaded {
                ticket,
                result: Ok(attachment("clip.mp4")),
            })
            .unwrap();
        assert!(editor.staged().videos.is_empty());
    }

    #[test]
    fn delete_needs_confirmation() {
        let mut editor = editor();
        let a = create(&mut editor, "A");
        create(&mut editor, "B");

        editor.dispatch(EditorCommand::RequestDelete(a.clone())).unwrap();
        editor.dispatch(EditorCommand::CancelDelete).unwrap();
        assert_eq!(editor.books().len(), 2);

        editor.dispatch(EditorCommand::RequestDelete(a.clone())).unwrap();
        let event = editor.dispatch(EditorCommand::ConfirmDelete).unwrap();
        assert_eq!(event, EditorEvent::Deleted { id: a, removed: 1 });
        assert_eq!(editor.books().len(), 1);
        assert_eq!(editor.books()[0].title_text(), "B");
    }

    #[test]
    fn deleting_unknown_id_changes_nothing() {
        let mut editor = editor();
        create(&mut editor, "A");
        editor.request_delete(BookId::from("nope"));
        assert_eq!(editor.confirm_delete().unwrap(), Some((BookId::from("nope"), 0)));
        assert_eq!(editor.books().len(), 1);
        assert_eq!(editor.confirm_delete().unwrap(), None);
    }

    #[test]
    fn admin_card_excerpt_is_char_safe() {
        let mut book = BookRecord::new(1u64, "Ä");
        book.description = Some("ü".repeat(150));
        let card = AdminCard::from_record(&book);
        assert_eq!(card.excerpt.chars().count(), EXCERPT_CHARS + 3);
        assert!(card.excerpt.ends_with("..."));
        assert_eq!(card.category, "Allgemein");

        book.description = None;
        assert_eq!(AdminCard::from_record(&book).excerpt, "");
    }

    #[test]
    fn size_tracks_creates_minus_deletes() {
        let mut editor = editor();
        let mut ids = Vec::new();
        for i in 0..6 {
            ids.push(create(&mut editor, &format!("Buch {i}")));
        }
        for id in ids.iter().step_by(2) {
            editor.request_delete(id.clone());
            editor.confirm_delete().unwrap();
        }
        assert_eq!(editor.books().len(), 3);

        let mut seen = std::collections::HashSet::new();
        assert!(editor.books().iter().all(|book| seen.insert(book.id.clone())));
    }
}
