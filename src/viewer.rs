//! Read-only side of the catalog: carousel position, autoplay timer, and the
//! detail overlay.

use std::time::{Duration, Instant};

use crate::db::KeyValueStore;
use crate::models::{Attachment, BookId, BookRecord, LooseValue, non_empty};
use crate::record_store::{RecordStore, StoredCollection};
use crate::video_links::embed_url;

/// Repeating timer driving automatic advance. Manual navigation restarts
/// it instead of pausing it.
#[derive(Debug, Clone)]
pub struct Autoplay {
    interval: Duration,
    next_tick: Option<Instant>,
}

impl Autoplay {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_tick: None,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.next_tick = Some(now + self.interval);
    }

    pub fn stop(&mut self) {
        self.next_tick = None;
    }

    pub fn restart(&mut self, now: Instant) {
        self.stop();
        self.start(now);
    }

    /// Returns true once per elapsed period and schedules the next one.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_tick {
            Some(at) if now >= at => {
                self.next_tick = Some(now + self.interval);
                true
            }
            _ => false,
        }
    }

    /// Time left until the next tick, for scheduling repaints.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.next_tick.map(|at| at.saturating_duration_since(now))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

impl Direction {
    fn step(self) -> isize {
        match self {
            Direction::Previous => -1,
            Direction::Next => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerCommand {
    Advance(Direction),
    Jump(usize),
    OpenDetail(BookId),
    CloseDetail,
    Reload,
}

/// One carousel card, borrowed from the loaded collection for a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CardView<'a> {
    pub index: usize,
    pub id: &'a BookId,
    pub title: &'a str,
    pub category: &'a str,
    pub description: &'a str,
    pub cover: &'a str,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CarouselView<'a> {
    Empty,
    Cards {
        cards: Vec<CardView<'a>>,
        /// One flag per indicator dot; exactly one is set.
        indicators: Vec<bool>,
    },
}

/// Everything the detail overlay displays for one record.
#[derive(Debug, Clone, PartialEq)]
pub struct BookDetail {
    pub id: BookId,
    pub title: String,
    pub category: String,
    pub cover: String,
    /// Label/value rows; only fields with content are included.
    pub meta: Vec<(&'static str, String)>,
    pub purchase_link: Option<String>,
    pub description: String,
    pub documents: Vec<Attachment>,
    pub videos: Vec<Attachment>,
    pub video_embeds: Vec<String>,
    pub images: Vec<Attachment>,
}

impl BookDetail {
    fn from_record(book: &BookRecord) -> Self {
        let mut meta = Vec::new();
        push_text(&mut meta, "Autor", &book.author);
        push_text(&mut meta, "Verlag", &book.publisher);
        push_loose(&mut meta, "Jahr", &book.year);
        push_loose(&mut meta, "Seiten", &book.pages);
        push_text(&mut meta, "ISBN", &book.isbn);
        if let Some(price) = non_empty(&book.price) {
            meta.push(("Preis", format!("{price} €")));
        }

        let description = non_empty(&book.full_description)
            .or_else(|| non_empty(&book.description))
            .unwrap_or_default()
            .to_string();

        Self {
            id: book.id.clone(),
            title: book.title_text().to_string(),
            category: book.category_or_default().to_string(),
            cover: book.cover_or_placeholder().to_string(),
            meta,
            purchase_link: non_empty(&book.link).map(str::to_string),
            description,
            documents: book.documents.clone(),
            videos: book.videos.clone(),
            video_embeds: book.video_urls.iter().map(|url| embed_url(url)).collect(),
            images: book.images.clone(),
        }
    }

    pub fn has_videos(&self) -> bool {
        !self.videos.is_empty() || !self.video_embeds.is_empty()
    }
}

type MetaRows = Vec<(&'static str, String)>;

fn push_text(meta: &mut MetaRows, label: &'static str, value: &Option<String>) {
    if let Some(value) = non_empty(value) {
        meta.push((label, value.to_string()));
    }
}

fn push_loose(meta: &mut MetaRows, label: &'static str, value: &Option<LooseValue>) {
    if let Some(value) = value.as_ref().filter(|value| !value.is_blank()) {
        meta.push((label, value.to_string()));
    }
}

/// Example record shown when the catalog was never written and the
/// configuration asks for it. It is never persisted.
pub fn demo_record() -> BookRecord {
    BookRecord {
        category: Some("Künstliche Intelligenz".into()),
        description: Some(
            "Entdecken Sie die neuesten Entwicklungen in der KI und wie sie unsere Welt transformiert."
                .into(),
        ),
        full_description: Some(
            "Ein umfassender Leitfaden zu den neuesten KI-Technologien und deren praktischer Anwendung in Unternehmen und Alltag."
                .into(),
        ),
        author: Some("Max Mustermann".into()),
        price: Some("24,99".into()),
        isbn: Some("978-3-16-148410-0".into()),
        pages: Some(LooseValue::Number(250u64.into())),
        publisher: Some("Tech Verlag".into()),
        year: Some(LooseValue::Number(2024u64.into())),
        link: Some("#".into()),
        ..BookRecord::new(BookId::generate(&[]), "Beispiel: KI Revolution 2025")
    }
}

pub struct ViewerController<S> {
    store: RecordStore<S>,
    books: Vec<BookRecord>,
    position: usize,
    autoplay: Autoplay,
    detail: Option<BookDetail>,
    show_demo_when_unset: bool,
}

impl<S: KeyValueStore> ViewerController<S> {
    pub fn new(store: RecordStore<S>, autoplay_interval: Duration, show_demo_when_unset: bool) -> Self {
        let mut viewer = Self {
            store,
            books: Vec::new(),
            position: 0,
            autoplay: Autoplay::new(autoplay_interval),
            detail: None,
            show_demo_when_unset,
        };
        viewer.books = viewer.read_books();
        log::info!("viewer loaded {} records", viewer.books.len());
        viewer
    }

    fn read_books(&self) -> Vec<BookRecord> {
        match self.store.read() {
            StoredCollection::Unset if self.show_demo_when_unset => vec![demo_record()],
            stored => stored.into_books(),
        }
    }

    pub fn books(&self) -> &[BookRecord] {
        &self.books
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn autoplay(&self) -> &Autoplay {
        &self.autoplay
    }

    pub fn detail(&self) -> Option<&BookDetail> {
        self.detail.as_ref()
    }

    pub fn start_autoplay(&mut self, now: Instant) {
        self.autoplay.start(now);
    }

    /// Applies a user action. Navigation restarts the autoplay period.
    pub fn dispatch(&mut self, command: ViewerCommand, now: Instant) {
        match command {
            ViewerCommand::Advance(direction) => {
                self.advance(direction);
                self.autoplay.restart(now);
            }
            ViewerCommand::Jump(index) => {
                self.jump(index);
                self.autoplay.restart(now);
            }
            ViewerCommand::OpenDetail(id) => self.open_detail(&id),
            ViewerCommand::CloseDetail => self.close_detail(),
            ViewerCommand::Reload => self.reload(),
        }
    }

    /// Advances on autoplay ticks; returns true when the position moved.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.autoplay.poll(now) || self.books.is_empty() {
            return false;
        }
        self.advance(Direction::Next);
        true
    }

    pub fn advance(&mut self, direction: Direction) {
        let len = self.books.len() as isize;
        if len == 0 {
            return;
        }
        let next = (self.position as isize + direction.step() + len) % len;
        self.position = next as usize;
    }

    pub fn jump(&mut self, index: usize) {
        if index < self.books.len() {
            self.position = index;
        } else {
            log::debug!("ignoring jump to {index}, only {} cards", self.books.len());
        }
    }

    pub fn open_detail(&mut self, id: &BookId) {
        if let Some(book) = self.books.iter().find(|book| &book.id == id) {
            self.detail = Some(BookDetail::from_record(book));
        }
    }

    pub fn close_detail(&mut self) {
        self.detail = None;
    }

    /// Re-reads the store and clamps the position into the new range.
    pub fn reload(&mut self) {
        self.books = self.read_books();
        self.position = self.position.min(self.books.len().saturating_sub(1));
        if let Some(detail) = &self.detail {
            let id = detail.id.clone();
            self.detail = None;
            self.open_detail(&id);
        }
        log::info!("viewer reloaded {} records", self.books.len());
    }

    pub fn carousel(&self) -> CarouselView<'_> {
        if self.books.is_empty() {
            return CarouselView::Empty;
        }
        let cards = self
            .books
            .iter()
            .enumerate()
            .map(|(index, book)| CardView {
                index,
                id: &book.id,
                title: book.title_text(),
                category: book.category_or_default(),
                description: non_empty(&book.description).unwrap_or_default(),
                cover: book.cover_or_placeholder(),
                active: index == self.position,
            })
            .collect();
        let indicators = (0..self.books.len()).map(|index| index == self.position).collect();
        CarouselView::Cards { cards, indicators }
    }
}
