use std::time::{Duration, Instant};

use eframe::{App, egui};
use egui::{Color32, Key, RichText};

use crate::config::CatalogConfig;
use crate::data_uri::write_attachment;
use crate::models::{Attachment, Notice, NoticeKind};
use crate::record_store::{DynStore, RecordStore};
use crate::textures::{TextureCache, cover_image};
use crate::viewer::{BookDetail, CardView, CarouselView, Direction, ViewerCommand, ViewerController};

const CARD_WIDTH: f32 = 220.0;
const CARD_COVER_SIZE: egui::Vec2 = egui::vec2(180.0, 270.0);
const DETAIL_COVER_SIZE: egui::Vec2 = egui::vec2(200.0, 300.0);
const GALLERY_IMAGE_SIZE: egui::Vec2 = egui::vec2(160.0, 160.0);
const ACCENT: Color32 = Color32::from_rgb(0x40, 0xe0, 0xd0);

/// Public-facing carousel window.
pub struct CatalogApp {
    config: CatalogConfig,
    viewer: ViewerController<DynStore>,
    textures: TextureCache,
    scrolled_to: Option<usize>,
    notice: Option<(Notice, Instant)>,
}

impl CatalogApp {
    pub fn new(config: CatalogConfig, store: RecordStore<DynStore>) -> Self {
        let mut viewer =
            ViewerController::new(store, config.autoplay_interval(), config.show_demo_when_unset);
        viewer.start_autoplay(Instant::now());
        Self {
            config,
            viewer,
            textures: TextureCache::default(),
            scrolled_to: None,
            notice: None,
        }
    }

    fn keyboard_commands(ctx: &egui::Context, commands: &mut Vec<ViewerCommand>) {
        ctx.input(|input| {
            if input.key_pressed(Key::ArrowLeft) {
                commands.push(ViewerCommand::Advance(Direction::Previous));
            }
            if input.key_pressed(Key::ArrowRight) {
                commands.push(ViewerCommand::Advance(Direction::Next));
            }
            if input.key_pressed(Key::Escape) {
                commands.push(ViewerCommand::CloseDetail);
            }
            if input.key_pressed(Key::F5) {
                commands.push(ViewerCommand::Reload);
            }
        });
    }

    fn render_carousel(&mut self, ui: &mut egui::Ui, commands: &mut Vec<ViewerCommand>) {
        let position = self.viewer.position();
        let (cards, indicators) = match self.viewer.carousel() {
            CarouselView::Empty => {
                ui.vertical_centered(|ui| {
                    ui.add_space(80.0);
                    ui.heading("Noch keine Bücher vorhanden");
                    ui.label("Fügen Sie Ihr erstes Buch im Admin-Bereich (catalog_admin) hinzu.");
                });
                return;
            }
            CarouselView::Cards { cards, indicators } => (cards, indicators),
        };

        let needs_scroll = self.scrolled_to != Some(position);
        let textures = &mut self.textures;

        ui.horizontal(|ui| {
            if ui.button(RichText::new("<").size(28.0)).clicked() {
                commands.push(ViewerCommand::Advance(Direction::Previous));
            }

            let available = (ui.available_width() - 48.0).max(CARD_WIDTH);
            let height = (ui.available_height() - 40.0).max(CARD_COVER_SIZE.y + 120.0);
            ui.allocate_ui(egui::vec2(available, height), |ui| {
                egui::ScrollArea::horizontal().show(ui, |ui| {
                    ui.horizontal(|ui| {
                        for card in &cards {
                            let response = render_card(ui, textures, card, commands);
                            if card.active && needs_scroll {
                                response.scroll_to_me(Some(egui::Align::Center));
                            }
                        }
                    });
                });
            });

            if ui.button(RichText::new(">").size(28.0)).clicked() {
                commands.push(ViewerCommand::Advance(Direction::Next));
            }
        });
        self.scrolled_to = Some(position);

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            let dots_width = indicators.len() as f32 * 22.0;
            ui.add_space(((ui.available_width() - dots_width) / 2.0).max(0.0));
            for (index, active) in indicators.iter().enumerate() {
                let dot = if *active { "●" } else { "○" };
                let text = RichText::new(dot).size(16.0).color(if *active {
                    ACCENT
                } else {
                    Color32::GRAY
                });
                if ui.add(egui::Button::new(text).frame(false)).clicked() {
                    commands.push(ViewerCommand::Jump(index));
                }
            }
        });
    }

    fn render_detail(&mut self, ctx: &egui::Context, commands: &mut Vec<ViewerCommand>) {
        let Self {
            config,
            viewer,
            textures,
            notice,
            ..
        } = self;
        let Some(detail) = viewer.detail() else {
            return;
        };

        let mut open = true;
        egui::Window::new(RichText::new(&detail.title).strong())
            .id(egui::Id::new("book-detail"))
            .open(&mut open)
            .collapsible(false)
            .resizable(true)
            .default_width(720.0)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    render_detail_body(ui, textures, config, notice, detail);
                });
            });

        if !open {
            commands.push(ViewerCommand::CloseDetail);
        }
    }

    fn render_notice(&mut self, ctx: &egui::Context) {
        let Some((notice, shown_at)) = &self.notice else {
            return;
        };
        if shown_at.elapsed() >= self.config.notice_duration() {
            self.notice = None;
            return;
        }
        show_notice(ctx, notice);
        ctx.request_repaint_after(Duration::from_millis(250));
    }
}

fn render_card(
    ui: &mut egui::Ui,
    textures: &mut TextureCache,
    card: &CardView<'_>,
    commands: &mut Vec<ViewerCommand>,
) -> egui::Response {
    let stroke = if card.active {
        egui::Stroke::new(2.0, ACCENT)
    } else {
        egui::Stroke::new(1.0, Color32::from_gray(70))
    };
    egui::Frame::group(ui.style())
        .stroke(stroke)
        .inner_margin(10.0)
        .show(ui, |ui| {
            ui.set_width(CARD_WIDTH);
            ui.vertical_centered(|ui| {
                cover_image(ui, textures, card.cover, CARD_COVER_SIZE);
                ui.label(RichText::new(card.category).small().color(ACCENT));
                ui.label(RichText::new(card.title).strong().size(17.0));
                ui.add(egui::Label::new(card.description).wrap(true));
                if ui.button("Mehr erfahren").clicked() {
                    commands.push(ViewerCommand::OpenDetail(card.id.clone()));
                }
            });
        })
        .response
}

fn render_detail_body(
    ui: &mut egui::Ui,
    textures: &mut TextureCache,
    config: &CatalogConfig,
    notice: &mut Option<(Notice, Instant)>,
    detail: &BookDetail,
) {
    ui.horizontal_top(|ui| {
        cover_image(ui, textures, &detail.cover, DETAIL_COVER_SIZE);
        ui.vertical(|ui| {
            ui.heading(&detail.title);
            ui.label(RichText::new(&detail.category).color(ACCENT));
            ui.add_space(6.0);
            for (label, value) in &detail.meta {
                ui.horizontal(|ui| {
                    ui.label(RichText::new(format!("{label}:")).strong());
                    ui.label(value);
                });
            }
            if let Some(link) = &detail.purchase_link {
                ui.add_space(6.0);
                ui.hyperlink_to("Jetzt kaufen", link);
            }
        });
    });

    ui.add_space(10.0);
    ui.add(egui::Label::new(&detail.description).wrap(true));

    if !detail.documents.is_empty() {
        ui.separator();
        ui.heading("Dokumente");
        for document in &detail.documents {
            attachment_row(ui, config, notice, document);
        }
    }

    if detail.has_videos() {
        ui.separator();
        ui.heading("Videos");
        for video in &detail.videos {
            attachment_row(ui, config, notice, video);
        }
        for url in &detail.video_embeds {
            ui.hyperlink_to(url, url);
        }
    }

    if !detail.images.is_empty() {
        ui.separator();
        ui.heading("Weitere Bilder");
        ui.horizontal_wrapped(|ui| {
            for image in &detail.images {
                cover_image(ui, textures, &image.data, GALLERY_IMAGE_SIZE)
                    .on_hover_text(&image.name);
            }
        });
    }
}

fn attachment_row(
    ui: &mut egui::Ui,
    config: &CatalogConfig,
    notice: &mut Option<(Notice, Instant)>,
    attachment: &Attachment,
) {
    ui.horizontal(|ui| {
        ui.label(&attachment.name);
        ui.label(RichText::new(&attachment.media_type).small().weak());
        if ui.button("Herunterladen").clicked() {
            let message = match write_attachment(attachment, &config.download_dir) {
                Ok(path) => Notice::success(format!("Gespeichert unter {}", path.display())),
                Err(err) => {
                    log::warn!("download of {} failed: {err}", attachment.name);
                    Notice::error(format!("Speichern fehlgeschlagen: {err}"))
                }
            };
            *notice = Some((message, Instant::now()));
        }
    });
}

/// Small toast in the top-right corner.
pub fn show_notice(ctx: &egui::Context, notice: &Notice) {
    let fill = match notice.kind {
        NoticeKind::Success => ACCENT,
        NoticeKind::Error => Color32::from_rgb(0xff, 0x44, 0x44),
    };
    egui::Area::new(egui::Id::new("catalog-notice"))
        .anchor(egui::Align2::RIGHT_TOP, [-20.0, 20.0])
        .order(egui::Order::Foreground)
        .show(ctx, |ui| {
            egui::Frame::none()
                .fill(fill)
                .rounding(10.0)
                .inner_margin(egui::Margin::symmetric(20.0, 12.0))
                .show(ui, |ui| {
                    ui.label(RichText::new(&notice.message).color(Color32::WHITE));
                });
        });
}

impl App for CatalogApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        let mut commands = Vec::new();
        Self::keyboard_commands(ctx, &mut commands);

        egui::TopBottomPanel::top("catalog-header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Buchkatalog");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Neu laden").clicked() {
                        commands.push(ViewerCommand::Reload);
                    }
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.render_carousel(ui, &mut commands);
        });

        self.render_detail(ctx, &mut commands);
        self.render_notice(ctx);

        for command in commands {
            if command == ViewerCommand::Reload {
                self.textures.clear();
                self.scrolled_to = None;
            }
            self.viewer.dispatch(command, now);
        }

        self.viewer.tick(now);
        if let Some(remaining) = self.viewer.autoplay().remaining(Instant::now()) {
            ctx.request_repaint_after(remaining);
        }
    }
}
