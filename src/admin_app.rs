use std::path::PathBuf;
use std::time::{Duration, Instant};

use eframe::{App, egui};
use egui::{Color32, RichText};

use crate::app::show_notice;
use crate::assets::AssetLoader;
use crate::config::CatalogConfig;
use crate::editor::{AdminCard, EditorCommand, EditorController, EditorEvent};
use crate::models::{AssetKind, Notice};
use crate::record_store::{DynStore, RecordStore};
use crate::textures::{TextureCache, cover_image};

const LIST_COVER_SIZE: egui::Vec2 = egui::vec2(90.0, 135.0);
const FORM_COVER_SIZE: egui::Vec2 = egui::vec2(120.0, 180.0);

/// Editor window: record list plus the create/edit form.
pub struct AdminApp {
    config: CatalogConfig,
    editor: EditorController<DynStore>,
    loader: AssetLoader,
    textures: TextureCache,
    cards: Vec<AdminCard>,
    form_open: bool,
    drop_target: AssetKind,
    path_inputs: [String; 4],
    notice: Option<(Notice, Instant)>,
}

impl AdminApp {
    pub fn new(ctx: &egui::Context, config: CatalogConfig, store: RecordStore<DynStore>) -> Self {
        let repaint_ctx = ctx.clone();
        let loader = AssetLoader::spawn(move || repaint_ctx.request_repaint());
        let editor = EditorController::new(store);
        let cards = editor.admin_cards();
        Self {
            config,
            editor,
            loader,
            textures: TextureCache::default(),
            cards,
            form_open: false,
            drop_target: AssetKind::Cover,
            path_inputs: Default::default(),
            notice: None,
        }
    }

    fn notify(&mut self, notice: Notice) {
        self.notice = Some((notice, Instant::now()));
    }

    fn apply_loaded_assets(&mut self) {
        for loaded in self.loader.drain() {
            if let Err(err) = self.editor.complete(loaded) {
                self.notify(Notice::error(format!("Datei konnte nicht gelesen werden: {err}")));
            }
        }
    }

    fn stage_path(&mut self, kind: AssetKind, path: PathBuf) {
        let loader = &self.loader;
        if let Err(err) = self.editor.stage_via(kind, |ticket| loader.submit(ticket, path)) {
            self.notify(Notice::error(err.to_string()));
        }
    }

    fn stage_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|input| input.raw.dropped_files.clone());
        if dropped.is_empty() || !self.form_open {
            return;
        }

        let kind = self.drop_target;
        for file in dropped {
            if let Some(path) = file.path {
                self.stage_path(kind, path);
            } else if let Some(bytes) = file.bytes {
                let mime = Some(file.mime.as_str()).filter(|mime| !mime.is_empty());
                if let Err(err) = self.editor.stage_bytes(kind, &file.name, mime, &bytes) {
                    self.notify(Notice::error(err.to_string()));
                }
            }
        }
    }

    fn render_form(&mut self, ui: &mut egui::Ui, commands: &mut Vec<EditorCommand>) {
        let heading = if self.editor.draft_id().is_some() {
            "Buch bearbeiten"
        } else {
            "Neues Buch hinzufügen"
        };

        egui::Frame::group(ui.style()).inner_margin(12.0).show(ui, |ui| {
            ui.heading(heading);
            ui.add_space(6.0);

            let form = &mut self.editor.form;
            egui::Grid::new("book-form")
                .num_columns(2)
                .spacing([12.0, 6.0])
                .show(ui, |ui| {
                    text_row(ui, "Titel", &mut form.title);
                    text_row(ui, "Kategorie", &mut form.category);
                    text_row(ui, "Autor", &mut form.author);
                    text_row(ui, "Preis", &mut form.price);
                    text_row(ui, "ISBN", &mut form.isbn);
                    text_row(ui, "Seiten", &mut form.pages);
                    text_row(ui, "Verlag", &mut form.publisher);
                    text_row(ui, "Jahr", &mut form.year);
                    text_row(ui, "Link", &mut form.link);
                    text_row(ui, "Video-URLs (kommagetrennt)", &mut form.video_urls);

                    ui.label("Kurzbeschreibung");
                    ui.add(egui::TextEdit::multiline(&mut form.description).desired_rows(2));
                    ui.end_row();

                    ui.label("Ausführliche Beschreibung");
                    ui.add(egui::TextEdit::multiline(&mut form.full_description).desired_rows(5));
                    ui.end_row();
                });

            ui.separator();
            ui.label(
                RichText::new("Dateien per Pfad hinzufügen oder ins Fenster ziehen.").weak(),
            );
            for kind in AssetKind::ALL {
                self.render_asset_section(ui, kind, commands);
            }

            let pending = self.editor.pending_reads();
            if pending > 0 {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(format!("{pending} Datei(en) werden gelesen..."));
                });
            }

            ui.separator();
            ui.horizontal(|ui| {
                if ui.button("Speichern").clicked() {
                    commands.push(EditorCommand::Save);
                }
                if ui.button("Abbrechen").clicked() {
                    commands.push(EditorCommand::CloseForm);
                }
            });
        });
    }

    fn render_asset_section(
        &mut self,
        ui: &mut egui::Ui,
        kind: AssetKind,
        commands: &mut Vec<EditorCommand>,
    ) {
        ui.add_space(6.0);
        ui.horizontal(|ui| {
            ui.label(RichText::new(kind.label()).strong());
            ui.radio_value(&mut self.drop_target, kind, "Ablageziel");
        });

        let input_index = kind as usize;
        let mut submit = false;
        ui.horizontal(|ui| {
            let edit = ui.add(
                egui::TextEdit::singleline(&mut self.path_inputs[input_index])
                    .hint_text("Dateipfad")
                    .desired_width(360.0),
            );
            let entered = edit.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));
            if ui.button("Hinzufügen").clicked() || entered {
                submit = true;
            }
        });
        if submit {
            let raw = std::mem::take(&mut self.path_inputs[input_index]);
            let raw = raw.trim();
            if !raw.is_empty() {
                self.stage_path(kind, PathBuf::from(raw));
            }
        }

        if kind.is_single_slot() {
            if let Some(cover) = self.editor.cover_preview() {
                cover_image(ui, &mut self.textures, cover, FORM_COVER_SIZE);
            }
            return;
        }

        for (index, file) in self.editor.staged().list(kind).iter().enumerate() {
            ui.horizontal(|ui| {
                ui.label(&file.name);
                ui.label(RichText::new(&file.media_type).small().weak());
                if ui.small_button("×").on_hover_text("Entfernen").clicked() {
                    commands.push(EditorCommand::RemoveStaged { kind, index });
                }
            });
        }
    }

    fn render_list(&mut self, ui: &mut egui::Ui, commands: &mut Vec<EditorCommand>) {
        if self.cards.is_empty() {
            ui.vertical_centered(|ui| {
                ui.add_space(40.0);
                ui.heading("Noch keine Bücher vorhanden");
                ui.label("Klicken Sie auf \"Neues Buch hinzufügen\", um Ihr erstes Buch anzulegen.");
            });
            return;
        }

        for card in &self.cards {
            egui::Frame::group(ui.style()).inner_margin(8.0).show(ui, |ui| {
                ui.horizontal_top(|ui| {
                    cover_image(ui, &mut self.textures, &card.cover, LIST_COVER_SIZE);
                    ui.vertical(|ui| {
                        ui.label(RichText::new(&card.category).small().weak());
                        ui.label(RichText::new(&card.title).strong().size(16.0));
                        ui.add(egui::Label::new(&card.excerpt).wrap(true));
                        ui.horizontal(|ui| {
                            if ui.button("Bearbeiten").clicked() {
                                commands.push(EditorCommand::BeginEdit(card.id.clone()));
                            }
                            if ui.button("Löschen").clicked() {
                                commands.push(EditorCommand::RequestDelete(card.id.clone()));
                            }
                        });
                    });
                });
            });
            ui.add_space(4.0);
        }
    }

    fn render_delete_confirmation(&self, ctx: &egui::Context, commands: &mut Vec<EditorCommand>) {
        if self.editor.pending_delete().is_none() {
            return;
        }
        egui::Window::new("Löschen bestätigen")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label("Möchten Sie dieses Buch wirklich löschen?");
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    if ui
                        .button(RichText::new("Löschen").color(Color32::from_rgb(0xff, 0x44, 0x44)))
                        .clicked()
                    {
                        commands.push(EditorCommand::ConfirmDelete);
                    }
                    if ui.button("Abbrechen").clicked() {
                        commands.push(EditorCommand::CancelDelete);
                    }
                });
            });
    }

    fn run_command(&mut self, command: EditorCommand) {
        match &command {
            EditorCommand::BeginCreate | EditorCommand::BeginEdit(_) => self.form_open = true,
            EditorCommand::CloseForm => self.form_open = false,
            _ => {}
        }

        match self.editor.dispatch(command) {
            Ok(EditorEvent::Saved { .. }) => {
                self.form_open = false;
                self.cards = self.editor.admin_cards();
                self.notify(Notice::success("Buch erfolgreich gespeichert!"));
            }
            Ok(EditorEvent::Deleted { .. }) => {
                self.cards = self.editor.admin_cards();
                self.notify(Notice::success("Buch erfolgreich gelöscht!"));
            }
            Ok(EditorEvent::Nothing) => {}
            Err(err) => {
                log::error!("editor command failed: {err}");
                self.notify(Notice::error(format!("Fehler: {err}")));
            }
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

fn text_row(ui: &mut egui::Ui, label: &str, value: &mut String) {
    ui.label(label);
    ui.add(egui::TextEdit::singleline(value).desired_width(360.0));
    ui.end_row();
}

impl App for AdminApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.apply_loaded_assets();
        self.stage_dropped_files(ctx);

        let mut commands = Vec::new();
        egui::TopBottomPanel::top("admin-header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Buchverwaltung");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Neues Buch hinzufügen").clicked() {
                        commands.push(EditorCommand::BeginCreate);
                    }
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                if self.form_open {
                    self.render_form(ui, &mut commands);
                    ui.add_space(12.0);
                }
                self.render_list(ui, &mut commands);
            });
        });

        self.render_delete_confirmation(ctx, &mut commands);
        self.render_notice(ctx);

        for command in commands {
            self.run_command(command);
        }
    }
}
