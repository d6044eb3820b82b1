use anyhow::anyhow;
use chrono::{Local, Utc};
use eframe::egui;
use egui::emath::TSTransform;
use egui::{CornerRadius, CursorIcon, RichText, Sense, Stroke, Ui, ViewportBuilder};
use image::ImageReader;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod controller;
mod fallback;
mod gesture;
mod host;
mod models;
mod news_client;
mod store;
mod theme;

use crate::config::AppConfig;
use crate::controller::{DisplayState, FetchTicket, HeadlineController};
use crate::fallback::ThreadRandom;
use crate::gesture::{PointerSample, SwipeFeedback, SwipeOutcome, SwipeRecognizer};
use crate::host::{EnvHost, HostMode};
use crate::models::{next_hour_boundary, Headline, HourKey};
use crate::news_client::{fetch_headline, FetchError, HeadlineSource, NewsApiClient};
use crate::store::{KeyValueStore, MemoryStore, SqliteStore};
use crate::theme::AppTheme;

type FetchResult = (FetchTicket, Result<Headline, FetchError>);

fn load_icon(path: &str) -> Result<egui::IconData, Box<dyn std::error::Error>> {
    let img = ImageReader::open(path)?.decode()?;
    let rgba_image = img.into_rgba8();
    let (width, height) = rgba_image.dimensions();

    Ok(egui::IconData {
        rgba: rgba_image.into_raw(),
        width,
        height,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("one_headline=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn open_store(config: &AppConfig) -> Box<dyn KeyValueStore> {
    let Some(data_dir) = &config.data_dir else {
        return Box::new(MemoryStore::default());
    };

    match SqliteStore::open(data_dir) {
        Ok(store) => {
            info!("Using headline store in {}", data_dir.display());
            Box::new(store)
        }
        Err(e) => {
            warn!("Failed to open headline store, state will not persist: {}", e);
            Box::new(MemoryStore::default())
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let source: Arc<dyn HeadlineSource> = Arc::new(NewsApiClient::new(config.endpoint.clone())?);
    let store = open_store(&config);
    let env_host = EnvHost::new(config.host_marker.clone());

    let mut options = eframe::NativeOptions {
        viewport: ViewportBuilder::default()
            .with_inner_size([440.0, 520.0])
            .with_min_inner_size([360.0, 420.0])
            .with_title("One Headline"),
        ..Default::default()
    };

    match load_icon("logo/logo.png") {
        Ok(icon) => options.viewport.icon = Some(Arc::new(icon)),
        Err(e) => warn!("Failed to load icon: {}", e),
    }

    eframe::run_native(
        "One Headline",
        options,
        Box::new(move |cc| {
            let is_dark_mode = cc
                .storage
                .and_then(|storage| storage.get_string("is_dark_mode"))
                .and_then(|s| s.parse::<bool>().ok())
                .unwrap_or(true);

            let host_mode = host::boot(&env_host);
            Ok(Box::new(OneHeadlineApp::new(store, source, host_mode, is_dark_mode)))
        }),
    )
    .map_err(|e| anyhow!("Failed to run window: {}", e))
}

/// User intents gathered while drawing, applied after the frame is laid out.
enum UiAction {
    Refresh,
    Dismiss,
    Undismiss,
    SaveKey,
    ClearKey,
    OpenLink(String),
    ToggleTheme,
}

struct OneHeadlineApp {
    controller: HeadlineController<Box<dyn KeyValueStore>>,
    source: Arc<dyn HeadlineSource>,
    fetch_tx: Sender<FetchResult>,
    fetch_rx: Receiver<FetchResult>,
    pending_fetches: usize,
    swipe: SwipeRecognizer,
    feedback: SwipeFeedback,
    api_key_input: String,
    host_mode: HostMode,
    theme: AppTheme,
    is_dark_mode: bool,
}

impl OneHeadlineApp {
    fn new(
        store: Box<dyn KeyValueStore>,
        source: Arc<dyn HeadlineSource>,
        host_mode: HostMode,
        is_dark_mode: bool,
    ) -> Self {
        let mut controller = HeadlineController::new(store, Box::new(ThreadRandom));
        controller.announce(host_mode.ready_text());
        let api_key_input = controller.credential().unwrap_or_default();
        let (fetch_tx, fetch_rx) = mpsc::channel();

        Self {
            controller,
            source,
            fetch_tx,
            fetch_rx,
            pending_fetches: 0,
            swipe: SwipeRecognizer::new(),
            feedback: SwipeFeedback::NEUTRAL,
            api_key_input,
            host_mode,
            theme: AppTheme::for_mode(is_dark_mode),
            is_dark_mode,
        }
    }

    fn start_fetch(&mut self, ticket: Option<FetchTicket>) {
        let Some(ticket) = ticket else {
            return;
        };

        info!("Fetching headline for {}", ticket.hour_key());
        let source = Arc::clone(&self.source);
        let tx = self.fetch_tx.clone();
        self.pending_fetches += 1;

        thread::spawn(move || {
            let outcome = fetch_headline(source.as_ref(), ticket.credential(), Utc::now());
            let _ = tx.send((ticket, outcome));
        });
    }

    fn collect_fetch_results(&mut self) {
        while let Ok((ticket, outcome)) = self.fetch_rx.try_recv() {
            self.pending_fetches = self.pending_fetches.saturating_sub(1);
            self.controller.complete_fetch(ticket, outcome, Local::now());
        }
    }

    /// Re-decide the display once the wall clock has moved into a new hour.
    fn roll_over_hour(&mut self) {
        let now = Local::now();
        let current = HourKey::from_time(&now);
        if self.controller.shown_hour() != Some(&current) {
            let ticket = self.controller.reconcile(now, false);
            self.start_fetch(ticket);
        }
    }

    fn handle_action(&mut self, action: UiAction) {
        let now = Local::now();
        match action {
            UiAction::Refresh => {
                let ticket = self.controller.force_refresh(now);
                self.start_fetch(ticket);
            }
            UiAction::Dismiss => self.controller.dismiss(now),
            UiAction::Undismiss => {
                let ticket = self.controller.undismiss(now);
                self.start_fetch(ticket);
            }
            UiAction::SaveKey => {
                if self.controller.set_credential(&self.api_key_input).is_ok() {
                    self.api_key_input = self.api_key_input.trim().to_string();
                    let ticket = self.controller.force_refresh(now);
                    self.start_fetch(ticket);
                }
            }
            UiAction::ClearKey => {
                self.controller.clear_credential();
                self.api_key_input.clear();
                let ticket = self.controller.force_refresh(now);
                self.start_fetch(ticket);
            }
            UiAction::OpenLink(url) => {
                if let Err(e) = open::that(&url) {
                    warn!("Failed to open URL: {}", e);
                }
            }
            UiAction::ToggleTheme => {
                self.is_dark_mode = !self.is_dark_mode;
                self.theme = AppTheme::for_mode(self.is_dark_mode);
            }
        }
    }

    fn render_header(&self, ui: &mut Ui, actions: &mut Vec<UiAction>) {
        ui.horizontal(|ui| {
            ui.vertical(|ui| {
                ui.label(RichText::new("One Headline").size(22.0).strong().color(self.theme.text));
                ui.label(
                    RichText::new("one per hour • anti-doomscroll")
                        .size(13.0)
                        .color(self.theme.secondary_text),
                );
            });

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let theme_icon = if self.is_dark_mode { "☀" } else { "🌙" };
                if ui
                    .add(egui::Button::new(RichText::new(theme_icon).size(16.0)).frame(false))
                    .on_hover_text("Toggle theme")
                    .clicked()
                {
                    actions.push(UiAction::ToggleTheme);
                }

                let pill_fill = match self.host_mode {
                    HostMode::Mini => self.theme.pill_mini,
                    HostMode::Web => self.theme.pill_web,
                };
                egui::Frame::new()
                    .fill(pill_fill)
                    .corner_radius(CornerRadius::same(10))
                    .inner_margin(egui::Margin::symmetric(8, 2))
                    .show(ui, |ui| {
                        ui.label(
                            RichText::new(self.host_mode.pill())
                                .size(11.0)
                                .strong()
                                .color(self.theme.button_foreground),
                        );
                    });
            });
        });
    }

    fn render_card(&mut self, ui: &mut Ui, actions: &mut Vec<UiAction>) {
        let theme = self.theme.clone();
        let state = self.controller.state().clone();
        let status = self.controller.status().label();
        let feedback = self.feedback;
        let api_key_input = &mut self.api_key_input;

        let transform = TSTransform::from_translation(egui::vec2(feedback.translation, 0.0));
        let card = ui.with_visual_transform(transform, |ui| {
            ui.multiply_opacity(feedback.opacity);
            egui::Frame::new()
                .fill(theme.card_background)
                .corner_radius(CornerRadius::same(12))
                .stroke(Stroke::new(1.0, theme.separator))
                .inner_margin(16.0)
                .show(ui, |ui| {
                    ui.set_width(ui.available_width());

                    ui.horizontal(|ui| {
                        ui.label(RichText::new("●").size(10.0).color(theme.highlight));
                        ui.label(RichText::new(&status).size(12.0).strong().color(theme.secondary_text));
                    });
                    ui.add_space(10.0);

                    let text = state.headline.as_deref().unwrap_or("Loading…");
                    let headline = ui
                        .add(
                            egui::Label::new(RichText::new(text).size(26.0).strong().color(theme.text))
                                .sense(Sense::click())
                                .wrap(),
                        )
                        .on_hover_cursor(CursorIcon::PointingHand)
                        .on_hover_text("Tap to refresh this hour's headline");
                    if headline.clicked() {
                        actions.push(UiAction::Refresh);
                    }
                    ui.add_space(10.0);

                    ui.horizontal(|ui| {
                        let caption = if state.has_headline() {
                            state.caption()
                        } else {
                            "—".to_string()
                        };
                        ui.label(RichText::new(caption).size(13.0).color(theme.secondary_text));

                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            let read_more = ui.add_enabled(
                                state.url.is_some(),
                                egui::Button::new(RichText::new("read more").color(theme.highlight)).frame(false),
                            );
                            if read_more.clicked() {
                                if let Some(url) = &state.url {
                                    actions.push(UiAction::OpenLink(url.clone()));
                                }
                            }
                        });
                    });

                    ui.add_space(8.0);
                    ui.separator();
                    ui.add_space(8.0);

                    ui.horizontal(|ui| {
                        ui.add(
                            egui::TextEdit::singleline(api_key_input)
                                .hint_text("optional: paste NewsAPI key (saved locally)")
                                .desired_width(ui.available_width() - 110.0),
                        );
                        if ui.button("save").clicked() {
                            actions.push(UiAction::SaveKey);
                        }
                        if ui.add(egui::Button::new("clear").frame(false)).clicked() {
                            actions.push(UiAction::ClearKey);
                        }
                    });

                    ui.add_space(8.0);
                    ui.horizontal(|ui| {
                        for chip in ["swipe ← dismiss", "tap headline = refresh (hour only)"] {
                            egui::Frame::new()
                                .stroke(Stroke::new(1.0, theme.separator))
                                .corner_radius(CornerRadius::same(10))
                                .inner_margin(egui::Margin::symmetric(8, 2))
                                .show(ui, |ui| {
                                    ui.label(RichText::new(chip).size(11.0).color(theme.secondary_text));
                                });
                        }
                    });
                })
                .response
        });

        self.track_swipe(ui, card.inner.rect, actions);
    }

    /// Feed pointer motion over the card into the swipe recognizer.
    fn track_swipe(&mut self, ui: &mut Ui, card_rect: egui::Rect, actions: &mut Vec<UiAction>) {
        let response = ui.interact(card_rect, ui.id().with("headline_card"), Sense::drag());
        let sample = |pos: egui::Pos2| PointerSample::new(pos.x, pos.y);

        if response.drag_started() {
            let origin = ui
                .ctx()
                .input(|i| i.pointer.press_origin())
                .or(response.interact_pointer_pos());
            if let Some(pos) = origin {
                self.swipe.down(sample(pos));
            }
        }

        if response.dragged() && self.swipe.is_tracking() {
            if let Some(pos) = response.interact_pointer_pos() {
                if let Some(feedback) = self.swipe.moved(sample(pos)) {
                    self.feedback = feedback;
                }
            }
        }

        if response.drag_stopped() {
            let release = response
                .interact_pointer_pos()
                .or_else(|| ui.ctx().pointer_latest_pos());
            let outcome = release.and_then(|pos| self.swipe.up(sample(pos)));
            if outcome == Some(SwipeOutcome::Dismiss) {
                actions.push(UiAction::Dismiss);
            }
            self.swipe.cancel();
            self.feedback = SwipeFeedback::NEUTRAL;
        }
    }

    fn render_empty(&self, ui: &mut Ui, next_at: chrono::DateTime<Local>, actions: &mut Vec<UiAction>) {
        egui::Frame::new()
            .fill(self.theme.card_background)
            .corner_radius(CornerRadius::same(12))
            .stroke(Stroke::new(1.0, self.theme.separator))
            .inner_margin(24.0)
            .show(ui, |ui| {
                ui.set_width(ui.available_width());
                ui.vertical_centered(|ui| {
                    ui.label(
                        RichText::new(self.controller.status().label())
                            .size(12.0)
                            .strong()
                            .color(self.theme.secondary_text),
                    );
                    ui.add_space(12.0);
                    ui.label(
                        RichText::new("nothing until the next hour")
                            .size(20.0)
                            .strong()
                            .color(self.theme.text),
                    );
                    ui.label(
                        RichText::new(format!("next at {}", next_at.format("%H:%M")))
                            .size(14.0)
                            .color(self.theme.secondary_text),
                    );
                    ui.add_space(16.0);
                    if ui
                        .add(egui::Button::new(RichText::new("undo dismiss").size(15.0)).min_size(egui::vec2(160.0, 32.0)))
                        .clicked()
                    {
                        actions.push(UiAction::Undismiss);
                    }
                });
            });
    }
}

impl eframe::App for OneHeadlineApp {
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        storage.set_string("is_dark_mode", self.is_dark_mode.to_string());
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.theme.apply_to_ctx(ctx);
        self.collect_fetch_results();
        self.roll_over_hour();

        let mut actions = Vec::new();
        egui::CentralPanel::default().show(ctx, |ui| {
            self.render_header(ui, &mut actions);
            ui.add_space(16.0);

            match self.controller.display().clone() {
                DisplayState::Active => self.render_card(ui, &mut actions),
                DisplayState::Empty { next_at } => self.render_empty(ui, next_at, &mut actions),
            }
        });

        for action in actions {
            self.handle_action(action);
        }

        if self.pending_fetches > 0 {
            ctx.request_repaint_after(Duration::from_millis(200));
        }

        let now = Local::now();
        let until_next_hour = (next_hour_boundary(&now) - now)
            .to_std()
            .unwrap_or(Duration::from_secs(1));
        ctx.request_repaint_after(until_next_hour);
    }
}
