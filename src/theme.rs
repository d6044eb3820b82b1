use eframe::egui;
use egui::{Color32, CornerRadius, Stroke};

#[derive(Clone)]
pub struct AppTheme {
    pub background: Color32,
    pub card_background: Color32,
    pub text: Color32,
    pub secondary_text: Color32,
    pub highlight: Color32,
    pub separator: Color32,
    pub pill_web: Color32,
    pub pill_mini: Color32,
    pub button_background: Color32,
    pub button_foreground: Color32,
    pub button_active_background: Color32,
    pub button_hover_background: Color32,
}

impl AppTheme {
    pub fn dark() -> Self {
        Self {
            background: Color32::from_rgb(18, 18, 18),
            card_background: Color32::from_rgb(30, 30, 30),
            text: Color32::from_rgb(240, 240, 240),
            secondary_text: Color32::from_rgb(180, 180, 180),
            highlight: Color32::from_rgb(255, 102, 0),
            separator: Color32::from_rgb(60, 60, 60),
            pill_web: Color32::from_rgb(66, 66, 66),
            pill_mini: Color32::from_rgb(76, 175, 80),
            button_background: Color32::from_rgb(66, 66, 66),
            button_foreground: Color32::from_rgb(240, 240, 240),
            button_active_background: Color32::from_rgb(255, 102, 0),
            button_hover_background: Color32::from_rgb(80, 80, 80),
        }
    }

    pub fn light() -> Self {
        Self {
            background: Color32::from_rgb(245, 245, 245),
            card_background: Color32::from_rgb(255, 255, 255),
            text: Color32::from_rgb(20, 20, 20),
            secondary_text: Color32::from_rgb(90, 90, 90),
            highlight: Color32::from_rgb(235, 92, 0),
            separator: Color32::from_rgb(200, 200, 200),
            pill_web: Color32::from_rgb(220, 220, 220),
            pill_mini: Color32::from_rgb(30, 110, 40),
            button_background: Color32::from_rgb(235, 235, 235),
            button_foreground: Color32::from_rgb(20, 20, 20),
            button_active_background: Color32::from_rgb(235, 92, 0),
            button_hover_background: Color32::from_rgb(210, 210, 210),
        }
    }

    pub fn for_mode(is_dark_mode: bool) -> Self {
        if is_dark_mode {
            Self::dark()
        } else {
            Self::light()
        }
    }

    pub fn apply_to_ctx(&self, ctx: &egui::Context) {
        let mut style = (*ctx.style()).clone();

        style.visuals.panel_fill = self.background;
        style.visuals.window_fill = self.card_background;
        style.visuals.window_stroke = Stroke::new(1.0, self.separator);
        style.visuals.widgets.noninteractive.bg_fill = self.card_background;
        style.visuals.widgets.noninteractive.fg_stroke = Stroke::new(1.0, self.text);

        style.visuals.widgets.inactive.bg_fill = self.button_background;
        style.visuals.widgets.inactive.fg_stroke = Stroke::new(1.0, self.button_foreground);
        style.visuals.widgets.active.bg_fill = self.button_active_background;
        style.visuals.widgets.active.fg_stroke = Stroke::new(1.0, self.button_foreground);
        style.visuals.widgets.hovered.bg_fill = self.button_hover_background;
        style.visuals.widgets.hovered.fg_stroke = Stroke::new(1.0, self.button_foreground);

        style.visuals.selection.bg_fill = self.highlight;
        style.visuals.selection.stroke = Stroke::new(1.0, self.highlight);

        style.visuals.window_corner_radius = CornerRadius::same(8);
        style.visuals.widgets.noninteractive.corner_radius = CornerRadius::same(4);
        style.visuals.widgets.inactive.corner_radius = CornerRadius::same(4);
        style.visuals.widgets.hovered.corner_radius = CornerRadius::same(4);
        style.visuals.widgets.active.corner_radius = CornerRadius::same(4);

        ctx.set_style(style);
    }
}
