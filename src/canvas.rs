use std::sync::Arc;

use crate::font::FontRegistry;
use crate::style::{FontDescriptor, StyleValue};
use crate::surface::Surface;
use crate::types::{Color, Pt};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SaveState,
    RestoreState,
    SetFont {
        weight: String,
        style: String,
        size: Pt,
        unit: String,
        family: String,
    },
    SetFillColor(Color),
    SetStrokeColor(Color),
    // Effective fill and stroke alpha: `globalAlpha` times the paint's own alpha.
    SetOpacity {
        fill: f32,
        stroke: f32,
    },
    // Any property the canvas does not interpret itself.
    SetProperty {
        name: String,
        value: StyleValue,
    },
    DrawString {
        x: Pt,
        y: Pt,
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct GraphicsState {
    font: FontDescriptor,
    fill_color: Color,
    stroke_color: Color,
    global_alpha: f32,
    fill_alpha: f32,
    stroke_alpha: f32,
    properties: Vec<(String, StyleValue)>,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            font: FontDescriptor::default(),
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            global_alpha: 1.0,
            fill_alpha: 1.0,
            stroke_alpha: 1.0,
            properties: Vec::new(),
        }
    }
}

impl GraphicsState {
    fn font_size(&self) -> Pt {
        Pt::from_f32(self.font.size)
    }

    fn effective_opacity(&self) -> (f32, f32) {
        (
            self.global_alpha * self.fill_alpha,
            self.global_alpha * self.stroke_alpha,
        )
    }
}

fn unit_alpha(alpha: f32) -> f32 {
    if alpha.is_finite() {
        alpha.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

/// Recording [`Surface`]: keeps a graphics-state stack like a 2D context and
/// appends a [`Command`] for every state change and draw.
///
/// The initial state is `normal 400 10px sans-serif` in black.
pub struct Canvas {
    commands: Vec<Command>,
    state_stack: Vec<GraphicsState>,
    current_state: GraphicsState,
    fonts: Arc<FontRegistry>,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(Arc::new(FontRegistry::new()))
    }
}

impl Canvas {
    pub fn new(fonts: Arc<FontRegistry>) -> Self {
        Self {
            commands: Vec::new(),
            state_stack: Vec::new(),
            current_state: GraphicsState::default(),
            fonts,
        }
    }

    pub fn save_state(&mut self) {
        self.state_stack.push(self.current_state.clone());
        self.commands.push(Command::SaveState);
    }

    /// Pops the last saved state. Unbalanced restores are ignored.
    pub fn restore_state(&mut self) {
        if let Some(state) = self.state_stack.pop() {
            self.current_state = state;
            self.commands.push(Command::RestoreState);
        }
    }

    /// Selects `font`; its `size` is interpreted in `unit`.
    pub fn apply_font(&mut self, font: FontDescriptor, unit: &str) {
        if self.current_state.font == font {
            return;
        }
        self.commands.push(Command::SetFont {
            weight: font.weight.clone(),
            style: font.style.clone(),
            size: Pt::from_f32(font.size),
            unit: unit.to_string(),
            family: font.family.clone(),
        });
        self.current_state.font = font;
    }

    pub fn set_fill_color(&mut self, color: Color, alpha: f32) {
        if self.current_state.fill_color != color {
            self.current_state.fill_color = color;
            self.commands.push(Command::SetFillColor(color));
        }
        self.update_opacity(|state| state.fill_alpha = unit_alpha(alpha));
    }

    pub fn set_stroke_color(&mut self, color: Color, alpha: f32) {
        if self.current_state.stroke_color != color {
            self.current_state.stroke_color = color;
            self.commands.push(Command::SetStrokeColor(color));
        }
        self.update_opacity(|state| state.stroke_alpha = unit_alpha(alpha));
    }

    /// Sets `globalAlpha`. Values outside 0..1 are clamped; non-finite values
    /// reset it to 1.
    pub fn set_opacity(&mut self, opacity: f32) {
        self.update_opacity(|state| state.global_alpha = unit_alpha(opacity));
    }

    fn update_opacity(&mut self, change: impl FnOnce(&mut GraphicsState)) {
        let before = self.current_state.effective_opacity();
        change(&mut self.current_state);
        let (fill, stroke) = self.current_state.effective_opacity();
        if (fill, stroke) != before {
            self.commands.push(Command::SetOpacity { fill, stroke });
        }
    }

    fn set_extra_property(&mut self, name: &str, value: &StyleValue) {
        let properties = &mut self.current_state.properties;
        match properties.iter_mut().find(|(key, _)| key == name) {
            Some((_, current)) if current == value => return,
            Some((_, current)) => *current = value.clone(),
            None => properties.push((name.to_string(), value.clone())),
        }
        self.commands.push(Command::SetProperty {
            name: name.to_string(),
            value: value.clone(),
        });
    }

    pub fn draw_string(&mut self, x: Pt, y: Pt, text: impl Into<String>) {
        self.commands.push(Command::DrawString {
            x,
            y,
            text: text.into(),
        });
    }

    pub fn font(&self) -> &FontDescriptor {
        &self.current_state.font
    }

    pub fn fill_color(&self) -> Color {
        self.current_state.fill_color
    }

    /// Effective `(fill, stroke)` alpha.
    pub fn opacity(&self) -> (f32, f32) {
        self.current_state.effective_opacity()
    }

    pub fn property(&self, name: &str) -> Option<&StyleValue> {
        self.current_state
            .properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn finish(self) -> Vec<Command> {
        self.commands
    }
}

impl Surface for Canvas {
    fn measure_text(&mut self, text: &str) -> Pt {
        let state = &self.current_state;
        self.fonts.measure_text_width(
            &state.font.family,
            state.font.is_bold(),
            state.font.is_italic(),
            state.font_size(),
            text,
        )
    }

    fn fill_text(&mut self, text: &str, x: Pt, y: Pt) {
        self.draw_string(x, y, text);
    }

    fn set_font(&mut self, weight: &str, style: &str, size: Pt, unit: &str, family: &str) {
        let font = FontDescriptor {
            style: style.to_string(),
            weight: weight.to_string(),
            size: size.to_f32(),
            family: family.to_string(),
        };
        self.apply_font(font, unit);
    }

    fn save(&mut self) {
        self.save_state();
    }

    fn restore(&mut self) {
        self.restore_state();
    }

    fn set_property(&mut self, name: &str, value: &StyleValue) {
        match (name, value) {
            ("fillStyle", StyleValue::Text(raw)) => {
                if let Some((color, alpha)) = Color::parse(raw) {
                    return self.set_fill_color(color, alpha);
                }
            }
            ("strokeStyle", StyleValue::Text(raw)) => {
                if let Some((color, alpha)) = Color::parse(raw) {
                    return self.set_stroke_color(color, alpha);
                }
            }
            ("globalAlpha", value) => {
                if let Some(alpha) = value.as_number() {
                    return self.set_opacity(alpha);
                }
            }
            _ => {}
        }
        self.set_extra_property(name, value);
    }
}
