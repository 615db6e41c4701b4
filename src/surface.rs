use crate::style::{StyleValue, SurfaceStyle};
use crate::types::Pt;

/// Drawing target for [`crate::draw_text`].
///
/// Text is placed at a baseline position. `save`/`restore` bracket every run,
/// so implementations must restore the font and every property assigned
/// since the matching `save`.
pub trait Surface {
    /// Width of `text` under the current font.
    fn measure_text(&mut self, text: &str) -> Pt;

    fn fill_text(&mut self, text: &str, x: Pt, y: Pt);

    fn set_font(&mut self, weight: &str, style: &str, size: Pt, unit: &str, family: &str);

    fn save(&mut self);

    fn restore(&mut self);

    /// Assigns a named style property such as `fillStyle`.
    fn set_property(&mut self, name: &str, value: &StyleValue);
}

/// Runs `draw` with `style` applied, restoring the previous surface state
/// afterwards.
pub fn with_style<S, R>(surface: &mut S, style: &SurfaceStyle, draw: impl FnOnce(&mut S) -> R) -> R
where
    S: Surface + ?Sized,
{
    surface.save();
    if let Some(font) = &style.font {
        surface.set_font(
            &font.weight,
            &font.style,
            Pt::from_f32(font.size),
            "px",
            &font.family,
        );
    }
    for (name, value) in style.properties.iter() {
        surface.set_property(name, value);
    }
    let out = draw(surface);
    surface.restore();
    out
}
