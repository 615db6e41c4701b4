use crate::debug::{DebugLogger, json_string};
use crate::surface::Surface;
use crate::types::Pt;

/// Drawing cursor. `x` returns to the line start on every break and `y`
/// grows by the line height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pen {
    pub x: Pt,
    pub y: Pt,
}

impl Pen {
    pub fn new(x: Pt, y: Pt) -> Self {
        Self { x, y }
    }
}

/// Line geometry shared by every run of one render call. `max_width` bounds
/// the absolute pen x, not the distance from `base_x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    pub base_x: Pt,
    pub max_width: Pt,
    pub line_height: Pt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WrapStats {
    pub segments: u64,
    pub forced_segments: u64,
    pub line_breaks: u64,
}

impl WrapStats {
    pub(crate) fn absorb(&mut self, other: WrapStats) {
        self.segments += other.segments;
        self.forced_segments += other.forced_segments;
        self.line_breaks += other.line_breaks;
    }
}

/// Matches the ECMAScript `\s` class: Unicode White_Space minus U+0085,
/// plus the byte order mark.
pub(crate) fn is_space(ch: char) -> bool {
    ch == '\u{feff}' || (ch.is_whitespace() && ch != '\u{85}')
}

pub(crate) fn is_break_char(ch: char) -> bool {
    ch == '-' || is_space(ch)
}

/// Next break boundary at or after `pos`: a break character at `pos` is a
/// one-character boundary, otherwise the next break character or the end.
pub(crate) fn next_boundary(text: &str, pos: usize) -> usize {
    let rest = &text[pos..];
    match rest.chars().next() {
        None => text.len(),
        Some(ch) if is_break_char(ch) => pos + ch.len_utf8(),
        Some(_) => rest
            .char_indices()
            .find(|(_, ch)| is_break_char(*ch))
            .map(|(offset, _)| pos + offset)
            .unwrap_or(text.len()),
    }
}

/// First non-whitespace byte index at or after `pos`, or the text length.
pub(crate) fn skip_spaces(text: &str, pos: usize) -> usize {
    text[pos..]
        .char_indices()
        .find(|(_, ch)| !is_space(*ch))
        .map(|(offset, _)| pos + offset)
        .unwrap_or(text.len())
}

fn trace_enabled() -> bool {
    std::env::var("DRAWTEXT_TRACE")
        .map(|v| v == "1")
        .unwrap_or(false)
}

/// Greedily wraps one run's text, drawing segments and advancing `pen`.
///
/// Segments grow one break boundary at a time while they fit. A segment that
/// cannot fit even on an empty line is drawn anyway so the loop always makes
/// progress. Whitespace that would open a new line is skipped; whitespace that
/// ends a line is drawn with it.
pub fn wrap_run<S: Surface + ?Sized>(
    surface: &mut S,
    text: &str,
    pen: &mut Pen,
    line: &LineSettings,
    debug: Option<&DebugLogger>,
) -> WrapStats {
    let mut stats = WrapStats::default();
    let len = text.len();
    let mut beg = 0;
    let mut end = 0;

    while beg < len {
        let mut width = Pt::ZERO;
        let mut candidate = next_boundary(text, end);
        let mut candidate_width = surface.measure_text(&text[beg..candidate]);
        while end < len && pen.x + candidate_width <= line.max_width {
            end = candidate;
            width = candidate_width;
            candidate = next_boundary(text, end);
            candidate_width = surface.measure_text(&text[beg..candidate]);
        }

        if beg == end {
            if pen.x == line.base_x {
                let segment = &text[beg..candidate];
                surface.fill_text(segment, pen.x, pen.y);
                stats.forced_segments += 1;
                if trace_enabled() {
                    eprintln!(
                        "[drawtext][wrap] forced {:?} width {} exceeds {}",
                        segment,
                        candidate_width,
                        line.max_width - pen.x
                    );
                }
                if let Some(logger) = debug {
                    logger.log_event(
                        "drawtext.forced_segment",
                        &[
                            ("text", json_string(segment)),
                            ("x", pen.x.to_string()),
                            ("y", pen.y.to_string()),
                            ("width", candidate_width.to_string()),
                        ],
                    );
                }
                end = candidate;
            }
            pen.x = line.base_x;
            pen.y += line.line_height;
            stats.line_breaks += 1;
            if let Some(logger) = debug {
                logger.log_event("drawtext.line_break", &[("y", pen.y.to_string())]);
            }
            beg = skip_spaces(text, end);
            end = beg;
        } else {
            surface.fill_text(&text[beg..end], pen.x, pen.y);
            pen.x += width;
            stats.segments += 1;
            beg = end;
        }
    }
    stats
}
