mod canvas;
mod debug;
mod error;
mod flatten;
mod font;
mod markup;
mod style;
mod surface;
mod types;
mod wrap;

pub use canvas::{Canvas, Command};
pub use debug::DebugLogger;
pub use error::DrawTextError;
pub use flatten::{Run, flatten};
pub use font::FontRegistry;
pub use markup::{NodeId, ParseNode, ParseTree, parse_markup};
pub use style::{
    BASE_RULE_KEY, FontDescriptor, ResolvedStyle, RuleTable, StyleRules, StyleValue, SurfaceStyle,
    resolve_style,
};
pub use surface::{Surface, with_style};
pub use types::{Color, Pt};
pub use wrap::{LineSettings, Pen, WrapStats, wrap_run};

use debug::json_string;
use std::sync::Arc;

/// Options for [`draw_text`]. `width` and `line_height` are required and
/// must be at least 1; they are checked before the markup is parsed.
#[derive(Debug, Clone, Default)]
pub struct DrawTextOptions {
    width: Option<f32>,
    line_height: Option<f32>,
    rules: RuleTable,
    debug: Option<Arc<DebugLogger>>,
}

impl DrawTextOptions {
    pub fn new() -> Self {
        Self::default()
    }

    // Maximum pen x, in pixels.
    pub fn width(mut self, width: f32) -> Self {
        self.width = Some(width);
        self
    }

    // Vertical advance per line break, in pixels.
    pub fn line_height(mut self, line_height: f32) -> Self {
        self.line_height = Some(line_height);
        self
    }

    pub fn rules(mut self, rules: RuleTable) -> Self {
        self.rules = rules;
        self
    }

    pub fn rule(mut self, tag: impl Into<String>, rules: StyleRules) -> Self {
        self.rules.insert(tag, rules);
        self
    }

    // Enable JSONL logging of runs, forced segments and line breaks.
    pub fn debug_log(mut self, logger: Arc<DebugLogger>) -> Self {
        self.debug = Some(logger);
        self
    }

    pub fn validate(&self) -> Result<(Pt, Pt), DrawTextError> {
        let width = require_at_least_one("width", self.width)?;
        let line_height = require_at_least_one("line_height", self.line_height)?;
        Ok((width, line_height))
    }
}

fn require_at_least_one(name: &str, value: Option<f32>) -> Result<Pt, DrawTextError> {
    match value {
        Some(value) if value.is_finite() && value >= 1.0 => Ok(Pt::from_f32(value)),
        Some(value) => Err(DrawTextError::InvalidConfiguration(format!(
            "{name} must be at least 1, got {value}"
        ))),
        None => Err(DrawTextError::InvalidConfiguration(format!(
            "missing {name}"
        ))),
    }
}

/// Draws `text`, which may contain inline `<tag>` markup, starting at
/// `(x, y)` and returns the final pen position.
///
/// Each run is drawn with the rules for its enclosing tags applied on top of
/// the `_base` rule, inside its own `save`/`restore` pair. Configuration and
/// markup errors are reported before anything is drawn.
pub fn draw_text<S: Surface + ?Sized>(
    surface: &mut S,
    text: &str,
    x: f32,
    y: f32,
    options: &DrawTextOptions,
) -> Result<Pen, DrawTextError> {
    let (max_width, line_height) = options.validate()?;
    let tree = parse_markup(text)?;
    let runs = flatten(&tree);

    let line = LineSettings {
        base_x: Pt::from_f32(x),
        max_width,
        line_height,
    };
    let mut pen = Pen::new(line.base_x, Pt::from_f32(y));
    let debug = options.debug.as_deref();
    let mut totals = WrapStats::default();

    for (index, run) in runs.iter().enumerate() {
        let style = resolve_style(&run.context, &options.rules).split();
        if let Some(logger) = debug {
            let context = run
                .context
                .iter()
                .map(|tag| json_string(tag))
                .collect::<Vec<_>>()
                .join(",");
            logger.log_event(
                "drawtext.run",
                &[
                    ("index", index.to_string()),
                    ("context", format!("[{context}]")),
                    ("text", json_string(run.text)),
                    ("font_change", style.font.is_some().to_string()),
                    ("x", pen.x.to_string()),
                    ("y", pen.y.to_string()),
                ],
            );
        }
        let stats = with_style(surface, &style, |surface| {
            wrap_run(surface, run.text, &mut pen, &line, debug)
        });
        totals.absorb(stats);
    }

    if let Some(logger) = debug {
        logger.increment("runs", runs.len() as u64);
        logger.increment("segments", totals.segments);
        logger.increment("forced_segments", totals.forced_segments);
        logger.increment("line_breaks", totals.line_breaks);
        logger.emit_summary("draw_text");
        logger.flush();
    }
    Ok(pen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn options(width: f32) -> DrawTextOptions {
        DrawTextOptions::new().width(width).line_height(10.0)
    }

    fn drawn(commands: &[Command]) -> Vec<(String, f32, f32)> {
        commands
            .iter()
            .filter_map(|command| match command {
                Command::DrawString { x, y, text } => Some((text.clone(), x.to_f32(), y.to_f32())),
                _ => None,
            })
            .collect()
    }

    fn temp_log_path(label: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("drawtext_{label}_{nanos}.jsonl"))
    }

    #[test]
    fn wraps_hello_world_at_forty_pixels() {
        let mut canvas = Canvas::default();
        let pen = draw_text(&mut canvas, "hello world", 0.0, 0.0, &options(40.0)).expect("draw");
        // The space ending line 1 is drawn with it; only whitespace opening a
        // new line is skipped.
        assert_eq!(
            drawn(canvas.commands()),
            vec![("hello ".to_string(), 0.0, 0.0), ("world".to_string(), 0.0, 10.0)]
        );
        assert_eq!(pen, Pen::new(Pt::from_i32(30), Pt::from_i32(10)));
    }

    #[test]
    fn missing_or_small_config_is_rejected_before_parsing() {
        let mut canvas = Canvas::default();
        let cases = [
            DrawTextOptions::new().line_height(10.0),
            DrawTextOptions::new().width(0.0).line_height(10.0),
            DrawTextOptions::new().width(40.0),
            DrawTextOptions::new().width(40.0).line_height(0.5),
            DrawTextOptions::new().width(f32::NAN).line_height(10.0),
        ];
        for case in &cases {
            // The markup is invalid too; the config error must win.
            let err = draw_text(&mut canvas, "<a>x", 0.0, 0.0, case).expect_err("config");
            assert!(
                matches!(err, DrawTextError::InvalidConfiguration(_)),
                "unexpected {err:?}"
            );
        }
        assert!(canvas.commands().is_empty());
    }

    #[test]
    fn markup_errors_leave_the_surface_untouched() {
        let mut canvas = Canvas::default();
        let err = draw_text(&mut canvas, "ok <a><b>x</b></c>", 0.0, 0.0, &options(40.0))
            .expect_err("mismatch");
        assert!(matches!(err, DrawTextError::MismatchedTag { .. }));
        let err = draw_text(&mut canvas, "ok <a>x", 0.0, 0.0, &options(40.0)).expect_err("unclosed");
        assert!(matches!(err, DrawTextError::UnclosedTag { .. }));
        assert!(canvas.commands().is_empty());
    }

    #[test]
    fn run_styles_are_scoped_with_save_and_restore() {
        let rules = RuleTable::new()
            .base(StyleRules::new().with("fillStyle", "black"))
            .rule(
                "em",
                StyleRules::new()
                    .with("fillStyle", "red")
                    .with("fontStyle", "italic"),
            );
        let mut canvas = Canvas::default();
        draw_text(
            &mut canvas,
            "a<em>b</em>c",
            0.0,
            0.0,
            &options(100.0).rules(rules),
        )
        .expect("draw");
        let commands = canvas.commands();
        assert_eq!(
            commands,
            &[
                Command::SaveState,
                Command::DrawString {
                    x: Pt::ZERO,
                    y: Pt::ZERO,
                    text: "a".to_string(),
                },
                Command::RestoreState,
                Command::SaveState,
                Command::SetFont {
                    weight: "400".to_string(),
                    style: "italic".to_string(),
                    size: Pt::from_i32(10),
                    unit: "px".to_string(),
                    family: "sans-serif".to_string(),
                },
                Command::SetFillColor(Color::rgb(1.0, 0.0, 0.0)),
                Command::DrawString {
                    x: Pt::from_i32(6),
                    y: Pt::ZERO,
                    text: "b".to_string(),
                },
                Command::RestoreState,
                Command::SaveState,
                Command::DrawString {
                    x: Pt::from_i32(12),
                    y: Pt::ZERO,
                    text: "c".to_string(),
                },
                Command::RestoreState,
            ]
        );
        assert_eq!(canvas.fill_color(), Color::BLACK);
        assert_eq!(canvas.font(), &FontDescriptor::default());
    }

    #[test]
    fn registered_font_metrics_drive_wrapping() {
        let mut fonts = FontRegistry::new();
        fonts
            .register_bytes(
                include_bytes!("../tests/fonts/DrawtextTest-Regular.ttf").to_vec(),
                Some("DrawtextTest-Regular.ttf"),
            )
            .expect("register fixture");
        let mut canvas = Canvas::new(Arc::new(fonts));
        let rules = RuleTable::new().base(StyleRules::new().with("fontFamily", "Drawtext Test"));
        // "AV " is 13.5px with kerning, so it fits in 14px; "AV VA" does not.
        let pen = draw_text(&mut canvas, "AV VA", 0.0, 0.0, &options(14.0).rules(rules))
            .expect("draw");
        assert_eq!(
            drawn(canvas.commands()),
            vec![("AV ".to_string(), 0.0, 0.0), ("VA".to_string(), 0.0, 10.0)]
        );
        assert_eq!(pen, Pen::new(Pt::from_i32(12), Pt::from_i32(10)));
    }

    #[test]
    fn font_size_from_rules_changes_measurement() {
        let rules = RuleTable::new().rule("big", StyleRules::new().with("fontSize", 20));
        let mut canvas = Canvas::default();
        // 12px per character inside <big>: "abcd" is 48px and cannot fit
        // after "xy " (18px) within 50px.
        draw_text(
            &mut canvas,
            "xy <big>abcd</big>",
            0.0,
            0.0,
            &options(50.0).rules(rules),
        )
        .expect("draw");
        assert_eq!(
            drawn(canvas.commands()),
            vec![("xy ".to_string(), 0.0, 0.0), ("abcd".to_string(), 0.0, 10.0)]
        );
    }

    #[test]
    fn runs_continue_on_the_same_line() {
        let mut canvas = Canvas::default();
        let pen = draw_text(&mut canvas, "ab<b>cd</b>ef", 5.0, 20.0, &options(100.0)).expect("draw");
        assert_eq!(
            drawn(canvas.commands()),
            vec![
                ("ab".to_string(), 5.0, 20.0),
                ("cd".to_string(), 17.0, 20.0),
                ("ef".to_string(), 29.0, 20.0),
            ]
        );
        assert_eq!(pen, Pen::new(Pt::from_i32(41), Pt::from_i32(20)));
    }

    #[test]
    fn line_breaks_return_to_the_starting_x() {
        let mut canvas = Canvas::default();
        draw_text(&mut canvas, "aaa bbb ccc", 10.0, 0.0, &options(40.0)).expect("draw");
        assert_eq!(
            drawn(canvas.commands()),
            vec![
                ("aaa ".to_string(), 10.0, 0.0),
                ("bbb ".to_string(), 10.0, 10.0),
                ("ccc".to_string(), 10.0, 20.0),
            ]
        );
    }

    #[test]
    fn overwidth_word_is_drawn_whole() {
        let mut canvas = Canvas::default();
        let pen = draw_text(&mut canvas, "supercalifragilistic", 0.0, 0.0, &options(30.0))
            .expect("draw");
        assert_eq!(
            drawn(canvas.commands()),
            vec![("supercalifragilistic".to_string(), 0.0, 0.0)]
        );
        assert_eq!(pen.y, Pt::from_i32(10));
    }

    #[test]
    fn empty_text_draws_nothing() {
        let mut canvas = Canvas::default();
        let pen = draw_text(&mut canvas, "<a></a>", 3.0, 4.0, &options(30.0)).expect("draw");
        assert!(canvas.commands().is_empty());
        assert_eq!(pen, Pen::new(Pt::from_i32(3), Pt::from_i32(4)));
    }

    #[test]
    fn debug_log_records_runs_and_summary() {
        let log_path = temp_log_path("runs");
        let logger = Arc::new(DebugLogger::new(&log_path).expect("logger"));
        let mut canvas = Canvas::default();
        draw_text(
            &mut canvas,
            "hello <i>world</i>",
            0.0,
            0.0,
            &options(40.0).debug_log(logger.clone()),
        )
        .expect("draw");
        drop(logger);
        let log = std::fs::read_to_string(&log_path).expect("read debug log");
        assert!(log.contains("\"type\":\"drawtext.run\",\"index\":1,\"context\":[\"i\"]"));
        assert!(log.contains("\"drawtext.line_break\""));
        assert!(log.contains(
            "\"counts\":{\"forced_segments\":0,\"line_breaks\":1,\"runs\":2,\"segments\":2}"
        ));
        let _ = std::fs::remove_file(log_path);
    }
}
