use crate::error::DrawTextError;
use crate::types::Pt;
use rustybuzz::{Face as HbFace, UnicodeBuffer};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use ttf_parser::GlyphId;

// Latin-1 range covered by the precomputed advance table.
const FIRST_CHAR: u32 = 0x20;
const LAST_CHAR: u32 = 0xFF;
const WIDTH_CACHE_ENTRIES: usize = 20_000;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct WidthKey {
    face: usize,
    size_milli: i64,
    text: String,
}

/// Bounded width cache; the oldest entry is evicted first.
#[derive(Debug)]
struct WidthCache {
    map: HashMap<WidthKey, Pt>,
    order: VecDeque<WidthKey>,
    capacity: usize,
}

impl WidthCache {
    fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn get(&self, key: &WidthKey) -> Option<Pt> {
        self.map.get(key).copied()
    }

    fn insert(&mut self, key: WidthKey, value: Pt) {
        if self.map.insert(key.clone(), value).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.map.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.map.remove(&oldest);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.map.len()
    }
}

#[derive(Debug)]
struct LoadedFace {
    name: String,
    data: Vec<u8>,
    metrics: FaceMetrics,
}

/// Advances and kerning for the Latin-1 range, in 1/1000 em.
#[derive(Debug)]
struct FaceMetrics {
    advances: Vec<u16>,
    glyph_ids: Vec<u16>,
    missing_advance: u16,
    kerning: HashMap<(u16, u16), i16>,
}

/// Font faces available to [`crate::Canvas`] for text measurement.
///
/// Families that were never registered are measured with a flat
/// `0.6em`-per-character estimate.
#[derive(Debug)]
pub struct FontRegistry {
    faces: Vec<LoadedFace>,
    lookup: HashMap<String, usize>,
    use_full_unicode_metrics: bool,
    widths: Mutex<WidthCache>,
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        Self {
            faces: Vec::new(),
            lookup: HashMap::new(),
            use_full_unicode_metrics: true,
            widths: Mutex::new(WidthCache::new(WIDTH_CACHE_ENTRIES)),
        }
    }

    /// Shape text outside Latin-1 with rustybuzz instead of summing table
    /// advances.
    pub fn set_use_full_unicode_metrics(&mut self, enabled: bool) {
        self.use_full_unicode_metrics = enabled;
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Registers every `.ttf`/`.otf` file directly inside `path`. Unreadable
    /// entries are skipped.
    pub fn register_dir(&mut self, path: impl AsRef<Path>) -> usize {
        let Ok(entries) = fs::read_dir(path.as_ref()) else {
            return 0;
        };
        let mut paths: Vec<_> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();
        paths
            .into_iter()
            .filter(|path| self.register_file(path).is_some())
            .count()
    }

    /// Registers a single font file, returning its primary name. Files with
    /// other extensions or unparsable data are skipped.
    pub fn register_file(&mut self, path: impl AsRef<Path>) -> Option<String> {
        let path = path.as_ref();
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if ext != "ttf" && ext != "otf" {
            return None;
        }
        let data = fs::read(path).ok()?;
        self.load(data, path).ok()
    }

    pub fn register_bytes(
        &mut self,
        data: Vec<u8>,
        source_name: Option<&str>,
    ) -> Result<String, DrawTextError> {
        let source = source_name.unwrap_or("EmbeddedFont");
        self.load(data, Path::new(source))
    }

    fn load(&mut self, data: Vec<u8>, source: &Path) -> Result<String, DrawTextError> {
        let (name, aliases, metrics) = {
            let face = ttf_parser::Face::parse(&data, 0).map_err(|err| {
                DrawTextError::Asset(format!(
                    "invalid font data for {}: {}",
                    source.display(),
                    err
                ))
            })?;
            let (name, aliases) = face_names(&face, source);
            (name, aliases, FaceMetrics::from_face(&face))
        };
        let index = self.faces.len();
        self.faces.push(LoadedFace {
            name: name.clone(),
            data,
            metrics,
        });
        for alias in std::iter::once(name.clone()).chain(aliases) {
            let key = normalize_name(&alias);
            if !key.is_empty() {
                self.lookup.entry(key).or_insert(index);
            }
        }
        Ok(name)
    }

    /// Finds the face for a family, preferring a styled variant such as
    /// `"Family Bold Italic"` when one was registered.
    fn resolve_index(&self, family: &str, bold: bool, italic: bool) -> Option<usize> {
        family
            .split(',')
            .map(normalize_name)
            .filter(|name| !name.is_empty())
            .find_map(|name| {
                styled_candidates(&name, bold, italic)
                    .iter()
                    .find_map(|candidate| self.lookup.get(candidate).copied())
            })
    }

    pub fn resolve(&self, family: &str, bold: bool, italic: bool) -> Option<&str> {
        self.resolve_index(family, bold, italic)
            .and_then(|index| self.faces.get(index))
            .map(|face| face.name.as_str())
    }

    pub fn measure_text_width(
        &self,
        family: &str,
        bold: bool,
        italic: bool,
        font_size: Pt,
        text: &str,
    ) -> Pt {
        let Some(index) = self.resolve_index(family, bold, italic) else {
            return fallback_width(font_size, text);
        };
        let key = WidthKey {
            face: index,
            size_milli: font_size.to_milli_i64(),
            text: text.to_string(),
        };
        if let Some(width) = self.widths.lock().ok().and_then(|cache| cache.get(&key)) {
            return width;
        }
        let face = &self.faces[index];
        let width = if self.use_full_unicode_metrics && !face.metrics.covers(text) {
            shaped_width(face, font_size, text)
                .unwrap_or_else(|| face.metrics.measure(font_size, text))
        } else {
            face.metrics.measure(font_size, text)
        };
        if let Ok(mut cache) = self.widths.lock() {
            cache.insert(key, width);
        }
        width
    }

    #[cfg(test)]
    fn cached_widths(&self) -> usize {
        self.widths.lock().map(|cache| cache.len()).unwrap_or(0)
    }
}

fn fallback_width(font_size: Pt, text: &str) -> Pt {
    let char_width = (font_size * 0.6).max(Pt::from_f32(1.0));
    char_width * (text.chars().count() as i32)
}

fn styled_candidates(name: &str, bold: bool, italic: bool) -> Vec<String> {
    let mut out = Vec::with_capacity(4);
    match (bold, italic) {
        (true, true) => {
            out.push(format!("{name} bold italic"));
            out.push(format!("{name}-bolditalic"));
        }
        (true, false) => {
            out.push(format!("{name} bold"));
            out.push(format!("{name}-bold"));
        }
        (false, true) => {
            out.push(format!("{name} italic"));
            out.push(format!("{name}-italic"));
        }
        (false, false) => {}
    }
    out.push(name.to_string());
    out
}

impl FaceMetrics {
    fn from_face(face: &ttf_parser::Face<'_>) -> Self {
        let scale = 1000.0 / face.units_per_em().max(1) as f32;
        let symbol_table = symbol_subtable(face);
        let mut glyph_ids = Vec::with_capacity((LAST_CHAR - FIRST_CHAR + 1) as usize);
        let mut advances = Vec::with_capacity(glyph_ids.capacity());
        for code in FIRST_CHAR..=LAST_CHAR {
            let gid = glyph_for_codepoint(face, code, symbol_table);
            let advance = gid.and_then(|id| face.glyph_hor_advance(id)).unwrap_or(0);
            glyph_ids.push(gid.map(|id| id.0).unwrap_or(0));
            advances.push(((advance as f32 * scale).round() as i32).clamp(0, u16::MAX as i32) as u16);
        }
        let missing_advance = advances.first().copied().unwrap_or(0);
        let kerning = kerning_pairs(face, &glyph_ids, scale);
        Self {
            advances,
            glyph_ids,
            missing_advance,
            kerning,
        }
    }

    fn slot(ch: char) -> Option<usize> {
        let code = ch as u32;
        (FIRST_CHAR..=LAST_CHAR)
            .contains(&code)
            .then(|| (code - FIRST_CHAR) as usize)
    }

    fn covers(&self, text: &str) -> bool {
        text.chars().all(|ch| Self::slot(ch).is_some())
    }

    fn measure(&self, font_size: Pt, text: &str) -> Pt {
        let mut units: i32 = 0;
        let mut prev: Option<u16> = None;
        for ch in text.chars() {
            let (gid, advance) = match Self::slot(ch) {
                Some(slot) => (self.glyph_ids[slot], self.advances[slot]),
                None => (0, self.missing_advance),
            };
            units = units.saturating_add(advance as i32);
            if let Some(kern) = prev.and_then(|left| self.kerning.get(&(left, gid))) {
                units = units.saturating_add(*kern as i32);
            }
            prev = Some(gid);
        }
        if units <= 0 {
            return Pt::ZERO;
        }
        font_size.mul_ratio(units, 1000)
    }
}

// Symbol fonts without a Unicode cmap map their glyphs through the Windows
// symbol subtable, often offset into the private use area.
fn symbol_subtable<'a>(face: &ttf_parser::Face<'a>) -> Option<ttf_parser::cmap::Subtable<'a>> {
    let subtables: Vec<_> = face.tables().cmap?.subtables.into_iter().collect();
    if subtables.iter().any(|sub| sub.is_unicode()) {
        return None;
    }
    let mut first = None;
    for sub in subtables {
        if sub.platform_id == ttf_parser::name::PlatformId::Windows && sub.encoding_id == 0 {
            return Some(sub);
        }
        first.get_or_insert(sub);
    }
    first
}

fn glyph_for_codepoint(
    face: &ttf_parser::Face<'_>,
    code: u32,
    symbol_table: Option<ttf_parser::cmap::Subtable<'_>>,
) -> Option<GlyphId> {
    if let Some(id) = char::from_u32(code).and_then(|ch| face.glyph_index(ch)) {
        return Some(id);
    }
    let table = symbol_table?;
    table
        .glyph_index(code)
        .or_else(|| table.glyph_index(code + 0xF000))
}

fn kerning_pairs(
    face: &ttf_parser::Face<'_>,
    glyph_ids: &[u16],
    scale: f32,
) -> HashMap<(u16, u16), i16> {
    let mut out = HashMap::new();
    let Some(kern) = face.tables().kern else {
        return out;
    };
    let subtables: Vec<_> = kern
        .subtables
        .into_iter()
        .filter(|sub| sub.horizontal && !sub.has_cross_stream && !sub.has_state_machine)
        .collect();
    if subtables.is_empty() {
        return out;
    }
    let glyphs: Vec<u16> = glyph_ids.iter().copied().filter(|gid| *gid != 0).collect();
    for &left in &glyphs {
        for &right in &glyphs {
            let total: i32 = subtables
                .iter()
                .filter_map(|sub| sub.glyphs_kerning(GlyphId(left), GlyphId(right)))
                .map(i32::from)
                .sum();
            let scaled = (total as f32 * scale).round() as i32;
            if scaled != 0 {
                out.insert(
                    (left, right),
                    scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16,
                );
            }
        }
    }
    out
}

fn shaped_width(face: &LoadedFace, font_size: Pt, text: &str) -> Option<Pt> {
    let hb = HbFace::from_slice(&face.data, 0)?;
    let units_per_em = hb.units_per_em().max(1) as i64;
    let mut buffer = UnicodeBuffer::new();
    buffer.push_str(text);
    buffer.set_direction(rustybuzz::Direction::LeftToRight);
    let shaped = rustybuzz::shape(&hb, &[], buffer);
    let positions = shaped.glyph_positions();
    if positions.is_empty() {
        return None;
    }
    let units: i64 = positions
        .iter()
        .map(|pos| (pos.x_advance as i64 * 1000 + units_per_em / 2) / units_per_em)
        .sum();
    if units <= 0 {
        return Some(Pt::ZERO);
    }
    Some(font_size.mul_ratio(units.clamp(0, i32::MAX as i64) as i32, 1000))
}

fn face_names(face: &ttf_parser::Face<'_>, source: &Path) -> (String, Vec<String>) {
    use ttf_parser::name::name_id;

    let mut family = None;
    let mut full = None;
    let mut postscript = None;
    for entry in face.names() {
        let slot = match entry.name_id {
            name_id::TYPOGRAPHIC_FAMILY | name_id::FAMILY => &mut family,
            name_id::FULL_NAME => &mut full,
            name_id::POST_SCRIPT_NAME => &mut postscript,
            _ => continue,
        };
        if slot.is_none() {
            *slot = entry.to_string();
        }
    }
    let stem = source
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string);

    // Full names ("Inter Bold Italic") double as styled aliases.
    let primary = full
        .clone()
        .or_else(|| postscript.clone())
        .or_else(|| family.clone())
        .or_else(|| stem.clone())
        .unwrap_or_else(|| "EmbeddedFont".to_string());
    let aliases = [family, full, postscript, stem]
        .into_iter()
        .flatten()
        .filter(|alias| *alias != primary)
        .collect();
    (primary, aliases)
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_ascii_lowercase()
}
