use std::collections::HashMap;

/// Rule table key whose entry applies to every run regardless of tags.
pub const BASE_RULE_KEY: &str = "_base";

const FONT_PREFIX: &str = "font";
const DEFAULT_FONT_STYLE: &str = "normal";
const DEFAULT_FONT_WEIGHT: &str = "400";
const DEFAULT_FONT_SIZE: f32 = 10.0;
const DEFAULT_FONT_FAMILY: &str = "sans-serif";

#[derive(Debug, Clone, PartialEq)]
pub enum StyleValue {
    Text(String),
    Number(f32),
}

impl StyleValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StyleValue::Text(value) => Some(value),
            StyleValue::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f32> {
        match self {
            StyleValue::Number(value) => Some(*value),
            StyleValue::Text(value) => value.trim().parse::<f32>().ok(),
        }
    }
}

impl std::fmt::Display for StyleValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StyleValue::Text(value) => f.write_str(value),
            StyleValue::Number(value) => write!(f, "{}", value),
        }
    }
}

impl From<&str> for StyleValue {
    fn from(value: &str) -> Self {
        StyleValue::Text(value.to_string())
    }
}

impl From<String> for StyleValue {
    fn from(value: String) -> Self {
        StyleValue::Text(value)
    }
}

impl From<f32> for StyleValue {
    fn from(value: f32) -> Self {
        StyleValue::Number(value)
    }
}

impl From<i32> for StyleValue {
    fn from(value: i32) -> Self {
        StyleValue::Number(value as f32)
    }
}

/// Flat, insertion-ordered property map. Setting an existing key replaces
/// its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleRules {
    entries: Vec<(String, StyleValue)>,
}

impl StyleRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<StyleValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<StyleValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&StyleValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StyleValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn overlay(&mut self, other: &StyleRules) {
        for (name, value) in &other.entries {
            self.set(name.clone(), value.clone());
        }
    }
}

impl<K, V> FromIterator<(K, V)> for StyleRules
where
    K: Into<String>,
    V: Into<StyleValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut rules = StyleRules::new();
        for (name, value) in iter {
            rules.set(name, value);
        }
        rules
    }
}

/// Tag-keyed style rules, plus the `_base` entry.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: HashMap<String, StyleRules>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base(self, rules: StyleRules) -> Self {
        self.rule(BASE_RULE_KEY, rules)
    }

    pub fn rule(mut self, tag: impl Into<String>, rules: StyleRules) -> Self {
        self.insert(tag, rules);
        self
    }

    pub fn insert(&mut self, tag: impl Into<String>, rules: StyleRules) {
        self.rules.insert(tag.into(), rules);
    }

    pub fn get(&self, tag: &str) -> Option<&StyleRules> {
        self.rules.get(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontDescriptor {
    pub style: String,
    pub weight: String,
    pub size: f32,
    pub family: String,
}

impl Default for FontDescriptor {
    fn default() -> Self {
        Self {
            style: DEFAULT_FONT_STYLE.to_string(),
            weight: DEFAULT_FONT_WEIGHT.to_string(),
            size: DEFAULT_FONT_SIZE,
            family: DEFAULT_FONT_FAMILY.to_string(),
        }
    }
}

impl FontDescriptor {
    /// CSS font shorthand, e.g. `italic 700 12px serif`.
    pub fn css(&self, unit: &str) -> String {
        format!(
            "{} {} {}{} {}",
            self.style, self.weight, self.size, unit, self.family
        )
    }

    pub fn is_bold(&self) -> bool {
        match self.weight.trim().to_ascii_lowercase().as_str() {
            "bold" | "bolder" => true,
            "normal" | "lighter" => false,
            other => other.parse::<u16>().map(|w| w >= 600).unwrap_or(false),
        }
    }

    pub fn is_italic(&self) -> bool {
        matches!(
            self.style.trim().to_ascii_lowercase().as_str(),
            "italic" | "oblique"
        )
    }
}

/// The merged style for one run, before it is split into font and
/// pass-through parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedStyle {
    pub properties: StyleRules,
}

/// A resolved style split into an optional font change and the remaining
/// surface properties, in first-set order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceStyle {
    pub font: Option<FontDescriptor>,
    pub properties: StyleRules,
}

pub fn resolve_style(context: &[&str], table: &RuleTable) -> ResolvedStyle {
    let mut properties = table.get(BASE_RULE_KEY).cloned().unwrap_or_default();
    for tag in context {
        if let Some(rules) = table.get(tag) {
            properties.overlay(rules);
        }
    }
    ResolvedStyle { properties }
}

impl ResolvedStyle {
    pub fn split(self) -> SurfaceStyle {
        let mut font: Option<FontDescriptor> = None;
        let mut properties = StyleRules::new();
        for (name, value) in self.properties.entries {
            if !name.starts_with(FONT_PREFIX) {
                properties.entries.push((name, value));
                continue;
            }
            let sub = &name[FONT_PREFIX.len()..];
            let font = font.get_or_insert_with(FontDescriptor::default);
            match sub {
                "Style" => font.style = text_or(&value, DEFAULT_FONT_STYLE),
                "Weight" => font.weight = font_weight_text(&value),
                "Size" => font.size = font_size_value(&value),
                "Family" => font.family = text_or(&value, DEFAULT_FONT_FAMILY),
                _ => {}
            }
        }
        SurfaceStyle { font, properties }
    }
}

// Empty strings, zero and NaN fall back to the default, like unset keys.
fn text_or(value: &StyleValue, default: &str) -> String {
    match value {
        StyleValue::Text(text) if text.is_empty() => default.to_string(),
        StyleValue::Number(number) if *number == 0.0 || number.is_nan() => default.to_string(),
        other => other.to_string(),
    }
}

fn font_weight_text(value: &StyleValue) -> String {
    match value {
        StyleValue::Number(weight) if *weight != 0.0 && weight.fract() == 0.0 => {
            format!("{}", *weight as i64)
        }
        other => text_or(other, DEFAULT_FONT_WEIGHT),
    }
}

fn font_size_value(value: &StyleValue) -> f32 {
    let parsed = match value {
        StyleValue::Number(size) => Some(*size),
        StyleValue::Text(raw) => {
            let raw = raw.trim();
            raw.strip_suffix("px").unwrap_or(raw).trim().parse::<f32>().ok()
        }
    };
    parsed
        .filter(|size| size.is_finite() && *size > 0.0)
        .unwrap_or(DEFAULT_FONT_SIZE)
}
