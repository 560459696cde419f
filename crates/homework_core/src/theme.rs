//! crates/homework_core/src/theme.rs
//!
//! Color themes as CSS custom properties.
//!
//! Each (element, hex color) pair becomes `--<element>: H S% L%` on the document
//! root. With no pairs applied the stylesheet falls back to the compiled-in
//! defaults.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{ColorTheme, ElementColor};
use crate::ports::{PortResult, ThemeRepository};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThemeError {
    #[error("Invalid color '{0}', expected #rgb or #rrggbb")]
    InvalidColor(String),
    #[error("Invalid element name '{0}'")]
    InvalidElement(String),
}

/// The elements a theme may color, with their default hex values.
pub const DEFAULT_COLORS: &[(&str, &str)] = &[
    ("background", "#ffffff"),
    ("foreground", "#0f172a"),
    ("primary", "#3b82f6"),
    ("secondary", "#f1f5f9"),
    ("accent", "#f59e0b"),
    ("card", "#ffffff"),
    ("border", "#e2e8f0"),
    ("header", "#1e40af"),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

impl fmt::Display for Hsl {
    /// The space-separated triple consumed by `hsl(var(--x))`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}% {}%", round1(self.h), round1(self.s), round1(self.l))
    }
}

fn round1(v: f64) -> f64 {
    let r = (v * 10.0).round() / 10.0;
    // Avoid printing "-0".
    if r == 0.0 {
        0.0
    } else {
        r
    }
}

fn parse_hex(hex: &str) -> Result<(u8, u8, u8), ThemeError> {
    let invalid = || ThemeError::InvalidColor(hex.to_string());
    let digits = hex.trim().strip_prefix('#').ok_or_else(invalid)?;
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let expanded: String = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 => digits.to_string(),
        _ => return Err(invalid()),
    };
    let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).map_err(|_| invalid());
    Ok((channel(0)?, channel(2)?, channel(4)?))
}

pub fn is_valid_hex(hex: &str) -> bool {
    parse_hex(hex).is_ok()
}

/// Converts `#rgb` or `#rrggbb` to hue in degrees, saturation and lightness in percent.
pub fn hex_to_hsl(hex: &str) -> Result<Hsl, ThemeError> {
    let (r, g, b) = parse_hex(hex)?;
    let (r, g, b) = (r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let delta = max - min;

    if delta == 0.0 {
        return Ok(Hsl {
            h: 0.0,
            s: 0.0,
            l: l * 100.0,
        });
    }

    let s = if l > 0.5 {
        delta / (2.0 - max - min)
    } else {
        delta / (max + min)
    };
    let h = if max == r {
        (g - b) / delta + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };

    Ok(Hsl {
        h: h * 60.0,
        s: s * 100.0,
        l: l * 100.0,
    })
}

/// Element names become part of a CSS property name.
pub fn validate_element(element: &str) -> Result<(), ThemeError> {
    let ok = !element.is_empty()
        && element.len() <= 64
        && element
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if ok {
        Ok(())
    } else {
        Err(ThemeError::InvalidElement(element.to_string()))
    }
}

pub fn css_variable(element: &str) -> String {
    format!("--{}", element)
}

/// The inline overrides written on the document root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThemeVariables {
    overrides: BTreeMap<String, String>,
}

impl ThemeVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates every pair first, so a bad pair leaves the variables untouched.
    pub fn apply(&mut self, colors: &[ElementColor]) -> Result<(), ThemeError> {
        let mut converted = Vec::with_capacity(colors.len());
        for pair in colors {
            validate_element(&pair.element)?;
            converted.push((css_variable(&pair.element), hex_to_hsl(&pair.color)?.to_string()));
        }
        self.overrides.extend(converted);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.overrides.clear();
    }

    pub fn is_default(&self) -> bool {
        self.overrides.is_empty()
    }

    pub fn overrides(&self) -> &BTreeMap<String, String> {
        &self.overrides
    }

    /// Every themed variable: the defaults with overrides laid on top.
    pub fn resolved(&self) -> BTreeMap<String, String> {
        let mut vars: BTreeMap<String, String> = DEFAULT_COLORS
            .iter()
            .filter_map(|(element, hex)| {
                hex_to_hsl(hex)
                    .ok()
                    .map(|hsl| (css_variable(element), hsl.to_string()))
            })
            .collect();
        vars.extend(self.overrides.clone());
        vars
    }

    pub fn stylesheet(&self) -> String {
        let mut css = String::from(":root {\n");
        for (name, value) in self.resolved() {
            css.push_str(&format!("  {}: {};\n", name, value));
        }
        css.push_str("}\n");
        css
    }
}

fn preset(id: u128, name: &str, colors: &[(&str, &str)]) -> ColorTheme {
    ColorTheme {
        id: Uuid::from_u128(id),
        user_id: None,
        name: name.to_string(),
        is_preset: true,
        colors: colors
            .iter()
            .map(|(element, color)| ElementColor::new(*element, *color))
            .collect(),
        created_at: DateTime::<Utc>::UNIX_EPOCH,
    }
}

/// The compiled-in preset themes.
pub fn presets() -> Vec<ColorTheme> {
    vec![
        preset(
            0x7e3a_0001,
            "Ocean",
            &[("primary", "#0ea5e9"), ("accent", "#14b8a6"), ("header", "#0369a1")],
        ),
        preset(
            0x7e3a_0002,
            "Forest",
            &[("primary", "#16a34a"), ("accent", "#ca8a04"), ("header", "#14532d")],
        ),
        preset(
            0x7e3a_0003,
            "Sunset",
            &[("primary", "#f97316"), ("accent", "#db2777"), ("header", "#9a3412")],
        ),
        preset(
            0x7e3a_0004,
            "Night",
            &[
                ("background", "#0f172a"),
                ("foreground", "#f8fafc"),
                ("card", "#1e293b"),
                ("border", "#334155"),
                ("primary", "#818cf8"),
            ],
        ),
    ]
}

/// Looks a theme up among the presets first, then the caller's saved themes.
pub async fn find_theme(
    repo: &dyn ThemeRepository,
    caller: Uuid,
    id: Uuid,
) -> PortResult<ColorTheme> {
    match presets().into_iter().find(|t| t.id == id) {
        Some(theme) => Ok(theme),
        None => repo.get_theme(caller, id).await,
    }
}

/// Makes `theme` the caller's active colors.
pub async fn activate_theme(
    repo: &dyn ThemeRepository,
    caller: Uuid,
    id: Uuid,
) -> PortResult<Vec<ElementColor>> {
    let theme = find_theme(repo, caller, id).await?;
    repo.set_element_colors(caller, &theme.colors).await?;
    Ok(theme.colors)
}

/// Persists the caller's active colors as a named theme.
pub async fn save_current_theme(
    repo: &dyn ThemeRepository,
    caller: Uuid,
    name: &str,
) -> PortResult<ColorTheme> {
    let colors = repo.list_element_colors(caller).await?;
    repo.create_theme(caller, name, &colors).await
}

/// Clears the caller's active colors, falling back to the defaults.
pub async fn reset_theme(repo: &dyn ThemeRepository, caller: Uuid) -> PortResult<()> {
    repo.set_element_colors(caller, &[]).await
}
