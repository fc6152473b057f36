//! Palette swatch previews.
//!
//! Eight well-known keys are laid out on a 2×4 grid of flat rectangles. The
//! geometry never changes between themes; only the fill colors do.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use image::{ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};
use crate::theme::ThemeDefinition;
use crate::util::write_bytes;

/// Keys rendered into the swatch, in cell order.
pub const SWATCH_KEYS: [&str; 8] = [
    "BG_PRIMARY",
    "BG_SECONDARY",
    "FG_PRIMARY",
    "ACCENT",
    "STATUS_DOWNLOADING",
    "STATUS_UPLOADING",
    "STATUS_PAUSED",
    "STATUS_ERROR",
];

pub const COLUMNS: u32 = 4;
pub const ROWS: u32 = 2;
pub const CELL_WIDTH: u32 = 120;
pub const CELL_HEIGHT: u32 = 80;
pub const SWATCH_WIDTH: u32 = COLUMNS * CELL_WIDTH;
pub const SWATCH_HEIGHT: u32 = ROWS * CELL_HEIGHT;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SwatchFormat {
    #[default]
    Svg,
    Png,
}

impl SwatchFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwatchCell<'a> {
    pub key: &'static str,
    pub color: &'a str,
    pub x: u32,
    pub y: u32,
}

/// Resolves the eight swatch cells for a theme, failing on the first missing key.
pub fn layout(theme: &ThemeDefinition) -> Result<Vec<SwatchCell<'_>>> {
    SWATCH_KEYS
        .iter()
        .copied()
        .zip(0_u32..)
        .map(|(key, index)| {
            let color = theme
                .color(key)
                .ok_or_else(|| ForgeError::MissingColorKey {
                    theme: theme.id.clone(),
                    key: key.to_string(),
                })?;
            Ok(SwatchCell {
                key,
                color,
                x: (index % COLUMNS) * CELL_WIDTH,
                y: (index / COLUMNS) * CELL_HEIGHT,
            })
        })
        .collect()
}

#[must_use]
pub fn render_svg(cells: &[SwatchCell<'_>]) -> String {
    let mut svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{SWATCH_WIDTH}\" height=\"{SWATCH_HEIGHT}\" viewBox=\"0 0 {SWATCH_WIDTH} {SWATCH_HEIGHT}\">\n"
    );
    for cell in cells {
        svg.push_str(&format!(
            "  <rect x=\"{}\" y=\"{}\" width=\"{CELL_WIDTH}\" height=\"{CELL_HEIGHT}\" fill=\"{}\"/>\n",
            cell.x, cell.y, cell.color
        ));
    }
    svg.push_str("</svg>\n");
    svg
}

fn hex_nibble(byte: u8) -> Option<u8> {
    char::from(byte).to_digit(16).and_then(|digit| u8::try_from(digit).ok())
}

/// Parses `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa`.
#[must_use]
pub fn parse_hex_color(value: &str) -> Option<Rgba<u8>> {
    let digits = value.trim().strip_prefix('#')?.as_bytes();
    let nibbles = digits
        .iter()
        .map(|byte| hex_nibble(*byte))
        .collect::<Option<Vec<_>>>()?;

    let channels = match nibbles.len() {
        3 | 4 => nibbles.iter().map(|n| n * 17).collect::<Vec<_>>(),
        6 | 8 => nibbles
            .chunks(2)
            .map(|pair| pair[0] * 16 + pair[1])
            .collect::<Vec<_>>(),
        _ => return None,
    };

    let alpha = channels.get(3).copied().unwrap_or(u8::MAX);
    Some(Rgba([channels[0], channels[1], channels[2], alpha]))
}

pub fn render_png(cells: &[SwatchCell<'_>]) -> Result<Vec<u8>> {
    let mut image = RgbaImage::new(SWATCH_WIDTH, SWATCH_HEIGHT);
    for cell in cells {
        let fill = parse_hex_color(cell.color).ok_or_else(|| ForgeError::InvalidColor {
            key: cell.key.to_string(),
            value: cell.color.to_string(),
        })?;
        for y in cell.y..cell.y + CELL_HEIGHT {
            for x in cell.x..cell.x + CELL_WIDTH {
                image.put_pixel(x, y, fill);
            }
        }
    }

    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

/// Renders the swatch for `theme` in the requested format.
pub fn render(theme: &ThemeDefinition, format: SwatchFormat) -> Result<Vec<u8>> {
    let cells = layout(theme)?;
    match format {
        SwatchFormat::Svg => Ok(render_svg(&cells).into_bytes()),
        SwatchFormat::Png => render_png(&cells),
    }
}

#[must_use]
pub fn swatch_path(assets_dir: &Path, theme_id: &str, format: SwatchFormat) -> PathBuf {
    assets_dir.join(format!("palette-{theme_id}.{}", format.extension()))
}

/// Renders and writes `<assets_dir>/palette-<id>.<ext>`, returning the path.
pub fn write_swatch(
    theme: &ThemeDefinition,
    assets_dir: &Path,
    format: SwatchFormat,
) -> Result<PathBuf> {
    let bytes = render(theme, format)?;
    let path = swatch_path(assets_dir, &theme.id, format);
    write_bytes(&path, &bytes)?;
    tracing::debug!(theme = %theme.id, path = %path.display(), "palette swatch written");
    Ok(path)
}
