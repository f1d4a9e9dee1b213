//! Color string conversions.
//!
//! Two flavours exist on purpose: enriched nodes keep transparency (`rgba(...)` when the
//! paint is not fully opaque) while palettes are alpha-agnostic and always use `#rrggbb`.

use crate::model::Color;

/// Truncates a `[0, 1]` channel to `0..=255`. Out of range and NaN saturate.
fn channel(component: f64) -> u8 {
    (component * 255.0) as u8
}

/// `#rrggbb` for opaque colors, `rgba(r, g, b, a)` with two alpha decimals otherwise.
pub fn css_color(color: &Color) -> String {
    let (r, g, b) = (channel(color.r), channel(color.g), channel(color.b));
    if color.a >= 1.0 {
        format!("#{r:02x}{g:02x}{b:02x}")
    } else {
        format!("rgba({r}, {g}, {b}, {:.2})", color.a)
    }
}

/// `#rrggbb`, alpha discarded.
pub fn hex_rgb(color: &Color) -> String {
    format!(
        "#{:02x}{:02x}{:02x}",
        channel(color.r),
        channel(color.g),
        channel(color.b)
    )
}

/// Reads back a string produced by [`css_color`] as an alpha-free `#rrggbb`.
pub fn css_to_hex_rgb(css: &str) -> Option<String> {
    let css = css.trim();
    if let Some(hex) = css.strip_prefix('#') {
        let hex = hex.get(..6)?;
        if hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Some(format!("#{}", hex.to_ascii_lowercase()));
        }
        return None;
    }
    let inner = css
        .strip_prefix("rgba(")
        .or_else(|| css.strip_prefix("rgb("))?
        .strip_suffix(')')?;
    let mut parts = inner.split(',').map(|p| p.trim().parse::<u8>());
    let (r, g, b) = (parts.next()?.ok()?, parts.next()?.ok()?, parts.next()?.ok()?);
    Some(format!("#{r:02x}{g:02x}{b:02x}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba(r: f64, g: f64, b: f64, a: f64) -> Color {
        Color { r, g, b, a }
    }

    #[test]
    fn opaque_colors_become_hex() {
        assert_eq!(css_color(&rgba(1.0, 0.0, 0.0, 1.0)), "#ff0000");
    }

    #[test]
    fn translucent_colors_keep_alpha() {
        assert_eq!(css_color(&rgba(0.0, 0.0, 1.0, 0.5)), "rgba(0, 0, 255, 0.50)");
    }

    #[test]
    fn channels_are_truncated_not_rounded() {
        // 0.999 * 255 = 254.745
        assert_eq!(css_color(&rgba(0.999, 0.5, 0.0, 1.0)), "#fe7f00");
    }

    #[test]
    fn palette_hex_drops_alpha() {
        assert_eq!(hex_rgb(&rgba(0.0, 0.0, 1.0, 0.25)), "#0000ff");
    }

    #[test]
    fn reads_back_enriched_color_strings() {
        assert_eq!(css_to_hex_rgb("#FF0000").as_deref(), Some("#ff0000"));
        assert_eq!(
            css_to_hex_rgb("rgba(0, 0, 255, 0.50)").as_deref(),
            Some("#0000ff")
        );
        assert_eq!(css_to_hex_rgb("linear-gradient"), None);
    }
}
