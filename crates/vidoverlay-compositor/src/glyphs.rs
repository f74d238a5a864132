//! Built-in 5x7 bitmap glyphs for timestamp text.
//!
//! Used when no TrueType font is configured. Covers digits and the
//! punctuation that time and timecode strings are made of; any other
//! character renders as a hollow box.

/// Glyph cell width in font units.
pub const GLYPH_WIDTH: usize = 5;
/// Glyph cell height in font units.
pub const GLYPH_HEIGHT: usize = 7;
/// Horizontal advance in font units (one column of spacing).
pub const GLYPH_ADVANCE: usize = GLYPH_WIDTH + 1;

const UNKNOWN: [u8; 7] = [0x1F, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1F];

/// Rows of a glyph, top to bottom; bit 4 is the leftmost column.
pub fn glyph_rows(ch: char) -> [u8; 7] {
    match ch {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        's' => [0x00, 0x00, 0x0E, 0x10, 0x0E, 0x01, 0x1E],
        '(' => [0x02, 0x04, 0x08, 0x08, 0x08, 0x04, 0x02],
        ')' => [0x08, 0x04, 0x02, 0x02, 0x02, 0x04, 0x08],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '/' => [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00],
        ' ' => [0x00; 7],
        _ => UNKNOWN,
    }
}

/// Integer scale for a requested pixel size.
pub fn scale_for(font_size: f32) -> usize {
    ((font_size / 12.0).round() as usize).max(1)
}

/// Coverage mask of `ch` at `scale`, `GLYPH_WIDTH * scale` pixels wide.
pub fn rasterize(ch: char, scale: usize) -> Vec<u8> {
    let width = GLYPH_WIDTH * scale;
    let mut mask = vec![0u8; width * GLYPH_HEIGHT * scale];
    for (gy, bits) in glyph_rows(ch).iter().enumerate() {
        for gx in 0..GLYPH_WIDTH {
            if bits & (0x10 >> gx) == 0 {
                continue;
            }
            for dy in 0..scale {
                let row = (gy * scale + dy) * width;
                let col = gx * scale;
                mask[row + col..row + col + scale].fill(255);
            }
        }
    }
    mask
}
