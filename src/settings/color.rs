//! Hex color parsing shared by the settings layer, the part-color engine and
//! the control panel. Accepts `#rrggbb` and `#rgb`, with or without the hash.

/// Parse a hex color string into 8-bit RGB channels.
pub fn parse_hex_bytes(value: &str) -> Option<[u8; 3]> {
    let digits = value.trim().trim_start_matches('#');
    if !digits.is_ascii() {
        return None;
    }
    match digits.len() {
        6 => {
            let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
            let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
            let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
            Some([r, g, b])
        }
        3 => {
            let mut out = [0u8; 3];
            for (slot, ch) in out.iter_mut().zip(digits.chars()) {
                let nibble = ch.to_digit(16)? as u8;
                *slot = nibble << 4 | nibble;
            }
            Some(out)
        }
        _ => None,
    }
}

/// Parse a hex color string into normalized linear-ish floats.
pub fn parse_hex(value: &str) -> Option<[f32; 3]> {
    parse_hex_bytes(value).map(|[r, g, b]| {
        [
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
        ]
    })
}

pub fn format_hex_bytes(rgb: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}

pub fn is_valid_hex(value: &str) -> bool {
    parse_hex_bytes(value).is_some()
}
