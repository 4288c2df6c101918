//! Location and category normalization for free-text market fields.
//!
//! Agents type place names inconsistently ("Muğla", "MUGLA", " mugla "), so every
//! comparison in the resolver runs on the folded form: trimmed, inner whitespace
//! collapsed, Turkish-aware lower-casing and diacritics removed.

/// Folds a single character. Handles the Turkish dotted/dotless `i` before the
/// generic lower-casing, which would otherwise turn `İ` into `i̇` (two code points).
fn fold_char(c: char, out: &mut String) {
    match c {
        'İ' | 'I' | 'ı' | 'î' | 'Î' | 'í' | 'ì' => out.push('i'),
        'ç' | 'Ç' => out.push('c'),
        'ğ' | 'Ğ' => out.push('g'),
        'ö' | 'Ö' | 'ô' | 'Ô' => out.push('o'),
        'ş' | 'Ş' => out.push('s'),
        'ü' | 'Ü' | 'û' | 'Û' | 'ú' | 'ù' => out.push('u'),
        'â' | 'Â' | 'á' | 'à' => out.push('a'),
        'é' | 'è' | 'ê' => out.push('e'),
        // Combining dot above, left behind by some keyboards after `i`
        '\u{0307}' => {}
        _ => out.extend(c.to_lowercase()),
    }
}

/// Normalizes a city/district name for comparison.
pub fn normalize_location(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for (i, word) in raw.split_whitespace().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        for c in word.chars() {
            fold_char(c, &mut out);
        }
    }
    out
}

/// Normalizes a categorical label such as a property type ("Daire", "villa ").
pub fn normalize_category(raw: &str) -> String {
    normalize_location(raw)
}

/// Room counts compare exactly apart from surrounding whitespace ("3+1" != "3 + 1").
pub fn normalize_room_count(raw: &str) -> &str {
    raw.trim()
}
