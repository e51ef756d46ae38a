//! Conversion between A1-style cell references and zero-based indexes.

/// Rows in a worksheet (`1..=1048576`)
pub(crate) const MAX_ROWS: usize = 1_048_576;
/// Columns in a worksheet (`A..=XFD`)
pub(crate) const MAX_COLUMNS: usize = 16_384;

/// Converts column letters (`A`, `AB`) to a zero-based column index.
pub(crate) fn col_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut index = 0usize;
    for letter in letters.chars() {
        if !letter.is_ascii_alphabetic() {
            return None;
        }
        let digit = (letter.to_ascii_uppercase() as usize) - ('A' as usize) + 1;
        index = index.checked_mul(26)?.checked_add(digit)?;
        if index > MAX_COLUMNS {
            return None;
        }
    }
    Some(index - 1)
}

/// Converts a one-based row number to a zero-based row index.
/// Rows outside `1..=MAX_ROWS` have no index.
pub(crate) fn row_to_index(digits: &str) -> Option<usize> {
    digits
        .parse::<usize>()
        .ok()
        .filter(|row| (1..=MAX_ROWS).contains(row))
        .map(|row| row - 1)
}

/// Converts zero-based indexes to an A1-style reference.
pub(crate) fn index_to_reference(row: usize, col: usize) -> String {
    let mut column = col + 1;
    let mut letters = Vec::<char>::new();
    while column > 0 {
        column -= 1;
        letters.push((b'A' + (column % 26) as u8) as char);
        column /= 26;
    }
    let mut reference: String = letters.into_iter().rev().collect();
    reference.push_str(&(row + 1).to_string());
    reference
}

/// Converts an A1-style reference (optionally `$`-anchored) to zero-based `(row, col)`.
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.replace('$', "");
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    Some((row_to_index(digits)?, col_to_index(letters)?))
}
