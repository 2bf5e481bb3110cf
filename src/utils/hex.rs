//! Text form of byte runs, as used by catalog definitions and the `asm_dump` CLI.

/// Formats bytes as lowercase, space-separated hex pairs (`e9 00 01 00 00`).
pub fn to_hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses a run of hex digits into bytes.
///
/// Whitespace is allowed anywhere and ignored, and an optional `0x` prefix is accepted on each
/// whitespace-separated group, so `"81 ec 00 01"`, `"81ec0001"` and `"0x81ec 0x0001"` parse to the
/// same bytes.
pub fn parse_hex(text: &str) -> Result<Vec<u8>, &'static str> {
    let mut digits = Vec::with_capacity(text.len());
    for group in text.split_whitespace() {
        let group = group
            .strip_prefix("0x")
            .or_else(|| group.strip_prefix("0X"))
            .unwrap_or(group);
        for c in group.chars() {
            let nibble = c.to_digit(16).ok_or("not a hex digit")?;
            digits.push(nibble as u8);
        }
    }

    if digits.len() % 2 != 0 {
        return Err("odd number of hex digits");
    }

    Ok(digits
        .chunks_exact(2)
        .map(|pair| (pair[0] << 4) | pair[1])
        .collect())
}
