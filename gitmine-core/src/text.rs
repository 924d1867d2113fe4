//! Binary-sniffing and line-counting — the authoritative definitions every
//! other component (bridge, blob, diff) defers to.

/// Bytes scanned from the start of a buffer when sniffing for binary content.
const BINARY_SCAN_WINDOW: usize = 8_000;

/// True iff a null byte appears anywhere in the first [`BINARY_SCAN_WINDOW`]
/// bytes. Empty input is never binary.
pub fn is_binary(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(BINARY_SCAN_WINDOW)];
    window.contains(&0)
}

/// Number of lines in `bytes`: zero for empty input, otherwise the number of
/// `\n` bytes plus one more if the buffer doesn't end on a newline.
pub fn count_lines(bytes: &[u8]) -> usize {
    if bytes.is_empty() {
        return 0;
    }
    let newlines = bytes.iter().filter(|&&b| b == b'\n').count();
    if bytes.last() == Some(&b'\n') {
        newlines
    } else {
        newlines + 1
    }
}

/// A cheap read-only cursor over a byte buffer, for callers that want
/// `std::io::Read` without copying.
pub fn bytes_reader(bytes: &[u8]) -> std::io::Cursor<&[u8]> {
    std::io::Cursor::new(bytes)
}
