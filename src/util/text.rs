//! Width helpers for the fork table. Widths count chars, ignoring ANSI escapes.

const ELLIPSIS: char = '…';

/// Visible width of `s`, skipping CSI (`ESC [ ... m`) and OSC (`ESC ] ... ESC \`) sequences.
pub fn visible_width(s: &str) -> usize {
    let mut n = 0;
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            n += 1;
            continue;
        }
        match chars.next() {
            Some('[') => {
                for c in chars.by_ref() {
                    if c.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
            Some(']') => {
                while let Some(c) = chars.next() {
                    if c == '\x07' {
                        break;
                    }
                    if c == '\x1b' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            _ => {}
        }
    }
    n
}

/// Keep the head of `s`, ending in an ellipsis when it exceeds `width`.
pub fn clamp_end(s: &str, width: usize) -> String {
    let count = s.chars().count();
    if count <= width || width == 0 {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width - 1).collect();
    out.push(ELLIPSIS);
    out
}

/// Keep both ends of `s` with an ellipsis in the middle when it exceeds `width`.
pub fn clamp_middle(s: &str, width: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= width || width < 3 {
        return s.to_string();
    }
    let keep = width - 1;
    let head = keep / 2;
    let tail = keep - head;
    let mut out: String = chars[..head].iter().collect();
    out.push(ELLIPSIS);
    out.extend(&chars[chars.len() - tail..]);
    out
}

/// Right-pad to `width` visible columns.
pub fn pad_visible(s: &str, width: usize) -> String {
    let w = visible_width(s);
    if w >= width {
        s.to_string()
    } else {
        format!("{s}{}", " ".repeat(width - w))
    }
}

/// Center within `width` visible columns, extra space going right.
pub fn center_visible(s: &str, width: usize) -> String {
    let w = visible_width(s);
    if w >= width {
        return s.to_string();
    }
    let left = (width - w) / 2;
    let right = width - w - left;
    format!("{}{s}{}", " ".repeat(left), " ".repeat(right))
}

/// OSC-8 terminal hyperlink.
pub fn hyperlink(text: &str, target: &str) -> String {
    format!("\x1b]8;;{target}\x1b\\{text}\x1b]8;;\x1b\\")
}
