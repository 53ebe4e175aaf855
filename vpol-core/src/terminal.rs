//! Console side effects. Everything goes through the interpreter's output
//! sink so scripts stay testable without a real terminal.

use std::io::{self, BufRead, Write};

/// ANSI clear-screen plus cursor-home.
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[1;1H";

/// Set the host terminal title via OSC 0.
pub fn set_title<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    write!(out, "\x1b]0;{}\x07", title)?;
    out.flush()
}

pub fn clear<W: Write>(out: &mut W) -> io::Result<()> {
    write!(out, "{}", CLEAR_SCREEN)?;
    out.flush()
}

/// Write `prompt` without a newline, flush, then read one line from
/// `input`. The trailing line terminator is dropped; the rest is returned
/// verbatim.
pub fn read_line<R, W>(input: &mut R, out: &mut W, prompt: &str) -> io::Result<String>
where
    R: BufRead,
    W: Write,
{
    write!(out, "{}", prompt)?;
    out.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn prompt_precedes_read() {
        let mut input = Cursor::new("Alice\n");
        let mut out = Vec::new();
        let line = read_line(&mut input, &mut out, "name: ").unwrap();
        assert_eq!(line, "Alice");
        assert_eq!(out, b"name: ");
    }

    #[test]
    fn crlf_is_stripped() {
        let mut input = Cursor::new("value\r\n");
        let mut out = Vec::new();
        assert_eq!(read_line(&mut input, &mut out, "").unwrap(), "value");
    }

    #[test]
    fn title_uses_osc_zero() {
        let mut out = Vec::new();
        set_title(&mut out, "diag").unwrap();
        assert_eq!(out, b"\x1b]0;diag\x07");
    }
}
