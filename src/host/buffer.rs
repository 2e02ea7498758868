use ropey::Rope;
use std::{fs::File, io, path::PathBuf};

/// A line-addressed text buffer
///
/// Lines are stored without their terminators. A trailing newline ends the
/// last line rather than starting a new one, so `"a\nb\n"` holds two lines.
pub struct Buffer {
    text: Rope,
    filepath: Option<PathBuf>,
    dirty: bool,
}

impl Buffer {
    pub fn new() -> Self {
        Self {
            text: Rope::new(),
            filepath: None,
            dirty: false,
        }
    }

    pub fn from_file(path: PathBuf) -> io::Result<Self> {
        let text = Rope::from_reader(File::open(&path)?)?;
        Ok(Self {
            text,
            filepath: Some(path),
            dirty: false,
        })
    }

    pub fn from_text(s: &str) -> Self {
        Self {
            text: Rope::from_str(s),
            filepath: None,
            dirty: false,
        }
    }

    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut text = String::new();
        for line in lines {
            text.push_str(line.as_ref());
            text.push('\n');
        }
        Self::from_text(&text)
    }

    pub fn save(&self) -> io::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(path) = &self.filepath {
            let mut file = File::create(path)?;
            self.text.write_to(&mut file)?;
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::Other, "No file path"))
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn line_count(&self) -> usize {
        let len = self.text.len_chars();
        if len > 0 && self.text.char(len - 1) == '\n' {
            self.text.len_lines() - 1
        } else {
            self.text.len_lines()
        }
    }

    /// Line content without its newline
    pub fn line(&self, idx: usize) -> String {
        let mut line = self.text.line(idx).to_string();
        if line.ends_with('\n') {
            line.pop();
        }
        line
    }

    pub fn lines(&self, start: usize, end: usize) -> Vec<String> {
        (start..end).map(|idx| self.line(idx)).collect()
    }

    /// Char index where line `idx` starts, or the end of text past the last line
    fn line_start_char(&self, idx: usize) -> usize {
        if idx < self.line_count() {
            self.text.line_to_char(idx)
        } else {
            self.text.len_chars()
        }
    }

    /// Replace lines `[start, end)` with `replacement`
    ///
    /// Callers check bounds; `start <= end <= line_count()`.
    pub fn replace_lines(&mut self, start: usize, end: usize, replacement: &[String]) {
        let from = self.line_start_char(start);
        let to = self.line_start_char(end);
        // Removing the unterminated last line leaves a dangling newline before it
        let drop_trailing_newline = end == self.line_count()
            && replacement.is_empty()
            && start > 0
            && !self.ends_with_newline();
        self.text.remove(from..to);
        if drop_trailing_newline && from > 0 {
            self.text.remove(from - 1..from);
        }

        let at = from.min(self.text.len_chars());
        let mut inserted = String::new();
        // Appending after an unterminated last line has to end that line first
        if !replacement.is_empty()
            && start > 0
            && at == self.text.len_chars()
            && !self.ends_with_newline()
        {
            inserted.push('\n');
        }
        for line in replacement {
            inserted.push_str(line);
            inserted.push('\n');
        }
        self.text.insert(at, &inserted);
        self.dirty = true;
    }

    fn ends_with_newline(&self) -> bool {
        let len = self.text.len_chars();
        len > 0 && self.text.char(len - 1) == '\n'
    }

    pub fn to_text(&self) -> String {
        self.text.to_string()
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}
