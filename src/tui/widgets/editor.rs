use std::cmp;

/// Minimal multi-line text buffer with a character-indexed cursor
#[derive(Debug, Clone)]
pub struct Editor {
    pub lines: Vec<String>,
    pub cursor_line: usize,
    pub cursor_col: usize,
    /// First visible line
    pub scroll_offset: usize,
    multi_line: bool,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl Editor {
    pub fn new() -> Self {
        Self {
            lines: vec![String::new()],
            cursor_line: 0,
            cursor_col: 0,
            scroll_offset: 0,
            multi_line: false,
        }
    }

    pub fn multi_line() -> Self {
        Self {
            multi_line: true,
            ..Self::new()
        }
    }

    /// Load `content`, placing the cursor at its end
    pub fn with_content(mut self, content: &str) -> Self {
        self.lines = if content.is_empty() {
            vec![String::new()]
        } else if self.multi_line {
            content.lines().map(|s| s.to_string()).collect()
        } else {
            vec![content.replace('\n', " ")]
        };
        if self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.cursor_line = self.lines.len() - 1;
        self.cursor_col = self.lines[self.cursor_line].chars().count();
        self
    }

    pub fn is_multi_line(&self) -> bool {
        self.multi_line
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    fn line_len(&self, line: usize) -> usize {
        self.lines.get(line).map_or(0, |l| l.chars().count())
    }

    fn byte_index(line: &str, col: usize) -> usize {
        line.char_indices().nth(col).map_or(line.len(), |(i, _)| i)
    }

    pub fn insert_char(&mut self, ch: char) {
        if ch == '\n' {
            self.insert_newline();
            return;
        }
        let col = cmp::min(self.cursor_col, self.line_len(self.cursor_line));
        if let Some(line) = self.lines.get_mut(self.cursor_line) {
            let idx = Self::byte_index(line, col);
            line.insert(idx, ch);
            self.cursor_col = col + 1;
        }
    }

    /// Split the current line at the cursor. Ignored for single-line editors.
    pub fn insert_newline(&mut self) {
        if !self.multi_line {
            return;
        }
        let col = cmp::min(self.cursor_col, self.line_len(self.cursor_line));
        if let Some(line) = self.lines.get_mut(self.cursor_line) {
            let idx = Self::byte_index(line, col);
            let rest = line.split_off(idx);
            self.lines.insert(self.cursor_line + 1, rest);
            self.cursor_line += 1;
            self.cursor_col = 0;
        }
    }

    /// Backspace
    pub fn delete_char(&mut self) {
        let col = cmp::min(self.cursor_col, self.line_len(self.cursor_line));
        if col > 0 {
            if let Some(line) = self.lines.get_mut(self.cursor_line) {
                let idx = Self::byte_index(line, col - 1);
                line.remove(idx);
                self.cursor_col = col - 1;
            }
        } else if self.cursor_line > 0 {
            let current = self.lines.remove(self.cursor_line);
            self.cursor_line -= 1;
            self.cursor_col = self.line_len(self.cursor_line);
            self.lines[self.cursor_line].push_str(&current);
        }
    }

    /// Delete key
    pub fn delete_forward(&mut self) {
        let len = self.line_len(self.cursor_line);
        let col = cmp::min(self.cursor_col, len);
        if col < len {
            if let Some(line) = self.lines.get_mut(self.cursor_line) {
                let idx = Self::byte_index(line, col);
                line.remove(idx);
            }
        } else if self.cursor_line + 1 < self.lines.len() {
            let next = self.lines.remove(self.cursor_line + 1);
            self.lines[self.cursor_line].push_str(&next);
        }
    }

    pub fn move_left(&mut self) {
        if self.cursor_col > 0 {
            self.cursor_col = cmp::min(self.cursor_col, self.line_len(self.cursor_line)) - 1;
        } else if self.cursor_line > 0 {
            self.cursor_line -= 1;
            self.cursor_col = self.line_len(self.cursor_line);
        }
    }

    pub fn move_right(&mut self) {
        if self.cursor_col < self.line_len(self.cursor_line) {
            self.cursor_col += 1;
        } else if self.cursor_line + 1 < self.lines.len() {
            self.cursor_line += 1;
            self.cursor_col = 0;
        }
    }

    pub fn move_up(&mut self) {
        if self.cursor_line > 0 {
            self.cursor_line -= 1;
            self.cursor_col = cmp::min(self.cursor_col, self.line_len(self.cursor_line));
        }
    }

    pub fn move_down(&mut self) {
        if self.cursor_line + 1 < self.lines.len() {
            self.cursor_line += 1;
            self.cursor_col = cmp::min(self.cursor_col, self.line_len(self.cursor_line));
        }
    }

    pub fn move_home(&mut self) {
        self.cursor_col = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor_col = self.line_len(self.cursor_line);
    }

    /// Keep the cursor line inside a viewport of `height` lines
    pub fn update_scroll(&mut self, height: usize) {
        if height == 0 {
            return;
        }
        if self.cursor_line < self.scroll_offset {
            self.scroll_offset = self.cursor_line;
        } else if self.cursor_line >= self.scroll_offset + height {
            self.scroll_offset = self.cursor_line + 1 - height;
        }
    }
}
