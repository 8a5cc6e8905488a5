// Bounded stderr accumulator

/// Collects worker stderr lines, keeping only the most recent `limit` bytes
#[derive(Debug)]
pub struct ErrorBuffer {
    text: String,
    limit: usize,
    truncated: bool,
}

impl ErrorBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            text: String::new(),
            limit,
            truncated: false,
        }
    }

    pub fn push(&mut self, line: &str) {
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        self.text.push_str(line.trim_end());

        if self.text.len() > self.limit {
            let mut cut = self.text.len() - self.limit;
            while !self.text.is_char_boundary(cut) {
                cut += 1;
            }
            self.text.drain(..cut);
            self.truncated = true;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Buffered text, prefixed with `...` when older output was dropped
    pub fn contents(&self) -> String {
        let text = self.text.trim();
        if self.truncated {
            format!("...{}", text)
        } else {
            text.to_string()
        }
    }
}
