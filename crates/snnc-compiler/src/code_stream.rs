//! Indented code writer with tagged braces.
//!
//! Every opened brace carries a numeric id and must be closed with the same
//! id. A mismatch is a generator bug; [`CodeStream::finish`] reports any
//! brace still open.

use crate::{CompilerError, Result};

const INDENT: &str = "    ";

/// Accumulates generated source text
#[derive(Debug, Default)]
pub struct CodeStream {
    out: String,
    indent: usize,
    open: Vec<u32>,
}

impl CodeStream {
    /// Empty stream
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one or more lines at the current indentation
    pub fn line(&mut self, text: impl AsRef<str>) {
        for l in text.as_ref().lines() {
            if l.trim().is_empty() {
                self.out.push('\n');
                continue;
            }
            for _ in 0..self.indent {
                self.out.push_str(INDENT);
            }
            self.out.push_str(l);
            self.out.push('\n');
        }
    }

    /// Empty line
    pub fn blank(&mut self) {
        self.out.push('\n');
    }

    /// `// text`
    pub fn comment(&mut self, text: impl AsRef<str>) {
        self.line(format!("// {}", text.as_ref()));
    }

    /// Open a brace on its own line
    pub fn open(&mut self, id: u32) {
        self.line("{");
        self.indent += 1;
        self.open.push(id);
    }

    /// Write `head {` and indent
    pub fn open_with(&mut self, head: impl AsRef<str>, id: u32) {
        self.line(format!("{} {{", head.as_ref()));
        self.indent += 1;
        self.open.push(id);
    }

    /// Close the brace opened with `id`
    pub fn close(&mut self, id: u32) {
        let top = self.open.pop();
        debug_assert_eq!(top, Some(id), "brace {id} closed out of order");
        self.indent = self.indent.saturating_sub(1);
        self.line("}");
    }

    /// Ids of braces not yet closed
    pub fn open_ids(&self) -> &[u32] {
        &self.open
    }

    /// Text written so far
    pub fn as_str(&self) -> &str {
        &self.out
    }

    /// Consume the stream; fails if a brace is still open
    pub fn finish(self, file: &str) -> Result<String> {
        if !self.open.is_empty() {
            return Err(CompilerError::UnbalancedBraces {
                file: file.to_string(),
                open: self.open,
            });
        }
        Ok(self.out)
    }
}
