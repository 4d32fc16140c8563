// src/bridge/assembler.rs

/// Held text longer than this is released as a line of its own.
pub const MAX_HELD_BYTES: usize = 8 * 1024;

/// Reassembles output chunks into lines.
///
/// Text after the last newline is held until more output arrives, a prompt
/// decision consumes it, or the process exits and it is flushed as-is.
/// Output that never ends a line (progress dots, `\r` bars) is released
/// once it exceeds [`MAX_HELD_BYTES`].
#[derive(Debug, Clone, Default)]
pub struct LineAssembler {
    held: String,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every line it completed, without line
    /// terminators.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.held.push_str(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.held.find('\n') {
            let mut line: String = self.held.drain(..=pos).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            lines.push(line);
        }
        if self.held.len() > MAX_HELD_BYTES {
            lines.push(self.take_held());
        }
        lines
    }

    pub fn held(&self) -> &str {
        &self.held
    }

    pub fn take_held(&mut self) -> String {
        std::mem::take(&mut self.held)
    }
}
