//! In-memory frame sink.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use serde_json::Value;

/// Cloneable writer whose contents can be read back as frames.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    /// Decodes every complete line written so far.
    pub fn frames(&self) -> Vec<Value> {
        let bytes = self.bytes.lock().expect("buffer mutex poisoned");
        bytes
            .split(|byte| *byte == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_slice(line).expect("frame is valid JSON"))
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes
            .lock()
            .expect("buffer mutex poisoned")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
