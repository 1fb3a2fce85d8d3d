/// Write a diagnostic straight to fd 2 and abort.
///
/// For states with no correct continuation, such as a missing original
/// symbol. Formats on the stack and never unwinds.
#[macro_export]
macro_rules! preload_fatal {
    ($($arg:tt)*) => {{
        use std::fmt::Write;
        let mut msg = $crate::macros::FatalMessage::new();
        let _ = write!(msg, $($arg)*);
        msg.emit()
    }};
}

const FATAL_PREFIX: &[u8] = b"snap-preload: fatal: ";

/// Fixed-size message buffer; text past its capacity is dropped.
pub struct FatalMessage {
    buf: [u8; 256],
    len: usize,
}

impl FatalMessage {
    pub fn new() -> Self {
        let mut buf = [0u8; 256];
        buf[..FATAL_PREFIX.len()].copy_from_slice(FATAL_PREFIX);
        Self {
            buf,
            len: FATAL_PREFIX.len(),
        }
    }

    /// Print the message followed by a newline, then abort the process.
    pub fn emit(mut self) -> ! {
        // Always leave room for the newline.
        let end = self.len.min(self.buf.len() - 1);
        self.buf[end] = b'\n';
        unsafe {
            libc::write(2, self.buf.as_ptr() as *const libc::c_void, end + 1);
            libc::abort()
        }
    }
}

impl Default for FatalMessage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Write for FatalMessage {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        let room = self.buf.len() - self.len;
        let n = s.len().min(room);
        self.buf[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
        self.len += n;
        Ok(())
    }
}
