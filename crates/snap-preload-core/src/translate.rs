//! Resource name translation.
//!
//! snapd's AppArmor policy only lets a snap touch `/dev/shm` entries named
//! `snap.<instance>.*`. Every shm and semaphore name goes through
//! [`translate`] before reaching libc so unmodified applications land inside
//! that namespace.

use std::ffi::{CStr, CString};

use snap_preload_config::log_preload_debug;

use crate::identity::InstanceName;

/// Mandatory leading component of every confined resource name.
pub const NAMESPACE_PREFIX: &str = "snap";

/// NAME_MAX on Linux; no translated name is longer than this.
pub const MAX_NAME_LEN: usize = 255;

/// Fixed-capacity byte sink that silently drops whatever does not fit.
pub(crate) struct NameWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> NameWriter<'a> {
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn push(&mut self, bytes: &[u8]) {
        let remaining = self.buf.len() - self.pos;
        let to_copy = std::cmp::min(bytes.len(), remaining);
        self.buf[self.pos..self.pos + to_copy].copy_from_slice(&bytes[..to_copy]);
        self.pos += to_copy;
    }

    pub(crate) fn len(&self) -> usize {
        self.pos
    }
}

/// Drop exactly one leading `/`.
pub fn strip_separator(name: &[u8]) -> &[u8] {
    name.strip_prefix(b"/").unwrap_or(name)
}

/// Translate `logical` into `dest`, NUL-terminated.
///
/// Returns the number of name bytes written, excluding the terminator. The
/// name is cut at `dest.len() - 1` bytes, and at [`MAX_NAME_LEN`] bytes when
/// an instance is known. Nothing is written when `dest` is empty.
pub fn translate_into(instance: Option<&InstanceName>, logical: &[u8], dest: &mut [u8]) -> usize {
    let Some(last) = dest.len().checked_sub(1) else {
        return 0;
    };

    let len = {
        let (body, _) = dest.split_at_mut(last);
        match instance {
            None => {
                let mut writer = NameWriter::new(body);
                writer.push(logical);
                writer.len()
            }
            Some(instance) => {
                let cap = std::cmp::min(body.len(), MAX_NAME_LEN);
                let mut writer = NameWriter::new(&mut body[..cap]);
                writer.push(b"/");
                writer.push(NAMESPACE_PREFIX.as_bytes());
                writer.push(b".");
                writer.push(instance.as_str().as_bytes());
                writer.push(b".");
                writer.push(strip_separator(logical));
                writer.len()
            }
        }
    };
    dest[len] = 0;
    len
}

/// Translate a caller-supplied name.
///
/// Without an instance the name is returned unchanged, whatever its length,
/// so libc reports over-long names exactly as it would without us.
pub fn translate(instance: Option<&InstanceName>, logical: &CStr) -> CString {
    if instance.is_none() {
        return logical.to_owned();
    }

    let mut buf = [0u8; MAX_NAME_LEN + 1];
    let len = translate_into(instance, logical.to_bytes(), &mut buf);
    // Neither the instance nor a CStr can contain NUL.
    let translated = CString::new(&buf[..len]).unwrap_or_else(|_| logical.to_owned());
    log_preload_debug!(
        "name rewritten",
        from = tracing::field::display(logical.to_string_lossy()),
        to = tracing::field::display(translated.to_string_lossy())
    );
    translated
}
