//! Buffered writer for cacheable responses.
//!
//! A writer is handed out on a cache miss. The handler renders into it,
//! optionally opening nested response parts with their own tag sets and
//! lifetimes, and finishes it to commit the hierarchy and obtain the bytes
//! to serve. Once a writer is invalidated every further call is a no-op and
//! nothing is committed; the buffered bytes are still served directly.

use std::sync::Arc;

use bytes::Bytes;
use time::OffsetDateTime;
use tracing::warn;

use super::handle::CacheHandle;
use super::store::{CachedBody, ResponseCache};

/// Outcome of opening a response part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartOutcome {
    /// The part was cached and its bytes are already in the output; do not
    /// render it and do not call `end_response_part`.
    Cached,
    /// The part must be rendered; close it with `end_response_part`.
    Render,
}

struct OpenPart {
    handle: CacheHandle,
    start: usize,
}

struct FinishedPart {
    handle: CacheHandle,
    start: usize,
    end: usize,
}

pub struct ResponseWriter {
    cache: Option<Arc<ResponseCache>>,
    root: CacheHandle,
    headers: Vec<(String, String)>,
    buffer: Vec<u8>,
    open_parts: Vec<OpenPart>,
    finished_parts: Vec<FinishedPart>,
    /// Keys of parts served from the cache; the committed entry still embeds
    /// their bytes and must be linked to them for cascading invalidation.
    cached_children: Vec<String>,
    invalidated: bool,
}

impl ResponseWriter {
    pub(super) fn new(cache: Arc<ResponseCache>, root: CacheHandle) -> Self {
        Self {
            cache: Some(cache),
            root,
            headers: Vec::new(),
            buffer: Vec::new(),
            open_parts: Vec::new(),
            finished_parts: Vec::new(),
            cached_children: Vec::new(),
            invalidated: false,
        }
    }

    /// A writer that buffers but never commits, used when the cache is
    /// disabled or faulted.
    pub(super) fn passthrough(root: CacheHandle) -> Self {
        Self {
            cache: None,
            root,
            headers: Vec::new(),
            buffer: Vec::new(),
            open_parts: Vec::new(),
            finished_parts: Vec::new(),
            cached_children: Vec::new(),
            invalidated: false,
        }
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn write_str(&mut self, text: &str) {
        self.write(text.as_bytes());
    }

    /// Set a response header, replacing an existing one of the same name.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(existing) = self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            existing.1 = value;
        } else {
            self.headers.push((name, value));
        }
    }

    /// Raise the root entry's content modification date.
    pub fn set_modification_date(&mut self, date: OffsetDateTime) {
        self.root.set_modification_date(date);
    }

    /// Open an independently cached part of this response.
    ///
    /// A part hit splices the cached fragment into the output. A part miss
    /// leaves the part open: render its content and close it with
    /// [`Self::end_response_part`].
    pub fn start_response_part(&mut self, handle: CacheHandle) -> PartOutcome {
        if self.invalidated {
            self.open_parts.push(OpenPart {
                start: self.buffer.len(),
                handle,
            });
            return PartOutcome::Render;
        }
        if let Some(cache) = &self.cache
            && let Some(cached) = cache.fetch(&handle)
        {
            self.root.set_modification_date(cached.modified);
            self.buffer.extend_from_slice(&cached.body);
            self.cached_children.push(handle.key().to_string());
            return PartOutcome::Cached;
        }
        self.open_parts.push(OpenPart {
            start: self.buffer.len(),
            handle,
        });
        PartOutcome::Render
    }

    /// Close the innermost open part.
    pub fn end_response_part(&mut self, handle: &CacheHandle) {
        let Some(open) = self.open_parts.pop() else {
            warn!(key = %handle, "end_response_part without an open part");
            return;
        };
        if open.handle != *handle {
            warn!(
                expected = %open.handle,
                got = %handle,
                "response parts closed out of order; part not cached"
            );
            return;
        }
        self.finished_parts.push(FinishedPart {
            handle: open.handle,
            start: open.start,
            end: self.buffer.len(),
        });
    }

    /// This response turned out to be wrong: discard it. Further part calls
    /// are no-ops and finishing commits nothing.
    pub fn invalidate(&mut self) {
        self.invalidated = true;
        self.open_parts.clear();
        self.finished_parts.clear();
        self.cached_children.clear();
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    /// Finish the response: commit the entry hierarchy (unless invalidated)
    /// and hand back the bytes to serve.
    pub fn finish(mut self) -> CachedBody {
        let body = Bytes::from(std::mem::take(&mut self.buffer));
        let modified = if self.root.modification_date() == OffsetDateTime::UNIX_EPOCH {
            OffsetDateTime::now_utc()
        } else {
            self.root.modification_date()
        };

        if let Some(cache) = self.cache.take()
            && !self.invalidated
        {
            if !self.open_parts.is_empty() {
                warn!(
                    open = self.open_parts.len(),
                    "response finished with unclosed parts; response not cached"
                );
            } else {
                let mut children = std::mem::take(&mut self.cached_children);
                for part in &self.finished_parts {
                    let slice = body.slice(part.start..part.end);
                    cache.insert(&part.handle, self.headers.clone(), slice, Vec::new());
                    children.push(part.handle.key().to_string());
                }
                cache.insert(&self.root, self.headers.clone(), body.clone(), children);
            }
        }

        CachedBody {
            headers: self.headers,
            body,
            modified,
        }
    }
}
