//! Borrowed view into a response buffer.

use bytes::Bytes;

use crate::error::ProtocolError;
use crate::protocol::wire_format::{read_bytes_opt, read_int};

static EMPTY_FRAME: Bytes = Bytes::new();

/// A byte range of a response buffer.
///
/// Never owns bytes. The `'frame` lifetime keeps every slice (and every value
/// borrowed from it) from outliving the buffer it points into. Several slices
/// may alias the same buffer.
#[derive(Clone, Copy, Debug)]
pub struct FrameSlice<'frame> {
    /// Window into `original_frame`.
    frame_subslice: &'frame [u8],
    /// Whole buffer, used to hand out owned `Bytes` without copying.
    original_frame: &'frame Bytes,
}

impl<'frame> FrameSlice<'frame> {
    /// View over a whole buffer.
    #[inline]
    pub fn new(frame: &'frame Bytes) -> Self {
        Self {
            frame_subslice: frame,
            original_frame: frame,
        }
    }

    /// View over `frame[offset..]`.
    ///
    /// Returns an error if `offset` lies past the end of the buffer.
    pub fn new_at(frame: &'frame Bytes, offset: usize) -> Result<Self, ProtocolError> {
        let frame_subslice = frame.get(offset..).ok_or(ProtocolError::TruncatedBuffer {
            needed: offset,
            remaining: frame.len(),
        })?;
        Ok(Self {
            frame_subslice,
            original_frame: frame,
        })
    }

    /// View over a plain slice not backed by `Bytes`.
    ///
    /// [`to_bytes`](Self::to_bytes) copies for such slices.
    #[inline]
    pub fn new_borrowed(frame_subslice: &'frame [u8]) -> Self {
        Self {
            frame_subslice,
            original_frame: &EMPTY_FRAME,
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &'frame [u8] {
        self.frame_subslice
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frame_subslice.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frame_subslice.len()
    }

    /// Owned handle to the same bytes, sharing the buffer when possible.
    pub fn to_bytes(&self) -> Bytes {
        if self.original_frame.is_empty() {
            return Bytes::copy_from_slice(self.frame_subslice);
        }
        self.original_frame.slice_ref(self.frame_subslice)
    }

    /// The first `len` bytes; `len` must not exceed [`len`](Self::len).
    pub(super) fn prefix(&self, len: usize) -> Self {
        Self {
            frame_subslice: &self.frame_subslice[..len],
            original_frame: self.original_frame,
        }
    }

    /// Fail with [`ProtocolError::TrailingBytes`] if any bytes are left.
    ///
    /// The leftover bytes are dropped, so a second call succeeds.
    pub fn ensure_consumed(&mut self) -> Result<(), ProtocolError> {
        let leftover = self.frame_subslice.len();
        if leftover == 0 {
            return Ok(());
        }
        self.frame_subslice = &self.frame_subslice[leftover..];
        Err(ProtocolError::TrailingBytes(leftover))
    }

    /// Read an `[int]` from the front of the slice.
    pub fn read_int(&mut self) -> Result<i32, ProtocolError> {
        read_int(&mut self.frame_subslice)
    }

    /// Read a `[bytes]` value from the front of the slice.
    ///
    /// `Ok(None)` is a null value.
    pub fn read_cql_bytes(&mut self) -> Result<Option<FrameSlice<'frame>>, ProtocolError> {
        let value = read_bytes_opt(&mut self.frame_subslice)?;
        Ok(value.map(|frame_subslice| Self {
            frame_subslice,
            original_frame: self.original_frame,
        }))
    }
}
