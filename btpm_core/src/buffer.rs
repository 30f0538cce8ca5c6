//! Response continuation buffer.
//!
//! When a server application hands the manager more response data than the
//! protocol engine accepts in one packet, the remainder is parked here and
//! drained one chunk per peer continuation request.

/// Buffered response data for one in-progress server operation.
#[derive(Debug)]
pub struct ResponseBuffer {
    data: Box<[u8]>,
    sent: usize,
    final_chunk: bool,
}

impl ResponseBuffer {
    /// Take ownership of the full response payload.
    ///
    /// `final_chunk` records whether this payload completes the operation or
    /// whether the application will supply more data later.
    pub fn new(data: Vec<u8>, final_chunk: bool) -> Self {
        Self {
            data: data.into_boxed_slice(),
            sent: 0,
            final_chunk,
        }
    }

    /// The bytes not yet accepted by the engine.
    pub fn pending(&self) -> &[u8] {
        &self.data[self.sent..]
    }

    /// Record that the engine accepted `consumed` more bytes.
    ///
    /// Saturates at the buffer length; an engine over-report never pushes the
    /// cursor past the end.
    pub fn advance(&mut self, consumed: usize) {
        self.sent = (self.sent + consumed).min(self.data.len());
    }

    /// True once every byte has been handed to the engine.
    pub fn is_drained(&self) -> bool {
        self.sent == self.data.len()
    }

    /// True if draining this buffer completes the operation.
    pub fn is_final(&self) -> bool {
        self.final_chunk
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn sent(&self) -> usize {
        self.sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_chunks() {
        let mut buf = ResponseBuffer::new(vec![0u8; 10], true);
        assert_eq!(buf.pending().len(), 10);
        buf.advance(4);
        assert_eq!(buf.pending().len(), 6);
        assert_eq!(buf.sent(), 4);
        assert!(!buf.is_drained());
        buf.advance(6);
        assert!(buf.is_drained());
        assert!(buf.pending().is_empty());
    }

    #[test]
    fn advance_saturates() {
        let mut buf = ResponseBuffer::new(vec![1, 2, 3], true);
        buf.advance(100);
        assert_eq!(buf.sent(), 3);
        assert!(buf.is_drained());
    }

    #[test]
    fn empty_final_buffer_is_drained_immediately() {
        let buf = ResponseBuffer::new(Vec::new(), true);
        assert!(buf.is_drained());
        assert!(buf.is_final());
        assert!(buf.is_empty());
    }

    #[test]
    fn non_final_flag_preserved() {
        let buf = ResponseBuffer::new(vec![9], false);
        assert!(!buf.is_final());
        assert_eq!(buf.len(), 1);
    }
}
