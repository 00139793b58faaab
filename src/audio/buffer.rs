//! Accumulates raw PCM bytes and releases them in fixed-duration slices

/// Recognizer sample rate
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// 16-bit linear PCM
pub const BYTES_PER_SAMPLE: usize = 2;

/// Chunk length in milliseconds sent to the recognizer
pub const CHUNK_MILLIS: usize = 100;

/// Bytes in one chunk at `sample_rate`
pub fn chunk_threshold(sample_rate: u32) -> usize {
    sample_rate as usize * BYTES_PER_SAMPLE * CHUNK_MILLIS / 1000
}

/// Buffer releasing audio once more than one chunk has accumulated
#[derive(Debug)]
pub struct AudioChunkBuffer {
    data: Vec<u8>,
    threshold: usize,
}

impl AudioChunkBuffer {
    pub fn new(sample_rate: u32) -> Self {
        let threshold = chunk_threshold(sample_rate);
        Self {
            data: Vec::with_capacity(threshold * 2),
            threshold,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Append samples. Returns everything accumulated so far, as one unit,
    /// once the length exceeds the threshold.
    pub fn append(&mut self, samples: &[u8]) -> Option<Vec<u8>> {
        self.data.extend_from_slice(samples);
        if self.data.len() > self.threshold {
            let chunk = std::mem::replace(&mut self.data, Vec::with_capacity(self.threshold * 2));
            Some(chunk)
        } else {
            None
        }
    }

    /// Drop any partially accumulated audio
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_100ms() {
        assert_eq!(chunk_threshold(16_000), 3_200);
        assert_eq!(chunk_threshold(8_000), 1_600);
        assert_eq!(chunk_threshold(44_100), 8_820);
    }

    #[test]
    fn test_flushes_only_after_exceeding() {
        let mut buffer = AudioChunkBuffer::new(16_000);
        assert!(buffer.append(&[0u8; 3_000]).is_none());
        // Exactly at the threshold is not enough
        assert!(buffer.append(&[0u8; 200]).is_none());
        assert_eq!(buffer.data.len(), 3_200);

        let chunk = buffer.append(&[1u8; 10]).unwrap();
        assert_eq!(chunk.len(), 3_210);
        assert_eq!(&chunk[3_200..], &[1u8; 10]);
        assert!(buffer.data.is_empty());
    }

    #[test]
    fn test_large_append_flushes_whole() {
        let mut buffer = AudioChunkBuffer::new(16_000);
        let chunk = buffer.append(&vec![0u8; 10_000]).unwrap();
        assert_eq!(chunk.len(), 10_000);
        assert!(buffer.data.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut buffer = AudioChunkBuffer::new(16_000);
        buffer.append(&[0u8; 100]);
        buffer.clear();
        assert!(buffer.data.is_empty());
    }
}
