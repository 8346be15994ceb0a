//! Frame ring between the hardware callback and the processing thread.
//!
//! One writer, one reader, one lock. A full ring never rejects or blocks the
//! writer: the oldest unread frames are dropped to make room. Readers can wait
//! for data with an optional deadline and get back whatever has arrived.

use crate::block::FrameBlock;
use crate::{Error, Result};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct RingState {
    buf: Box<[f32]>,
    // Positions and size are in frames.
    write_pos: usize,
    read_pos: usize,
    size: usize,
}

#[derive(Debug)]
pub struct RingBuffer {
    state: Mutex<RingState>,
    data_available: Condvar,
    room_available: Condvar,
    capacity: usize,
    channels: u16,
}

impl RingBuffer {
    pub fn new(capacity_frames: usize, channels: u16) -> Result<Self> {
        if capacity_frames == 0 {
            return Err(Error::config("ring buffer", "capacity_frames", "must be > 0"));
        }
        if channels == 0 {
            return Err(Error::config("ring buffer", "channels", "must be > 0"));
        }
        Ok(Self {
            state: Mutex::new(RingState {
                buf: vec![0.0f32; capacity_frames * channels as usize].into_boxed_slice(),
                write_pos: 0,
                read_pos: 0,
                size: 0,
            }),
            data_available: Condvar::new(),
            room_available: Condvar::new(),
            capacity: capacity_frames,
            channels,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Unread frames.
    pub fn available(&self) -> usize {
        self.state.lock().size
    }

    /// Drop all unread frames.
    pub fn clear(&self) {
        let mut st = self.state.lock();
        st.read_pos = st.write_pos;
        st.size = 0;
        self.room_available.notify_all();
    }

    /// Append a block. See [`RingBuffer::write_interleaved`].
    pub fn write(&self, block: &FrameBlock) -> Result<()> {
        if block.channels() != self.channels {
            return Err(Error::ChannelMismatch {
                expected: self.channels,
                actual: block.channels(),
            });
        }
        self.write_interleaved(block.samples())
    }

    /// Append interleaved frames without allocating.
    ///
    /// Never blocks. When the data would not fit, the oldest unread frames are
    /// discarded; a write of `capacity` frames or more keeps only its own
    /// newest `capacity` frames.
    pub fn write_interleaved(&self, data: &[f32]) -> Result<()> {
        let ch = self.channels as usize;
        if data.len() % ch != 0 {
            return Err(Error::PartialFrame { len: data.len(), channels: self.channels });
        }
        let frames = data.len() / ch;
        if frames == 0 {
            return Ok(());
        }

        let mut st = self.state.lock();
        if frames >= self.capacity {
            let tail = &data[(frames - self.capacity) * ch..];
            self.copy_in(&mut st, tail);
            st.read_pos = st.write_pos;
            st.size = self.capacity;
            tracing::trace!(dropped = frames - self.capacity, "ring write exceeds capacity");
        } else {
            let overflow = (st.size + frames).saturating_sub(self.capacity);
            if overflow > 0 {
                st.read_pos = (st.read_pos + overflow) % self.capacity;
                st.size -= overflow;
                tracing::trace!(dropped = overflow, "ring overflow");
            }
            self.copy_in(&mut st, data);
            st.size += frames;
        }
        self.data_available.notify_all();
        Ok(())
    }

    /// Take up to `frames` frames.
    ///
    /// With `block == false` this returns at once with whatever is there. With
    /// `block == true` it waits for `frames` frames (capped at capacity), for
    /// at most `timeout` if one is given, then returns what is available; the
    /// result may be short or empty.
    pub fn read(&self, frames: usize, block: bool, timeout: Option<Duration>) -> FrameBlock {
        if frames == 0 {
            return FrameBlock::empty(self.channels);
        }
        let wanted = frames.min(self.capacity);

        let mut st = self.state.lock();
        if block {
            match timeout.and_then(|t| Instant::now().checked_add(t)) {
                Some(deadline) => {
                    while st.size < wanted {
                        if self.data_available.wait_until(&mut st, deadline).timed_out() {
                            break;
                        }
                    }
                }
                None => {
                    while st.size < wanted {
                        self.data_available.wait(&mut st);
                    }
                }
            }
        }

        let n = frames.min(st.size);
        if n == 0 {
            return FrameBlock::empty(self.channels);
        }
        let mut out = vec![0.0f32; n * self.channels as usize];
        self.copy_out(&mut st, &mut out);
        drop(st);
        FrameBlock::from_interleaved(out, self.channels)
    }

    /// Non-blocking read into `out`, for the playback callback.
    ///
    /// Copies up to `out.len() / channels` frames and returns how many.
    pub fn read_into(&self, out: &mut [f32]) -> usize {
        let ch = self.channels as usize;
        let mut st = self.state.lock();
        let n = (out.len() / ch).min(st.size);
        if n > 0 {
            self.copy_out(&mut st, &mut out[..n * ch]);
        }
        n
    }

    /// Wait until `frames` frames (capped at capacity) could be written
    /// without overwriting unread data. Returns false on timeout.
    pub fn wait_for_room(&self, frames: usize, timeout: Duration) -> bool {
        let wanted = frames.min(self.capacity);
        let mut st = self.state.lock();
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            while self.capacity - st.size < wanted {
                self.room_available.wait(&mut st);
            }
            return true;
        };
        while self.capacity - st.size < wanted {
            if self.room_available.wait_until(&mut st, deadline).timed_out() {
                return self.capacity - st.size >= wanted;
            }
        }
        true
    }

    fn copy_in(&self, st: &mut MutexGuard<'_, RingState>, data: &[f32]) {
        let ch = self.channels as usize;
        let start = st.write_pos * ch;
        let first = (st.buf.len() - start).min(data.len());
        st.buf[start..start + first].copy_from_slice(&data[..first]);
        let rest = data.len() - first;
        st.buf[..rest].copy_from_slice(&data[first..]);
        st.write_pos = (st.write_pos + data.len() / ch) % self.capacity;
    }

    // Consumes `out.len() / channels` frames; caller checked they exist.
    fn copy_out(&self, st: &mut MutexGuard<'_, RingState>, out: &mut [f32]) {
        let ch = self.channels as usize;
        let frames = out.len() / ch;
        let start = st.read_pos * ch;
        let first = (st.buf.len() - start).min(out.len());
        out[..first].copy_from_slice(&st.buf[start..start + first]);
        let rest = out.len() - first;
        out[first..].copy_from_slice(&st.buf[..rest]);
        st.read_pos = (st.read_pos + frames) % self.capacity;
        st.size -= frames;
        self.room_available.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn ramp(from: usize, to: usize) -> Vec<f32> {
        (from..to).map(|i| i as f32).collect()
    }

    #[test]
    fn rejects_bad_shape() {
        assert!(RingBuffer::new(0, 1).unwrap_err().is_config());
        assert!(RingBuffer::new(8, 0).unwrap_err().is_config());
    }

    #[test]
    fn write_then_read_in_order() {
        let ring = RingBuffer::new(8, 1).unwrap();
        ring.write_interleaved(&ramp(0, 5)).unwrap();
        assert_eq!(ring.available(), 5);
        let out = ring.read(3, false, None);
        assert_eq!(out.samples(), &[0.0, 1.0, 2.0]);
        let out = ring.read(10, false, None);
        assert_eq!(out.samples(), &[3.0, 4.0]);
        assert_eq!(ring.available(), 0);
    }

    #[test]
    fn wraps_around_the_end() {
        let ring = RingBuffer::new(4, 1).unwrap();
        ring.write_interleaved(&ramp(0, 3)).unwrap();
        ring.read(2, false, None);
        ring.write_interleaved(&ramp(3, 6)).unwrap();
        assert_eq!(ring.read(4, false, None).samples(), &[2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn overflow_drops_oldest() {
        let ring = RingBuffer::new(4, 1).unwrap();
        ring.write_interleaved(&ramp(0, 3)).unwrap();
        ring.write_interleaved(&ramp(3, 6)).unwrap();
        assert_eq!(ring.available(), 4);
        assert_eq!(ring.read(4, false, None).samples(), &[2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn oversized_write_keeps_newest_capacity() {
        let ring = RingBuffer::new(4, 2).unwrap();
        ring.write_interleaved(&[9.0, 9.0]).unwrap();
        let data: Vec<f32> = ramp(0, 12);
        ring.write_interleaved(&data).unwrap();
        assert_eq!(ring.available(), 4);
        assert_eq!(ring.read(4, false, None).samples(), &data[4..]);
    }

    #[test]
    fn channel_mismatch_is_error() {
        let ring = RingBuffer::new(4, 2).unwrap();
        let mono = FrameBlock::from_mono(vec![0.0; 3]);
        assert!(matches!(
            ring.write(&mono),
            Err(Error::ChannelMismatch { expected: 2, actual: 1 })
        ));
        assert!(matches!(ring.write_interleaved(&[0.0; 3]), Err(Error::PartialFrame { .. })));
        assert_eq!(ring.available(), 0);
    }

    #[test]
    fn non_blocking_read_of_empty_returns_now() {
        let ring = RingBuffer::new(16, 1).unwrap();
        let t0 = Instant::now();
        let out = ring.read(8, false, None);
        assert!(out.is_empty());
        assert!(t0.elapsed() < Duration::from_millis(20));
    }

    #[test]
    fn blocking_read_times_out_empty() {
        let ring = RingBuffer::new(16, 1).unwrap();
        let t0 = Instant::now();
        let out = ring.read(8, true, Some(Duration::from_millis(50)));
        let waited = t0.elapsed();
        assert!(out.is_empty());
        assert!(waited >= Duration::from_millis(45), "returned after {waited:?}");
        assert!(waited < Duration::from_millis(150), "returned after {waited:?}");
    }

    #[test]
    fn blocking_read_returns_short_on_timeout() {
        let ring = RingBuffer::new(16, 1).unwrap();
        ring.write_interleaved(&ramp(0, 3)).unwrap();
        let out = ring.read(8, true, Some(Duration::from_millis(20)));
        assert_eq!(out.frames(), 3);
    }

    #[test]
    fn blocking_read_wakes_on_write() {
        let ring = Arc::new(RingBuffer::new(64, 1).unwrap());
        let writer = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                for chunk in 0..4 {
                    thread::sleep(Duration::from_millis(5));
                    ring.write_interleaved(&ramp(chunk * 4, chunk * 4 + 4)).unwrap();
                }
            })
        };
        let out = ring.read(16, true, None);
        writer.join().unwrap();
        assert_eq!(out.samples(), ramp(0, 16).as_slice());
    }

    #[test]
    fn read_into_is_partial_and_ordered() {
        let ring = RingBuffer::new(8, 2).unwrap();
        ring.write_interleaved(&ramp(0, 4)).unwrap();
        let mut out = [0.0f32; 6];
        assert_eq!(ring.read_into(&mut out), 2);
        assert_eq!(&out[..4], &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(ring.read_into(&mut out), 0);
    }

    #[test]
    fn wait_for_room_unblocks_after_read() {
        let ring = Arc::new(RingBuffer::new(4, 1).unwrap());
        ring.write_interleaved(&ramp(0, 4)).unwrap();
        assert!(!ring.wait_for_room(2, Duration::from_millis(10)));

        let reader = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                ring.read(2, false, None)
            })
        };
        assert!(ring.wait_for_room(2, Duration::from_secs(2)));
        assert_eq!(reader.join().unwrap().frames(), 2);
    }

    #[test]
    fn clear_discards_unread() {
        let ring = RingBuffer::new(4, 1).unwrap();
        ring.write_interleaved(&ramp(0, 3)).unwrap();
        ring.clear();
        assert_eq!(ring.available(), 0);
        ring.write_interleaved(&[7.0]).unwrap();
        assert_eq!(ring.read(4, false, None).samples(), &[7.0]);
    }
}
