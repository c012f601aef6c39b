use std::collections::VecDeque;
use log::{debug, trace};
use crate::types::{ActivityFrame, FrameBatch, FrequencyFrame, CHANNELS_PER_SERVER};
/// Time-ordered activity and frequency frames of one signal channel.
/// The two sequences advance independently of each other.
#[derive(Clone, Debug, Default)]
pub struct ChannelBuffer {
    activity: VecDeque<ActivityFrame>,
    frequencies: VecDeque<FrequencyFrame>,
}
impl ChannelBuffer {
    pub fn activity(&self) -> &VecDeque<ActivityFrame> {
        &self.activity
    }
    pub fn frequencies(&self) -> &VecDeque<FrequencyFrame> {
        &self.frequencies
    }
    /// Number of frequency sections in the newest frequency frame, 0 if none arrived yet.
    pub fn section_count(&self) -> usize {
        self.frequencies.back().map(|f| f.values.len()).unwrap_or(0)
    }
    pub fn is_empty(&self) -> bool {
        self.activity.is_empty() && self.frequencies.is_empty()
    }
    /// Index of the newest activity frame for which `offscreen` holds; everything
    /// before it can be dropped while that frame stays as the polyline anchor.
    pub fn activity_cut(&self, offscreen: impl Fn(f64) -> bool) -> usize {
        eviction_cut(self.activity.iter().map(|f| f.time), offscreen)
    }
    pub fn frequency_cut(&self, offscreen: impl Fn(f64) -> bool) -> usize {
        eviction_cut(self.frequencies.iter().map(|f| f.time), offscreen)
    }
    pub(crate) fn evict_activity(&mut self, count: usize) {
        let count = count.min(self.activity.len());
        self.activity.drain(..count);
    }
    pub(crate) fn evict_frequencies(&mut self, count: usize) {
        let count = count.min(self.frequencies.len());
        self.frequencies.drain(..count);
    }
}
fn eviction_cut(
    times: impl DoubleEndedIterator<Item = f64> + ExactSizeIterator,
    offscreen: impl Fn(f64) -> bool,
) -> usize {
    let len = times.len();
    times
        .rev()
        .position(offscreen)
        .map(|from_back| len - 1 - from_back)
        .unwrap_or(0)
}
/// Frames of one server plus its received/drawn watermarks.
#[derive(Clone, Debug, Default)]
pub struct ServerBuffer {
    channels: [ChannelBuffer; CHANNELS_PER_SERVER],
    latest_received_frame_time: f64,
    latest_drawn_frame_time: f64,
}
impl ServerBuffer {
    pub fn channels(&self) -> &[ChannelBuffer; CHANNELS_PER_SERVER] {
        &self.channels
    }
    pub fn channel_mut(&mut self, index: usize) -> &mut ChannelBuffer {
        &mut self.channels[index]
    }
    pub fn latest_received_frame_time(&self) -> f64 {
        self.latest_received_frame_time
    }
    pub fn latest_drawn_frame_time(&self) -> f64 {
        self.latest_drawn_frame_time
    }
    /// True while frames arrived that the renderer has not caught up with.
    pub fn needs_paint(&self) -> bool {
        self.latest_drawn_frame_time != self.latest_received_frame_time
    }
    pub(crate) fn mark_drawn(&mut self) {
        self.latest_drawn_frame_time = self.latest_received_frame_time;
    }
    fn append(&mut self, batch: FrameBatch) {
        if let Some(max_time) = batch.max_time() {
            self.latest_received_frame_time = self.latest_received_frame_time.max(max_time);
        }
        match batch {
            FrameBatch::Activity(per_channel) => {
                for (channel, frames) in self.channels.iter_mut().zip(per_channel) {
                    channel.activity.extend(frames);
                }
            }
            FrameBatch::Frequency(per_channel) => {
                for (channel, frames) in self.channels.iter_mut().zip(per_channel) {
                    channel.frequencies.extend(frames);
                }
            }
        }
    }
}
/// Sparse, on-demand growing list of server buffers indexed by server index.
#[derive(Debug, Default)]
pub struct FrameStore {
    servers: Vec<ServerBuffer>,
    generation: u64,
}
impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn append(&mut self, server_index: usize, batch: FrameBatch) {
        trace!("server {server_index}: appending {:?} batch", batch.kind());
        self.get(server_index).append(batch);
    }
    /// Empties every known server; indices stay allocated.
    pub fn reset(&mut self) {
        for server in &mut self.servers {
            *server = ServerBuffer::default();
        }
        self.generation += 1;
        debug!(
            "frame store reset (generation {}, {} servers kept)",
            self.generation,
            self.servers.len()
        );
    }
    pub fn get(&mut self, server_index: usize) -> &mut ServerBuffer {
        if self.servers.len() <= server_index {
            self.servers
                .resize_with(server_index + 1, ServerBuffer::default);
        }
        &mut self.servers[server_index]
    }
    pub fn server(&self, server_index: usize) -> Option<&ServerBuffer> {
        self.servers.get(server_index)
    }
    pub fn servers_mut(&mut self) -> impl Iterator<Item = &mut ServerBuffer> {
        self.servers.iter_mut()
    }
    pub fn len(&self) -> usize {
        self.servers.len()
    }
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
    /// Bumped by every [`FrameStore::reset`].
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    fn activity(time: f64) -> ActivityFrame {
        ActivityFrame {
            time,
            value: 0.5,
            activity_threshold: 0.3,
            too_much_threshold: 0.8,
        }
    }
    fn frequency(time: f64) -> FrequencyFrame {
        FrequencyFrame {
            time,
            values: vec![vec![0.1, 0.2], vec![0.3, 0.4]],
        }
    }
    fn activity_batch(times: &[f64]) -> FrameBatch {
        let frames: Vec<ActivityFrame> = times.iter().copied().map(activity).collect();
        FrameBatch::Activity([frames.clone(), frames.clone(), frames.clone(), frames])
    }
    fn frequency_batch(times: &[f64]) -> FrameBatch {
        let frames: Vec<FrequencyFrame> = times.iter().copied().map(frequency).collect();
        FrameBatch::Frequency([frames.clone(), frames.clone(), frames.clone(), frames])
    }
    #[test]
    fn get_grows_lazily_without_touching_lower_indices() {
        let mut store = FrameStore::new();
        assert!(store.is_empty());
        store.get(3);
        assert_eq!(store.len(), 4);
        let server = store.server(1).unwrap();
        assert_eq!(server.latest_received_frame_time(), 0.0);
        assert!(server.channels().iter().all(ChannelBuffer::is_empty));
    }
    #[test]
    fn received_watermark_is_a_running_maximum() {
        let mut store = FrameStore::new();
        store.append(0, activity_batch(&[0.1, 0.2, 0.3]));
        assert_eq!(store.server(0).unwrap().latest_received_frame_time(), 0.3);
        // an older batch of the other kind must not move the watermark back
        store.append(0, frequency_batch(&[0.05, 0.1]));
        assert_eq!(store.server(0).unwrap().latest_received_frame_time(), 0.3);
        store.append(0, frequency_batch(&[0.2, 0.45]));
        assert_eq!(store.server(0).unwrap().latest_received_frame_time(), 0.45);
        store.append(0, activity_batch(&[]));
        assert_eq!(store.server(0).unwrap().latest_received_frame_time(), 0.45);
    }
    #[test]
    fn kinds_advance_independently() {
        let mut store = FrameStore::new();
        store.append(2, frequency_batch(&[1.0, 1.01, 1.02]));
        store.append(2, activity_batch(&[0.1]));
        let channel = &store.server(2).unwrap().channels()[1];
        assert_eq!(channel.frequencies().len(), 3);
        assert_eq!(channel.activity().len(), 1);
        assert_eq!(channel.activity()[0].time, 0.1);
        assert_eq!(channel.section_count(), 2);
    }
    #[test]
    fn reset_empties_every_known_server() {
        let mut store = FrameStore::new();
        store.append(0, activity_batch(&[0.1]));
        store.append(4, frequency_batch(&[0.2]));
        store.get(4).mark_drawn();
        let generation = store.generation();
        store.reset();
        assert_eq!(store.len(), 5);
        assert_eq!(store.generation(), generation + 1);
        for index in 0..store.len() {
            let server = store.server(index).unwrap();
            assert_eq!(server.latest_received_frame_time(), 0.0);
            assert_eq!(server.latest_drawn_frame_time(), 0.0);
            assert!(server.channels().iter().all(ChannelBuffer::is_empty));
        }
    }
    #[test]
    fn drawn_watermark_never_passes_received() {
        let mut store = FrameStore::new();
        store.append(0, activity_batch(&[0.2]));
        let server = store.get(0);
        assert!(server.needs_paint());
        server.mark_drawn();
        assert!(!server.needs_paint());
        assert_eq!(server.latest_drawn_frame_time(), 0.2);
        store.append(0, activity_batch(&[0.1]));
        let server = store.server(0).unwrap();
        assert!(server.latest_drawn_frame_time() <= server.latest_received_frame_time());
        assert!(!server.needs_paint());
    }
    #[test]
    fn eviction_cut_keeps_newest_offscreen_frame_as_anchor() {
        let mut store = FrameStore::new();
        store.append(0, activity_batch(&[0.1, 0.2, 0.3, 0.4]));
        let channel = store.get(0).channel_mut(0);
        assert_eq!(channel.activity_cut(|t| t < 0.25), 1);
        assert_eq!(channel.activity_cut(|t| t < 0.05), 0);
        channel.evict_activity(channel.activity_cut(|t| t < 0.35));
        let times: Vec<f64> = channel.activity().iter().map(|f| f.time).collect();
        assert_eq!(times, vec![0.3, 0.4]);
        // the last frame itself may be the anchor
        assert_eq!(channel.activity_cut(|_| true), 1);
        assert_eq!(channel.frequency_cut(|_| true), 0);
    }
}
