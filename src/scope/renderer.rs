use log::{debug, trace};
use crate::config::ActivityScale;
use crate::scope::buffer::{ChannelBuffer, FrameStore, ServerBuffer};
use crate::scope::surface::{PixelRect, Rgb, Surface2D};
use crate::types::{ActivityFrame, CHANNELS_PER_SERVER};
/// Stroke colour of the raw activity line, per channel.
pub const ACTIVITY_COLORS: [Rgb; CHANNELS_PER_SERVER] = [
    Rgb(0x88, 0x88, 0x00),
    Rgb(0x88, 0x00, 0x88),
    Rgb(0x00, 0x00, 0x00),
    Rgb(0x00, 0x88, 0x88),
];
pub const ACTIVITY_THRESHOLD_COLOR: Rgb = Rgb(0x88, 0xff, 0x88);
pub const TOO_MUCH_THRESHOLD_COLOR: Rgb = Rgb(0xff, 0x88, 0x88);
/// Per-channel RGB tint multiplied into frequency intensities.
pub const FREQUENCY_TINTS: [[f64; 3]; CHANNELS_PER_SERVER] = [
    [1.0, 15.0, 0.0],
    [15.0, 0.0, 1.0],
    [5.0, 1.0, 0.0],
    [0.0, 2.0, 15.0],
];
/// Time span covered by one frequency frame's strip.
pub const FREQUENCY_FRAME_SECONDS: f64 = 0.01;
/// Extra time redrawn left of the new slice, for late frames that sort earlier.
const SLACK_SECONDS: f64 = 0.01;
const ACTIVITY_EVICTION_MARGIN_PX: f64 = 2.0;
/// Pixel bounds of one sub-region of the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}
impl Region {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }
    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
    pub fn rect(&self) -> PixelRect {
        PixelRect::new(self.left, self.top, self.width(), self.height())
    }
}
/// How one region slides for a `start_time -> stop_time` advance, and the
/// coordinate mapping used to draw into it afterwards.
///
/// All x mappings are anchored on `stop_integer`, so `stop_time` lands exactly
/// on the right edge no matter how many incremental passes came before.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollStep {
    pub region: Region,
    pub window_seconds: f64,
    pub start_integer: i64,
    pub stop_integer: i64,
    pub new_width: i64,
    pub old_width: i64,
    pub extra: i64,
    pub clip_left: i32,
    pub full_redraw: bool,
}
impl ScrollStep {
    pub fn plan(
        region: Region,
        start_time: f64,
        stop_time: f64,
        window_seconds: f64,
        force_full: bool,
    ) -> Self {
        let scale = region.width() as f64 / window_seconds;
        let start_integer = (start_time * scale).round() as i64;
        let stop_integer = (stop_time * scale).round() as i64;
        let new_width = stop_integer - start_integer;
        let old_width = region.width() as i64 - new_width;
        let full_redraw = force_full || old_width < 0;
        let (extra, clip_left) = if full_redraw {
            (0, region.left)
        } else {
            let extra = (SLACK_SECONDS * scale).ceil() as i64;
            // never reach into the neighbouring region
            let clip_left = (region.left as i64 + old_width - extra).max(region.left as i64);
            (extra, clip_left as i32)
        };
        Self {
            region,
            window_seconds,
            start_integer,
            stop_integer,
            new_width,
            old_width,
            extra,
            clip_left,
            full_redraw,
        }
    }
    /// Pixels per time unit.
    pub fn scale(&self) -> f64 {
        self.region.width() as f64 / self.window_seconds
    }
    pub fn clip_rect(&self) -> PixelRect {
        PixelRect::new(
            self.clip_left,
            self.region.top,
            self.region.right - self.clip_left,
            self.region.height(),
        )
    }
    fn global_x(&self, time: f64) -> f64 {
        time * self.scale()
    }
    /// Continuous x position, for line plots.
    pub fn x_fractional(&self, time: f64) -> f64 {
        self.region.right as f64 + (self.global_x(time) - self.stop_integer as f64)
    }
    /// Whole-pixel x position, for cell plots.
    pub fn x_integer(&self, time: f64) -> i64 {
        self.region.right as i64 + (self.global_x(time).round() as i64 - self.stop_integer)
    }
    pub fn y_fractional(&self, fraction: f64) -> f64 {
        self.region.top as f64 + fraction * self.region.height() as f64
    }
    pub fn y_integer(&self, fraction: f64) -> i64 {
        self.y_fractional(fraction).round() as i64
    }
}
/// Shifts the still-valid part of the region left by `new_width` pixels,
/// or wipes the region when everything has to be redrawn.
pub fn slide<S: Surface2D>(surface: &mut S, step: &ScrollStep) {
    let region = step.region.rect();
    if step.full_redraw {
        surface.clear(region);
        return;
    }
    let kept = PixelRect::new(
        region.x + step.new_width as i32,
        region.y,
        step.old_width as i32,
        region.height,
    );
    let block = surface.read_pixels(kept);
    surface.clear(region);
    if let Some(block) = block {
        surface.write_pixels(&block, region.x, region.y);
    }
}
/// Colour of one frequency cell; intensities are clamped to [0, 1].
pub fn cell_color(intensity: f64, tint: [f64; 3]) -> Rgb {
    let scaled = 255.0 * intensity.clamp(0.0, 1.0);
    let component = |k: f64| (scaled * k).floor().clamp(0.0, 255.0) as u8;
    Rgb(component(tint[0]), component(tint[1]), component(tint[2]))
}
/// Horizontal split of the surface: four columns per known server.
#[derive(Clone, Copy, Debug)]
struct Layout {
    width: u32,
    height: u32,
    server_count: usize,
}
impl Layout {
    fn column_x(&self, server_index: usize, column: f64) -> i32 {
        let columns = (CHANNELS_PER_SERVER * self.server_count) as f64;
        let global = column + (server_index * CHANNELS_PER_SERVER) as f64;
        (global * self.width as f64 / columns).round() as i32
    }
    fn split_y(&self) -> i32 {
        (self.height / 2) as i32
    }
}
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PaintSummary {
    pub servers_painted: usize,
    pub cleared: bool,
}
impl PaintSummary {
    /// Whether the surface content changed during the pass.
    pub fn is_dirty(&self) -> bool {
        self.cleared || self.servers_painted > 0
    }
}
/// Incrementally repaints the surface from a [`FrameStore`], one pass per tick.
pub struct ScrollRenderer {
    window_seconds: f64,
    activity_scale: ActivityScale,
    laid_out_servers: usize,
    seen_generation: u64,
    /// Band count each channel's frequency half was last laid out with.
    painted_sections: Vec<[usize; CHANNELS_PER_SERVER]>,
}
impl ScrollRenderer {
    pub fn new(window_seconds: f64, activity_scale: ActivityScale) -> Self {
        Self {
            window_seconds,
            activity_scale,
            laid_out_servers: 0,
            seen_generation: 0,
            painted_sections: Vec::new(),
        }
    }
    pub fn paint<S: Surface2D>(&mut self, store: &mut FrameStore, surface: &mut S) -> PaintSummary {
        let (width, height) = surface.size();
        let layout = Layout {
            width,
            height,
            server_count: store.len(),
        };
        let mut summary = PaintSummary::default();
        // a reset or a new server column invalidates every shifted pixel
        let full_redraw =
            store.generation() != self.seen_generation || store.len() != self.laid_out_servers;
        if full_redraw {
            debug!(
                "full redraw: {} -> {} servers, generation {} -> {}",
                self.laid_out_servers,
                store.len(),
                self.seen_generation,
                store.generation()
            );
            surface.clear(PixelRect::new(0, 0, width as i32, height as i32));
            self.laid_out_servers = store.len();
            self.seen_generation = store.generation();
            summary.cleared = true;
        }
        self.painted_sections
            .resize(store.len(), [0; CHANNELS_PER_SERVER]);
        for (server_index, server) in store.servers_mut().enumerate() {
            if !full_redraw && !server.needs_paint() {
                continue;
            }
            self.paint_server(surface, &layout, server_index, server, full_redraw);
            server.mark_drawn();
            summary.servers_painted += 1;
        }
        trace!("paint pass: {summary:?}");
        summary
    }
    fn paint_server<S: Surface2D>(
        &mut self,
        surface: &mut S,
        layout: &Layout,
        server_index: usize,
        server: &mut ServerBuffer,
        force_full: bool,
    ) {
        let start = server.latest_drawn_frame_time();
        let stop = server.latest_received_frame_time();
        let split = layout.split_y();
        for channel_index in 0..CHANNELS_PER_SERVER {
            let column = channel_index as f64;
            let region = Region {
                left: layout.column_x(server_index, column),
                top: 0,
                right: layout.column_x(server_index, column + 1.0),
                bottom: split,
            };
            let channel = server.channel_mut(channel_index);
            let step = ScrollStep::plan(region, start, stop, self.window_seconds, force_full);
            self.paint_activity(surface, &step, channel, ACTIVITY_COLORS[channel_index]);
            let sections = channel.section_count();
            let painted = &mut self.painted_sections[server_index][channel_index];
            // band geometry changed: the shifted block no longer lines up
            let relaid = *painted != sections;
            if relaid && !force_full {
                debug!(
                    "server {server_index} channel {channel_index}: {} -> {sections} bands",
                    *painted
                );
                surface.clear(
                    Region {
                        left: region.left,
                        top: split,
                        right: region.right,
                        bottom: layout.height as i32,
                    }
                    .rect(),
                );
            }
            *painted = sections;
            let force_bands = force_full || relaid;
            let steps: Vec<ScrollStep> = (0..sections)
                .map(|section| {
                    let band = Region {
                        left: layout
                            .column_x(server_index, column + section as f64 / sections as f64),
                        top: split,
                        right: layout.column_x(
                            server_index,
                            column + (section + 1) as f64 / sections as f64,
                        ),
                        bottom: layout.height as i32,
                    };
                    ScrollStep::plan(band, start, stop, self.window_seconds, force_bands)
                })
                .collect();
            for step in &steps {
                slide(surface, step);
            }
            // the frequency sequence is shared by every band of the channel
            let cut = steps
                .iter()
                .map(|step| channel.frequency_cut(|t| step.x_integer(t) <= step.clip_left as i64))
                .min()
                .unwrap_or(0);
            channel.evict_frequencies(cut);
            let tint = FREQUENCY_TINTS[channel_index];
            for (section, step) in steps.iter().enumerate() {
                surface.with_clip(step.clip_rect(), |s| {
                    s.clear(step.clip_rect());
                    draw_frequency_band(s, step, channel, section, tint)
                });
            }
        }
    }
    fn paint_activity<S: Surface2D>(
        &self,
        surface: &mut S,
        step: &ScrollStep,
        channel: &mut ChannelBuffer,
        color: Rgb,
    ) {
        slide(surface, step);
        let threshold = step.clip_left as f64 - ACTIVITY_EVICTION_MARGIN_PX;
        let cut = channel.activity_cut(|t| step.x_fractional(t) < threshold);
        channel.evict_activity(cut);
        let lines: [(Rgb, fn(&ActivityFrame) -> f64); 3] = [
            (color, |f| f.value),
            (ACTIVITY_THRESHOLD_COLOR, |f| f.activity_threshold),
            (TOO_MUCH_THRESHOLD_COLOR, |f| f.too_much_threshold),
        ];
        surface.with_clip(step.clip_rect(), |s| {
            // the slack strip still holds antialiased edges; redraw it from the buffer
            s.clear(step.clip_rect());
            for (line_color, pick) in lines {
                let points: Vec<(f32, f32)> = channel
                    .activity()
                    .iter()
                    .map(|frame| {
                        let x = step.x_fractional(frame.time);
                        let y = step.y_fractional(self.activity_scale.apply(pick(frame)));
                        (x as f32, y as f32)
                    })
                    .collect();
                s.stroke_polyline(&points, line_color);
            }
        });
    }
}
fn draw_frequency_band<S: Surface2D>(
    surface: &mut S,
    step: &ScrollStep,
    channel: &ChannelBuffer,
    section: usize,
    tint: [f64; 3],
) {
    for frame in channel.frequencies() {
        let Some(bins) = frame.values.get(section) else {
            continue;
        };
        let right = step.x_integer(frame.time);
        if right <= step.clip_left as i64 {
            continue;
        }
        let left = step.x_integer(frame.time - FREQUENCY_FRAME_SECONDS);
        let count = bins.len() as f64;
        for (bin, &intensity) in bins.iter().enumerate() {
            let top = step.y_integer(bin as f64 / count);
            let bottom = step.y_integer((bin + 1) as f64 / count);
            let cell = PixelRect::new(
                left as i32,
                top as i32,
                (right - left) as i32,
                (bottom - top) as i32,
            );
            surface.fill_rect(cell, cell_color(intensity, tint));
        }
    }
}
