// src/scope/mod.rs
// 帧缓冲、绘图表面和滚动渲染器
pub mod buffer;
pub mod error;
pub mod renderer;
pub mod surface;
// 公开导出，方便外部调用
pub use buffer::{ChannelBuffer, FrameStore, ServerBuffer};
pub use error::ScopeError;
pub use renderer::{PaintSummary, ScrollRenderer};
pub use surface::{PixelRect, PixmapSurface, Rgb, Surface2D};
