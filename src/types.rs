// src/types.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every server streams exactly this many signal channels.
pub const CHANNELS_PER_SERVER: usize = 4;

/// One activity sample for a single channel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityFrame {
    pub time: f64,
    pub value: f64,
    pub activity_threshold: f64,
    pub too_much_threshold: f64,
}

/// Per-band intensity vectors for a single channel at one instant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrequencyFrame {
    pub time: f64,
    /// section -> bin -> intensity in [0, 1]
    pub values: Vec<Vec<f64>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Activity,
    Frequency,
}

/// A batch of frames for every channel of one server, already time-ordered per channel.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameBatch {
    Activity([Vec<ActivityFrame>; CHANNELS_PER_SERVER]),
    Frequency([Vec<FrequencyFrame>; CHANNELS_PER_SERVER]),
}

impl FrameBatch {
    pub fn kind(&self) -> FrameKind {
        match self {
            FrameBatch::Activity(_) => FrameKind::Activity,
            FrameBatch::Frequency(_) => FrameKind::Frequency,
        }
    }

    /// Latest timestamp across every channel of the batch.
    pub fn max_time(&self) -> Option<f64> {
        let times: Vec<f64> = match self {
            FrameBatch::Activity(channels) => {
                channels.iter().flatten().map(|f| f.time).collect()
            }
            FrameBatch::Frequency(channels) => {
                channels.iter().flatten().map(|f| f.time).collect()
            }
        };
        times.into_iter().reduce(f64::max)
    }
}

// 服务端发给前端的消息 (single-key tagged records on the wire)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MessageToFrontend {
    Initialize {
        enabled: bool,
        variables: BTreeMap<String, f64>,
    },
    NewHistoryFrames {
        server_index: usize,
        frames: [Vec<ActivityFrame>; CHANNELS_PER_SERVER],
    },
    NewFrequenciesFrames {
        server_index: usize,
        frames: [Vec<FrequencyFrame>; CHANNELS_PER_SERVER],
    },
    UpdateFollower {
        name: String,
        latest_move_time: f64,
    },
}

// 前端发给服务端的命令
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MessageFromFrontend {
    SetEnabled(bool),
    SetVariable(String, f64),
}

impl MessageFromFrontend {
    pub fn tag(&self) -> &'static str {
        match self {
            MessageFromFrontend::SetEnabled(_) => "SetEnabled",
            MessageFromFrontend::SetVariable(..) => "SetVariable",
        }
    }
}
