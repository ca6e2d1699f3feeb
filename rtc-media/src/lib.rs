#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod audio_stream;
pub mod config;
pub mod dtmf;
pub mod event;
pub mod media_stream;
pub mod pending;
pub mod reorder;
pub mod text_stream;
pub mod track;
pub mod udp_channel;
pub mod video_stream;

pub use config::SessionConfig;
pub use event::{StreamEvent, StreamEventKind};
pub use media_stream::MediaStream;
pub use track::MediaStreamTrack;
