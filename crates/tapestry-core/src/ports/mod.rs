//! Ports - 抽象化レイヤー
//!
//! トラッキングモデルが外部に依存する箇所（時刻、進捗表示）を trait として
//! 切り出します。コア自体は I/O を行いません。

pub mod clock;
pub mod status_observer;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::status_observer::{ChannelObserver, NoopObserver, StatusEvent, StatusObserver};
