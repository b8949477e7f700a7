mod ring;

pub use ring::RingLog;
