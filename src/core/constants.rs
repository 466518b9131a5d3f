/// The minimum bitrate for the congestion controller.
pub const MIN_BITRATE: u32 = 500_000;
/// The maximum bitrate for the congestion controller.
pub const MAX_BITRATE: u32 = 1_500_000;
