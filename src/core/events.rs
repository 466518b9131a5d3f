/// Events the engine pushes to the host application over an `mpsc::Sender`.
/// Kept deliberately small: membership and link-quality notifications plus
/// lifecycle/diagnostic events, matching the callback surface the host
/// registers (`on_user_join`, `on_user_leave`, `on_upload_bandwidth`,
/// `on_download_bandwidth`, `on_local_network`).
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Human-readable status line, for host-side logging/UI.
    Status(String),
    /// A log line forwarded from a `LogSink` that also feeds the host.
    Log(String),
    /// A room join completed and the RTP session is sending/receiving.
    Established,
    /// A peer's first SSRC was bound to `name`.
    UserJoin { name: String },
    /// A peer's last SSRC was cleared; `reason` comes from the BYE packet
    /// when present.
    UserLeave { name: String, reason: Option<String> },
    /// Local outbound bitrate sample, bytes/sec instantaneous and total.
    UploadBandwidth { bytes_per_sec: f64, total_bytes: u64 },
    /// Local inbound bitrate sample, bytes/sec instantaneous and total.
    DownloadBandwidth { bytes_per_sec: f64, total_bytes: u64 },
    /// Jitter (RFC3550 units), fraction lost (0.0..1.0), and round-trip
    /// time in milliseconds, as observed on the RTP session.
    LocalNetwork {
        jitter: f64,
        fraction_lost: f32,
        rtt_ms: Option<f64>,
    },
    /// The engine is tearing down; `graceful` distinguishes `leave_room`
    /// from an error-triggered shutdown.
    Closing { graceful: bool },
    Closed,
    Error(String),
}
