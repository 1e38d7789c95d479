use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;


lazy_static! {
    pub static ref SESSIONS_OPENED: IntCounter = IntCounter::new(
        "watch_sessions_opened",
        "Number of watch sessions that opened a connection"
    )
    .expect("metric can not be created");

    pub static ref NOTIFICATIONS_RECEIVED: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_notifications_received", "Change notifications queued for delivery"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref FRAMES_SKIPPED: IntCounter = IntCounter::new(
        "watch_frames_skipped",
        "Frames that could not be decoded and were skipped"
    )
    .expect("metric can not be created");

    pub static ref NOTIFICATIONS_DROPPED: IntCounter = IntCounter::new(
        "watch_notifications_dropped",
        "Undelivered notifications dropped because the session buffer was full"
    )
    .expect("metric can not be created");

    pub static ref SESSION_SHUTDOWNS: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_session_shutdowns", "Watch session shutdowns by reason"),
        &["reason"]
    )
    .expect("metric can not be created");
}

/// Registers the watch counters into `registry`.
pub fn register_custom_metrics(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(SESSIONS_OPENED.clone()))?;
    registry.register(Box::new(NOTIFICATIONS_RECEIVED.clone()))?;
    registry.register(Box::new(FRAMES_SKIPPED.clone()))?;
    registry.register(Box::new(NOTIFICATIONS_DROPPED.clone()))?;
    registry.register(Box::new(SESSION_SHUTDOWNS.clone()))?;
    Ok(())
}

/// Text exposition of everything gathered by `registry`
pub fn encode_metrics(registry: &Registry) -> prometheus::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
