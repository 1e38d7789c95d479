// -
// Wire protocol

/// Frame payload announcing a deliberate end of the stream
pub(crate) const DONE_SENTINEL: &str = "[DONE]";

/// Query flag that turns a collection listing into a change stream
pub(crate) const WATCH_QUERY_KEY: &str = "watch";

/// Query key carrying the resume token on (re)subscription
pub(crate) const RESOURCE_VERSION_QUERY_KEY: &str = "resource_version";

// -
// Request headers

pub(crate) const EVENT_STREAM_MEDIA_TYPE: &str = "text/event-stream";
pub(crate) const NDJSON_MEDIA_TYPE: &str = "application/x-ndjson";
pub(crate) const JSON_MEDIA_TYPE: &str = "application/json";

pub(crate) const PROJECT_HEADER: &str = "X-Ambient-Project";
pub(crate) const LAST_EVENT_ID_HEADER: &str = "Last-Event-ID";

// -
// Configuration

/// Environment variable prefix, e.g. `AMBIENT__CONNECTION__BASE_URL`
pub(crate) const ENV_PREFIX: &str = "AMBIENT";
pub(crate) const ENV_SEPARATOR: &str = "__";
pub(crate) const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// Resource kind reported for snapshots that omit it
pub(crate) const DEFAULT_RESOURCE_KIND: &str = "Session";
