//! Maps the wire adapter's own failure modes (HTTP transport failures,
//! unparseable bodies) onto the canonical error-code taxonomy §6/§7
//! defines, for cases where the broker's own response doesn't already
//! carry one of those codes directly.

/// HTTP-layer fallback mapping, used only when the broker's response body
/// has no structured error code of its own.
pub fn map_http_status(status: u16) -> i32 {
    match status {
        401 | 403 => 502,   // treated as a dropped session -> reconnect
        408 | 504 => 1100,  // timeout -> connectivity lost -> reconnect
        429 => 1001,        // rate limited -> warning, not fatal
        500..=599 => 1100,
        _ => 2999,          // unclassified error
    }
}
