//! MIME type utilities for player stream types
//!
//! Player configs report MIME types with a codec list attached, e.g.
//! `video/mp4; codecs="avc1.42001E, mp4a.40.2"`.

/// Strip parameters from a MIME type
pub fn base_mime(mime_type: &str) -> &str {
    mime_type.split(';').next().unwrap_or("").trim()
}

/// Get codec list from a MIME type's `codecs` parameter
pub fn codecs(mime_type: &str) -> Vec<&str> {
    mime_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.trim().strip_prefix("codecs="))
        .flat_map(|list| list.trim_matches('"').split(','))
        .map(str::trim)
        .filter(|codec| !codec.is_empty())
        .collect()
}

/// Get file extension from MIME type
pub fn ext_from_mime(mime_type: &str) -> &'static str {
    match base_mime(mime_type) {
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/3gpp" => "3gp",
        "video/x-flv" => "flv",
        "audio/mp4" => "m4a",
        "audio/webm" => "webm",
        "audio/mpeg" => "mp3",
        "audio/ogg" => "ogg",
        "audio/opus" => "opus",
        _ => "bin",
    }
}

/// Check if MIME type is a video format
pub fn is_video_mime(mime_type: &str) -> bool {
    base_mime(mime_type).starts_with("video/")
}

/// Check if MIME type is an audio format
pub fn is_audio_mime(mime_type: &str) -> bool {
    base_mime(mime_type).starts_with("audio/")
}

/// Check if MIME type is a progressive format (video+audio combined)
///
/// Legacy stream maps carry no codec list; those video types count as
/// progressive since adaptive streams were listed separately.
pub fn is_progressive_mime(mime_type: &str) -> bool {
    if !is_video_mime(mime_type) {
        return false;
    }
    let codecs = codecs(mime_type);
    codecs.is_empty() || codecs.len() >= 2
}
