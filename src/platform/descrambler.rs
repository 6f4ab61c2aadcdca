//! Stream map descrambling into stream descriptors
//!
//! Player configs carry their stream list in one of two encodings:
//!
//! - the legacy form, a comma-separated list of query strings stored under
//!   `url_encoded_fmt_stream_map` (progressive) and `adaptive_fmts`;
//! - the structured form, a `streamingData` object with `formats` and
//!   `adaptiveFormats` arrays, found in the player response.
//!
//! Entries that lack a url (or a cipher) or their identifying fields are
//! skipped; the rest of the batch is still returned.

use crate::core::video_info::{SignatureCipher, StreamDescriptor, OTF_STREAM_TYPE};
use crate::error::ResolveError;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::form_urlencoded;

/// Legacy key for progressive streams, also the key the structured form answers to
pub const LEGACY_STREAM_MAP: &str = "url_encoded_fmt_stream_map";

/// Legacy key for adaptive streams
pub const ADAPTIVE_STREAM_MAP: &str = "adaptive_fmts";

/// Stream map keys to descramble for the given player args, in order
pub fn stream_map_keys(args: &Map<String, Value>) -> Vec<&'static str> {
    let mut keys = vec![LEGACY_STREAM_MAP];
    if args.contains_key(ADAPTIVE_STREAM_MAP) {
        keys.push(ADAPTIVE_STREAM_MAP);
    }
    keys
}

/// Descramble the stream map stored under `field_key`
///
/// A non-empty string is read as the legacy form and an array as a list of
/// structured entries. When [`LEGACY_STREAM_MAP`] is absent or empty the
/// structured `streamingData` object is used instead.
pub fn descramble(
    args: &Map<String, Value>,
    field_key: &str,
) -> Result<Vec<StreamDescriptor>, ResolveError> {
    match args.get(field_key) {
        Some(Value::String(raw)) if !raw.is_empty() => {
            debug!("Descrambling legacy stream map '{}'", field_key);
            Ok(collect_entries(raw.split(','), parse_legacy_entry))
        }
        Some(Value::Array(entries)) => {
            debug!("Descrambling structured stream list '{}'", field_key);
            Ok(collect_entries(entries.iter(), parse_structured_entry))
        }
        _ if field_key == LEGACY_STREAM_MAP => {
            let streaming_data = streaming_data(args).ok_or(ResolveError::StreamMapMissing)?;
            descramble_streaming_data(&streaming_data)
        }
        _ => Err(ResolveError::StreamMapMissing),
    }
}

/// Descramble a structured `streamingData` object
pub fn descramble_streaming_data(
    streaming_data: &Value,
) -> Result<Vec<StreamDescriptor>, ResolveError> {
    let formats = streaming_data.get("formats").and_then(Value::as_array);
    let adaptive = streaming_data.get("adaptiveFormats").and_then(Value::as_array);

    if formats.is_none() && adaptive.is_none() {
        return Err(ResolveError::StreamMapMissing);
    }

    let entries = formats
        .into_iter()
        .flatten()
        .chain(adaptive.into_iter().flatten());

    let streams = collect_entries(entries, parse_structured_entry);
    debug!("Descrambled {} structured streams", streams.len());
    Ok(streams)
}

/// Locate `streamingData` in the player response or the args themselves
fn streaming_data(args: &Map<String, Value>) -> Option<Value> {
    if let Some(data) = args.get("streamingData") {
        return Some(data.clone());
    }
    let response = match args.get("player_response")? {
        Value::String(encoded) => serde_json::from_str::<Value>(encoded).ok()?,
        other => other.clone(),
    };
    response.get("streamingData").cloned()
}

fn collect_entries<I, T, F>(entries: I, parse: F) -> Vec<StreamDescriptor>
where
    I: Iterator<Item = T>,
    F: Fn(T) -> Result<StreamDescriptor, ResolveError>,
{
    entries
        .enumerate()
        .filter_map(|(index, entry)| match parse(entry) {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!("Skipping stream entry {}: {}", index, e);
                None
            }
        })
        .collect()
}

/// Parse one legacy query-string blob
fn parse_legacy_entry(blob: &str) -> Result<StreamDescriptor, ResolveError> {
    let pairs = parse_query(blob);
    let get = |key: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    };

    let url = get("url").ok_or_else(|| malformed("legacy entry has no url"))?;
    let itag = get("itag")
        .and_then(|v| v.parse::<u32>().ok())
        .ok_or_else(|| malformed("legacy entry has no itag"))?;
    let mime_type = get("type")
        .or_else(|| get("mimeType"))
        .ok_or_else(|| malformed(format!("legacy entry {} has no type", itag)))?;
    let quality = get("quality").or_else(|| get("quality_label")).unwrap_or("");

    let mut stream = StreamDescriptor::new(
        itag,
        url.to_string(),
        quality.to_string(),
        mime_type.to_string(),
    );
    stream.bitrate = get("bitrate").and_then(|v| v.parse().ok());
    stream.is_otf = get("stream_type").is_some_and(|v| v == OTF_STREAM_TYPE);

    if let Some(s) = get("s") {
        stream.signature_cipher = Some(SignatureCipher {
            s: s.to_string(),
            sp: get("sp").map(str::to_string),
            extra_params: Vec::new(),
        });
    }

    Ok(stream)
}

/// Parse one structured format entry
fn parse_structured_entry(entry: &Value) -> Result<StreamDescriptor, ResolveError> {
    let itag = entry
        .get("itag")
        .and_then(json_u64)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| malformed("format entry has no itag"))?;
    let mime_type = entry
        .get("mimeType")
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| malformed(format!("format {} has no mimeType", itag)))?;
    let quality = entry
        .get("quality")
        .or_else(|| entry.get("qualityLabel"))
        .and_then(Value::as_str)
        .unwrap_or("");

    let (url, cipher) = match entry.get("url").and_then(Value::as_str) {
        Some(url) if !url.is_empty() => (url.to_string(), None),
        _ => {
            let blob = entry
                .get("signatureCipher")
                .or_else(|| entry.get("cipher"))
                .and_then(Value::as_str)
                .ok_or_else(|| malformed(format!("format {} has neither url nor cipher", itag)))?;
            let (url, cipher) = parse_cipher_blob(blob)
                .map_err(|e| malformed(format!("format {}: {}", itag, e)))?;
            (url, Some(cipher))
        }
    };

    let mut stream = StreamDescriptor::new(itag, url, quality.to_string(), mime_type.to_string());
    stream.signature_cipher = cipher;
    stream.bitrate = entry.get("bitrate").and_then(json_u64);
    stream.is_otf = entry.get("type").and_then(Value::as_str) == Some(OTF_STREAM_TYPE);
    Ok(stream)
}

/// Split a cipher blob into its url and the cipher to complete it with
pub fn parse_cipher_blob(blob: &str) -> Result<(String, SignatureCipher), ResolveError> {
    let mut url = None;
    let mut s = None;
    let mut sp = None;
    let mut extra_params = Vec::new();

    for (key, value) in parse_query(blob) {
        match key.as_str() {
            "url" => url = Some(value),
            "s" => s = Some(value),
            "sp" => sp = Some(value),
            _ => extra_params.push((key, value)),
        }
    }

    let url = url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| malformed("cipher has no url"))?;
    let s = s
        .filter(|s| !s.is_empty())
        .ok_or_else(|| malformed("cipher has no signature seed"))?;

    Ok((url, SignatureCipher { s, sp, extra_params }))
}

fn parse_query(blob: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(blob.trim().as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn json_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn malformed(message: impl Into<String>) -> ResolveError {
    ResolveError::MalformedStreamEntry(message.into())
}
