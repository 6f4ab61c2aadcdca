//! Player config extraction from watch page HTML

use crate::error::ResolveError;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

/// Attribute prefix of the title meta tag
const TITLE_META_PREFIX: &str = r#"<meta property="og:title" content=""#;

/// A config matcher returns the JSON fragment it found, if any
type ConfigMatcher = fn(&str) -> Result<Option<String>, ResolveError>;

/// Embedding patterns in priority order
const CONFIG_MATCHERS: &[(&str, ConfigMatcher)] = &[
    ("ytplayer.config", match_ytplayer_config),
    ("setConfig PLAYER_CONFIG", match_set_config),
    ("setConfig PLAYER_CONFIG with flags", match_set_config_with_flags),
    ("ytInitialPlayerResponse", match_initial_player_response),
];

/// Player configuration embedded in a watch page
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    raw: Map<String, Value>,
}

impl PlayerConfig {
    /// Wrap a parsed JSON object
    pub fn from_value(value: Value) -> Result<Self, ResolveError> {
        match value {
            Value::Object(raw) => Ok(Self { raw }),
            other => Err(ResolveError::ConfigNotFound(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// The whole config object
    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    /// Player arguments; configs without an `args` object are their own args
    pub fn args(&self) -> &Map<String, Value> {
        self.raw
            .get("args")
            .and_then(Value::as_object)
            .unwrap_or(&self.raw)
    }

    /// Player response object, decoding it when embedded as a JSON string
    pub fn player_response(&self) -> Option<Value> {
        match self.args().get("player_response") {
            Some(Value::String(encoded)) => serde_json::from_str(encoded).ok(),
            Some(value @ Value::Object(_)) => Some(value.clone()),
            _ if self.raw.contains_key("streamingData") || self.raw.contains_key("videoDetails") => {
                Some(Value::Object(self.raw.clone()))
            }
            _ => None,
        }
    }

    /// Video title from the args or the player response
    pub fn title(&self) -> Option<String> {
        if let Some(title) = self.args().get("title").and_then(Value::as_str) {
            return Some(title.to_string());
        }
        self.player_response()?
            .pointer("/videoDetails/title")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Set the title in the args
    pub fn set_title(&mut self, title: String) {
        if let Some(Value::Object(args)) = self.raw.get_mut("args") {
            args.insert("title".to_string(), Value::String(title));
        } else {
            self.raw.insert("title".to_string(), Value::String(title));
        }
    }

    /// Video duration in seconds
    pub fn duration(&self) -> Option<u64> {
        if let Some(length) = self.args().get("length_seconds").and_then(json_u64) {
            return Some(length);
        }
        self.player_response()?
            .pointer("/videoDetails/lengthSeconds")
            .and_then(json_u64)
    }

    /// Player script path from the config assets
    pub fn script_url(&self) -> Option<String> {
        self.raw
            .get("assets")
            .and_then(|assets| assets.get("js"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// Extract the player config from watch page HTML
pub fn extract(page_html: &str) -> Result<PlayerConfig, ResolveError> {
    let mut invalid = Vec::new();

    for (name, matcher) in CONFIG_MATCHERS {
        let Some(fragment) = matcher(page_html)? else {
            debug!("Config pattern '{}' did not match", name);
            continue;
        };

        match serde_json::from_str::<Value>(&fragment) {
            Ok(value @ Value::Object(_)) => {
                debug!("Player config found with pattern '{}'", name);
                return PlayerConfig::from_value(value);
            }
            Ok(other) => invalid.push(format!("{}: not an object ({})", name, json_kind(&other))),
            Err(e) => {
                debug!("Config pattern '{}' matched invalid JSON: {}", name, e);
                invalid.push(format!("{}: {}", name, e));
            }
        }
    }

    if invalid.is_empty() {
        Err(ResolveError::ConfigNotFound(
            "no known embedding pattern matched".to_string(),
        ))
    } else {
        Err(ResolveError::ConfigNotFound(invalid.join("; ")))
    }
}

/// Extract the config and fill in the title from the page when missing
pub fn extract_with_title(page_html: &str) -> Result<PlayerConfig, ResolveError> {
    let mut config = extract(page_html)?;
    if config.title().is_none() {
        if let Some(title) = extract_title(page_html)? {
            debug!("Title taken from meta tag");
            config.set_title(title);
        }
    }
    Ok(config)
}

/// Extract the title from the `og:title` meta tag
///
/// Quotes inside the value are kept unless directly followed by `>`.
pub fn extract_title(page_html: &str) -> Result<Option<String>, ResolveError> {
    let lower = page_html.to_ascii_lowercase();
    let Some(prefix) = lower.find(TITLE_META_PREFIX) else {
        return Ok(None);
    };
    let start = prefix + TITLE_META_PREFIX.len();

    let bytes = page_html.as_bytes();
    let mut end = None;
    let mut i = start;
    while i + 1 < bytes.len() {
        if bytes[i] == b'"' && bytes[i + 1] == b'>' {
            end = Some(i);
            break;
        }
        i += 1;
    }

    let Some(raw) = end.and_then(|end| page_html.get(start..end)) else {
        return Ok(None);
    };
    unescape_html(raw.trim()).map(Some)
}

fn unescape_html(text: &str) -> Result<String, ResolveError> {
    let text = text.replace("\\\"", "\"");
    let entity = Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);")?;
    let text = entity.replace_all(&text, |caps: &regex::Captures| {
        let code = &caps[1];
        let value = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        value
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });
    Ok(text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&"))
}

fn match_ytplayer_config(html: &str) -> Result<Option<String>, ResolveError> {
    capture(html, r";ytplayer\.config\s*=\s*(\{.+?\});ytplayer")
}

fn match_set_config(html: &str) -> Result<Option<String>, ResolveError> {
    capture(html, r";yt\.setConfig\(\{'PLAYER_CONFIG':\s*(\{.*\})\}\);")
}

fn match_set_config_with_flags(html: &str) -> Result<Option<String>, ResolveError> {
    capture(
        html,
        r";yt\.setConfig\(\{'PLAYER_CONFIG':\s*(\{.*\})(?:,'EXPERIMENT_FLAGS'|;)",
    )
}

fn match_initial_player_response(html: &str) -> Result<Option<String>, ResolveError> {
    let regex = Regex::new(r"ytInitialPlayerResponse\s*=\s*")?;
    Ok(regex
        .find(html)
        .and_then(|m| json_object(&html[m.end()..]))
        .map(str::to_string))
}

fn capture(html: &str, pattern: &str) -> Result<Option<String>, ResolveError> {
    let regex = Regex::new(pattern)?;
    Ok(regex
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string()))
}

/// Cut a complete JSON object off the start of `text`
fn json_object(text: &str) -> Option<&str> {
    let text = text.trim_start();
    if !text.starts_with('{') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, byte) in text.bytes().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn json_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
