//! Stream resolution pipeline
//!
//! Page → player config → stream descriptors → (ciphered descriptors only)
//! signature function → cipher program → signed urls.

use crate::core::video_info::{ResolvedVideo, StreamDescriptor};
use crate::error::ResolveError;
use crate::platform::cipher::CipherProgram;
use crate::platform::client::{HttpClientConfig, HttpFetcher, PageFetcher};
use crate::platform::config::{self, PlayerConfig};
use crate::platform::descrambler::{self, LEGACY_STREAM_MAP};
use crate::platform::retry::RetryConfig;
use crate::platform::signature::apply_signature;
use crate::utils::cache::{new_program_cache, ProgramCache};
use crate::utils::url::{
    absolute_script_url, embed_url, extract_script_url, extract_video_id, watch_url,
    DEFAULT_BASE_URL,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Resolver configuration
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Origin for watch, embed and relative script urls
    pub base_url: String,
    /// HTTP timeout
    pub timeout: Duration,
    /// Maximum retries per request
    pub max_retries: u32,
    /// User agent override
    pub user_agent: Option<String>,
    /// Proxy for every request
    pub proxy_url: Option<String>,
    /// How long a cipher program stays cached
    pub cache_ttl: Duration,
    /// Maximum number of cached cipher programs
    pub cache_capacity: u64,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            user_agent: None,
            proxy_url: None,
            cache_ttl: Duration::from_secs(600), // 10 minutes
            cache_capacity: 32,
        }
    }
}

impl ResolverOptions {
    /// Set the base url
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set HTTP timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set maximum retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Route requests through a proxy
    pub fn with_proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = Some(proxy_url.into());
        self
    }

    /// Set cipher program cache TTL
    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    /// HTTP client configuration for these options
    pub fn http_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: self.timeout,
            user_agent: self.user_agent.clone(),
            proxy_url: self.proxy_url.clone(),
            retry: RetryConfig::default().with_max_retries(self.max_retries),
        }
    }
}

/// Resolve a watch page and, when needed, its player script
///
/// `script` is only read when some stream still needs a signature.
pub fn resolve_page(page_html: &str, script: Option<&str>) -> Result<ResolvedVideo, ResolveError> {
    let config = config::extract_with_title(page_html)?;
    let streams = descramble_config(&config)?;

    let program = if streams.iter().any(StreamDescriptor::needs_deciphering) {
        let script = script.ok_or(ResolveError::ScriptUrlNotFound)?;
        Some(CipherProgram::from_script(script)?)
    } else {
        None
    };

    finish(&config, streams, program.as_ref())
}

/// Resolve a saved watch page and player script from disk
pub async fn resolve_files(
    page_path: &Path,
    script_path: Option<&Path>,
) -> Result<ResolvedVideo, ResolveError> {
    let page = tokio::fs::read_to_string(page_path).await?;
    let script = match script_path {
        Some(path) => Some(tokio::fs::read_to_string(path).await?),
        None => None,
    };
    resolve_page(&page, script.as_deref())
}

/// Descramble every stream map the config carries, in order
pub fn descramble_config(config: &PlayerConfig) -> Result<Vec<StreamDescriptor>, ResolveError> {
    let args = config.args();
    let mut streams = Vec::new();

    for key in descrambler::stream_map_keys(args) {
        match descrambler::descramble(args, key) {
            Ok(batch) => streams.extend(batch),
            Err(ResolveError::StreamMapMissing) if key != LEGACY_STREAM_MAP => {
                debug!("Stream map '{}' is empty", key);
            }
            Err(e) => return Err(e),
        }
    }

    debug!("Descrambled {} streams", streams.len());
    Ok(streams)
}

/// Sign the streams and assemble the resolved video
fn finish(
    config: &PlayerConfig,
    streams: Vec<StreamDescriptor>,
    program: Option<&CipherProgram>,
) -> Result<ResolvedVideo, ResolveError> {
    let mut resolved = Vec::with_capacity(streams.len());

    // A seed is always applied, even to urls that already carry `lsig`
    for stream in streams {
        if !stream.needs_deciphering() {
            resolved.push(stream);
            continue;
        }

        let Some(program) = program else {
            return Err(ResolveError::ScriptUrlNotFound);
        };
        match apply_signature(&stream, program) {
            Ok(signed) => resolved.push(signed),
            Err(e) if e.is_recoverable() => warn!("Skipping stream {}: {}", stream.itag, e),
            Err(e) => return Err(e),
        }
    }

    let video = ResolvedVideo {
        title: config.title(),
        duration: config.duration(),
        streams: resolved,
    };
    info!(
        "Resolved {} streams for {}",
        video.streams.len(),
        video.title.as_deref().unwrap_or("untitled video")
    );
    Ok(video)
}

/// Fetching resolver with a per-process cipher program cache
pub struct StreamResolver<F> {
    fetcher: F,
    options: ResolverOptions,
    programs: ProgramCache,
}

impl StreamResolver<HttpFetcher> {
    /// Create a resolver with default options
    pub fn new() -> Result<Self, ResolveError> {
        Self::with_options(ResolverOptions::default())
    }

    /// Create an HTTP resolver with custom options
    pub fn with_options(options: ResolverOptions) -> Result<Self, ResolveError> {
        let fetcher = HttpFetcher::with_config(options.http_config())?;
        Ok(Self::with_fetcher(fetcher, options))
    }
}

impl<F: PageFetcher> StreamResolver<F> {
    /// Create a resolver over any fetcher
    pub fn with_fetcher(fetcher: F, options: ResolverOptions) -> Self {
        let programs = new_program_cache(options.cache_ttl, options.cache_capacity);
        Self {
            fetcher,
            options,
            programs,
        }
    }

    /// Get the options
    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Resolve a video url or ID into directly fetchable streams
    pub async fn resolve(&self, video: &str) -> Result<ResolvedVideo, ResolveError> {
        let video_id = extract_video_id(video)?;
        info!("Resolving video {}", video_id);

        let watch = watch_url(&self.options.base_url, &video_id)?;
        let page = self.fetcher.fetch_text(watch.as_str()).await?;

        let config = config::extract_with_title(&page)?;
        let streams = descramble_config(&config)?;

        let program = if streams.iter().any(StreamDescriptor::needs_deciphering) {
            let script_url = self.script_url(&config, &video_id).await?;
            Some(self.program(&script_url).await?)
        } else {
            debug!("No stream needs a signature");
            None
        };

        finish(&config, streams, program.as_deref())
    }

    /// Resolve already fetched page and script text
    pub fn resolve_offline(
        &self,
        page_html: &str,
        script: Option<&str>,
    ) -> Result<ResolvedVideo, ResolveError> {
        resolve_page(page_html, script)
    }

    /// Absolute player script url, from the config or the embed page
    async fn script_url(
        &self,
        config: &PlayerConfig,
        video_id: &str,
    ) -> Result<String, ResolveError> {
        let path = match config.script_url() {
            Some(path) => path,
            None => {
                debug!("Config has no script url, reading embed page");
                let embed = embed_url(&self.options.base_url, video_id)?;
                let html = self.fetcher.fetch_text(embed.as_str()).await?;
                extract_script_url(&html)?
            }
        };
        absolute_script_url(&self.options.base_url, &path)
    }

    /// Cipher program for a script url, fetched and built at most once per TTL
    async fn program(&self, script_url: &str) -> Result<Arc<CipherProgram>, ResolveError> {
        if let Some(program) = self.programs.get(script_url).await {
            debug!("Using cached cipher program for {}", script_url);
            return Ok(program);
        }

        let script = self.fetcher.fetch_text(script_url).await?;
        let program = Arc::new(CipherProgram::from_script(&script)?);
        debug!(
            "Built cipher program with {} steps from {}",
            program.steps().len(),
            script_url
        );
        self.programs
            .insert(script_url.to_string(), program.clone())
            .await;
        Ok(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const PLAYER_JS: &str = r#"
var Bo={Rv:function(a,b){a.splice(0,b)},
kT:function(a){a.reverse()}};
Xy=function(a){a=a.split("");Bo.kT(a);Bo.Rv(a,2);return a.join("")};
c&&d.set(b,encodeURIComponent(Xy(decodeURIComponent(c))));
"#;

    const SCRIPT_URL: &str = "https://www.youtube.com/s/player/abc123/base.js";

    struct MapFetcher {
        pages: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
    }

    impl MapFetcher {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.to_string()))
                    .collect(),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for MapFetcher {
        async fn fetch_text(&self, url: &str) -> Result<String, ResolveError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| ResolveError::HttpStatus {
                    status: 404,
                    url: url.to_string(),
                })
        }
    }

    fn watch_page(player_response: serde_json::Value, assets: bool) -> String {
        let mut config = json!({
            "args": { "player_response": player_response.to_string() }
        });
        if assets {
            config["assets"] = json!({ "js": "/s/player/abc123/base.js" });
        }
        format!(
            "<html><script>;ytplayer.config = {};ytplayer.web_player_context_config = {{}};</script></html>",
            config
        )
    }

    fn ciphered_response() -> serde_json::Value {
        json!({
            "videoDetails": { "title": "Test Video", "lengthSeconds": "212" },
            "streamingData": {
                "formats": [{
                    "itag": 18,
                    "url": "https://example.com/videoplayback?itag=18",
                    "mimeType": "video/mp4; codecs=\"avc1.42001E, mp4a.40.2\"",
                    "quality": "medium",
                    "bitrate": 500000
                }],
                "adaptiveFormats": [{
                    "itag": 251,
                    "signatureCipher": "s=ABCD1234&sp=sig&url=http%3A%2F%2Fexample.com%2Fstream",
                    "mimeType": "audio/webm; codecs=\"opus\"",
                    "quality": "tiny",
                    "bitrate": 160000
                }]
            }
        })
    }

    fn query_value(url: &str, name: &str) -> Option<String> {
        url::Url::parse(url)
            .ok()?
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    #[test]
    fn test_resolve_page_end_to_end() {
        let page = watch_page(ciphered_response(), true);
        let video = resolve_page(&page, Some(PLAYER_JS)).unwrap();

        assert_eq!(video.title.as_deref(), Some("Test Video"));
        assert_eq!(video.duration, Some(212));
        assert_eq!(video.streams.len(), 2);
        assert!(video.is_fully_resolved());

        assert_eq!(video.streams[0].itag, 18);
        assert_eq!(video.streams[0].url, "https://example.com/videoplayback?itag=18");

        let audio = &video.streams[1];
        assert_eq!(audio.itag, 251);
        assert!(audio.url.starts_with("http://example.com/stream"));
        assert_eq!(query_value(&audio.url, "sig").as_deref(), Some("21DCBA"));
    }

    #[test]
    fn test_resolve_page_without_cipher_needs_no_script() {
        let response = json!({
            "streamingData": {
                "formats": [{
                    "itag": 18,
                    "url": "https://example.com/videoplayback?itag=18",
                    "mimeType": "video/mp4",
                    "quality": "medium"
                }]
            }
        });
        let page = watch_page(response, false);
        let video = resolve_page(&page, None).unwrap();
        assert_eq!(video.streams.len(), 1);
    }

    #[test]
    fn test_resolve_page_ciphered_without_script() {
        let page = watch_page(ciphered_response(), true);
        assert!(matches!(
            resolve_page(&page, None),
            Err(ResolveError::ScriptUrlNotFound)
        ));
    }

    #[test]
    fn test_resolve_page_unknown_script_format() {
        let page = watch_page(ciphered_response(), true);
        let result = resolve_page(&page, Some("function unrelated(){}"));
        assert!(matches!(result, Err(ResolveError::CipherFunctionNotFound)));
        assert!(result.unwrap_err().is_format_change());
    }

    #[test]
    fn test_resolve_page_legacy_maps() {
        let config = json!({
            "args": {
                "title": "Legacy &amp; Old",
                "length_seconds": 90,
                "url_encoded_fmt_stream_map":
                    "itag=18&url=https%3A%2F%2Fexample.com%2Fv%3Fitag%3D18&type=video%2Fmp4&quality=medium",
                "adaptive_fmts":
                    "itag=140&url=https%3A%2F%2Fexample.com%2Fa%3Fitag%3D140&type=audio%2Fmp4&bitrate=128000&s=ABCD1234,itag=bad"
            }
        });
        let page = format!("<script>;ytplayer.config = {};ytplayer.load();</script>", config);
        let video = resolve_page(&page, Some(PLAYER_JS)).unwrap();

        assert_eq!(video.duration, Some(90));
        let itags: Vec<u32> = video.streams.iter().map(|s| s.itag).collect();
        assert_eq!(itags, vec![18, 140]);
        assert_eq!(
            query_value(&video.streams[1].url, "signature").as_deref(),
            Some("21DCBA")
        );
    }

    #[test]
    fn test_resolve_page_signs_cipher_with_lsig() {
        let response = json!({
            "streamingData": {
                "adaptiveFormats": [{
                    "itag": 251,
                    "signatureCipher": "s=ABCD1234&sp=sig&url=https%3A%2F%2Fexample.com%2Fvideoplayback%3Fitag%3D251%26lsparams%3Dmh%26lsig%3DAOq0",
                    "mimeType": "audio/webm; codecs=\"opus\"",
                    "quality": "tiny"
                }]
            }
        });
        let page = watch_page(response, true);

        assert!(matches!(
            resolve_page(&page, None),
            Err(ResolveError::ScriptUrlNotFound)
        ));

        let video = resolve_page(&page, Some(PLAYER_JS)).unwrap();
        let url = &video.streams[0].url;
        assert!(video.is_fully_resolved());
        assert_eq!(query_value(url, "lsig").as_deref(), Some("AOq0"));
        assert_eq!(query_value(url, "sig").as_deref(), Some("21DCBA"));
        assert!(url.contains("sig=21DCBA"));
    }

    #[test]
    fn test_resolve_page_signed_url_without_cipher_untouched() {
        let response = json!({
            "streamingData": {
                "formats": [{
                    "itag": 18,
                    "url": "https://example.com/v?itag=18&lsparams=mh&lsig=AOq0&sig=DONE",
                    "mimeType": "video/mp4",
                    "quality": "medium"
                }]
            }
        });
        let page = watch_page(response, false);
        let video = resolve_page(&page, None).unwrap();
        assert_eq!(
            video.streams[0].url,
            "https://example.com/v?itag=18&lsparams=mh&lsig=AOq0&sig=DONE"
        );
    }

    #[test]
    fn test_resolve_page_config_not_found() {
        let result = resolve_page("<html>nothing here</html>", None);
        assert!(matches!(result, Err(ResolveError::ConfigNotFound(_))));
    }

    #[tokio::test]
    async fn test_resolver_fetches_script_once() {
        let page = watch_page(ciphered_response(), true);
        let fetcher = MapFetcher::new(&[
            ("https://www.youtube.com/watch?v=dQw4w9WgXcQ", page.as_str()),
            (SCRIPT_URL, PLAYER_JS),
        ]);
        let resolver = StreamResolver::with_fetcher(fetcher, ResolverOptions::default());

        let first = resolver.resolve("dQw4w9WgXcQ").await.unwrap();
        let second = resolver
            .resolve("https://youtu.be/dQw4w9WgXcQ")
            .await
            .unwrap();
        assert_eq!(first.streams, second.streams);

        let requests = resolver.fetcher.requests();
        assert_eq!(requests.iter().filter(|url| *url == SCRIPT_URL).count(), 1);
        assert_eq!(requests.len(), 3);
    }

    #[tokio::test]
    async fn test_resolver_uses_embed_page_for_script_url() {
        let page = watch_page(ciphered_response(), false);
        let embed = r#"<script>{"jsUrl":"\/s\/player\/abc123\/base.js"}</script>"#;
        let fetcher = MapFetcher::new(&[
            ("https://www.youtube.com/watch?v=dQw4w9WgXcQ", page.as_str()),
            ("https://www.youtube.com/embed/dQw4w9WgXcQ", embed),
            (SCRIPT_URL, PLAYER_JS),
        ]);
        let resolver = StreamResolver::with_fetcher(fetcher, ResolverOptions::default());

        let video = resolver.resolve("dQw4w9WgXcQ").await.unwrap();
        assert!(video.is_fully_resolved());
        assert_eq!(
            resolver.fetcher.requests(),
            vec![
                "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
                "https://www.youtube.com/embed/dQw4w9WgXcQ".to_string(),
                SCRIPT_URL.to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_resolver_skips_script_when_unciphered() {
        let response = json!({
            "streamingData": {
                "formats": [{
                    "itag": 18,
                    "url": "https://example.com/videoplayback?itag=18",
                    "mimeType": "video/mp4",
                    "quality": "medium"
                }]
            }
        });
        let page = watch_page(response, false);
        let fetcher = MapFetcher::new(&[(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            page.as_str(),
        )]);
        let resolver = StreamResolver::with_fetcher(fetcher, ResolverOptions::default());

        resolver.resolve("dQw4w9WgXcQ").await.unwrap();
        assert_eq!(resolver.fetcher.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_resolver_invalid_video() {
        let resolver =
            StreamResolver::with_fetcher(MapFetcher::new(&[]), ResolverOptions::default());
        assert!(matches!(
            resolver.resolve("https://example.com/nope").await,
            Err(ResolveError::InvalidVideoId(_))
        ));
        assert!(resolver.fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_files() {
        let dir = tempfile::tempdir().unwrap();
        let page_path = dir.path().join("watch.html");
        let script_path = dir.path().join("base.js");
        std::fs::write(&page_path, watch_page(ciphered_response(), true)).unwrap();
        std::fs::write(&script_path, PLAYER_JS).unwrap();

        let video = resolve_files(&page_path, Some(&script_path)).await.unwrap();
        assert!(video.is_fully_resolved());
        assert_eq!(video.streams.len(), 2);

        let missing = dir.path().join("missing.html");
        assert!(matches!(
            resolve_files(&missing, None).await,
            Err(ResolveError::Io(_))
        ));
    }

    #[test]
    fn test_resolve_offline_matches_resolve_page() {
        let page = watch_page(ciphered_response(), true);
        let resolver =
            StreamResolver::with_fetcher(MapFetcher::new(&[]), ResolverOptions::default());
        let offline = resolver.resolve_offline(&page, Some(PLAYER_JS)).unwrap();
        let direct = resolve_page(&page, Some(PLAYER_JS)).unwrap();
        assert_eq!(offline.streams, direct.streams);
        assert!(resolver.fetcher.requests().is_empty());
    }

    #[test]
    fn test_options_builders() {
        let options = ResolverOptions::default()
            .with_base_url("http://127.0.0.1:8080")
            .with_timeout(Duration::from_secs(5))
            .with_max_retries(1)
            .with_user_agent("test-agent")
            .with_proxy("http://127.0.0.1:3128")
            .with_cache_ttl(Duration::from_secs(60));

        let http = options.http_config();
        assert_eq!(http.timeout, Duration::from_secs(5));
        assert_eq!(http.retry.max_retries, 1);
        assert_eq!(http.user_agent.as_deref(), Some("test-agent"));
        assert_eq!(http.proxy_url.as_deref(), Some("http://127.0.0.1:3128"));
        assert!(StreamResolver::with_options(options.clone()).is_ok());
        assert_eq!(options.cache_ttl, Duration::from_secs(60));
    }
}
