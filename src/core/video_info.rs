//! Stream descriptor and resolved video structures

use serde::{Deserialize, Serialize};

/// Marker the player config uses for on-the-fly transcoded streams
pub const OTF_STREAM_TYPE: &str = "FORMAT_STREAM_TYPE_OTF";

/// Query parameter name used when a cipher blob carries no `sp`
pub const DEFAULT_SIGNATURE_PARAM: &str = "signature";

/// Resolved video: metadata plus directly fetchable streams
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedVideo {
    /// Video title
    pub title: Option<String>,
    /// Video duration in seconds
    pub duration: Option<u64>,
    /// Resolved streams, in config order
    pub streams: Vec<StreamDescriptor>,
}

impl ResolvedVideo {
    /// Check if every stream url is directly usable
    pub fn is_fully_resolved(&self) -> bool {
        self.streams.iter().all(|s| !s.needs_deciphering())
    }
}

/// Signature cipher attached to a stream that is not yet directly usable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureCipher {
    /// Scrambled signature seed
    pub s: String,
    /// Query parameter name the resolved signature goes under
    pub sp: Option<String>,
    /// Auxiliary query parameters carried by the cipher blob
    pub extra_params: Vec<(String, String)>,
}

impl SignatureCipher {
    /// Create a cipher with just a seed
    pub fn new(s: impl Into<String>) -> Self {
        Self {
            s: s.into(),
            sp: None,
            extra_params: Vec::new(),
        }
    }

    /// Query parameter name for the resolved signature
    pub fn param_name(&self) -> &str {
        self.sp
            .as_deref()
            .filter(|sp| !sp.is_empty())
            .unwrap_or(DEFAULT_SIGNATURE_PARAM)
    }
}

/// One selectable audio/video rendition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Stream URL, possibly still awaiting a signature
    pub url: String,
    /// Cipher to complete before the url is usable
    pub signature_cipher: Option<SignatureCipher>,
    /// MIME type, including codecs
    pub mime_type: String,
    /// Quality label (e.g. "medium", "hd720", "tiny")
    pub quality: String,
    /// Format ID (itag)
    pub itag: u32,
    /// Bitrate in bits per second
    pub bitrate: Option<u64>,
    /// Stream is transcoded on the fly
    pub is_otf: bool,
}

impl StreamDescriptor {
    /// Create a descriptor with a directly usable url
    pub fn new(itag: u32, url: String, quality: String, mime_type: String) -> Self {
        Self {
            url,
            signature_cipher: None,
            mime_type,
            quality,
            itag,
            bitrate: None,
            is_otf: false,
        }
    }

    /// Attach a signature cipher
    pub fn with_cipher(mut self, cipher: SignatureCipher) -> Self {
        self.signature_cipher = Some(cipher);
        self
    }

    /// Set bitrate
    pub fn with_bitrate(mut self, bitrate: u64) -> Self {
        self.bitrate = Some(bitrate);
        self
    }

    /// Check if the url still needs a resolved signature
    pub fn needs_deciphering(&self) -> bool {
        self.signature_cipher.is_some()
    }

    /// Check if stream is audio-only
    pub fn is_audio_only(&self) -> bool {
        crate::utils::mime::is_audio_mime(&self.mime_type)
    }

    /// Check if stream is video-only or progressive video
    pub fn is_video(&self) -> bool {
        crate::utils::mime::is_video_mime(&self.mime_type)
    }

    /// Check if stream carries both audio and video
    pub fn is_progressive(&self) -> bool {
        crate::utils::mime::is_progressive_mime(&self.mime_type)
    }

    /// Get file extension from MIME type
    pub fn extension(&self) -> &'static str {
        crate::utils::mime::ext_from_mime(&self.mime_type)
    }
}
