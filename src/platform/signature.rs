//! Signature application to ciphered stream urls

use crate::core::video_info::StreamDescriptor;
use crate::error::ResolveError;
use crate::platform::cipher::CipherProgram;
use tracing::debug;
use url::Url;

/// Complete a ciphered descriptor's url with its resolved signature
///
/// Descriptors without a cipher are returned unchanged. The returned
/// descriptor never carries a cipher.
pub fn apply_signature(
    stream: &StreamDescriptor,
    program: &CipherProgram,
) -> Result<StreamDescriptor, ResolveError> {
    let cipher = match &stream.signature_cipher {
        Some(cipher) => cipher,
        None => return Ok(stream.clone()),
    };

    let mut url = Url::parse(&stream.url).map_err(|e| {
        ResolveError::MalformedStreamEntry(format!(
            "itag {}: invalid stream url '{}': {}",
            stream.itag, stream.url, e
        ))
    })?;

    let signature = program.apply(&cipher.s);
    let param = cipher.param_name();
    debug!("Applying signature to itag {} as '{}'", stream.itag, param);

    let existing: Vec<String> = url.query_pairs().map(|(key, _)| key.into_owned()).collect();
    {
        let mut query = url.query_pairs_mut();
        query.append_pair(param, &signature);
        for (key, value) in &cipher.extra_params {
            if key != param && !existing.iter().any(|k| k == key) {
                query.append_pair(key, value);
            }
        }
    }

    let mut resolved = stream.clone();
    resolved.url = url.to_string();
    resolved.signature_cipher = None;
    Ok(resolved)
}
