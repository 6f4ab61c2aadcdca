//! Stream selection helpers

use crate::core::video_info::StreamDescriptor;

/// Legacy quality labels, lowest first
const QUALITY_LABELS: &[&str] = &[
    "tiny", "small", "medium", "large", "hd720", "hd1080", "hd1440", "hd2160", "highres",
];

/// Rank a quality label; unknown labels rank lowest
pub fn quality_rank(quality: &str) -> usize {
    if let Some(position) = QUALITY_LABELS.iter().position(|label| *label == quality) {
        return position + 1;
    }
    // "720p", "1080p60" and similar
    quality
        .split('p')
        .next()
        .and_then(|height| height.parse::<usize>().ok())
        .map(|height| match height {
            0..=144 => 1,
            145..=240 => 2,
            241..=360 => 3,
            361..=480 => 4,
            481..=720 => 5,
            721..=1080 => 6,
            1081..=1440 => 7,
            1441..=2160 => 8,
            _ => 9,
        })
        .unwrap_or(0)
}

/// Get the audio-only stream with the highest bitrate
pub fn best_audio(streams: &[StreamDescriptor]) -> Option<&StreamDescriptor> {
    streams
        .iter()
        .filter(|s| s.is_audio_only() && !s.is_otf)
        .max_by_key(|s| s.bitrate.unwrap_or(0))
}

/// Get the progressive (audio+video) stream with the best quality
pub fn best_progressive(streams: &[StreamDescriptor]) -> Option<&StreamDescriptor> {
    streams
        .iter()
        .filter(|s| s.is_progressive() && !s.is_otf)
        .max_by_key(|s| (quality_rank(&s.quality), s.bitrate.unwrap_or(0)))
}

/// Get a stream by format ID
pub fn by_itag(streams: &[StreamDescriptor], itag: u32) -> Option<&StreamDescriptor> {
    streams.iter().find(|s| s.itag == itag)
}
