use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ProviderKind;
use crate::error::{ScribeError, ScribeResult};

/// OpenAI and Azure reject uploads above 25 MiB.
pub const OPENAI_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
/// Gemini caps inline request data at 20 MiB.
pub const GOOGLE_MAX_INLINE_BYTES: usize = 20 * 1024 * 1024;

pub const MIN_SAMPLE_RATE_HZ: u32 = 8_000;
pub const MAX_SAMPLE_RATE_HZ: u32 = 192_000;

/// Container/codec of an uploaded clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioEncoding {
    Wav,
    Mp3,
    Mp4,
    M4a,
    Mpeg,
    Mpga,
    Ogg,
    Webm,
    Flac,
    Aac,
    Aiff,
}

impl AudioEncoding {
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioEncoding::Wav => "audio/wav",
            AudioEncoding::Mp3 | AudioEncoding::Mpga => "audio/mpeg",
            AudioEncoding::Mpeg => "audio/mpeg",
            AudioEncoding::Mp4 => "audio/mp4",
            AudioEncoding::M4a => "audio/m4a",
            AudioEncoding::Ogg => "audio/ogg",
            AudioEncoding::Webm => "audio/webm",
            AudioEncoding::Flac => "audio/flac",
            AudioEncoding::Aac => "audio/aac",
            AudioEncoding::Aiff => "audio/aiff",
        }
    }

    /// File extension used when uploading as multipart.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioEncoding::Wav => "wav",
            AudioEncoding::Mp3 => "mp3",
            AudioEncoding::Mp4 => "mp4",
            AudioEncoding::M4a => "m4a",
            AudioEncoding::Mpeg => "mpeg",
            AudioEncoding::Mpga => "mpga",
            AudioEncoding::Ogg => "ogg",
            AudioEncoding::Webm => "webm",
            AudioEncoding::Flac => "flac",
            AudioEncoding::Aac => "aac",
            AudioEncoding::Aiff => "aiff",
        }
    }

    pub fn is_supported_by(&self, provider: ProviderKind) -> bool {
        match provider {
            ProviderKind::OpenAi | ProviderKind::Azure => {
                !matches!(self, AudioEncoding::Aac | AudioEncoding::Aiff)
            }
            ProviderKind::Google => true,
        }
    }

    /// Guess from a file name such as `visit-12.webm`.
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = path.rsplit_once('.')?.1;
        ext.parse().ok()
    }
}

impl fmt::Display for AudioEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for AudioEncoding {
    type Err = ScribeError;

    /// Accepts a short name, an extension (with or without dot) or a MIME type.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        let name = lowered
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .trim_start_matches('.');
        let name = name.strip_prefix("audio/").unwrap_or(name);

        let encoding = match name {
            "wav" | "wave" | "x-wav" | "vnd.wave" => AudioEncoding::Wav,
            "mp3" => AudioEncoding::Mp3,
            "mp4" => AudioEncoding::Mp4,
            "m4a" | "x-m4a" => AudioEncoding::M4a,
            "mpeg" => AudioEncoding::Mpeg,
            "mpga" => AudioEncoding::Mpga,
            "ogg" | "opus" => AudioEncoding::Ogg,
            "webm" => AudioEncoding::Webm,
            "flac" | "x-flac" => AudioEncoding::Flac,
            "aac" => AudioEncoding::Aac,
            "aiff" | "aif" | "x-aiff" => AudioEncoding::Aiff,
            _ => {
                return Err(ScribeError::invalid_format(format!(
                    "unsupported audio encoding \"{}\"",
                    s
                )))
            }
        };
        Ok(encoding)
    }
}

/// What is known about a clip without decoding it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDescriptor {
    pub encoding: AudioEncoding,
    pub sample_rate_hz: Option<u32>,
    pub duration_ms: Option<u64>,
}

/// One uploaded recording
#[derive(Clone)]
pub struct AudioClip {
    pub data: Vec<u8>,
    pub descriptor: AudioDescriptor,
}

impl fmt::Debug for AudioClip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioClip")
            .field("bytes", &self.data.len())
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

impl AudioClip {
    pub fn new(data: Vec<u8>, encoding: AudioEncoding) -> Self {
        Self {
            data,
            descriptor: AudioDescriptor {
                encoding,
                sample_rate_hz: None,
                duration_ms: None,
            },
        }
    }

    pub fn with_sample_rate(mut self, hz: u32) -> Self {
        self.descriptor.sample_rate_hz = Some(hz);
        self
    }

    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.descriptor.duration_ms = Some(ms);
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fill sample rate and duration from the WAV header when missing.
    ///
    /// Other containers are passed to the provider as they are.
    pub fn probe(mut self) -> ScribeResult<Self> {
        if self.descriptor.encoding != AudioEncoding::Wav || self.data.is_empty() {
            return Ok(self);
        }

        let reader = hound::WavReader::new(Cursor::new(&self.data))
            .map_err(|e| ScribeError::invalid_format(format!("malformed WAV audio: {}", e)))?;
        let spec = reader.spec();

        if self.descriptor.sample_rate_hz.is_none() {
            self.descriptor.sample_rate_hz = Some(spec.sample_rate);
        }
        if self.descriptor.duration_ms.is_none() && spec.sample_rate > 0 {
            let frames = u64::from(reader.duration());
            self.descriptor.duration_ms = Some(frames.saturating_mul(1000) / u64::from(spec.sample_rate));
        }
        Ok(self)
    }

    /// Checks that do not depend on the provider.
    pub fn validate(&self) -> ScribeResult<()> {
        if self.data.is_empty() {
            return Err(ScribeError::invalid_input("audio clip is empty"));
        }
        if let Some(rate) = self.descriptor.sample_rate_hz {
            if !(MIN_SAMPLE_RATE_HZ..=MAX_SAMPLE_RATE_HZ).contains(&rate) {
                return Err(ScribeError::invalid_input(format!(
                    "implausible sample rate {} Hz, expected {}..={} Hz",
                    rate, MIN_SAMPLE_RATE_HZ, MAX_SAMPLE_RATE_HZ
                )));
            }
        }
        Ok(())
    }

    pub fn validate_for(&self, provider: ProviderKind) -> ScribeResult<()> {
        let encoding = self.descriptor.encoding;
        if !encoding.is_supported_by(provider) {
            return Err(ScribeError::invalid_format(format!(
                "{} audio is not accepted by the {} provider",
                encoding, provider
            )));
        }

        let limit = max_upload_bytes(provider);
        if self.data.len() > limit {
            return Err(ScribeError::too_large(format!(
                "audio clip is {} bytes, the {} provider accepts at most {} bytes",
                self.data.len(),
                provider,
                limit
            )));
        }
        Ok(())
    }
}

pub fn max_upload_bytes(provider: ProviderKind) -> usize {
    match provider {
        ProviderKind::OpenAi | ProviderKind::Azure => OPENAI_MAX_UPLOAD_BYTES,
        ProviderKind::Google => GOOGLE_MAX_INLINE_BYTES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(sample_rate: u32, samples: usize) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..samples {
                writer.write_sample((i % 100) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_encoding_parse_variants() {
        assert_eq!("audio/webm;codecs=opus".parse::<AudioEncoding>().unwrap(), AudioEncoding::Webm);
        assert_eq!(".MP3".parse::<AudioEncoding>().unwrap(), AudioEncoding::Mp3);
        assert_eq!("audio/x-wav".parse::<AudioEncoding>().unwrap(), AudioEncoding::Wav);
        assert_eq!(AudioEncoding::from_path("dictation/visit.m4a"), Some(AudioEncoding::M4a));
        assert!("audio/midi".parse::<AudioEncoding>().unwrap_err().is_validation());
    }

    #[test]
    fn test_provider_support() {
        assert!(AudioEncoding::Aac.is_supported_by(ProviderKind::Google));
        assert!(!AudioEncoding::Aac.is_supported_by(ProviderKind::OpenAi));
        assert!(AudioEncoding::Webm.is_supported_by(ProviderKind::Azure));
    }

    #[test]
    fn test_probe_wav_header() {
        let clip = AudioClip::new(wav_bytes(16_000, 8_000), AudioEncoding::Wav)
            .probe()
            .unwrap();
        assert_eq!(clip.descriptor.sample_rate_hz, Some(16_000));
        assert_eq!(clip.descriptor.duration_ms, Some(500));
    }

    #[test]
    fn test_probe_rejects_garbage_wav() {
        let err = AudioClip::new(b"definitely not riff".to_vec(), AudioEncoding::Wav)
            .probe()
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_validate_empty_and_sample_rate() {
        assert!(AudioClip::new(Vec::new(), AudioEncoding::Mp3).validate().is_err());
        assert!(AudioClip::new(vec![1, 2, 3], AudioEncoding::Mp3)
            .with_sample_rate(4_000)
            .validate()
            .is_err());
        assert!(AudioClip::new(vec![1, 2, 3], AudioEncoding::Mp3)
            .with_sample_rate(44_100)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_upload_limit() {
        let clip = AudioClip::new(vec![0u8; GOOGLE_MAX_INLINE_BYTES + 1], AudioEncoding::Ogg);
        assert!(clip.validate_for(ProviderKind::OpenAi).is_ok());
        let err = clip.validate_for(ProviderKind::Google).unwrap_err();
        assert_eq!(error_common::CodedError::code(&err), "VALIDATION_1004");
    }
}
