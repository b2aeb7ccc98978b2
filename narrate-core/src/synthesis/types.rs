use serde::{Deserialize, Serialize};

/// Voices accepted by the speech endpoint
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::VariantArray,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Voice {
    #[default]
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Fable,
    Onyx,
    Nova,
    Sage,
    Shimmer,
    Verse,
}

/// Container format requested from the remote. Only used to pick the
/// `response_format` field and the artifact extension; bytes are never decoded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Opus,
    Aac,
    Flac,
    Wav,
    Pcm,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Opus => "opus",
            Self::Aac => "aac",
            Self::Flac => "flac",
            Self::Wav => "wav",
            Self::Pcm => "pcm",
        }
    }
}

/// Delivery adjustments relative to a neutral 1.0 baseline. Values above 1.0
/// mean faster, higher or louder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechOptions {
    #[serde(default)]
    pub speed: Option<f32>,
    #[serde(default)]
    pub pitch: Option<f32>,
    #[serde(default)]
    pub volume: Option<f32>,
}

impl SpeechOptions {
    /// Qualitative hints for each option that differs from neutral.
    pub fn hints(&self) -> Vec<String> {
        let mut hints = Vec::new();
        if let Some(hint) = describe(self.speed, "pace", "faster", "slower") {
            hints.push(hint);
        }
        if let Some(hint) = describe(self.pitch, "pitch", "higher", "lower") {
            hints.push(hint);
        }
        if let Some(hint) = describe(self.volume, "volume", "louder", "softer") {
            hints.push(hint);
        }
        hints
    }
}

const NEUTRAL_TOLERANCE: f32 = 0.05;

fn describe(value: Option<f32>, what: &str, above: &str, below: &str) -> Option<String> {
    let delta = value? - 1.0;
    if delta.abs() < NEUTRAL_TOLERANCE {
        return None;
    }

    let magnitude = match delta.abs() {
        d if d < 0.2 => "slightly",
        d if d < 0.5 => "noticeably",
        _ => "much",
    };
    let direction = if delta > 0.0 { above } else { below };
    Some(format!("Use a {magnitude} {direction} {what} than normal."))
}

/// Everything needed to synthesize one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: Voice,
    pub instructions: String,
    pub options: SpeechOptions,
}

impl SynthesisRequest {
    /// Style instructions with option hints appended.
    pub fn rendered_instructions(&self) -> String {
        let hints = self.options.hints();
        let base = self.instructions.trim();
        if hints.is_empty() {
            return base.to_string();
        }

        let hints = hints.join(" ");
        if base.is_empty() {
            hints
        } else {
            format!("{base} {hints}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(options: SpeechOptions) -> SynthesisRequest {
        SynthesisRequest {
            text: "hello".to_string(),
            voice: Voice::Nova,
            instructions: "Warm and friendly.".to_string(),
            options,
        }
    }

    #[test]
    fn test_neutral_options_leave_instructions_unchanged() {
        let req = request(SpeechOptions {
            speed: Some(1.0),
            pitch: Some(1.02),
            volume: None,
        });
        assert_eq!(req.rendered_instructions(), "Warm and friendly.");
    }

    #[test]
    fn test_direction_is_preserved() {
        let req = request(SpeechOptions {
            speed: Some(1.5),
            pitch: Some(0.9),
            volume: Some(1.3),
        });
        let rendered = req.rendered_instructions();
        assert!(rendered.starts_with("Warm and friendly."));
        assert!(rendered.contains("much faster pace"));
        assert!(rendered.contains("slightly lower pitch"));
        assert!(rendered.contains("noticeably louder volume"));
    }

    #[test]
    fn test_slower_and_softer() {
        let hints = SpeechOptions {
            speed: Some(0.7),
            pitch: None,
            volume: Some(0.4),
        }
        .hints();
        assert_eq!(
            hints,
            vec![
                "Use a noticeably slower pace than normal.".to_string(),
                "Use a much softer volume than normal.".to_string(),
            ]
        );
    }

    #[test]
    fn test_hints_without_base_instructions() {
        let mut req = request(SpeechOptions {
            speed: Some(1.1),
            ..Default::default()
        });
        req.instructions = "   ".to_string();
        assert_eq!(
            req.rendered_instructions(),
            "Use a slightly faster pace than normal."
        );
    }

    #[test]
    fn test_voice_parse_and_display() {
        assert_eq!("Coral".parse::<Voice>().unwrap(), Voice::Coral);
        assert_eq!(Voice::Shimmer.to_string(), "shimmer");
        assert!("robot".parse::<Voice>().is_err());
    }

    #[test]
    fn test_audio_format_extension() {
        assert_eq!(AudioFormat::default().extension(), "mp3");
        assert_eq!(AudioFormat::Wav.to_string(), "wav");
    }
}
