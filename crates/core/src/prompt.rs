use serde::Deserialize;

use crate::{
    config::ReportMode,
    error::{CoachError, Result},
    types::{AnalysisReport, CaptionEntry, Profile},
};

static COACH_PERSONA: &str = r#"You are a world-class Brazilian Jiu-Jitsu coach reviewing a student's sparring footage.
Be precise and concrete. Always refer to moments in the video with "MM:SS" timestamps."#;

static ANALYSIS_REQUIREMENTS: &str = r#"ANALYSIS REQUIREMENTS:
1. Positional diagnosis: list the timing (MM:SS) of every major positional change, naming the guard or position.
2. Technical corrections: point out mistakes with timestamps (e.g. "hips rose at MM:SS", "lost the grip at MM:SS") and explain why they matter.
3. Favorite moves: show where the student had openings to set up their favorite moves.
4. Counters and next steps: propose transition chains in the form "if the opponent does X, counter with Y".
5. Drills: a concrete practice plan that fixes the mistakes seen in this video."#;

static CAPTION_FORMAT: &str = r#"OUTPUT: Return ONLY a JSON object with this structure:
{
  "captions": [
    { "timestamp": "MM:SS", "text": "Short on-screen caption (max 12 words)" }
  ],
  "report": "The full coaching report as markdown"
}

RULES:
- Captions must be in chronological order
- Use "H:MM:SS" only for videos longer than one hour
- Output ONLY the JSON, nothing else"#;

fn or_unspecified(value: &str) -> &str {
    let value = value.trim();
    if value.is_empty() {
        "Not specified"
    } else {
        value
    }
}

/// Build the system instruction and the user text for the first analysis.
///
/// Profile fields only ever land in the user text, never in the system
/// instruction.
pub fn build_analysis_prompt(profile: &Profile, mode: ReportMode) -> (String, String) {
    let mut system = format!("{}\n\n{}", COACH_PERSONA, ANALYSIS_REQUIREMENTS);
    if mode == ReportMode::Captioned {
        system.push_str("\n\n");
        system.push_str(CAPTION_FORMAT);
    }
    system.push_str(&format!(
        "\n\nIMPORTANT: Write ALL text in {} language.",
        or_unspecified(&profile.language)
    ));

    let user = format!(
        "USER PROFILE:\n\
         - Belt level: {}\n\
         - Who I am in the video: {}\n\
         - Favorite guards/moves: {}\n\
         - Specific focus/concerns: {}\n\n\
         Analyze the attached sparring video.",
        profile.belt,
        or_unspecified(&profile.identity),
        or_unspecified(&profile.favorite_moves),
        or_unspecified(&profile.concerns),
    );

    (system, user)
}

/// System instruction for follow-up questions about an analyzed video.
pub fn chat_system_instruction(profile: &Profile) -> String {
    format!(
        "{}\n\nYou already analyzed the attached video for a {} belt student. \
         Answer follow-up questions about it briefly and practically. \
         Reply in {} language.",
        COACH_PERSONA,
        profile.belt,
        or_unspecified(&profile.language)
    )
}

#[derive(Debug, Deserialize)]
struct RawCaption {
    timestamp: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct RawStructuredReport {
    #[serde(default)]
    captions: Vec<RawCaption>,
    report: String,
}

/// Remove a surrounding markdown code fence, if any.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

/// Parse the captioned-JSON variant. Nothing partial is salvaged: a response
/// that does not parse is an error carrying the raw text.
pub fn parse_structured(raw: &str, caption_duration_secs: f64) -> Result<AnalysisReport> {
    let parsed: RawStructuredReport = serde_json::from_str(strip_code_fence(raw)).map_err(|e| {
        CoachError::MalformedResponse {
            reason: format!("Failed to parse captioned report JSON: {}", e),
            raw: raw.to_string(),
        }
    })?;

    Ok(AnalysisReport::Structured {
        captions: parsed
            .captions
            .into_iter()
            .map(|c| CaptionEntry::from_raw(c.timestamp, c.text, caption_duration_secs))
            .collect(),
        report: parsed.report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BeltLevel;

    #[test]
    fn prompt_carries_profile_and_language() {
        let profile = Profile {
            belt: BeltLevel::Purple,
            favorite_moves: "De La Riva".into(),
            concerns: String::new(),
            identity: "blue gi".into(),
            language: "Japanese".into(),
        };

        let (system, user) = build_analysis_prompt(&profile, ReportMode::Plain);
        assert!(system.contains("Japanese language"));
        assert!(!system.contains("\"captions\""));
        assert!(user.contains("Belt level: Purple"));
        assert!(user.contains("De La Riva"));
        assert!(user.contains("Specific focus/concerns: Not specified"));
        assert!(user.contains("blue gi"));
    }

    #[test]
    fn captioned_mode_asks_for_json() {
        let (system, _) = build_analysis_prompt(&Profile::default(), ReportMode::Captioned);
        assert!(system.contains("\"captions\""));
    }

    #[test]
    fn parses_fenced_structured_report() {
        let raw = "```json\n{\"captions\":[{\"timestamp\":\"01:30\",\"text\":\"Sweep\"},{\"timestamp\":\"bad\",\"text\":\"?\"}],\"report\":\"R\"}\n```";

        let report = parse_structured(raw, 4.0).unwrap();
        let captions = report.captions();
        assert_eq!(report.report_text(), "R");
        assert_eq!(captions.len(), 2);
        assert_eq!(captions[0].start_secs, 90.0);
        assert_eq!(captions[1].start_secs, 0.0);
        assert_eq!(captions[1].end_secs(), 4.0);
    }

    #[test]
    fn unparseable_report_keeps_raw_text() {
        let err = parse_structured("Sorry, here is prose", 4.0).unwrap_err();
        assert_eq!(err.raw_response(), Some("Sorry, here is prose"));
    }
}
