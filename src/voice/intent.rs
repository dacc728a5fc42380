use serde::Serialize;

use crate::location::{parse_combined, LocationIntent};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum VoiceCommand {
    Undo,
    Redo,
    ClearTags,
    Location(LocationIntent),
    /// Anything else becomes context for the next items.
    Tag(String),
    Ignored,
}

const UNDO_PHRASES: &[&str] = &["undo", "undo that", "scratch that", "go back", "oops"];
const REDO_PHRASES: &[&str] = &["redo", "redo that"];
const CLEAR_TAG_PHRASES: &[&str] = &["clear tags", "clear tag", "no tags", "no tag", "stop tagging"];
const LEAD_INS: &[&str] = &["go to ", "switch to ", "move to ", "open ", "now ", "next "];
const TAG_LEAD_INS: &[&str] = &["tag as ", "tagged ", "tag ", "tagging "];
const CONNECTORS: &[&str] = &["on", "in", "at", "and", "number"];

pub fn classify_transcript(transcript: &str) -> VoiceCommand {
    let spoken = transcript
        .trim()
        .trim_end_matches(['.', '!', '?', ','])
        .trim();
    if spoken.is_empty() {
        return VoiceCommand::Ignored;
    }

    let lowered = spoken.to_lowercase();
    if UNDO_PHRASES.contains(&lowered.as_str()) {
        return VoiceCommand::Undo;
    }
    if REDO_PHRASES.contains(&lowered.as_str()) {
        return VoiceCommand::Redo;
    }
    if CLEAR_TAG_PHRASES.contains(&lowered.as_str()) {
        return VoiceCommand::ClearTags;
    }

    if let Some(intent) = location_from(&lowered) {
        return VoiceCommand::Location(intent);
    }

    let tag = TAG_LEAD_INS
        .iter()
        .find_map(|lead| {
            let head = spoken.get(..lead.len())?;
            head.eq_ignore_ascii_case(lead)
                .then(|| spoken[lead.len()..].trim())
        })
        .unwrap_or(spoken);
    if tag.is_empty() {
        VoiceCommand::Ignored
    } else {
        VoiceCommand::Tag(tag.to_string())
    }
}

fn location_from(lowered: &str) -> Option<LocationIntent> {
    let without_lead = LEAD_INS
        .iter()
        .find_map(|lead| lowered.strip_prefix(lead))
        .unwrap_or(lowered);

    let cleaned: Vec<&str> = without_lead
        .split_whitespace()
        .filter(|word| !CONNECTORS.contains(word))
        .collect();
    parse_combined(&cleaned.join(" "))
}
