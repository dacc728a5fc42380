//! Best-effort reading of speech transcripts. Deliberately loose; the
//! deterministic parsing lives in `location` and `quantity`.

mod intent;

pub use intent::{classify_transcript, VoiceCommand};
