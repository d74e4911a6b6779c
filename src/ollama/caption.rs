//! LLM-powered caption, structure, and name generation
//!
//! Prompts follow the generator's captioning guidance: describe the sound,
//! not a story. Every output passes a cleanup pass that strips thinking
//! tags, quotes, and preambles, and anything still unusable makes the
//! caller fall back to static text.

use super::Client;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{info, warn};

const CAPTION_SYSTEM_PROMPT: &str = r#"You are a music production caption generator for an AI music model called ACE-Step.

Your job: given a genre, output ONE caption of 20-40 words that describes an instrumental track.

Caption rules (from ACE-Step documentation):
- Describe the SOUND, not a story. Focus on: instruments, timbre, effects, tempo, mood, production style.
- Be SPECIFIC: "warm Rhodes piano with gentle chorus effect" not just "piano"
- Name real instruments, effects, and techniques: "fingerpicked nylon guitar", "sidechain compression", "tape saturation", "spring reverb", "808 sub bass"
- Include tempo guidance: use BPM numbers (e.g. "72 BPM") or tempo words ("slow waltz", "uptempo groove")
- Include mood/atmosphere: "late night", "sunrise", "melancholic", "euphoric", "meditative"
- Reference production eras or styles when relevant: "70s analog warmth", "modern crisp mix", "lo-fi bedroom production"
- Vary the instrumentation: don't always use the same instruments for a genre
- Each caption MUST be meaningfully different from any previous caption

NEVER include:
- Lyrics, vocals, singing, or voice references (these are instrumentals)
- Song titles, artist names, or album references
- Explanations, preambles, quotes, or formatting
- The word "instrumental" (it's implied)

Output format: ONLY the caption text. Nothing else. No quotes. No bullet points. No "Here's a caption:". Just the raw caption.

/no_think"#;

const STRUCTURE_SYSTEM_PROMPT: &str = r#"You are a music structure planner for an AI music model called ACE-Step.

Given a genre and caption, generate section tags that describe the temporal progression of the track.

Rules:
- Output 3-5 section tags, each on its own line
- First line MUST be: [Instrumental]
- Each tag format: [Section Name - brief instrument/texture description]
- Section names: Intro, Theme, Build, Climax, Bridge, Breakdown, Outro (pick what fits)
- Descriptions should reference instruments/textures from the caption
- Create a natural arc: start gentle, build, resolve
- Keep each tag under 60 characters
- For short tracks (under 60s), use only 3 sections

NEVER include explanations, numbering, or anything outside the tags.

Example output:
[Instrumental]
[Intro - soft pad swells, vinyl crackle fades in]
[Theme - piano melody enters over warm bass]
[Build - drums layer in, strings rise]
[Outro - piano solo, gentle fade]

/no_think"#;

const NAME_SYSTEM_PROMPT: &str = r#"You are a track name generator for an AI radio station.

Given a genre and a music caption, generate a short evocative track name (2-4 words).

Rules:
- Names should feel like real instrumental track titles
- Evocative and atmospheric, not literal
- No genre name in the title (don't say "Jazz Ballad" for jazz)
- No numbers, no "Track 1", no "Untitled"
- Lowercase only

Output ONLY the track name. Nothing else.

/no_think"#;

/// Generates unique captions, structure tags, and names per track.
pub struct CaptionGenerator {
    client: Client,
    /// genre -> last caption used, to steer the model away from repeats.
    last_caption: Mutex<HashMap<String, String>>,
}

impl CaptionGenerator {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            last_caption: Mutex::new(HashMap::new()),
        }
    }

    /// A fresh caption for a genre, or `None` when the model fails or the
    /// output is unusable (caller falls back to the static caption).
    pub async fn generate_caption(&self, genre: &str) -> Option<String> {
        let previous = self
            .last_caption
            .lock()
            .ok()
            .and_then(|m| m.get(genre).cloned());

        let mut prompt = format!("Genre: {genre}");
        if let Some(previous) = previous {
            prompt.push_str(&format!("\nPrevious caption (do NOT repeat this): {previous}"));
        }

        let caption = match self.client.generate(CAPTION_SYSTEM_PROMPT, &prompt).await {
            Ok(raw) => clean_output(&raw),
            Err(e) => {
                warn!("ollama caption generation failed: {e}");
                return None;
            }
        };

        if caption.len() < 15 {
            warn!("ollama returned unusable caption: {caption:?}");
            return None;
        }

        if let Ok(mut m) = self.last_caption.lock() {
            m.insert(genre.to_string(), caption.clone());
        }

        info!("llm caption [{genre}]: {caption}");
        Some(caption)
    }

    /// Section tags for the lyrics field, or `None` on anything unusable
    /// (caller falls back to plain `[Instrumental]`).
    pub async fn generate_structure(&self, genre: &str, caption: &str) -> Option<String> {
        let prompt = format!("Genre: {genre}\nCaption: {caption}");

        let mut raw = match self.client.generate(STRUCTURE_SYSTEM_PROMPT, &prompt).await {
            Ok(raw) => clean_output(&raw),
            Err(e) => {
                warn!("ollama structure generation failed: {e}");
                return None;
            }
        };

        if !raw.contains("[Instrumental]") {
            raw = format!("[Instrumental]\n{raw}");
        }

        // Require at least one real section tag besides [Instrumental].
        let tag_count = raw.matches('[').count();
        if tag_count < 2 || raw.len() > 500 {
            warn!("ollama returned unusable structure: {raw:?}");
            return None;
        }

        info!("llm structure [{genre}]: {}", raw.replace('\n', " | "));
        Some(raw)
    }

    /// An evocative track name, or `None` on failure (caller falls back to
    /// the deterministic namer).
    pub async fn generate_name(&self, genre: &str, caption: &str) -> Option<String> {
        let prompt = format!("Genre: {genre}\nCaption: {caption}");

        let name = match self.client.generate(NAME_SYSTEM_PROMPT, &prompt).await {
            Ok(raw) => clean_output(&raw).to_lowercase(),
            Err(e) => {
                warn!("ollama name generation failed: {e}");
                return None;
            }
        };

        if name.is_empty() || name.len() > 60 || name.matches(' ').count() > 4 {
            warn!("ollama returned unusable name: {name:?}");
            return None;
        }

        Some(name)
    }
}

/// Strip common LLM artifacts: thinking tags, surrounding quotes, preambles.
fn clean_output(s: &str) -> String {
    let mut s = s.trim().to_string();

    // Thinking-mode leakage: drop everything up to the closing tag.
    if let Some(idx) = s.find("</think>") {
        s = s[idx + "</think>".len()..].trim().to_string();
    }

    // Surrounding quotes
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        s = s[1..s.len() - 1].to_string();
    }

    // Common preambles
    for prefix in [
        "here's a caption:",
        "here is a caption:",
        "caption:",
        "here's the caption:",
    ] {
        if s.to_lowercase().starts_with(prefix) {
            s = s[prefix.len()..].trim().to_string();
        }
    }

    s.trim().to_string()
}
