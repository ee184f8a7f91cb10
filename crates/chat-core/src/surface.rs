//! Chat surfaces.
//!
//! World building and arc building run the same session mechanics but keep
//! separate transcripts, storage namespaces and prompts.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the two chat surfaces of a project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    /// World-building chat.
    #[default]
    World,
    /// Story-arc chat.
    Arc,
}

impl Surface {
    /// Storage namespace for this surface's histories.
    #[must_use]
    pub const fn key_prefix(self) -> &'static str {
        match self {
            Self::World => "worldchat",
            Self::Arc => "arcchat",
        }
    }

    /// Topic used in fallback summaries.
    #[must_use]
    pub const fn topic(self) -> &'static str {
        match self {
            Self::World => "world-building discussion",
            Self::Arc => "story arc discussion",
        }
    }

    /// Opening message for a fresh session.
    #[must_use]
    pub fn greeting(self, project: &str) -> String {
        match self {
            Self::World => format!(
                "Welcome! I'm ready to help you build the world for \"{project}\".\n\n\
                 Let's discuss your world together. Tell me about:\n\n\
                 - The setting (time period, location, type of world)\n\
                 - Key locations and how they're connected\n\
                 - Important characters and their roles\n\
                 - Factions, religions, or political systems\n\
                 - Any unique rules, magic systems, or technology"
            ),
            Self::Arc => format!(
                "Welcome! I'm ready to help you plan story arcs for \"{project}\".\n\n\
                 Tell me about your arcs: the plot, the characters involved and \
                 how the episodes unfold. When we're done, ask me for an arc \
                 summary and I'll write it up in a structured format."
            ),
        }
    }

    /// Default instruction for artifact generation.
    #[must_use]
    pub const fn artifact_prompt(self) -> &'static str {
        match self {
            Self::World => WORLD_ARTIFACT_PROMPT,
            Self::Arc => ARC_ARTIFACT_PROMPT,
        }
    }
}

impl std::fmt::Display for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::World => f.write_str("world"),
            Self::Arc => f.write_str("arc"),
        }
    }
}

impl FromStr for Surface {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "world" => Ok(Self::World),
            "arc" | "arcs" => Ok(Self::Arc),
            other => Err(format!("unknown chat surface '{other}' (expected world or arc)")),
        }
    }
}

const WORLD_ARTIFACT_PROMPT: &str = r"Based on our conversation, write a structured world digest. Use this format:

=== WORLD DIGEST ===
overview: [setting, time period, technology and magic]
locations: [one line per location: name - description]
characters: [one line per character: name - role - key traits]
factions: [one line per faction: name - goals]
religions: [one line per religion: name - beliefs]
glossary: [one line per term: term - definition]

Include only what we actually discussed. Do not invent new details.";

const ARC_ARTIFACT_PROMPT: &str = r"Based on our conversation, please generate a complete structured arc summary. Use this EXACT format:

=== ARC SUMMARY ===

=== ARC ===
id: [unique_arc_id_lowercase]
title: [Arc title]
season: [season number]
arcNumber: [arc number within season]
episodeStart: [first episode number]
episodeEnd: [last episode number]
status: [planned/in_progress/complete]
description: [Arc description]
themes: [comma separated themes]
mainCharacters: [comma separated character_ids]
supportingCharacters: [comma separated character_ids]
primaryLocations: [comma separated location_ids]
resolution: [How the arc concludes]
cliffhanger: [Setup for next arc, or none]

PLOT BEATS (for each episode in the arc):
episode: [episode number]
beatTitle: [Beat title]
beatDescription: [What happens]
outcome: [Result of this beat]

Separate multiple arcs with empty lines and include every arc we discussed.";
