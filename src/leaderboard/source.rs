use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One tracked leaderboard. Declaration order is the iteration order used
/// everywhere a deterministic source order is needed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceId {
    #[serde(rename = "arena_text")]
    ArenaText,
    #[serde(rename = "arena_vision")]
    ArenaVision,
    #[serde(rename = "arena_code")]
    ArenaCode,
    #[serde(rename = "vellum")]
    Vellum,
    #[serde(rename = "artificial_analysis")]
    ArtificialAnalysis,
    #[serde(rename = "llmstats")]
    LlmStats,
    #[serde(rename = "openrouter")]
    OpenRouter,
}

impl SourceId {
    pub const ALL: [SourceId; 7] = [
        SourceId::ArenaText,
        SourceId::ArenaVision,
        SourceId::ArenaCode,
        SourceId::Vellum,
        SourceId::ArtificialAnalysis,
        SourceId::LlmStats,
        SourceId::OpenRouter,
    ];

    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::ArenaText => "arena_text",
            Self::ArenaVision => "arena_vision",
            Self::ArenaCode => "arena_code",
            Self::Vellum => "vellum",
            Self::ArtificialAnalysis => "artificial_analysis",
            Self::LlmStats => "llmstats",
            Self::OpenRouter => "openrouter",
        }
    }
}

impl Display for SourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::ArenaText => "Arena (text)",
            Self::ArenaVision => "Arena (vision)",
            Self::ArenaCode => "Arena (code)",
            Self::Vellum => "Vellum",
            Self::ArtificialAnalysis => "Artificial Analysis",
            Self::LlmStats => "LLM Stats",
            Self::OpenRouter => "OpenRouter",
        };
        write!(f, "{display}")
    }
}

#[derive(Debug, Error)]
#[error("unknown leaderboard source: {0}")]
pub struct SourceParseError(pub String);

impl FromStr for SourceId {
    type Err = SourceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "arena_text" | "arena" | "lmarena_text" => Ok(Self::ArenaText),
            "arena_vision" | "lmarena_vision" => Ok(Self::ArenaVision),
            "arena_code" | "lmarena_code" => Ok(Self::ArenaCode),
            "vellum" => Ok(Self::Vellum),
            "artificial_analysis" | "artificialanalysis" | "aa" => Ok(Self::ArtificialAnalysis),
            "llmstats" | "llm_stats" | "zeroeval" => Ok(Self::LlmStats),
            "openrouter" | "open_router" => Ok(Self::OpenRouter),
            _ => Err(SourceParseError(s.to_string())),
        }
    }
}
