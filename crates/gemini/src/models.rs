//! Gemini model variants and published prices
//!
//! | Model | Input (per 1M tokens) | Output (per 1M tokens) |
//! |-------|----------------------|------------------------|
//! | gemini-1.5-flash | $0.075 | $0.30 |
//! | gemini-1.5-pro | $1.25 | $5.00 |
//! | gemini-2.5-flash-preview-05-20 | $0.15 | $0.60 |

use serde::Serialize;

/// Gemini models accepted by the extraction endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GeminiModel {
    /// Fast, cheap; the default
    #[default]
    Flash15,
    /// Higher accuracy on dense documents
    Pro15,
    /// Preview of the 2.5 flash generation
    Flash25Preview,
}

/// Model description served by the models endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub max_output_tokens: u32,
    pub input_cost_per_million: f64,
    pub output_cost_per_million: f64,
}

impl GeminiModel {
    pub const ALL: [Self; 3] = [Self::Flash15, Self::Pro15, Self::Flash25Preview];

    /// API model identifier
    #[inline]
    #[must_use = "returns Gemini model identifier"]
    pub const fn model_id(&self) -> &'static str {
        match self {
            Self::Flash15 => "gemini-1.5-flash",
            Self::Pro15 => "gemini-1.5-pro",
            Self::Flash25Preview => "gemini-2.5-flash-preview-05-20",
        }
    }

    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Flash15 => "Gemini 1.5 Flash",
            Self::Pro15 => "Gemini 1.5 Pro",
            Self::Flash25Preview => "Gemini 2.5 Flash (preview)",
        }
    }

    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Flash15 => "Fast and cost effective, good for most quotes",
            Self::Pro15 => "Slower, more accurate on long or scanned quotes",
            Self::Flash25Preview => "Newer flash model, preview quality",
        }
    }

    #[must_use]
    pub const fn max_output_tokens(&self) -> u32 {
        8192
    }

    /// Cost per 1M tokens (input, output).
    #[inline]
    #[must_use = "returns input/output token costs"]
    pub const fn cost_per_million(&self) -> (f64, f64) {
        match self {
            Self::Flash15 => (0.075, 0.30),
            Self::Pro15 => (1.25, 5.00),
            Self::Flash25Preview => (0.15, 0.60),
        }
    }

    /// Estimated API cost in USD
    #[inline]
    #[must_use = "calculates estimated API cost"]
    pub fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        let (input_rate, output_rate) = self.cost_per_million();
        (f64::from(input_tokens) * input_rate / 1_000_000.0)
            + (f64::from(output_tokens) * output_rate / 1_000_000.0)
    }

    #[must_use]
    pub fn info(&self) -> ModelInfo {
        let (input, output) = self.cost_per_million();
        ModelInfo {
            id: self.model_id(),
            name: self.display_name(),
            description: self.description(),
            max_output_tokens: self.max_output_tokens(),
            input_cost_per_million: input,
            output_cost_per_million: output,
        }
    }
}

impl std::fmt::Display for GeminiModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.model_id())
    }
}

impl std::str::FromStr for GeminiModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.trim().to_lowercase();
        let id = id.strip_prefix("models/").unwrap_or(&id);
        Self::ALL
            .into_iter()
            .find(|m| m.model_id() == id)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(Self::model_id).collect();
                format!(
                    "unknown Gemini model '{s}'. Valid options: {}",
                    valid.join(", ")
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_ids_round_trip() {
        for model in GeminiModel::ALL {
            assert_eq!(model.to_string().parse::<GeminiModel>().unwrap(), model);
        }
    }

    #[test]
    fn test_from_str_variants() {
        assert_eq!(
            "models/gemini-1.5-pro".parse::<GeminiModel>().unwrap(),
            GeminiModel::Pro15
        );
        assert_eq!(
            " Gemini-1.5-Flash ".parse::<GeminiModel>().unwrap(),
            GeminiModel::Flash15
        );
        let err = "gpt-4o".parse::<GeminiModel>().unwrap_err();
        assert!(err.contains("gemini-1.5-flash"));
    }

    #[test]
    fn test_default_model() {
        assert_eq!(GeminiModel::default().model_id(), "gemini-1.5-flash");
    }

    #[test]
    fn test_estimate_cost() {
        let cost = GeminiModel::Pro15.estimate_cost(1_000_000, 200_000);
        assert!((cost - 2.25).abs() < 1e-9);
        assert_eq!(GeminiModel::Flash15.estimate_cost(0, 0), 0.0);
    }

    #[test]
    fn test_info() {
        let info = GeminiModel::Flash25Preview.info();
        assert_eq!(info.id, "gemini-2.5-flash-preview-05-20");
        assert_eq!(info.max_output_tokens, 8192);
        assert!((info.output_cost_per_million - 0.60).abs() < 1e-9);
    }
}
