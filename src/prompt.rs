//! Generation settings and prompt composition.

use std::path::Path;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};

const DEFAULT_PROMPT: &str = concat!(
    "masterpiece, best quality, highly detailed anime style, ",
    "((red christmas hat:2.2)), ((wearing santa hat:2.2)), ",
    "((perfect christmas hat placement on head:2.0)), ",
    "((christmas themed:1.8)), ((fluffy white trim:1.8)), ",
    "((santa costume accessories:1.7)), ((holiday spirit:1.7)), ",
    "((anime style:1.8)), ((beautiful detailed anime illustration:1.6)), ",
    "((professional digital anime artwork:1.6)), ((detailed anime face:1.7)), ",
    "((clean sharp anime lineart:1.5)), ((anime character design:1.6)), ",
    "((perfect anime aesthetics:1.6)), ((high quality anime art:1.7)), ",
    "((detailed normal hands:1.4)), ((five fingers:1.3)), ",
    "((anatomically correct hands:1.4)), ((natural hand pose:1.3)), ",
    "((clear hand details)), ((proper finger proportions)), ",
    "((Studio Ghibli style:1.5)), ((Hayao Miyazaki style:1.5)), ",
    "precise facial features, soft detailed lighting, ",
    "perfect composition, ((vibrant anime colors:1.4)), ((cel shading:1.4)), ",
    "((high quality anime face:1.6)), ((detailed anime eyes:1.5)), ",
    "((maintain character's identity:1.4)), ",
    "((japanese animation style:1.5)), ((authentic anime aesthetic:1.5))",
);

const DEFAULT_NEGATIVE_PROMPT: &str = concat!(
    "realistic, photorealistic, 3d, western art style, ",
    "semi-realistic, realistic details, photographic, real life, ",
    "western comic style, cartoon style, non-anime style, ",
    "missing fingers, extra fingers, fused fingers, ",
    "malformed hands, distorted hands, extra hands, missing hands, ",
    "wrong hand proportions, bad hand anatomy, mutated hands, ",
    "((poorly drawn hands)), deformed fingers, long fingers, ",
    "twisted fingers, broken fingers, disconnected fingers, ",
    "missing hat, no hat, hat missing, incomplete hat, ",
    "deformed hat, floating hat, unrealistic hat placement, ",
    "wrong hat position, multiple hats, poorly drawn hat, ",
    "oversized hat, tiny hat, damaged hat, ",
    "oil painting, watercolor, low quality, blurry, ",
    "noise, grainy, deformed face, distorted features, ",
    "bad anatomy, wrong proportions, amateur, text, ",
    "watermark, signature, cropped, oversaturated, ",
    "bad art, poorly drawn, ugly, duplicate, morbid, ",
    "extra limbs, gross proportions, malformed limbs, ",
    "missing arms, missing legs",
);

/// Settings sent to the generation service alongside the source image.
///
/// Field names match the upstream form fields.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    /// Positive prompt
    pub prompt: String,
    /// Negative prompt
    pub negative_prompt: String,
    /// How far the result may drift from the source, 0.0 to 1.0
    pub strength: f64,
    /// Denoising steps, at least one
    pub num_inference_steps: u32,
    /// Classifier-free guidance scale
    pub guidance_scale: f64,
    /// Upstream generation mode
    pub mode: String,
    /// Upstream model identifier
    pub model: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
            strength: 0.8,
            num_inference_steps: 50,
            guidance_scale: 9.0,
            mode: "image-to-image".to_string(),
            model: "sd3-large".to_string(),
        }
    }
}

impl GenerationConfig {
    /// Loads a JSON override file. Fields left out keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the numeric fields are within what the upstream accepts.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(0.0..=1.0).contains(&self.strength) {
            return Err(anyhow!(
                "strength must be between 0 and 1, got {}",
                self.strength
            ));
        }
        if self.num_inference_steps == 0 {
            return Err(anyhow!("num_inference_steps must be at least 1"));
        }
        if !self.guidance_scale.is_finite() {
            return Err(anyhow!("guidance_scale must be a finite number"));
        }
        Ok(())
    }

    /// Builds the effective settings for one request.
    ///
    /// A non-empty fragment is appended to the prompt after `", "`; everything
    /// else is copied as is.
    pub fn compose(&self, fragment: Option<&str>) -> Self {
        match fragment.filter(|fragment| !fragment.is_empty()) {
            Some(fragment) => Self {
                prompt: format!("{}, {}", self.prompt, fragment),
                ..self.clone()
            },
            None => self.clone(),
        }
    }

    /// Form fields in the order they are submitted upstream.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("mode", self.mode.clone()),
            ("model", self.model.clone()),
            ("prompt", self.prompt.clone()),
            ("negative_prompt", self.negative_prompt.clone()),
            ("strength", self.strength.to_string()),
            ("num_inference_steps", self.num_inference_steps.to_string()),
            ("guidance_scale", self.guidance_scale.to_string()),
        ]
    }
}
