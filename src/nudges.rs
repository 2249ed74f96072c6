//! User-facing nudges
//!
//! The engine never produces free text through a model itself. It assembles
//! a [`NudgeContext`] that an external [`NudgeGenerator`] may turn into a
//! message, and falls back to a static template table keyed by zone and
//! language when no generator is available or it fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::anomaly::{alert_context, Alert, AlertSeverity, AlertType};
use crate::projection::{TrendAnalysis, TrendDirection};
use crate::types::{ComponentScores, Metric};
use crate::zones::{classify_zone, Zone, ZoneInfo, ZoneTransition};

/// Message language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Pidgin,
    Yoruba,
    Igbo,
    Hausa,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::English,
        Language::Pidgin,
        Language::Yoruba,
        Language::Igbo,
        Language::Hausa,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Pidgin => "pidgin",
            Language::Yoruba => "yoruba",
            Language::Igbo => "igbo",
            Language::Hausa => "hausa",
        }
    }

    /// Short language code
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Pidgin => "pcm",
            Language::Yoruba => "yo",
            Language::Igbo => "ig",
            Language::Hausa => "ha",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    /// Accepts either the name or the short code
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Language::ALL
            .into_iter()
            .find(|l| l.as_str() == needle || l.code() == needle)
            .ok_or_else(|| format!("unsupported language: {}", s))
    }
}

static GREEN_EN: &[&str] = &[
    "🟢 You're thriving! Your heart is in great shape right now. Keep doing what you're doing.",
    "🟢 Looking good! Your vitals are steady and relaxed. Keep up the healthy rhythm.",
];
static YELLOW_EN: &[&str] = &[
    "🟡 Your body is showing mild strain. A short break and a few slow breaths will help.",
    "🟡 A little stress is showing up. Step away for five minutes and sip some water.",
];
static ORANGE_EN: &[&str] = &[
    "🟠 Your heart is working hard right now. Take a break, breathe deeply and drink some water.",
];
static RED_EN: &[&str] = &[
    "🔴 Your heart is under heavy strain. Stop what you're doing and rest now. Get help if you feel unwell.",
];

static GREEN_PCM: &[&str] = &["🟢 Your body dey kampe! Your heart dey work well well. Continue like this o."];
static YELLOW_PCM: &[&str] = &["🟡 Your body dey feel small stress. Take small break, breathe slowly."];
static ORANGE_PCM: &[&str] = &["🟠 Your heart dey work too hard now o. Stop small, rest, drink water."];
static RED_PCM: &[&str] = &[
    "🔴 Abeg stop wetin you dey do now now! Your heart need rest. If you no feel well, call for help.",
];

/// Fallback templates for a zone in a language, if that language has any
pub fn fallback_templates(zone: Zone, language: Language) -> Option<&'static [&'static str]> {
    let table = match (zone, language) {
        (Zone::Green, Language::English) => GREEN_EN,
        (Zone::Yellow, Language::English) => YELLOW_EN,
        (Zone::Orange, Language::English) => ORANGE_EN,
        (Zone::Red, Language::English) => RED_EN,
        (Zone::Green, Language::Pidgin) => GREEN_PCM,
        (Zone::Yellow, Language::Pidgin) => YELLOW_PCM,
        (Zone::Orange, Language::Pidgin) => ORANGE_PCM,
        (Zone::Red, Language::Pidgin) => RED_PCM,
        _ => return None,
    };
    Some(table)
}

/// Pick a fallback message; languages without templates use English.
///
/// `variant` rotates through the available templates.
pub fn fallback_message(zone: Zone, language: Language, variant: usize) -> &'static str {
    let templates = fallback_templates(zone, language)
        .or_else(|| fallback_templates(zone, Language::English))
        .unwrap_or(RED_EN);
    templates[variant % templates.len()]
}

pub fn zone_title(zone: Zone) -> &'static str {
    match zone {
        Zone::Green => "You're Thriving!",
        Zone::Yellow => "Time for a Short Break",
        Zone::Orange => "Slow Down and Recover",
        Zone::Red => "Rest Now",
    }
}

pub fn default_action(zone: Zone) -> &'static str {
    match zone {
        Zone::Green => "Maintain your current routine",
        Zone::Yellow => "Take a 5-minute break and breathe slowly",
        Zone::Orange => "Rest for 15-30 minutes and drink water",
        Zone::Red => "Stop all activity and rest. Seek help if symptoms persist",
    }
}

fn severity_emoji(severity: AlertSeverity) -> &'static str {
    match severity {
        AlertSeverity::Critical => "🔴",
        AlertSeverity::Urgent => "🟠",
        AlertSeverity::Warning => "🟡",
        AlertSeverity::Info => "🟢",
    }
}

/// Short message for a single alert
pub fn alert_message(alert: &Alert, language: Language) -> String {
    let emoji = severity_emoji(alert.severity);
    match (alert.alert_type, language) {
        (AlertType::Spo2Critical, _) => {
            let spo2 = alert.detail_f64("spo2").unwrap_or_default();
            format!(
                "🔴 Your blood oxygen is low ({:.0}%). Sit upright, breathe slowly and seek medical help if it stays low.",
                spo2
            )
        }
        (AlertType::HrvSuddenDrop, Language::Pidgin) => {
            format!("{} Your body dey show say stress dey. Rest small, breathe well.", emoji)
        }
        (AlertType::HrvSuddenDrop, _) => format!(
            "{} Your body is showing signs of stress. Take a few minutes to rest and breathe deeply.",
            emoji
        ),
        (AlertType::HrRapidIncrease, _) => format!(
            "{} Your heart rate is well above your resting level. Pause and rest until it settles.",
            emoji
        ),
        _ => format!("{} {}", emoji, alert.message),
    }
}

/// One-line nudge for a bare score
pub fn quick_nudge(score: f64, language: Language) -> &'static str {
    fallback_message(classify_zone(score), language, 0)
}

/// Structured summary handed to a message generator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NudgeContext {
    pub zone: ZoneInfo,
    pub components: Option<ComponentScores>,
    pub weakest_component: Option<Metric>,
    pub weakest_score: Option<f64>,
    pub transition: Option<ZoneTransition>,
    pub transition_message: Option<String>,
    pub primary_alert: Option<Alert>,
    pub requires_immediate_action: bool,
    pub trend: Option<TrendDirection>,
}

impl NudgeContext {
    pub fn assemble(
        score: f64,
        components: Option<&ComponentScores>,
        transition: Option<&ZoneTransition>,
        alerts: &[Alert],
        trend: Option<&TrendAnalysis>,
    ) -> Self {
        let weakest = components.map(|c| c.weakest());
        let alerts = alert_context(alerts);

        Self {
            zone: ZoneInfo::for_score(score),
            components: components.copied(),
            weakest_component: weakest.map(|(m, _)| m),
            weakest_score: weakest.map(|(_, s)| s),
            transition: transition.cloned(),
            transition_message: transition.and_then(|t| t.message()),
            primary_alert: alerts.primary_alert,
            requires_immediate_action: alerts.requires_immediate_action,
            trend: trend.map(|t| t.direction),
        }
    }
}

/// Message generation preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NudgeConfig {
    pub language: Language,
    pub include_emoji: bool,
    /// Characters
    pub max_length: usize,
    pub tone: String,
    pub include_action: bool,
}

impl Default for NudgeConfig {
    fn default() -> Self {
        Self {
            language: Language::English,
            include_emoji: true,
            max_length: 280,
            tone: "supportive".to_string(),
            include_action: true,
        }
    }
}

fn short_label(metric: Metric) -> &'static str {
    match metric {
        Metric::HeartRate => "Heart rate",
        Metric::Hrv => "HRV",
        Metric::Spo2 => "SpO2",
        Metric::Temperature => "Temperature",
    }
}

/// Render a context as a prompt for an external generator
pub fn build_prompt(ctx: &NudgeContext, config: &NudgeConfig) -> String {
    let mut lines = vec![
        format!(
            "Write a short {} health nudge for someone wearing a heart monitor.",
            config.tone
        ),
        format!(
            "Zone: {} ({})",
            ctx.zone.zone.as_str().to_uppercase(),
            ctx.zone.metadata.label
        ),
        format!("Score: {:.0}/100", ctx.zone.score),
    ];

    if let Some(components) = &ctx.components {
        for (metric, component) in components.iter() {
            lines.push(format!("{} score: {:.0}", short_label(metric), component.score));
        }
    }
    if let (Some(metric), Some(score)) = (ctx.weakest_component, ctx.weakest_score) {
        lines.push(format!("Weakest area: {} ({:.0})", short_label(metric), score));
    }
    if let Some(message) = &ctx.transition_message {
        lines.push(format!("Change: {}", message));
    }
    if let Some(alert) = &ctx.primary_alert {
        lines.push(format!("Most important alert: {}", alert.message));
    }
    if let Some(trend) = ctx.trend {
        lines.push(format!("Trend: {}", trend.as_str()));
    }

    lines.push(format!("Language: {}", config.language.as_str()));
    lines.push(format!("Maximum length: {} characters", config.max_length));
    if config.include_action {
        lines.push("End with one concrete action.".to_string());
    }
    if !config.include_emoji {
        lines.push("Do not use emoji.".to_string());
    }
    lines.join("\n")
}

/// Error returned by a generator
pub type GeneratorError = Box<dyn std::error::Error + Send + Sync>;

/// External natural-language generator
pub trait NudgeGenerator {
    /// Name recorded in [`Nudge::generated_by`]
    fn name(&self) -> &str;

    fn generate(&self, prompt: &str, ctx: &NudgeContext) -> Result<String, GeneratorError>;
}

/// A message ready for delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nudge {
    pub message: String,
    pub title: String,
    pub action: Option<String>,
    pub zone: Zone,
    pub language: Language,
    pub generated_by: String,
    pub created_at: DateTime<Utc>,
}

impl Nudge {
    /// Chat-app formatting with bold markers
    pub fn to_chat_text(&self) -> String {
        let mut text = format!("*{}*\n\n{}", self.title, self.message);
        if let Some(action) = &self.action {
            text.push_str(&format!("\n\n👉 *Action:* {}", action));
        }
        text
    }
}

fn strip_emoji(message: &str) -> &str {
    match message.split_once(' ') {
        Some((head, rest)) if !head.chars().any(char::is_alphanumeric) => rest,
        _ => message,
    }
}

fn truncate_chars(message: &str, max: usize) -> String {
    if message.chars().count() <= max {
        return message.to_string();
    }
    if max < 3 {
        return ".".repeat(max);
    }
    let mut out: String = message.chars().take(max - 3).collect();
    out.push_str("...");
    out
}

/// Build a nudge, preferring the generator and falling back to templates.
///
/// An alert requiring immediate action replaces the zone template in the
/// fallback path.
pub fn compose_nudge(
    ctx: &NudgeContext,
    config: &NudgeConfig,
    generator: Option<&dyn NudgeGenerator>,
) -> Nudge {
    let zone = ctx.zone.zone;

    let generated = generator.and_then(|g| {
        let prompt = build_prompt(ctx, config);
        match g.generate(&prompt, ctx) {
            Ok(text) if !text.trim().is_empty() => Some((text.trim().to_string(), g.name().to_string())),
            Ok(_) => {
                warn!(generator = g.name(), "generator returned empty nudge, using fallback");
                None
            }
            Err(e) => {
                warn!(generator = g.name(), error = %e, "nudge generation failed, using fallback");
                None
            }
        }
    });

    let (message, generated_by) = match generated {
        Some(pair) => pair,
        None => {
            let text = match &ctx.primary_alert {
                Some(alert) if ctx.requires_immediate_action => alert_message(alert, config.language),
                _ => fallback_message(zone, config.language, 0).to_string(),
            };
            (text, "fallback".to_string())
        }
    };

    let message = if config.include_emoji {
        message
    } else {
        strip_emoji(&message).to_string()
    };

    debug!(zone = %zone, generated_by = %generated_by, "nudge composed");

    Nudge {
        message: truncate_chars(&message, config.max_length),
        title: zone_title(zone).to_string(),
        action: config
            .include_action
            .then(|| default_action(zone).to_string()),
        zone,
        language: config.language,
        generated_by,
        created_at: Utc::now(),
    }
}
