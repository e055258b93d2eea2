//! Age-profile message filtering.
//!
//! Lightweight keyword screening, gated by `guest.safety_enabled`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Fixed refusal returned for blocked messages.
pub const REFUSAL: &str = "Sorry, I can't assist with that.";

static PROFANITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(fuck|shit|bitch|bastard|asshole)\b").unwrap());
static SEXUAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(sex|porn|nude|explicit|erotic)\b").unwrap());
static GRAPHIC_VIOLENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(gore|decapitat\w*|dismember\w*|bloodbath)\b").unwrap());
static SELF_HARM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(kill myself|suicide|self-harm|cutting)\b").unwrap());
static HATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(nazi|white power|kill (jews|muslims|blacks))\b").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgeProfile {
    Kids,
    Teen,
    #[default]
    General,
}

impl AgeProfile {
    /// Maps the UI interaction mode label to an age profile.
    pub fn from_interaction_mode(mode: Option<&str>) -> Self {
        let key = mode.unwrap_or_default().trim().to_lowercase();
        if key.starts_with("young learner") {
            AgeProfile::Kids
        } else if key.starts_with("young adult") {
            AgeProfile::Teen
        } else {
            AgeProfile::General
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyVerdict {
    Allowed,
    Blocked { refusal: &'static str },
}

impl SafetyVerdict {
    pub fn is_blocked(&self) -> bool {
        matches!(self, SafetyVerdict::Blocked { .. })
    }
}

/// Screens a user message before any quota or upstream work.
pub fn pre_filter(message: &str, profile: AgeProfile) -> SafetyVerdict {
    let blocked = match profile {
        AgeProfile::Kids => [&PROFANITY, &SEXUAL, &GRAPHIC_VIOLENCE, &SELF_HARM, &HATE]
            .iter()
            .any(|re| re.is_match(message)),
        AgeProfile::Teen => [&SEXUAL, &GRAPHIC_VIOLENCE, &HATE, &SELF_HARM]
            .iter()
            .any(|re| re.is_match(message)),
        AgeProfile::General => HATE.is_match(message) || SELF_HARM.is_match(message),
    };

    if blocked {
        SafetyVerdict::Blocked { refusal: REFUSAL }
    } else {
        SafetyVerdict::Allowed
    }
}

/// Masks profanity in answers for the kids profile.
pub fn post_filter(answer: &str, profile: AgeProfile) -> String {
    match profile {
        AgeProfile::Kids => PROFANITY.replace_all(answer, "***").into_owned(),
        _ => answer.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interaction_mode_mapping() {
        assert_eq!(
            AgeProfile::from_interaction_mode(Some("Young Learner (6-10)")),
            AgeProfile::Kids
        );
        assert_eq!(
            AgeProfile::from_interaction_mode(Some("young adult")),
            AgeProfile::Teen
        );
        assert_eq!(
            AgeProfile::from_interaction_mode(Some("Master")),
            AgeProfile::General
        );
        assert_eq!(AgeProfile::from_interaction_mode(None), AgeProfile::General);
    }

    #[test]
    fn test_profiles_block_progressively() {
        let mild = "What the hell, that battle was a bloodbath";
        assert!(pre_filter(mild, AgeProfile::Kids).is_blocked());
        assert!(pre_filter(mild, AgeProfile::Teen).is_blocked());
        assert!(!pre_filter(mild, AgeProfile::General).is_blocked());

        let profane = "Damn bastard Octavian";
        assert!(pre_filter(profane, AgeProfile::Kids).is_blocked());
        assert!(!pre_filter(profane, AgeProfile::Teen).is_blocked());

        assert!(pre_filter("I want to kill myself", AgeProfile::General).is_blocked());
    }

    #[test]
    fn test_plain_question_allowed() {
        let verdict = pre_filter("How did you meet Julius Caesar?", AgeProfile::Kids);
        assert_eq!(verdict, SafetyVerdict::Allowed);
    }

    #[test]
    fn test_post_filter_masks_for_kids_only() {
        assert_eq!(
            post_filter("That bastard Octavian", AgeProfile::Kids),
            "That *** Octavian"
        );
        assert_eq!(
            post_filter("That bastard Octavian", AgeProfile::General),
            "That bastard Octavian"
        );
    }
}
