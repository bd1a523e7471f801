//! # Risk Scoring
//!
//! Additive, explainable scoring. Each present factor contributes a fixed
//! weight; the total maps onto a [`RiskLevel`].

use super::types::{AuditCategory, RiskLevel};
use crate::constants::audit::{
    RISK_CRITICAL_SCORE, RISK_FAILURE_COUNT, RISK_HIGH_SCORE, RISK_LOW_SCORE, RISK_MEDIUM_SCORE,
};

const BOT_AGENT_MARKERS: &[&str] = &[
    "bot",
    "crawler",
    "spider",
    "scraper",
    "curl",
    "wget",
    "python-requests",
];

/// Inputs that contribute to an event's risk
#[derive(Debug, Clone, Copy)]
pub struct RiskFactors<'a> {
    pub status_code: Option<u16>,
    pub action: &'a str,
    pub category: AuditCategory,
    pub user_agent: Option<&'a str>,
    /// Login failures from the same ip inside the trailing risk window
    pub recent_login_failures: usize,
}

pub fn is_bot_agent(user_agent: &str) -> bool {
    let lowered = user_agent.to_ascii_lowercase();
    BOT_AGENT_MARKERS.iter().any(|m| lowered.contains(m))
}

pub fn risk_score(factors: &RiskFactors<'_>) -> u32 {
    let mut score = 0;

    if let Some(code) = factors.status_code {
        if code >= 400 {
            score += 1;
        }
        if code >= 500 {
            score += 2;
        }
    }

    score += match factors.action {
        "login_failed" => 3,
        "unauthorized_access" => 4,
        "suspicious_activity" => 5,
        _ => 0,
    };

    score += match factors.category {
        AuditCategory::Security => 2,
        AuditCategory::Authentication => 1,
        _ => 0,
    };

    if factors.user_agent.is_some_and(is_bot_agent) {
        score += 2;
    }

    if factors.recent_login_failures > RISK_FAILURE_COUNT {
        score += 3;
    }

    score
}

pub fn risk_level_for_score(score: u32) -> RiskLevel {
    if score >= RISK_CRITICAL_SCORE {
        RiskLevel::Critical
    } else if score >= RISK_HIGH_SCORE {
        RiskLevel::High
    } else if score >= RISK_MEDIUM_SCORE {
        RiskLevel::Medium
    } else if score >= RISK_LOW_SCORE {
        RiskLevel::Low
    } else {
        RiskLevel::Minimal
    }
}

pub fn calculate_risk_level(factors: &RiskFactors<'_>) -> RiskLevel {
    risk_level_for_score(risk_score(factors))
}
