//! One template per request type.
//!
//! A template supplies the role line of the system prompt, the task
//! sentence, and the parameter lines of the user prompt. Layout (section
//! order, headers, profile and history rendering) is shared and lives in the
//! parent module.

use gencache_core::request::{
    ChallengeParams, ChallengeVariationParams, DomainParams, EvaluationParams, FocusAreaParams,
    PersonalityParams,
};

/// The request-type-specific parts of a prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub role: &'static str,
    pub task: String,
    pub parameters: Vec<(&'static str, String)>,
}

pub fn render(params: &DomainParams) -> Template {
    match params {
        DomainParams::Challenge(p) => challenge(p),
        DomainParams::ChallengeVariation(p) => challenge_variation(p),
        DomainParams::Evaluation(p) => evaluation(p),
        DomainParams::Personality(p) => personality(p),
        DomainParams::FocusArea(p) => focus_area(p),
    }
}

fn challenge(p: &ChallengeParams) -> Template {
    let mut parameters = vec![("Focus area", p.focus_area.trim().to_string())];
    push_opt(&mut parameters, "Difficulty", p.difficulty.as_deref());
    push_opt(&mut parameters, "Challenge type", p.challenge_type.as_deref());
    push_opt(&mut parameters, "Topic", p.topic.as_deref());

    Template {
        role: "You design short, practical learning challenges about working with AI systems.",
        task: format!(
            "Create one new challenge in the focus area \"{}\". It must not repeat anything in the recent history.",
            p.focus_area.trim()
        ),
        parameters,
    }
}

fn challenge_variation(p: &ChallengeVariationParams) -> Template {
    let mut parameters = vec![
        ("Base challenge id", p.base_challenge_id.trim().to_string()),
        ("Variation", p.variation.trim().to_string()),
    ];
    push_opt(&mut parameters, "Difficulty", p.difficulty.as_deref());
    parameters.push(("Base challenge", p.base_challenge.trim().to_string()));

    Template {
        role: "You adapt existing learning challenges into fresh variations.",
        task: format!(
            "Rewrite the base challenge as a \"{}\" variation. Keep the learning goal, change the scenario.",
            p.variation.trim()
        ),
        parameters,
    }
}

fn evaluation(p: &EvaluationParams) -> Template {
    let mut parameters = vec![
        ("Challenge id", p.challenge_id.trim().to_string()),
        ("Challenge", p.challenge_prompt.trim().to_string()),
        ("Response", p.response.trim().to_string()),
    ];
    if !p.rubric.is_empty() {
        parameters.push(("Rubric", p.rubric.join("; ")));
    }

    Template {
        role: "You are a fair, specific evaluator of answers to learning challenges.",
        task: "Score the response from 0 to 100 and explain the score with concrete, actionable feedback."
            .to_string(),
        parameters,
    }
}

fn personality(p: &PersonalityParams) -> Template {
    let mut parameters = Vec::new();
    if !p.attitudes.is_empty() {
        parameters.push(("Attitudes", format_attitudes(&p.attitudes)));
    }
    push_opt(&mut parameters, "Focus", p.focus.as_deref());

    Template {
        role: "You describe how a person relates to AI, based on their attitude scores.",
        task: "Write personality insights grounded in the attitude scores. Each insight should be specific and non-judgmental."
            .to_string(),
        parameters,
    }
}

fn focus_area(p: &FocusAreaParams) -> Template {
    let mut parameters = vec![("Count", p.count.to_string())];
    if !p.attitudes.is_empty() {
        parameters.push(("Attitudes", format_attitudes(&p.attitudes)));
    }
    if !p.existing.is_empty() {
        parameters.push(("Already assigned", p.existing.join(", ")));
    }

    Template {
        role: "You recommend what a learner should practise next when working with AI.",
        task: format!(
            "Recommend exactly {} focus areas, each with a name and a one-sentence rationale. Do not repeat areas already assigned.",
            p.count
        ),
        parameters,
    }
}

fn push_opt(parameters: &mut Vec<(&'static str, String)>, label: &'static str, value: Option<&str>) {
    if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
        parameters.push((label, v.to_string()));
    }
}

pub(crate) fn format_attitudes(attitudes: &gencache_core::request::Attitudes) -> String {
    attitudes
        .iter()
        .map(|(name, score)| format!("{name}={score}"))
        .collect::<Vec<_>>()
        .join(", ")
}
