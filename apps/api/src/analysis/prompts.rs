// Prompts for the two analysis tasks. Placeholders are replaced before sending.

/// System prompt for CV analysis.
pub const CV_ANALYSIS_SYSTEM: &str = "You are an assistant specialised in reviewing software developers' CVs. \
    Return JSON that follows the provided schema exactly, written in French, with: \
    - summary: a concise 2 to 3 sentence overview of the CV's key points \
    - strengths: 3 to 5 main strengths \
    - weaknesses: 3 to 5 areas for improvement \
    - suggestions: 3 to 5 actionable recommendations to improve the CV. \
    Every item must be one short, precise sentence aimed at a technical application.";

/// CV analysis prompt template. Replace `{body_text}` before sending.
pub const CV_ANALYSIS_PROMPT_TEMPLATE: &str = "Analyse the following CV and fill in the requested schema.

CV:
{body_text}
";

/// System prompt for job-offer analysis.
pub const OFFER_ANALYSIS_SYSTEM: &str = "You are an expert in analysing technical job offers. \
    Read the offer and produce a structured analysis, written in French, that follows the provided schema exactly: \
    - summary: the offer in 2 to 3 concise sentences, no generic filler \
    - tech_stack: the technologies actually mentioned (at most 10) \
    - keywords: useful keywords for a candidate (at most 10), keeping the natural casing of domain terms \
    - seniority_level: the expected seniority (Junior, Intermediate, Senior, Lead, Staff, ...). \
    If a piece of information is missing, return an empty value rather than inventing content.";

/// Longest description sent to the model, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 6000;

const TRUNCATION_MARKER: &str = "[Text truncated to fit the context limit]";

pub fn cv_analysis_prompt(body_text: &str) -> String {
    CV_ANALYSIS_PROMPT_TEMPLATE.replace("{body_text}", body_text)
}

/// Builds the user message for a job offer: header fields, then the
/// (possibly truncated) description.
pub fn offer_analysis_prompt(
    title: &str,
    company_name: &str,
    location: Option<&str>,
    description: &str,
) -> String {
    let mut segments = vec!["Job offer to analyse:".to_string()];

    if !title.trim().is_empty() {
        segments.push(format!("Title: {title}"));
    }
    if !company_name.trim().is_empty() {
        segments.push(format!("Company: {company_name}"));
    }
    if let Some(location) = location.filter(|l| !l.trim().is_empty()) {
        segments.push(format!("Location: {location}"));
    }

    let description = description.trim();
    segments.push("Description:".to_string());
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        let truncated: String = description.chars().take(MAX_DESCRIPTION_CHARS).collect();
        segments.push(format!("{truncated}\n{TRUNCATION_MARKER}"));
    } else {
        segments.push(description.to_string());
    }

    segments.join("\n")
}
