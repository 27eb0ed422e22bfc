//! Prompts for page analysis and cross-page summaries.
//!
//! All prompt text lives here so it can be reviewed and unit-tested without
//! a model in the loop. Callers override the page instruction through
//! [`crate::config::AnalysisConfig::instruction`]; the summary template is
//! fixed.

/// Default instruction sent with every page image.
pub const DOCUMENT_ANALYSIS_PROMPT: &str = r#"Analyze this declassified document image in detail:

1. DOCUMENT IDENTIFICATION:
   - Document type (memo, report, telegram, etc.)
   - Classification level (Top Secret, Secret, Confidential, etc.)
   - Document date and reference numbers
   - Originating agency or department

2. KEY ENTITIES:
   - All individuals mentioned (full names and positions if available)
   - Organizations, agencies, and departments
   - Locations mentioned (cities, countries, specific places)

3. SUBJECT MATTER:
   - Main topic or purpose of the document
   - Key events described or referenced
   - Connections to the investigation the document belongs to (if explicit)
   - Any mentioned dates of significance

4. INTELLIGENCE VALUE:
   - Notable facts or claims presented
   - Any redactions or apparent omissions
   - Connections to other known intelligence operations
   - Unusual or seemingly significant details

Format your response in clear sections using the categories above."#;

/// Placeholder in [`SUMMARY_PROMPT_TEMPLATE`] replaced by the joined page analyses.
pub const ALL_ANALYSIS_PLACEHOLDER: &str = "{all_analysis}";

/// Template for the single text-only summary call.
pub const SUMMARY_PROMPT_TEMPLATE: &str = r#"Create a comprehensive summary of this declassified document based on the following page-by-page analysis:

{all_analysis}

Your summary should:
1. Identify the document type, date, and originating agency
2. Explain the primary subject matter and purpose
3. List all key individuals mentioned and their roles
4. Highlight the most significant revelations or intelligence
5. Note any apparent redactions or missing information
6. Explain connections to the wider investigation
7. Identify any notable inconsistencies or areas requiring further research

Format your summary with clear headings and bullet points for key findings."#;

/// Short instruction for a quick look at a single image (`--quick`).
pub const QUICK_LOOK_PROMPT: &str = "What is this image?";

/// Embed the joined page analyses into the summary template.
pub fn summary_prompt(all_analysis: &str) -> String {
    SUMMARY_PROMPT_TEMPLATE.replace(ALL_ANALYSIS_PLACEHOLDER, all_analysis)
}
