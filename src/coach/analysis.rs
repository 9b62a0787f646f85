use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ApplicationAnalysis, CareerCoach, ModelTier, Prompt, required};
use crate::error::CoachError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MentorMatch {
    pub name: String,
    #[serde(deserialize_with = "crate::coach::profile::clamped_score")]
    pub score: u8,
    pub reasoning: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NegotiationPrep {
    pub salary_range: String,
    pub tips: String,
}

const FIT_INSTRUCTION: &str = "You are an expert career analyst and senior technical recruiter. \
Compare a resume against a job description and give honest, constructive feedback as JSON.";

const MENTOR_INSTRUCTION: &str = "You are an expert academic advisor AI. \
You match a student's thesis topic to the faculty members best suited to supervise it.";

const NEGOTIATION_INSTRUCTION: &str = "You are a negotiation expert and salary negotiation coach. \
Use your search tool for current salary data.";

const QUANTIFY_INSTRUCTION: &str = "You are a Resume Impact Coach Agent.
- Read a project or work experience description and propose concrete metrics that would quantify its impact.
- For each metric, say how the user could measure or estimate it.
- Finish with two or three rewritten, metric-driven resume bullet points that start with strong action verbs.
- Output Markdown.";

impl CareerCoach {
    /// Scores how well `resume_text` fits `job_description`.
    pub async fn analyze_application_fit(
        &self,
        resume_text: &str,
        job_description: &str,
    ) -> Result<ApplicationAnalysis, CoachError> {
        let resume_text = required("resumeText", resume_text)?;
        let job_description = required("jobDescription", job_description)?;

        let prompt = Prompt::new(ModelTier::Pro, FIT_INSTRUCTION)
            .thinking(16_384)
            .schema(json!({
                "type": "OBJECT",
                "properties": {
                    "fitScore": {"type": "INTEGER"},
                    "gapAnalysis": {"type": "STRING"},
                    "keywordOptimization": {"type": "STRING"},
                    "impactEnhancer": {"type": "STRING"}
                },
                "required": ["fitScore", "gapAnalysis", "keywordOptimization", "impactEnhancer"]
            }));

        let message = format!(
            "**RESUME:**\n```\n{resume_text}\n```\n\n**JOB DESCRIPTION:**\n```\n{job_description}\n```\n\n\
Provide a comprehensive analysis with the following four components:\n\
1. fitScore: an integer from 0 to 100 representing the percentage match.\n\
2. gapAnalysis: a markdown bullet list of skills and experiences the job requires that are missing or under-emphasized.\n\
3. keywordOptimization: a markdown bullet list of job description keywords to add for ATS scans.\n\
4. impactEnhancer: a markdown bullet list of ways to make the experience bullets more impactful and metric-driven."
        );

        self.generate_json(&prompt, &message).await
    }

    /// Ranks faculty members by fit with a thesis topic, best first.
    pub async fn find_mentor_match(
        &self,
        thesis_topic: &str,
        faculty_list: &str,
    ) -> Result<Vec<MentorMatch>, CoachError> {
        let thesis_topic = required("thesisTopic", thesis_topic)?;
        let faculty_list = required("facultyList", faculty_list)?;

        let prompt = Prompt::new(ModelTier::Pro, MENTOR_INSTRUCTION).schema(json!({
            "type": "ARRAY",
            "items": {
                "type": "OBJECT",
                "properties": {
                    "name": {"type": "STRING", "description": "The full name of the faculty member."},
                    "score": {"type": "INTEGER", "description": "The match score from 0-100."},
                    "reasoning": {"type": "STRING", "description": "A brief explanation of why this faculty member is a good match."}
                },
                "required": ["name", "score", "reasoning"]
            }
        }));

        let message = format!(
            "**THESIS TOPIC / ABSTRACT:**\n```\n{thesis_topic}\n```\n\n**LIST OF FACULTY & BIOS:**\n```\n{faculty_list}\n```\n\n\
Identify the top 3-5 faculty members who are the best fit. For each, give a score (0-100) and a concise reasoning \
that references shared keywords or research interests. Order the results from the highest score to the lowest."
        );

        let mut matches: Vec<MentorMatch> = self.generate_json(&prompt, &message).await?;
        matches.sort_by(|a, b| b.score.cmp(&a.score));
        Ok(matches)
    }

    /// Looks up a salary range and negotiation tips for a role.
    pub async fn negotiation_prep(
        &self,
        job_title: &str,
        location: &str,
    ) -> Result<NegotiationPrep, CoachError> {
        let job_title = required("jobTitle", job_title)?;
        let location = required("location", location)?;

        let prompt = Prompt::new(ModelTier::Flash, NEGOTIATION_INSTRUCTION)
            .grounded()
            .schema(json!({
                "type": "OBJECT",
                "properties": {
                    "salaryRange": {"type": "STRING", "description": "e.g., '$85,000 - $110,000 per year'"},
                    "tips": {"type": "STRING", "description": "Markdown-formatted list of tips and phrases."}
                },
                "required": ["salaryRange", "tips"]
            }));

        let message = format!(
            "Find the average salary range for a **{job_title}** in **{location}**. Then provide a list of tips \
and go-to phrases for negotiating a higher salary or better benefits. Return a JSON object with \
\"salaryRange\" and \"tips\" (in markdown) as keys."
        );
        self.generate_json(&prompt, &message).await
    }

    /// Suggests metrics that quantify the impact of a project description.
    pub async fn quantify_impact(&self, project_description: &str) -> Result<String, CoachError> {
        let project_description = required("projectDescription", project_description)?;
        let prompt = Prompt::new(ModelTier::Pro, QUANTIFY_INSTRUCTION);
        self.generate(
            &prompt,
            &format!("Suggest metrics to quantify the impact of this work:\n\n{project_description}"),
        )
        .await
    }
}
