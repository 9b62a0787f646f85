//! Tailored resume and cover-letter generation, plus resume import.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{
    Achievement, ApplicationAnalysis, CareerCoach, CustomSection, Education, Experience,
    ExperienceLevel, Language, ModelTier, NamedItem, ProfileData, ProfileUpdate, Proficiency,
    Project, Prompt, profile_to_markdown, required,
};
use crate::error::CoachError;

const MIN_RESUME_CHARS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationOptions {
    pub job_description: String,
    pub generate_resume: bool,
    pub generate_cover_letter: bool,
    pub resume_length: String,
    pub cover_letter_length: String,
    pub include_summary: bool,
    /// 0 is formal, 100 is casual.
    pub tone: u8,
    /// 0 is general, 100 is expert.
    pub technicality: u8,
    /// Use the pro model with a large thinking budget.
    pub thinking_mode: bool,
    pub uploaded_resume: Option<String>,
    pub uploaded_cover_letter: Option<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            job_description: String::new(),
            generate_resume: true,
            generate_cover_letter: true,
            resume_length: "1 page max".to_string(),
            cover_letter_length: "3-4 paragraphs".to_string(),
            include_summary: true,
            tone: 50,
            technicality: 50,
            thinking_mode: false,
            uploaded_resume: None,
            uploaded_cover_letter: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratedContent {
    pub resume: Option<String>,
    pub cover_letter: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub documents: GeneratedContent,
    pub analysis: Option<ApplicationAnalysis>,
}

const DOCUMENTS_INSTRUCTION: &str = "You are an expert career consultant and writer, tasked with \
creating tailored application documents. Synthesize the provided information to generate the best \
possible resume and/or cover letter.";

const PARSING_INSTRUCTION: &str = "You are an expert data extraction system. \
Your primary goal is completeness.";

const PARSING_DETAILS: &str = "- Understand the source language but translate all extracted data into English.
- Logically infer information that isn't explicitly stated. A reasonable guess is better than a blank field.
- Scour the entire document. Skills and other details are often scattered across multiple sections.
- If data for a field is truly missing, use an empty string or an empty array. Never omit keys.

Parsing rules:
- Contact information: find email, phone, linkedin and github URLs.
- Experience: extract every job with company, title, location, dates and bullet achievements.
- Education: extract institution, degree, field of study, and normalize dates.
- Projects: capture name, description, URL and normalized dates.
- Skills: infer technical skills, tools and soft skills from across the resume.

Target role and style inference:
- targetJobTitle: the logical next role based on experience.
- industry: the primary industry of the resume.
- experienceLevel: 'internship', 'entry', 'mid', 'senior' or 'executive'.
- keySkillsToHighlight: 5-7 critical skills as a comma-separated string.
- vibe: a short phrase describing the resume's tone.

Do not read across multi-column layouts. Ignore headers, footers and repeated noise.";

impl CareerCoach {
    /// Writes a resume and/or cover letter tailored to the job description.
    ///
    /// When a resume is generated or uploaded, an application-fit analysis
    /// runs first. A failed analysis is logged and reported as `None`.
    pub async fn generate_documents(
        &self,
        profile: &ProfileData,
        options: &GenerationOptions,
    ) -> Result<GenerationResult, CoachError> {
        let job_description = required("jobDescription", &options.job_description)?;
        if !options.generate_resume && !options.generate_cover_letter {
            return Err(CoachError::invalid_input(
                "Select at least one document to generate.",
            ));
        }

        let analysis = self.analysis_for(profile, options, job_description).await;

        let base = if options.thinking_mode {
            Prompt::new(ModelTier::Pro, DOCUMENTS_INSTRUCTION).thinking(32_768)
        } else {
            Prompt::new(ModelTier::Flash, DOCUMENTS_INSTRUCTION)
        };
        let prompt = base.schema(json!({
            "type": "OBJECT",
            "properties": {
                "resume": {"type": "STRING", "description": "The full resume content in Markdown format. Null if not requested."},
                "coverLetter": {"type": "STRING", "description": "The full cover letter content in Markdown format. Null if not requested."}
            },
            "required": ["resume", "coverLetter"]
        }));

        let message = documents_message(profile, options, job_description);
        let generated: GeneratedContent = self.generate_json(&prompt, &message).await?;

        Ok(GenerationResult {
            documents: GeneratedContent {
                resume: non_empty(generated.resume),
                cover_letter: non_empty(generated.cover_letter),
            },
            analysis,
        })
    }

    async fn analysis_for(
        &self,
        profile: &ProfileData,
        options: &GenerationOptions,
        job_description: &str,
    ) -> Option<ApplicationAnalysis> {
        let uploaded = options
            .uploaded_resume
            .as_deref()
            .filter(|text| !text.trim().is_empty());
        if !options.generate_resume && uploaded.is_none() {
            return None;
        }

        let resume = match uploaded {
            Some(text) => text.to_string(),
            None => profile_to_markdown(profile, &profile.section_order()),
        };
        if resume.trim().is_empty() {
            return None;
        }

        match self.analyze_application_fit(&resume, job_description).await {
            Ok(analysis) => Some(analysis),
            Err(err) => {
                tracing::warn!(error = %err, "application_analysis_skipped");
                None
            }
        }
    }

    /// Extracts a partial profile from pasted resume text.
    pub async fn parse_resume(
        &self,
        resume_text: &str,
        tier: ModelTier,
    ) -> Result<ProfileUpdate, CoachError> {
        if resume_text.trim().chars().count() < MIN_RESUME_CHARS {
            return Err(CoachError::invalid_input(
                "The provided text is too short to be a valid resume.",
            ));
        }

        let mut prompt = Prompt::new(tier, PARSING_INSTRUCTION).schema(parsing_schema());
        if tier == ModelTier::Pro {
            prompt = prompt.thinking(32_768);
        }

        let message = format!(
            "Analyze the resume text below and populate the schema according to the instructions.\n\n\
---\n{resume_text}\n---\n\n{PARSING_DETAILS}"
        );
        let parsed: ParsedResume = self.generate_json(&prompt, &message).await?;
        Ok(parsed.into_update(&IdGen::new()))
    }
}

fn documents_message(
    profile: &ProfileData,
    options: &GenerationOptions,
    job_description: &str,
) -> String {
    let mut inspiration = String::new();
    if let Some(resume) = options.uploaded_resume.as_deref() {
        inspiration.push_str(&format!(
            "--- EXISTING RESUME (FOR STYLE REFERENCE ONLY) ---\n{resume}\n--- END EXISTING RESUME ---\n"
        ));
    }
    match options.uploaded_cover_letter.as_deref() {
        Some(letter) => inspiration.push_str(&format!(
            "--- EXISTING COVER LETTER (FOR STYLE REFERENCE ONLY) ---\n{letter}\n--- END EXISTING COVER LETTER ---\n"
        )),
        None if inspiration.is_empty() => {
            inspiration.push_str("No inspiration documents were provided.\n")
        }
        None => {}
    }

    let summary_rule = if options.include_summary {
        "REQUIRED"
    } else {
        "FORBIDDEN"
    };

    format!(
        "### Primary Inputs\n\n\
**1. Candidate Profile (JSON):**\n```json\n{profile_json}\n```\n\n\
**2. Target Job Description (Text):**\n```text\n{job_description}\n```\n\n\
**3. Stylistic Inspiration Documents (Text):**\n\
Use these ONLY to understand the candidate's writing style, tone and formatting preferences. \
DO NOT copy content directly.\n{inspiration}\n\
### Core Directives & Constraints\n\n\
- Analyze the job description, extract its key requirements, and weave the most relevant points \
from the candidate profile into the documents.\n\
- Every experience bullet MUST start with a strong action verb.\n\
- Quantify achievements with metrics wherever possible. If the profile lacks metrics, infer a realistic one.\n\
- Generate a resume: `{generate_resume}`\n\
- Generate a cover letter: `{generate_cover_letter}`\n\
- Overall Tone: `{tone}`.\n\
- Language Technicality (0=General, 100=Expert): `{technicality}`.\n\
- Candidate's Desired Vibe: \"{vibe}\". Embody this.\n\
- Resume Template Style: `{resume_template}`.\n\
- Resume Length: MUST NOT exceed `{resume_length}`.\n\
- Professional Summary: a summary section is `{summary_rule}`.\n\
- Cover Letter Template Style: `{cover_letter_template}`.\n\
- Cover Letter Length: keep it `{cover_letter_length}`.\n\
- Integrate skills into the cover letter narrative. DO NOT use a separate bulleted list of skills.\n\n\
### Final Output\n\n\
Return a single JSON object with the keys \"resume\" and \"coverLetter\", each holding the full \
document as one Markdown string. A document that was not requested MUST be null.",
        profile_json = profile.to_pretty_json(),
        generate_resume = options.generate_resume,
        generate_cover_letter = options.generate_cover_letter,
        tone = options.tone,
        technicality = options.technicality,
        vibe = profile.vibe,
        resume_template = profile.selected_resume_template,
        resume_length = options.resume_length,
        cover_letter_template = profile.selected_cover_letter_template,
        cover_letter_length = options.cover_letter_length,
    )
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

/// Fresh ids for imported profile entries.
struct IdGen {
    stamp: u64,
    next: AtomicU64,
}

impl IdGen {
    fn new() -> Self {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();
        Self {
            stamp,
            next: AtomicU64::new(1),
        }
    }

    fn id(&self, kind: &str) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{kind}-{:x}-{n}", self.stamp)
    }
}

/// The resume parser's wire shape. Lists of names arrive as plain strings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ParsedResume {
    full_name: String,
    job_title: String,
    email: String,
    phone: String,
    website: String,
    location: String,
    linkedin: String,
    github: String,
    summary: String,
    education: Vec<Education>,
    experience: Vec<ParsedExperience>,
    projects: Vec<Project>,
    technical_skills: Vec<String>,
    soft_skills: Vec<String>,
    tools: Vec<String>,
    languages: Vec<ParsedLanguage>,
    certifications: Vec<String>,
    interests: Vec<String>,
    custom_sections: Vec<ParsedCustomSection>,
    additional_information: String,
    industry: String,
    experience_level: String,
    target_job_title: String,
    company_keywords: String,
    key_skills_to_highlight: String,
    vibe: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ParsedExperience {
    company: String,
    title: String,
    location: String,
    start_date: String,
    end_date: String,
    achievements: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ParsedLanguage {
    name: String,
    proficiency: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ParsedCustomSection {
    title: String,
    items: Vec<String>,
}

impl ParsedResume {
    /// Blank scalars and empty lists are left out of the update so that an
    /// import never erases data the user already entered.
    fn into_update(self, ids: &IdGen) -> ProfileUpdate {
        let text = |value: String| Some(value).filter(|v| !v.trim().is_empty());
        let names = |values: Vec<String>, kind: &str, ids: &IdGen| {
            list(
                values
                    .into_iter()
                    .filter(|name| !name.trim().is_empty())
                    .map(|name| NamedItem {
                        id: ids.id(kind),
                        name,
                    })
                    .collect(),
            )
        };

        let experience = self
            .experience
            .into_iter()
            .map(|exp| Experience {
                id: ids.id("exp"),
                company: exp.company,
                title: exp.title,
                location: exp.location,
                start_date: exp.start_date,
                end_date: exp.end_date,
                achievements: exp
                    .achievements
                    .into_iter()
                    .map(|text| Achievement {
                        id: ids.id("ach"),
                        text,
                    })
                    .collect(),
            })
            .collect();

        let education = self
            .education
            .into_iter()
            .map(|edu| Education {
                id: ids.id("edu"),
                ..edu
            })
            .collect();

        let projects = self
            .projects
            .into_iter()
            .map(|project| Project {
                id: ids.id("proj"),
                ..project
            })
            .collect();

        let languages = self
            .languages
            .into_iter()
            .filter(|lang| !lang.name.trim().is_empty())
            .map(|lang| Language {
                id: ids.id("lang"),
                name: lang.name,
                proficiency: proficiency(&lang.proficiency),
            })
            .collect();

        let custom_sections = self
            .custom_sections
            .into_iter()
            .map(|section| CustomSection {
                id: ids.id("custom"),
                title: section.title,
                items: section
                    .items
                    .into_iter()
                    .map(|text| Achievement {
                        id: ids.id("item"),
                        text,
                    })
                    .collect(),
            })
            .collect();

        ProfileUpdate {
            full_name: text(self.full_name),
            job_title: text(self.job_title),
            email: text(self.email),
            phone: text(self.phone),
            website: text(self.website),
            location: text(self.location),
            linkedin: text(self.linkedin),
            github: text(self.github),
            summary: text(self.summary),
            education: list(education),
            experience: list(experience),
            projects: list(projects),
            technical_skills: names(self.technical_skills, "skill", ids),
            soft_skills: names(self.soft_skills, "soft", ids),
            tools: names(self.tools, "tool", ids),
            languages: list(languages),
            certifications: names(self.certifications, "cert", ids),
            interests: names(self.interests, "interest", ids),
            custom_sections: list(custom_sections),
            additional_information: text(self.additional_information),
            industry: text(self.industry),
            experience_level: experience_level(&self.experience_level),
            vibe: text(self.vibe),
            target_job_title: text(self.target_job_title),
            company_keywords: text(self.company_keywords),
            key_skills_to_highlight: text(self.key_skills_to_highlight),
        }
    }
}

fn list<T>(values: Vec<T>) -> Option<Vec<T>> {
    (!values.is_empty()).then_some(values)
}

fn proficiency(value: &str) -> Proficiency {
    match value.trim().to_ascii_lowercase().as_str() {
        "native" => Proficiency::Native,
        "fluent" => Proficiency::Fluent,
        "basic" => Proficiency::Basic,
        _ => Proficiency::Conversational,
    }
}

fn experience_level(value: &str) -> Option<ExperienceLevel> {
    serde_json::from_value(Value::String(value.trim().to_ascii_lowercase())).ok()
}

fn parsing_schema() -> Value {
    let string = json!({"type": "STRING"});
    let strings = json!({"type": "ARRAY", "items": {"type": "STRING"}});
    json!({
        "type": "OBJECT",
        "properties": {
            "fullName": string, "jobTitle": string, "email": string, "phone": string,
            "website": string, "location": string, "linkedin": string, "github": string,
            "summary": string,
            "education": {"type": "ARRAY", "items": {"type": "OBJECT", "properties": {
                "institution": string, "degree": string, "fieldOfStudy": string,
                "startDate": string, "endDate": string, "gpa": string,
                "relevantCoursework": string, "awardsHonors": string
            }}},
            "experience": {"type": "ARRAY", "items": {"type": "OBJECT", "properties": {
                "company": string, "title": string, "location": string,
                "startDate": string, "endDate": string, "achievements": strings
            }}},
            "projects": {"type": "ARRAY", "items": {"type": "OBJECT", "properties": {
                "name": string, "description": string, "url": string,
                "technologiesUsed": string, "startDate": string, "endDate": string
            }}},
            "technicalSkills": strings, "softSkills": strings, "tools": strings,
            "languages": {"type": "ARRAY", "items": {"type": "OBJECT", "properties": {
                "name": string, "proficiency": string
            }}},
            "certifications": strings, "interests": strings,
            "customSections": {"type": "ARRAY", "items": {"type": "OBJECT", "properties": {
                "title": string, "items": strings
            }}},
            "additionalInformation": string, "industry": string, "experienceLevel": string,
            "targetJobTitle": string, "companyKeywords": string,
            "keySkillsToHighlight": string, "vibe": string
        }
    })
}
