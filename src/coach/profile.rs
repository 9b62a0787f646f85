//! Profile data exchanged with the UI and embedded in prompts.
//!
//! Field names serialize in camelCase so that the JSON the models see
//! matches what the web client stores.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Education {
    pub id: String,
    pub institution: String,
    pub degree: String,
    pub field_of_study: String,
    pub start_date: String,
    pub end_date: String,
    pub gpa: String,
    pub relevant_coursework: String,
    pub awards_honors: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Achievement {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Experience {
    pub id: String,
    pub company: String,
    pub title: String,
    pub location: String,
    pub start_date: String,
    pub end_date: String,
    pub achievements: Vec<Achievement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: String,
    pub url: String,
    pub technologies_used: String,
    pub start_date: String,
    pub end_date: String,
}

/// Skills, tools, certifications and interests share this shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NamedItem {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Proficiency {
    Native,
    Fluent,
    #[default]
    Conversational,
    Basic,
}

impl Proficiency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Fluent => "fluent",
            Self::Conversational => "conversational",
            Self::Basic => "basic",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Language {
    pub id: String,
    pub name: String,
    pub proficiency: Proficiency,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Internship,
    #[default]
    Entry,
    Mid,
    Senior,
    Executive,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomSection {
    pub id: String,
    pub title: String,
    pub items: Vec<Achievement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileData {
    pub full_name: String,
    pub job_title: String,
    pub email: String,
    pub phone: String,
    pub website: String,
    pub location: String,
    pub linkedin: String,
    pub github: String,
    pub summary: String,
    pub education: Vec<Education>,
    pub experience: Vec<Experience>,
    pub projects: Vec<Project>,
    pub technical_skills: Vec<NamedItem>,
    pub soft_skills: Vec<NamedItem>,
    pub tools: Vec<NamedItem>,
    pub languages: Vec<Language>,
    pub certifications: Vec<NamedItem>,
    pub interests: Vec<NamedItem>,
    pub custom_sections: Vec<CustomSection>,
    pub additional_information: String,
    pub industry: String,
    pub experience_level: ExperienceLevel,
    pub vibe: String,
    pub selected_resume_template: String,
    pub selected_cover_letter_template: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_order: Option<Vec<String>>,
    pub target_job_title: String,
    pub company_keywords: String,
    pub key_skills_to_highlight: String,
}

pub const DEFAULT_SECTION_ORDER: [&str; 7] = [
    "summary",
    "experience",
    "education",
    "projects",
    "skills",
    "certifications",
    "languages",
];

impl ProfileData {
    /// The user's section order, or the default resume order.
    pub fn section_order(&self) -> Vec<String> {
        match &self.section_order {
            Some(order) if !order.is_empty() => order.clone(),
            _ => DEFAULT_SECTION_ORDER.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn apply(&mut self, update: ProfileUpdate) {
        macro_rules! merge {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = update.$field { self.$field = value; })*
            };
        }
        merge!(
            full_name,
            job_title,
            email,
            phone,
            website,
            location,
            linkedin,
            github,
            summary,
            education,
            experience,
            projects,
            technical_skills,
            soft_skills,
            tools,
            languages,
            certifications,
            interests,
            custom_sections,
            additional_information,
            industry,
            experience_level,
            vibe,
            target_job_title,
            company_keywords,
            key_skills_to_highlight,
        );
    }
}

/// A partial profile. `None` leaves the current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub education: Option<Vec<Education>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience: Option<Vec<Experience>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<Project>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technical_skills: Option<Vec<NamedItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soft_skills: Option<Vec<NamedItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<NamedItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub languages: Option<Vec<Language>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certifications: Option<Vec<NamedItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interests: Option<Vec<NamedItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_sections: Option<Vec<CustomSection>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_information: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience_level: Option<ExperienceLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vibe: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_job_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_keywords: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_skills_to_highlight: Option<String>,
}

impl ProfileUpdate {
    pub fn summary(summary: impl Into<String>) -> Self {
        Self {
            summary: Some(summary.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationAnalysis {
    #[serde(deserialize_with = "clamped_score")]
    pub fit_score: u8,
    pub gap_analysis: String,
    pub keyword_optimization: String,
    pub impact_enhancer: String,
}

/// Reads any JSON number as a 0..=100 score.
pub(crate) fn clamped_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if raw.is_nan() {
        return Ok(0);
    }
    Ok(raw.round().clamp(0.0, 100.0) as u8)
}

/// One past run of the document generator, shown to the career assistant
/// as application history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentGeneration {
    pub id: String,
    pub generated_at: String,
    pub job_title: String,
    pub company_name: String,
    pub resume_content: Option<String>,
    pub cover_letter_content: Option<String>,
    pub analysis_result: Option<ApplicationAnalysis>,
}

/// Renders the profile sections in `order` as a Markdown resume.
///
/// Unknown section keys are skipped. Empty sections render nothing.
pub fn profile_to_markdown(profile: &ProfileData, order: &[String]) -> String {
    let mut md = String::new();

    if !profile.full_name.is_empty() {
        md.push_str(&format!("# {}\n", profile.full_name));
    }
    let contact = [
        &profile.phone,
        &profile.email,
        &profile.website,
        &profile.location,
    ]
    .into_iter()
    .filter(|value| !value.is_empty())
    .map(String::as_str)
    .collect::<Vec<_>>();
    if !contact.is_empty() {
        md.push_str(&format!("{}\n\n", contact.join(" | ")));
    }

    for key in order {
        md.push_str(&render_section(profile, key));
    }

    md.trim().to_string()
}

fn render_section(profile: &ProfileData, key: &str) -> String {
    let mut out = String::new();
    match key {
        "summary" if !profile.summary.is_empty() => {
            out.push_str(&format!("## Summary\n{}\n\n", profile.summary));
        }
        "experience" if !profile.experience.is_empty() => {
            out.push_str("## Experience\n");
            for exp in &profile.experience {
                out.push_str(&format!(
                    "**{}** | {} | {}\n",
                    exp.title, exp.company, exp.location
                ));
                if !exp.start_date.is_empty() || !exp.end_date.is_empty() {
                    out.push_str(&format!("*{} - {}*\n\n", exp.start_date, exp.end_date));
                }
                for achievement in &exp.achievements {
                    out.push_str(&format!("- {}\n", achievement.text));
                }
                out.push('\n');
            }
        }
        "education" if !profile.education.is_empty() => {
            out.push_str("## Education\n");
            for edu in &profile.education {
                out.push_str(&format!(
                    "**{}, {}** | {}\n",
                    edu.degree, edu.field_of_study, edu.institution
                ));
                if !edu.start_date.is_empty() || !edu.end_date.is_empty() {
                    out.push_str(&format!("*{} - {}*\n\n", edu.start_date, edu.end_date));
                }
            }
        }
        "skills" => {
            let names = profile
                .technical_skills
                .iter()
                .chain(&profile.soft_skills)
                .chain(&profile.tools)
                .map(|skill| skill.name.as_str())
                .collect::<Vec<_>>();
            if !names.is_empty() {
                out.push_str(&format!("## Skills\n{}\n\n", names.join(", ")));
            }
        }
        "projects" if !profile.projects.is_empty() => {
            out.push_str("## Projects\n");
            for project in &profile.projects {
                out.push_str(&format!("**{}**\n", project.name));
                if !project.description.is_empty() {
                    out.push_str(&format!("{}\n", project.description));
                }
                if !project.technologies_used.is_empty() {
                    out.push_str(&format!(
                        "*Technologies: {}*\n",
                        project.technologies_used
                    ));
                }
                out.push('\n');
            }
        }
        "certifications" if !profile.certifications.is_empty() => {
            out.push_str("## Certifications\n");
            for cert in &profile.certifications {
                out.push_str(&format!("- {}\n", cert.name));
            }
            out.push('\n');
        }
        "languages" if !profile.languages.is_empty() => {
            out.push_str("## Languages\n");
            for lang in &profile.languages {
                out.push_str(&format!(
                    "- {} ({})\n",
                    lang.name,
                    lang.proficiency.as_str()
                ));
            }
            out.push('\n');
        }
        _ => {}
    }
    out
}
