use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{CareerCoach, ModelTier, ProfileData, Prompt, required};
use crate::error::CoachError;
use crate::structured::extract_json_array;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionItem {
    /// One of the categories listed in the career-path schema.
    pub category: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CareerMilestone {
    pub timeframe: String,
    pub milestone_title: String,
    pub milestone_description: String,
    pub action_items: Vec<ActionItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CareerPath {
    pub current_role: String,
    pub target_role: String,
    pub path: Vec<CareerMilestone>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct YouTubeVideo {
    pub title: String,
    pub channel: String,
    pub description: String,
    pub video_id: String,
}

const ACTION_CATEGORIES: [&str; 8] = [
    "Academics",
    "Internships",
    "Projects",
    "Skills",
    "Networking",
    "Career",
    "Extracurriculars",
    "Certifications",
];

const PATH_INSTRUCTION: &str = "You are a world-class career strategist and mentor. \
You build detailed, realistic multi-year career plans made of concrete quarterly actions.";

const VIDEO_INSTRUCTION: &str = "You are a career development content curator. \
Use Google Search to find real, current YouTube videos.";

static VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]{11}$").expect("video id pattern is valid"));

#[derive(Deserialize)]
struct PathEnvelope {
    #[serde(default)]
    path: Vec<CareerMilestone>,
}

impl CareerCoach {
    /// Plans five yearly milestones from `current_role` to `target_role`.
    pub async fn career_path(
        &self,
        profile: &ProfileData,
        current_role: &str,
        target_role: &str,
    ) -> Result<CareerPath, CoachError> {
        let current_role = required("currentRole", current_role)?;
        let target_role = required("targetRole", target_role)?;

        let prompt = Prompt::new(ModelTier::Pro, PATH_INSTRUCTION)
            .thinking(32_768)
            .schema(path_schema());

        let message = format!(
            "Create a 5-year career path for this user.\n\n\
**User's Current Role:** {current_role}\n\
**User's Target Role:** {target_role}\n\
**User's Background Profile:**\n```json\n{profile}\n```\n\n\
Requirements:\n\
1. Analyze the gaps between the profile and the target role.\n\
2. Return exactly 5 milestones with the timeframes \"Year 1\" through \"Year 5\".\n\
3. For each milestone list diverse action items. Prefix every action item title with its quarter (\"Q1:\", \"Q2:\", \"Q3:\" or \"Q4:\").\n\
4. Build on skills the user already has before suggesting new ones.\n\
5. Make every description specific and practical.\n\n\
Return a single JSON object that matches the provided schema.",
            profile = profile.to_pretty_json(),
        );

        let envelope: PathEnvelope = self.generate_json(&prompt, &message).await?;
        Ok(CareerPath {
            current_role: current_role.to_string(),
            target_role: target_role.to_string(),
            path: envelope.path,
        })
    }

    /// Finds YouTube videos for one milestone of a career path.
    ///
    /// Failures are logged and yield an empty list; videos whose id is not
    /// a valid YouTube id are dropped.
    pub async fn milestone_videos(
        &self,
        target_role: &str,
        milestone: &CareerMilestone,
    ) -> Vec<YouTubeVideo> {
        let prompt = Prompt::new(ModelTier::Flash, VIDEO_INSTRUCTION).grounded();
        let action_items = milestone
            .action_items
            .iter()
            .map(|item| format!("- {}: {} ({})", item.category, item.title, item.description))
            .collect::<Vec<_>>()
            .join("\n");

        let message = format!(
            "**User's Target Role:** {target_role}\n\
**Milestone:** {} ({})\n\
**Action Items:**\n{action_items}\n\n\
Instructions:\n\
1. Extract keywords from each action item and the milestone theme.\n\
2. Search for 4-8 unique, high-quality videos directly related to the milestone.\n\
3. For each video, return title, channel, a one-sentence description tying it to the milestone, and the 11-character YouTube videoId.\n\n\
Output ONLY a JSON array of video objects.",
            milestone.milestone_title, milestone.timeframe,
        );

        let videos = match self.generate(&prompt, &message).await {
            Ok(text) => extract_json_array::<Vec<YouTubeVideo>>(&text).map_err(CoachError::from),
            Err(err) => Err(err),
        };

        match videos {
            Ok(videos) => videos
                .into_iter()
                .filter(|video| VIDEO_ID.is_match(&video.video_id))
                .collect(),
            Err(err) => {
                tracing::warn!(
                    milestone = %milestone.milestone_title,
                    error = %err,
                    "milestone_videos_unavailable"
                );
                Vec::new()
            }
        }
    }
}

fn path_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "path": {
                "type": "ARRAY",
                "description": "An array of milestone objects representing the career path.",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "timeframe": {"type": "STRING", "description": "The timeframe for this milestone, e.g. 'Year 1'."},
                        "milestoneTitle": {"type": "STRING"},
                        "milestoneDescription": {"type": "STRING"},
                        "actionItems": {
                            "type": "ARRAY",
                            "items": {
                                "type": "OBJECT",
                                "properties": {
                                    "category": {"type": "STRING", "enum": ACTION_CATEGORIES},
                                    "title": {"type": "STRING", "description": "Prefixed with the quarter, e.g. 'Q1: Learn Python Basics'."},
                                    "description": {"type": "STRING"}
                                },
                                "required": ["category", "title", "description"]
                            }
                        }
                    },
                    "required": ["timeframe", "milestoneTitle", "milestoneDescription", "actionItems"]
                }
            }
        },
        "required": ["path"]
    })
}
