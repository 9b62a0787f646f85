use serde_json::json;

use super::{CareerCoach, ModelTier, Prompt, required};
use crate::error::CoachError;

const STORY_INSTRUCTION: &str = "You are a Storytelling Coach Agent.
- Take raw, unstructured \"brain dumps\" and structure them into compelling interview answers using the STAR method (Situation, Task, Action, Result).
- Be concise but impactful.
- Use bolding for key metrics and actions.
- Output strictly Markdown.";

const QUESTIONS_INSTRUCTION: &str = "You are a Hiring Manager Agent.
- Based on a job description, predict the 5-7 most likely and challenging interview questions.
- Include a mix of behavioral and technical questions.";

const REFRAME_INSTRUCTION: &str = "You are a Growth Mindset Coach Agent.
- Reframe negative/constructive feedback into a positive, forward-looking action plan.
- Focus on \"areas for growth\" rather than \"weaknesses\".
- Use Markdown sections for \"Key Takeaways\" and \"Actionable Growth Opportunities\".";

impl CareerCoach {
    /// Turns a brain dump into a STAR-structured interview answer.
    pub async fn shape_interview_story(&self, brain_dump: &str) -> Result<String, CoachError> {
        let brain_dump = required("brainDump", brain_dump)?;
        let prompt = Prompt::new(ModelTier::Pro, STORY_INSTRUCTION).thinking(16_000);
        self.generate(
            &prompt,
            &format!("Refine this story into a STAR answer:\n\n{brain_dump}"),
        )
        .await
    }

    pub async fn interview_questions(
        &self,
        job_description: &str,
    ) -> Result<Vec<String>, CoachError> {
        let job_description = required("jobDescription", job_description)?;
        let prompt = Prompt::new(ModelTier::Pro, QUESTIONS_INSTRUCTION).schema(json!({
            "type": "ARRAY",
            "items": {"type": "STRING"}
        }));
        self.generate_json(
            &prompt,
            &format!("Generate interview questions for this role:\n\n{job_description}"),
        )
        .await
    }

    pub async fn reframe_feedback(&self, feedback_text: &str) -> Result<String, CoachError> {
        let feedback_text = required("feedbackText", feedback_text)?;
        let prompt = Prompt::new(ModelTier::Pro, REFRAME_INSTRUCTION);
        self.generate(&prompt, &format!("Reframe this feedback:\n\n{feedback_text}"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::coach::testing::{ScriptedModel, coach, reply};

    #[tokio::test]
    async fn questions_parse_from_fenced_json() {
        let model = ScriptedModel::new(vec![reply(
            "```json\n[\"Tell me about an outage you led.\", \"Why Rust?\"]\n```",
        )]);

        let questions = coach(&model)
            .interview_questions("Senior SRE, on-call, Rust services")
            .await
            .expect("questions");

        assert_eq!(questions.len(), 2);
        let request = model.only_request();
        assert!(request.settings.has_response_schema());
        assert!(request.prompt().ends_with("Senior SRE, on-call, Rust services"));
    }

    #[tokio::test]
    async fn story_is_returned_verbatim() {
        let model = ScriptedModel::new(vec![reply("**Situation:** ...")]);

        let story = coach(&model)
            .shape_interview_story("we had an outage and I fixed it")
            .await
            .expect("story");

        assert_eq!(story, "**Situation:** ...");
        assert_eq!(model.only_request().settings.thinking_budget, Some(16_000));
    }

    #[tokio::test]
    async fn reframe_has_no_thinking_budget() {
        let model = ScriptedModel::new(vec![reply("## Key Takeaways")]);

        coach(&model)
            .reframe_feedback("You talk too much in meetings.")
            .await
            .expect("reframed");

        assert_eq!(model.only_request().settings.thinking_budget, None);
    }
}
