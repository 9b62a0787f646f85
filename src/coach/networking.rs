use super::{CareerCoach, ModelTier, ProfileData, Prompt, required};
use crate::error::CoachError;

const BRIEF_INSTRUCTION: &str = "You are a world-class Networking Coach Agent.
- Your goal is to make the user feel confident and prepared.
- Analyze the user's profile and the counterpart's info to find genuine connection points.
- Produce a \"Coffee Chat Brief\" in Markdown.
- Tone: Warm, strategic, insightful.
- Sections: \"Quick Overview\", \"Shared Touchpoints\", \"Smart Conversation Starters\", \"Industry Context\", \"Closing Ideas\".";

const REACH_OUT_INSTRUCTION: &str = "You are an Expert Communicator Agent.
- Write a cold outreach message (e.g., LinkedIn/Email).
- It must be concise, professional, and warm.
- **Crucial:** Avoid generic templates. Use the specific details provided to personalize the hook.
- Keep the entire message under 100 words and sign it with the user's actual first name, never a placeholder.
- Do not include subject lines unless asked. Just the message body.";

impl CareerCoach {
    /// Prepares a Markdown brief for a coffee chat with `counterpart_info`.
    pub async fn coffee_chat_brief(
        &self,
        profile: &ProfileData,
        counterpart_info: &str,
    ) -> Result<String, CoachError> {
        let counterpart_info = required("counterpartInfo", counterpart_info)?;
        let prompt = Prompt::new(ModelTier::Pro, BRIEF_INSTRUCTION)
            .thinking(16_000)
            .temperature(0.6);

        let message = format!(
            "Prepare a brief for this meeting:\n**User Profile:** {}\n**Counterpart Info:** {}",
            profile.to_pretty_json(),
            counterpart_info
        );
        self.generate(&prompt, &message).await
    }

    /// Drafts a short cold-outreach message asking for a coffee chat.
    pub async fn reach_out_message(
        &self,
        profile: &ProfileData,
        counterpart_info: &str,
    ) -> Result<String, CoachError> {
        let counterpart_info = required("counterpartInfo", counterpart_info)?;
        let prompt = Prompt::new(ModelTier::Pro, REACH_OUT_INSTRUCTION)
            .thinking(8_000)
            .temperature(0.5);

        let message = format!(
            "Write a reach-out message to this person based on my profile:\n**User Profile:** {}\n**Counterpart Info:** {}",
            profile.to_pretty_json(),
            counterpart_info
        );
        self.generate(&prompt, &message).await
    }
}
