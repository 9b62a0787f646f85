//! The conversational career assistant.
//!
//! Unlike the single-shot services, the assistant keeps a session and can
//! act on the host UI through [`CoachUi`]: it navigates between pages,
//! edits the profile summary and asks the user to confirm a career-path
//! generation. Three of its tools delegate to [`CareerCoach`] services.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Value, json};

use super::{CareerCoach, DocumentGeneration, ProfileData, ProfileUpdate};
use crate::agent::Agent;
use crate::error::{CoachError, ToolError};
use crate::tools::{ToolContext, ToolSpec, string_arg};

const HISTORY_IN_PROMPT: usize = 5;

/// Host-side effects the assistant can trigger.
pub trait CoachUi: Send + Sync {
    fn navigate(&self, path: &str, state: Value);
    fn update_profile(&self, update: ProfileUpdate);
    fn prompt_career_path(&self, prompt: CareerPathPrompt);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CareerPathPrompt {
    pub current_role: String,
    pub target_role: String,
    /// The user already has a path and confirming would replace it.
    pub is_replacing: bool,
}

struct UiHandle(Arc<dyn CoachUi>);

/// The profile as the user sees it when the message is sent.
struct ProfileSnapshot(ProfileData);

/// Set by the first navigation of a turn.
#[derive(Default)]
struct NavigationGuard(AtomicBool);

impl NavigationGuard {
    fn claim(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }
}

const NAVIGATION_SKIPPED: &str =
    "Navigation skipped: the user is already being taken to another page.";

pub struct CareerAssistant {
    agent: Agent,
}

impl std::fmt::Debug for CareerAssistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CareerAssistant")
            .field("agent", &self.agent)
            .finish()
    }
}

impl CareerAssistant {
    /// Starts a session grounded in `profile` and the most recent entries of
    /// `history`.
    pub fn new(
        coach: CareerCoach,
        ui: Arc<dyn CoachUi>,
        profile: &ProfileData,
        history: &[DocumentGeneration],
    ) -> Result<Self, CoachError> {
        let mut builder = Agent::builder()
            .shared_model(coach.shared_model())
            .model_name(coach.models().pro.clone())
            .system_instruction(system_instruction(profile, history))
            .retries(coach.retries())
            .tools(assistant_tools()?);
        if let Some(timeout) = coach.attempt_timeout() {
            builder = builder.attempt_timeout(timeout);
        }
        if let Some(turns) = coach.history_window() {
            builder = builder.max_history_turns(turns);
        }

        let agent = builder
            .dependency(coach)
            .dependency(UiHandle(ui))
            .build()?;
        Ok(Self { agent })
    }

    pub async fn send(
        &mut self,
        message: &str,
        profile: &ProfileData,
    ) -> Result<String, CoachError> {
        self.send_with_steps(message, profile, |_| {}).await
    }

    /// Like [`CareerAssistant::send`], reporting tool progress through
    /// `on_step`.
    pub async fn send_with_steps<F>(
        &mut self,
        message: &str,
        profile: &ProfileData,
        on_step: F,
    ) -> Result<String, CoachError>
    where
        F: FnMut(&str) + Send,
    {
        let context = ToolContext::new()
            .with(ProfileSnapshot(profile.clone()))
            .with(NavigationGuard::default());
        let retries = self.agent.config().retries;
        let reply = self
            .agent
            .chat_with_steps(message, context, retries, on_step)
            .await?;
        Ok(reply)
    }

    pub fn reset(&mut self) {
        self.agent.clear_history();
    }

    pub fn history_len(&self) -> usize {
        self.agent.history_len()
    }
}

fn system_instruction(profile: &ProfileData, history: &[DocumentGeneration]) -> String {
    let recent = history.iter().take(HISTORY_IN_PROMPT).collect::<Vec<_>>();
    let history_json = serde_json::to_string_pretty(&recent).unwrap_or_else(|_| "[]".to_string());

    format!(
        "You are an expert career coach and an integrated application assistant. Your primary goal is to \
provide personalized, actionable advice and guide the user to the best tool within this application. \
Your tone is encouraging, insightful and highly practical.

You MUST use the user's profile and application history below to personalize your advice.

**User's Profile Data:**
```json
{profile}
```

**User's Recent Application History:**
```json
{history_json}
```

**Your Tools & Directives:**
Answer questions directly by default, but call a tool when a request maps to one.

1. `navigateToResumeGenerator`: the user wants a resume or cover letter for a specific job. Ask for the \
full job description first, then call the tool.
2. `navigateToCoffeeChat`: the user wants to network, prepare for a coffee chat or write an outreach \
message. Ask about the person and whether they want to prepare (mode 'prep') or write a message \
(mode 'reach_out').
3. `promptToCreateCareerPath`: the user asks for long-term career advice or how to reach a role. Check \
whether this would replace an existing path. DO NOT ask with text; the tool shows the prompt.
4. `updateProfessionalSummary`: the user asks you to write, rewrite or improve their summary.
5. `quantifyImpact`: the user wants their experience to sound more impactful or data-driven.
6. `startMockInterview`: the user asks to practice for an interview. After calling it, act as the \
interviewer and ask the first question.
7. `getNegotiationPrep`: the user asks about salary, negotiation or asking for a raise.
8. `reframeFeedback`: the user shares tough feedback and asks how to handle it.

**General Conversation Rules:**
- Always refer to the user's experiences and skills.
- Be proactive: if a question hints at a task a tool can handle, suggest it.
- If a request needs both a tool call and a direct answer, give the answer as text in the SAME turn as \
the tool call.",
        profile = profile.to_pretty_json(),
    )
}

fn tool_failure(err: CoachError) -> ToolError {
    ToolError::Execution(err.to_string())
}

fn assistant_tools() -> Result<Vec<ToolSpec>, CoachError> {
    Ok(vec![
        update_summary_tool()?,
        resume_generator_tool()?,
        coffee_chat_tool()?,
        career_path_tool()?,
        mock_interview_tool()?,
        quantify_impact_tool()?,
        reframe_feedback_tool()?,
        negotiation_tool()?,
    ])
}

fn update_summary_tool() -> Result<ToolSpec, CoachError> {
    let tool = ToolSpec::new(
        "updateProfessionalSummary",
        "Updates the user's professional summary in their main profile. Use this whenever the user asks \
to write, rewrite, improve, or change their summary.",
    )
    .with_schema(json!({
        "type": "object",
        "properties": {
            "newSummary": {"type": "string", "description": "The new, complete professional summary text to be saved to the user profile."}
        },
        "required": ["newSummary"]
    }))?
    .with_handler(|args, ctx| {
        let ui = ctx.require::<UiHandle>();
        let snapshot = ctx.get::<ProfileSnapshot>();
        async move {
            let ui = ui?;
            let summary = string_arg(&args, "newSummary")?;
            let unchanged = snapshot.is_some_and(|profile| profile.0.summary == summary);
            if !unchanged {
                ui.0.update_profile(ProfileUpdate::summary(summary));
            }
            Ok(json!("The user's professional summary was successfully updated."))
        }
    });
    Ok(tool)
}

fn resume_generator_tool() -> Result<ToolSpec, CoachError> {
    let tool = ToolSpec::new(
        "navigateToResumeGenerator",
        "Navigates the user to the resume and cover letter generation page. Use this tool when the user \
wants to create application documents for a specific job.",
    )
    .with_schema(json!({
        "type": "object",
        "properties": {
            "jobDescription": {"type": "string", "description": "The full job description for the role the user wants to apply for. Ask the user for this if it was not provided in the chat."}
        },
        "required": ["jobDescription"]
    }))?
    .with_handler(|args, ctx| {
        let ui = ctx.require::<UiHandle>();
        let guard = ctx.require::<NavigationGuard>();
        async move {
            let (ui, guard) = (ui?, guard?);
            let job_description = string_arg(&args, "jobDescription")?;
            if !guard.claim() {
                return Ok(json!(NAVIGATION_SKIPPED));
            }
            ui.0.navigate(
                "/generate",
                json!({ "jobDescription": job_description }),
            );
            Ok(json!("Successfully navigated user to the resume generator."))
        }
    });
    Ok(tool)
}

fn coffee_chat_tool() -> Result<ToolSpec, CoachError> {
    let tool = ToolSpec::new(
        "navigateToCoffeeChat",
        "Navigates the user to the Coffee Chat helper page. Use this when the user wants help preparing \
for a networking chat or wants to write an outreach message.",
    )
    .with_schema(json!({
        "type": "object",
        "properties": {
            "counterpartInfo": {"type": "string", "description": "All available information about the person the user wants to connect with (e.g., name, title, company, bio, LinkedIn profile text)."},
            "mode": {"type": "string", "enum": ["prep", "reach_out"], "description": "Use 'prep' for preparing for a chat, and 'reach_out' for crafting an initial message."}
        },
        "required": ["counterpartInfo", "mode"]
    }))?
    .with_handler(|args, ctx| {
        let ui = ctx.require::<UiHandle>();
        let guard = ctx.require::<NavigationGuard>();
        async move {
            let (ui, guard) = (ui?, guard?);
            let counterpart_info = string_arg(&args, "counterpartInfo")?;
            let mode = string_arg(&args, "mode")?;
            if !guard.claim() {
                return Ok(json!(NAVIGATION_SKIPPED));
            }
            ui.0.navigate(
                "/coffee-chats",
                json!({
                    "initialCounterpartInfo": counterpart_info,
                    "initialMode": mode,
                }),
            );
            Ok(json!("Successfully navigated user to the coffee chat tool."))
        }
    });
    Ok(tool)
}

fn career_path_tool() -> Result<ToolSpec, CoachError> {
    let tool = ToolSpec::new(
        "promptToCreateCareerPath",
        "Displays a special UI prompt asking the user for permission to generate a new career path. \
Call this function INSTEAD of asking the user with text. After calling it, wait for the user's next \
text input.",
    )
    .with_schema(json!({
        "type": "object",
        "properties": {
            "currentRole": {"type": "string", "description": "The user's current professional situation (e.g., 'University Student', 'Junior Software Engineer')."},
            "targetRole": {"type": "string", "description": "The career goal or job title the user is aiming for (e.g., 'Senior Product Manager')."},
            "isReplacing": {"type": "boolean", "description": "True if the user already has a career path and this would replace it."}
        },
        "required": ["currentRole", "targetRole", "isReplacing"]
    }))?
    .with_handler(|args, ctx| {
        let ui = ctx.require::<UiHandle>();
        async move {
            let ui = ui?;
            let prompt = CareerPathPrompt {
                current_role: string_arg(&args, "currentRole")?,
                target_role: string_arg(&args, "targetRole")?,
                is_replacing: args
                    .get("isReplacing")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            };
            ui.0.prompt_career_path(prompt);
            Ok(json!(
                "The user has been prompted via a special UI to create a career path. I will wait for \
their next text response to know their decision."
            ))
        }
    });
    Ok(tool)
}

fn mock_interview_tool() -> Result<ToolSpec, CoachError> {
    let tool = ToolSpec::new(
        "startMockInterview",
        "Initiates a text-based mock interview session within the chat. Call this when the user wants \
to practice for an interview.",
    )
    .with_schema(json!({
        "type": "object",
        "properties": {
            "role": {"type": "string", "description": "The job title or role the user is interviewing for, e.g., 'Business Analyst'."}
        },
        "required": ["role"]
    }))?
    .with_handler(|args, _ctx| async move {
        let role = string_arg(&args, "role")?;
        Ok(json!(format!(
            "Mock interview started for the role of {role}. You are now the interviewer: ask one \
question at a time, wait for the user's answer and give brief feedback before the next question. \
Start with the first question now."
        )))
    });
    Ok(tool)
}

fn quantify_impact_tool() -> Result<ToolSpec, CoachError> {
    let tool = ToolSpec::new(
        "quantifyImpact",
        "Analyzes a project or work experience description and suggests metrics to quantify its \
impact. Use when the user wants their resume to sound more impressive or data-driven.",
    )
    .with_schema(json!({
        "type": "object",
        "properties": {
            "projectDescription": {"type": "string", "description": "The description of the project or work experience to quantify."}
        },
        "required": ["projectDescription"]
    }))?
    .with_handler(|args, ctx| {
        let coach = ctx.require::<CareerCoach>();
        async move {
            let coach = coach?;
            let description = string_arg(&args, "projectDescription")?;
            let suggestions = coach
                .quantify_impact(&description)
                .await
                .map_err(tool_failure)?;
            Ok(json!(suggestions))
        }
    });
    Ok(tool)
}

fn reframe_feedback_tool() -> Result<ToolSpec, CoachError> {
    let tool = ToolSpec::new(
        "reframeFeedback",
        "Helps the user reframe constructive or negative feedback into actionable opportunities for \
growth.",
    )
    .with_schema(json!({
        "type": "object",
        "properties": {
            "feedbackText": {"type": "string", "description": "The feedback the user has received."}
        },
        "required": ["feedbackText"]
    }))?
    .with_handler(|args, ctx| {
        let coach = ctx.require::<CareerCoach>();
        async move {
            let coach = coach?;
            let feedback = string_arg(&args, "feedbackText")?;
            let reframed = coach
                .reframe_feedback(&feedback)
                .await
                .map_err(tool_failure)?;
            Ok(json!(reframed))
        }
    });
    Ok(tool)
}

fn negotiation_tool() -> Result<ToolSpec, CoachError> {
    let tool = ToolSpec::new(
        "getNegotiationPrep",
        "Provides salary negotiation preparation, including average salary data and specific talking \
points based on the user's background.",
    )
    .with_schema(json!({
        "type": "object",
        "properties": {
            "jobTitle": {"type": "string", "description": "The job title for the negotiation."},
            "location": {"type": "string", "description": "The city and state/country for the job."}
        },
        "required": ["jobTitle", "location"]
    }))?
    .with_handler(|args, ctx| {
        let coach = ctx.require::<CareerCoach>();
        async move {
            let coach = coach?;
            let job_title = string_arg(&args, "jobTitle")?;
            let location = string_arg(&args, "location")?;
            let prep = coach
                .negotiation_prep(&job_title, &location)
                .await
                .map_err(tool_failure)?;
            serde_json::to_value(prep).map_err(|err| ToolError::Execution(err.to_string()))
        }
    });
    Ok(tool)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::coach::testing::{ScriptedModel, coach, reply, sample_profile, tool_call};
    use crate::llm::{ModelCompletion, ModelMessage, ModelToolCall, ToolPayload};

    #[derive(Debug, Clone, PartialEq)]
    enum UiCall {
        Navigate(String, Value),
        UpdateProfile(ProfileUpdate),
        PromptCareerPath(CareerPathPrompt),
    }

    #[derive(Default)]
    struct RecordingUi {
        calls: Mutex<Vec<UiCall>>,
    }

    impl RecordingUi {
        fn calls(&self) -> Vec<UiCall> {
            self.calls.lock().expect("lock poisoned").clone()
        }

        fn record(&self, call: UiCall) {
            self.calls.lock().expect("lock poisoned").push(call);
        }
    }

    impl CoachUi for RecordingUi {
        fn navigate(&self, path: &str, state: Value) {
            self.record(UiCall::Navigate(path.to_string(), state));
        }

        fn update_profile(&self, update: ProfileUpdate) {
            self.record(UiCall::UpdateProfile(update));
        }

        fn prompt_career_path(&self, prompt: CareerPathPrompt) {
            self.record(UiCall::PromptCareerPath(prompt));
        }
    }

    fn assistant(model: &Arc<ScriptedModel>) -> (CareerAssistant, Arc<RecordingUi>) {
        let ui = Arc::new(RecordingUi::default());
        let assistant = CareerAssistant::new(coach(model), ui.clone(), &sample_profile(), &[])
            .expect("assistant builds");
        (assistant, ui)
    }

    fn last_results(model: &ScriptedModel) -> Vec<ToolPayload> {
        let requests = model.requests();
        let last = requests.last().expect("a request");
        match last.messages.last() {
            Some(ModelMessage::ToolResults(responses)) => {
                responses.iter().map(|r| r.payload.clone()).collect()
            }
            other => panic!("expected tool results, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn summary_rewrite_updates_the_profile() {
        let model = ScriptedModel::new(vec![
            tool_call(
                "call-1",
                "updateProfessionalSummary",
                json!({"newSummary": "Backend engineer focused on reliability."}),
            ),
            reply("Done! Your summary now leads with reliability."),
        ]);
        let (mut assistant, ui) = assistant(&model);
        let mut steps = Vec::new();

        let reply = assistant
            .send_with_steps("Rewrite my summary", &sample_profile(), |step| {
                steps.push(step.to_string())
            })
            .await
            .expect("reply");

        assert_eq!(reply, "Done! Your summary now leads with reliability.");
        assert_eq!(
            ui.calls(),
            vec![UiCall::UpdateProfile(ProfileUpdate::summary(
                "Backend engineer focused on reliability."
            ))]
        );
        assert_eq!(
            steps,
            vec![
                "Executing action: updateProfessionalSummary...".to_string(),
                "Processing results...".to_string(),
            ]
        );
        assert_eq!(
            last_results(&model),
            vec![ToolPayload::Result(json!(
                "The user's professional summary was successfully updated."
            ))]
        );
    }

    #[tokio::test]
    async fn unchanged_summary_does_not_touch_the_ui() {
        let model = ScriptedModel::new(vec![
            tool_call(
                "call-1",
                "updateProfessionalSummary",
                json!({"newSummary": "Engineer who ships."}),
            ),
            reply("It already reads well."),
        ]);
        let (mut assistant, ui) = assistant(&model);

        assistant
            .send("Polish my summary", &sample_profile())
            .await
            .expect("reply");

        assert!(ui.calls().is_empty());
    }

    #[tokio::test]
    async fn only_the_first_navigation_of_a_turn_happens() {
        let both = Ok(ModelCompletion {
            tool_calls: vec![
                ModelToolCall {
                    id: "nav-1".to_string(),
                    name: "navigateToCoffeeChat".to_string(),
                    arguments: json!({"counterpartInfo": "Sarah, PM at Innovate", "mode": "prep"}),
                    thought_signature: None,
                },
                ModelToolCall {
                    id: "nav-2".to_string(),
                    name: "navigateToResumeGenerator".to_string(),
                    arguments: json!({"jobDescription": "PM role"}),
                    thought_signature: None,
                },
            ],
            ..ModelCompletion::default()
        });
        let model = ScriptedModel::new(vec![both, reply("Taking you to the coffee chat tool.")]);
        let (mut assistant, ui) = assistant(&model);

        assistant
            .send("Help me prep for Sarah", &sample_profile())
            .await
            .expect("reply");

        assert_eq!(
            ui.calls(),
            vec![UiCall::Navigate(
                "/coffee-chats".to_string(),
                json!({"initialCounterpartInfo": "Sarah, PM at Innovate", "initialMode": "prep"}),
            )]
        );
        assert_eq!(
            last_results(&model),
            vec![
                ToolPayload::Result(json!(
                    "Successfully navigated user to the coffee chat tool."
                )),
                ToolPayload::Result(json!(NAVIGATION_SKIPPED)),
            ]
        );
    }

    #[tokio::test]
    async fn coffee_chat_mode_is_validated() {
        let model = ScriptedModel::new(vec![
            tool_call(
                "nav-1",
                "navigateToCoffeeChat",
                json!({"counterpartInfo": "Sarah", "mode": "stalk"}),
            ),
            reply("Which mode did you want?"),
        ]);
        let (mut assistant, ui) = assistant(&model);

        assistant
            .send("coffee chat", &sample_profile())
            .await
            .expect("reply");

        assert!(ui.calls().is_empty());
        assert!(matches!(&last_results(&model)[0], ToolPayload::Error(_)));
    }

    #[tokio::test]
    async fn career_path_prompt_reaches_the_ui() {
        let model = ScriptedModel::new(vec![
            tool_call(
                "cp-1",
                "promptToCreateCareerPath",
                json!({"currentRole": "Student", "targetRole": "Investment Banker", "isReplacing": true}),
            ),
            reply("Great goal! Confirm the prompt and I'll map out your path."),
        ]);
        let (mut assistant, ui) = assistant(&model);

        assistant
            .send("How do I get into banking?", &sample_profile())
            .await
            .expect("reply");

        assert_eq!(
            ui.calls(),
            vec![UiCall::PromptCareerPath(CareerPathPrompt {
                current_role: "Student".to_string(),
                target_role: "Investment Banker".to_string(),
                is_replacing: true,
            })]
        );
        assert!(matches!(&last_results(&model)[0], ToolPayload::Result(_)));
    }

    #[tokio::test]
    async fn quantify_impact_runs_a_nested_coach_call() {
        let model = ScriptedModel::new(vec![
            tool_call(
                "q-1",
                "quantifyImpact",
                json!({"projectDescription": "Rebuilt the billing pipeline"}),
            ),
            reply("- Cut invoice errors by 30%"),
            reply("Here are some metrics you could use."),
        ]);
        let (mut assistant, _ui) = assistant(&model);

        let reply = assistant
            .send("Make my billing project sound stronger", &sample_profile())
            .await
            .expect("reply");

        assert_eq!(reply, "Here are some metrics you could use.");
        let requests = model.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[1].tools.is_empty());
        assert!(requests[1].prompt().ends_with("Rebuilt the billing pipeline"));
        assert_eq!(
            last_results(&model),
            vec![ToolPayload::Result(json!("- Cut invoice errors by 30%"))]
        );
    }

    #[tokio::test]
    async fn session_prompt_embeds_profile_and_recent_history() {
        let model = ScriptedModel::new(vec![reply("Hi Alex!")]);
        let history = (0..7)
            .map(|i| DocumentGeneration {
                id: format!("gen-{i}"),
                job_title: format!("Role {i}"),
                ..DocumentGeneration::default()
            })
            .collect::<Vec<_>>();
        let ui: Arc<dyn CoachUi> = Arc::new(RecordingUi::default());
        let mut assistant =
            CareerAssistant::new(coach(&model), ui, &sample_profile(), &history).expect("builds");

        assistant.send("hello", &sample_profile()).await.expect("reply");

        let request = model.only_request();
        let instruction = request.settings.system_instruction.expect("instruction");
        assert!(instruction.contains("\"fullName\": \"Alex Doe\""));
        assert!(instruction.contains("gen-4"));
        assert!(!instruction.contains("gen-5"));
        assert_eq!(request.settings.model, "gemini-3-pro-preview");
        assert_eq!(request.tools.len(), 8);
        assert_eq!(assistant.history_len(), 2);
    }
}
