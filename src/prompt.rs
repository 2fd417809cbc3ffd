//! Prompt construction for each dialogue cycle
//!
//! Every task variant owns a system prompt and a task-phase prompt; the
//! introduction and conclusion prompts are shared. The message list is
//! rebuilt from scratch every cycle and never persisted.

use serde::Serialize;

use crate::conversation::{Role, Turn};
use crate::phase::Phase;
use crate::session::TaskVariant;

const SYSTEM_PROMPT_SUDOKU: &str = "You are a robot that assists players with solving sudokus for an experiment. \
You cannot help with anything else. Always speak in plain English, no more than 50 words per response. \
Avoid lists, code, or technical formatting. \
Speak naturally as if talking to a human and always stay on the topic of sudokus.";

const SYSTEM_PROMPT_LIFE_COACH: &str = "You are a robot that takes on a life coach role towards the person you are speaking to for an experiment. \
You cannot help with anything else. Always speak in plain English, no more than 50 words per response. \
Avoid lists, code, or technical formatting. \
Speak naturally as if talking to a human and always stay on the topic of giving advice about life.";

const PHASE_PROMPT_INTRO: &str = "The researcher first introduces you to the participant. After that only the participant is speaking to you. \
Introduce yourself: your name is Charlie and you are a robot, designed to do a task. \
Ask the participant's name. \
Explain the task you were designed to do.";

const PHASE_PROMPT_TASK_SUDOKU: &str = "Be curious. \
Explain the rules of sudoku if asked. \
Provide a correct move if the participant asks for one. \
You know the current state of the sudoku puzzle.";

const PHASE_PROMPT_TASK_LIFE_COACH: &str = "Be curious. \
Give tips that people can apply in their daily life.";

const PHASE_PROMPT_CONCLUSION: &str = "Regardless of your task, explain that due to time constraints this will be the end of your interaction. \
Conclude your interaction, say goodbye and thank the participant for their time. \
YOU MUST IMMEDIATELY END THE CONVERSATION.";

/// Directive inserted between the task prompt and the conclusion prompt
pub const CONCLUDE_DIRECTIVE: &str = "!!! IMPORTANT: This is the final phase. You must CONCLUDE the session now. \
Thank the participant and say goodbye. Do NOT continue the conversation.";

/// User message sent in place of the participant's words when concluding
pub const CONCLUDE_REQUEST: &str = "Please conclude the session now.";

/// System prompt for a task variant
#[must_use]
pub const fn task_prompt(task: TaskVariant) -> &'static str {
    match task {
        TaskVariant::Sudoku => SYSTEM_PROMPT_SUDOKU,
        TaskVariant::LifeCoach => SYSTEM_PROMPT_LIFE_COACH,
    }
}

/// Phase prompt for a task variant in a given phase
#[must_use]
pub const fn phase_prompt(task: TaskVariant, phase: Phase) -> &'static str {
    match (phase, task) {
        (Phase::Intro, _) => PHASE_PROMPT_INTRO,
        (Phase::Task, TaskVariant::Sudoku) => PHASE_PROMPT_TASK_SUDOKU,
        (Phase::Task, TaskVariant::LifeCoach) => PHASE_PROMPT_TASK_LIFE_COACH,
        (Phase::Conclusion, _) => PHASE_PROMPT_CONCLUSION,
    }
}

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl From<Role> for MessageRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => Self::User,
            Role::Assistant => Self::Assistant,
        }
    }
}

/// A chat message sent to the responder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role().into(),
            content: turn.text().to_string(),
        }
    }
}

/// Inputs for one cycle's prompt
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    pub task: TaskVariant,
    pub phase: Phase,
    pub hint: &'a str,
    pub history: &'a [Turn],
    pub user_input: &'a str,
}

impl PromptContext<'_> {
    /// System message for the introduction and task phases
    ///
    /// Task prompt, phase prompt and hint joined by newlines; an empty hint
    /// is left out.
    #[must_use]
    pub fn system_prompt(&self) -> String {
        let mut prompt = format!(
            "{}\n{}",
            task_prompt(self.task),
            phase_prompt(self.task, self.phase)
        );
        let hint = self.hint.trim();
        if !hint.is_empty() {
            prompt.push('\n');
            prompt.push_str(hint);
        }
        prompt
    }

    /// Build the message list sent to the responder
    #[must_use]
    pub fn build_messages(&self) -> Vec<ChatMessage> {
        if self.phase == Phase::Conclusion {
            return conclusion_messages(self.task);
        }

        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt()));
        messages.extend(self.history.iter().map(ChatMessage::from));
        messages.push(ChatMessage::user(self.user_input));
        messages
    }
}

/// Message list for the conclusion phase
///
/// Identical on every conclusion cycle; history is not included.
#[must_use]
pub fn conclusion_messages(task: TaskVariant) -> Vec<ChatMessage> {
    let system = format!(
        "{}\n\n{CONCLUDE_DIRECTIVE}\n\n{}",
        task_prompt(task),
        phase_prompt(task, Phase::Conclusion)
    );
    vec![ChatMessage::system(system), ChatMessage::user(CONCLUDE_REQUEST)]
}
