//! Interactive session setup
//!
//! Asks the operator for the choices not given on the command line or in
//! the environment.

use dialoguer::Select;

use crate::session::{SpeechOutput, TaskVariant};

/// Return `preset` or ask which task to run
///
/// # Errors
///
/// Returns error if the terminal prompt fails
pub fn choose_task(preset: Option<TaskVariant>) -> anyhow::Result<TaskVariant> {
    if let Some(task) = preset {
        return Ok(task);
    }

    let items = ["A - Sudoku helper", "B - Life coach"];
    let idx = Select::new()
        .with_prompt("Select the task")
        .items(&items)
        .default(0)
        .interact()?;

    Ok(if idx == 0 {
        TaskVariant::Sudoku
    } else {
        TaskVariant::LifeCoach
    })
}

/// Return `preset` or ask how replies should be voiced
///
/// # Errors
///
/// Returns error if the terminal prompt fails
pub fn choose_speech(preset: Option<SpeechOutput>) -> anyhow::Result<SpeechOutput> {
    if let Some(speech) = preset {
        return Ok(speech);
    }

    let items = ["1 - Cloud voice", "2 - Robot voice"];
    let idx = Select::new()
        .with_prompt("Select the speech output")
        .items(&items)
        .default(0)
        .interact()?;

    Ok(if idx == 0 {
        SpeechOutput::Cloud
    } else {
        SpeechOutput::Native
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_skip_prompts() {
        assert_eq!(choose_task(Some(TaskVariant::LifeCoach)).unwrap(), TaskVariant::LifeCoach);
        assert_eq!(choose_speech(Some(SpeechOutput::Native)).unwrap(), SpeechOutput::Native);
    }
}
