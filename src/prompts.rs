use crate::events::Turn;

/// Instruction sent ahead of the conversation unless configured otherwise.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "Please respond in a sarcastic yet informative way! Add emoji's in your answer to make it more fun!";

/// Name shown next to assistant turns.
pub const DEFAULT_ASSISTANT_NAME: &str = "ChaatGPT Bhai";

/// Build the leading system turn, if any. Blank instructions send nothing.
pub fn system_turn(instruction: Option<&str>) -> Option<Turn> {
    instruction
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(Turn::system)
}
