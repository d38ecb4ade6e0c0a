mod command_palette;
mod key_result;
mod prompt;

pub use command_palette::{CommandEvent, CommandPalette};
pub use key_result::KeyResult;
pub use prompt::{Prompt, PromptEvent};
