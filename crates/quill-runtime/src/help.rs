//! The built-in `help` script.

use quill_core::{Bot, Message, Script, trigger_hint};

/// Registry name of the help script.
pub const HELP_SCRIPT: &str = "help";

/// Builds a script that answers `trigger` with the registry's help text.
pub fn help_script(trigger: impl Into<String>) -> Script {
    let trigger = trigger.into();
    let usage = format!("`{}`: list available commands", trigger_hint(&trigger));
    Script::new(|bot: Bot, incoming: Message| async move {
        let text = bot.registry().help();
        let text = if text.is_empty() {
            "no commands available".to_string()
        } else {
            text
        };
        Ok(vec![incoming.reply(text)])
    })
    .rule("help", trigger)
    .usage(usage)
    .description("Lists available commands")
}
