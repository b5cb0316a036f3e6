// Every slash command the bot registers.
// Each feature keeps its own command file; this is the one list main wires up.

use crate::discord::{moderation, modmail, Data, Error};

pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        // Moderation
        moderation::warn(),
        moderation::clearwarnings(),
        moderation::warnings(),
        moderation::kick(),
        moderation::ban(),
        moderation::timeout(),
        moderation::untimeout(),
        moderation::purge(),
        moderation::lock(),
        moderation::unlock(),
        // Mod mail
        modmail::commands::close(),
        modmail::commands::block(),
        modmail::commands::unblock(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_command_names_are_unique() {
        let commands = all();
        let names: HashSet<_> = commands.iter().map(|c| c.name.clone()).collect();

        assert_eq!(names.len(), commands.len());
        assert!(names.contains("clearwarnings"));
        assert!(names.contains("close"));
    }

    #[test]
    fn test_staff_commands_require_permissions() {
        for command in all() {
            if command.name == "warnings" {
                assert!(command.required_permissions.is_empty());
            } else {
                assert!(
                    !command.required_permissions.is_empty(),
                    "{} has no permission gate",
                    command.name
                );
            }
        }
    }
}
