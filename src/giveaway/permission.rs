//! Who may trigger a draw.

use std::collections::HashSet;

use crate::types::JID;

/// Decides whether a sender may run the draw command.
pub trait DrawPermission: Send + Sync {
    /// `own` is the bot's own address when the client is logged in.
    fn allows(&self, sender: &JID, own: Option<&JID>) -> bool;
}

/// Allowlist of phone numbers, optionally including the bot's own.
///
/// Addresses are compared by number only, so any device or server suffix
/// is ignored.
#[derive(Debug, Clone, Default)]
pub struct AdminAllowlist {
    numbers: HashSet<String>,
    include_self: bool,
}

impl AdminAllowlist {
    pub fn new<I, S>(numbers: I, include_self: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            numbers: numbers
                .into_iter()
                .map(|n| normalize(n.as_ref()))
                .filter(|n| !n.is_empty())
                .collect(),
            include_self,
        }
    }

    /// Only the bot's own number.
    pub fn bot_only() -> Self {
        Self::new(Vec::<String>::new(), true)
    }
}

impl DrawPermission for AdminAllowlist {
    fn allows(&self, sender: &JID, own: Option<&JID>) -> bool {
        if sender.user.is_empty() {
            return false;
        }
        if self.include_self && own.is_some_and(|own| own.user == sender.user) {
            return true;
        }
        self.numbers.contains(&sender.user)
    }
}

/// Strip `+`, spaces and dashes from a configured number.
fn normalize(number: &str) -> String {
    let number = number.split_once('@').map_or(number, |(user, _)| user);
    number.chars().filter(char::is_ascii_digit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jid(s: &str) -> JID {
        s.parse().unwrap()
    }

    #[test]
    fn test_bot_only_matches_own_number() {
        let policy = AdminAllowlist::bot_only();
        let own = jid("5511999990000:12@s.whatsapp.net");

        assert!(policy.allows(&jid("5511999990000@s.whatsapp.net"), Some(&own)));
        assert!(!policy.allows(&jid("5511888880000@s.whatsapp.net"), Some(&own)));
        assert!(!policy.allows(&jid("5511999990000@s.whatsapp.net"), None));
    }

    #[test]
    fn test_allowlist_numbers() {
        let policy = AdminAllowlist::new(["+55 11 88888-0000"], false);
        let own = jid("5511999990000:1@s.whatsapp.net");

        assert!(policy.allows(&jid("5511888880000@s.whatsapp.net"), Some(&own)));
        assert!(!policy.allows(&jid("5511999990000@s.whatsapp.net"), Some(&own)));
    }

    #[test]
    fn test_group_address_never_matches() {
        let policy = AdminAllowlist::new(["120363"], true);
        assert!(!policy.allows(&jid("g.us"), None));
    }
}
