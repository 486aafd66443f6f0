//! User-visible texts. Shared by the notification path and the on-demand
//! `players` command.

use crate::models::Snapshot;

/// Roster entries shown at most.
pub const MAX_NAMES_SHOWN: usize = 10;

pub const NO_NAMES: &str = "No player names available.";
pub const OFFLINE_ANNOUNCEMENT: &str = "🔴 **Minecraft Server Offline or Unreachable**";
pub const OFFLINE_REPLY: &str = "🔴 Server is offline or unreachable.";

/// Renders the roster: first ten names, comma separated, with a trailing
/// `...` when more players are online than names shown.
pub fn format_names(names: &[String], online: u32) -> String {
    if names.is_empty() {
        return NO_NAMES.to_string();
    }
    let shown = &names[..names.len().min(MAX_NAMES_SHOWN)];
    let mut text = shown.join(", ");
    if online as usize > shown.len() {
        text.push_str(", ...");
    }
    text
}

pub fn online_announcement(snapshot: &Snapshot) -> String {
    format!(
        "🟢 **Minecraft Server Online**\nPlayers: {} / {}\nOnline: {}",
        snapshot.online,
        snapshot.capacity,
        format_names(&snapshot.names, snapshot.online)
    )
}

pub fn online_reply(snapshot: &Snapshot) -> String {
    format!(
        "🟢 **Server Online**\nPlayers: {} / {}\nOnline: {}",
        snapshot.online,
        snapshot.capacity,
        format_names(&snapshot.names, snapshot.online)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn empty_roster_has_fixed_sentence() {
        assert_eq!(format_names(&[], 0), "No player names available.");
        assert_eq!(format_names(&[], 7), "No player names available.");
    }

    #[test]
    fn full_roster_is_joined() {
        assert_eq!(format_names(&names(&["a", "b"]), 2), "a, b");
    }

    #[test]
    fn roster_is_capped_at_ten_with_ellipsis() {
        let roster = names(&["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"]);
        assert_eq!(format_names(&roster, 15), "a, b, c, d, e, f, g, h, i, j, ...");

        let mut twelve = roster.clone();
        twelve.extend(names(&["k", "l"]));
        assert_eq!(format_names(&twelve, 12), "a, b, c, d, e, f, g, h, i, j, ...");
    }

    #[test]
    fn partial_sample_gets_ellipsis() {
        assert_eq!(format_names(&names(&["steve"]), 3), "steve, ...");
    }

    #[test]
    fn count_below_roster_length_is_total() {
        assert_eq!(format_names(&names(&["a", "b", "c"]), 1), "a, b, c");
    }

    #[test]
    fn announcement_and_reply_differ_only_in_header() {
        let snap = Snapshot { online: 2, capacity: 20, names: names(&["alex", "steve"]) };
        assert_eq!(
            online_announcement(&snap),
            "🟢 **Minecraft Server Online**\nPlayers: 2 / 20\nOnline: alex, steve"
        );
        assert_eq!(online_reply(&snap), "🟢 **Server Online**\nPlayers: 2 / 20\nOnline: alex, steve");
    }
}
