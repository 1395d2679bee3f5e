//! Default event names derived from command names.
//!
//! A command with no explicit mapping records events named after the
//! past tense of its leading verb: `rename` → `renamed`,
//! `add_tag` → `added_tag`, `changeEmail` → `changedEmail`.

/// Derives an event name from a command name.
///
/// Only consulted when [`EntityConfig`](crate::EntityConfig) has no mapping
/// for the command.
pub trait EventNamer: Send + Sync + 'static {
    /// Return the event name for `command`.
    fn event_name(&self, command: &str) -> String;
}

/// English past-tense conjugation of the command's leading verb.
#[derive(Debug, Clone, Copy, Default)]
pub struct PastTense;

/// Verbs whose past tense does not follow the regular suffix rules.
const IRREGULAR: &[(&str, &str)] = &[
    ("begin", "began"),
    ("bring", "brought"),
    ("build", "built"),
    ("buy", "bought"),
    ("choose", "chose"),
    ("do", "did"),
    ("draw", "drew"),
    ("find", "found"),
    ("forget", "forgot"),
    ("freeze", "froze"),
    ("get", "got"),
    ("give", "gave"),
    ("hide", "hid"),
    ("hold", "held"),
    ("keep", "kept"),
    ("leave", "left"),
    ("lose", "lost"),
    ("make", "made"),
    ("pay", "paid"),
    ("put", "put"),
    ("read", "read"),
    ("reset", "reset"),
    ("run", "ran"),
    ("sell", "sold"),
    ("send", "sent"),
    ("set", "set"),
    ("shut", "shut"),
    ("spend", "spent"),
    ("take", "took"),
    ("tell", "told"),
    ("throw", "threw"),
    ("undo", "undid"),
    ("unset", "unset"),
    ("withdraw", "withdrew"),
    ("write", "wrote"),
];

impl EventNamer for PastTense {
    fn event_name(&self, command: &str) -> String {
        let split = verb_end(command);
        let (verb, rest) = command.split_at(split);
        if verb.is_empty() {
            return command.to_owned();
        }
        format!("{}{rest}", past_tense(verb))
    }
}

/// Byte offset where the leading verb ends: the first `_`, `-`, or
/// uppercase letter after position 0.
fn verb_end(command: &str) -> usize {
    command
        .char_indices()
        .skip(1)
        .find(|(_, c)| *c == '_' || *c == '-' || c.is_ascii_uppercase())
        .map_or(command.len(), |(i, _)| i)
}

fn past_tense(verb: &str) -> String {
    let lower = verb.to_ascii_lowercase();
    if let Some((_, past)) = IRREGULAR.iter().find(|(base, _)| *base == lower) {
        return match_case(verb, past);
    }

    let chars: Vec<char> = lower.chars().collect();
    let n = chars.len();
    let last = chars[n - 1];

    if last == 'e' {
        return format!("{verb}d");
    }
    if last == 'y' && n > 1 && !is_vowel(chars[n - 2]) {
        return format!("{}ied", &verb[..verb.len() - 1]);
    }
    if doubles_final_consonant(&chars) {
        return format!("{verb}{}ed", &verb[verb.len() - 1..]);
    }
    format!("{verb}ed")
}

/// Short single-syllable verbs ending consonant-vowel-consonant double the
/// final consonant (`stop` → `stopped`, `tag` → `tagged`).
fn doubles_final_consonant(chars: &[char]) -> bool {
    let n = chars.len();
    if !(3..=4).contains(&n) {
        return false;
    }
    let vowels = chars.iter().filter(|c| is_vowel(**c)).count();
    let (a, b, c) = (chars[n - 3], chars[n - 2], chars[n - 1]);
    vowels == 1
        && c.is_ascii_alphabetic()
        && !is_vowel(a)
        && is_vowel(b)
        && !is_vowel(c)
        && !matches!(c, 'w' | 'x' | 'y')
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Keep a leading capital when the command was written in PascalCase.
fn match_case(original: &str, past: &str) -> String {
    if original.starts_with(|c: char| c.is_ascii_uppercase()) {
        let mut out = past.to_owned();
        out[..1].make_ascii_uppercase();
        out
    } else {
        past.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(command: &str) -> String {
        PastTense.event_name(command)
    }

    #[test]
    fn silent_e_takes_d() {
        assert_eq!(name("rename"), "renamed");
        assert_eq!(name("close"), "closed");
    }

    #[test]
    fn regular_verbs_take_ed() {
        assert_eq!(name("touch"), "touched");
        assert_eq!(name("open"), "opened");
        assert_eq!(name("add"), "added");
        assert_eq!(name("fix"), "fixed");
        assert_eq!(name("deposit"), "deposited");
    }

    #[test]
    fn consonant_y_becomes_ied() {
        assert_eq!(name("try"), "tried");
        assert_eq!(name("apply"), "applied");
        assert_eq!(name("play"), "played");
    }

    #[test]
    fn short_cvc_verbs_double_final_consonant() {
        assert_eq!(name("stop"), "stopped");
        assert_eq!(name("tag"), "tagged");
        assert_eq!(name("plan"), "planned");
    }

    #[test]
    fn irregular_verbs_use_table() {
        assert_eq!(name("set"), "set");
        assert_eq!(name("pay"), "paid");
        assert_eq!(name("send"), "sent");
        assert_eq!(name("write"), "wrote");
    }

    #[test]
    fn only_leading_verb_is_conjugated() {
        assert_eq!(name("add_tag"), "added_tag");
        assert_eq!(name("changeEmail"), "changedEmail");
        assert_eq!(name("set-owner"), "set-owner");
    }

    #[test]
    fn pascal_case_keeps_capital() {
        assert_eq!(name("Rename"), "Renamed");
        assert_eq!(name("SetOwner"), "SetOwner");
        assert_eq!(name("PayInvoice"), "PaidInvoice");
    }

    #[test]
    fn empty_command_is_returned_unchanged() {
        assert_eq!(name(""), "");
    }
}
