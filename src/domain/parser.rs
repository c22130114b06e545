//! Turns pasted clipboard text into loot lines.
//!
//! The game client exports inventories either as `name<TAB>quantity<TAB>...`
//! rows or, when typed or trimmed by hand, as `name quantity`. Anything else
//! (headers, chat, URLs) is skipped and reported, never fatal.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::entities::LootLine;

/// Decorative-token rules applied to item names before catalog lookup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationRules {
    /// Bracket pairs whose enclosed text is removed, e.g. `Gravid Core [T5]`.
    pub bracket_pairs: Vec<(char, char)>,
    /// Leading words dropped case-insensitively (faction tags and the like).
    pub strip_prefixes: Vec<String>,
    /// Trailing words dropped case-insensitively.
    pub strip_suffixes: Vec<String>,
    /// Lines longer than this (in chars) are treated as noise.
    pub max_line_len: usize,
}

impl Default for NormalizationRules {
    fn default() -> Self {
        Self {
            bracket_pairs: vec![('[', ']')],
            strip_prefixes: Vec::new(),
            strip_suffixes: Vec::new(),
            max_line_len: 256,
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    #[error("no item name")]
    NoItemName,
    #[error("quantity column is not a number")]
    BadQuantity,
    #[error("quantity is zero")]
    ZeroQuantity,
    #[error("quantity is too large")]
    QuantityOverflow,
    #[error("line is too long to be loot")]
    TooLong,
}

/// A non-empty line that did not look like loot.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("line {line_no}: {reason}")]
pub struct MalformedLine {
    pub line_no: usize,
    pub text: String,
    pub reason: MalformedReason,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedLoot {
    pub lines: Vec<LootLine>,
    pub discarded: Vec<MalformedLine>,
}

impl ParsedLoot {
    pub fn discarded_count(&self) -> usize {
        self.discarded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Parses with the default rules, dropping the discard report.
pub fn parse(raw: &str) -> Vec<LootLine> {
    parse_with(raw, &NormalizationRules::default()).lines
}

pub fn parse_with(raw: &str, rules: &NormalizationRules) -> ParsedLoot {
    let mut parsed = ParsedLoot::default();

    for (idx, line) in split_lines(raw).enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match parse_line(idx + 1, trimmed, rules) {
            Ok(loot) => parsed.lines.push(loot),
            Err(malformed) => {
                debug!(%malformed, "skipping clipboard line");
                parsed.discarded.push(malformed);
            }
        }
    }

    parsed
}

/// Splits on `\n`, `\r\n` and lone `\r`.
pub(crate) fn split_lines(raw: &str) -> impl Iterator<Item = &str> {
    raw.split('\n')
        .flat_map(|line| line.strip_suffix('\r').unwrap_or(line).split('\r'))
}

fn parse_line(
    line_no: usize,
    line: &str,
    rules: &NormalizationRules,
) -> Result<LootLine, MalformedLine> {
    let malformed = |reason| MalformedLine {
        line_no,
        text: line.to_string(),
        reason,
    };

    if line.chars().count() > rules.max_line_len {
        return Err(malformed(MalformedReason::TooLong));
    }

    let (name, quantity) = if line.contains('\t') {
        let mut columns = line.split('\t').map(str::trim);
        let name = columns.next().unwrap_or_default();
        let quantity = match columns.next() {
            None | Some("") => 1,
            Some(token) => match parse_quantity(token) {
                Some(parsed) => parsed.map_err(malformed)?,
                None => return Err(malformed(MalformedReason::BadQuantity)),
            },
        };
        (name, quantity)
    } else {
        match line.rsplit_once([' ', '\t']) {
            Some((head, token)) => match parse_quantity(token) {
                Some(parsed) => (head.trim_end(), parsed.map_err(malformed)?),
                None => (line, 1),
            },
            None => (line, 1),
        }
    };

    let item_name = normalize_name(name, rules);
    if item_name.is_empty() || !item_name.chars().any(char::is_alphabetic) {
        return Err(malformed(MalformedReason::NoItemName));
    }

    Ok(LootLine {
        line_no,
        raw_text: line.to_string(),
        item_name,
        quantity,
    })
}

const GROUP_SEPARATORS: [char; 5] = [',', '.', '\'', '\u{00A0}', '\u{202F}'];

/// `None` when the token is not number-shaped at all (it belongs to the name).
fn parse_quantity(token: &str) -> Option<Result<u64, MalformedReason>> {
    let starts_with_digit = token.chars().next().is_some_and(|c| c.is_ascii_digit());
    if !starts_with_digit
        || !token
            .chars()
            .all(|c| c.is_ascii_digit() || GROUP_SEPARATORS.contains(&c))
    {
        return None;
    }

    let digits = match token.chars().find(|c| !c.is_ascii_digit()) {
        None => token.to_string(),
        Some(separator) => {
            let groups: Vec<&str> = token.split(separator).collect();
            let well_formed = groups[0].len() <= 3
                && groups[1..].iter().all(|group| group.len() == 3)
                && groups.iter().all(|group| {
                    !group.is_empty() && group.chars().all(|c| c.is_ascii_digit())
                });
            if !well_formed {
                return Some(Err(MalformedReason::BadQuantity));
            }
            groups.concat()
        }
    };

    Some(match digits.parse::<u64>() {
        Ok(0) => Err(MalformedReason::ZeroQuantity),
        Ok(value) => Ok(value),
        Err(_) => Err(MalformedReason::QuantityOverflow),
    })
}

pub fn normalize_name(name: &str, rules: &NormalizationRules) -> String {
    let mut name = name.to_string();
    for &(open, close) in &rules.bracket_pairs {
        name = strip_enclosed(&name, open, close);
    }

    let mut words: Vec<&str> = name.split_whitespace().collect();

    while let Some(first) = words.first() {
        if words.len() > 1
            && rules
                .strip_prefixes
                .iter()
                .any(|prefix| prefix.eq_ignore_ascii_case(first))
        {
            words.remove(0);
        } else {
            break;
        }
    }

    while let Some(last) = words.last() {
        if words.len() > 1
            && rules
                .strip_suffixes
                .iter()
                .any(|suffix| suffix.eq_ignore_ascii_case(last))
        {
            words.pop();
        } else {
            break;
        }
    }

    words.join(" ")
}

/// Removes every `open ... close` group; an unclosed `open` is kept verbatim.
fn strip_enclosed(input: &str, open: char, close: char) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find(open) {
        let after_open = &rest[start + open.len_utf8()..];
        match after_open.find(close) {
            Some(end) => {
                out.push_str(&rest[..start]);
                out.push(' ');
                rest = &after_open[end + close.len_utf8()..];
            }
            None => break,
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(lines: &[LootLine]) -> Vec<(&str, u64)> {
        lines
            .iter()
            .map(|line| (line.item_name.as_str(), line.quantity))
            .collect()
    }

    #[test]
    fn name_and_quantity_pairs_are_parsed() {
        let lines = parse("Gravid Core 2\nTriglavian Survey Database 14");
        assert_eq!(
            names(&lines),
            vec![("Gravid Core", 2), ("Triglavian Survey Database", 14)]
        );
    }

    #[test]
    fn missing_quantity_defaults_to_one() {
        let lines = parse("Dark Filament Blueprint");
        assert_eq!(names(&lines), vec![("Dark Filament Blueprint", 1)]);
    }

    #[test]
    fn tab_separated_export_rows_are_parsed() {
        let raw = "Name\tQuantity\tGroup\nGravid Core\t3\tAbyssal Materials\nImproved Frentix Booster\t\tBooster";
        let parsed = parse_with(raw, &NormalizationRules::default());
        assert_eq!(
            names(&parsed.lines),
            vec![("Gravid Core", 3), ("Improved Frentix Booster", 1)]
        );
        assert_eq!(parsed.discarded_count(), 1);
        assert_eq!(parsed.discarded[0].reason, MalformedReason::BadQuantity);
        assert_eq!(parsed.discarded[0].line_no, 1);
    }

    #[test]
    fn thousand_separators_are_accepted() {
        let lines = parse("Tripped Data 1,234\nAlloyed Tritanium Bar\t12.500\nPlex 1\u{00A0}000");
        assert_eq!(
            names(&lines),
            vec![
                ("Tripped Data", 1234),
                ("Alloyed Tritanium Bar", 12500),
                ("Plex", 1000)
            ]
        );
    }

    #[test]
    fn badly_grouped_or_zero_quantities_are_discarded() {
        let parsed = parse_with(
            "Gravid Core 1,23\nGravid Core 0\nGravid Core 99999999999999999999999",
            &NormalizationRules::default(),
        );
        assert!(parsed.lines.is_empty());
        let reasons: Vec<_> = parsed.discarded.iter().map(|d| d.reason).collect();
        assert_eq!(
            reasons,
            vec![
                MalformedReason::BadQuantity,
                MalformedReason::ZeroQuantity,
                MalformedReason::QuantityOverflow
            ]
        );
    }

    #[test]
    fn empty_and_noise_only_input_yields_nothing() {
        assert!(parse("").is_empty());
        assert!(parse("   \n\r\n\t\n").is_empty());

        let parsed = parse_with("----\n12345\n=== 7", &NormalizationRules::default());
        assert!(parsed.lines.is_empty());
        assert_eq!(parsed.discarded_count(), 3);
    }

    #[test]
    fn mixed_newlines_keep_input_order_and_line_numbers() {
        let lines = parse("Alpha 1\r\nBeta 2\rGamma 3\n\nDelta");
        assert_eq!(
            names(&lines),
            vec![("Alpha", 1), ("Beta", 2), ("Gamma", 3), ("Delta", 1)]
        );
        assert_eq!(
            lines.iter().map(|l| l.line_no).collect::<Vec<_>>(),
            vec![1, 2, 3, 5]
        );
    }

    #[test]
    fn decorations_are_stripped_but_raw_text_is_kept() {
        let lines = parse("  Gravid   Core [T5]   4 ");
        assert_eq!(names(&lines), vec![("Gravid Core", 4)]);
        assert_eq!(lines[0].raw_text, "Gravid   Core [T5]   4");
    }

    #[test]
    fn configured_prefixes_and_suffixes_are_removed() {
        let rules = NormalizationRules {
            bracket_pairs: vec![('[', ']'), ('(', ')')],
            strip_prefixes: vec!["Tainted".into()],
            strip_suffixes: vec!["Copy".into()],
            ..NormalizationRules::default()
        };
        assert_eq!(
            normalize_name("tainted Gravid Core (Abyssal) Copy", &rules),
            "Gravid Core"
        );
        // A name made only of a decorative word survives.
        assert_eq!(normalize_name("Copy", &rules), "Copy");
        assert_eq!(normalize_name("Broken [bracket", &rules), "Broken [bracket");
    }

    #[test]
    fn overly_long_lines_are_noise() {
        let rules = NormalizationRules {
            max_line_len: 10,
            ..NormalizationRules::default()
        };
        let parsed = parse_with("A very long chat message 3", &rules);
        assert!(parsed.is_empty());
        assert_eq!(parsed.discarded[0].reason, MalformedReason::TooLong);
    }
}
