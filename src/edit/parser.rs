//! Parsing of recent-changes relay lines.
//!
//! After colour codes are removed a relay line reads
//! `[[Title]] FLAGS URL * Editor * (+delta) comment`.

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

use super::types::{ArticleKey, EditEvent, Rejection, Revisions};

lazy_static! {
    // mIRC colour (\x03 with optional fg[,bg]) and bold/reset/reverse/italic/underline
    static ref COLOR_CODES: Regex =
        Regex::new(r"\x03(?:\d{1,2}(?:,\d{1,2})?)?|[\x02\x0f\x16\x1d\x1f]")
            .expect("colour code pattern is valid");
    static ref TITLE: Regex =
        Regex::new(r"^\s*\[\[(.+?)\]\](.*)$").expect("title pattern is valid");
    static ref DELTA_AND_COMMENT: Regex =
        Regex::new(r"^\s*\(([+-]?\d+)\)\s*(.*?)\s*$").expect("delta pattern is valid");
    static ref BOT_NAME: Regex = Regex::new(r"(?i)^bot|bot$").expect("bot pattern is valid");
}

/// Flag the relay sets on edits made by accounts with the bot right.
const BOT_FLAG: char = 'B';

pub fn strip_color_codes(text: &str) -> String {
    COLOR_CODES.replace_all(text, "").into_owned()
}

/// Language code of a relay channel: the text between `#` and the first `.`,
/// so `#en.wikipedia` yields `en`.
pub fn language_from_channel(channel: &str) -> Option<&str> {
    let start = channel.find('#')? + 1;
    let rest = &channel[start..];
    let language = &rest[..rest.find('.')?];
    if language.is_empty() {
        None
    } else {
        Some(language)
    }
}

/// Turns one relay line into an [`EditEvent`], or says why it is not an
/// article edit.
pub fn parse_message(
    channel: &str,
    text: &str,
    discard_bots: bool,
) -> Result<EditEvent, Rejection> {
    let line = strip_color_codes(text);

    let captures = TITLE.captures(&line).ok_or(Rejection::NotRecentChange)?;
    let title = captures[1].trim();
    let remainder = captures.get(2).map_or("", |m| m.as_str());

    if title.is_empty() {
        return Err(Rejection::Malformed);
    }
    if title.contains(':') {
        return Err(Rejection::Namespace);
    }

    let mut fields = remainder.splitn(3, '*');
    let head = fields.next().unwrap_or_default();
    let editor = fields.next().map(str::trim).unwrap_or_default();
    let tail = fields.next().ok_or(Rejection::Malformed)?;
    if editor.is_empty() {
        return Err(Rejection::Malformed);
    }

    let mut flags = String::new();
    let mut url = None;
    for token in head.split_whitespace() {
        if token.starts_with("http://") || token.starts_with("https://") {
            url = Some(token);
        } else {
            flags.push_str(token);
        }
    }

    let is_bot = flags.contains(BOT_FLAG) || BOT_NAME.is_match(editor);
    if is_bot && discard_bots {
        return Err(Rejection::Bot);
    }

    let language = language_from_channel(channel).ok_or(Rejection::UnknownLanguage)?;

    let delta_captures = DELTA_AND_COMMENT
        .captures(tail)
        .ok_or(Rejection::Malformed)?;
    let delta = delta_captures[1]
        .parse::<i64>()
        .map_err(|_| Rejection::Malformed)?;
    let comment = delta_captures[2].to_string();

    let revisions = url.and_then(parse_revisions);
    let diff_url = revisions.and(url).map(str::to_string);

    Ok(EditEvent {
        article: ArticleKey::new(language, title),
        editor: editor.to_string(),
        language: language.to_string(),
        delta,
        comment,
        diff_url,
        revisions,
        flags,
        is_bot,
    })
}

/// Reads the `diff` (current) and `oldid` (previous) revisions from a diff URL.
fn parse_revisions(url: &str) -> Option<Revisions> {
    let parsed = Url::parse(url).ok()?;
    let mut current = None;
    let mut previous = None;
    for (name, value) in parsed.query_pairs() {
        match name.as_ref() {
            "diff" => current = value.parse::<u64>().ok(),
            "oldid" => previous = value.parse::<u64>().ok(),
            _ => {}
        }
    }
    Some(Revisions {
        current: current?,
        previous: previous?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relay_line(title: &str, flags: &str, url: &str, editor: &str, rest: &str) -> String {
        format!(
            "\x0314[[\x0307{}\x0314]]\x034 {}\x0310 \x0302{}\x03 \x035*\x03 \x0303{}\x03 \x035*\x03 {} \x0310\x03",
            title, flags, url, editor, rest
        )
    }

    #[test]
    fn test_parses_article_edit() {
        let line = relay_line(
            "Juniata River",
            "M",
            "http://en.wikipedia.org/w/index.php?diff=516269072&oldid=514659029",
            "Johanna-Hypatia",
            "(+67) Place names of Native American origin",
        );
        let event = parse_message("#en.wikipedia", &line, true).unwrap();
        assert_eq!(event.article.to_string(), "en:Juniata_River");
        assert_eq!(event.language, "en");
        assert_eq!(event.editor, "Johanna-Hypatia");
        assert_eq!(event.editor_key(), "en:Johanna-Hypatia");
        assert_eq!(event.delta, 67);
        assert_eq!(event.comment, "Place names of Native American origin");
        assert_eq!(event.flags, "M");
        assert_eq!(
            event.revisions,
            Some(Revisions {
                current: 516269072,
                previous: 514659029
            })
        );
        assert!(event.diff_url.is_some());
        assert!(!event.is_bot);
    }

    #[test]
    fn test_rejects_namespace_pages() {
        let line = relay_line(
            "Talk:Juniata River",
            "",
            "http://en.wikipedia.org/w/index.php?diff=2&oldid=1",
            "Someone",
            "(+5) reply",
        );
        assert_eq!(
            parse_message("#en.wikipedia", &line, true),
            Err(Rejection::Namespace)
        );
    }

    #[test]
    fn test_bot_policy() {
        let flagged = relay_line(
            "Berlin",
            "B",
            "http://de.wikipedia.org/w/index.php?diff=2&oldid=1",
            "Helper",
            "(-3) typo",
        );
        assert_eq!(
            parse_message("#de.wikipedia", &flagged, true),
            Err(Rejection::Bot)
        );

        let named = relay_line(
            "Berlin",
            "M",
            "http://de.wikipedia.org/w/index.php?diff=2&oldid=1",
            "CleanupBOT",
            "(-3) typo",
        );
        assert_eq!(
            parse_message("#de.wikipedia", &named, true),
            Err(Rejection::Bot)
        );

        // with the policy off the edit is kept but still marked
        let kept = parse_message("#de.wikipedia", &named, false).unwrap();
        assert!(kept.is_bot);
    }

    #[test]
    fn test_new_page_has_no_diff() {
        let line = relay_line(
            "Brand New Article",
            "N",
            "http://en.wikipedia.org/w/index.php?oldid=123&rcid=456",
            "Author",
            "(+1234) created page",
        );
        let event = parse_message("#en.wikipedia", &line, true).unwrap();
        assert_eq!(event.revisions, None);
        assert_eq!(event.diff_url, None);
        assert_eq!(event.delta, 1234);
    }

    #[test]
    fn test_knowledge_base_channel() {
        let line = relay_line(
            "Q42",
            "",
            "https://www.wikidata.org/w/index.php?diff=900&oldid=899",
            "192.0.2.7",
            "(-12) /* wbsetlabel-set:1|de */ Douglas Adams",
        );
        let event = parse_message("#wikidata.wikipedia", &line, true).unwrap();
        assert_eq!(event.language, "wikidata");
        assert_eq!(event.article.to_string(), "wikidata:Q42");
        assert_eq!(event.delta, -12);
        assert_eq!(event.comment, "/* wbsetlabel-set:1|de */ Douglas Adams");
    }

    #[test]
    fn test_rejects_lines_without_delta_or_title() {
        assert_eq!(
            parse_message("#en.wikipedia", "just chatting", true),
            Err(Rejection::NotRecentChange)
        );
        let no_delta = relay_line(
            "Berlin",
            "",
            "http://en.wikipedia.org/w/index.php?diff=2&oldid=1",
            "Someone",
            "no delta here",
        );
        assert_eq!(
            parse_message("#en.wikipedia", &no_delta, true),
            Err(Rejection::Malformed)
        );
    }

    #[test]
    fn test_language_from_channel() {
        assert_eq!(language_from_channel("#en.wikipedia"), Some("en"));
        assert_eq!(language_from_channel("#zh-yue.wikipedia"), Some("zh-yue"));
        assert_eq!(language_from_channel("#wikipedia"), None);
        assert_eq!(language_from_channel("en.wikipedia"), None);
    }

    #[test]
    fn test_strip_color_codes() {
        assert_eq!(
            strip_color_codes("\x0314[[\x0307Paris\x0314]]\x034 M\x0310"),
            "[[Paris]] M"
        );
    }
}
