//! Literal commands intercepted before any oracle call.

pub const STYLE_MARKER: &str = "configurar estilo";
pub const STYLE_DELIMITER: char = ':';

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StyleCommand {
    Set(String),
    MissingTag,
}

/// Recognises `configurar estilo: <tag>` anywhere in the utterance. The tag is
/// everything after the first delimiter, trimmed and lower-cased, and is not
/// checked against the known styles.
pub fn parse_style_command(utterance: &str) -> Option<StyleCommand> {
    let lowered = utterance.to_lowercase();
    let marker_at = lowered.find(STYLE_MARKER)?;
    let after_marker = lowered[marker_at + STYLE_MARKER.len()..].trim_start();
    if !after_marker.starts_with(STYLE_DELIMITER) {
        return None;
    }

    let (_, tag) = utterance.split_once(STYLE_DELIMITER)?;
    let tag = tag.trim().to_lowercase();
    if tag.is_empty() {
        Some(StyleCommand::MissingTag)
    } else {
        Some(StyleCommand::Set(tag))
    }
}

pub fn style_confirmation(tag: &str) -> String {
    format!("Style updated to: {tag}")
}

pub fn style_usage() -> String {
    format!("Tell me which style to use, for example \"{STYLE_MARKER}{STYLE_DELIMITER} friendly\".")
}

#[cfg(test)]
mod tests {
    use super::{parse_style_command, StyleCommand};

    #[test]
    fn tag_after_first_delimiter_is_lowercased_verbatim() {
        assert_eq!(
            parse_style_command("configurar estilo: Chistes"),
            Some(StyleCommand::Set("chistes".into()))
        );
        assert_eq!(
            parse_style_command("Por favor CONFIGURAR ESTILO : serio "),
            Some(StyleCommand::Set("serio".into()))
        );
        assert_eq!(
            parse_style_command("configurar estilo: modo: pirata"),
            Some(StyleCommand::Set("modo: pirata".into()))
        );
    }

    #[test]
    fn marker_without_delimiter_is_not_a_command() {
        assert_eq!(parse_style_command("quiero configurar estilo"), None);
        assert_eq!(parse_style_command("list my events"), None);
        assert_eq!(parse_style_command("configurar estilo:   "), Some(StyleCommand::MissingTag));
    }
}
