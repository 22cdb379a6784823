//! Directive-style configuration files (`Keyword value` per line).
//!
//! A file is parsed into an ordered sequence of typed lines. Edits are made
//! structurally and the document is re-serialized with every untouched line
//! reproduced verbatim.

mod mutator;

pub use mutator::{backup_path, is_backup_artifact, ConfigError, ConfigMutator, BACKUP_STAMP_FORMAT};

use std::fmt;

/// A `Keyword value` line, possibly commented out (`#Port 22`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub raw: String,
    pub indent: String,
    pub key: String,
    pub value: String,
    pub commented: bool,
}

impl Directive {
    fn active(indent: &str, key: &str, value: &str) -> Self {
        Self {
            raw: format!("{}{} {}", indent, key, value),
            indent: indent.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            commented: false,
        }
    }

    pub fn matches(&self, key: &str) -> bool {
        self.key.eq_ignore_ascii_case(key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Blank(String),
    Comment(String),
    Directive(Directive),
    Other(String),
}

impl Line {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim_start();
        let indent = &raw[..raw.len() - trimmed.len()];
        if trimmed.trim().is_empty() {
            return Line::Blank(raw.to_string());
        }

        // `#Port 22` is a disabled directive; `# Port forwarding ...` and
        // `#port forwarding is off` are prose.
        if let Some(rest) = trimmed.strip_prefix('#') {
            let body = rest.trim_start_matches('#');
            return match split_directive(body).filter(|(key, value)| looks_disabled(key, value)) {
                Some((key, value)) => Line::Directive(Directive {
                    raw: raw.to_string(),
                    indent: indent.to_string(),
                    key: key.to_string(),
                    value: value.to_string(),
                    commented: true,
                }),
                None => Line::Comment(raw.to_string()),
            };
        }

        match split_directive(trimmed) {
            Some((key, value)) => Line::Directive(Directive {
                raw: raw.to_string(),
                indent: indent.to_string(),
                key: key.to_string(),
                value: value.to_string(),
                commented: false,
            }),
            None => Line::Other(raw.to_string()),
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            Line::Blank(raw) | Line::Comment(raw) | Line::Other(raw) => raw,
            Line::Directive(d) => &d.raw,
        }
    }

    pub fn directive(&self) -> Option<&Directive> {
        match self {
            Line::Directive(d) => Some(d),
            _ => None,
        }
    }
}

/// `Keyword value` or `Keyword=value`. The keyword must start with a letter and
/// be alphanumeric; anything else is not a directive.
fn split_directive(s: &str) -> Option<(&str, &str)> {
    let key_len = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_alphanumeric())
        .map(|(idx, _)| idx)
        .unwrap_or(s.len());
    if key_len == 0 || !s.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }

    let (key, rest) = s.split_at(key_len);
    if rest.is_empty() {
        return Some((key, ""));
    }
    if !rest.starts_with(|c: char| c.is_whitespace() || c == '=') {
        return None;
    }
    let value = rest
        .trim_start()
        .strip_prefix('=')
        .unwrap_or_else(|| rest.trim_start())
        .trim();
    Some((key, value))
}

/// Commented keywords are CamelCase and carry at most two value tokens, as in
/// the stock `#AuthorizedKeysFile .ssh/authorized_keys .ssh/authorized_keys2`.
fn looks_disabled(key: &str, value: &str) -> bool {
    key.starts_with(|c: char| c.is_ascii_uppercase()) && value.split_whitespace().count() <= 2
}

/// Line terminator as found in the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
    /// Last line of a file without a trailing newline.
    Missing,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::Missing => "",
        }
    }

    /// Split one `split_inclusive('\n')` chunk into its body and terminator.
    fn split(chunk: &str) -> (&str, Self) {
        match chunk.strip_suffix('\n') {
            Some(body) => match body.strip_suffix('\r') {
                Some(body) => (body, LineEnding::CrLf),
                None => (body, LineEnding::Lf),
            },
            None => (chunk, LineEnding::Missing),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    line: Line,
    ending: LineEnding,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    entries: Vec<Entry>,
}

impl ConfigDocument {
    pub fn parse(content: &str) -> Self {
        let entries = content
            .split_inclusive('\n')
            .map(|chunk| {
                let (body, ending) = LineEnding::split(chunk);
                Entry {
                    line: Line::parse(body),
                    ending,
                }
            })
            .collect();
        Self { entries }
    }

    pub fn lines(&self) -> impl Iterator<Item = &Line> + '_ {
        self.entries.iter().map(|entry| &entry.line)
    }

    /// Terminator used for new lines: the file's first one, `\n` for an empty file.
    fn preferred_ending(&self) -> LineEnding {
        self.entries
            .iter()
            .map(|entry| entry.ending)
            .find(|ending| *ending != LineEnding::Missing)
            .unwrap_or_default()
    }

    fn append(&mut self, line: Line) {
        let ending = self.preferred_ending();
        if let Some(last) = self.entries.last_mut() {
            if last.ending == LineEnding::Missing {
                last.ending = ending;
            }
        }
        self.entries.push(Entry { line, ending });
    }

    /// Indices of every line (commented or not) carrying `key`.
    pub fn positions(&self, key: &str) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.line.directive().is_some_and(|d| d.matches(key)))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Active (uncommented) occurrences of `key`.
    pub fn active(&self, key: &str) -> Vec<&Directive> {
        self.lines()
            .filter_map(Line::directive)
            .filter(|d| !d.commented && d.matches(key))
            .collect()
    }

    /// Make `key value` the single line for `key`.
    ///
    /// The last existing occurrence (commented or not) is rewritten in place and
    /// every other occurrence is dropped; with no occurrence the line is appended.
    pub fn upsert(&mut self, key: &str, value: &str) {
        let positions = self.positions(key);
        let Some(&last) = positions.last() else {
            self.append(Line::Directive(Directive::active("", key, value)));
            return;
        };

        let indent = self.entries[last]
            .line
            .directive()
            .map(|d| d.indent.clone())
            .unwrap_or_default();
        self.entries[last].line = Line::Directive(Directive::active(&indent, key, value));

        for &idx in positions[..positions.len() - 1].iter().rev() {
            self.entries.remove(idx);
        }
    }

    /// Keep only the last line carrying `key` (commented or not). Returns how many
    /// earlier lines were removed.
    pub fn retain_last(&mut self, key: &str) -> usize {
        let positions = self.positions(key);
        if positions.len() < 2 {
            return 0;
        }
        let stale = &positions[..positions.len() - 1];
        for &idx in stale.iter().rev() {
            self.entries.remove(idx);
        }
        stale.len()
    }
}

impl fmt::Display for ConfigDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            f.write_str(entry.line.raw())?;
            f.write_str(entry.ending.as_str())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_lines() {
        assert!(matches!(Line::parse(""), Line::Blank(_)));
        assert!(matches!(Line::parse("   \t"), Line::Blank(_)));
        assert!(matches!(Line::parse("#"), Line::Comment(_)));
        assert!(matches!(Line::parse("# $OpenBSD: sshd_config,v 1.104"), Line::Comment(_)));
        assert!(matches!(Line::parse("# Port forwarding is off"), Line::Comment(_)));
        assert!(matches!(Line::parse("#port forwarding is off"), Line::Comment(_)));
        assert!(matches!(Line::parse("#Port forwarding is off"), Line::Comment(_)));
        assert!(Line::parse("#AuthorizedKeysFile .ssh/authorized_keys .ssh/authorized_keys2")
            .directive()
            .is_some_and(|d| d.commented));
        assert!(matches!(Line::parse("*weird*"), Line::Other(_)));

        let port = Line::parse("Port 22");
        let d = port.directive().unwrap();
        assert_eq!((d.key.as_str(), d.value.as_str(), d.commented), ("Port", "22", false));

        let commented = Line::parse("#PermitRootLogin prohibit-password");
        let d = commented.directive().unwrap();
        assert_eq!(d.key, "PermitRootLogin");
        assert_eq!(d.value, "prohibit-password");
        assert!(d.commented);

        let eq = Line::parse("  UsePAM=yes");
        let d = eq.directive().unwrap();
        assert_eq!((d.indent.as_str(), d.key.as_str(), d.value.as_str()), ("  ", "UsePAM", "yes"));
    }

    #[test]
    fn serialization_preserves_untouched_lines() {
        let content = "# header\n\nInclude /etc/ssh/sshd_config.d/*.conf\n  Weird   spacing here \n";
        let doc = ConfigDocument::parse(content);
        assert_eq!(doc.to_string(), content);
    }

    #[test]
    fn upsert_appends_when_missing() {
        let mut doc = ConfigDocument::parse("# nothing here\n");
        doc.upsert("Port", "2222");
        assert_eq!(doc.to_string(), "# nothing here\nPort 2222\n");
    }

    #[test]
    fn upsert_rewrites_last_occurrence_and_drops_the_rest() {
        let mut doc = ConfigDocument::parse(
            "#Port 22\nAddressFamily any\nport 2200\nListenAddress 0.0.0.0\n#Port 9999\nUsePAM yes\n",
        );
        doc.upsert("Port", "4242");
        assert_eq!(
            doc.to_string(),
            "AddressFamily any\nListenAddress 0.0.0.0\nPort 4242\nUsePAM yes\n"
        );
        assert_eq!(doc.active("port").len(), 1);
    }

    #[test]
    fn upsert_keeps_indentation_of_replaced_line() {
        let mut doc = ConfigDocument::parse("Match User backup\n    PasswordAuthentication yes\n");
        doc.upsert("PasswordAuthentication", "no");
        assert_eq!(doc.to_string(), "Match User backup\n    PasswordAuthentication no\n");
    }

    #[test]
    fn retain_last_only_touches_the_named_key() {
        let mut doc = ConfigDocument::parse("Port 22\n#Port 23\nUsePAM yes\nPort 4242\n");
        assert_eq!(doc.retain_last("Port"), 2);
        assert_eq!(doc.to_string(), "UsePAM yes\nPort 4242\n");
        assert_eq!(doc.retain_last("Port"), 0);
    }

    #[test]
    fn upsert_keeps_crlf_endings_and_missing_final_newline() {
        let mut doc = ConfigDocument::parse("X11Forwarding yes\r\nPort 22\r\nUsePAM yes");
        doc.upsert("Port", "4242");
        assert_eq!(doc.to_string(), "X11Forwarding yes\r\nPort 4242\r\nUsePAM yes");

        doc.upsert("PermitRootLogin", "no");
        assert_eq!(
            doc.to_string(),
            "X11Forwarding yes\r\nPort 4242\r\nUsePAM yes\r\nPermitRootLogin no\r\n"
        );
    }

    #[test]
    fn unterminated_file_round_trips() {
        let content = "# header\r\nUsePAM yes";
        assert_eq!(ConfigDocument::parse(content).to_string(), content);
        assert_eq!(ConfigDocument::parse("").to_string(), "");
    }

    #[test]
    fn prose_comment_survives_port_sweep() {
        let mut doc = ConfigDocument::parse("#port forwarding is off\nPort 22\n#Port 2200\n");
        assert_eq!(doc.retain_last("Port"), 1);
        assert_eq!(doc.to_string(), "#port forwarding is off\n#Port 2200\n");
    }
}
