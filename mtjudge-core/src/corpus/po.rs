//! Gettext PO catalog reader and writer.
//!
//! The header entry (`msgid ""`) and obsolete (`#~`) entries are skipped.
//! The ground-truth note of an entry is its extracted comment (`#.` lines).

use std::path::Path;

use super::EvaluationItem;
use crate::error::CorpusError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Msgctxt,
    Msgid,
    MsgidPlural,
    Msgstr,
    MsgstrIndexed(usize),
}

#[derive(Debug, Default)]
struct PendingEntry {
    notes: Vec<String>,
    msgctxt: Option<String>,
    msgid: Option<String>,
    msgid_plural: Option<String>,
    msgstr: Option<String>,
    msgstr_first_plural: Option<String>,
    obsolete: bool,
    current: Option<Field>,
    start_line: usize,
}

impl PendingEntry {
    fn has_translation(&self) -> bool {
        self.msgstr.is_some() || self.msgstr_first_plural.is_some()
    }

    fn is_blank(&self) -> bool {
        self.msgid.is_none() && self.msgctxt.is_none() && !self.has_translation()
    }

    fn append(&mut self, field: Field, text: &str) {
        let slot = match field {
            Field::Msgctxt => &mut self.msgctxt,
            Field::Msgid => &mut self.msgid,
            Field::MsgidPlural => &mut self.msgid_plural,
            Field::Msgstr => &mut self.msgstr,
            Field::MsgstrIndexed(0) => &mut self.msgstr_first_plural,
            // Only the first plural form is evaluated.
            Field::MsgstrIndexed(_) => return,
        };
        slot.get_or_insert_with(String::new).push_str(text);
    }
}

/// Parse a PO catalog into evaluation items, in file order.
pub fn parse_po(content: &str, path: &Path) -> Result<Vec<EvaluationItem>, CorpusError> {
    let malformed = |line: usize, message: &str| CorpusError::Malformed {
        path: path.to_path_buf(),
        message: format!("line {}: {}", line, message),
    };

    let mut items = Vec::new();
    let mut entry = PendingEntry::default();

    for (idx, raw_line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();

        if line.is_empty() {
            flush(&mut entry, &mut items, path)?;
            continue;
        }

        if line.starts_with("#~") {
            if entry.has_translation() && !entry.obsolete {
                flush(&mut entry, &mut items, path)?;
            }
            entry.obsolete = true;
            continue;
        }

        if let Some(comment) = line.strip_prefix('#') {
            if entry.has_translation() {
                flush(&mut entry, &mut items, path)?;
            }
            if let Some(extracted) = comment.strip_prefix('.') {
                entry.notes.push(extracted.trim().to_string());
            }
            continue;
        }

        if line.starts_with('"') {
            let field = entry
                .current
                .ok_or_else(|| malformed(line_no, "string continuation without a keyword"))?;
            let text = parse_quoted(line).ok_or_else(|| malformed(line_no, "invalid quoted string"))?;
            entry.append(field, &text);
            continue;
        }

        let (keyword, rest) = line
            .split_once(char::is_whitespace)
            .ok_or_else(|| malformed(line_no, "expected keyword followed by a string"))?;
        let field = match keyword {
            "msgctxt" => Field::Msgctxt,
            "msgid" => Field::Msgid,
            "msgid_plural" => Field::MsgidPlural,
            "msgstr" => Field::Msgstr,
            other => {
                let index = other
                    .strip_prefix("msgstr[")
                    .and_then(|s| s.strip_suffix(']'))
                    .and_then(|s| s.parse::<usize>().ok())
                    .ok_or_else(|| malformed(line_no, &format!("unknown keyword '{}'", other)))?;
                Field::MsgstrIndexed(index)
            }
        };

        if matches!(field, Field::Msgctxt | Field::Msgid) && entry.has_translation() {
            flush(&mut entry, &mut items, path)?;
        }
        if entry.is_blank() {
            entry.start_line = line_no;
        }

        let text = parse_quoted(rest.trim()).ok_or_else(|| malformed(line_no, "invalid quoted string"))?;
        entry.current = Some(field);
        entry.append(field, &text);
    }
    flush(&mut entry, &mut items, path)?;

    Ok(items)
}

fn flush(
    entry: &mut PendingEntry,
    items: &mut Vec<EvaluationItem>,
    path: &Path,
) -> Result<(), CorpusError> {
    let done = std::mem::take(entry);
    if done.obsolete || done.is_blank() {
        return Ok(());
    }

    let Some(msgid) = done.msgid else {
        return Err(CorpusError::Malformed {
            path: path.to_path_buf(),
            message: format!("line {}: entry without msgid", done.start_line),
        });
    };
    let Some(msgstr) = done.msgstr.or(done.msgstr_first_plural) else {
        return Err(CorpusError::Malformed {
            path: path.to_path_buf(),
            message: format!("line {}: entry without msgstr", done.start_line),
        });
    };

    // Header entry carries catalog metadata, not a sentence pair.
    if msgid.is_empty() && done.msgctxt.is_none() {
        return Ok(());
    }

    let note = if done.notes.is_empty() {
        None
    } else {
        Some(done.notes.join("\n"))
    };
    items.push(EvaluationItem::new(msgid, msgstr, note));
    Ok(())
}

/// Decode a `"..."` PO string literal.
fn parse_quoted(literal: &str) -> Option<String> {
    let inner = literal.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            if ch == '"' {
                return None;
            }
            out.push(ch);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0C}'),
            'v' => out.push('\u{0B}'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Some(out)
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out
}

/// Serialize items as a PO catalog for `language`. Notes become `#.` comments.
pub fn write_po(items: &[EvaluationItem], project: &str, language: &str) -> String {
    let mut out = String::new();
    out.push_str("msgid \"\"\nmsgstr \"\"\n");
    out.push_str(&format!("\"Project-Id-Version: {}\\n\"\n", escape(project)));
    out.push_str(&format!("\"Language: {}\\n\"\n", escape(language)));
    out.push_str("\"MIME-Version: 1.0\\n\"\n");
    out.push_str("\"Content-Type: text/plain; charset=UTF-8\\n\"\n");
    out.push_str("\"Content-Transfer-Encoding: 8bit\\n\"\n");

    for item in items {
        out.push('\n');
        if let Some(note) = &item.note {
            for line in note.lines() {
                out.push_str(&format!("#. {}\n", line));
            }
        }
        out.push_str(&format!("msgid \"{}\"\n", escape(&item.source)));
        out.push_str(&format!("msgstr \"{}\"\n", escape(&item.target)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(content: &str) -> Result<Vec<EvaluationItem>, CorpusError> {
        parse_po(content, Path::new("test.po"))
    }

    #[test]
    fn test_parse_skips_header_and_reads_notes() {
        let content = r#"# Catalan translation for GNOME.
msgid ""
msgstr ""
"Project-Id-Version: gnome-ui\n"
"Language: ca\n"

#. Wrong verb tense
#. Should be imperative
#: src/main.c:42
msgid "Save the file"
msgstr "Desava el fitxer"

#: src/main.c:50
msgid "Quit"
msgstr "Surt"
"#;
        let items = parse(content).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].source, "Save the file");
        assert_eq!(items[0].target, "Desava el fitxer");
        assert_eq!(
            items[0].note.as_deref(),
            Some("Wrong verb tense\nShould be imperative")
        );
        assert_eq!(items[1].note, None);
    }

    #[test]
    fn test_parse_multiline_and_escapes() {
        let content = r#"msgid ""
"Line one\n"
"Line \"two\""
msgstr "Línia u\nLínia \"dos\""
"#;
        let items = parse(content).unwrap();
        assert_eq!(items[0].source, "Line one\nLine \"two\"");
        assert_eq!(items[0].target, "Línia u\nLínia \"dos\"");
    }

    #[test]
    fn test_parse_plural_uses_first_form() {
        let content = r#"msgid "%d file"
msgid_plural "%d files"
msgstr[0] "%d fitxer"
msgstr[1] "%d fitxers"
"#;
        let items = parse(content).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].target, "%d fitxer");
    }

    #[test]
    fn test_parse_entries_without_blank_separator() {
        let content = "msgid \"A\"\nmsgstr \"a\"\nmsgid \"B\"\nmsgstr \"b\"\n";
        let items = parse(content).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].source, "B");
    }

    #[test]
    fn test_parse_skips_obsolete_entries() {
        let content = r#"msgid "Live"
msgstr "Viu"

#~ msgid "Dead"
#~ msgstr "Mort"
"#;
        let items = parse(content).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source, "Live");
    }

    #[test]
    fn test_parse_context_entry_with_empty_msgid_is_kept() {
        let content = "msgctxt \"menu\"\nmsgid \"\"\nmsgstr \"\"\n";
        let items = parse(content).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse("this is not a catalog"),
            Err(CorpusError::Malformed { .. })
        ));
        assert!(matches!(
            parse("msgid \"unterminated\n"),
            Err(CorpusError::Malformed { .. })
        ));
        assert!(matches!(
            parse("msgid \"no translation\"\n"),
            Err(CorpusError::Malformed { .. })
        ));
    }

    #[test]
    fn test_write_then_parse_preserves_items() {
        let items = vec![
            EvaluationItem::new("Tab\there", "Tabulador\taquí", Some("two\nlines".into())),
            EvaluationItem::new("Back\\slash", "Barra \"inversa\"", None),
        ];
        let catalog = write_po(&items, "merged-tmx", "ca");
        assert!(catalog.starts_with("msgid \"\"\nmsgstr \"\"\n"));
        assert_eq!(parse(&catalog).unwrap(), items);
    }
}
