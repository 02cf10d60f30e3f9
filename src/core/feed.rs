//! XML roster feed parsing.
//!
//! The document has one root element holding zero or more `<student>`
//! elements; each student carries one child element per feed field.

use crate::domain::model::RawRecord;
use crate::utils::error::{ImportError, Result};
use quick_xml::events::Event;
use quick_xml::reader::Reader;

pub const STUDENT_ELEMENT: &str = "student";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub root: String,
    /// `None` when the root holds no `<student>` element at all.
    pub students: Option<Vec<RawRecord>>,
}

impl Feed {
    pub fn len(&self) -> usize {
        self.students.as_ref().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_error(message: impl Into<String>) -> ImportError {
    ImportError::ParseError {
        message: message.into(),
    }
}

fn assign_field(record: &mut RawRecord, field: &str, value: String) {
    let slot = match field {
        "ID" => &mut record.external_id,
        "name" => &mut record.lastname,
        "vorname" => &mut record.firstname,
        "matrikelnummer" => &mut record.matriculation_number,
        "buergerort" => &mut record.city,
        "geburtstag" => &mut record.date_of_birth,
        "studiengang" => &mut record.program_title,
        "benutzer" => &mut record.login,
        "passwort" => &mut record.password,
        other => {
            tracing::debug!("Ignoring unknown feed field <{}>", other);
            return;
        }
    };
    *slot = value;
}

fn open_root(root: &mut Option<String>, local: String) -> Result<()> {
    if let Some(existing) = root {
        return Err(parse_error(format!(
            "Second root element <{}> after <{}>",
            local, existing
        )));
    }
    *root = Some(local);
    Ok(())
}

fn is_blank(bytes: &[u8]) -> bool {
    String::from_utf8_lossy(bytes)
        .trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
        .is_empty()
}

/// Parses the whole document; any structural problem fails the parse.
pub fn parse_feed(bytes: &[u8]) -> Result<Feed> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut root: Option<String> = None;
    let mut students: Option<Vec<RawRecord>> = None;
    let mut current: Option<RawRecord> = None;
    let mut field: Option<String> = None;
    let mut text = String::new();
    let mut depth = 0usize;

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                depth += 1;
                let local = String::from_utf8_lossy(e.local_name().into_inner()).to_string();
                match depth {
                    1 => open_root(&mut root, local)?,
                    2 if local == STUDENT_ELEMENT => {
                        students.get_or_insert_with(Vec::new);
                        current = Some(RawRecord::default());
                    }
                    3 if current.is_some() => {
                        field = Some(local);
                        text.clear();
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().into_inner()).to_string();
                match depth {
                    0 => open_root(&mut root, local)?,
                    1 if local == STUDENT_ELEMENT => {
                        students
                            .get_or_insert_with(Vec::new)
                            .push(RawRecord::default());
                    }
                    // <benutzer/> 之類的空欄位
                    2 => {
                        if let Some(record) = current.as_mut() {
                            assign_field(record, &local, String::new());
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) if depth == 0 => {
                if !is_blank(e) {
                    return Err(parse_error(format!(
                        "Text outside the root element at position {}",
                        reader.buffer_position()
                    )));
                }
            }
            Ok(Event::CData(_)) if depth == 0 => {
                return Err(parse_error("CDATA outside the root element"));
            }
            Ok(Event::Text(ref e)) => {
                if depth == 3 && field.is_some() {
                    let value = e
                        .unescape()
                        .map_err(|e| parse_error(format!("XML text error: {e}")))?;
                    text.push_str(&value);
                }
            }
            Ok(Event::CData(ref e)) => {
                if depth == 3 && field.is_some() {
                    let value = std::str::from_utf8(e)
                        .map_err(|e| parse_error(format!("Invalid UTF-8 in CDATA: {e}")))?;
                    text.push_str(value);
                }
            }
            Ok(Event::End(_)) => {
                match depth {
                    3 => {
                        if let (Some(record), Some(name)) = (current.as_mut(), field.take()) {
                            assign_field(record, &name, std::mem::take(&mut text));
                        }
                    }
                    2 => {
                        if let Some(record) = current.take() {
                            students.get_or_insert_with(Vec::new).push(record);
                        }
                    }
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(parse_error(format!(
                    "XML parse error at position {}: {e}",
                    reader.error_position()
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    if depth != 0 {
        return Err(parse_error("Unexpected end of document"));
    }

    let root = root.ok_or_else(|| parse_error("Document has no root element"))?;

    Ok(Feed { root, students })
}
