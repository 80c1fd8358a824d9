//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YIN reader (RFC 7950 section 13).

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::parser::stmt::{yin_arg, Stmt};

pub(crate) const YIN_NAMESPACE: &str = "urn:ietf:params:xml:ns:yang:yin:1";

struct Frame {
    stmt: Stmt,
    // Argument carried by a child element (`<text>`, `<value>`).
    arg_element: Option<&'static str>,
    in_arg_element: bool,
}

/// Parse YIN text into its top-level statement.
pub(crate) fn parse_yin(src: &str) -> Result<Stmt> {
    let mut reader = Reader::from_str(src);
    let mut stack: Vec<Frame> = Vec::new();
    let mut top: Option<Stmt> = None;

    loop {
        let line = line_at(src, reader.buffer_position() as usize);
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                if let Some(frame) = stack.last_mut() {
                    if frame.arg_element == Some(local_name(&e)?.as_str()) {
                        frame.in_arg_element = true;
                        frame.stmt.arg.get_or_insert_with(String::new);
                        continue;
                    }
                }
                stack.push(start_frame(&e, line)?);
            }
            Event::Empty(e) => {
                if let Some(frame) = stack.last_mut() {
                    if frame.arg_element == Some(local_name(&e)?.as_str()) {
                        frame.stmt.arg.get_or_insert_with(String::new);
                        continue;
                    }
                }
                let frame = start_frame(&e, line)?;
                close_frame(&mut stack, &mut top, frame)?;
            }
            Event::End(_) => {
                if let Some(frame) = stack.last_mut() {
                    if frame.in_arg_element {
                        frame.in_arg_element = false;
                        continue;
                    }
                }
                match stack.pop() {
                    Some(frame) => close_frame(&mut stack, &mut top, frame)?,
                    None => return Err(Error::syntax("Unbalanced YIN element")),
                }
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(xml_error)?;
                if let Some(frame) = stack.last_mut() {
                    if frame.in_arg_element {
                        if let Some(arg) = &mut frame.stmt.arg {
                            arg.push_str(&text);
                        }
                    } else if frame.arg_element.is_none()
                        && frame.stmt.is_extension()
                        && !text.trim().is_empty()
                    {
                        frame.stmt.arg = Some(text.into_owned());
                    }
                }
            }
            Event::CData(e) => {
                let bytes = e.into_inner();
                if let Some(frame) = stack.last_mut() {
                    if frame.in_arg_element {
                        if let Some(arg) = &mut frame.stmt.arg {
                            arg.push_str(&String::from_utf8_lossy(&bytes));
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => (),
        }
    }

    if !stack.is_empty() {
        return Err(Error::syntax("Unexpected end of YIN input"));
    }
    top.ok_or_else(|| Error::syntax("Empty YIN input"))
}

fn start_frame(e: &BytesStart<'_>, line: u32) -> Result<Frame> {
    let local = local_name(e)?;
    let prefix = e
        .name()
        .prefix()
        .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned());
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| Error::syntax(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if key == "xmlns" || key.starts_with("xmlns:") {
            continue;
        }
        let value = attr.unescape_value().map_err(xml_error)?.into_owned();
        attrs.push((key, value));
    }

    let is_yin = match &prefix {
        None => true,
        Some(prefix) => prefix == "yin",
    };
    if !is_yin {
        // Extension instance: the argument is its only attribute, if any.
        let keyword = format!("{}:{}", prefix.unwrap_or_default(), local);
        let mut stmt = Stmt::new(keyword, attrs.into_iter().next().map(|a| a.1));
        stmt.line = line;
        return Ok(Frame {
            stmt,
            arg_element: None,
            in_arg_element: false,
        });
    }

    let spec = yin_arg(&local).map_err(|_| {
        Error::syntax(format!("Invalid YIN element \"{}\" (line {}).", local, line))
    })?;
    let mut stmt = Stmt::new(local.clone(), None);
    stmt.line = line;
    let mut arg_element = None;
    if let Some(spec) = spec {
        if spec.element {
            arg_element = Some(spec.name);
        } else {
            match attrs.into_iter().find(|(k, _)| k == spec.name) {
                Some((_, value)) => stmt.arg = Some(value),
                None => {
                    return Err(Error::syntax(format!(
                        "Missing attribute \"{}\" of \"{}\" (line {}).",
                        spec.name, local, line
                    )))
                }
            }
        }
    }
    Ok(Frame {
        stmt,
        arg_element,
        in_arg_element: false,
    })
}

fn close_frame(
    stack: &mut [Frame],
    top: &mut Option<Stmt>,
    frame: Frame,
) -> Result<()> {
    if frame.arg_element.is_some() && frame.stmt.arg.is_none() {
        return Err(Error::syntax(format!(
            "Missing argument element of \"{}\" (line {}).",
            frame.stmt.keyword, frame.stmt.line
        )));
    }
    match stack.last_mut() {
        Some(parent) => parent.stmt.substmts.push(frame.stmt),
        None => {
            if top.is_some() {
                return Err(Error::syntax("Multiple top-level YIN elements"));
            }
            *top = Some(frame.stmt);
        }
    }
    Ok(())
}

fn local_name(e: &BytesStart<'_>) -> Result<String> {
    Ok(String::from_utf8_lossy(e.local_name().as_ref()).into_owned())
}

fn line_at(src: &str, offset: usize) -> u32 {
    let offset = offset.min(src.len());
    src.as_bytes()[..offset].iter().filter(|b| **b == b'\n').count() as u32
        + 1
}

pub(crate) fn xml_error(err: impl std::fmt::Display) -> Error {
    Error::syntax(format!("Invalid XML: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yin_module() {
        let src = r#"<?xml version="1.0" encoding="UTF-8"?>
<module name="m" xmlns="urn:ietf:params:xml:ns:yang:yin:1" xmlns:m="urn:m">
  <namespace uri="urn:m"/>
  <prefix value="m"/>
  <description>
    <text>A module.</text>
  </description>
  <leaf name="x">
    <type name="string"/>
  </leaf>
</module>
"#;
        let stmt = parse_yin(src).unwrap();
        assert_eq!(stmt.keyword, "module");
        assert_eq!(stmt.arg.as_deref(), Some("m"));
        assert_eq!(stmt.find_arg("namespace"), Some("urn:m"));
        assert_eq!(stmt.find_arg("description"), Some("A module."));
        let leaf = stmt.find("leaf").unwrap();
        assert_eq!(leaf.find_arg("type"), Some("string"));
    }

    #[test]
    fn missing_attribute() {
        let src = r#"<module xmlns="urn:ietf:params:xml:ns:yang:yin:1"/>"#;
        assert!(parse_yin(src).is_err());
    }
}
