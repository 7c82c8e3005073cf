use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;
use xml::common::XmlVersion;
use xml::writer::{EmitterConfig, EventWriter, XmlEvent};

use crate::data_dictionary::*;
use crate::dictionary_errors::*;

const INDENT: &str = "  ";

impl FixDictionary {
    /// Serializes the dictionary in QuickFIX section order:
    /// header, messages, trailer, components, fields.
    pub fn write_xml<W: Write>(&self, sink: W) -> DResult<()> {
        let mut writer = EmitterConfig::new()
            .perform_indent(true)
            .indent_string(INDENT)
            .create_writer(sink);
        writer.write(XmlEvent::StartDocument {
            version: XmlVersion::Version10,
            encoding: Some("utf-8"),
            standalone: None,
        })?;
        start_element(&mut writer, ROOT_ID, &self.attributes)?;

        if let Some(header) = &self.header {
            write_section(&mut writer, HEADER_ID, header)?;
        }

        writer.write(XmlEvent::start_element(MESSAGES_ID))?;
        for msg in self.messages.values() {
            start_element(&mut writer, "message", msg.attributes())?;
            write_members(&mut writer, msg.members())?;
            writer.write(XmlEvent::end_element())?;
        }
        writer.write(XmlEvent::end_element())?;

        if let Some(trailer) = &self.trailer {
            write_section(&mut writer, TRAILER_ID, trailer)?;
        }

        if !self.components.is_empty() {
            writer.write(XmlEvent::start_element(COMPONENTS_ID))?;
            for comp in self.components.values() {
                start_element(&mut writer, "component", comp.attributes())?;
                write_members(&mut writer, comp.members())?;
                writer.write(XmlEvent::end_element())?;
            }
            writer.write(XmlEvent::end_element())?;
        }

        writer.write(XmlEvent::start_element(FIELDS_ID))?;
        for field in self.fields.values() {
            start_element(&mut writer, "field", field.attributes())?;
            for value in field.values() {
                start_element(&mut writer, "value", value.attributes())?;
                writer.write(XmlEvent::end_element())?;
            }
            writer.write(XmlEvent::end_element())?;
        }
        writer.write(XmlEvent::end_element())?;

        // </fix>
        writer.write(XmlEvent::end_element())?;
        Ok(())
    }

    pub fn to_xml_string(&self) -> DResult<String> {
        let mut buff: Vec<u8> = Vec::new();
        self.write_xml(&mut buff)?;
        Ok(String::from_utf8_lossy(&buff).into_owned())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> DResult<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| DictError::from_io(path.to_path_buf(), e))?;
        let mut out = BufWriter::new(file);
        self.write_xml(&mut out)?;
        out.flush().map_err(|e| DictError::from_io(path.to_path_buf(), e))?;
        debug!(path = %path.display(), "dictionary written");
        Ok(())
    }
}

fn start_element<W: Write>(
    writer: &mut EventWriter<W>, tag: &str, attributes: &Attributes,
) -> DResult<()> {
    let mut event = XmlEvent::start_element(tag);
    for (name, value) in attributes {
        event = event.attr(name.as_str(), value.as_str());
    }
    writer.write(event)?;
    Ok(())
}

fn write_section<W: Write>(
    writer: &mut EventWriter<W>, tag: &str, members: &[Member],
) -> DResult<()> {
    writer.write(XmlEvent::start_element(tag))?;
    write_members(writer, members)?;
    writer.write(XmlEvent::end_element())?;
    Ok(())
}

fn write_members<W: Write>(writer: &mut EventWriter<W>, members: &[Member]) -> DResult<()> {
    for member in members {
        start_element(writer, member.kind().tag_name(), member.attributes())?;
        // only groups nest
        write_members(writer, member.members())?;
        writer.write(XmlEvent::end_element())?;
    }
    Ok(())
}
