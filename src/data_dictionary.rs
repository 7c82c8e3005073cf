use std::collections::HashMap;
use std::{fmt, fs, path::Path, str::FromStr};

use getset::{CopyGetters, Getters};
use indexmap::IndexMap;
use roxmltree::{Document, Node};
use xml::reader::EventReader;

use crate::dictionary_errors::*;
use crate::report::{Report, Section};

/// Attributes of an xml element, in document order.
pub type Attributes = IndexMap<String, String>;

pub(crate) const ROOT_ID: &str = "fix";
pub(crate) const HEADER_ID: &str = "header";
pub(crate) const TRAILER_ID: &str = "trailer";
pub(crate) const MESSAGES_ID: &str = "messages";
pub(crate) const COMPONENTS_ID: &str = "components";
pub(crate) const FIELDS_ID: &str = "fields";

/// Tag of the MsgType field, whose enum values list every message type.
pub const MSG_TYPE_TAG: u32 = 35;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Field,
    Component,
    Group,
}

impl MemberKind {
    pub fn tag_name(&self) -> &'static str {
        match self {
            MemberKind::Field => "field",
            MemberKind::Component => "component",
            MemberKind::Group => "group",
        }
    }
}

impl FromStr for MemberKind {
    type Err = DictError;
    fn from_str(s: &str) -> Result<Self, DictError> {
        match s {
            "field" => Ok(MemberKind::Field),
            "component" => Ok(MemberKind::Component),
            "group" => Ok(MemberKind::Group),
            _ => Err(DictError::UnknownXmlTag(s.to_string())),
        }
    }
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag_name())
    }
}

/// A reference inside a message, component, group, header or trailer.
///
/// Field and group members name a field definition; the group name is its
/// NUMINGROUP counter. Component members name a component definition.
/// Only groups carry nested members.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct Member {
    #[getset(get_copy = "pub")]
    kind: MemberKind,
    #[getset(get = "pub")]
    name: String,
    #[getset(get_copy = "pub")]
    required: bool,
    #[getset(get = "pub")]
    attributes: Attributes,
    #[getset(get = "pub")]
    members: Vec<Member>,
}

impl Member {
    pub fn field(name: &str, required: bool) -> Self {
        Self::new(MemberKind::Field, name, required, Vec::new())
    }

    pub fn component(name: &str, required: bool) -> Self {
        Self::new(MemberKind::Component, name, required, Vec::new())
    }

    fn new(kind: MemberKind, name: &str, required: bool, members: Vec<Member>) -> Self {
        let mut attributes = Attributes::new();
        attributes.insert("name".to_string(), name.to_string());
        attributes.insert("required".to_string(), required_flag(required).to_string());
        Self {
            kind,
            name: name.to_string(),
            required,
            attributes,
            members,
        }
    }

    /// Points field and group references named `old` at `new`, nested
    /// group members included. Returns how many references changed.
    fn rename_field(&mut self, old: &str, new: &str) -> usize {
        let mut renamed = 0;
        if self.kind != MemberKind::Component && self.name == old {
            self.name = new.to_string();
            self.attributes.insert("name".to_string(), new.to_string());
            renamed += 1;
        }
        renamed + rename_field_in(&mut self.members, old, new)
    }
}

fn rename_field_in(members: &mut [Member], old: &str, new: &str) -> usize {
    members.iter_mut().map(|m| m.rename_field(old, new)).sum()
}

#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct Message {
    name: String,
    msg_type: String,
    attributes: Attributes,
    members: Vec<Member>,
}

impl Message {
    pub fn new(name: &str, msg_type: &str, msg_cat: &str, members: Vec<Member>) -> Self {
        let mut attributes = Attributes::new();
        attributes.insert("name".to_string(), name.to_string());
        attributes.insert("msgtype".to_string(), msg_type.to_string());
        attributes.insert("msgcat".to_string(), msg_cat.to_string());
        Self {
            name: name.to_string(),
            msg_type: msg_type.to_string(),
            attributes,
            members,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct Component {
    name: String,
    attributes: Attributes,
    members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct FieldDef {
    #[getset(get_copy = "pub")]
    number: u32,
    #[getset(get = "pub")]
    name: String,
    #[getset(get = "pub")]
    field_type: String,
    #[getset(get = "pub")]
    attributes: Attributes,
    #[getset(get = "pub")]
    values: Vec<FieldValue>,
}

impl FieldDef {
    pub fn new(number: u32, name: &str, field_type: &str, values: Vec<FieldValue>) -> Self {
        let mut attributes = Attributes::new();
        attributes.insert("number".to_string(), number.to_string());
        attributes.insert("name".to_string(), name.to_string());
        attributes.insert("type".to_string(), field_type.to_string());
        Self {
            number,
            name: name.to_string(),
            field_type: field_type.to_string(),
            attributes,
            values,
        }
    }

    /// Same tag, name and type. Enum values are not compared.
    pub fn same_definition(&self, other: &FieldDef) -> bool {
        self.number == other.number
            && self.name == other.name
            && self.field_type == other.field_type
    }

    pub fn has_value(&self, value: &str) -> bool {
        self.values.iter().any(|v| v.value == value)
    }

    pub(crate) fn push_value(&mut self, value: FieldValue) {
        self.values.push(value);
    }
}

impl fmt::Display for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}/{}", self.number, self.name, self.field_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct FieldValue {
    value: String,
    description: String,
    attributes: Attributes,
}

impl FieldValue {
    pub fn new(value: &str, description: &str) -> Self {
        let mut attributes = Attributes::new();
        attributes.insert("enum".to_string(), value.to_string());
        attributes.insert("description".to_string(), description.to_string());
        Self {
            value: value.to_string(),
            description: description.to_string(),
            attributes,
        }
    }
}

/// An in-memory FIX dictionary. Every table is keyed by its natural
/// identifier and keeps document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct FixDictionary {
    pub(crate) attributes: Attributes,
    pub(crate) header: Option<Vec<Member>>,
    pub(crate) trailer: Option<Vec<Member>>,
    pub(crate) messages: IndexMap<String, Message>,
    pub(crate) components: IndexMap<String, Component>,
    pub(crate) fields: IndexMap<u32, FieldDef>,
}

impl FixDictionary {
    pub fn new(attributes: Attributes) -> Self {
        Self {
            attributes,
            ..Default::default()
        }
    }

    pub fn from_xml<P: AsRef<Path>>(xml_file: P) -> DResult<Self> {
        Ok(FixDictionary::from_xml_with_report(xml_file)?.0)
    }

    /// Like [`FixDictionary::from_xml`], also returning the repeated
    /// definitions that were dropped while reading.
    pub fn from_xml_with_report<P: AsRef<Path>>(xml_file: P) -> DResult<(Self, Report)> {
        let path = xml_file.as_ref();
        let file_data =
            fs::read_to_string(path).map_err(|e| DictError::from_io(path.to_path_buf(), e))?;
        FixDictionary::parse(&file_data)
    }

    /// Parses a dictionary document. A repeated tag, field name, msgtype,
    /// component name or enum value keeps its first definition and is
    /// recorded in the returned report.
    pub fn parse(xml: &str) -> DResult<(Self, Report)> {
        let doc = Document::parse(xml)?;
        ensure_well_formed(xml)?;
        let root = doc.root_element();
        expect_tag_name(&root, ROOT_ID)?;
        let mut dd = FixDictionary::new(get_all_attributes(&root));
        let mut report = Report::default();
        for section in root.children().filter(|n| n.is_element()) {
            match section.tag_name().name() {
                HEADER_ID | TRAILER_ID => dd.add_header_or_trailer(section)?,
                MESSAGES_ID => dd.add_all_xml_messages(section, &mut report)?,
                COMPONENTS_ID => dd.add_all_xml_components(section, &mut report)?,
                FIELDS_ID => dd.add_fields_and_values(section, &mut report)?,
                other => return Err(DictError::UnknownXmlTag(other.to_string())),
            }
        }
        Ok((dd, report))
    }

    /// `FIX.4.4` style version string, or an empty string if the root
    /// attributes are incomplete.
    pub fn begin_string(&self) -> String {
        match (
            self.attributes.get("type"),
            self.attributes.get("major"),
            self.attributes.get("minor"),
        ) {
            (Some(t), Some(major), Some(minor)) => format!("{}.{}.{}", t, major, minor),
            _ => String::new(),
        }
    }

    pub fn message(&self, msg_type: &str) -> Option<&Message> {
        self.messages.get(msg_type)
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    pub fn field(&self, tag: u32) -> Option<&FieldDef> {
        self.fields.get(&tag)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDef> {
        self.fields.values().find(|f| f.name == name)
    }

    /// Name to tag index over the current field table.
    pub fn field_numbers_by_name(&self) -> HashMap<&str, u32> {
        self.fields.values().map(|f| (f.name.as_str(), f.number)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_none()
            && self.trailer.is_none()
            && self.messages.is_empty()
            && self.components.is_empty()
            && self.fields.is_empty()
    }

    /// Fails with the first field or component reference that has no
    /// definition in this dictionary.
    pub fn check_references(&self) -> DResult<()> {
        let names = self.field_numbers_by_name();
        if let Some(header) = &self.header {
            self.check_members(HEADER_ID, header, &names)?;
        }
        if let Some(trailer) = &self.trailer {
            self.check_members(TRAILER_ID, trailer, &names)?;
        }
        for msg in self.messages.values() {
            self.check_members(&format!("message {}", msg.msg_type), &msg.members, &names)?;
        }
        for comp in self.components.values() {
            self.check_members(&format!("component {}", comp.name), &comp.members, &names)?;
        }
        Ok(())
    }

    /// Renames every field and group reference from `old` to `new` across
    /// the header, trailer, messages and components.
    pub(crate) fn rename_field_references(&mut self, old: &str, new: &str) -> usize {
        let mut renamed = 0;
        for members in self.header.iter_mut().chain(self.trailer.iter_mut()) {
            renamed += rename_field_in(members, old, new);
        }
        for msg in self.messages.values_mut() {
            renamed += rename_field_in(&mut msg.members, old, new);
        }
        for comp in self.components.values_mut() {
            renamed += rename_field_in(&mut comp.members, old, new);
        }
        renamed
    }

    /*********************** ALL PRIVATE METHODS BELOW *************************************/
    fn check_members(
        &self, owner: &str, members: &[Member], names: &HashMap<&str, u32>,
    ) -> DResult<()> {
        for member in members {
            match member.kind {
                MemberKind::Field | MemberKind::Group => {
                    if !names.contains_key(member.name.as_str()) {
                        return Err(DictError::unresolved(owner, format!("field {}", member.name)));
                    }
                    self.check_members(owner, &member.members, names)?;
                }
                MemberKind::Component => {
                    if !self.components.contains_key(&member.name) {
                        return Err(DictError::unresolved(
                            owner,
                            format!("component {}", member.name),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn add_header_or_trailer(&mut self, node: Node) -> DResult<()> {
        let members = get_members(&node)?;
        let section = if node.has_tag_name(HEADER_ID) {
            &mut self.header
        } else {
            &mut self.trailer
        };
        section.get_or_insert_with(Vec::new).extend(members);
        Ok(())
    }

    fn add_all_xml_messages(&mut self, msgs_node: Node, report: &mut Report) -> DResult<()> {
        for m_node in msgs_node.children().filter(|n| n.is_element()) {
            expect_tag_name(&m_node, "message")?;
            let message = Message {
                name: get_name_attr(&m_node)?.to_string(),
                msg_type: get_attribute("msgtype", &m_node)?.to_string(),
                attributes: get_all_attributes(&m_node),
                members: get_members(&m_node)?,
            };
            match self.messages.get(&message.msg_type) {
                Some(first) if first == &message => {
                    report.duplicate(Section::Messages, &message.msg_type, "repeated, first kept");
                }
                Some(first) => {
                    report.conflict(
                        Section::Messages,
                        &message.msg_type,
                        format!("{} dropped, {} declared first", message.name, first.name),
                    );
                }
                None => {
                    self.messages.insert(message.msg_type.clone(), message);
                }
            }
        }
        Ok(())
    }

    fn add_all_xml_components(&mut self, comps_node: Node, report: &mut Report) -> DResult<()> {
        for c_node in comps_node.children().filter(|n| n.is_element()) {
            expect_tag_name(&c_node, "component")?;
            let component = Component {
                name: get_name_attr(&c_node)?.to_string(),
                attributes: get_all_attributes(&c_node),
                members: get_members(&c_node)?,
            };
            match self.components.get(&component.name) {
                Some(first) if first == &component => {
                    report.duplicate(Section::Components, &component.name, "repeated, first kept");
                }
                Some(_) => {
                    report.conflict(
                        Section::Components,
                        &component.name,
                        "redefined with other members, first kept",
                    );
                }
                None => {
                    self.components.insert(component.name.clone(), component);
                }
            }
        }
        Ok(())
    }

    fn add_fields_and_values(&mut self, fields: Node, report: &mut Report) -> DResult<()> {
        for field_node in fields.children().filter(|node| node.is_element()) {
            expect_tag_name(&field_node, "field")?;
            let number = get_number_attr(&field_node)?;
            let field = FieldDef {
                number,
                name: get_name_attr(&field_node)?.to_string(),
                field_type: get_attribute("type", &field_node)?.to_string(),
                attributes: get_all_attributes(&field_node),
                values: get_field_values(&field_node, number, report)?,
            };
            if let Some(first) = self.fields.get(&number) {
                if first == &field {
                    report.duplicate(Section::Fields, number, "repeated, first kept");
                } else {
                    report.conflict(
                        Section::Fields,
                        number,
                        format!("{} dropped, {} declared first", field, first),
                    );
                }
                continue;
            }
            if let Some(owner) = self.field_by_name(&field.name) {
                report.conflict(
                    Section::Fields,
                    number,
                    format!("{} dropped, name belongs to tag {}", field, owner.number),
                );
                continue;
            }
            self.fields.insert(number, field);
        }
        Ok(())
    }
}

impl FromStr for FixDictionary {
    type Err = DictError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(FixDictionary::parse(s)?.0)
    }
}

pub(crate) fn required_flag(required: bool) -> &'static str {
    if required {
        "Y"
    } else {
        "N"
    }
}

/********************* ALL XML PARSING RELATED CODE ********************************************/
// roxmltree accepts a document whose elements are never closed
fn ensure_well_formed(xml: &str) -> DResult<()> {
    for event in EventReader::new(xml.as_bytes()) {
        event?;
    }
    Ok(())
}

fn get_attribute<'a>(attr: &str, node: &Node<'a, '_>) -> DResult<&'a str> {
    match node.attribute(attr) {
        Some(atr) if atr.is_empty() => Err(DictError::AttributeNotFound(format!(
            "empty {} in {}",
            attr,
            node.tag_name().name()
        ))),
        Some(atr) => Ok(atr),
        None => Err(DictError::AttributeNotFound(format!("{} in {}", attr, node.tag_name().name()))),
    }
}

fn get_name_attr<'a>(node: &Node<'a, '_>) -> DResult<&'a str> {
    get_attribute("name", node)
}

fn get_required_attr(node: &Node) -> DResult<bool> {
    let att = get_attribute("required", node)?;
    Ok(att.eq_ignore_ascii_case("Y"))
}

fn get_number_attr(node: &Node) -> DResult<u32> {
    let number = get_attribute("number", node)?;
    number.parse::<u32>().map_err(|e| DictError::FieldNotParsed {
        source: e,
        field: number.to_string(),
    })
}

fn get_all_attributes(node: &Node) -> Attributes {
    node.attributes()
        .into_iter()
        .map(|a| (a.name().to_string(), a.value().to_string()))
        .collect()
}

fn expect_tag_name(node: &Node, name: &str) -> DResult<()> {
    if node.has_tag_name(name) {
        Ok(())
    } else {
        Err(DictError::UnknownXmlTag(node.tag_name().name().to_string()))
    }
}

fn get_members(node: &Node) -> DResult<Vec<Member>> {
    let mut members = Vec::new();
    for child in node.children().filter(|n| n.is_element()) {
        let kind = MemberKind::from_str(child.tag_name().name())?;
        let nested = match kind {
            MemberKind::Group => get_members(&child)?,
            _ => Vec::new(),
        };
        members.push(Member {
            kind,
            name: get_name_attr(&child)?.to_string(),
            required: get_required_attr(&child)?,
            attributes: get_all_attributes(&child),
            members: nested,
        });
    }
    Ok(members)
}

fn get_field_values(node: &Node, number: u32, report: &mut Report) -> DResult<Vec<FieldValue>> {
    let mut field_values: Vec<FieldValue> = Vec::new();
    for val_node in node.children().filter(|n| n.is_element()) {
        expect_tag_name(&val_node, "value")?;
        let value = FieldValue {
            value: get_attribute("enum", &val_node)?.to_string(),
            description: get_attribute("description", &val_node)?.to_string(),
            attributes: get_all_attributes(&val_node),
        };
        match field_values.iter().find(|v| v.value == value.value) {
            Some(first) if first == &value => {
                report.duplicate(Section::Fields, number, format!("value {} repeated", value.value));
            }
            Some(first) => {
                report.conflict(
                    Section::Fields,
                    number,
                    format!(
                        "value {} described as {}, first kept as {}",
                        value.value, value.description, first.description
                    ),
                );
            }
            None => field_values.push(value),
        }
    }
    Ok(field_values)
}
