use std::path::Path;

use heck::ToShoutySnakeCase;
use tracing::{debug, info};

use crate::data_dictionary::*;
use crate::dictionary_errors::*;
use crate::report::{Report, Section};

const SECTION_KEY: &str = "members";

/// Merges a custom dictionary into an official one.
///
/// Field definitions are keyed by tag: an identical custom definition is
/// dropped as a duplicate, a different one replaces the official definition
/// and is reported as a conflict. When the replacement renames the tag, the
/// references to the old name follow it. Messages (by msgtype) and components (by
/// name) keep the official copy. Custom messages that were added also get
/// a MsgType enum value. The combined dictionary must resolve every
/// reference it holds.
pub fn merge(official: FixDictionary, custom: FixDictionary) -> DResult<(FixDictionary, Report)> {
    let mut combined = official;
    let mut report = Report::default();
    info!(
        official = %combined.begin_string(),
        custom = %custom.begin_string(),
        "merging dictionaries"
    );

    merge_header_or_trailer(&mut combined.header, custom.header, Section::Header, &mut report);
    merge_header_or_trailer(&mut combined.trailer, custom.trailer, Section::Trailer, &mut report);
    merge_fields(&mut combined, custom.fields.into_values(), &mut report);

    let mut added_messages: Vec<(String, String)> = Vec::new();
    for (msg_type, msg) in custom.messages {
        match combined.messages.get(&msg_type) {
            Some(existing) if existing == &msg => {
                report.duplicate(Section::Messages, &msg_type, "identical to official message");
            }
            Some(existing) => {
                report.conflict(
                    Section::Messages,
                    &msg_type,
                    format!("custom {} dropped, official {} kept", msg.name(), existing.name()),
                );
            }
            None => {
                debug!(msg_type = %msg_type, "message added");
                added_messages.push((msg_type.clone(), msg.name().clone()));
                combined.messages.insert(msg_type, msg);
            }
        }
    }

    for (name, comp) in custom.components {
        match combined.components.get(&name) {
            Some(existing) if existing == &comp => {
                report.duplicate(Section::Components, &name, "identical to official component");
            }
            Some(_) => {
                report.conflict(Section::Components, &name, "custom dropped, official kept");
            }
            None => {
                debug!(component = %name, "component added");
                combined.components.insert(name, comp);
            }
        }
    }

    add_msg_type_values(&mut combined, &added_messages);
    combined.check_references()?;
    Ok((combined, report))
}

pub fn merge_files<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
    official: P, custom: Q, output: R,
) -> DResult<Report> {
    let (official, mut report) = FixDictionary::from_xml_with_report(official)?;
    let (custom, custom_findings) = FixDictionary::from_xml_with_report(custom)?;
    report.extend(custom_findings);
    let (combined, merge_findings) = merge(official, custom)?;
    report.extend(merge_findings);
    combined.save(&output)?;
    info!(output = %output.as_ref().display(), "merged FIX dictionary written");
    report.log_summary("merge");
    Ok(report)
}

fn merge_header_or_trailer(
    target: &mut Option<Vec<Member>>, custom: Option<Vec<Member>>, section: Section,
    report: &mut Report,
) {
    let custom = match custom {
        Some(members) => members,
        None => return,
    };
    if let Some(existing) = target {
        if *existing == custom {
            report.duplicate(section, SECTION_KEY, "identical to official");
        } else {
            report.conflict(section, SECTION_KEY, "custom dropped, official kept");
        }
    } else {
        *target = Some(custom);
    }
}

fn merge_fields(
    combined: &mut FixDictionary, custom_fields: impl Iterator<Item = FieldDef>,
    report: &mut Report,
) {
    for custom in custom_fields {
        let tag = custom.number();
        // a name owned by another tag would make field references ambiguous
        let name_owner = combined
            .field_by_name(custom.name())
            .map(|f| f.number())
            .filter(|&owner| owner != tag);
        if let Some(owner) = name_owner {
            report.conflict(
                Section::Fields,
                tag,
                format!("custom {} dropped, name belongs to tag {}", custom, owner),
            );
            continue;
        }
        let new_name = custom.name().clone();
        let detail = match combined.fields.get_mut(&tag) {
            Some(existing) if existing.same_definition(&custom) => {
                report.duplicate(Section::Fields, tag, format!("{} exists in official", existing));
                continue;
            }
            Some(existing) => {
                let detail = format!("custom {} replaces official {}", custom, existing);
                let replaced = std::mem::replace(existing, custom);
                if replaced.name() == &new_name {
                    detail
                } else {
                    let renamed = combined.rename_field_references(replaced.name(), &new_name);
                    format!("{}, {} references renamed", detail, renamed)
                }
            }
            None => {
                debug!(tag, "field added");
                combined.fields.insert(tag, custom);
                continue;
            }
        };
        report.conflict(Section::Fields, tag, detail);
    }
}

fn add_msg_type_values(combined: &mut FixDictionary, added: &[(String, String)]) {
    let msg_type_field = match combined.fields.get_mut(&MSG_TYPE_TAG) {
        Some(field) => field,
        None => return,
    };
    for (msg_type, name) in added {
        if !msg_type_field.has_value(msg_type) {
            msg_type_field.push_value(FieldValue::new(msg_type, &name.to_shouty_snake_case()));
        }
    }
}
