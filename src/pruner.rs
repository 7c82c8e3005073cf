use std::collections::{HashMap, HashSet};
use std::{fs, path::Path, str::FromStr};

use getset::{CopyGetters, Getters};
use indexmap::IndexSet;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::data_dictionary::*;
use crate::dictionary_errors::*;

/// Message types that must survive pruning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeepList {
    msg_types: IndexSet<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KeepListFile {
    Config { messages_to_keep: Vec<String> },
    List(Vec<String>),
}

impl KeepList {
    pub fn from_json<P: AsRef<Path>>(path: P) -> DResult<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|e| DictError::from_io(path.to_path_buf(), e))?;
        KeepList::from_str(&data)
    }

    pub fn contains(&self, msg_type: &str) -> bool {
        self.msg_types.contains(msg_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.msg_types.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.msg_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.msg_types.is_empty()
    }
}

impl FromStr for KeepList {
    type Err = DictError;

    /// Accepts `{"messages_to_keep": [..]}` or a bare array.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let msg_types = match serde_json::from_str::<KeepListFile>(s)? {
            KeepListFile::Config { messages_to_keep } => messages_to_keep,
            KeepListFile::List(list) => list,
        };
        Ok(msg_types.into_iter().collect())
    }
}

impl<S: Into<String>> FromIterator<S> for KeepList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            msg_types: iter.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Getters, CopyGetters)]
pub struct PruneSummary {
    #[getset(get_copy = "pub")]
    messages_kept: usize,
    #[getset(get_copy = "pub")]
    messages_removed: usize,
    #[getset(get_copy = "pub")]
    components_kept: usize,
    #[getset(get_copy = "pub")]
    components_removed: usize,
    #[getset(get_copy = "pub")]
    fields_kept: usize,
    #[getset(get_copy = "pub")]
    fields_removed: usize,
    /// keep-list entries with no matching message
    #[getset(get = "pub")]
    unmatched: Vec<String>,
}

/// Tags and component names reachable from a set of member lists.
struct Reachability<'d> {
    dict: &'d FixDictionary,
    tags_by_name: HashMap<&'d str, u32>,
    tags: HashSet<u32>,
    components: HashSet<&'d str>,
}

impl<'d> Reachability<'d> {
    fn new(dict: &'d FixDictionary) -> Self {
        Self {
            dict,
            tags_by_name: dict.field_numbers_by_name(),
            tags: HashSet::new(),
            components: HashSet::new(),
        }
    }

    fn walk(&mut self, owner: &str, members: &'d [Member]) -> DResult<()> {
        for member in members {
            match member.kind() {
                MemberKind::Field => self.mark_field(owner, member.name())?,
                MemberKind::Group => {
                    // the group name is its counter field
                    self.mark_field(owner, member.name())?;
                    self.walk(owner, member.members())?;
                }
                MemberKind::Component => {
                    let dict = self.dict;
                    let comp = dict.component(member.name()).ok_or_else(|| {
                        DictError::unresolved(owner, format!("component {}", member.name()))
                    })?;
                    // visited check keeps cyclic components from recursing forever
                    if self.components.insert(comp.name().as_str()) {
                        self.walk(&format!("component {}", comp.name()), comp.members())?;
                    }
                }
            }
        }
        Ok(())
    }

    fn mark_field(&mut self, owner: &str, name: &str) -> DResult<()> {
        let tag = self
            .tags_by_name
            .get(name)
            .copied()
            .ok_or_else(|| DictError::unresolved(owner, format!("field {}", name)))?;
        self.tags.insert(tag);
        Ok(())
    }

    fn into_sets(self) -> (HashSet<u32>, HashSet<String>) {
        let components = self.components.into_iter().map(str::to_string).collect();
        (self.tags, components)
    }
}

/// Keeps the messages named by `keep` and everything they reach. Header and
/// trailer are always roots, so their fields and components survive even
/// with an empty keep-list.
pub fn prune(mut dict: FixDictionary, keep: &KeepList) -> DResult<(FixDictionary, PruneSummary)> {
    let (tags, components) = {
        let mut reach = Reachability::new(&dict);
        if let Some(header) = &dict.header {
            reach.walk(HEADER_ID, header)?;
        }
        if let Some(trailer) = &dict.trailer {
            reach.walk(TRAILER_ID, trailer)?;
        }
        for msg in dict.messages.values().filter(|m| keep.contains(m.msg_type())) {
            reach.walk(&format!("message {}", msg.msg_type()), msg.members())?;
        }
        reach.into_sets()
    };

    let unmatched: Vec<String> = keep
        .iter()
        .filter(|msg_type| !dict.messages.contains_key(*msg_type))
        .map(str::to_string)
        .collect();
    for msg_type in &unmatched {
        warn!(msg_type = %msg_type, "keep-list message not found in dictionary");
    }

    let (messages_before, components_before, fields_before) =
        (dict.messages.len(), dict.components.len(), dict.fields.len());
    dict.messages.retain(|msg_type, _| keep.contains(msg_type));
    dict.components.retain(|name, _| components.contains(name));
    dict.fields.retain(|tag, _| tags.contains(tag));

    let summary = PruneSummary {
        messages_kept: dict.messages.len(),
        messages_removed: messages_before - dict.messages.len(),
        components_kept: dict.components.len(),
        components_removed: components_before - dict.components.len(),
        fields_kept: dict.fields.len(),
        fields_removed: fields_before - dict.fields.len(),
        unmatched,
    };
    debug!(?summary, "prune finished");
    Ok((dict, summary))
}

pub fn prune_file<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
    input: P, keep_list: Q, output: R,
) -> DResult<PruneSummary> {
    let keep = KeepList::from_json(keep_list)?;
    let dict = FixDictionary::from_xml(input)?;
    let (pruned, summary) = prune(dict, &keep)?;
    pruned.save(&output)?;
    info!(
        output = %output.as_ref().display(),
        messages = summary.messages_kept(),
        fields = summary.fields_kept(),
        components = summary.components_kept(),
        "FIX xml stripped"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::*;

    const FIX_START: &str = r#"<fix type="FIX" major="4" minor="4" servicepack="0">"#;
    const DICTIONARY: &str = r#"
        <header>
            <field name="BeginString" required="Y"/>
            <group name="NoHops" required="N">
                <field name="HopCompID" required="N"/>
            </group>
        </header>
        <messages>
            <message name="A" msgtype="A" msgcat="app">
                <component name="X" required="Y"/>
            </message>
            <message name="B" msgtype="B" msgcat="app">
                <field name="Twenty" required="Y"/>
            </message>
        </messages>
        <trailer>
            <field name="CheckSum" required="Y"/>
        </trailer>
        <components>
            <component name="X">
                <field name="Ten" required="Y"/>
                <component name="Y" required="N"/>
            </component>
            <component name="Y">
                <group name="NoLegs" required="N">
                    <field name="LegSymbol" required="N"/>
                    <component name="X" required="N"/>
                </group>
            </component>
            <component name="Unused">
                <field name="Twenty" required="N"/>
            </component>
        </components>
        <fields>
            <field number="8" name="BeginString" type="STRING"/>
            <field number="10" name="Ten" type="STRING"/>
            <field number="20" name="Twenty" type="STRING"/>
            <field number="93" name="CheckSum" type="STRING"/>
            <field number="555" name="NoLegs" type="NUMINGROUP"/>
            <field number="600" name="LegSymbol" type="STRING"/>
            <field number="627" name="NoHops" type="NUMINGROUP"/>
            <field number="628" name="HopCompID" type="STRING"/>
        </fields>
    "#;

    fn dictionary() -> FixDictionary {
        FixDictionary::from_str(&format!("{}{}</fix>", FIX_START, DICTIONARY)).unwrap()
    }

    fn tags(dict: &FixDictionary) -> Vec<u32> {
        dict.fields().keys().copied().collect()
    }

    #[test]
    fn test_reachability_closure() {
        let keep: KeepList = ["A"].into_iter().collect();
        let (pruned, summary) = prune(dictionary(), &keep).unwrap();
        assert!(pruned.message("A").is_some());
        assert!(pruned.message("B").is_none());
        let comps: Vec<&String> = pruned.components().keys().collect();
        assert_eq!(vec!["X", "Y"], comps);
        // header and trailer fields plus X -> 10, Y -> NoLegs group
        assert_eq!(vec![8, 10, 93, 555, 600, 627, 628], tags(&pruned));
        assert!(!pruned.fields().contains_key(&20));

        assert_eq!(1, summary.messages_kept());
        assert_eq!(1, summary.messages_removed());
        assert_eq!(1, summary.components_removed());
        assert_eq!(1, summary.fields_removed());
        assert!(summary.unmatched().is_empty());
        pruned.check_references().unwrap();
    }

    #[test]
    fn test_keep_only_field_message() {
        let keep: KeepList = ["B"].into_iter().collect();
        let (pruned, _) = prune(dictionary(), &keep).unwrap();
        assert!(pruned.components().is_empty());
        assert_eq!(vec![8, 20, 93, 627, 628], tags(&pruned));
        pruned.check_references().unwrap();
    }

    #[test]
    fn test_empty_keep_list_keeps_header_and_trailer() {
        let (pruned, summary) = prune(dictionary(), &KeepList::default()).unwrap();
        assert!(pruned.messages().is_empty());
        assert!(pruned.components().is_empty());
        assert_eq!(vec![8, 93, 627, 628], tags(&pruned));
        assert!(pruned.header().is_some());
        assert_eq!(2, summary.messages_removed());
        pruned.check_references().unwrap();
    }

    #[test]
    fn test_unmatched_keep_entry() {
        let keep: KeepList = ["A", "ZZ"].into_iter().collect();
        let (pruned, summary) = prune(dictionary(), &keep).unwrap();
        assert_eq!(1, pruned.messages().len());
        assert_eq!(&vec!["ZZ".to_string()], summary.unmatched());
    }

    #[test]
    fn test_self_contained_for_every_keep_list() {
        let keep_lists: [&[&str]; 4] = [&[], &["A"], &["B"], &["A", "B"]];
        for keep in keep_lists {
            let keep: KeepList = keep.iter().copied().collect();
            let (pruned, _) = prune(dictionary(), &keep).unwrap();
            pruned.check_references().unwrap();
        }
    }

    #[test]
    fn test_unresolved_reference_in_kept_message() {
        let xml = format!(
            r#"{}<messages>
                <message name="A" msgtype="A" msgcat="app">
                    <component name="Missing" required="Y"/>
                </message>
            </messages></fix>"#,
            FIX_START
        );
        let dict = FixDictionary::from_str(&xml).unwrap();
        let keep: KeepList = ["A"].into_iter().collect();
        assert_matches!(
            prune(dict.clone(), &keep),
            Err(DictError::UnresolvedReference { owner, .. }) if owner == "message A"
        );
        // dropped messages are never walked
        assert!(prune(dict, &KeepList::default()).is_ok());
    }

    #[test]
    fn test_keep_list_formats() {
        let config = KeepList::from_str(r#"{"messages_to_keep": ["D", "8"]}"#).unwrap();
        assert_eq!(vec!["D", "8"], config.iter().collect::<Vec<_>>());
        let list = KeepList::from_str(r#"["C01"]"#).unwrap();
        assert!(list.contains("C01"));
        assert_eq!(1, list.len());
        assert_matches!(KeepList::from_str(r#"{"keep": "D"}"#), Err(DictError::KeepList(_)));
        assert_matches!(KeepList::from_json("no/such/filter.json"), Err(DictError::MissingFile { .. }));
    }
}
