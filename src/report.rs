use std::fmt;

use getset::{CopyGetters, Getters};
use tracing::{debug, info, warn};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FindingKind {
    /// Same key and same definition seen again; the extra copy was dropped.
    Duplicate,
    /// Same key with a different definition; resolved by precedence.
    Conflict,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Section {
    Header,
    Trailer,
    Messages,
    Components,
    Fields,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let section = match self {
            Section::Header => "header",
            Section::Trailer => "trailer",
            Section::Messages => "message",
            Section::Components => "component",
            Section::Fields => "field",
        };
        write!(f, "{}", section)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct Finding {
    #[getset(get_copy = "pub")]
    kind: FindingKind,
    #[getset(get_copy = "pub")]
    section: Section,
    #[getset(get = "pub")]
    key: String,
    #[getset(get = "pub")]
    detail: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            FindingKind::Duplicate => "duplicate",
            FindingKind::Conflict => "conflict",
        };
        write!(f, "{} {} {}: {}", kind, self.section, self.key, self.detail)
    }
}

/// Duplicates and conflicts met while building a dictionary, in the order
/// they were resolved.
#[derive(Debug, Clone, Default)]
pub struct Report {
    findings: Vec<Finding>,
}

impl Report {
    pub fn duplicate(&mut self, section: Section, key: impl ToString, detail: impl Into<String>) {
        let finding = Finding {
            kind: FindingKind::Duplicate,
            section,
            key: key.to_string(),
            detail: detail.into(),
        };
        debug!("{}", finding);
        self.findings.push(finding);
    }

    pub fn conflict(&mut self, section: Section, key: impl ToString, detail: impl Into<String>) {
        let finding = Finding {
            kind: FindingKind::Conflict,
            section,
            key: key.to_string(),
            detail: detail.into(),
        };
        warn!("{}", finding);
        self.findings.push(finding);
    }

    /// Appends findings recorded by an earlier stage.
    pub fn extend(&mut self, other: Report) {
        self.findings.extend(other.findings);
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn duplicates(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.kind == FindingKind::Duplicate)
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.kind == FindingKind::Conflict)
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn log_summary(&self, stage: &str) {
        info!(
            duplicates = self.duplicates().count(),
            conflicts = self.conflicts().count(),
            "{} finished",
            stage
        );
    }
}

/// One finding per line, duplicates first.
impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for finding in self.duplicates().chain(self.conflicts()) {
            writeln!(f, "{}", finding)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_findings_split_by_kind() {
        let mut report = Report::default();
        assert!(report.is_empty());
        report.duplicate(Section::Fields, 55, "Symbol/STRING already defined");
        report.conflict(Section::Messages, "D", "official message kept");
        report.duplicate(Section::Components, "Instrument", "identical");

        assert_eq!(3, report.len());
        assert_eq!(2, report.duplicates().count());
        let conflicts: Vec<&Finding> = report.conflicts().collect();
        assert_eq!(1, conflicts.len());
        assert_eq!(Section::Messages, conflicts[0].section());
        assert_eq!("D", conflicts[0].key());
        assert_eq!("conflict message D: official message kept", conflicts[0].to_string());
        assert_eq!("55", report.findings()[0].key());
    }

    #[test]
    fn test_rendered_report() {
        let mut report = Report::default();
        assert_eq!("", report.to_string());
        report.conflict(Section::Fields, 55, "custom 55=Ticker/STRING replaces official");

        let mut generated = Report::default();
        generated.duplicate(Section::Fields, 20001, "line 3: already defined");
        report.extend(generated);
        assert_eq!(2, report.len());
        assert_eq!(
            "duplicate field 20001: line 3: already defined\n\
             conflict field 55: custom 55=Ticker/STRING replaces official\n",
            report.to_string()
        );
    }
}
