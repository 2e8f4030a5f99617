//! Build configuration header model and injector.
//!
//! The gossip binary takes three compile-time limits from `#define` lines in
//! a C header. The header is parsed into [`BuildConfigFile`], the three
//! macros are set as typed fields, and the file is rendered back with every
//! other byte untouched.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::domain::errors::InjectionError;
use crate::domain::models::Experiment;

/// The compile-time parameters rewritten before each build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigMacro {
    MaximumMembers,
    MaximumMembersInAnUpdate,
    GossipFanout,
}

impl ConfigMacro {
    pub const ALL: [Self; 3] = [
        Self::MaximumMembers,
        Self::MaximumMembersInAnUpdate,
        Self::GossipFanout,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::MaximumMembers => "MAXIMUM_MEMBERS",
            Self::MaximumMembersInAnUpdate => "MAXIMUM_MEMBERS_IN_AN_UPDATE",
            Self::GossipFanout => "GOSSIP_FANOUT",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Value this macro takes for `experiment`.
    pub const fn value_for(self, experiment: &Experiment) -> u64 {
        match self {
            Self::MaximumMembers => experiment.members() as u64,
            Self::MaximumMembersInAnUpdate => experiment.members_in_update() as u64,
            Self::GossipFanout => experiment.fanout() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MacroDefinition {
    name: ConfigMacro,
    indent: String,
    value: u64,
    /// Whatever followed the value on the line (spaces, comments).
    trailer: String,
    ending: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HeaderLine {
    Define(MacroDefinition),
    Text(String),
}

/// A parsed build configuration header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfigFile {
    path: PathBuf,
    lines: Vec<HeaderLine>,
}

struct RawDefine<'a> {
    indent: &'a str,
    name: &'a str,
    value: &'a str,
    trailer: &'a str,
}

/// Split `#define NAME VALUE...` into its parts. `line` has no terminator.
fn split_define(line: &str) -> Option<RawDefine<'_>> {
    let body = line.trim_start();
    let indent = &line[..line.len() - body.len()];

    let rest = body.strip_prefix('#')?.trim_start().strip_prefix("define")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();

    let name_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let (name, after_name) = rest.split_at(name_end);
    let after_name = after_name.trim_start();

    let value_end = after_name
        .find(|c: char| c.is_whitespace() || c == '/')
        .unwrap_or(after_name.len());
    let (value, trailer) = after_name.split_at(value_end);

    Some(RawDefine {
        indent,
        name,
        value,
        trailer,
    })
}

impl BuildConfigFile {
    /// Parse header text. `path` is only used for error messages.
    pub fn parse(path: &Path, text: &str) -> Result<Self, InjectionError> {
        let mut lines = Vec::new();

        for (index, raw) in text.split_inclusive('\n').enumerate() {
            let content = raw.trim_end_matches(['\n', '\r']);
            let ending = &raw[content.len()..];

            let define = split_define(content)
                .and_then(|d| ConfigMacro::from_name(d.name).map(|name| (name, d)));

            match define {
                Some((name, d)) => {
                    let value = d.value.parse::<u64>().map_err(|_| {
                        InjectionError::NonNumericValue {
                            name: name.name(),
                            path: path.to_path_buf(),
                            line: index + 1,
                            value: d.value.to_string(),
                        }
                    })?;
                    lines.push(HeaderLine::Define(MacroDefinition {
                        name,
                        indent: d.indent.to_string(),
                        value,
                        trailer: d.trailer.to_string(),
                        ending: ending.to_string(),
                    }));
                }
                None => lines.push(HeaderLine::Text(raw.to_string())),
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            lines,
        })
    }

    fn definitions_mut(&mut self, name: ConfigMacro) -> impl Iterator<Item = &mut MacroDefinition> {
        self.lines.iter_mut().filter_map(move |line| match line {
            HeaderLine::Define(def) if def.name == name => Some(def),
            _ => None,
        })
    }

    /// Current value of `name`, from its first definition.
    pub fn value(&self, name: ConfigMacro) -> Option<u64> {
        self.lines.iter().find_map(|line| match line {
            HeaderLine::Define(def) if def.name == name => Some(def.value),
            _ => None,
        })
    }

    /// Set every definition of `name`. Fails if the macro is not defined.
    pub fn set(&mut self, name: ConfigMacro, value: u64) -> Result<(), InjectionError> {
        let mut found = false;
        for def in self.definitions_mut(name) {
            def.value = value;
            found = true;
        }
        if found {
            Ok(())
        } else {
            Err(InjectionError::MacroNotFound {
                name: name.name(),
                path: self.path.clone(),
            })
        }
    }

    /// Set all three macros for `experiment`. Leaves the model unchanged
    /// if any macro is missing.
    pub fn apply(&mut self, experiment: &Experiment) -> Result<(), InjectionError> {
        if let Some(missing) = ConfigMacro::ALL.into_iter().find(|m| self.value(*m).is_none()) {
            return Err(InjectionError::MacroNotFound {
                name: missing.name(),
                path: self.path.clone(),
            });
        }
        for name in ConfigMacro::ALL {
            self.set(name, name.value_for(experiment))?;
        }
        Ok(())
    }

    pub fn render(&self) -> String {
        self.lines
            .iter()
            .map(|line| match line {
                HeaderLine::Text(text) => text.clone(),
                HeaderLine::Define(def) => format!(
                    "{}#define {} {}{}{}",
                    def.indent,
                    def.name.name(),
                    def.value,
                    def.trailer,
                    def.ending
                ),
            })
            .collect()
    }
}

/// Rewrites the build configuration header in place before each rebuild.
///
/// No backup is kept. A missing or malformed macro aborts before anything
/// is written.
#[derive(Debug, Clone)]
pub struct ConfigInjector {
    path: PathBuf,
}

impl ConfigInjector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[instrument(skip(self), fields(header = %self.path.display()))]
    pub async fn inject(&self, experiment: &Experiment) -> Result<(), InjectionError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| InjectionError::Read {
                path: self.path.clone(),
                source,
            })?;

        let mut header = BuildConfigFile::parse(&self.path, &text)?;
        header.apply(experiment)?;

        let rendered = header.render();
        if rendered == text {
            debug!("Header already matches experiment");
        } else {
            tokio::fs::write(&self.path, rendered)
                .await
                .map_err(|source| InjectionError::Write {
                    path: self.path.clone(),
                    source,
                })?;
        }

        info!(
            maximum_members = experiment.members(),
            maximum_members_in_an_update = experiment.members_in_update(),
            gossip_fanout = experiment.fanout(),
            "Build configuration updated"
        );
        Ok(())
    }
}
