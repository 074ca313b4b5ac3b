//! The boot-script text assembler.
//!
//! Three line buffers (auto-generated commands placed before the user's
//! `[autoexec]` content, the user content itself, and auto-generated commands
//! placed after it) plus an echo-off flag and an ordered set of environment
//! variable assignments are merged into one script. Buffers always render in
//! pre/user/post order no matter how the insertion calls interleave, and each
//! section is introduced by a `:: ` banner comment when the renderer crosses
//! from one kind of content into the other.

use std::collections::BTreeMap;

use thiserror::Error;

/// DOS line terminator. Fixed CR+LF, never the host convention.
const LINE_ENDING: &str = "\r\n";

/// Prefix that turns a line into a batch-file comment.
const COMMENT_PREFIX: &str = ":: ";

/// Where a script line came from. Rendering always groups lines in the
/// declaration order below, regardless of the order the insertion calls were
/// made in; insertion order is only preserved *within* one origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Auto-generated commands placed before the user's `[autoexec]` content.
    PreGenerated,
    /// Content of the `[autoexec]` section from the configuration file(s).
    UserConfig,
    /// Auto-generated commands placed after the user's `[autoexec]` content.
    PostGenerated,
}

impl Origin {
    const ALL: [Origin; 3] = [Origin::PreGenerated, Origin::UserConfig, Origin::PostGenerated];

    fn index(self) -> usize {
        match self {
            Origin::PreGenerated => 0,
            Origin::UserConfig => 1,
            Origin::PostGenerated => 2,
        }
    }
}

/// Section banner texts. Localized message lookup is the embedder's concern;
/// the defaults carry the English texts.
#[derive(Debug, Clone)]
pub struct Banners {
    /// Banner above auto-generated content.
    pub generated: String,
    /// Banner above content taken from the configuration file.
    pub config_section: String,
}

impl Default for Banners {
    fn default() -> Self {
        Self {
            generated: "autogenerated".to_string(),
            config_section: "from [autoexec] section".to_string(),
        }
    }
}

/// Validation applied to environment variable names and values. Applied
/// uniformly in every build configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VariablePolicy {
    /// Accept arbitrary strings.
    #[default]
    AcceptAny,
    /// Reject names or values containing anything outside 0x20..=0x7E.
    RequirePrintableAscii,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VariableError {
    #[error("variable name {name:?} is not printable ASCII")]
    NameNotPrintableAscii { name: String },

    #[error("value of variable {name:?} is not printable ASCII")]
    ValueNotPrintableAscii { name: String },
}

fn is_printable_ascii(text: &str) -> bool {
    text.bytes().all(|byte| (0x20..=0x7E).contains(&byte))
}

/// Kind of content the renderer last emitted; a banner is inserted whenever
/// the kind changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Generated,
    UserConfig,
}

/// Accumulates boot-script content during startup and renders it to the final
/// UTF-8 text.
///
/// State accumulates over one startup sequence; rendering never mutates, so
/// identical composer state always renders identical output.
#[derive(Debug, Default)]
pub struct ScriptComposer {
    echo_off: bool,
    variables: BTreeMap<String, String>,
    buffers: [Vec<String>; 3],
    policy: VariablePolicy,
}

impl ScriptComposer {
    pub fn new(policy: VariablePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Appends `line` to the buffer for `origin`. Empty lines are valid and
    /// render as blank lines.
    pub fn add_line(&mut self, origin: Origin, line: impl Into<String>) {
        self.buffers[origin.index()].push(line.into());
    }

    /// Appends an auto-generated command placed before the user content.
    pub fn add_line_before(&mut self, line: impl Into<String>) {
        self.add_line(Origin::PreGenerated, line);
    }

    /// Appends an auto-generated command placed after the user content.
    pub fn add_line_after(&mut self, line: impl Into<String>) {
        self.add_line(Origin::PostGenerated, line);
    }

    /// Appends a line of user-authored `[autoexec]` content.
    pub fn add_user_line(&mut self, line: impl Into<String>) {
        self.add_line(Origin::UserConfig, line);
    }

    pub fn lines(&self, origin: Origin) -> &[String] {
        &self.buffers[origin.index()]
    }

    /// Whether the script starts with an auto-generated `@ECHO OFF`.
    pub fn echo_off(&self) -> bool {
        self.echo_off
    }

    pub fn set_echo_off(&mut self, echo_off: bool) {
        self.echo_off = echo_off;
    }

    /// Stores an environment variable assignment to be emitted as an
    /// auto-generated `@SET` line. Names are uppercased; an empty value
    /// removes the entry. Fails only under
    /// [`VariablePolicy::RequirePrintableAscii`].
    pub fn set_variable(&mut self, name: &str, value: &str) -> Result<(), VariableError> {
        if self.policy == VariablePolicy::RequirePrintableAscii {
            if !is_printable_ascii(name) {
                return Err(VariableError::NameNotPrintableAscii {
                    name: name.to_string(),
                });
            }
            if !is_printable_ascii(value) {
                return Err(VariableError::ValueNotPrintableAscii {
                    name: name.to_string(),
                });
            }
        }

        let name = name.to_ascii_uppercase();
        if value.is_empty() {
            self.variables.remove(&name);
        } else {
            self.variables.insert(name, value.to_string());
        }
        Ok(())
    }

    /// Stored variable assignments, in emission order.
    pub fn variables(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.variables
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Splits `raw` into trimmed lines and appends them as user content.
    ///
    /// If the *first* line is an `echo off` command (optionally `@`-prefixed,
    /// case-insensitive, arbitrary interior whitespace), it is consumed and
    /// replaced by the echo-off flag so the renderer can emit its own
    /// `@ECHO OFF` in the generated header. Later lines are never treated
    /// this way. An empty `raw` adds nothing and leaves the flag untouched.
    pub fn load_user_section(&mut self, raw: &str) {
        let mut is_first_line = true;
        for line in raw.lines() {
            let line = line.trim();

            if is_first_line {
                is_first_line = false;
                if is_echo_off_command(line) {
                    self.echo_off = true;
                    continue;
                }
            }

            self.add_user_line(line);
        }
    }

    /// Renders the accumulated state to the final script text.
    pub fn render(&self, banners: &Banners) -> String {
        let generated_banner = format!("{COMMENT_PREFIX}{}", banners.generated);
        let config_banner = format!("{COMMENT_PREFIX}{}", banners.config_section);

        let mut out = String::new();
        let mut section = Section::None;

        // Header: 'ECHO OFF' and the variable assignments.

        if self.echo_off || !self.variables.is_empty() {
            push_line(&mut out, &generated_banner);
            section = Section::Generated;
        }

        if self.echo_off {
            push_line(&mut out, "");
            push_line(&mut out, "@ECHO OFF");
        }

        if !self.variables.is_empty() {
            push_line(&mut out, "");
            for (name, value) in &self.variables {
                push_line(&mut out, &format!("@SET {name}={value}"));
            }
        }

        if section == Section::Generated {
            push_line(&mut out, "");
        }

        // Remaining content, grouped by origin in fixed order. A banner is
        // emitted whenever the section kind changes.

        for origin in Origin::ALL {
            let lines = &self.buffers[origin.index()];
            if lines.is_empty() {
                continue;
            }

            let (target, banner) = match origin {
                Origin::PreGenerated | Origin::PostGenerated => {
                    (Section::Generated, &generated_banner)
                }
                Origin::UserConfig => (Section::UserConfig, &config_banner),
            };

            if section != target {
                if !out.is_empty() {
                    push_line(&mut out, "");
                }
                push_line(&mut out, banner);
                push_line(&mut out, "");
                section = target;
            }

            for line in lines {
                push_line(&mut out, line);
            }
        }

        out
    }
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push_str(LINE_ENDING);
}

/// Recognizes `echo off` with an optional leading `@`, in any case, with any
/// interior whitespace, and nothing else on the line.
fn is_echo_off_command(line: &str) -> bool {
    let line = line.strip_prefix('@').unwrap_or(line);
    if line.len() < 8 {
        return false;
    }

    let lower = line.to_ascii_lowercase();
    let Some(rest) = lower.strip_prefix("echo") else {
        return false;
    };
    let Some(middle) = rest.strip_suffix("off") else {
        return false;
    };
    middle.chars().all(char::is_whitespace)
}
