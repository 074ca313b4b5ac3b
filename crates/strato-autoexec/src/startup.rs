//! Startup orchestration: decides which commands end up in the composed
//! script, based on the host drive layout, the emulator command line, and the
//! configuration file's `[autoexec]` content. The services consulted here
//! (command-line queries, drive probing, path checks) are traits implemented
//! by the surrounding emulator; tests use deterministic fakes.

use std::path::Path;

use tracing::info;

use crate::script::ScriptComposer;

/// Query/consume operations over the already-parsed emulator command line.
/// `take_*` operations remove what they find, so repeated calls drain
/// repeated occurrences.
pub trait CommandLine {
    /// Removes and reports a bare switch such as `-exit`.
    fn take_flag(&mut self, name: &str) -> bool;

    /// Removes a `name <value>` pair and returns the value. Called in a loop
    /// to drain repeated occurrences in command-line order.
    fn take_option(&mut self, name: &str) -> Option<String>;

    /// Positional (non-option) argument lookup, 0-based.
    fn command(&self, index: usize) -> Option<String>;

    /// Whether the command line names an executable to launch.
    fn has_executable_name(&self) -> bool;
}

/// One auto-mountable drive discovered in the host layout, with the values
/// parsed from its per-drive configuration file (or that parser's defaults).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveMount {
    pub drive_letter: char,
    /// Host path to mount, already simplified for display.
    pub mount_path: String,
    /// Extra `MOUNT.COM` arguments; each prefixed with a space, may be empty.
    pub mount_args: String,
    /// Value for the guest `PATH` variable; empty when the drive adds none.
    pub path_env: String,
}

/// Host drive-layout probing: reports whether a mountable directory exists
/// for `letter` and, if so, how to mount it.
pub trait DriveCatalog {
    fn probe(&self, letter: char) -> Option<DriveMount>;
}

/// Host path checks used to classify positional command-line arguments.
pub trait HostPaths {
    fn is_directory(&self, path: &str) -> bool;
}

/// [`HostPaths`] over the real host filesystem. A relative path is also
/// tried against the current working directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdHostPaths;

impl HostPaths for StdHostPaths {
    fn is_directory(&self, path: &str) -> bool {
        let path = Path::new(path);
        if path.is_dir() {
            return true;
        }
        std::env::current_dir()
            .map(|cwd| cwd.join(path).is_dir())
            .unwrap_or(false)
    }
}

/// How the `[autoexec]` sections of multiple configuration files combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SectionMode {
    /// All sections are concatenated and used together.
    #[default]
    Join,
    /// Later configuration files overwrite the section entirely.
    Overwrite,
}

/// Startup verbosity preference; only [`StartupVerbosity::InstantLaunch`]
/// changes behavior here (it implies an automatic `@EXIT`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StartupVerbosity {
    Quiet,
    Low,
    #[default]
    High,
    InstantLaunch,
}

/// Everything the startup sequence needs to know beyond the live services.
#[derive(Debug, Clone)]
pub struct StartupOptions {
    /// Probe and mount host drive directories before the user content runs.
    pub automount: bool,
    pub section_mode: SectionMode,
    pub verbosity: StartupVerbosity,
    /// Combined `[autoexec]` text of all configuration files (join mode).
    pub joined_section: String,
    /// `[autoexec]` text of the overwriting configuration file.
    pub overwritten_section: String,
    /// Display name of where the overwriting section came from.
    pub overwritten_source: String,
    /// Rewrite single quotes in `-c` arguments to double quotes, so quoted
    /// mount paths survive shells that swallow double quotes.
    pub normalize_quotes: bool,
}

impl Default for StartupOptions {
    fn default() -> Self {
        Self {
            automount: true,
            section_mode: SectionMode::default(),
            verbosity: StartupVerbosity::default(),
            joined_section: String::new(),
            overwritten_section: String::new(),
            overwritten_source: String::new(),
            normalize_quotes: cfg!(windows),
        }
    }
}

const SECURE_MODE_COMMAND: &str = "@Z:\\CONFIG.COM -securemode";

/// Fills `composer` with the startup command sequence.
///
/// Ordering mirrors the guest boot contract: auto-mount commands and
/// command-line commands land in the pre-generated buffer, the configuration
/// section (when allowed) in the user buffer, and sealing/exit commands in
/// the post-generated buffer.
pub fn populate(
    composer: &mut ScriptComposer,
    options: &StartupOptions,
    cmdline: &mut dyn CommandLine,
    drives: &dyn DriveCatalog,
    host_paths: &dyn HostPaths,
) {
    // Auto-mount host drive directories prior to anything else.
    if options.automount {
        for letter in 'a'..='z' {
            auto_mount_drive(composer, drives, letter);
        }
    }

    // Disables mount/imgmount/boot once the boot script has run.
    let secure = cmdline.take_flag("-securemode");

    let autoexec_is_allowed = !cmdline.take_flag("-noautoexec");

    // Extra commands to run before any command given on the command line.
    let mut exit_call_exists = false;
    while let Some(mut argument) = cmdline.take_option("-c") {
        if options.normalize_quotes {
            argument = argument.replace('\'', "\"");
        }

        // A user-supplied 'exit' is deferred to the end of the script so it
        // cannot precede the [autoexec] content.
        if argument == "exit" || argument == "\"exit\"" {
            exit_call_exists = true;
            continue;
        }
        composer.add_line_before(argument);
    }

    let exit_arg_exists = cmdline.take_flag("-exit");

    let using_instant_launch_with_executable = options.verbosity
        == StartupVerbosity::InstantLaunch
        && cmdline.has_executable_name();

    let should_add_exit =
        exit_call_exists || exit_arg_exists || using_instant_launch_with_executable;

    let add_secure_seal = |composer: &mut ScriptComposer, after: bool| {
        if !secure {
            return;
        }
        if after {
            composer.add_line_after(SECURE_MODE_COMMAND);
        } else {
            composer.add_line_before(SECURE_MODE_COMMAND);
        }
    };

    let add_cdrom_mounts = |composer: &mut ScriptComposer, images: &str| {
        if images.is_empty() {
            return;
        }
        composer.add_line_before(format!("@Z:\\IMGMOUNT.COM D {images} -t iso"));
    };

    // Classify positional arguments: the first directory, batch file, boot
    // image, or plain command wins; CD images accumulate until then.

    let mut found_dir_or_command = false;
    let mut cdrom_images = String::new();

    let mut index = 0;
    while let Some(argument) = cmdline.command(index) {
        index += 1;

        if host_paths.is_directory(&argument) {
            add_cdrom_mounts(composer, &cdrom_images);
            composer.add_line_before(format!("@Z:\\MOUNT.COM C \"{argument}\""));
            composer.add_line_before("@C:");
            add_secure_seal(composer, false);

            found_dir_or_command = true;
            break;
        }

        let argument_ucase = argument.to_ascii_uppercase();

        if argument_ucase.ends_with(".BAT") {
            add_cdrom_mounts(composer, &cdrom_images);
            add_secure_seal(composer, false);
            // Batch files are CALLed, otherwise a following exit won't run.
            composer.add_line_before(format!("CALL {argument}"));

            found_dir_or_command = true;
            break;
        }

        if argument_ucase.ends_with(".IMG") || argument_ucase.ends_with(".IMA") {
            add_cdrom_mounts(composer, &cdrom_images);
            // No secure seal: boot is destructive and secure mode disables it.
            composer.add_line_before(format!("BOOT \"{argument}\""));

            found_dir_or_command = true;
            break;
        }

        if argument_ucase.ends_with(".ISO") || argument_ucase.ends_with(".CUE") {
            if !cdrom_images.is_empty() {
                cdrom_images.push(' ');
            }
            cdrom_images.push('"');
            cdrom_images.push_str(&argument);
            cdrom_images.push('"');
            continue;
        }

        // Anything else is taken as a command to run.
        add_cdrom_mounts(composer, &cdrom_images);
        add_secure_seal(composer, false);
        composer.add_line_before(argument);

        found_dir_or_command = true;
        break;
    }

    // Pick the user section.

    if autoexec_is_allowed {
        match options.section_mode {
            SectionMode::Join => {
                load_user_section(composer, &options.joined_section, "one or more joined sections");
            }
            SectionMode::Overwrite => {
                if found_dir_or_command {
                    info!("using commands provided on the command line");
                } else {
                    load_user_section(
                        composer,
                        &options.overwritten_section,
                        &options.overwritten_source,
                    );
                }
            }
        }
    }

    if !found_dir_or_command {
        add_cdrom_mounts(composer, &cdrom_images);
        // Secure mode without a command-line executable seals the
        // configuration only after the user section has run.
        add_secure_seal(composer, true);
    }

    if should_add_exit {
        composer.add_line_after("@EXIT");
    }
}

fn auto_mount_drive(composer: &mut ScriptComposer, drives: &dyn DriveCatalog, letter: char) {
    let Some(mount) = drives.probe(letter) else {
        return;
    };

    composer.add_line_before(format!(
        "@Z:\\MOUNT.COM {} \"{}\"{}",
        mount.drive_letter, mount.mount_path, mount.mount_args
    ));

    if !mount.path_env.is_empty() {
        composer.add_line_before(format!("@SET PATH={}", mount.path_env));
    }
}

fn load_user_section(composer: &mut ScriptComposer, text: &str, source: &str) {
    if text.is_empty() {
        return;
    }
    info!("using autoexec content from {source}");
    composer.load_user_section(text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Origin;

    #[derive(Default)]
    struct NoDrives;

    impl DriveCatalog for NoDrives {
        fn probe(&self, _letter: char) -> Option<DriveMount> {
            None
        }
    }

    #[derive(Default)]
    struct NoDirectories;

    impl HostPaths for NoDirectories {
        fn is_directory(&self, _path: &str) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct EmptyCommandLine;

    impl CommandLine for EmptyCommandLine {
        fn take_flag(&mut self, _name: &str) -> bool {
            false
        }
        fn take_option(&mut self, _name: &str) -> Option<String> {
            None
        }
        fn command(&self, _index: usize) -> Option<String> {
            None
        }
        fn has_executable_name(&self) -> bool {
            false
        }
    }

    #[test]
    fn bare_startup_adds_nothing() {
        let mut composer = ScriptComposer::default();
        populate(
            &mut composer,
            &StartupOptions::default(),
            &mut EmptyCommandLine,
            &NoDrives,
            &NoDirectories,
        );
        assert!(composer.lines(Origin::PreGenerated).is_empty());
        assert!(composer.lines(Origin::UserConfig).is_empty());
        assert!(composer.lines(Origin::PostGenerated).is_empty());
    }

    #[test]
    fn automount_emits_mount_and_path_lines() {
        struct OneDrive;

        impl DriveCatalog for OneDrive {
            fn probe(&self, letter: char) -> Option<DriveMount> {
                (letter == 'c').then(|| DriveMount {
                    drive_letter: 'c',
                    mount_path: "/home/user/drives/c".to_string(),
                    mount_args: " -t dir".to_string(),
                    path_env: "Z:\\;C:\\UTILS".to_string(),
                })
            }
        }

        let mut composer = ScriptComposer::default();
        populate(
            &mut composer,
            &StartupOptions::default(),
            &mut EmptyCommandLine,
            &OneDrive,
            &NoDirectories,
        );
        assert_eq!(
            composer.lines(Origin::PreGenerated),
            [
                "@Z:\\MOUNT.COM c \"/home/user/drives/c\" -t dir",
                "@SET PATH=Z:\\;C:\\UTILS",
            ]
        );
    }

    #[test]
    fn automount_can_be_disabled() {
        struct AnyDrive;

        impl DriveCatalog for AnyDrive {
            fn probe(&self, letter: char) -> Option<DriveMount> {
                Some(DriveMount {
                    drive_letter: letter,
                    mount_path: format!("/drives/{letter}"),
                    mount_args: String::new(),
                    path_env: String::new(),
                })
            }
        }

        let mut composer = ScriptComposer::default();
        let options = StartupOptions {
            automount: false,
            ..StartupOptions::default()
        };
        populate(
            &mut composer,
            &options,
            &mut EmptyCommandLine,
            &AnyDrive,
            &NoDirectories,
        );
        assert!(composer.lines(Origin::PreGenerated).is_empty());
    }
}
