//! Synthetic `AUTOEXEC.BAT` composition for the emulated guest.
//!
//! The guest DOS environment boots by executing a script the emulator
//! synthesizes rather than one read from a host disk. This crate is
//! intentionally self-contained so it can be wired into the rest of the
//! emulator later. It provides:
//! - [`ScriptComposer`]: ordered merging of auto-generated mount commands,
//!   command-line-supplied commands, and user-authored `[autoexec]`
//!   configuration text into one script, with section banners and DOS CR+LF
//!   line endings.
//! - [`populate`] via [`Autoexec::initialize`]: the startup decision
//!   logic that derives those commands from the host drive layout and the
//!   emulator command line.
//! - [`Autoexec`]: the startup-owned context object tying the composer to the
//!   publish cache, republishing the script whenever the guest switches its
//!   active code page.
//!
//! External emulator services appear as traits ([`CommandLine`],
//! [`DriveCatalog`], [`HostPaths`], [`BootScriptSink`], [`ShellEnvironment`],
//! [`CodePageTranscoder`]); production implementations live with the rest of
//! the emulator, deterministic fakes in the tests.

mod context;
mod publish;
mod script;
mod startup;

pub use context::{Autoexec, ShellEnvironment};
pub use publish::{
    BootScriptSink, CodePageTranscoder, DosTranscoder, PublishCache, AUTOEXEC_FILE_NAME,
};
pub use script::{Banners, Origin, ScriptComposer, VariableError, VariablePolicy};
pub use startup::{
    populate, CommandLine, DriveCatalog, DriveMount, HostPaths, SectionMode, StartupOptions,
    StartupVerbosity, StdHostPaths,
};
